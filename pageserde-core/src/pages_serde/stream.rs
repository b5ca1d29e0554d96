// In: src/pages_serde/stream.rs

//! Sequences of page frames, as found in spill files and exchange buffers.
//!
//! Frames are written back to back with no outer container. A reader knows the
//! sequence has ended when the source is exhausted exactly at a frame boundary.

use std::io::{Read, Write};

use crate::error::PagesSerdeError;
use crate::page::Page;
use crate::pages_serde::PagesSerde;

/// Serializes every page in order. Returns the total number of bytes written.
pub fn write_pages<'a, W, I>(
    serde: &PagesSerde,
    sink: &mut W,
    pages: I,
) -> Result<usize, PagesSerdeError>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = &'a Page>,
{
    let mut written = 0;
    let mut count = 0usize;
    for page in pages {
        written += serde.serialize(page, sink)?;
        count += 1;
    }
    log_metric!("event" = "write_pages", "pages" = count, "bytes" = written);
    Ok(written)
}

/// Iterates over the pages in a source until a clean end of stream.
///
/// After the first error the iterator is fused and yields nothing further.
pub struct PageReader<'a, R> {
    serde: &'a PagesSerde,
    source: R,
    done: bool,
}

impl<'a, R: Read> PageReader<'a, R> {
    pub fn new(serde: &'a PagesSerde, source: R) -> Self {
        Self {
            serde,
            source,
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}

impl<R: Read> Iterator for PageReader<'_, R> {
    type Item = Result<Page, PagesSerdeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.serde.try_deserialize(&mut self.source) {
            Ok(Some(page)) => Some(Ok(page)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for PageReader<'_, R> {}
