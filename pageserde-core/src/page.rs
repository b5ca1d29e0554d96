// In: src/page.rs

//! The in-memory unit of data exchanged between operators: an ordered batch of
//! columnar blocks sharing one row count.
//!
//! Blocks are Arrow arrays. A page is immutable once built; the serde layer
//! only reads it.

use arrow::array::ArrayRef;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::PagesSerdeError;

/// An ordered sequence of blocks that all hold `position_count` rows.
///
/// A page may have no blocks at all and still carry a row count; such pages
/// appear for operators that only need cardinality (e.g. `count(*)`).
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    position_count: usize,
    blocks: Vec<ArrayRef>,
}

impl Page {
    /// Builds a page from its blocks. The row count is taken from the first
    /// block; every other block must match it. An empty block list yields the
    /// empty page.
    pub fn new(blocks: Vec<ArrayRef>) -> Result<Self, PagesSerdeError> {
        let position_count = blocks.first().map_or(0, |block| block.len());
        Self::with_position_count(position_count, blocks)
    }

    /// Builds a page with an explicit row count.
    pub fn with_position_count(
        position_count: usize,
        blocks: Vec<ArrayRef>,
    ) -> Result<Self, PagesSerdeError> {
        if let Some((channel, block)) = blocks
            .iter()
            .enumerate()
            .find(|(_, block)| block.len() != position_count)
        {
            return Err(PagesSerdeError::InternalError(format!(
                "block {} has {} positions, page has {}",
                channel,
                block.len(),
                position_count
            )));
        }
        Ok(Self {
            position_count,
            blocks,
        })
    }

    /// The page with no rows and no columns.
    pub fn empty() -> Self {
        Self {
            position_count: 0,
            blocks: Vec::new(),
        }
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn channel_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, channel: usize) -> Option<&ArrayRef> {
        self.blocks.get(channel)
    }

    pub fn blocks(&self) -> &[ArrayRef] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<ArrayRef> {
        self.blocks
    }

    /// Total buffer memory held by the blocks, for metrics.
    pub fn retained_size_in_bytes(&self) -> usize {
        self.blocks
            .iter()
            .map(|block| block.get_buffer_memory_size())
            .sum()
    }

    //==============================================================================
    // Arrow interop
    //==============================================================================

    /// Wraps the columns of a `RecordBatch` without copying them.
    pub fn from_record_batch(batch: &RecordBatch) -> Self {
        Self {
            position_count: batch.num_rows(),
            blocks: batch.columns().to_vec(),
        }
    }

    /// Reassembles a `RecordBatch` under `schema`. The schema must describe the
    /// blocks in channel order.
    pub fn into_record_batch(self, schema: SchemaRef) -> Result<RecordBatch, PagesSerdeError> {
        let options = RecordBatchOptions::new().with_row_count(Some(self.position_count));
        Ok(RecordBatch::try_new_with_options(
            schema,
            self.blocks,
            &options,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    #[test]
    fn test_new_takes_row_count_from_blocks() {
        let page = Page::new(vec![
            Arc::new(Int32Array::from(vec![1, 2, 3])),
            Arc::new(StringArray::from(vec!["a", "b", "c"])),
        ])
        .unwrap();
        assert_eq!(page.position_count(), 3);
        assert_eq!(page.channel_count(), 2);
        assert!(page.retained_size_in_bytes() > 0);
    }

    #[test]
    fn test_mismatched_block_lengths_are_rejected() {
        let result = Page::new(vec![
            Arc::new(Int32Array::from(vec![1, 2, 3])),
            Arc::new(Int32Array::from(vec![1, 2])),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_row_count_only_page() {
        let page = Page::with_position_count(42, Vec::new()).unwrap();
        assert_eq!(page.position_count(), 42);
        assert_eq!(page.channel_count(), 0);
        assert_eq!(Page::new(Vec::new()).unwrap(), Page::empty());
    }

    #[test]
    fn test_record_batch_interop() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("x"), None])),
            ],
        )
        .unwrap();

        let page = Page::from_record_batch(&batch);
        assert_eq!(page.position_count(), 2);
        let rebuilt = page.into_record_batch(schema).unwrap();
        assert_eq!(rebuilt, batch);
    }

    #[test]
    fn test_record_batch_schema_mismatch_is_arrow_error() {
        let page = Page::new(vec![Arc::new(Int32Array::from(vec![1]))]).unwrap();
        let schema = Arc::new(Schema::new(vec![Field::new("s", DataType::Utf8, false)]));
        assert!(matches!(
            page.into_record_batch(schema),
            Err(PagesSerdeError::Arrow(_))
        ));
    }
}
