// In: src/pages_serde/factory.rs

//! Chooses and builds the `PagesSerde` for an execution context.
//!
//! Decision order: direct mode wins outright; otherwise a buffered strategy is
//! built with compression per configuration and encryption iff a cipher was
//! supplied. Building never fails.

use std::sync::Arc;

use crate::block::BlockEncodingSerde;
use crate::cipher::SpillCipher;
use crate::compression::{ZstdCompressor, ZstdDecompressor};
use crate::config::PagesSerdeConfig;
use crate::error::PagesSerdeError;
use crate::pages_serde::{BufferedPagesSerde, DirectPagesSerde, PagesSerde};

#[derive(Debug, Clone)]
pub struct PagesSerdeFactory {
    block_serde: Arc<dyn BlockEncodingSerde>,
    config: PagesSerdeConfig,
}

impl PagesSerdeFactory {
    /// A factory using default settings apart from the compression switch.
    pub fn new(block_serde: Arc<dyn BlockEncodingSerde>, compression_enabled: bool) -> Self {
        Self {
            block_serde,
            config: PagesSerdeConfig {
                compression_enabled,
                ..PagesSerdeConfig::default()
            },
        }
    }

    /// A factory over a full configuration, validated up front so that
    /// strategy construction cannot fail later.
    pub fn from_config(
        block_serde: Arc<dyn BlockEncodingSerde>,
        config: &PagesSerdeConfig,
    ) -> Result<Self, PagesSerdeError> {
        config.validate()?;
        Ok(Self {
            block_serde,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &PagesSerdeConfig {
        &self.config
    }

    /// The strategy for ordinary exchange: buffered, never encrypted,
    /// compressed per configuration.
    pub fn create_pages_serde(&self) -> PagesSerde {
        self.create(None, false)
    }

    /// The strategy for spilling. `use_direct_serde` takes priority over
    /// both compression and the cipher.
    pub fn create_pages_serde_for_spill(
        &self,
        cipher: Option<Arc<dyn SpillCipher>>,
        use_direct_serde: bool,
    ) -> PagesSerde {
        self.create(cipher, use_direct_serde)
    }

    fn create(&self, cipher: Option<Arc<dyn SpillCipher>>, use_direct_serde: bool) -> PagesSerde {
        if use_direct_serde {
            if cipher.is_some() {
                log::debug!("direct page serde does not encrypt; the spill cipher is not used");
            }
            log::debug!("creating direct page serde");
            return DirectPagesSerde::new(Arc::clone(&self.block_serde)).into();
        }

        let mut serde = BufferedPagesSerde::new(Arc::clone(&self.block_serde));
        if self.config.compression_enabled {
            serde = serde
                .with_compression(
                    Arc::new(ZstdCompressor::new(self.config.compression_level)),
                    Arc::new(ZstdDecompressor),
                )
                .with_min_compression_ratio(self.config.min_compression_ratio);
        }
        serde = serde.with_cipher(cipher);

        log::debug!(
            "creating buffered page serde (compressed: {}, encrypted: {})",
            serde.is_compressed(),
            serde.is_encrypted()
        );
        serde.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockEncodingManager;
    use crate::cipher::AesSpillCipher;
    use crate::pages_serde::{SerdeKind, SerdeProfile};

    fn factory(compression_enabled: bool) -> PagesSerdeFactory {
        PagesSerdeFactory::new(
            Arc::new(BlockEncodingManager::with_default_encodings()),
            compression_enabled,
        )
    }

    fn cipher() -> Option<Arc<dyn SpillCipher>> {
        Some(Arc::new(AesSpillCipher::new()))
    }

    fn profile(kind: SerdeKind, compressed: bool, encrypted: bool) -> SerdeProfile {
        SerdeProfile {
            kind,
            compressed,
            encrypted,
        }
    }

    #[test]
    fn test_decision_table() {
        use SerdeKind::{Buffered, Direct};

        for compression in [false, true] {
            let f = factory(compression);
            assert_eq!(
                f.create_pages_serde_for_spill(None, true).profile(),
                profile(Direct, false, false)
            );
            assert_eq!(
                f.create_pages_serde_for_spill(cipher(), true).profile(),
                profile(Direct, false, false)
            );
            assert_eq!(
                f.create_pages_serde_for_spill(None, false).profile(),
                profile(Buffered, compression, false)
            );
            assert_eq!(
                f.create_pages_serde_for_spill(cipher(), false).profile(),
                profile(Buffered, compression, true)
            );
            assert_eq!(f.create_pages_serde().profile(), profile(Buffered, compression, false));
        }
    }

    #[test]
    fn test_from_config_validates() {
        let block_serde: Arc<dyn BlockEncodingSerde> =
            Arc::new(BlockEncodingManager::with_default_encodings());

        let bad = PagesSerdeConfig {
            min_compression_ratio: Some(1.5),
            ..PagesSerdeConfig::default()
        };
        assert!(matches!(
            PagesSerdeFactory::from_config(Arc::clone(&block_serde), &bad),
            Err(PagesSerdeError::InvalidConfig(_))
        ));

        let good =
            PagesSerdeConfig::from_json(r#"{"compression_enabled": true, "compression_level": 9}"#)
                .unwrap();
        let f = PagesSerdeFactory::from_config(block_serde, &good).unwrap();
        assert_eq!(f.config().compression_level, 9);
        assert!(f.create_pages_serde().is_compressed());
    }
}
