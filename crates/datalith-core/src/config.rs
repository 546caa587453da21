//! Store construction parameters. All knobs are validated once, at
//! construction; nothing here is consulted on a per-datom basis.

use crate::error::CoreError;
use std::fmt;
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("prefetch_count_key_only must be non-zero")]
    ZeroPrefetch,

    #[error("default_cardinality must be non-zero")]
    ZeroCardinality,

    #[error("selectivity_merge_threshold must be finite and within (0, 1], got {value}")]
    InvalidSelectivityThreshold { value: f64 },
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        Self::config(err.to_string())
    }
}

///
/// EncoderKind
///
/// Key-encoding strategy, fixed for the life of a store. Mixing encoders
/// on one store is undefined.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum EncoderKind {
    #[default]
    Binary,
    Printable,
}

impl fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Binary => "binary",
            Self::Printable => "printable",
        };
        write!(f, "{label}")
    }
}

///
/// TxIdSource
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TxIdSource {
    /// Persistent per-store counter; recovered from the meta namespace on open.
    #[default]
    Counter,
    /// Wall-clock nanoseconds, clamped monotonic across commits.
    WallTimeNanos,
}

///
/// StoreConfig
///

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub encoder: EncoderKind,
    pub tx_id_source: TxIdSource,

    /// Binding-set size at or below which index-nested-loop with seek reuse
    /// is preferred. The default of 0 means "never prefer INL".
    pub k_inl: usize,

    /// Upper bound on binding-set size for hash-join absent selectivity.
    pub hash_join_upper: usize,

    /// Bindings-to-cardinality ratio below which hash-join is still chosen
    /// over merge-join for large binding sets.
    pub selectivity_merge_threshold: f64,

    /// Per-fill batch size for key-only scans.
    pub prefetch_count_key_only: usize,

    /// Conservative per-pattern cardinality estimate used when no estimator
    /// override is installed.
    pub default_cardinality: u64,

    /// Block-cache budget handed to the durable engine on open.
    pub cache_capacity_bytes: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderKind::default(),
            tx_id_source: TxIdSource::default(),
            k_inl: 0,
            hash_join_upper: 1000,
            selectivity_merge_threshold: 0.5,
            prefetch_count_key_only: 10_000,
            default_cardinality: 10_000,
            cache_capacity_bytes: None,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefetch_count_key_only == 0 {
            return Err(ConfigError::ZeroPrefetch);
        }
        if self.default_cardinality == 0 {
            return Err(ConfigError::ZeroCardinality);
        }
        let threshold = self.selectivity_merge_threshold;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(ConfigError::InvalidSelectivityThreshold { value: threshold });
        }

        Ok(())
    }
}

///
/// TESTS
///
