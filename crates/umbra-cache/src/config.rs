//! Negative cache configuration.

use serde::{Deserialize, Serialize};

/// Default byte budget for the negative cache (1 MiB).
const DEFAULT_NEG_CACHE_SIZE: usize = 1024 * 1024;

/// Configuration for the aggressive negative cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NegCacheConfig {
    /// Maximum memory the cache may account, in bytes.
    pub neg_cache_size: usize,

    /// Purge a zone's cached denials when its NSEC3 parameters change.
    pub harden_algo_downgrade: bool,

    /// Maximum NSEC3 iterations accepted, keyed by signing key size.
    ///
    /// Mirrors the resolver-wide `val-nsec3-keysize-iterations` option:
    /// pairs of (key size in bits, iteration cap). The cache itself
    /// applies the largest cap; records iterated harder than that are
    /// discarded on ingest.
    pub val_nsec3_keysize_iterations: Vec<(u32, u16)>,
}

impl Default for NegCacheConfig {
    fn default() -> Self {
        Self {
            neg_cache_size: DEFAULT_NEG_CACHE_SIZE,
            harden_algo_downgrade: true,
            // RFC 5155 Section 10.3 operational limits.
            val_nsec3_keysize_iterations: vec![(1024, 150), (2048, 500), (4096, 2500)],
        }
    }
}

impl NegCacheConfig {
    /// Returns the iteration cap applied by the cache: the largest
    /// value in the keysize table, or zero when the table is empty.
    pub fn max_nsec3_iterations(&self) -> u16 {
        self.val_nsec3_keysize_iterations
            .iter()
            .map(|&(_, iter)| iter)
            .max()
            .unwrap_or(0)
    }
}
