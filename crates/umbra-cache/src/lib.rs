//! # Umbra Aggressive Negative Cache
//!
//! An aggressive DNSSEC negative cache for a validating recursive
//! resolver (RFC 8198). It remembers the NSEC and NSEC3 records of
//! validated replies — as an *index* of owner names pointing into the
//! resolver's RRset cache — and synthesizes new, provable NXDOMAIN and
//! NODATA replies from them without asking authoritative servers again.
//!
//! ## Architecture
//!
//! - **Zone index**: canonically ordered zones keyed by (name, class),
//!   linked parent-to-child by DNS label containment
//! - **Denial index**: per zone, a canonically ordered set of NSEC/NSEC3
//!   owner names with interior placeholder nodes so lookups, inserts and
//!   deletes stay logarithmic
//! - **LRU governor**: one process-wide recency list over all in-use
//!   denials, evicting against a byte budget
//! - **Ingest**: [`NegCache::add_reply`] / [`NegCache::add_referral`]
//!   file the denials of an already-validated reply, best effort
//! - **Synthesis**: [`NegCache::get_message`] rebuilds a negative reply
//!   for a query from cached proofs; the caller revalidates it
//!
//! The whole structure sits behind one coarse mutex. Operations are
//! logarithmic and never block on I/O while holding it; RRset fetches
//! during synthesis happen with the lock released.
//!
//! ## Example
//!
//! ```rust,ignore
//! use umbra_cache::{NegCache, NegCacheConfig};
//!
//! let cache = NegCache::new(NegCacheConfig::default());
//! cache.add_reply(&validated_reply);
//!
//! if let Some(reply) = cache.get_message(&question, &rrset_cache, now)? {
//!     // hand to the validator, then to the client
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod nsec3;
pub mod rrset;

mod ingest;
mod store;
mod synth;

pub use config::NegCacheConfig;
pub use error::{CacheError, DlvOutcome, Result};
pub use rrset::{CachedRrset, RrsetSource};

use parking_lot::Mutex;
use store::Store;

/// The aggressive negative cache.
///
/// Shared between resolver worker threads; all methods take `&self`
/// and are safe to call concurrently. Dropping the cache releases
/// everything — there is no separate destroy step, but no other thread
/// may still hold a reference by then, which `Drop` guarantees.
///
/// The cache can lag reality: zone content changes are not observed
/// until the old proofs expire, which is why every synthesized reply is
/// revalidated downstream.
pub struct NegCache {
    /// The big lock over zones, denials, LRU and byte counter.
    store: Mutex<Store>,
    /// Largest NSEC3 iteration count accepted.
    nsec3_max_iter: u16,
    /// Purge a zone's denials when its NSEC3 parameters change.
    harden_algo_downgrade: bool,
}

impl NegCache {
    /// Creates a negative cache from configuration.
    pub fn new(config: NegCacheConfig) -> Self {
        Self {
            store: Mutex::new(Store::new(config.neg_cache_size)),
            nsec3_max_iter: config.max_nsec3_iterations(),
            harden_algo_downgrade: config.harden_algo_downgrade,
        }
    }

    /// Bytes currently accounted against the configured budget.
    pub fn memory_in_use(&self) -> usize {
        self.store.lock().memory_in_use()
    }

    /// Number of denials currently usable for synthesis.
    pub fn len(&self) -> usize {
        self.store.lock().denial_count()
    }

    /// Returns true if no denials are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn store(&self) -> &Mutex<Store> {
        &self.store
    }

    pub(crate) fn nsec3_max_iter(&self) -> u16 {
        self.nsec3_max_iter
    }

    pub(crate) fn harden_algo_downgrade(&self) -> bool {
        self.harden_algo_downgrade
    }
}
