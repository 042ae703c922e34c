//! Collaborator contract with the external RRset cache.
//!
//! The negative cache stores only an index of NSEC owner names; the
//! record bodies live in the resolver's RRset cache. During synthesis
//! the index is consulted under the cache lock, but RRset fetches go
//! through this trait *without* the lock held — the RRset cache has its
//! own synchronization.

use umbra_proto::{Name, RecordClass, RecordType, Rrset};

/// A fetched RRset together with how long it remains valid.
#[derive(Debug, Clone)]
pub struct CachedRrset {
    /// The record set.
    pub rrset: Rrset,
    /// Seconds of TTL remaining at the time of the lookup.
    ///
    /// Zero means the set expired exactly now and must not be used.
    pub ttl_remaining: u32,
}

impl CachedRrset {
    /// Returns true if the set can still back a proof.
    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.ttl_remaining > 0
    }
}

/// Read access to the resolver's RRset cache.
///
/// Implementations are internally synchronized; the negative cache
/// calls these methods with no lock of its own held.
pub trait RrsetSource {
    /// Looks up the RRset for `(owner, rtype, class)`.
    ///
    /// Returns `None` when the set is absent. An implementation may
    /// also return a set with zero remaining TTL; callers treat that
    /// as expired.
    fn lookup(
        &self,
        owner: &Name,
        rtype: RecordType,
        class: RecordClass,
        now: u64,
    ) -> Option<CachedRrset>;

    /// Flags an entry this subsystem found expired, so the RRset cache
    /// can drop it early. Purely advisory.
    fn mark_expired(&self, owner: &Name, rtype: RecordType, class: RecordClass);
}
