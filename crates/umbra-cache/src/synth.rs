//! Synthesis path: rebuilding negative replies from cached proofs.
//!
//! Given a query that missed the main answer cache, find the covering
//! zone, assemble the NSEC or NSEC3 proof set for a name-error or
//! no-data answer, and emit a reply for the downstream validator to
//! re-verify. The index is consulted under the big lock, but every
//! RRset fetch happens with the lock released; proofs found expired on
//! the way are removed (under a re-acquired lock) and the search is
//! retried once.

use crate::error::{DlvOutcome, Result};
use crate::nsec3::{decode_hashed_label, hash_covered, Nsec3Hasher, Nsec3Params};
use crate::rrset::{CachedRrset, RrsetSource};
use crate::NegCache;
use tracing::{debug, trace};
use umbra_proto::rdata::NSEC;
use umbra_proto::{Name, Question, RData, RecordClass, RecordType, Reply, ResponseCode};

/// A completed proof: the response code it supports and the denial
/// RRsets backing it, keyed by owner for dedup and LRU touching.
struct Proof {
    rcode: ResponseCode,
    sets: Vec<(Name, CachedRrset)>,
}

impl Proof {
    fn new(rcode: ResponseCode) -> Self {
        Self {
            rcode,
            sets: Vec::new(),
        }
    }

    /// Adds a backing RRset unless one with the same owner is present.
    fn push(&mut self, owner: Name, set: CachedRrset) {
        if !self.sets.iter().any(|(o, _)| *o == owner) {
            self.sets.push((owner, set));
        }
    }
}

/// Result of probing the denial index for one target name.
enum Cover {
    /// An NSEC/NSEC3 owner equal to the target: the name exists.
    Exact { owner: Name, set: CachedRrset },
    /// A fresh record whose interval was verified to cover the target.
    Covered { owner: Name, set: CachedRrset },
}

/// True if `target` falls in the open interval `(owner, next)` of a
/// plain NSEC, treating the zone chain as circular.
fn nsec_covers(owner: &Name, next: &Name, target: &Name) -> bool {
    if owner == next {
        // A chain of one record covers everything but its owner.
        return target != owner;
    }
    if owner < next {
        owner < target && target < next
    } else {
        // Last record of the chain: next wraps to the apex.
        owner < target || target < next
    }
}

impl NegCache {
    /// Tries to synthesize a negative reply for a query.
    ///
    /// Returns `Ok(Some(reply))` with an NXDOMAIN or NODATA reply whose
    /// authority section carries the zone SOA and the backing denial
    /// records, `Ok(None)` when the cache holds no usable proof, and an
    /// error only when assembly itself fails. The reply must still pass
    /// the validator; this subsystem only guarantees it is *provable*,
    /// not that the zone has not changed since.
    pub fn get_message(
        &self,
        question: &Question,
        rrsets: &dyn RrsetSource,
        now: u64,
    ) -> Result<Option<Reply>> {
        let qname = question.qname.lowercased();
        let class = question.qclass;

        let Some((zone_name, nsec3)) = self.locate_zone(class, &qname) else {
            return Ok(None);
        };

        let proof = match nsec3 {
            None => self.prove_nsec(&qname, question.qtype, class, &zone_name, rrsets, now),
            Some(params) => self.prove_nsec3(&qname, class, &zone_name, params, rrsets, now),
        };
        let Some(proof) = proof else {
            return Ok(None);
        };

        // The zone SOA completes every negative authority section.
        let Some(soa) = self.fetch_fresh(rrsets, &zone_name, RecordType::SOA, class, now) else {
            trace!(zone = %zone_name, "zone SOA missing or expired, no synthesis");
            return Ok(None);
        };

        let mut reply = Reply::new(proof.rcode, question.clone());
        reply.add_authority_records(soa.rrset.to_records(soa.ttl_remaining));
        for (_, set) in &proof.sets {
            reply.add_authority_records(set.rrset.to_records(set.ttl_remaining));
        }

        // A served proof is a hot proof.
        {
            let mut store = self.store().lock();
            for (owner, _) in &proof.sets {
                store.touch_by_name(class, &zone_name, owner);
            }
        }

        debug!(qname = %qname, rcode = %reply.rcode(), "synthesized negative reply");
        Ok(Some(reply))
    }

    /// Answers "does `name` provably not exist under `class`" from the
    /// cache alone. Expired denials met along the way are removed.
    pub fn dlv_lookup(
        &self,
        name: &Name,
        class: RecordClass,
        rrsets: &dyn RrsetSource,
        now: u64,
    ) -> DlvOutcome {
        let qname = name.lowercased();
        let Some((zone_name, nsec3)) = self.locate_zone(class, &qname) else {
            return DlvOutcome::NoProof;
        };

        let proof = match nsec3 {
            None => self.prove_nsec(&qname, RecordType::DLV, class, &zone_name, rrsets, now),
            Some(params) => self.prove_nsec3(&qname, class, &zone_name, params, rrsets, now),
        };

        // Only a full name-error proof counts as absence.
        match proof {
            Some(p) if p.rcode.is_nxdomain() => DlvOutcome::ProvenAbsent,
            _ => DlvOutcome::NoProof,
        }
    }

    /// Deepest in-use zone covering `qname`, with its NSEC3 parameters.
    fn locate_zone(&self, class: RecordClass, qname: &Name) -> Option<(Name, Option<Nsec3Params>)> {
        let store = self.store().lock();
        let zone_id = store.closest_zone(class, qname)?;
        let zone = store.zone(zone_id);
        Some((zone.name.clone(), zone.nsec3.clone()))
    }

    // =========================================================================
    // Plain NSEC proofs
    // =========================================================================

    /// Builds a proof for a plain-NSEC zone: NODATA when the name
    /// exists with the type missing, NXDOMAIN (with wildcard denial)
    /// when the name is covered.
    fn prove_nsec(
        &self,
        qname: &Name,
        qtype: RecordType,
        class: RecordClass,
        zone_name: &Name,
        rrsets: &dyn RrsetSource,
        now: u64,
    ) -> Option<Proof> {
        let (cover, nsec) = self.probe_nsec(class, zone_name, qname, rrsets, now)?;

        match cover {
            Cover::Exact { owner, set } => {
                // The name exists; the bitmap decides whether we can
                // prove the type away. A CNAME or DNAME redirects the
                // query, so nothing can be synthesized from here.
                if nsec.has_type(qtype)
                    || nsec.has_type(RecordType::CNAME)
                    || nsec.has_type(RecordType::DNAME)
                {
                    return None;
                }
                let mut proof = Proof::new(ResponseCode::NoError);
                proof.push(owner, set);
                Some(proof)
            }
            Cover::Covered { owner, set } => {
                // A next name below qname makes qname an empty
                // non-terminal: it exists, so no name error.
                if nsec.next_name().is_strict_subdomain_of(qname) {
                    return None;
                }

                // Name error also needs the wildcard denied: the
                // closest encloser falls out of the covering record by
                // label arithmetic.
                let ce_labels = owner
                    .common_label_count(qname)
                    .max(nsec.next_name().common_label_count(qname));
                let ce = qname.ancestor(ce_labels)?;
                let wildcard = ce.prepend_wildcard().ok()?;

                let mut proof = Proof::new(ResponseCode::NXDomain);

                if nsec_covers(&owner, nsec.next_name(), &wildcard) {
                    proof.push(owner, set);
                } else {
                    proof.push(owner, set);
                    let (wc_cover, _) =
                        self.probe_nsec(class, zone_name, &wildcard, rrsets, now)?;
                    match wc_cover {
                        Cover::Exact { .. } => {
                            trace!(wildcard = %wildcard, "wildcard exists, no name-error proof");
                            return None;
                        }
                        Cover::Covered { owner, set } => proof.push(owner, set),
                    }
                }
                Some(proof)
            }
        }
    }

    /// Finds a fresh NSEC whose owner matches or whose interval covers
    /// `target`, retrying once after removing an expired denial.
    fn probe_nsec(
        &self,
        class: RecordClass,
        zone_name: &Name,
        target: &Name,
        rrsets: &dyn RrsetSource,
        now: u64,
    ) -> Option<(Cover, NSEC)> {
        for _attempt in 0..2 {
            let owner = {
                let store = self.store().lock();
                let zone_id = store.find_zone(class, zone_name)?;
                let node = store.covering_denial(zone_id, target)?;
                if node.nsec3_hashed {
                    return None;
                }
                node.name.clone()
            };

            let Some(set) =
                self.fetch_denial(rrsets, &owner, RecordType::NSEC, class, now, zone_name)
            else {
                continue; // denial removed, try the next candidate
            };
            let nsec = match set.rrset.first().and_then(RData::as_nsec) {
                Some(nsec) => nsec.clone(),
                None => return None,
            };

            if owner == *target {
                return Some((Cover::Exact { owner, set }, nsec));
            }
            if !nsec_covers(&owner, nsec.next_name(), target) {
                return None;
            }
            return Some((Cover::Covered { owner, set }, nsec));
        }
        None
    }

    // =========================================================================
    // NSEC3 proofs
    // =========================================================================

    /// Builds an NXDOMAIN proof for an NSEC3 zone: closest encloser,
    /// next closer and wildcard, per RFC 5155 Section 8.4.
    ///
    /// NSEC3 no-data is not synthesized; an exact hash match makes this
    /// decline instead.
    fn prove_nsec3(
        &self,
        qname: &Name,
        class: RecordClass,
        zone_name: &Name,
        params: Nsec3Params,
        rrsets: &dyn RrsetSource,
        now: u64,
    ) -> Option<Proof> {
        if !params.is_supported() || params.iterations > self.nsec3_max_iter() {
            return None;
        }
        let mut hasher = Nsec3Hasher::new(params.clone(), zone_name.clone());

        // Closest encloser: the deepest ancestor of qname whose hash
        // has a fresh, exactly matching NSEC3.
        let mut closest: Option<(Name, Name, CachedRrset)> = None;
        for labels in (zone_name.label_count()..qname.label_count()).rev() {
            let candidate = qname.ancestor(labels)?;
            let owner = hasher.hashed_owner(&candidate)?;

            let present = {
                let store = self.store().lock();
                let zone_id = store.find_zone(class, zone_name)?;
                store
                    .exact_denial(zone_id, &owner)
                    .is_some_and(|node| node.nsec3_hashed)
            };
            if !present {
                continue;
            }
            let Some(set) =
                self.fetch_denial(rrsets, &owner, RecordType::NSEC3, class, now, zone_name)
            else {
                continue;
            };
            if !self.nsec3_matches_params(&set, &params) {
                continue;
            }
            closest = Some((candidate, owner, set));
            break;
        }
        let (ce, ce_owner, ce_set) = closest?;

        // Next closer: the qname ancestor one label deeper than the
        // closest encloser; it must be covered, not present.
        let next_closer = qname.ancestor(ce.label_count() + 1)?;
        let (nc_owner, nc_set) =
            match self.probe_nsec3(class, zone_name, &mut hasher, &next_closer, &params, rrsets, now)? {
                Cover::Exact { .. } => {
                    trace!(name = %next_closer, "next closer exists, no name-error proof");
                    return None;
                }
                Cover::Covered { owner, set } => (owner, set),
            };

        // Wildcard at the closest encloser, also covered.
        let wildcard = ce.prepend_wildcard().ok()?;
        let (wc_owner, wc_set) =
            match self.probe_nsec3(class, zone_name, &mut hasher, &wildcard, &params, rrsets, now)? {
                Cover::Exact { .. } => {
                    trace!(wildcard = %wildcard, "wildcard exists, no name-error proof");
                    return None;
                }
                Cover::Covered { owner, set } => (owner, set),
            };

        let mut proof = Proof::new(ResponseCode::NXDomain);
        proof.push(ce_owner, ce_set);
        proof.push(nc_owner, nc_set);
        proof.push(wc_owner, wc_set);
        Some(proof)
    }

    /// Finds a fresh NSEC3 matching or covering the hash of `target`,
    /// retrying once after removing an expired denial.
    ///
    /// Covering records with the opt-out flag are rejected: an opt-out
    /// range may hide unsigned delegations and proves nothing.
    #[allow(clippy::too_many_arguments)]
    fn probe_nsec3(
        &self,
        class: RecordClass,
        zone_name: &Name,
        hasher: &mut Nsec3Hasher,
        target: &Name,
        params: &Nsec3Params,
        rrsets: &dyn RrsetSource,
        now: u64,
    ) -> Option<Cover> {
        let target_owner = hasher.hashed_owner(target)?;

        for _attempt in 0..2 {
            let owner = {
                let store = self.store().lock();
                let zone_id = store.find_zone(class, zone_name)?;
                let node = match store.covering_denial(zone_id, &target_owner) {
                    Some(node) => node,
                    // Hash order wraps: the chain's last record covers
                    // targets hashing before its first.
                    None => store.last_denial(zone_id)?,
                };
                if !node.nsec3_hashed {
                    return None;
                }
                node.name.clone()
            };

            let Some(set) =
                self.fetch_denial(rrsets, &owner, RecordType::NSEC3, class, now, zone_name)
            else {
                continue;
            };
            if !self.nsec3_matches_params(&set, params) {
                return None;
            }

            if owner == target_owner {
                return Some(Cover::Exact { owner, set });
            }

            let nsec3 = set.rrset.first().and_then(RData::as_nsec3)?;
            let owner_hash = decode_hashed_label(&owner)?;
            if !hash_covered(&owner_hash, nsec3.next_hashed(), hasher.hash(target)) {
                return None;
            }
            if nsec3.is_opt_out() {
                trace!(owner = %owner, "opt-out NSEC3 cannot prove nonexistence");
                return None;
            }
            return Some(Cover::Covered { owner, set });
        }
        None
    }

    /// True if an NSEC3 set was produced under the zone's parameters.
    fn nsec3_matches_params(&self, set: &CachedRrset, params: &Nsec3Params) -> bool {
        set.rrset
            .first()
            .and_then(RData::as_nsec3)
            .map(|n| {
                n.hash_algorithm() == params.algorithm
                    && n.iterations() == params.iterations
                    && n.salt() == params.salt.as_slice()
            })
            .unwrap_or(false)
    }

    // =========================================================================
    // RRset cache access (outside the big lock)
    // =========================================================================

    /// Fetches a fresh RRset; flags stale entries for the RRset cache.
    fn fetch_fresh(
        &self,
        rrsets: &dyn RrsetSource,
        owner: &Name,
        rtype: RecordType,
        class: RecordClass,
        now: u64,
    ) -> Option<CachedRrset> {
        match rrsets.lookup(owner, rtype, class, now) {
            Some(set) if set.is_fresh() && !set.rrset.is_empty() => Some(set),
            Some(_) => {
                rrsets.mark_expired(owner, rtype, class);
                None
            }
            None => None,
        }
    }

    /// Fetches the RRset backing a denial; on a miss the stale denial
    /// node is removed under a re-acquired lock.
    fn fetch_denial(
        &self,
        rrsets: &dyn RrsetSource,
        owner: &Name,
        rtype: RecordType,
        class: RecordClass,
        now: u64,
        zone_name: &Name,
    ) -> Option<CachedRrset> {
        match self.fetch_fresh(rrsets, owner, rtype, class, now) {
            Some(set) => Some(set),
            None => {
                debug!(owner = %owner, "denial expired, removing");
                self.store()
                    .lock()
                    .remove_denial_by_name(class, zone_name, owner);
                None
            }
        }
    }
}
