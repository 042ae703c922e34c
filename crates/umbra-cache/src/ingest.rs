//! Ingest path: filing the denials of validated replies.
//!
//! Ingest is fire-and-forget. Anything unusable — a reply whose zone
//! cannot be determined, records outside the zone, NSEC3 parameters
//! over the policy cap — is skipped with a debug log and no state
//! change. The caller never learns about it; worst case the cache just
//! stays colder than it could be.

use crate::nsec3::Nsec3Params;
use crate::NegCache;
use tracing::{debug, trace};
use umbra_proto::rdata::dnssec::NSEC3_HASH_SHA1;
use umbra_proto::{Name, RData, RecordClass, RecordType, Reply};

impl NegCache {
    /// Files the NSEC/NSEC3 records of a validated reply.
    ///
    /// The zone is derived from the SOA in the authority section;
    /// replies without one are ignored.
    pub fn add_reply(&self, reply: &Reply) {
        let Some(soa) = reply.authority_soa() else {
            trace!("reply without SOA, cannot determine zone");
            return;
        };
        let zone_name = soa.name().lowercased();
        let class = soa.rclass();
        self.ingest(reply, &zone_name, class);
    }

    /// Files the NSEC/NSEC3 records of a validated referral.
    ///
    /// Referrals carry no SOA; the caller supplies the bailiwick the
    /// referral is authoritative for.
    pub fn add_referral(&self, reply: &Reply, bailiwick: &Name) {
        let Some(class) = reply
            .authority()
            .iter()
            .find(|r| r.rtype().is_denial())
            .map(|r| r.rclass())
        else {
            trace!(bailiwick = %bailiwick, "referral without denial records");
            return;
        };
        self.ingest(reply, &bailiwick.lowercased(), class);
    }

    fn ingest(&self, reply: &Reply, zone_name: &Name, class: RecordClass) {
        let params = match self.reply_nsec3_params(reply, zone_name) {
            Ok(params) => params,
            Err(()) => return, // over policy caps, drop the whole reply
        };

        let mut store = self.store().lock();

        let mut inserted = 0usize;
        for record in reply.authority() {
            if record.rclass() != class || !record.name().is_subdomain_of(zone_name) {
                continue;
            }
            match record.rdata() {
                RData::NSEC(nsec) => {
                    // An NSEC at the apex must carry the SOA bit; one
                    // without it belongs to a parent-side delegation
                    // and proves nothing inside this zone.
                    if record.name() == zone_name && !nsec.has_type(RecordType::SOA) {
                        debug!(owner = %record.name(), "apex NSEC without SOA bit, skipped");
                        continue;
                    }
                    // Re-resolve every time: filing a denial can evict
                    // past the byte budget and collapse the zone under
                    // our feet.
                    let zone_id = store.ensure_zone(
                        class,
                        zone_name,
                        params.clone(),
                        self.harden_algo_downgrade(),
                    );
                    store.insert_denial(zone_id, record.name(), false);
                    inserted += 1;
                }
                RData::NSEC3(nsec3) => {
                    if nsec3.hash_algorithm() != NSEC3_HASH_SHA1 {
                        debug!(
                            algorithm = nsec3.hash_algorithm(),
                            "unsupported NSEC3 hash algorithm, skipped"
                        );
                        continue;
                    }
                    if nsec3.iterations() > self.nsec3_max_iter() {
                        debug!(
                            iterations = nsec3.iterations(),
                            "NSEC3 iterations over policy cap, skipped"
                        );
                        continue;
                    }
                    // Hashed owners sit directly under the apex.
                    if !record.name().is_strict_subdomain_of(zone_name) {
                        continue;
                    }
                    let zone_id = store.ensure_zone(
                        class,
                        zone_name,
                        params.clone(),
                        self.harden_algo_downgrade(),
                    );
                    let record_params = Nsec3Params::new(
                        nsec3.hash_algorithm(),
                        nsec3.iterations(),
                        nsec3.salt(),
                    );
                    if store.zone(zone_id).nsec3.as_ref() != Some(&record_params) {
                        debug!(owner = %record.name(), "NSEC3 parameters disagree with zone, skipped");
                        continue;
                    }
                    store.insert_denial(zone_id, record.name(), true);
                    inserted += 1;
                }
                _ => {}
            }
        }

        if inserted > 0 {
            trace!(zone = %zone_name, inserted, "denials filed");
        } else {
            // A zone materialized for records that all fell to the
            // checks above must not linger empty.
            store.drop_zone_if_empty(class, zone_name);
        }
    }

    /// Extracts the NSEC3 parameter triple governing a reply's zone.
    ///
    /// Prefers an NSEC3PARAM set at the apex; falls back to the triple
    /// carried by the first usable NSEC3 record. `Err` means the reply
    /// demands more work than policy allows and must be dropped whole.
    fn reply_nsec3_params(
        &self,
        reply: &Reply,
        zone_name: &Name,
    ) -> std::result::Result<Option<Nsec3Params>, ()> {
        let from_param = reply
            .answer()
            .iter()
            .chain(reply.authority())
            .filter(|r| r.name() == zone_name)
            .find_map(|r| r.rdata().as_nsec3param())
            .map(|p| Nsec3Params::new(p.hash_algorithm(), p.iterations(), p.salt()));

        let params = from_param.or_else(|| {
            reply
                .authority()
                .iter()
                .find_map(|r| r.rdata().as_nsec3())
                .map(|n| Nsec3Params::new(n.hash_algorithm(), n.iterations(), n.salt()))
        });

        match params {
            Some(p) if !p.is_supported() => {
                debug!(algorithm = p.algorithm, "unsupported NSEC3 algorithm, reply dropped");
                Err(())
            }
            Some(p) if p.iterations > self.nsec3_max_iter() => {
                debug!(
                    iterations = p.iterations,
                    cap = self.nsec3_max_iter(),
                    "NSEC3 iterations over policy cap, reply dropped"
                );
                Err(())
            }
            other => Ok(other),
        }
    }
}
