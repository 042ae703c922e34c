//! End-to-end tests for the negative cache: ingest validated replies
//! through the public API, then synthesize from them against a stub
//! RRset cache.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use umbra_cache::nsec3::{Nsec3Hasher, Nsec3Params};
use umbra_cache::{CachedRrset, DlvOutcome, NegCache, NegCacheConfig, RrsetSource};
use umbra_proto::rdata::{bitmap_from_types, NSEC, NSEC3, NSEC3PARAM, SOA};
use umbra_proto::{
    Name, Question, RData, RecordClass, RecordType, Reply, ResourceRecord, ResponseCode, Rrset,
};

// ============================================================================
// Test helpers
// ============================================================================

fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

fn a_type(t: RecordType) -> u16 {
    t.to_u16()
}

/// A stub RRset cache backed by a hash map with absolute expiry times.
#[derive(Default)]
struct StubRrsetCache {
    sets: Mutex<HashMap<(Name, RecordType), (Rrset, u64)>>,
    expiry_marks: Mutex<Vec<(Name, RecordType)>>,
}

impl StubRrsetCache {
    /// Stores an RRset; it expires `ttl` seconds after `stored_at`.
    fn store(&self, rrset: Rrset, stored_at: u64) {
        let expires = stored_at + u64::from(rrset.ttl());
        let key = (rrset.owner().lowercased(), rrset.rtype());
        self.sets.lock().unwrap().insert(key, (rrset, expires));
    }

    fn marks(&self) -> usize {
        self.expiry_marks.lock().unwrap().len()
    }
}

impl RrsetSource for StubRrsetCache {
    fn lookup(
        &self,
        owner: &Name,
        rtype: RecordType,
        _class: RecordClass,
        now: u64,
    ) -> Option<CachedRrset> {
        let sets = self.sets.lock().unwrap();
        let (rrset, expires) = sets.get(&(owner.lowercased(), rtype))?;
        Some(CachedRrset {
            rrset: rrset.clone(),
            ttl_remaining: expires.saturating_sub(now) as u32,
        })
    }

    fn mark_expired(&self, owner: &Name, rtype: RecordType, _class: RecordClass) {
        self.expiry_marks
            .lock()
            .unwrap()
            .push((owner.lowercased(), rtype));
    }
}

fn soa_rdata(zone: &str) -> SOA {
    SOA::new(
        name(&format!("ns1.{zone}")),
        name(&format!("hostmaster.{zone}")),
        2024010101,
        7200,
        3600,
        1209600,
        300,
    )
}

fn soa_record(zone: &str, ttl: u32) -> ResourceRecord {
    ResourceRecord::new(
        name(zone),
        RecordType::SOA,
        RecordClass::IN,
        ttl,
        RData::SOA(soa_rdata(zone)),
    )
}

fn soa_rrset(zone: &str, ttl: u32) -> Rrset {
    Rrset::new(name(zone), RecordType::SOA, RecordClass::IN, ttl).with_rdata(RData::SOA(soa_rdata(zone)))
}

fn nsec_record(owner: &str, next: &str, types: &[u16], ttl: u32) -> ResourceRecord {
    ResourceRecord::new(
        name(owner),
        RecordType::NSEC,
        RecordClass::IN,
        ttl,
        RData::NSEC(NSEC::new(name(next), bitmap_from_types(types))),
    )
}

fn nsec_rrset(owner: &str, next: &str, types: &[u16], ttl: u32) -> Rrset {
    Rrset::new(name(owner), RecordType::NSEC, RecordClass::IN, ttl)
        .with_rdata(RData::NSEC(NSEC::new(name(next), bitmap_from_types(types))))
}

/// A validated negative reply carrying an SOA plus denial records.
fn negative_reply(
    rcode: ResponseCode,
    qname: &str,
    qtype: RecordType,
    zone: &str,
    denials: Vec<ResourceRecord>,
) -> Reply {
    let question = Question::new(name(qname), qtype, RecordClass::IN);
    let mut reply = Reply::new(rcode, question);
    reply.add_authority(soa_record(zone, 300));
    for record in denials {
        reply.add_authority(record);
    }
    reply
}

fn question(qname: &str, qtype: RecordType) -> Question {
    Question::new(name(qname), qtype, RecordClass::IN)
}

/// NSEC owner names found in a reply's authority section.
fn authority_owners(reply: &Reply, rtype: RecordType) -> Vec<Name> {
    reply
        .authority_of_type(rtype)
        .map(|r| r.name().clone())
        .collect()
}

// ============================================================================
// Scenario 1: NXDOMAIN round-trip
// ============================================================================

#[test]
fn test_nxdomain_roundtrip_with_wildcard_proof() {
    let cache = NegCache::new(NegCacheConfig::default());
    let rrsets = StubRrsetCache::default();

    let qname_types = [a_type(RecordType::A), 46, 47];
    let apex_types = [2, 6, 46, 47]; // NS, SOA, RRSIG, NSEC

    let reply = negative_reply(
        ResponseCode::NXDomain,
        "bar.example.",
        RecordType::A,
        "example.",
        vec![
            nsec_record("a.example.", "c.example.", &qname_types, 300),
            nsec_record("example.", "z.example.", &apex_types, 300),
        ],
    );
    cache.add_reply(&reply);
    assert_eq!(cache.len(), 2);

    rrsets.store(nsec_rrset("a.example.", "c.example.", &qname_types, 300), 0);
    rrsets.store(nsec_rrset("example.", "z.example.", &apex_types, 300), 0);
    rrsets.store(soa_rrset("example.", 300), 0);

    let synthesized = cache
        .get_message(&question("bar.example.", RecordType::A), &rrsets, 0)
        .unwrap()
        .expect("proof should synthesize");

    assert_eq!(synthesized.rcode(), ResponseCode::NXDomain);
    assert!(synthesized.answer().is_empty());

    let soa_owners = authority_owners(&synthesized, RecordType::SOA);
    assert_eq!(soa_owners, vec![name("example.")]);

    let mut nsec_owners = authority_owners(&synthesized, RecordType::NSEC);
    nsec_owners.sort();
    assert_eq!(nsec_owners, vec![name("example."), name("a.example.")]);

    // TTLs never exceed the originals.
    assert!(synthesized.authority().iter().all(|r| r.ttl() <= 300));
}

#[test]
fn test_nxdomain_single_nsec_covering_wildcard_too() {
    // One NSEC from the apex across the whole zone covers both the
    // qname and the wildcard.
    let cache = NegCache::new(NegCacheConfig::default());
    let rrsets = StubRrsetCache::default();

    let apex_types = [2, 6, 46, 47];
    let reply = negative_reply(
        ResponseCode::NXDomain,
        "bar.example.",
        RecordType::A,
        "example.",
        vec![nsec_record("example.", "zz.example.", &apex_types, 120)],
    );
    cache.add_reply(&reply);

    rrsets.store(nsec_rrset("example.", "zz.example.", &apex_types, 120), 0);
    rrsets.store(soa_rrset("example.", 300), 0);

    let synthesized = cache
        .get_message(&question("bar.example.", RecordType::A), &rrsets, 0)
        .unwrap()
        .expect("apex NSEC alone should prove the name error");

    assert_eq!(synthesized.rcode(), ResponseCode::NXDomain);
    // The NSEC appears once even though it backs two proofs.
    assert_eq!(authority_owners(&synthesized, RecordType::NSEC).len(), 1);
}

// ============================================================================
// Scenario 2: NODATA from an exact NSEC match
// ============================================================================

#[test]
fn test_nodata_from_exact_nsec() {
    let cache = NegCache::new(NegCacheConfig::default());
    let rrsets = StubRrsetCache::default();

    let www_types = [a_type(RecordType::A), 46, 47];
    let reply = negative_reply(
        ResponseCode::NoError,
        "www.example.",
        RecordType::AAAA,
        "example.",
        vec![nsec_record("www.example.", "x.example.", &www_types, 300)],
    );
    cache.add_reply(&reply);

    rrsets.store(nsec_rrset("www.example.", "x.example.", &www_types, 300), 0);
    rrsets.store(soa_rrset("example.", 300), 0);

    // AAAA is absent from the bitmap: NODATA synthesizes.
    let synthesized = cache
        .get_message(&question("www.example.", RecordType::AAAA), &rrsets, 0)
        .unwrap()
        .expect("NODATA proof should synthesize");
    assert_eq!(synthesized.rcode(), ResponseCode::NoError);
    assert!(synthesized.answer().is_empty());
    assert_eq!(
        authority_owners(&synthesized, RecordType::NSEC),
        vec![name("www.example.")]
    );
    assert_eq!(
        authority_owners(&synthesized, RecordType::SOA),
        vec![name("example.")]
    );

    // A is present in the bitmap: no proof.
    let denied = cache
        .get_message(&question("www.example.", RecordType::A), &rrsets, 0)
        .unwrap();
    assert!(denied.is_none());
}

#[test]
fn test_nodata_declines_on_cname_bit() {
    let cache = NegCache::new(NegCacheConfig::default());
    let rrsets = StubRrsetCache::default();

    let types = [a_type(RecordType::CNAME), 46, 47];
    let reply = negative_reply(
        ResponseCode::NoError,
        "alias.example.",
        RecordType::AAAA,
        "example.",
        vec![nsec_record("alias.example.", "b.example.", &types, 300)],
    );
    cache.add_reply(&reply);

    rrsets.store(nsec_rrset("alias.example.", "b.example.", &types, 300), 0);
    rrsets.store(soa_rrset("example.", 300), 0);

    // A CNAME redirects the query; nothing can be synthesized.
    let result = cache
        .get_message(&question("alias.example.", RecordType::AAAA), &rrsets, 0)
        .unwrap();
    assert!(result.is_none());
}

// ============================================================================
// Scenario 3: byte budget and LRU eviction
// ============================================================================

#[test]
fn test_eviction_is_lru_under_byte_cap() {
    let config = NegCacheConfig {
        neg_cache_size: 4096,
        ..Default::default()
    };
    let cache = NegCache::new(config);
    let rrsets = StubRrsetCache::default();
    let types = [a_type(RecordType::A), 46, 47];

    let total = 40;
    for i in 0..total {
        let owner = format!("host{i:03}.example.");
        let next = format!("host{:03}.example.", i + 1);
        let reply = negative_reply(
            ResponseCode::NoError,
            &owner,
            RecordType::AAAA,
            "example.",
            vec![nsec_record(&owner, &next, &types, 300)],
        );
        cache.add_reply(&reply);
        rrsets.store(nsec_rrset(&owner, &next, &types, 300), 0);
        assert!(cache.memory_in_use() <= 4096, "byte cap violated");
    }
    rrsets.store(soa_rrset("example.", 300), 0);

    let survivors = cache.len();
    assert!(survivors > 0 && survivors < total, "expected partial eviction");

    // The most recently inserted denial must still prove NODATA...
    let last = format!("host{:03}.example.", total - 1);
    let fresh = cache
        .get_message(&question(&last, RecordType::AAAA), &rrsets, 0)
        .unwrap();
    assert!(fresh.is_some(), "most recent denial was evicted");

    // ...while the least recently used one is gone.
    let evicted = cache
        .get_message(&question("host000.example.", RecordType::AAAA), &rrsets, 0)
        .unwrap();
    assert!(evicted.is_none(), "least recent denial still present");
}

// ============================================================================
// Scenario 4: NSEC3 iteration policy
// ============================================================================

fn nsec3_params_10() -> Nsec3Params {
    Nsec3Params::new(1, 10, vec![0xAA, 0xBB])
}

fn hashed_owner(params: &Nsec3Params, zone: &str, target: &str) -> Name {
    let mut hasher = Nsec3Hasher::new(params.clone(), name(zone));
    hasher.hashed_owner(&name(target)).unwrap()
}

fn raw_hash(params: &Nsec3Params, target: &str) -> Vec<u8> {
    let mut hasher = Nsec3Hasher::new(params.clone(), Name::root());
    hasher.hash(&name(target)).to_vec()
}

fn nsec3param_record(zone: &str, iterations: u16) -> ResourceRecord {
    ResourceRecord::new(
        name(zone),
        RecordType::NSEC3PARAM,
        RecordClass::IN,
        300,
        RData::NSEC3PARAM(NSEC3PARAM::new(1, 0, iterations, vec![0xAA, 0xBB])),
    )
}

#[test]
fn test_nsec3_iterations_over_cap_are_dropped() {
    let config = NegCacheConfig {
        val_nsec3_keysize_iterations: vec![(1024, 100)],
        ..Default::default()
    };
    let cache = NegCache::new(config);
    let params = nsec3_params_10();

    // First ingest: parameters (1, 10, aabb), within policy.
    let owner = hashed_owner(&params, "zone.", "gone.zone.");
    let own_hash = raw_hash(&params, "gone.zone.");
    let nsec3 = ResourceRecord::new(
        owner.clone(),
        RecordType::NSEC3,
        RecordClass::IN,
        300,
        RData::NSEC3(NSEC3::new(
            1,
            0,
            10,
            vec![0xAA, 0xBB],
            own_hash,
            bitmap_from_types(&[2, 6]),
        )),
    );
    let mut reply = negative_reply(
        ResponseCode::NXDomain,
        "missing.zone.",
        RecordType::A,
        "zone.",
        vec![nsec3],
    );
    reply.add_authority(nsec3param_record("zone.", 10));
    cache.add_reply(&reply);

    assert_eq!(cache.len(), 1);
    let memory_before = cache.memory_in_use();

    // Second ingest: 150 iterations against a cap of 100. Dropped
    // silently; existing entries remain.
    let mut over_cap = negative_reply(
        ResponseCode::NXDomain,
        "other.zone.",
        RecordType::A,
        "zone.",
        Vec::new(),
    );
    over_cap.add_authority(nsec3param_record("zone.", 150));
    cache.add_reply(&over_cap);

    assert_eq!(cache.len(), 1, "existing entries must remain");
    assert_eq!(cache.memory_in_use(), memory_before);
}

// ============================================================================
// NSEC3 synthesis
// ============================================================================

/// Builds an NSEC3 zone whose single record owns the apex hash and
/// chains to itself, covering every other hash.
fn single_nsec3_zone(
    cache: &NegCache,
    rrsets: &StubRrsetCache,
    zone: &str,
    opt_out: bool,
) -> Name {
    let params = nsec3_params_10();
    let apex_owner = hashed_owner(&params, zone, zone);
    let apex_hash = raw_hash(&params, zone);

    let flags = if opt_out { NSEC3::FLAG_OPT_OUT } else { 0 };
    let rdata = NSEC3::new(
        1,
        flags,
        10,
        vec![0xAA, 0xBB],
        apex_hash,
        bitmap_from_types(&[2, 6, 46]),
    );

    let record = ResourceRecord::new(
        apex_owner.clone(),
        RecordType::NSEC3,
        RecordClass::IN,
        300,
        RData::NSEC3(rdata.clone()),
    );
    let reply = negative_reply(
        ResponseCode::NXDomain,
        &format!("missing.{zone}"),
        RecordType::A,
        zone,
        vec![record],
    );
    cache.add_reply(&reply);

    rrsets.store(
        Rrset::new(apex_owner.clone(), RecordType::NSEC3, RecordClass::IN, 300)
            .with_rdata(RData::NSEC3(rdata)),
        0,
    );
    rrsets.store(soa_rrset(zone, 300), 0);
    apex_owner
}

#[test]
fn test_nsec3_nxdomain_three_proofs_from_one_record() {
    let cache = NegCache::new(NegCacheConfig::default());
    let rrsets = StubRrsetCache::default();
    single_nsec3_zone(&cache, &rrsets, "nzone.", false);

    let synthesized = cache
        .get_message(&question("missing.nzone.", RecordType::A), &rrsets, 0)
        .unwrap()
        .expect("NSEC3 name error should synthesize");

    assert_eq!(synthesized.rcode(), ResponseCode::NXDomain);
    // Closest encloser, next closer and wildcard proofs all collapse
    // onto the single record; it must appear only once.
    assert_eq!(authority_owners(&synthesized, RecordType::NSEC3).len(), 1);
    assert_eq!(
        authority_owners(&synthesized, RecordType::SOA),
        vec![name("nzone.")]
    );
}

#[test]
fn test_nsec3_opt_out_does_not_prove() {
    let cache = NegCache::new(NegCacheConfig::default());
    let rrsets = StubRrsetCache::default();
    single_nsec3_zone(&cache, &rrsets, "ozone.", true);

    let result = cache
        .get_message(&question("missing.ozone.", RecordType::A), &rrsets, 0)
        .unwrap();
    assert!(result.is_none(), "opt-out ranges must not synthesize");
}

// ============================================================================
// Scenario 5: expiry purges denials
// ============================================================================

#[test]
fn test_expired_denial_is_removed_on_synthesis() {
    let cache = NegCache::new(NegCacheConfig::default());
    let rrsets = StubRrsetCache::default();
    let types = [a_type(RecordType::A), 46, 47];

    let reply = negative_reply(
        ResponseCode::NXDomain,
        "aa.zone.",
        RecordType::A,
        "zone.",
        vec![nsec_record("a.zone.", "b.zone.", &types, 10)],
    );
    cache.add_reply(&reply);
    assert_eq!(cache.len(), 1);
    let memory_with_denial = cache.memory_in_use();

    // NSEC stored at time 0 with TTL 10; queried at time 20.
    rrsets.store(nsec_rrset("a.zone.", "b.zone.", &types, 10), 0);
    rrsets.store(soa_rrset("zone.", 300), 0);

    let result = cache
        .get_message(&question("aa.zone.", RecordType::A), &rrsets, 20)
        .unwrap();
    assert!(result.is_none(), "expired proof must not synthesize");
    assert_eq!(cache.len(), 0, "expired denial must be removed");
    assert!(cache.memory_in_use() < memory_with_denial);
    assert!(rrsets.marks() > 0, "stale rrset should be flagged");
}

// ============================================================================
// Scenario 6: removal keeps neighbors intact
// ============================================================================

#[test]
fn test_removing_middle_denial_keeps_neighbors() {
    let cache = NegCache::new(NegCacheConfig::default());
    let rrsets = StubRrsetCache::default();
    let apex_types = [2, 6, 46, 47];
    let types = [a_type(RecordType::A), 46, 47];

    let reply = negative_reply(
        ResponseCode::NXDomain,
        "c.zone.",
        RecordType::A,
        "zone.",
        vec![
            nsec_record("zone.", "b.zone.", &apex_types, 300),
            nsec_record("b.zone.", "d.zone.", &types, 300),
            nsec_record("d.zone.", "f.zone.", &types, 300),
            nsec_record("f.zone.", "zone.", &types, 300),
        ],
    );
    cache.add_reply(&reply);
    assert_eq!(cache.len(), 4);

    // Everything except d's NSEC is fresh in the RRset cache.
    rrsets.store(nsec_rrset("zone.", "b.zone.", &apex_types, 300), 0);
    rrsets.store(nsec_rrset("b.zone.", "d.zone.", &types, 300), 0);
    rrsets.store(nsec_rrset("f.zone.", "zone.", &types, 300), 0);
    rrsets.store(soa_rrset("zone.", 300), 0);

    // A query landing between d and f trips over the missing rrset;
    // the denial is dropped and no proof results.
    let result = cache
        .get_message(&question("e.zone.", RecordType::A), &rrsets, 0)
        .unwrap();
    assert!(result.is_none());
    assert_eq!(cache.len(), 3, "only d's denial should be gone");

    // The neighbors still prove their own intervals.
    let synthesized = cache
        .get_message(&question("c.zone.", RecordType::A), &rrsets, 0)
        .unwrap()
        .expect("b's interval still proves c");
    assert_eq!(synthesized.rcode(), ResponseCode::NXDomain);
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_ingest_is_idempotent() {
    let cache = NegCache::new(NegCacheConfig::default());
    let types = [a_type(RecordType::A), 46, 47];

    let reply = negative_reply(
        ResponseCode::NXDomain,
        "bar.example.",
        RecordType::A,
        "example.",
        vec![
            nsec_record("a.example.", "c.example.", &types, 300),
            nsec_record("example.", "z.example.", &[2, 6, 46, 47], 300),
        ],
    );

    cache.add_reply(&reply);
    let len = cache.len();
    let memory = cache.memory_in_use();

    cache.add_reply(&reply);
    assert_eq!(cache.len(), len);
    assert_eq!(cache.memory_in_use(), memory);
}

// ============================================================================
// Ingest edge cases
// ============================================================================

#[test]
fn test_reply_without_soa_is_ignored() {
    let cache = NegCache::new(NegCacheConfig::default());
    let types = [a_type(RecordType::A), 46, 47];

    let question = Question::new(name("x.example."), RecordType::A, RecordClass::IN);
    let mut reply = Reply::new(ResponseCode::NXDomain, question);
    reply.add_authority(nsec_record("a.example.", "c.example.", &types, 300));

    cache.add_reply(&reply);
    assert!(cache.is_empty());
}

#[test]
fn test_records_outside_zone_are_skipped() {
    let cache = NegCache::new(NegCacheConfig::default());
    let types = [a_type(RecordType::A), 46, 47];

    let reply = negative_reply(
        ResponseCode::NXDomain,
        "bar.example.",
        RecordType::A,
        "example.",
        vec![
            nsec_record("a.example.", "c.example.", &types, 300),
            // Not below example.: must be ignored.
            nsec_record("a.other.", "c.other.", &types, 300),
        ],
    );
    cache.add_reply(&reply);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_apex_nsec_without_soa_bit_is_skipped() {
    let cache = NegCache::new(NegCacheConfig::default());

    // Parent-side NSEC at the apex name: NS but no SOA.
    let reply = negative_reply(
        ResponseCode::NXDomain,
        "bar.example.",
        RecordType::A,
        "example.",
        vec![nsec_record("example.", "z.example.", &[2, 43, 46, 47], 300)],
    );
    cache.add_reply(&reply);
    assert!(cache.is_empty());
}

#[test]
fn test_referral_uses_bailiwick_zone() {
    let cache = NegCache::new(NegCacheConfig::default());
    let types = [2, 46, 47];

    let question = Question::new(name("www.child.example."), RecordType::A, RecordClass::IN);
    let mut referral = Reply::new(ResponseCode::NoError, question);
    referral.add_authority(nsec_record("child.example.", "child0.example.", &types, 300));

    cache.add_referral(&referral, &name("example."));
    assert_eq!(cache.len(), 1);
}

// ============================================================================
// DLV-style probe
// ============================================================================

#[test]
fn test_dlv_lookup_proves_absence() {
    let cache = NegCache::new(NegCacheConfig::default());
    let rrsets = StubRrsetCache::default();
    let types = [a_type(RecordType::A), 46, 47];
    let apex_types = [2, 6, 46, 47];

    let reply = negative_reply(
        ResponseCode::NXDomain,
        "bar.example.",
        RecordType::A,
        "example.",
        vec![
            nsec_record("a.example.", "c.example.", &types, 300),
            nsec_record("example.", "z.example.", &apex_types, 300),
        ],
    );
    cache.add_reply(&reply);

    rrsets.store(nsec_rrset("a.example.", "c.example.", &types, 300), 0);
    rrsets.store(nsec_rrset("example.", "z.example.", &apex_types, 300), 0);
    rrsets.store(soa_rrset("example.", 300), 0);

    assert_eq!(
        cache.dlv_lookup(&name("bar.example."), RecordClass::IN, &rrsets, 0),
        DlvOutcome::ProvenAbsent
    );

    // An existing name is not proven absent.
    assert_eq!(
        cache.dlv_lookup(&name("a.example."), RecordClass::IN, &rrsets, 0),
        DlvOutcome::NoProof
    );

    // Unknown territory: no proof either way.
    assert_eq!(
        cache.dlv_lookup(&name("nowhere.else."), RecordClass::IN, &rrsets, 0),
        DlvOutcome::NoProof
    );
}

#[test]
fn test_dlv_lookup_removes_expired_denials() {
    let cache = NegCache::new(NegCacheConfig::default());
    let rrsets = StubRrsetCache::default();
    let types = [a_type(RecordType::A), 46, 47];

    let reply = negative_reply(
        ResponseCode::NXDomain,
        "bar.example.",
        RecordType::A,
        "example.",
        vec![nsec_record("a.example.", "c.example.", &types, 10)],
    );
    cache.add_reply(&reply);
    rrsets.store(nsec_rrset("a.example.", "c.example.", &types, 10), 0);

    // Probe long after expiry.
    assert_eq!(
        cache.dlv_lookup(&name("bar.example."), RecordClass::IN, &rrsets, 100),
        DlvOutcome::NoProof
    );
    assert!(cache.is_empty());
}

// ============================================================================
// Concurrency smoke test
// ============================================================================

#[test]
fn test_concurrent_ingest_and_synthesis() {
    let cache = Arc::new(NegCache::new(NegCacheConfig {
        neg_cache_size: 64 * 1024,
        ..Default::default()
    }));
    let rrsets = Arc::new(StubRrsetCache::default());
    let types = [a_type(RecordType::A), 46, 47];

    rrsets.store(soa_rrset("example.", 300), 0);
    for i in 0..64 {
        let owner = format!("w{i:02}.example.");
        let next = format!("w{i:02}a.example.");
        rrsets.store(nsec_rrset(&owner, &next, &types, 300), 0);
    }

    let mut handles = Vec::new();
    for t in 0..4 {
        let cache = Arc::clone(&cache);
        let rrsets = Arc::clone(&rrsets);
        handles.push(std::thread::spawn(move || {
            for i in 0..64 {
                let owner = format!("w{i:02}.example.");
                let next = format!("w{i:02}a.example.");
                if t % 2 == 0 {
                    let reply = negative_reply(
                        ResponseCode::NoError,
                        &owner,
                        RecordType::AAAA,
                        "example.",
                        vec![nsec_record(&owner, &next, &types, 300)],
                    );
                    cache.add_reply(&reply);
                } else {
                    let _ = cache
                        .get_message(&question(&owner, RecordType::AAAA), rrsets.as_ref(), 0)
                        .unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(cache.memory_in_use() <= 64 * 1024);
}

// ============================================================================
// Missing SOA blocks synthesis
// ============================================================================

#[test]
fn test_missing_soa_yields_no_proof() {
    let cache = NegCache::new(NegCacheConfig::default());
    let rrsets = StubRrsetCache::default();
    let types = [a_type(RecordType::A), 46, 47];
    let apex_types = [2, 6, 46, 47];

    let reply = negative_reply(
        ResponseCode::NXDomain,
        "bar.example.",
        RecordType::A,
        "example.",
        vec![
            nsec_record("a.example.", "c.example.", &types, 300),
            nsec_record("example.", "z.example.", &apex_types, 300),
        ],
    );
    cache.add_reply(&reply);

    rrsets.store(nsec_rrset("a.example.", "c.example.", &types, 300), 0);
    rrsets.store(nsec_rrset("example.", "z.example.", &apex_types, 300), 0);
    // No SOA stored.

    let result = cache
        .get_message(&question("bar.example.", RecordType::A), &rrsets, 0)
        .unwrap();
    assert!(result.is_none());

    // The denials themselves are untouched; only the SOA was missing.
    assert_eq!(cache.len(), 2);
}
