//! NSEC3 owner-name hashing (RFC 5155 Section 5).
//!
//! The hash is a pure function of `(name, salt, iterations)`:
//! `H(x) = SHA1(x || salt)` applied `iterations + 1` times to the
//! lowercased wire-format name. Hashed owner names place the base32hex
//! encoding of the digest as a single label directly under the zone
//! apex, which preserves hash order under canonical name comparison.

use bytes::BytesMut;
use data_encoding::BASE32_DNSSEC;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use umbra_proto::rdata::dnssec::NSEC3_HASH_SHA1;
use umbra_proto::Name;

/// NSEC3 parameters in force for a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nsec3Params {
    /// Hash algorithm number (only SHA-1 is defined).
    pub algorithm: u8,
    /// Extra hash iterations.
    pub iterations: u16,
    /// Salt appended to every hash round.
    pub salt: Vec<u8>,
}

impl Nsec3Params {
    /// Creates a parameter triple.
    pub fn new(algorithm: u8, iterations: u16, salt: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm,
            iterations,
            salt: salt.into(),
        }
    }

    /// Returns true if the hash algorithm is one we can compute.
    #[inline]
    pub fn is_supported(&self) -> bool {
        self.algorithm == NSEC3_HASH_SHA1
    }
}

/// Computes the NSEC3 hash of a name.
pub fn nsec3_hash(name: &Name, salt: &[u8], iterations: u16) -> Vec<u8> {
    let mut wire = BytesMut::new();
    name.lowercased().write_wire(&mut wire);

    let mut hasher = Sha1::new();
    hasher.update(&wire);
    hasher.update(salt);
    let mut hash = hasher.finalize();

    for _ in 0..iterations {
        let mut hasher = Sha1::new();
        hasher.update(hash);
        hasher.update(salt);
        hash = hasher.finalize();
    }

    hash.to_vec()
}

/// Per-query NSEC3 hashing context.
///
/// One denial lookup hashes several names against the same zone
/// (closest encloser candidates, next closer, wildcard); the digests
/// are memoized here so each name is hashed once.
pub struct Nsec3Hasher {
    params: Nsec3Params,
    apex: Name,
    memo: HashMap<Name, Vec<u8>>,
}

impl Nsec3Hasher {
    /// Creates a hashing context for a zone.
    pub fn new(params: Nsec3Params, apex: Name) -> Self {
        Self {
            params,
            apex,
            memo: HashMap::new(),
        }
    }

    /// Returns the raw hash of a name.
    pub fn hash(&mut self, name: &Name) -> &[u8] {
        if !self.memo.contains_key(name) {
            let digest = nsec3_hash(name, &self.params.salt, self.params.iterations);
            self.memo.insert(name.clone(), digest);
        }
        &self.memo[name]
    }

    /// Returns the hashed owner name: `base32hex(H(name)).apex`.
    ///
    /// Returns `None` if the resulting name would exceed the wire
    /// length limit (possible only under a near-maximal apex name).
    pub fn hashed_owner(&mut self, name: &Name) -> Option<Name> {
        let encoded = BASE32_DNSSEC.encode(self.hash(name));
        self.apex.prepend_label(encoded.as_bytes()).ok()
    }
}

/// Decodes the raw hash from the first label of a hashed owner name.
///
/// Returns `None` when the label is not valid base32hex.
pub fn decode_hashed_label(owner: &Name) -> Option<Vec<u8>> {
    let label = owner.labels().next()?;
    if label.is_root() {
        return None;
    }
    let folded: Vec<u8> = label
        .as_bytes()
        .iter()
        .map(u8::to_ascii_lowercase)
        .collect();
    BASE32_DNSSEC.decode(&folded).ok()
}

/// Returns true if `hash` falls in the open interval between an NSEC3
/// owner hash and its next hash, treating the chain as circular.
pub fn hash_covered(owner_hash: &[u8], next_hash: &[u8], hash: &[u8]) -> bool {
    if owner_hash == next_hash {
        // A chain of one: covers everything but the owner itself.
        return hash != owner_hash;
    }
    if owner_hash < next_hash {
        owner_hash < hash && hash < next_hash
    } else {
        // Wrap at the end of the hash space.
        owner_hash < hash || hash < next_hash
    }
}
