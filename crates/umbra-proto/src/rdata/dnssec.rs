//! DNSSEC record types used in denial proofs (RRSIG, NSEC, NSEC3,
//! NSEC3PARAM).

use super::{bitmap_has_type, bitmap_types};
use crate::error::{Error, Result};
use crate::name::Name;
use crate::rtype::RecordType;
use bytes::BytesMut;
use data_encoding::{BASE32_DNSSEC, HEXLOWER};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The NSEC3 hash algorithm number for SHA-1, the only one defined
/// (RFC 5155 Section 11).
pub const NSEC3_HASH_SHA1: u8 = 1;

/// RRSIG record - DNSSEC Signature (RFC 4034).
///
/// Carried alongside the NSEC/NSEC3 RRsets copied into synthesized
/// replies so the downstream validator can re-verify them. The cache
/// never checks signatures itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RRSIG {
    /// Type covered by this signature.
    type_covered: u16,
    /// Algorithm number.
    algorithm: u8,
    /// Labels in the original owner name.
    labels: u8,
    /// Original TTL.
    original_ttl: u32,
    /// Signature expiration (Unix timestamp).
    expiration: u32,
    /// Signature inception (Unix timestamp).
    inception: u32,
    /// Key tag of the signing key.
    key_tag: u16,
    /// Signer's name.
    signer: Name,
    /// Signature bytes.
    signature: Vec<u8>,
}

impl RRSIG {
    /// Creates a new RRSIG record.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        type_covered: u16,
        algorithm: u8,
        labels: u8,
        original_ttl: u32,
        expiration: u32,
        inception: u32,
        key_tag: u16,
        signer: Name,
        signature: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            type_covered,
            algorithm,
            labels,
            original_ttl,
            expiration,
            inception,
            key_tag,
            signer,
            signature: signature.into(),
        }
    }

    /// Returns the type covered by this signature.
    #[inline]
    pub const fn type_covered(&self) -> u16 {
        self.type_covered
    }

    /// Returns the algorithm number.
    #[inline]
    pub const fn algorithm(&self) -> u8 {
        self.algorithm
    }

    /// Returns the signer's name.
    #[inline]
    pub fn signer(&self) -> &Name {
        &self.signer
    }

    /// Returns the key tag.
    #[inline]
    pub const fn key_tag(&self) -> u16 {
        self.key_tag
    }

    /// Returns true if the signature is within its validity window.
    pub fn is_valid_at(&self, now: u32) -> bool {
        now >= self.inception && now <= self.expiration
    }

    /// Parses an RRSIG record from an uncompressed RDATA slice.
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        if rdata.len() < 18 {
            return Err(Error::invalid_rdata("RRSIG", "too short"));
        }

        let type_covered = u16::from_be_bytes([rdata[0], rdata[1]]);
        let algorithm = rdata[2];
        let labels = rdata[3];
        let original_ttl = u32::from_be_bytes([rdata[4], rdata[5], rdata[6], rdata[7]]);
        let expiration = u32::from_be_bytes([rdata[8], rdata[9], rdata[10], rdata[11]]);
        let inception = u32::from_be_bytes([rdata[12], rdata[13], rdata[14], rdata[15]]);
        let key_tag = u16::from_be_bytes([rdata[16], rdata[17]]);

        let (signer, signer_len) = Name::parse_prefix(&rdata[18..])?;
        let signature = rdata[18 + signer_len..].to_vec();

        Ok(Self {
            type_covered,
            algorithm,
            labels,
            original_ttl,
            expiration,
            inception,
            key_tag,
            signer,
            signature,
        })
    }

    /// Returns the wire format length of the RDATA.
    pub fn wire_len(&self) -> usize {
        18 + self.signer.wire_len() + self.signature.len()
    }

    /// Writes the RDATA in wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.type_covered.to_be_bytes());
        buf.extend_from_slice(&[self.algorithm, self.labels]);
        buf.extend_from_slice(&self.original_ttl.to_be_bytes());
        buf.extend_from_slice(&self.expiration.to_be_bytes());
        buf.extend_from_slice(&self.inception.to_be_bytes());
        buf.extend_from_slice(&self.key_tag.to_be_bytes());
        self.signer.write_wire(buf);
        buf.extend_from_slice(&self.signature);
    }
}

impl fmt::Display for RRSIG {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let covered = RecordType::from_u16(self.type_covered)
            .map(|t| t.name().to_string())
            .unwrap_or_else(|| format!("TYPE{}", self.type_covered));
        write!(
            f,
            "{} {} {} {} {} {} {} {}",
            covered,
            self.algorithm,
            self.labels,
            self.original_ttl,
            self.expiration,
            self.inception,
            self.key_tag,
            self.signer
        )
    }
}

/// NSEC record - Next Secure (RFC 4034).
///
/// Proves that no owner name exists between its owner and `next_name`
/// in canonical order, and that the owner has exactly the types listed
/// in the bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NSEC {
    /// Next owner name in canonical zone order.
    next_name: Name,
    /// Type bitmap of the types present at the owner.
    type_bitmap: Vec<u8>,
}

impl NSEC {
    /// Creates a new NSEC record.
    pub fn new(next_name: Name, type_bitmap: impl Into<Vec<u8>>) -> Self {
        Self {
            next_name,
            type_bitmap: type_bitmap.into(),
        }
    }

    /// Returns the next owner name.
    #[inline]
    pub fn next_name(&self) -> &Name {
        &self.next_name
    }

    /// Returns the raw type bitmap.
    #[inline]
    pub fn type_bitmap(&self) -> &[u8] {
        &self.type_bitmap
    }

    /// Returns true if the bitmap lists the given type.
    #[inline]
    pub fn has_type(&self, rtype: RecordType) -> bool {
        bitmap_has_type(&self.type_bitmap, rtype.to_u16())
    }

    /// Returns every type number listed in the bitmap.
    pub fn types(&self) -> Vec<u16> {
        bitmap_types(&self.type_bitmap)
    }

    /// Parses an NSEC record from an uncompressed RDATA slice.
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        let (next_name, name_len) = Name::parse_prefix(rdata)?;
        Ok(Self {
            next_name,
            type_bitmap: rdata[name_len..].to_vec(),
        })
    }

    /// Returns the wire format length of the RDATA.
    pub fn wire_len(&self) -> usize {
        self.next_name.wire_len() + self.type_bitmap.len()
    }

    /// Writes the RDATA in wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.next_name.write_wire(buf);
        buf.extend_from_slice(&self.type_bitmap);
    }
}

impl fmt::Display for NSEC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.next_name)?;
        write_bitmap_mnemonics(f, &self.type_bitmap)
    }
}

/// Appends the type mnemonics of a bitmap to presentation output.
fn write_bitmap_mnemonics(f: &mut fmt::Formatter<'_>, bitmap: &[u8]) -> fmt::Result {
    for t in bitmap_types(bitmap) {
        match RecordType::from_u16(t) {
            Some(rt) => write!(f, " {}", rt)?,
            None => write!(f, " TYPE{}", t)?,
        }
    }
    Ok(())
}

/// NSEC3 record - Hashed Next Secure (RFC 5155).
///
/// Like NSEC but over hashed owner names, closing the zone-walking
/// hole. The owner name's first label is the base32hex hash of the
/// original owner; `next_hashed` is the raw hash of the next owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NSEC3 {
    /// Hash algorithm (1 = SHA-1).
    hash_algorithm: u8,
    /// Flags (bit 0 = opt-out).
    flags: u8,
    /// Extra hash iterations.
    iterations: u16,
    /// Salt mixed into every hash round.
    salt: Vec<u8>,
    /// Raw hash of the next owner name in hash order.
    next_hashed: Vec<u8>,
    /// Type bitmap of the types present at the (unhashed) owner.
    type_bitmap: Vec<u8>,
}

impl NSEC3 {
    /// Opt-out flag bit (RFC 5155 Section 3.1.2.1).
    pub const FLAG_OPT_OUT: u8 = 0x01;

    /// Creates a new NSEC3 record.
    pub fn new(
        hash_algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: impl Into<Vec<u8>>,
        next_hashed: impl Into<Vec<u8>>,
        type_bitmap: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            hash_algorithm,
            flags,
            iterations,
            salt: salt.into(),
            next_hashed: next_hashed.into(),
            type_bitmap: type_bitmap.into(),
        }
    }

    /// Returns the hash algorithm number.
    #[inline]
    pub const fn hash_algorithm(&self) -> u8 {
        self.hash_algorithm
    }

    /// Returns the flags byte.
    #[inline]
    pub const fn flags(&self) -> u8 {
        self.flags
    }

    /// Returns true if the opt-out flag is set.
    ///
    /// Opt-out ranges may skip unsigned delegations, so they cannot
    /// prove that a name does not exist.
    #[inline]
    pub const fn is_opt_out(&self) -> bool {
        (self.flags & Self::FLAG_OPT_OUT) != 0
    }

    /// Returns the iteration count.
    #[inline]
    pub const fn iterations(&self) -> u16 {
        self.iterations
    }

    /// Returns the salt.
    #[inline]
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Returns the raw next-hashed owner.
    #[inline]
    pub fn next_hashed(&self) -> &[u8] {
        &self.next_hashed
    }

    /// Returns the raw type bitmap.
    #[inline]
    pub fn type_bitmap(&self) -> &[u8] {
        &self.type_bitmap
    }

    /// Returns true if the bitmap lists the given type.
    #[inline]
    pub fn has_type(&self, rtype: RecordType) -> bool {
        bitmap_has_type(&self.type_bitmap, rtype.to_u16())
    }

    /// Returns every type number listed in the bitmap.
    pub fn types(&self) -> Vec<u16> {
        bitmap_types(&self.type_bitmap)
    }

    /// Parses an NSEC3 record from an RDATA slice.
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        if rdata.len() < 5 {
            return Err(Error::invalid_rdata("NSEC3", "too short"));
        }

        let hash_algorithm = rdata[0];
        let flags = rdata[1];
        let iterations = u16::from_be_bytes([rdata[2], rdata[3]]);
        let salt_len = rdata[4] as usize;

        let mut pos = 5;
        if pos + salt_len > rdata.len() {
            return Err(Error::invalid_rdata("NSEC3", "salt truncated"));
        }
        let salt = rdata[pos..pos + salt_len].to_vec();
        pos += salt_len;

        if pos >= rdata.len() {
            return Err(Error::invalid_rdata("NSEC3", "missing hash length"));
        }
        let hash_len = rdata[pos] as usize;
        pos += 1;

        if pos + hash_len > rdata.len() {
            return Err(Error::invalid_rdata("NSEC3", "hash truncated"));
        }
        let next_hashed = rdata[pos..pos + hash_len].to_vec();
        pos += hash_len;

        Ok(Self {
            hash_algorithm,
            flags,
            iterations,
            salt,
            next_hashed,
            type_bitmap: rdata[pos..].to_vec(),
        })
    }

    /// Returns the wire format length of the RDATA.
    pub fn wire_len(&self) -> usize {
        5 + self.salt.len() + 1 + self.next_hashed.len() + self.type_bitmap.len()
    }

    /// Writes the RDATA in wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&[self.hash_algorithm, self.flags]);
        buf.extend_from_slice(&self.iterations.to_be_bytes());
        buf.extend_from_slice(&[self.salt.len() as u8]);
        buf.extend_from_slice(&self.salt);
        buf.extend_from_slice(&[self.next_hashed.len() as u8]);
        buf.extend_from_slice(&self.next_hashed);
        buf.extend_from_slice(&self.type_bitmap);
    }
}

impl fmt::Display for NSEC3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let salt = if self.salt.is_empty() {
            "-".to_string()
        } else {
            HEXLOWER.encode(&self.salt)
        };
        write!(
            f,
            "{} {} {} {} {}",
            self.hash_algorithm,
            self.flags,
            self.iterations,
            salt,
            BASE32_DNSSEC.encode(&self.next_hashed)
        )?;
        write_bitmap_mnemonics(f, &self.type_bitmap)
    }
}

/// NSEC3PARAM record - NSEC3 Parameters (RFC 5155).
///
/// Published at the zone apex; tells validators which hash parameters
/// the zone's NSEC3 chain uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NSEC3PARAM {
    /// Hash algorithm.
    hash_algorithm: u8,
    /// Flags (must be ignored by validators).
    flags: u8,
    /// Extra hash iterations.
    iterations: u16,
    /// Salt.
    salt: Vec<u8>,
}

impl NSEC3PARAM {
    /// Creates a new NSEC3PARAM record.
    pub fn new(hash_algorithm: u8, flags: u8, iterations: u16, salt: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_algorithm,
            flags,
            iterations,
            salt: salt.into(),
        }
    }

    /// Returns the hash algorithm number.
    #[inline]
    pub const fn hash_algorithm(&self) -> u8 {
        self.hash_algorithm
    }

    /// Returns the flags byte.
    #[inline]
    pub const fn flags(&self) -> u8 {
        self.flags
    }

    /// Returns the iteration count.
    #[inline]
    pub const fn iterations(&self) -> u16 {
        self.iterations
    }

    /// Returns the salt.
    #[inline]
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Parses an NSEC3PARAM record from an RDATA slice.
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        if rdata.len() < 5 {
            return Err(Error::invalid_rdata("NSEC3PARAM", "too short"));
        }

        let salt_len = rdata[4] as usize;
        if 5 + salt_len > rdata.len() {
            return Err(Error::invalid_rdata("NSEC3PARAM", "salt truncated"));
        }

        Ok(Self {
            hash_algorithm: rdata[0],
            flags: rdata[1],
            iterations: u16::from_be_bytes([rdata[2], rdata[3]]),
            salt: rdata[5..5 + salt_len].to_vec(),
        })
    }

    /// Returns the wire format length of the RDATA.
    pub fn wire_len(&self) -> usize {
        5 + self.salt.len()
    }

    /// Writes the RDATA in wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&[self.hash_algorithm, self.flags]);
        buf.extend_from_slice(&self.iterations.to_be_bytes());
        buf.extend_from_slice(&[self.salt.len() as u8]);
        buf.extend_from_slice(&self.salt);
    }
}

impl fmt::Display for NSEC3PARAM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let salt = if self.salt.is_empty() {
            "-".to_string()
        } else {
            HEXLOWER.encode(&self.salt)
        };
        write!(
            f,
            "{} {} {} {}",
            self.hash_algorithm, self.flags, self.iterations, salt
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdata::bitmap_from_types;
    use std::str::FromStr;

    #[test]
    fn test_nsec_roundtrip() {
        let original = NSEC::new(
            Name::from_str("c.example.").unwrap(),
            bitmap_from_types(&[1, 46, 47]),
        );

        let mut buf = BytesMut::new();
        original.write_to(&mut buf);
        let parsed = NSEC::parse(&buf).unwrap();

        assert_eq!(parsed, original);
        assert!(parsed.has_type(RecordType::A));
        assert!(parsed.has_type(RecordType::NSEC));
        assert!(!parsed.has_type(RecordType::AAAA));
    }

    #[test]
    fn test_nsec3_roundtrip() {
        let original = NSEC3::new(
            NSEC3_HASH_SHA1,
            NSEC3::FLAG_OPT_OUT,
            10,
            vec![0xAA, 0xBB],
            vec![0x01; 20],
            bitmap_from_types(&[2, 43]),
        );

        let mut buf = BytesMut::new();
        original.write_to(&mut buf);
        let parsed = NSEC3::parse(&buf).unwrap();

        assert_eq!(parsed, original);
        assert!(parsed.is_opt_out());
        assert_eq!(parsed.iterations(), 10);
        assert_eq!(parsed.salt(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_nsec3param_roundtrip() {
        let original = NSEC3PARAM::new(NSEC3_HASH_SHA1, 0, 10, vec![0xAA, 0xBB]);
        let mut buf = BytesMut::new();
        original.write_to(&mut buf);
        assert_eq!(NSEC3PARAM::parse(&buf).unwrap(), original);
    }

    #[test]
    fn test_nsec3_truncated() {
        assert!(NSEC3::parse(&[1, 0, 0, 10]).is_err());
        // Salt length points past the end.
        assert!(NSEC3::parse(&[1, 0, 0, 10, 8, 0xAA]).is_err());
    }

    #[test]
    fn test_rrsig_roundtrip() {
        let original = RRSIG::new(
            47,
            13,
            2,
            3600,
            1_700_003_600,
            1_700_000_000,
            12345,
            Name::from_str("example.").unwrap(),
            vec![0xDE, 0xAD, 0xBE, 0xEF],
        );

        let mut buf = BytesMut::new();
        original.write_to(&mut buf);
        let parsed = RRSIG::parse(&buf).unwrap();

        assert_eq!(parsed, original);
        assert!(parsed.is_valid_at(1_700_000_100));
        assert!(!parsed.is_valid_at(1_700_010_000));
    }
}
