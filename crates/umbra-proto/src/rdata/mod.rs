//! DNS record data (RDATA) types.
//!
//! Only the types the negative cache interprets are modeled in full:
//! SOA (zone apex and negative TTL), RRSIG (carried alongside proofs so
//! a synthesized reply can be revalidated), and the denial records NSEC,
//! NSEC3, NSEC3PARAM. Everything else passes through as raw bytes.

pub mod authority;
pub mod dnssec;

pub use authority::SOA;
pub use dnssec::{NSEC, NSEC3, NSEC3PARAM, RRSIG};

use crate::error::Result;
use crate::rtype::RecordType;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS record data.
///
/// Record types without an interpreted representation are preserved as
/// opaque byte sequences.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RData {
    /// Start of authority (SOA record)
    SOA(SOA),

    /// DNSSEC signature (RRSIG record)
    RRSIG(RRSIG),

    /// Next secure (NSEC record)
    NSEC(NSEC),

    /// Next secure v3 (NSEC3 record)
    NSEC3(NSEC3),

    /// NSEC3 parameters (NSEC3PARAM record)
    NSEC3PARAM(NSEC3PARAM),

    /// Uninterpreted record data (raw RDATA bytes)
    Other(Vec<u8>),
}

impl RData {
    /// Parses RDATA of the given type from an uncompressed RDATA slice.
    pub fn parse(rtype: RecordType, rdata: &[u8]) -> Result<Self> {
        match rtype {
            RecordType::SOA => Ok(Self::SOA(SOA::parse(rdata)?)),
            RecordType::RRSIG => Ok(Self::RRSIG(RRSIG::parse(rdata)?)),
            RecordType::NSEC => Ok(Self::NSEC(NSEC::parse(rdata)?)),
            RecordType::NSEC3 => Ok(Self::NSEC3(NSEC3::parse(rdata)?)),
            RecordType::NSEC3PARAM => Ok(Self::NSEC3PARAM(NSEC3PARAM::parse(rdata)?)),
            _ => Ok(Self::Other(rdata.to_vec())),
        }
    }

    /// Writes the RDATA in wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        match self {
            Self::SOA(soa) => soa.write_to(buf),
            Self::RRSIG(sig) => sig.write_to(buf),
            Self::NSEC(nsec) => nsec.write_to(buf),
            Self::NSEC3(nsec3) => nsec3.write_to(buf),
            Self::NSEC3PARAM(param) => param.write_to(buf),
            Self::Other(bytes) => buf.extend_from_slice(bytes),
        }
    }

    /// Returns the SOA data if this is an SOA record.
    #[inline]
    pub fn as_soa(&self) -> Option<&SOA> {
        match self {
            Self::SOA(soa) => Some(soa),
            _ => None,
        }
    }

    /// Returns the NSEC data if this is an NSEC record.
    #[inline]
    pub fn as_nsec(&self) -> Option<&NSEC> {
        match self {
            Self::NSEC(nsec) => Some(nsec),
            _ => None,
        }
    }

    /// Returns the NSEC3 data if this is an NSEC3 record.
    #[inline]
    pub fn as_nsec3(&self) -> Option<&NSEC3> {
        match self {
            Self::NSEC3(nsec3) => Some(nsec3),
            _ => None,
        }
    }

    /// Returns the NSEC3PARAM data if this is an NSEC3PARAM record.
    #[inline]
    pub fn as_nsec3param(&self) -> Option<&NSEC3PARAM> {
        match self {
            Self::NSEC3PARAM(param) => Some(param),
            _ => None,
        }
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SOA(soa) => write!(f, "{}", soa),
            Self::RRSIG(sig) => write!(f, "{}", sig),
            Self::NSEC(nsec) => write!(f, "{}", nsec),
            Self::NSEC3(nsec3) => write!(f, "{}", nsec3),
            Self::NSEC3PARAM(param) => write!(f, "{}", param),
            Self::Other(bytes) => write!(f, "\\# {}", bytes.len()),
        }
    }
}

/// Returns true if `rtype` is set in an NSEC/NSEC3 type bitmap.
///
/// The bitmap is the window-block format of RFC 4034 Section 4.1.2.
pub fn bitmap_has_type(bitmap: &[u8], rtype: u16) -> bool {
    let want_window = (rtype >> 8) as u8;
    let bit = rtype & 0xFF;
    let byte_idx = (bit / 8) as usize;
    let mask = 0x80u8 >> (bit % 8);

    let mut pos = 0;
    while pos + 2 <= bitmap.len() {
        let window = bitmap[pos];
        let len = bitmap[pos + 1] as usize;
        pos += 2;
        if pos + len > bitmap.len() {
            return false; // truncated bitmap
        }
        if window == want_window {
            return byte_idx < len && (bitmap[pos + byte_idx] & mask) != 0;
        }
        pos += len;
    }
    false
}

/// Decodes every type number set in an NSEC/NSEC3 type bitmap.
pub fn bitmap_types(bitmap: &[u8]) -> Vec<u16> {
    let mut types = Vec::new();
    let mut pos = 0;

    while pos + 2 <= bitmap.len() {
        let window = u16::from(bitmap[pos]);
        let len = bitmap[pos + 1] as usize;
        pos += 2;
        if pos + len > bitmap.len() {
            break;
        }
        for (byte_idx, &byte) in bitmap[pos..pos + len].iter().enumerate() {
            for bit in 0..8 {
                if byte & (0x80 >> bit) != 0 {
                    types.push(window * 256 + byte_idx as u16 * 8 + bit);
                }
            }
        }
        pos += len;
    }
    types
}

/// Builds a type bitmap from a list of type numbers.
///
/// Intended for constructing records in tests and tools; types may be
/// given in any order.
pub fn bitmap_from_types(types: &[u16]) -> Vec<u8> {
    let mut sorted: Vec<u16> = types.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut out = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let window = sorted[i] >> 8;
        let mut block = [0u8; 32];
        let mut max_byte = 0usize;
        while i < sorted.len() && sorted[i] >> 8 == window {
            let bit = sorted[i] & 0xFF;
            let byte_idx = (bit / 8) as usize;
            block[byte_idx] |= 0x80 >> (bit % 8);
            max_byte = max_byte.max(byte_idx);
            i += 1;
        }
        out.push(window as u8);
        out.push(max_byte as u8 + 1);
        out.extend_from_slice(&block[..=max_byte]);
    }
    out
}
