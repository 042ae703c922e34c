//! DNS record types.
//!
//! A trimmed registry covering the types a validating resolver's
//! denial-of-existence machinery encounters: the common data types that
//! appear in type bitmaps, and the DNSSEC proof types themselves.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS record type.
///
/// See RFC 1035 for the standard types and RFC 4034 / RFC 5155 for the
/// DNSSEC types.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u16)]
pub enum RecordType {
    /// IPv4 address - RFC 1035
    A = 1,

    /// Authoritative name server - RFC 1035
    NS = 2,

    /// Canonical name (alias) - RFC 1035
    CNAME = 5,

    /// Start of authority - RFC 1035
    SOA = 6,

    /// Domain name pointer - RFC 1035
    PTR = 12,

    /// Mail exchange - RFC 1035
    MX = 15,

    /// Text strings - RFC 1035
    TXT = 16,

    /// IPv6 address - RFC 3596
    AAAA = 28,

    /// Server selection - RFC 2782
    SRV = 33,

    /// Delegation name - RFC 6672
    DNAME = 39,

    /// Delegation signer - RFC 4034
    DS = 43,

    /// DNSSEC signature - RFC 4034
    RRSIG = 46,

    /// Next secure - RFC 4034
    NSEC = 47,

    /// DNS public key - RFC 4034
    DNSKEY = 48,

    /// Next secure v3 - RFC 5155
    NSEC3 = 50,

    /// NSEC3 parameters - RFC 5155
    NSEC3PARAM = 51,

    /// DNSSEC lookaside validation - RFC 4431
    DLV = 32769,
}

impl RecordType {
    /// Returns the numeric value of the record type.
    #[inline]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Creates a record type from its numeric value.
    #[inline]
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Returns true if this is a DNSSEC record type.
    #[inline]
    pub const fn is_dnssec(self) -> bool {
        matches!(
            self,
            Self::DS
                | Self::RRSIG
                | Self::NSEC
                | Self::DNSKEY
                | Self::NSEC3
                | Self::NSEC3PARAM
                | Self::DLV
        )
    }

    /// Returns true if this type proves denial of existence.
    #[inline]
    pub const fn is_denial(self) -> bool {
        matches!(self, Self::NSEC | Self::NSEC3)
    }

    /// Returns the mnemonic name of the record type.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::NS => "NS",
            Self::CNAME => "CNAME",
            Self::SOA => "SOA",
            Self::PTR => "PTR",
            Self::MX => "MX",
            Self::TXT => "TXT",
            Self::AAAA => "AAAA",
            Self::SRV => "SRV",
            Self::DNAME => "DNAME",
            Self::DS => "DS",
            Self::RRSIG => "RRSIG",
            Self::NSEC => "NSEC",
            Self::DNSKEY => "DNSKEY",
            Self::NSEC3 => "NSEC3",
            Self::NSEC3PARAM => "NSEC3PARAM",
            Self::DLV => "DLV",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
