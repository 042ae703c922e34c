//! DNS response codes (RCODEs).

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS response code.
///
/// Only the header-range codes are modeled; this subsystem synthesizes
/// NOERROR and NXDOMAIN replies and inspects the codes of validated
/// upstream replies. See RFC 1035 Section 4.1.1.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u16)]
pub enum ResponseCode {
    /// No error condition - RFC 1035
    NoError = 0,

    /// Format error - RFC 1035
    FormErr = 1,

    /// Server failure - RFC 1035
    ServFail = 2,

    /// The queried name does not exist - RFC 1035
    NXDomain = 3,

    /// Query kind not implemented - RFC 1035
    NotImp = 4,

    /// Query refused for policy reasons - RFC 1035
    Refused = 5,
}

impl ResponseCode {
    /// Returns the numeric value of the response code.
    #[inline]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Creates a response code from its numeric value.
    #[inline]
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Returns true for NOERROR.
    #[inline]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::NoError)
    }

    /// Returns true for NXDOMAIN.
    #[inline]
    pub const fn is_nxdomain(self) -> bool {
        matches!(self, Self::NXDomain)
    }

    /// Returns the mnemonic name of the response code.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoError => "NOERROR",
            Self::FormErr => "FORMERR",
            Self::ServFail => "SERVFAIL",
            Self::NXDomain => "NXDOMAIN",
            Self::NotImp => "NOTIMP",
            Self::Refused => "REFUSED",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_roundtrip() {
        assert_eq!(ResponseCode::from_u16(3), Some(ResponseCode::NXDomain));
        assert_eq!(ResponseCode::NoError.to_u16(), 0);
        assert_eq!(ResponseCode::from_u16(11), None);
    }

    #[test]
    fn test_predicates() {
        assert!(ResponseCode::NoError.is_success());
        assert!(ResponseCode::NXDomain.is_nxdomain());
        assert!(!ResponseCode::ServFail.is_success());
    }
}
