//! # Umbra DNS Protocol Types
//!
//! This crate provides the DNS protocol model consumed by the umbra
//! negative cache: wire-format domain names with RFC 4034 canonical
//! ordering, record type/class/rcode registries, the RDATA types that
//! matter for authenticated denial of existence (SOA, RRSIG, NSEC,
//! NSEC3, NSEC3PARAM), and a structured reply representation.
//!
//! ## Design
//!
//! Names are kept in uncompressed wire format because both canonical
//! ordering (RFC 4034 Section 6.1) and NSEC3 hashing (RFC 5155
//! Section 5) are defined over wire form. Message-level wire parsing is
//! deliberately absent: replies enter this model already parsed and
//! validated elsewhere.
//!
//! ## Example
//!
//! ```rust
//! use umbra_proto::Name;
//! use std::str::FromStr;
//!
//! let a = Name::from_str("a.example.").unwrap();
//! let z = Name::from_str("z.example.").unwrap();
//! let bar = Name::from_str("bar.example.").unwrap();
//!
//! // Canonical order, compared from the root down.
//! assert!(a < bar && bar < z);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod class;
pub mod error;
pub mod message;
pub mod name;
pub mod rcode;
pub mod rdata;
pub mod record;
pub mod rtype;

pub use class::RecordClass;
pub use error::{Error, Result};
pub use message::{Question, Reply};
pub use name::Name;
pub use rcode::ResponseCode;
pub use rdata::RData;
pub use record::{ResourceRecord, Rrset};
pub use rtype::RecordType;

/// Maximum length of a DNS label (63 bytes per RFC 1035).
pub const MAX_LABEL_LENGTH: usize = 63;

/// Maximum length of a domain name in wire format (255 bytes per RFC 1035).
pub const MAX_NAME_LENGTH: usize = 255;
