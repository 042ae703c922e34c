//! Authority record types (SOA).

use crate::error::{Error, Result};
use crate::name::Name;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SOA record - Start of Authority (RFC 1035).
///
/// The negative cache uses the SOA twice: its owner name pins the zone
/// a validated reply belongs to, and the record itself is copied into
/// the authority section of every synthesized negative reply. The
/// MINIMUM field doubles as the negative caching TTL per RFC 2308.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SOA {
    /// Primary name server for the zone.
    mname: Name,
    /// Mailbox of the responsible person.
    rname: Name,
    /// Zone serial number.
    serial: u32,
    /// Refresh interval (seconds).
    refresh: u32,
    /// Retry interval (seconds).
    retry: u32,
    /// Expire time (seconds).
    expire: u32,
    /// Minimum TTL / negative caching TTL (seconds).
    minimum: u32,
}

impl SOA {
    /// Creates a new SOA record.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mname: Name,
        rname: Name,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    ) -> Self {
        Self {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        }
    }

    /// Returns the primary name server.
    #[inline]
    pub fn mname(&self) -> &Name {
        &self.mname
    }

    /// Returns the responsible mailbox (in DNS name form).
    #[inline]
    pub fn rname(&self) -> &Name {
        &self.rname
    }

    /// Returns the zone serial number.
    #[inline]
    pub const fn serial(&self) -> u32 {
        self.serial
    }

    /// Returns the refresh interval in seconds.
    #[inline]
    pub const fn refresh(&self) -> u32 {
        self.refresh
    }

    /// Returns the retry interval in seconds.
    #[inline]
    pub const fn retry(&self) -> u32 {
        self.retry
    }

    /// Returns the expire time in seconds.
    #[inline]
    pub const fn expire(&self) -> u32 {
        self.expire
    }

    /// Returns the minimum TTL field in seconds.
    #[inline]
    pub const fn minimum(&self) -> u32 {
        self.minimum
    }

    /// Returns the negative caching TTL per RFC 2308.
    #[inline]
    pub const fn negative_ttl(&self) -> u32 {
        self.minimum
    }

    /// Parses an SOA record from an uncompressed RDATA slice.
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        let (mname, mname_len) = Name::parse_prefix(rdata)?;
        let (rname, rname_len) = Name::parse_prefix(&rdata[mname_len..])?;

        let nums = mname_len + rname_len;
        if nums + 20 > rdata.len() {
            return Err(Error::buffer_too_short(nums + 20, rdata.len()));
        }

        let word = |i: usize| {
            u32::from_be_bytes([
                rdata[nums + i],
                rdata[nums + i + 1],
                rdata[nums + i + 2],
                rdata[nums + i + 3],
            ])
        };

        Ok(Self {
            mname,
            rname,
            serial: word(0),
            refresh: word(4),
            retry: word(8),
            expire: word(12),
            minimum: word(16),
        })
    }

    /// Returns the wire format length of the RDATA.
    pub fn wire_len(&self) -> usize {
        self.mname.wire_len() + self.rname.wire_len() + 20
    }

    /// Writes the RDATA in wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.mname.write_wire(buf);
        self.rname.write_wire(buf);
        buf.extend_from_slice(&self.serial.to_be_bytes());
        buf.extend_from_slice(&self.refresh.to_be_bytes());
        buf.extend_from_slice(&self.retry.to_be_bytes());
        buf.extend_from_slice(&self.expire.to_be_bytes());
        buf.extend_from_slice(&self.minimum.to_be_bytes());
    }
}

impl fmt::Display for SOA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.mname, self.rname, self.serial, self.refresh, self.retry, self.expire, self.minimum
        )
    }
}
