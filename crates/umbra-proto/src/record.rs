//! DNS resource records and RRsets.

use crate::class::RecordClass;
use crate::name::Name;
use crate::rdata::RData;
use crate::rtype::RecordType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single DNS resource record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// The owner name.
    name: Name,
    /// The record type.
    rtype: RecordType,
    /// The record class.
    rclass: RecordClass,
    /// Time to live in seconds.
    ttl: u32,
    /// The record data.
    rdata: RData,
}

impl ResourceRecord {
    /// Creates a new resource record.
    pub fn new(name: Name, rtype: RecordType, rclass: RecordClass, ttl: u32, rdata: RData) -> Self {
        Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        }
    }

    /// Returns the owner name.
    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the record type.
    #[inline]
    pub const fn rtype(&self) -> RecordType {
        self.rtype
    }

    /// Returns the record class.
    #[inline]
    pub const fn rclass(&self) -> RecordClass {
        self.rclass
    }

    /// Returns the TTL in seconds.
    #[inline]
    pub const fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns the record data.
    #[inline]
    pub fn rdata(&self) -> &RData {
        &self.rdata
    }

    /// Returns a copy with a different TTL.
    #[must_use]
    pub fn with_ttl(&self, ttl: u32) -> Self {
        let mut record = self.clone();
        record.ttl = ttl;
        record
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name, self.ttl, self.rclass, self.rtype, self.rdata
        )
    }
}

/// An RRset: every record sharing one (owner, type, class) triple.
///
/// This is the unit served by the external RRset cache and the unit
/// copied into the authority section of a synthesized reply. The
/// covering RRSIGs travel with the set so a reply built from it can be
/// revalidated downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rrset {
    /// The owner name.
    owner: Name,
    /// The record type of the data records.
    rtype: RecordType,
    /// The record class.
    rclass: RecordClass,
    /// Original TTL shared by the records.
    ttl: u32,
    /// The data records.
    rdatas: Vec<RData>,
    /// RRSIG records covering this set.
    signatures: Vec<RData>,
}

impl Rrset {
    /// Creates a new RRset.
    pub fn new(owner: Name, rtype: RecordType, rclass: RecordClass, ttl: u32) -> Self {
        Self {
            owner,
            rtype,
            rclass,
            ttl,
            rdatas: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Adds a data record.
    #[must_use]
    pub fn with_rdata(mut self, rdata: RData) -> Self {
        self.rdatas.push(rdata);
        self
    }

    /// Adds a covering RRSIG.
    #[must_use]
    pub fn with_signature(mut self, rrsig: crate::rdata::RRSIG) -> Self {
        self.signatures.push(RData::RRSIG(rrsig));
        self
    }

    /// Returns the owner name.
    #[inline]
    pub fn owner(&self) -> &Name {
        &self.owner
    }

    /// Returns the record type.
    #[inline]
    pub const fn rtype(&self) -> RecordType {
        self.rtype
    }

    /// Returns the record class.
    #[inline]
    pub const fn rclass(&self) -> RecordClass {
        self.rclass
    }

    /// Returns the original TTL.
    #[inline]
    pub const fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns the data records.
    #[inline]
    pub fn rdatas(&self) -> &[RData] {
        &self.rdatas
    }

    /// Returns the first data record, if any.
    #[inline]
    pub fn first(&self) -> Option<&RData> {
        self.rdatas.first()
    }

    /// Returns the covering RRSIGs.
    #[inline]
    pub fn signatures(&self) -> &[RData] {
        &self.signatures
    }

    /// Returns true if the set has no data records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rdatas.is_empty()
    }

    /// Flattens the set (data and signatures) into resource records
    /// with the given TTL.
    pub fn to_records(&self, ttl: u32) -> Vec<ResourceRecord> {
        let mut records: Vec<ResourceRecord> = self
            .rdatas
            .iter()
            .map(|rd| ResourceRecord::new(self.owner.clone(), self.rtype, self.rclass, ttl, rd.clone()))
            .collect();
        records.extend(self.signatures.iter().map(|sig| {
            ResourceRecord::new(self.owner.clone(), RecordType::RRSIG, self.rclass, ttl, sig.clone())
        }));
        records
    }
}

impl fmt::Display for Rrset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rd in &self.rdatas {
            writeln!(f, "{} {} {} {} {}", self.owner, self.ttl, self.rclass, self.rtype, rd)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdata::{bitmap_from_types, NSEC};
    use std::str::FromStr;

    #[test]
    fn test_record_with_ttl() {
        let rr = ResourceRecord::new(
            Name::from_str("a.example.").unwrap(),
            RecordType::NSEC,
            RecordClass::IN,
            300,
            RData::NSEC(NSEC::new(
                Name::from_str("c.example.").unwrap(),
                bitmap_from_types(&[1]),
            )),
        );
        assert_eq!(rr.with_ttl(10).ttl(), 10);
        assert_eq!(rr.ttl(), 300);
    }

    #[test]
    fn test_rrset_to_records() {
        let nsec = NSEC::new(
            Name::from_str("c.example.").unwrap(),
            bitmap_from_types(&[1, 46, 47]),
        );
        let rrsig = crate::rdata::RRSIG::new(
            47,
            13,
            2,
            300,
            2000,
            1000,
            7,
            Name::from_str("example.").unwrap(),
            vec![1, 2, 3],
        );

        let set = Rrset::new(
            Name::from_str("a.example.").unwrap(),
            RecordType::NSEC,
            RecordClass::IN,
            300,
        )
        .with_rdata(RData::NSEC(nsec))
        .with_signature(rrsig);

        let records = set.to_records(120);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.ttl() == 120));
        assert_eq!(records[0].rtype(), RecordType::NSEC);
        assert_eq!(records[1].rtype(), RecordType::RRSIG);
    }
}
