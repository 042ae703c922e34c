//! Structured reply representation.
//!
//! The negative cache works on replies that have already been parsed
//! and DNSSEC-validated elsewhere, and it produces replies that will be
//! re-validated downstream. Neither direction needs wire format, so a
//! reply here is just an rcode plus record sections.

use crate::class::RecordClass;
use crate::name::Name;
use crate::rcode::ResponseCode;
use crate::record::ResourceRecord;
use crate::rtype::RecordType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A DNS question: the (name, type, class) triple being asked about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Question {
    /// The name being queried.
    pub qname: Name,
    /// The type being queried.
    pub qtype: RecordType,
    /// The class being queried.
    pub qclass: RecordClass,
}

impl Question {
    /// Creates a new question.
    pub fn new(qname: Name, qtype: RecordType, qclass: RecordClass) -> Self {
        Self {
            qname,
            qtype,
            qclass,
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.qname, self.qclass, self.qtype)
    }
}

/// A validated (or synthesized) DNS reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// The response code.
    rcode: ResponseCode,
    /// The question this reply answers.
    question: Question,
    /// The answer section.
    answer: Vec<ResourceRecord>,
    /// The authority section.
    authority: Vec<ResourceRecord>,
}

impl Reply {
    /// Creates an empty reply for a question.
    pub fn new(rcode: ResponseCode, question: Question) -> Self {
        Self {
            rcode,
            question,
            answer: Vec::new(),
            authority: Vec::new(),
        }
    }

    /// Returns the response code.
    #[inline]
    pub const fn rcode(&self) -> ResponseCode {
        self.rcode
    }

    /// Returns the question.
    #[inline]
    pub fn question(&self) -> &Question {
        &self.question
    }

    /// Returns the answer section.
    #[inline]
    pub fn answer(&self) -> &[ResourceRecord] {
        &self.answer
    }

    /// Returns the authority section.
    #[inline]
    pub fn authority(&self) -> &[ResourceRecord] {
        &self.authority
    }

    /// Adds a record to the answer section.
    pub fn add_answer(&mut self, record: ResourceRecord) {
        self.answer.push(record);
    }

    /// Adds a record to the authority section.
    pub fn add_authority(&mut self, record: ResourceRecord) {
        self.authority.push(record);
    }

    /// Adds several records to the authority section.
    pub fn add_authority_records(&mut self, records: impl IntoIterator<Item = ResourceRecord>) {
        self.authority.extend(records);
    }

    /// Returns true if this is an NXDOMAIN reply.
    #[inline]
    pub fn is_nxdomain(&self) -> bool {
        self.rcode.is_nxdomain()
    }

    /// Returns true if this is a NODATA reply (NOERROR, empty answer).
    #[inline]
    pub fn is_nodata(&self) -> bool {
        self.rcode.is_success() && self.answer.is_empty()
    }

    /// Returns true if this reply is a referral: no answer, no SOA, and
    /// NS records in the authority section.
    pub fn is_referral(&self) -> bool {
        self.answer.is_empty()
            && self.authority_soa().is_none()
            && self
                .authority
                .iter()
                .any(|r| r.rtype() == RecordType::NS)
    }

    /// Returns the SOA record from the authority section, if present.
    pub fn authority_soa(&self) -> Option<&ResourceRecord> {
        self.authority.iter().find(|r| r.rtype() == RecordType::SOA)
    }

    /// Returns the authority records of a given type.
    pub fn authority_of_type(
        &self,
        rtype: RecordType,
    ) -> impl Iterator<Item = &ResourceRecord> {
        self.authority.iter().filter(move |r| r.rtype() == rtype)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ";; {} ;{}", self.rcode, self.question)?;
        for r in &self.answer {
            writeln!(f, "{}", r)?;
        }
        for r in &self.authority {
            writeln!(f, "{}", r)?;
        }
        Ok(())
    }
}
