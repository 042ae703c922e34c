//! DNS domain name representation and canonical-order operations.
//!
//! Names are stored in uncompressed wire format. This is what the
//! negative cache indexes on: canonical ordering (RFC 4034 Section 6.1)
//! and NSEC3 hashing are both defined over wire form, and the cache key
//! comparisons must match what a signer produced.

mod label;

pub use label::{Label, LabelIter};

use crate::error::{Error, Result};
use crate::{MAX_LABEL_LENGTH, MAX_NAME_LENGTH};
use bytes::{Bytes, BytesMut};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A DNS domain name in uncompressed wire format.
///
/// Each label is prefixed by its length byte and the name is terminated
/// by the zero-length root label. `www.example.com.` is stored as:
///
/// ```text
/// 03 'w' 'w' 'w' 07 'e' 'x' 'a' 'm' 'p' 'l' 'e' 03 'c' 'o' 'm' 00
/// ```
///
/// Equality and hashing are ASCII case-insensitive per RFC 1035; the
/// `Ord` implementation is RFC 4034 canonical order, which compares
/// label-by-label starting from the root. Compression pointers are
/// rejected: a stored name is always complete.
#[derive(Clone)]
pub struct Name {
    /// The wire-format bytes.
    wire: NameStorage,
    /// Number of labels, including the root label.
    label_count: u8,
}

/// Internal storage for name bytes.
///
/// Most owner names fit inline; shared storage covers names sliced out
/// of a larger buffer without copying.
#[derive(Clone)]
enum NameStorage {
    /// Inline storage for small names (the common case).
    Inline(SmallVec<[u8; 64]>),
    /// Shared reference to bytes.
    Shared(Bytes),
}

impl Name {
    /// Creates the root domain name.
    #[inline]
    pub const fn root() -> Self {
        Self {
            wire: NameStorage::Inline(SmallVec::new_const()),
            label_count: 1,
        }
    }

    /// Creates a name from wire-format bytes without copying.
    ///
    /// The bytes must be a complete uncompressed name.
    pub fn from_wire(wire: impl Into<Bytes>) -> Result<Self> {
        let bytes = wire.into();
        let label_count = Self::validate_wire(&bytes)?;
        Ok(Self {
            wire: NameStorage::Shared(bytes),
            label_count,
        })
    }

    /// Creates a name from a wire-format slice, copying the data.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let label_count = Self::validate_wire(slice)?;
        Ok(Self {
            wire: NameStorage::Inline(SmallVec::from_slice(slice)),
            label_count,
        })
    }

    /// Reads an uncompressed name from the front of a buffer.
    ///
    /// Returns the name and the number of bytes it occupied. Used for
    /// RDATA fields that embed names (SOA MNAME, NSEC next owner).
    pub fn parse_prefix(buf: &[u8]) -> Result<(Self, usize)> {
        let mut pos = 0usize;
        loop {
            if pos >= buf.len() {
                return Err(Error::unexpected_eof(pos));
            }
            let len = buf[pos] as usize;
            if len == 0 {
                pos += 1;
                return Ok((Self::from_slice(&buf[..pos])?, pos));
            }
            if len >= 0xC0 {
                return Err(Error::CompressedName { offset: pos });
            }
            pos += 1 + len;
            if pos > MAX_NAME_LENGTH {
                return Err(Error::NameTooLong { length: pos });
            }
        }
    }

    /// Validates wire format and returns the label count.
    fn validate_wire(bytes: &[u8]) -> Result<u8> {
        if bytes.is_empty() {
            // Just the implicit root.
            return Ok(1);
        }

        let mut pos = 0usize;
        let mut labels = 0u8;

        loop {
            if pos >= bytes.len() {
                // Names must end with the zero root label; an empty
                // buffer was handled above, so running off the end here
                // is a truncated name.
                return Err(Error::unexpected_eof(pos));
            }
            let len = bytes[pos] as usize;

            if len == 0 {
                labels += 1;
                if pos + 1 != bytes.len() {
                    // Trailing garbage after the root label.
                    return Err(Error::unexpected_eof(pos + 1));
                }
                return Ok(labels);
            }
            if len >= 0xC0 {
                return Err(Error::CompressedName { offset: pos });
            }
            if len > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong { length: len });
            }

            pos += 1 + len;
            if pos > MAX_NAME_LENGTH {
                return Err(Error::NameTooLong { length: pos });
            }
            if pos > bytes.len() {
                return Err(Error::unexpected_eof(bytes.len()));
            }
            labels += 1;
        }
    }

    /// Returns the wire-format bytes.
    #[inline]
    pub fn as_wire(&self) -> &[u8] {
        match &self.wire {
            NameStorage::Inline(v) => v.as_slice(),
            NameStorage::Shared(b) => b.as_ref(),
        }
    }

    /// Returns the wire-format length, including the terminating zero.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.as_wire().len().max(1)
    }

    /// Wire form with the root normalized to a single zero byte.
    ///
    /// The root name may be stored as an empty buffer; equality and
    /// hashing must not distinguish the two spellings.
    #[inline]
    fn wire_norm(&self) -> &[u8] {
        let wire = self.as_wire();
        if wire.is_empty() {
            &[0]
        } else {
            wire
        }
    }

    /// Returns the number of labels, including the root label.
    #[inline]
    pub const fn label_count(&self) -> usize {
        self.label_count as usize
    }

    /// Returns true if this is the root domain.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.label_count == 1
    }

    /// Returns an iterator over the labels, leftmost first.
    #[inline]
    pub fn labels(&self) -> LabelIter<'_> {
        LabelIter::new(self.as_wire())
    }

    /// Byte offsets of the non-root labels within the wire form.
    fn label_offsets(&self) -> SmallVec<[u8; 32]> {
        let wire = self.as_wire();
        let mut offsets = SmallVec::new();
        let mut pos = 0usize;
        while pos < wire.len() && wire[pos] != 0 {
            offsets.push(pos as u8);
            pos += 1 + wire[pos] as usize;
        }
        offsets
    }

    /// Label at a given wire offset.
    fn label_at(&self, offset: u8) -> Label<'_> {
        let wire = self.as_wire();
        let pos = offset as usize;
        let len = wire[pos] as usize;
        Label::from_bytes(&wire[pos + 1..pos + 1 + len])
    }

    /// Canonical comparison per RFC 4034 Section 6.1.
    ///
    /// Labels are compared starting from the root; the first unequal
    /// pair decides. If one name is a proper ancestor of the other, the
    /// ancestor (fewer labels) sorts first.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        let a = self.label_offsets();
        let b = other.label_offsets();

        for (ai, bi) in a.iter().rev().zip(b.iter().rev()) {
            let cmp = self.label_at(*ai).cmp_canonical(&other.label_at(*bi));
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        a.len().cmp(&b.len())
    }

    /// Returns the parent name (the leftmost label removed).
    ///
    /// Returns `None` for the root domain.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        let wire = self.as_wire();
        let rest = 1 + wire[0] as usize;
        if rest + 1 >= wire.len() {
            return Some(Self::root());
        }
        Self::from_slice(&wire[rest..]).ok()
    }

    /// Returns true if this name is a strict subdomain of `other`.
    ///
    /// A name is a strict subdomain when it has more labels and its
    /// trailing labels equal `other`.
    pub fn is_strict_subdomain_of(&self, other: &Name) -> bool {
        self.label_count > other.label_count
            && self.common_label_count(other) == other.label_count()
    }

    /// Returns true if this name equals `other` or is a subdomain of it.
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        self.label_count >= other.label_count
            && self.common_label_count(other) == other.label_count()
    }

    /// Number of labels shared with `other`, counted from the root.
    ///
    /// Always at least 1: every name shares the root label. This is the
    /// label arithmetic behind closest-encloser computation.
    pub fn common_label_count(&self, other: &Name) -> usize {
        let a = self.label_offsets();
        let b = other.label_offsets();

        let mut common = 1; // the root label
        for (ai, bi) in a.iter().rev().zip(b.iter().rev()) {
            if !self.label_at(*ai).eq_ignore_ascii_case(&other.label_at(*bi)) {
                break;
            }
            common += 1;
        }
        common
    }

    /// Returns the trailing `count` labels of this name as a new name.
    ///
    /// `count` includes the root label; `ancestor(1)` is the root and
    /// `ancestor(label_count())` is the name itself. Returns `None` when
    /// `count` is out of range.
    pub fn ancestor(&self, count: usize) -> Option<Self> {
        if count == 0 || count > self.label_count() {
            return None;
        }
        let mut name = self.clone();
        for _ in 0..self.label_count() - count {
            name = name.parent()?;
        }
        Some(name)
    }

    /// Returns a new name formed by prepending a label.
    pub fn prepend_label(&self, label: &[u8]) -> Result<Self> {
        if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
            return Err(Error::LabelTooLong { length: label.len() });
        }

        let tail = self.as_wire();
        let new_len = 1 + label.len() + tail.len().max(1);
        if new_len > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong { length: new_len });
        }

        let mut wire = SmallVec::with_capacity(new_len);
        wire.push(label.len() as u8);
        wire.extend_from_slice(label);
        if tail.is_empty() {
            wire.push(0);
        } else {
            wire.extend_from_slice(tail);
        }

        Ok(Self {
            wire: NameStorage::Inline(wire),
            label_count: self.label_count + 1,
        })
    }

    /// Returns `*.self`, the wildcard name directly under this name.
    pub fn prepend_wildcard(&self) -> Result<Self> {
        self.prepend_label(b"*")
    }

    /// Lowercases the name in place.
    pub fn make_lowercase(&mut self) {
        match &mut self.wire {
            NameStorage::Inline(v) => v.make_ascii_lowercase(),
            NameStorage::Shared(b) => {
                if b.iter().any(u8::is_ascii_uppercase) {
                    let mut bytes = BytesMut::from(b.as_ref());
                    bytes.make_ascii_lowercase();
                    *b = bytes.freeze();
                }
            }
        }
    }

    /// Returns a lowercased copy of the name.
    #[must_use]
    pub fn lowercased(&self) -> Self {
        let mut copy = self.clone();
        copy.make_lowercase();
        copy
    }

    /// Appends the wire form to a buffer.
    pub fn write_wire(&self, buf: &mut BytesMut) {
        let wire = self.as_wire();
        if wire.is_empty() {
            buf.extend_from_slice(&[0]);
        } else {
            buf.extend_from_slice(wire);
        }
    }

    /// Returns the presentation form, with a trailing dot.
    pub fn to_presentation(&self) -> CompactString {
        let mut out = CompactString::new("");
        for label in self.labels() {
            if !label.is_root() {
                out.push_str(&label.to_string());
                out.push('.');
            }
        }
        if out.is_empty() {
            out.push('.');
        }
        out
    }
}

impl FromStr for Name {
    type Err = Error;

    /// Parses a name from dotted presentation format.
    ///
    /// A trailing dot is accepted and implied when absent.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s == "." {
            return Ok(Self::root());
        }

        let s = s.strip_suffix('.').unwrap_or(s);
        let mut wire = SmallVec::<[u8; 64]>::new();
        let mut label_count = 1u8; // root

        for part in s.split('.') {
            if part.len() > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong { length: part.len() });
            }
            for (i, c) in part.chars().enumerate() {
                if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '*' {
                    return Err(Error::InvalidLabelChar {
                        character: c,
                        position: i,
                    });
                }
            }
            wire.push(part.len() as u8);
            wire.extend_from_slice(part.as_bytes());
            label_count += 1;

            if wire.len() + 1 > MAX_NAME_LENGTH {
                return Err(Error::NameTooLong { length: wire.len() + 1 });
            }
        }

        wire.push(0);

        Ok(Self {
            wire: NameStorage::Inline(wire),
            label_count,
        })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_presentation())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name(\"{}\")", self)
    }
}

impl PartialEq for Name {
    /// Case-insensitive equality per DNS semantics.
    fn eq(&self, other: &Self) -> bool {
        self.label_count == other.label_count
            && self.wire_norm().eq_ignore_ascii_case(other.wire_norm())
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for &byte in self.wire_norm() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    /// Canonical DNS name ordering per RFC 4034.
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_canonical(other)
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::root()
    }
}

impl Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_presentation())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    #[test]
    fn test_root() {
        let root = Name::root();
        assert!(root.is_root());
        assert_eq!(root.label_count(), 1);
        assert_eq!(root.to_string(), ".");
        assert_eq!(root.wire_len(), 1);
    }

    #[test]
    fn test_parse_and_display() {
        let n = name("www.example.com.");
        assert_eq!(n.label_count(), 4);
        assert_eq!(n.to_string(), "www.example.com.");
        assert_eq!(n, name("www.example.com"));
    }

    #[test]
    fn test_wire_roundtrip() {
        let n = name("a.example.");
        let wire = n.as_wire().to_vec();
        assert_eq!(wire, b"\x01a\x07example\x00");
        assert_eq!(Name::from_slice(&wire).unwrap(), n);
    }

    #[test]
    fn test_wire_validation() {
        // Truncated: label promises 5 bytes, only 2 present.
        assert!(Name::from_slice(b"\x05ab").is_err());
        // Compression pointer.
        assert!(Name::from_slice(&[0xC0, 0x04]).is_err());
        // Trailing bytes after root.
        assert!(Name::from_slice(b"\x01a\x00\x01b\x00").is_err());
        // Over 255 octets total.
        let mut long = Vec::new();
        for _ in 0..5 {
            long.push(63);
            long.extend_from_slice(&[b'x'; 63]);
        }
        long.push(0);
        assert!(matches!(
            Name::from_slice(&long),
            Err(Error::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_case_insensitive_eq_and_hash() {
        use std::collections::hash_map::DefaultHasher;

        let lower = name("www.example.com");
        let upper = name("WWW.EXAMPLE.COM");
        assert_eq!(lower, upper);

        let mut h1 = DefaultHasher::new();
        let mut h2 = DefaultHasher::new();
        lower.hash(&mut h1);
        upper.hash(&mut h2);
        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn test_parent_chain() {
        let n = name("www.example.com");
        assert_eq!(n.parent().unwrap(), name("example.com"));
        assert_eq!(n.parent().unwrap().parent().unwrap(), name("com"));
        assert!(n
            .parent()
            .unwrap()
            .parent()
            .unwrap()
            .parent()
            .unwrap()
            .is_root());
        assert!(Name::root().parent().is_none());
    }

    #[test]
    fn test_subdomain_tests() {
        let child = name("www.example.com");
        let parent = name("example.com");
        let other = name("other.com");

        assert!(child.is_strict_subdomain_of(&parent));
        assert!(!child.is_strict_subdomain_of(&child));
        assert!(child.is_subdomain_of(&child));
        assert!(!parent.is_strict_subdomain_of(&child));
        assert!(!child.is_strict_subdomain_of(&other));
        assert!(child.is_strict_subdomain_of(&Name::root()));
    }

    #[test]
    fn test_common_label_count() {
        assert_eq!(
            name("bar.example.").common_label_count(&name("a.example.")),
            2
        );
        assert_eq!(
            name("x.y.example.").common_label_count(&name("z.y.example.")),
            3
        );
        assert_eq!(name("com.").common_label_count(&name("org.")), 1);
    }

    #[test]
    fn test_ancestor() {
        let n = name("a.b.example.com");
        assert_eq!(n.ancestor(3).unwrap(), name("example.com"));
        assert!(n.ancestor(1).unwrap().is_root());
        assert_eq!(n.ancestor(5).unwrap(), n);
        assert!(n.ancestor(0).is_none());
        assert!(n.ancestor(6).is_none());
    }

    #[test]
    fn test_wildcard() {
        let wc = name("example.com").prepend_wildcard().unwrap();
        assert_eq!(wc.to_string(), "*.example.com.");
        assert_eq!(wc.label_count(), 4);
    }

    #[test]
    fn test_canonical_ordering_rfc4034() {
        // The example ordering from RFC 4034 Section 6.1.
        let ordered = [
            "example.",
            "a.example.",
            "yljkjljk.a.example.",
            "Z.a.example.",
            "zABC.a.EXAMPLE.",
            "z.example.",
            "*.z.example.",
        ];

        for window in ordered.windows(2) {
            let a = name(window[0]);
            let b = name(window[1]);
            assert!(a < b, "{} should sort before {}", a, b);
        }
    }

    #[test]
    fn test_ancestor_sorts_before_descendants() {
        assert!(name("example.") < name("a.example."));
        assert!(name("z.example.") > name("example."));
    }
}
