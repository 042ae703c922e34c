//! Protocol error types.

use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// DNS protocol errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Buffer is too short to contain the expected data.
    #[error("buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort {
        /// Expected minimum size.
        expected: usize,
        /// Actual buffer size.
        actual: usize,
    },

    /// Unexpected end of data while parsing.
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof {
        /// Byte offset where the data ran out.
        offset: usize,
    },

    /// Label exceeds the maximum length of 63 bytes.
    #[error("label too long: {length} bytes exceeds maximum of 63")]
    LabelTooLong {
        /// Actual label length.
        length: usize,
    },

    /// Domain name exceeds the maximum wire length of 255 bytes.
    #[error("name too long: {length} bytes exceeds maximum of 255")]
    NameTooLong {
        /// Actual name length in wire format.
        length: usize,
    },

    /// Invalid character in a presentation-format label.
    #[error("invalid character '{character}' in label at position {position}")]
    InvalidLabelChar {
        /// The offending character.
        character: char,
        /// Position within the label.
        position: usize,
    },

    /// Compression pointer inside a stored (uncompressed) name.
    #[error("compression pointer at offset {offset} in stored name")]
    CompressedName {
        /// Offset of the pointer byte.
        offset: usize,
    },

    /// Invalid or unsupported record type.
    #[error("invalid record type: {value}")]
    InvalidRecordType {
        /// The invalid type value.
        value: u16,
    },

    /// Invalid or unsupported record class.
    #[error("invalid record class: {value}")]
    InvalidRecordClass {
        /// The invalid class value.
        value: u16,
    },

    /// Invalid response code value.
    #[error("invalid response code: {value}")]
    InvalidResponseCode {
        /// The invalid rcode value.
        value: u16,
    },

    /// Invalid RDATA content.
    #[error("invalid RDATA for {rtype}: {message}")]
    InvalidRData {
        /// Record type name.
        rtype: &'static str,
        /// Error description.
        message: &'static str,
    },
}

impl Error {
    /// Creates a new `BufferTooShort` error.
    #[inline]
    pub fn buffer_too_short(expected: usize, actual: usize) -> Self {
        Self::BufferTooShort { expected, actual }
    }

    /// Creates a new `UnexpectedEof` error.
    #[inline]
    pub fn unexpected_eof(offset: usize) -> Self {
        Self::UnexpectedEof { offset }
    }

    /// Creates a new `InvalidRData` error.
    #[inline]
    pub fn invalid_rdata(rtype: &'static str, message: &'static str) -> Self {
        Self::InvalidRData { rtype, message }
    }

    /// Returns true if this error indicates a malformed name.
    #[inline]
    pub fn is_malformed_name(&self) -> bool {
        matches!(
            self,
            Self::LabelTooLong { .. }
                | Self::NameTooLong { .. }
                | Self::InvalidLabelChar { .. }
                | Self::CompressedName { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::buffer_too_short(12, 8);
        assert_eq!(
            err.to_string(),
            "buffer too short: expected at least 12 bytes, got 8"
        );

        let err = Error::NameTooLong { length: 300 };
        assert_eq!(
            err.to_string(),
            "name too long: 300 bytes exceeds maximum of 255"
        );
    }

    #[test]
    fn test_malformed_name_classification() {
        assert!(Error::LabelTooLong { length: 64 }.is_malformed_name());
        assert!(Error::CompressedName { offset: 3 }.is_malformed_name());
        assert!(!Error::buffer_too_short(4, 2).is_malformed_name());
    }
}
