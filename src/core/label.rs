//! # Label/Tag Codec
//!
//! Every TDF value is named by a label of up to four characters, packed on
//! the wire into a 3-byte tag. Each character is reduced to six bits
//! (bit 6 of the ASCII code, then bits 4..0) and the four 6-bit values are
//! laid out big-endian across 24 bits. Short labels are padded with spaces,
//! which pack to zero and are trimmed again on decode.
//!
//! Labels built by this crate are restricted to `A-Z` and `0-9`; tags read
//! off the wire are decoded as-is.

use std::fmt;

use crate::error::{BlazeError, Result};

/// Maximum number of characters in a label.
pub const MAX_LABEL_LEN: usize = 4;

const PAD: u8 = b' ';

/// A decoded TDF label, stored space padded.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label([u8; MAX_LABEL_LEN]);

const fn is_label_char(c: u8) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit()
}

const fn pack_char(c: u8) -> u8 {
    ((c & 0x40) >> 1) | (c & 0x1F)
}

const fn unpack_char(v: u8) -> u8 {
    if v & 0x20 != 0 {
        0x40 | (v & 0x1F)
    } else {
        0x20 | (v & 0x1F)
    }
}

impl Label {
    /// Build a label at compile time. Invalid input fails const evaluation.
    ///
    /// ```rust
    /// use blaze_protocol::core::label::Label;
    /// const GID: Label = Label::from_static("GID");
    /// assert_eq!(GID.as_str(), "GID");
    /// ```
    pub const fn from_static(name: &str) -> Self {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > MAX_LABEL_LEN {
            panic!("label must be 1 to 4 characters");
        }
        let mut out = [PAD; MAX_LABEL_LEN];
        let mut i = 0;
        while i < bytes.len() {
            if !is_label_char(bytes[i]) {
                panic!("label characters must be A-Z or 0-9");
            }
            out[i] = bytes[i];
            i += 1;
        }
        Self(out)
    }

    /// Parse a label from runtime input, rejecting characters outside `A-Z0-9`.
    pub fn parse(name: &str) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty()
            || bytes.len() > MAX_LABEL_LEN
            || !bytes.iter().all(|&c| is_label_char(c))
        {
            return Err(BlazeError::InvalidLabel(name.to_string()));
        }
        let mut out = [PAD; MAX_LABEL_LEN];
        out[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Pack into the 3-byte wire tag.
    pub const fn to_tag(self) -> [u8; 3] {
        let packed = (pack_char(self.0[0]) as u32) << 18
            | (pack_char(self.0[1]) as u32) << 12
            | (pack_char(self.0[2]) as u32) << 6
            | pack_char(self.0[3]) as u32;
        [(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]
    }

    /// Unpack a 3-byte wire tag. Total over all inputs.
    pub const fn from_tag(tag: [u8; 3]) -> Self {
        let packed = (tag[0] as u32) << 16 | (tag[1] as u32) << 8 | tag[2] as u32;
        Self([
            unpack_char(((packed >> 18) & 0x3F) as u8),
            unpack_char(((packed >> 12) & 0x3F) as u8),
            unpack_char(((packed >> 6) & 0x3F) as u8),
            unpack_char((packed & 0x3F) as u8),
        ])
    }

    /// The label text with trailing padding removed.
    pub fn as_str(&self) -> &str {
        let len = self
            .0
            .iter()
            .rposition(|&c| c != PAD)
            .map_or(0, |last| last + 1);
        std::str::from_utf8(&self.0[..len]).unwrap_or_default()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({:?})", self.as_str())
    }
}

impl std::str::FromStr for Label {
    type Err = BlazeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
