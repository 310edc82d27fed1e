//! # Packet
//!
//! A framed Blaze message: fixed header plus raw TDF content.
//!
//! Content is kept as the raw bytes received and parsed into records on
//! first access; the parse result (success or failure) is cached for the
//! packet's lifetime. Packets built locally from records are seeded with
//! those records, so they never re-parse their own output.

use std::fmt;
use std::sync::OnceLock;

use bytes::{Bytes, BytesMut};

use crate::core::codec::write_frame;
use crate::core::label::Label;
use crate::core::tdf::{decode_all, encode_all, FieldLookup, Tdf, TdfError};
use crate::error::Result;

/// Message kind, carried in the high byte of the 16-bit type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Client to server request
    Incoming,
    /// Reply paired to a request id
    Response,
    /// Unsolicited server to client notification (id 0)
    Unique,
    /// Error reply paired to a request id
    Error,
    /// Any other high byte, kept as received
    Other(u8),
}

impl PacketType {
    pub const fn to_byte(self) -> u8 {
        match self {
            PacketType::Incoming => 0x00,
            PacketType::Response => 0x10,
            PacketType::Unique => 0x20,
            PacketType::Error => 0x30,
            PacketType::Other(byte) => byte,
        }
    }

    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => PacketType::Incoming,
            0x10 => PacketType::Response,
            0x20 => PacketType::Unique,
            0x30 => PacketType::Error,
            other => PacketType::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub component: u16,
    pub command: u16,
    pub error: u16,
    pub ty: PacketType,
    pub id: u16,
}

impl PacketHeader {
    pub const fn request(component: u16, command: u16, id: u16) -> Self {
        Self {
            component,
            command,
            error: 0,
            ty: PacketType::Incoming,
            id,
        }
    }

    pub const fn notify(component: u16, command: u16) -> Self {
        Self {
            component,
            command,
            error: 0,
            ty: PacketType::Unique,
            id: 0,
        }
    }

    /// Response header paired to this request.
    pub const fn response(&self) -> Self {
        Self {
            component: self.component,
            command: self.command,
            error: 0,
            ty: PacketType::Response,
            id: self.id,
        }
    }

    /// Error header paired to this request.
    pub const fn with_error(&self, error: u16) -> Self {
        Self {
            component: self.component,
            command: self.command,
            error,
            ty: PacketType::Error,
            id: self.id,
        }
    }

    /// Routing key used by the dispatcher.
    #[inline]
    pub const fn route(&self) -> (u16, u16) {
        (self.component, self.command)
    }
}

/// A single frame.
#[derive(Clone)]
pub struct Packet {
    pub header: PacketHeader,
    contents: Bytes,
    records: OnceLock<std::result::Result<Vec<Tdf>, TdfError>>,
}

impl Packet {
    /// Wrap received content; records are parsed lazily.
    pub fn raw(header: PacketHeader, contents: Bytes) -> Self {
        Self {
            header,
            contents,
            records: OnceLock::new(),
        }
    }

    /// Build from records, encoding them immediately.
    pub fn new(header: PacketHeader, records: Vec<Tdf>) -> Self {
        let contents = encode_all(&records);
        Self {
            header,
            contents,
            records: OnceLock::from(Ok(records)),
        }
    }

    pub fn request(component: u16, command: u16, id: u16, records: Vec<Tdf>) -> Self {
        Self::new(PacketHeader::request(component, command, id), records)
    }

    pub fn notify(component: u16, command: u16, records: Vec<Tdf>) -> Self {
        Self::new(PacketHeader::notify(component, command), records)
    }

    pub fn response(request: &Packet, records: Vec<Tdf>) -> Self {
        Self::new(request.header.response(), records)
    }

    /// Response with the request's id and no content.
    pub fn response_empty(request: &Packet) -> Self {
        Self::raw(request.header.response(), Bytes::new())
    }

    pub fn error(request: &Packet, code: u16, records: Vec<Tdf>) -> Self {
        Self::new(request.header.with_error(code), records)
    }

    pub fn error_empty(request: &Packet, code: u16) -> Self {
        Self::raw(request.header.with_error(code), Bytes::new())
    }

    /// Raw content bytes as carried on the wire.
    pub fn contents(&self) -> &Bytes {
        &self.contents
    }

    /// Parsed top-level records, decoded on first call.
    pub fn records(&self) -> std::result::Result<&[Tdf], TdfError> {
        match self
            .records
            .get_or_init(|| decode_all(&self.contents))
        {
            Ok(records) => Ok(records),
            Err(e) => Err(e.clone()),
        }
    }

    /// Whether the content has been parsed yet.
    pub fn is_parsed(&self) -> bool {
        self.records.get().is_some()
    }

    /// First top-level record with `label`; `None` if absent or unparseable.
    pub fn field(&self, label: Label) -> Option<&Tdf> {
        self.records().ok().and_then(|records| records.field(label))
    }

    /// Encoded size including the header.
    pub fn frame_len(&self) -> usize {
        let len = self.contents.len();
        if len > 0xFFFF {
            crate::core::codec::EXTENDED_HEADER_LEN + len
        } else {
            crate::core::codec::HEADER_LEN + len
        }
    }

    /// Encode into a standalone frame.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.frame_len());
        write_frame(self, &mut buf, usize::MAX)?;
        Ok(buf.freeze())
    }

    /// Decode exactly one complete frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Packet> {
        let mut buf = BytesMut::from(bytes);
        crate::core::codec::PacketCodec::unbounded()
            .decode_frame(&mut buf)?
            .ok_or(crate::error::BlazeError::InvalidHeader)
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.contents == other.contents
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Packet");
        out.field("component", &format_args!("{:#06x}", self.header.component))
            .field("command", &format_args!("{:#06x}", self.header.command))
            .field("error", &self.header.error)
            .field("type", &self.header.ty)
            .field("id", &self.header.id)
            .field("length", &self.contents.len());
        match self.records() {
            Ok(records) => out.field("content", &records),
            Err(e) => out
                .field("content_error", &e)
                .field("raw", &format_args!("{:02x?}", &self.contents[..])),
        };
        out.finish()
    }
}
