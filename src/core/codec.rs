//! # Packet Framing Codec
//!
//! Tokio codec for the Blaze packet envelope over a byte stream.
//!
//! ## Wire Format (big-endian)
//! ```text
//! [Length(2)] [Component(2)] [Command(2)] [Error(2)] [Type(1)] [Flags(1)] [Id(2)]
//! [LengthHigh(2), only when Flags & 0x10] [Content(N)]
//! ```
//!
//! The decoder only peeks at the header until the whole frame is buffered,
//! so a partial frame leaves the read buffer untouched and decoding resumes
//! from the same position when more bytes arrive.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::config::MAX_PACKET_SIZE;
use crate::core::packet::{Packet, PacketHeader, PacketType};
use crate::error::{BlazeError, Result};

/// Header size without the extended length field.
pub const HEADER_LEN: usize = 12;

/// Header size with the extended length field.
pub const EXTENDED_HEADER_LEN: usize = 14;

/// Flag byte value marking a content length above 16 bits.
pub const EXTENDED_LENGTH_FLAG: u8 = 0x10;

#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    max_packet_size: usize,
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(MAX_PACKET_SIZE)
    }
}

impl PacketCodec {
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }

    /// Codec accepting any length the envelope can express.
    pub fn unbounded() -> Self {
        Self::new(u32::MAX as usize)
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Decode one frame if fully buffered. Consumes nothing otherwise.
    pub fn decode_frame(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let length_low = u16::from_be_bytes([src[0], src[1]]) as usize;
        let component = u16::from_be_bytes([src[2], src[3]]);
        let command = u16::from_be_bytes([src[4], src[5]]);
        let error = u16::from_be_bytes([src[6], src[7]]);
        let type_byte = src[8];
        let flags = src[9];
        let id = u16::from_be_bytes([src[10], src[11]]);

        // Unrecognised types still frame normally; routing ignores the type
        let ty = PacketType::from_byte(type_byte);

        let (header_len, length) = if flags & EXTENDED_LENGTH_FLAG != 0 {
            if src.len() < EXTENDED_HEADER_LEN {
                return Ok(None);
            }
            let length_high = u16::from_be_bytes([src[12], src[13]]) as usize;
            (EXTENDED_HEADER_LEN, (length_high << 16) | length_low)
        } else {
            (HEADER_LEN, length_low)
        };

        if length > self.max_packet_size {
            return Err(BlazeError::OversizedPacket(length));
        }

        let frame_len = header_len + length;
        if src.len() < frame_len {
            // Wait for the rest; the buffer position is left where this frame starts
            src.reserve(frame_len - src.len());
            trace!(
                buffered = src.len(),
                needed = frame_len,
                "Partial frame buffered"
            );
            return Ok(None);
        }

        src.advance(header_len);
        let contents = src.split_to(length).freeze();

        let header = PacketHeader {
            component,
            command,
            error,
            ty,
            id,
        };
        Ok(Some(Packet::raw(header, contents)))
    }
}

/// Write `packet` as one frame.
pub fn write_frame(packet: &Packet, dst: &mut BytesMut, max_packet_size: usize) -> Result<()> {
    let contents = packet.contents();
    let length = contents.len();
    if length > max_packet_size || length > u32::MAX as usize {
        return Err(BlazeError::OversizedPacket(length));
    }
    let extended = length > 0xFFFF;

    dst.reserve(packet.frame_len());
    dst.put_u16(length as u16);
    dst.put_u16(packet.header.component);
    dst.put_u16(packet.header.command);
    dst.put_u16(packet.header.error);
    dst.put_u8(packet.header.ty.to_byte());
    dst.put_u8(if extended { EXTENDED_LENGTH_FLAG } else { 0 });
    dst.put_u16(packet.header.id);
    if extended {
        dst.put_u16((length >> 16) as u16);
    }
    dst.extend_from_slice(contents);
    Ok(())
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = BlazeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.decode_frame(src)
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = BlazeError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        write_frame(&packet, dst, self.max_packet_size)
    }
}

impl Encoder<&Packet> for PacketCodec {
    type Error = BlazeError;

    fn encode(&mut self, packet: &Packet, dst: &mut BytesMut) -> Result<()> {
        write_frame(packet, dst, self.max_packet_size)
    }
}
