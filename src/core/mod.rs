//! # Core Protocol Components
//!
//! Low-level packet handling, codecs, and the TDF value format.
//!
//! ## Components
//! - **VarInt**: variable-length signed integers
//! - **Label**: 4-character field names packed into 3-byte tags
//! - **Tdf**: recursive tagged values carried in packet bodies
//! - **Packet**: header plus lazily parsed content
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [Length(2)] [Component(2)] [Command(2)] [Error(2)] [Type(1)] [Flags(1)] [Id(2)] [LengthHigh(2)?] [Content(N)]
//! ```
//!
//! ## Safety Limits
//! - Maximum frame content: 16MB by default (`config::MAX_PACKET_SIZE`)
//! - Maximum value nesting: `config::MAX_TDF_DEPTH`
//! - Length prefixes are validated against the remaining input before allocation

pub mod codec;
pub mod label;
pub mod packet;
pub mod tdf;
pub mod varint;
