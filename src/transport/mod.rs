//! # Transport Layer
//!
//! Network listeners that own client sockets.
//!
//! Each accepted connection gets one task. That task is the only writer to
//! its socket: it writes handler replies and drains the session's outbound
//! queue, so packets pushed from other connections never interleave with
//! its own writes.

pub mod tcp;
