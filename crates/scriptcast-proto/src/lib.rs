//! Wire protocol for scriptcast.
//!
//! Script-execution targets accept a single frame kind: an "execute" frame
//! carrying one UTF-8 script buffer. This crate provides the frame layout,
//! an encoder/decoder codec for stream sockets, and a pure encoding helper
//! for the fan-out path where one frame is written to many connections.

pub mod frame;

pub use frame::{FrameError, HEADER_LEN, OPCODE_EXECUTE, ScriptCodec, encode_script};
