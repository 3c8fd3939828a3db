//! The DAIDE binary wire protocol.
//!
//! Frames are length-prefixed typed records over TCP. `frame` owns the
//! encoding (all 16-bit quantities are big-endian on the wire; no other
//! module deals with byte order) and `socket` the queued, full-message
//! socket I/O.

pub mod frame;
pub mod socket;

pub use frame::{Frame, FrameError, NameEntry};
pub use socket::FramedSocket;
