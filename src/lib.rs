//! Entente library.
//!
//! Exposes the DAIDE token language, the binary wire framing, the map and
//! unit state, the DPTG adjudicator, the client protocol engine, and the
//! bot interface for use by integration tests and the binary entry point.

pub mod board;
pub mod bot;
pub mod client;
pub mod judge;
pub mod token;
pub mod wire;
