//! Map and unit state.
//!
//! `map` holds the province/coast graph built from an MDF message,
//! `standard` the embedded standard map, `unit` the unit and order records,
//! `game` the combined session state, and `orders` the order submission,
//! validation, and message round-trip paths.

pub mod game;
pub mod map;
pub mod orders;
pub mod standard;
pub mod unit;

pub use game::GameState;
pub use map::{CoastId, Map, MdfError, PowerIndex, ProvinceIndex};
pub use unit::{Order, Unit, WinterOrders};
