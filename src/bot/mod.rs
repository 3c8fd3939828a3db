//! The bot interface.
//!
//! A bot is a set of event hooks, every one defaulted to a no-op. Hooks
//! receive the session, read the game state from it, enter orders through
//! the state's order setters, and call `send_orders` (or the press helpers)
//! to transmit. The state mutators on `Session::state` are the entire
//! command surface; bots never see frames or raw sockets.

pub mod holdbot;
pub mod randbot;

use crate::client::Session;
use crate::token::{Token, TokenMessage};

pub use holdbot::HoldBot;
pub use randbot::RandBot;

/// Event hooks a bot may implement.
pub trait Bot {
    /// The name and version to join with; `None` joins as an observer.
    fn identity(&self) -> Option<(&str, &str)> {
        None
    }

    /// The map name arrived; the definition has been requested.
    fn on_map(&mut self, _session: &mut Session) {}

    /// The map definition has been stored.
    fn on_mdf(&mut self, _session: &mut Session) {}

    /// The power to play has been stored.
    fn on_hlo(&mut self, _session: &mut Session) {}

    /// Centre ownership has been updated.
    fn on_sco(&mut self, _session: &mut Session) {}

    /// Unit positions have been replaced. This is where orders are due.
    fn on_now(&mut self, _session: &mut Session) {}

    /// A historical result has been stored.
    fn on_ord(&mut self, _session: &mut Session) {}

    /// A power went into civil disorder.
    fn on_ccd(&mut self, _session: &mut Session, _power: Token, _is_new: bool) {}

    /// A power came back from civil disorder.
    fn on_not_ccd(&mut self, _session: &mut Session, _power: Token, _is_new: bool) {}

    /// A power was eliminated.
    fn on_out(&mut self, _session: &mut Session, _power: Token) {}

    /// The game ended in a draw.
    fn on_drw(&mut self, _session: &mut Session) {}

    /// The game ended in a solo victory.
    fn on_slo(&mut self, _session: &mut Session, _winner: Token) {}

    /// The end-of-game summary arrived.
    fn on_smr(&mut self, _session: &mut Session, _message: &TokenMessage) {}

    /// The server ordered us off.
    fn on_off(&mut self, _session: &mut Session) {}

    /// A deadline advisory arrived.
    fn on_tme(&mut self, _session: &mut Session, _message: &TokenMessage) {}

    /// Press arrived. The engine has already answered unparseable press
    /// with HUH and TRY.
    fn on_frm(&mut self, _session: &mut Session, _message: &TokenMessage) {}

    /// Press could not be delivered and partial resend was not allowed.
    fn on_failed_press(
        &mut self,
        _session: &mut Session,
        _is_broadcast: bool,
        _receiving_powers: &TokenMessage,
        _press_message: &TokenMessage,
    ) {
    }
}
