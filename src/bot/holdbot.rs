//! The trivial sample bot: every unit holds.

use crate::bot::Bot;
use crate::client::Session;

/// Orders every unit to hold, disbands anything dislodged, and removes or
/// waives through winter.
pub struct HoldBot;

impl HoldBot {
    pub fn new() -> HoldBot {
        HoldBot
    }
}

impl Default for HoldBot {
    fn default() -> HoldBot {
        HoldBot::new()
    }
}

impl Bot for HoldBot {
    fn identity(&self) -> Option<(&str, &str)> {
        Some(("HoldBot", "1.0"))
    }

    fn on_now(&mut self, session: &mut Session) {
        let state = &mut session.state;
        if state.is_movement_season() {
            for unit in state.our_units.clone() {
                state.set_hold_order(unit);
            }
        } else if state.is_retreat_season() {
            for unit in state.our_dislodged_units.clone() {
                state.set_disband_order(unit);
            }
        } else {
            let units = state.our_units.len();
            let centres = state.our_centres.len();
            if units > centres {
                let disbands: Vec<_> = state
                    .our_units
                    .iter()
                    .copied()
                    .take(units - centres)
                    .collect();
                for unit in disbands {
                    state.set_remove_order(unit);
                }
            } else if centres > units {
                state.set_multiple_waive_orders((centres - units) as u32);
            }
        }
        session.send_orders();
    }
}
