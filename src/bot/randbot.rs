//! A sample bot that plays uniformly random legal moves.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::bot::Bot;
use crate::client::Session;
use crate::token::lexicon;

/// Moves every unit to a random adjacent coast, disbands anything
/// dislodged, and builds on random open home centres.
pub struct RandBot {
    rng: SmallRng,
}

impl RandBot {
    pub fn new() -> RandBot {
        RandBot {
            rng: SmallRng::from_entropy(),
        }
    }

    /// A deterministic bot for tests.
    pub fn seeded(seed: u64) -> RandBot {
        RandBot {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn pick<T: Copy>(&mut self, items: &[T]) -> Option<T> {
        if items.is_empty() {
            None
        } else {
            Some(items[self.rng.gen_range(0..items.len())])
        }
    }
}

impl Default for RandBot {
    fn default() -> RandBot {
        RandBot::new()
    }
}

impl Bot for RandBot {
    fn identity(&self) -> Option<(&str, &str)> {
        Some(("RandBot", "1.0"))
    }

    fn on_now(&mut self, session: &mut Session) {
        let state = &mut session.state;
        if state.game_over {
            return;
        }

        if state.is_movement_season() {
            for unit in state.our_units.clone() {
                let destinations: Vec<_> = state
                    .adjacent_coasts_of_unit(unit)
                    .map(|adjacent| adjacent.iter().copied().collect())
                    .unwrap_or_default();
                match self.pick(&destinations) {
                    Some(destination) => state.set_move_order(unit, destination),
                    None => state.set_hold_order(unit),
                };
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
                let mut builds_left = centres - units;
                let mut open = state.open_home_centres.clone();
                while builds_left > 0 && !open.is_empty() {
                    let candidates: Vec<_> = open.iter().copied().collect();
                    let province = match self.pick(&candidates) {
                        Some(province) => province,
                        None => break,
                    };
                    let coasts: Vec<_> = state
                        .map
                        .province(province)
                        .coasts
                        .keys()
                        .copied()
                        .collect();
                    let coast = self.pick(&coasts).unwrap_or(lexicon::AMY);
                    state.set_build_order(crate::board::CoastId::new(province, coast));
                    builds_left -= 1;
                    open.remove(&province);
                }
                state.set_multiple_waive_orders(builds_left as u32);
            }
        }
        session.send_orders();
    }
}
