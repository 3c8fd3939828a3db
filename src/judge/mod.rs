//! The turn adjudicator.
//!
//! A deterministic, total function from orders and positions to results:
//! illegal orders are downgraded and flagged, never rejected. `movement`
//! implements the DPTG movement algorithm, `retreat` and `build` the two
//! simpler phases, and `apply` moves the board to the next turn.

pub mod apply;
pub mod build;
pub mod movement;
pub mod retreat;

use crate::board::GameState;

/// Adjudicates the current turn in place. Results land in each unit's
/// resolution record (or in the winter order records in winter).
pub fn adjudicate(state: &mut GameState) {
    if state.is_retreat_season() {
        retreat::adjudicate_retreats(state);
    } else if state.is_winter() {
        build::adjudicate_builds(state);
    } else {
        movement::adjudicate_moves(state);
    }
}

/// Applies the adjudicated turn and advances the season. Returns true when
/// a supply-centre ownership update should be announced.
pub fn apply_adjudication(state: &mut GameState) -> bool {
    if state.is_retreat_season() {
        apply::apply_retreats(state);
    } else if state.is_winter() {
        apply::apply_builds(state);
    } else {
        apply::apply_moves(state);
    }
    apply::move_to_next_turn(state)
}
