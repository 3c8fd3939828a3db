//! Retreat-turn adjudication.
//!
//! Two or more units retreating to the same province all bounce (and will
//! disband when the turn is applied); a unit with no retreat order simply
//! disbands. Illegal retreats are downgraded to disbands and flagged.

use std::collections::BTreeMap;

use crate::board::game::GameState;
use crate::board::map::ProvinceIndex;
use crate::board::unit::Order;
use crate::token::lexicon;

/// Resolves the retreat turn in place.
pub fn adjudicate_retreats(state: &mut GameState) {
    for unit in state.dislodged_units.values_mut() {
        unit.resolution.order = unit.order.clone();
        unit.resolution.bounce = false;
        unit.resolution.unit_moves = false;
        unit.resolution.illegal_order = false;
        unit.resolution.illegal_reason = None;
    }

    if state.check_orders_on_adjudication {
        check_for_illegal_retreat_orders(state);
    }

    // First retreat into a province wins provisionally; any later retreat
    // into the same province bounces both.
    let mut retreat_map: BTreeMap<ProvinceIndex, ProvinceIndex> = BTreeMap::new();
    let provinces: Vec<ProvinceIndex> = state.dislodged_units.keys().copied().collect();
    for province in provinces {
        let destination = match &state.dislodged_units[&province].resolution.order {
            Order::Retreat(dest) => dest.province,
            _ => continue,
        };
        match retreat_map.get(&destination) {
            Some(&earlier) => {
                let unit = state.dislodged_units.get_mut(&province).unwrap();
                unit.resolution.bounce = true;
                let earlier = state.dislodged_units.get_mut(&earlier).unwrap();
                earlier.resolution.unit_moves = false;
                earlier.resolution.bounce = true;
            }
            None => {
                retreat_map.insert(destination, province);
                let unit = state.dislodged_units.get_mut(&province).unwrap();
                unit.resolution.unit_moves = true;
            }
        }
    }
}

/// Downgrades impossible retreats to disbands, recording the reason.
fn check_for_illegal_retreat_orders(state: &mut GameState) {
    let provinces: Vec<ProvinceIndex> = state.dislodged_units.keys().copied().collect();
    for province in provinces {
        let unit = state.dislodged_units[&province].clone();
        let Order::Retreat(destination) = unit.resolution.order.clone() else {
            continue;
        };
        let reason = if !state.can_move_to(&unit, destination) {
            Some(lexicon::FAR)
        } else if state.bounce_locations.contains(&destination.province)
            || state.units.contains_key(&destination.province)
            || unit.resolution.dislodged_from == Some(destination.province)
        {
            Some(lexicon::NVR)
        } else {
            None
        };
        if let Some(reason) = reason {
            let unit = state.dislodged_units.get_mut(&province).unwrap();
            unit.resolution.order = Order::Disband;
            unit.resolution.illegal_order = true;
            unit.resolution.illegal_reason = Some(reason);
        }
    }
}
