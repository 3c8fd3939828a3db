//! Applying an adjudicated turn and advancing the season.
//!
//! Movers go to their destinations, the newly dislodged move into the
//! dislodged collection with their retreat options computed, retreats
//! resolve or vanish, and builds and disbands change the unit roster.
//! Season order is spring, summer, fall, autumn, winter; retreat turns with
//! nothing dislodged and winters with no adjustments are skipped.

use std::collections::BTreeSet;

use crate::board::game::GameState;
use crate::board::map::{CoastId, ProvinceIndex};
use crate::board::unit::{Order, Unit};
use crate::token::lexicon::{self, Token};

/// Moves every successful mover and collects the dislodged.
pub fn apply_moves(state: &mut GameState) {
    state.dislodged_units.clear();

    let units = std::mem::take(&mut state.units);
    let mut moved: Vec<Unit> = Vec::new();
    for (province, mut unit) in units {
        unit.order = Order::None;
        if unit.resolution.unit_moves {
            moved.push(unit);
        } else if unit.resolution.dislodged {
            state.dislodged_units.insert(province, unit);
        } else {
            state.units.insert(province, unit);
        }
    }
    for mut unit in moved {
        let destination = match unit.resolution.order.move_dest() {
            Some(destination) => destination,
            None => unit.coast,
        };
        unit.coast = destination;
        state.units.insert(destination.province, unit);
    }

    // A dislodged unit may retreat to any adjacent coast that is not
    // occupied, not a standoff province, and not where its attacker came
    // from.
    let dislodged: Vec<ProvinceIndex> = state.dislodged_units.keys().copied().collect();
    for province in dislodged {
        let (coast, dislodged_from) = {
            let unit = &state.dislodged_units[&province];
            (unit.coast, unit.resolution.dislodged_from)
        };
        let mut options: BTreeSet<CoastId> = BTreeSet::new();
        if let Some(adjacent) = state.map.adjacent_coasts(coast) {
            for &candidate in adjacent {
                if Some(candidate.province) != dislodged_from
                    && !state.units.contains_key(&candidate.province)
                    && !state.bounce_locations.contains(&candidate.province)
                {
                    options.insert(candidate);
                }
            }
        }
        state.dislodged_units.get_mut(&province).unwrap().retreat_options = options;
    }
}

/// Retreating units re-enter the board; everything else disbands.
pub fn apply_retreats(state: &mut GameState) {
    let dislodged = std::mem::take(&mut state.dislodged_units);
    for (_, mut unit) in dislodged {
        if unit.resolution.unit_moves {
            let destination = match unit.resolution.order.move_dest() {
                Some(destination) => destination,
                None => unit.coast,
            };
            unit.order = Order::None;
            unit.coast = destination;
            state.units.insert(destination.province, unit);
        }
    }
}

/// Builds add fresh units; disbands remove them.
pub fn apply_builds(state: &mut GameState) {
    let records: Vec<(u8, crate::board::WinterOrders)> = state
        .winter_orders
        .iter()
        .map(|(&power, orders)| (power, orders.clone()))
        .collect();
    for (power, orders) in records {
        if orders.is_building {
            for &coast in orders.builds_or_disbands.keys() {
                let unit_type = if coast.coast == lexicon::AMY {
                    lexicon::AMY
                } else {
                    lexicon::FLT
                };
                state
                    .units
                    .insert(coast.province, Unit::new(coast, power, unit_type));
            }
        } else {
            for coast in orders.builds_or_disbands.keys() {
                state.units.remove(&coast.province);
            }
        }
    }
}

/// The season after this one; winter wraps to spring.
pub fn next_season(season: Token) -> Token {
    if season == lexicon::WIN {
        lexicon::SPR
    } else {
        Token::new(lexicon::CATEGORY_SEASON, season.subtoken() + 1)
    }
}

/// Steps to the next turn with work to do: retreat turns are skipped when
/// nothing is dislodged, winters when no power needs adjustments. Returns
/// true when a supply-centre ownership update should be announced, which
/// happens at every winter boundary whether or not the winter is played.
pub fn move_to_next_turn(state: &mut GameState) -> bool {
    let mut send_sco = false;
    loop {
        state.season = next_season(state.season);
        if state.season == lexicon::SPR {
            state.year += 1;
        }
        if state.is_movement_season() {
            break;
        }
        if state.is_retreat_season() {
            if !state.dislodged_units.is_empty() {
                break;
            }
        } else {
            send_sco = true;
            if update_sc_ownership(state) {
                break;
            }
        }
    }
    send_sco
}

/// Occupied provinces change hands; every power's adjustment requirement is
/// recomputed. Returns true when any power has builds or disbands due.
pub fn update_sc_ownership(state: &mut GameState) -> bool {
    let power_count = state.map.power_count;
    let mut unit_count = vec![0u32; power_count];
    let mut sc_count = vec![0u32; power_count];

    let positions: Vec<(ProvinceIndex, u8)> = state
        .units
        .values()
        .map(|unit| (unit.province(), unit.nationality))
        .collect();
    for (province, nationality) in positions {
        state.map.province_mut(province).owner =
            Token::new(lexicon::CATEGORY_POWER, nationality);
        if (nationality as usize) < power_count {
            unit_count[nationality as usize] += 1;
        }
    }

    for province in 0..state.map.province_count {
        let details = state.map.province(province as ProvinceIndex);
        if details.is_supply_centre && details.owner != lexicon::UNO {
            let owner = details.owner.subtoken() as usize;
            if owner < power_count {
                sc_count[owner] += 1;
            }
        }
    }

    let mut orders_required = false;
    for power in 0..power_count {
        let orders = state.winter_orders.entry(power as u8).or_default();
        if sc_count[power] > unit_count[power] {
            orders.is_building = true;
            orders.required = sc_count[power] - unit_count[power];
        } else {
            orders.is_building = false;
            orders.required = unit_count[power] - sc_count[power];
        }
        if sc_count[power] != unit_count[power] {
            orders_required = true;
        }
        orders.waives = 0;
        orders.builds_or_disbands.clear();
    }
    orders_required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::lexicon::*;

    #[test]
    fn season_succession() {
        assert_eq!(next_season(SPR), SUM);
        assert_eq!(next_season(SUM), FAL);
        assert_eq!(next_season(FAL), AUT);
        assert_eq!(next_season(AUT), WIN);
        assert_eq!(next_season(WIN), SPR);
    }
}
