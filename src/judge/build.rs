//! Adjustment-turn adjudication.
//!
//! Powers short of builds waive the difference. Powers short of disbands
//! are in civil disorder: the adjudicator disbands for them, farthest unit
//! from a home centre first, breaking ties fleet before army and then by
//! province index.

use crate::board::game::GameState;
use crate::board::map::{PowerIndex, ProvinceIndex};
use crate::board::Unit;
use crate::token::lexicon;
use std::collections::BTreeSet;

/// Resolves the adjustment turn in place.
pub fn adjudicate_builds(state: &mut GameState) {
    let powers: Vec<PowerIndex> = state.winter_orders.keys().copied().collect();
    for power in powers {
        let (is_building, required, builds, entered) = {
            let orders = &state.winter_orders[&power];
            (
                orders.is_building,
                orders.required,
                orders.builds_or_disbands.len() as u32,
                orders.orders_entered(),
            )
        };
        if is_building {
            if entered < required {
                // Missing builds are waived.
                state.winter_orders.get_mut(&power).unwrap().waives = required - builds;
            }
        } else if builds < required {
            generate_cd_disbands(state, power);
        }
    }

    for orders in state.winter_orders.values_mut() {
        for result in orders.builds_or_disbands.values_mut() {
            *result = lexicon::SUC;
        }
    }
}

/// Fills in the missing disbands of a power in civil disorder.
fn generate_cd_disbands(state: &mut GameState, power: PowerIndex) {
    let required = state.winter_orders[&power].required;

    let mut candidates: Vec<(u32, bool, ProvinceIndex)> = state
        .units
        .values()
        .filter(|unit| unit.nationality == power)
        .map(|unit| {
            (
                distance_from_home(state, unit),
                unit.unit_type == lexicon::AMY,
                unit.province(),
            )
        })
        .collect();
    // Farthest from home first, fleets ahead of armies, then low province
    // index first.
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    for (_, _, province) in candidates {
        let coast = state.units[&province].coast;
        let orders = state.winter_orders.get_mut(&power).unwrap();
        if (orders.builds_or_disbands.len() as u32) < required
            && !orders.builds_or_disbands.contains_key(&coast)
        {
            orders.builds_or_disbands.insert(coast, lexicon::MBV);
        }
    }
}

/// Shortest unit-graph distance from a unit's province to any home centre
/// of its power, ignoring unit type (a breadth-first wave over all coast
/// adjacencies).
pub fn distance_from_home(state: &GameState, unit: &Unit) -> u32 {
    let nationality = unit.nationality;
    if state
        .map
        .province(unit.province())
        .home_powers
        .contains(&nationality)
    {
        return 0;
    }

    let mut visited: BTreeSet<ProvinceIndex> = BTreeSet::new();
    let mut frontier: BTreeSet<ProvinceIndex> = BTreeSet::new();
    frontier.insert(unit.province());
    let mut distance = 0;

    loop {
        distance += 1;
        let mut next: BTreeSet<ProvinceIndex> = BTreeSet::new();
        let mut home_found = false;
        for &province in &frontier {
            for adjacent in state.map.province(province).coasts.values() {
                for coast in adjacent {
                    if visited.contains(&coast.province) || frontier.contains(&coast.province) {
                        continue;
                    }
                    next.insert(coast.province);
                    if state
                        .map
                        .province(coast.province)
                        .home_powers
                        .contains(&nationality)
                    {
                        home_found = true;
                    }
                }
            }
        }
        if home_found {
            return distance;
        }
        visited.extend(frontier.iter().copied());
        frontier = next;
        if frontier.is_empty() {
            // No reachable home centre at all.
            return u32::MAX;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::map::CoastId;
    use crate::board::standard::standard_mdf;
    use crate::token::lexicon::*;

    fn state_with(units: &[(crate::token::Token, crate::token::Token, crate::token::Token)]) -> GameState {
        let mut state = GameState::new();
        state.set_map(&standard_mdf()).unwrap();
        let mut now = NOW + (WIN + crate::token::Token::number(1901)).enclose();
        for &(power, unit_type, province) in units {
            now = now + (power + unit_type + province).enclose();
        }
        state.set_units(&now).unwrap();
        state
    }

    #[test]
    fn distance_from_home_counts_waves() {
        let state = state_with(&[(ENG, AMY, EDI), (ENG, FLT, NAO), (ENG, AMY, MOS)]);
        let edinburgh = &state.units[&EDI.subtoken()];
        assert_eq!(distance_from_home(&state, edinburgh), 0);

        // The North Atlantic touches Liverpool directly.
        let atlantic = &state.units[&NAO.subtoken()];
        assert_eq!(distance_from_home(&state, atlantic), 1);

        let moscow = &state.units[&MOS.subtoken()];
        assert!(distance_from_home(&state, moscow) >= 4);
    }

    #[test]
    fn civil_disorder_disbands_farthest_unit() {
        let mut state = state_with(&[(ENG, AMY, EDI), (ENG, FLT, NAO), (ENG, AMY, MOS)]);
        state.winter_orders.insert(
            ENG.subtoken(),
            crate::board::WinterOrders {
                required: 1,
                is_building: false,
                ..Default::default()
            },
        );
        adjudicate_builds(&mut state);

        let orders = &state.winter_orders[&ENG.subtoken()];
        assert_eq!(orders.builds_or_disbands.len(), 1);
        // Moscow is farther from an English home centre than the North
        // Atlantic fleet.
        assert!(orders
            .builds_or_disbands
            .contains_key(&CoastId::new(MOS.subtoken(), AMY)));
        assert_eq!(orders.builds_or_disbands.values().next(), Some(&SUC));
    }

    #[test]
    fn civil_disorder_ties_prefer_fleets() {
        // An army and a fleet both one step from home; the fleet goes.
        let mut state = state_with(&[(ENG, AMY, YOR), (ENG, FLT, NAO)]);
        state.winter_orders.insert(
            ENG.subtoken(),
            crate::board::WinterOrders {
                required: 1,
                is_building: false,
                ..Default::default()
            },
        );
        adjudicate_builds(&mut state);
        let orders = &state.winter_orders[&ENG.subtoken()];
        assert_eq!(orders.builds_or_disbands.len(), 1);
        assert!(orders
            .builds_or_disbands
            .contains_key(&CoastId::new(NAO.subtoken(), FLT)));
    }

    #[test]
    fn build_shortfall_is_waived() {
        let mut state = state_with(&[(FRA, AMY, PAR)]);
        state.winter_orders.insert(
            FRA.subtoken(),
            crate::board::WinterOrders {
                required: 2,
                is_building: true,
                ..Default::default()
            },
        );
        adjudicate_builds(&mut state);
        assert_eq!(state.winter_orders[&FRA.subtoken()].waives, 2);
    }
}
