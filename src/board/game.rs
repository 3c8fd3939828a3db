//! Session game state: the map plus every unit, order, and result.
//!
//! One `GameState` holds everything a client or a server-side adjudicator
//! needs for a game in progress. It is a plain value: `duplicate()` deep
//! clones it so a bot can adjudicate hypothetical turns without touching
//! the live position. All collections are ordered so adjudication is a
//! deterministic function of the inputs.

use std::collections::{BTreeMap, BTreeSet};

use crate::board::map::{CoastId, Map, MdfError, PowerIndex, ProvinceIndex};
use crate::board::unit::{Order, Unit, WinterOrders};
use crate::token::lexicon::{self, Token};
use crate::token::TokenMessage;

/// A malformed NOW/SCO/ORD message; the payload is the approximate token
/// offset within the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("malformed game message near token offset {0}")]
pub struct StateError(pub usize);

/// The complete game state for one session.
#[derive(Debug, Clone)]
pub struct GameState {
    pub map: Map,

    // Session identity.
    pub power_played: Token,
    pub passcode: i32,
    pub variant: TokenMessage,
    pub game_started: bool,
    pub game_over: bool,
    /// Home centre provinces of the power being played.
    pub home_centres: BTreeSet<ProvinceIndex>,

    // Current turn.
    pub season: Token,
    pub year: i32,
    pub units: BTreeMap<ProvinceIndex, Unit>,
    pub dislodged_units: BTreeMap<ProvinceIndex, Unit>,
    pub winter_orders: BTreeMap<PowerIndex, WinterOrders>,
    pub our_winter_orders: WinterOrders,

    /// Provinces where attacks stood each other off last movement turn;
    /// dislodged units may not retreat into them.
    pub bounce_locations: BTreeSet<ProvinceIndex>,

    // Results of the last adjudicated turns.
    pub last_movement_results: BTreeMap<ProvinceIndex, Unit>,
    pub last_retreat_results: BTreeMap<ProvinceIndex, Unit>,
    pub last_adjustment_results: BTreeMap<PowerIndex, WinterOrders>,
    pub last_movement_result_season: Token,

    // Order-checking policy: validate when orders are submitted (normal
    // games) or when the turn is adjudicated (any-orders-accepted games).
    pub check_orders_on_submission: bool,
    pub check_orders_on_adjudication: bool,

    // Convenience sets rebuilt from each NOW/SCO.
    pub our_units: BTreeSet<ProvinceIndex>,
    pub our_dislodged_units: BTreeSet<ProvinceIndex>,
    pub open_home_centres: BTreeSet<ProvinceIndex>,
    pub our_centres: BTreeSet<ProvinceIndex>,
    /// Units minus centres; negative means builds are due.
    pub number_of_disbands: i32,
}

impl Default for GameState {
    fn default() -> GameState {
        GameState {
            map: Map::new(),
            power_played: Token::default(),
            passcode: 0,
            variant: TokenMessage::new(),
            game_started: false,
            game_over: false,
            home_centres: BTreeSet::new(),
            season: Token::default(),
            year: 0,
            units: BTreeMap::new(),
            dislodged_units: BTreeMap::new(),
            winter_orders: BTreeMap::new(),
            our_winter_orders: WinterOrders::default(),
            bounce_locations: BTreeSet::new(),
            last_movement_results: BTreeMap::new(),
            last_retreat_results: BTreeMap::new(),
            last_adjustment_results: BTreeMap::new(),
            last_movement_result_season: Token::default(),
            check_orders_on_submission: true,
            check_orders_on_adjudication: false,
            our_units: BTreeSet::new(),
            our_dislodged_units: BTreeSet::new(),
            open_home_centres: BTreeSet::new(),
            our_centres: BTreeSet::new(),
            number_of_disbands: 0,
        }
    }
}

impl GameState {
    pub fn new() -> GameState {
        GameState::default()
    }

    /// A deep copy for hypothetical adjudication.
    pub fn duplicate(&self) -> GameState {
        self.clone()
    }

    /// Chooses when orders are validated.
    pub fn set_order_checking(&mut self, on_submission: bool, on_adjudication: bool) {
        self.check_orders_on_submission = on_submission;
        self.check_orders_on_adjudication = on_adjudication;
    }

    pub fn is_movement_season(&self) -> bool {
        self.season == lexicon::SPR || self.season == lexicon::FAL
    }

    pub fn is_retreat_season(&self) -> bool {
        self.season == lexicon::SUM || self.season == lexicon::AUT
    }

    pub fn is_winter(&self) -> bool {
        self.season == lexicon::WIN
    }

    /// Accepts an MDF message.
    pub fn set_map(&mut self, mdf: &TokenMessage) -> Result<(), MdfError> {
        self.map.set_map(mdf)
    }

    /// Stores the power this session plays and derives its home centres.
    pub fn set_power_played(&mut self, power: Token) {
        self.power_played = power;
        self.home_centres.clear();
        if power.category() == lexicon::CATEGORY_POWER {
            let index = power.subtoken();
            for province in self.map.province_indices() {
                if self.map.province(province).home_powers.contains(&index) {
                    self.home_centres.insert(province);
                }
            }
        }
        self.game_started = true;
    }

    /// Accepts an SCO message: `SCO (power centre...) ... (UNO centre...)`.
    pub fn set_ownership(&mut self, sco: &TokenMessage) -> Result<(), StateError> {
        if !self.map.is_set() {
            return Ok(());
        }
        let command = sco.submessage(0);
        if !command.is_single_token() || command.first() != lexicon::SCO {
            return Err(StateError(0));
        }
        self.our_centres.clear();
        for block in 1..sco.submessage_count() {
            let sco_for_power = sco.submessage(block);
            self.process_sco_for_power(&sco_for_power)
                .map_err(|StateError(at)| StateError(at + sco.submessage_start(block)))?;
        }
        Ok(())
    }

    fn process_sco_for_power(&mut self, block: &TokenMessage) -> Result<(), StateError> {
        let power = block.token(0);
        for offset in 1..block.len() {
            let province = block.token(offset);
            if province.subtoken() as usize >= self.map.province_count {
                return Err(StateError(offset));
            }
            self.map.province_mut(province.subtoken()).owner = power;
            if power == self.power_played {
                self.our_centres.insert(province.subtoken());
            }
        }
        Ok(())
    }

    /// Accepts a NOW message, replacing every unit record.
    pub fn set_units(&mut self, now: &TokenMessage) -> Result<(), StateError> {
        if !self.map.is_set() {
            return Ok(());
        }
        let command = now.submessage(0);
        if !command.is_single_token() || command.first() != lexicon::NOW {
            return Err(StateError(0));
        }
        let turn = now.submessage(1);
        self.season = turn.token(0);
        self.year = turn.token(1).number_value();

        self.units.clear();
        self.dislodged_units.clear();
        self.our_units.clear();
        self.our_dislodged_units.clear();
        self.open_home_centres.clear();
        self.our_winter_orders.clear();

        for index in 2..now.submessage_count() {
            let unit = now.submessage(index);
            self.process_now_unit(&unit)
                .map_err(|StateError(at)| StateError(at + now.submessage_start(index)))?;
        }

        if self.power_played.category() == lexicon::CATEGORY_POWER {
            for &home in &self.home_centres {
                if self.map.province(home).owner == self.power_played
                    && !self.units.contains_key(&home)
                {
                    self.open_home_centres.insert(home);
                }
            }
            self.number_of_disbands = self.our_units.len() as i32 - self.our_centres.len() as i32;
        }
        Ok(())
    }

    /// One unit of a NOW message:
    /// `(power type location)` or `(power type location MRT (options))`.
    fn process_now_unit(&mut self, message: &TokenMessage) -> Result<(), StateError> {
        let nationality = message.token(0);
        if nationality.category() != lexicon::CATEGORY_POWER
            || nationality.subtoken() as usize >= self.map.power_count
        {
            return Err(StateError(0));
        }
        let unit_type = message.token(1);
        let location = message.submessage(2);

        let coast = if location.is_single_token() {
            CoastId::new(location.first().subtoken(), unit_type)
        } else {
            if unit_type != lexicon::FLT {
                return Err(StateError(2));
            }
            CoastId::new(location.token(0).subtoken(), location.token(1))
        };
        if coast.province as usize >= self.map.province_count
            || !self.map.province(coast.province).coasts.contains_key(&coast.coast)
        {
            return Err(StateError(2));
        }

        let mut unit = Unit::new(coast, nationality.subtoken(), unit_type);
        let ours = self.power_played.category() == lexicon::CATEGORY_POWER
            && nationality == self.power_played;

        if message.submessage_count() == 5 {
            // A dislodged unit with its retreat options.
            if message.submessage(3).first() != lexicon::MRT {
                return Err(StateError(message.submessage_start(3)));
            }
            let options = message.submessage(4);
            for index in 0..options.submessage_count() {
                unit.retreat_options
                    .insert(coast_id_of(&options.submessage(index), unit_type));
            }
            self.dislodged_units.insert(coast.province, unit);
            if ours {
                self.our_dislodged_units.insert(coast.province);
            }
        } else {
            self.units.insert(coast.province, unit);
            if ours {
                self.our_units.insert(coast.province);
            }
        }
        Ok(())
    }

    // ----- order entry ---------------------------------------------------

    /// Orders a unit to hold. Fails if no unit occupies the province.
    pub fn set_hold_order(&mut self, unit: ProvinceIndex) -> bool {
        match self.units.get_mut(&unit) {
            Some(unit) => {
                unit.order = Order::Hold;
                true
            }
            None => false,
        }
    }

    pub fn set_move_order(&mut self, unit: ProvinceIndex, destination: CoastId) -> bool {
        match self.units.get_mut(&unit) {
            Some(unit) => {
                unit.order = Order::Move(destination);
                true
            }
            None => false,
        }
    }

    pub fn set_support_to_hold_order(
        &mut self,
        unit: ProvinceIndex,
        supported: ProvinceIndex,
    ) -> bool {
        match self.units.get_mut(&unit) {
            Some(unit) => {
                unit.order = Order::SupportHold(supported);
                true
            }
            None => false,
        }
    }

    pub fn set_support_to_move_order(
        &mut self,
        unit: ProvinceIndex,
        supported: ProvinceIndex,
        destination: ProvinceIndex,
    ) -> bool {
        match self.units.get_mut(&unit) {
            Some(unit) => {
                unit.order = Order::SupportMove {
                    supported,
                    dest: destination,
                };
                true
            }
            None => false,
        }
    }

    pub fn set_convoy_order(
        &mut self,
        unit: ProvinceIndex,
        army: ProvinceIndex,
        destination: ProvinceIndex,
    ) -> bool {
        match self.units.get_mut(&unit) {
            Some(unit) => {
                unit.order = Order::Convoy {
                    army,
                    dest: destination,
                };
                true
            }
            None => false,
        }
    }

    pub fn set_move_by_convoy_order(
        &mut self,
        unit: ProvinceIndex,
        destination: ProvinceIndex,
        via: Vec<ProvinceIndex>,
    ) -> bool {
        match self.units.get_mut(&unit) {
            Some(unit) => {
                unit.order = Order::MoveByConvoy {
                    dest: CoastId::new(destination, lexicon::AMY),
                    via,
                };
                true
            }
            None => false,
        }
    }

    /// Orders a dislodged unit to retreat.
    pub fn set_retreat_order(&mut self, unit: ProvinceIndex, destination: CoastId) -> bool {
        match self.dislodged_units.get_mut(&unit) {
            Some(unit) => {
                unit.order = Order::Retreat(destination);
                true
            }
            None => false,
        }
    }

    /// Orders a dislodged unit to disband.
    pub fn set_disband_order(&mut self, unit: ProvinceIndex) -> bool {
        match self.dislodged_units.get_mut(&unit) {
            Some(unit) => {
                unit.order = Order::Disband;
                true
            }
            None => false,
        }
    }

    /// Enters a build, replacing any earlier build in the same province.
    pub fn set_build_order(&mut self, location: CoastId) {
        let existing: Vec<CoastId> = self
            .our_winter_orders
            .builds_or_disbands
            .keys()
            .filter(|c| c.province == location.province)
            .copied()
            .collect();
        for coast in existing {
            self.our_winter_orders.builds_or_disbands.remove(&coast);
        }
        self.our_winter_orders
            .builds_or_disbands
            .insert(location, Token::default());
        self.our_winter_orders.is_building = true;
    }

    /// Enters a disband for a unit on the board.
    pub fn set_remove_order(&mut self, unit: ProvinceIndex) -> bool {
        match self.units.get(&unit) {
            Some(unit) => {
                let coast = unit.coast;
                self.our_winter_orders
                    .builds_or_disbands
                    .insert(coast, Token::default());
                self.our_winter_orders.is_building = false;
                true
            }
            None => false,
        }
    }

    pub fn set_waive_order(&mut self) {
        self.our_winter_orders.waives += 1;
    }

    pub fn set_multiple_waive_orders(&mut self, waives: u32) {
        self.our_winter_orders.waives += waives;
    }

    pub fn set_total_number_of_waive_orders(&mut self, waives: u32) {
        self.our_winter_orders.waives = waives;
    }

    /// Withdraws a build entered for the given province.
    pub fn cancel_build_order(&mut self, location: ProvinceIndex) -> bool {
        let existing: Vec<CoastId> = self
            .our_winter_orders
            .builds_or_disbands
            .keys()
            .filter(|c| c.province == location)
            .copied()
            .collect();
        for coast in &existing {
            self.our_winter_orders.builds_or_disbands.remove(coast);
        }
        !existing.is_empty()
    }

    /// Withdrawing a disband works exactly like withdrawing a build.
    pub fn cancel_remove_order(&mut self, location: ProvinceIndex) -> bool {
        self.cancel_build_order(location)
    }

    /// Whether any order has been entered for the current turn.
    pub fn any_orders_entered(&self) -> bool {
        if self.is_movement_season() {
            self.units.values().any(|u| u.order != Order::None)
        } else if self.is_retreat_season() {
            self.dislodged_units.values().any(|u| u.order != Order::None)
        } else {
            self.our_winter_orders.orders_entered() > 0
        }
    }

    /// Clears every order entered for the current turn.
    pub fn clear_all_orders(&mut self) {
        for unit in self.units.values_mut() {
            unit.order = Order::None;
        }
        for unit in self.dislodged_units.values_mut() {
            unit.order = Order::None;
        }
        self.our_winter_orders.clear();
    }

    /// Whether a power has ordered everything the current turn requires.
    pub fn check_if_all_orders_received(&self, power: PowerIndex) -> bool {
        if self.is_movement_season() {
            !self
                .units
                .values()
                .any(|u| u.nationality == power && u.order == Order::None)
        } else if self.is_retreat_season() {
            !self
                .dislodged_units
                .values()
                .any(|u| u.nationality == power && u.order == Order::None)
        } else if self.is_winter() {
            match self.winter_orders.get(&power) {
                Some(orders) => orders.orders_entered() >= orders.required,
                None => true,
            }
        } else {
            true
        }
    }

    // ----- geometry -------------------------------------------------------

    /// Whether the unit can move directly to the exact destination coast.
    pub fn can_move_to(&self, unit: &Unit, destination: CoastId) -> bool {
        self.map
            .adjacent_coasts(unit.coast)
            .is_some_and(|adjacent| adjacent.contains(&destination))
    }

    /// Whether the unit can move directly to any coast of a province.
    pub fn can_move_to_province(&self, unit: &Unit, province: ProvinceIndex) -> bool {
        self.map
            .adjacent_coasts(unit.coast)
            .is_some_and(|adjacent| adjacent.iter().any(|c| c.province == province))
    }

    /// Whether the unit can reach the province directly or, for an army
    /// heading to land, along a convoy route through occupied sea provinces.
    /// `avoid` excludes a province from the route; this stops a fleet
    /// supporting a convoyed move that only works through that same fleet.
    pub fn has_route_to_province(
        &self,
        unit: &Unit,
        province: ProvinceIndex,
        avoid: Option<ProvinceIndex>,
    ) -> bool {
        if self.can_move_to_province(unit, province) {
            return true;
        }
        if unit.unit_type != lexicon::AMY || !self.map.province(province).is_land {
            return false;
        }

        let mut checked: BTreeSet<ProvinceIndex> = BTreeSet::new();
        let mut to_check: BTreeSet<ProvinceIndex> = BTreeSet::new();
        checked.insert(unit.province());
        if let Some(avoid) = avoid {
            checked.insert(avoid);
        }
        for adjacent in self.map.province(unit.province()).coasts.values() {
            for coast in adjacent {
                to_check.insert(coast.province);
            }
        }

        loop {
            let Some(&next) = to_check.iter().next() else {
                break;
            };
            to_check.remove(&next);
            if !checked.insert(next) {
                continue;
            }
            if self.map.province(next).is_land {
                if next == province {
                    return true;
                }
            } else if self.units.contains_key(&next) {
                for adjacent in self.map.province(next).coasts.values() {
                    for coast in adjacent {
                        to_check.insert(coast.province);
                    }
                }
            }
        }
        false
    }

    /// Adjacency for the unit occupying a province, if any.
    pub fn adjacent_coasts_of_unit(&self, province: ProvinceIndex) -> Option<&BTreeSet<CoastId>> {
        let unit = self.units.get(&province)?;
        self.map.adjacent_coasts(unit.coast)
    }

    /// Adjacency for the dislodged unit in a province, if any.
    pub fn adjacent_coasts_of_dislodged_unit(
        &self,
        province: ProvinceIndex,
    ) -> Option<&BTreeSet<CoastId>> {
        let unit = self.dislodged_units.get(&province)?;
        self.map.adjacent_coasts(unit.coast)
    }

    // ----- counting -------------------------------------------------------

    /// Supply centres owned by a power.
    pub fn centre_count(&self, power: Token) -> usize {
        self.map
            .province_indices()
            .filter(|&p| {
                let province = self.map.province(p);
                province.is_supply_centre && province.owner == power
            })
            .count()
    }

    /// Units fielded by a power.
    pub fn unit_count(&self, power: Token) -> usize {
        self.units
            .values()
            .filter(|u| u.nationality == power.subtoken())
            .count()
    }

    /// Looks up a variant option from the HLO message; the inner value is
    /// the option's parameter when one was given.
    pub fn variant_setting(&self, option: Token) -> Option<Option<Token>> {
        for index in 0..self.variant.submessage_count() {
            let submessage = self.variant.submessage(index);
            if submessage.first() == option {
                let parameter = if submessage.len() > 1 {
                    Some(submessage.token(1))
                } else {
                    None
                };
                return Some(parameter);
            }
        }
        None
    }
}

/// Reads a location submessage as a coast: a bare province adopts the unit
/// type as its coast token.
pub fn coast_id_of(location: &TokenMessage, unit_type: Token) -> CoastId {
    if location.is_single_token() {
        CoastId::new(location.first().subtoken(), unit_type)
    } else {
        CoastId::new(location.token(0).subtoken(), location.token(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::standard::standard_mdf;
    use crate::token::lexicon::*;

    fn game() -> GameState {
        let mut state = GameState::new();
        state.set_map(&standard_mdf()).unwrap();
        state
    }

    fn unit_message(power: Token, unit_type: Token, province: Token) -> TokenMessage {
        (power + unit_type + province).enclose()
    }

    fn turn(season: Token, year: i32) -> TokenMessage {
        (season + Token::number(year)).enclose()
    }

    #[test]
    fn set_units_replaces_position() {
        let mut state = game();
        state.set_power_played(FRA);
        let now = NOW + turn(SPR, 1901)
            + unit_message(FRA, AMY, PAR)
            + unit_message(FRA, FLT, BRE)
            + unit_message(GER, AMY, MUN);
        state.set_units(&now).unwrap();

        assert_eq!(state.season, SPR);
        assert_eq!(state.year, 1901);
        assert_eq!(state.units.len(), 3);
        let ours: BTreeSet<ProvinceIndex> = [PAR.subtoken(), BRE.subtoken()].into_iter().collect();
        assert_eq!(state.our_units, ours);

        let brest = &state.units[&BRE.subtoken()];
        assert_eq!(brest.unit_type, FLT);
        assert_eq!(brest.coast, CoastId::new(BRE.subtoken(), FLT));
    }

    #[test]
    fn set_units_reads_split_coasts() {
        let mut state = game();
        let location = (STP + SCS).enclose();
        let now = NOW + turn(SPR, 1901) + (RUS + FLT + location).enclose();
        state.set_units(&now).unwrap();
        assert_eq!(
            state.units[&STP.subtoken()].coast,
            CoastId::new(STP.subtoken(), SCS)
        );
    }

    #[test]
    fn set_units_reads_dislodged_units() {
        let mut state = game();
        state.set_power_played(AUS);
        let options = (TokenMessage::single(TRI) + ALB).enclose();
        let dislodged = (AUS + AMY + SER + MRT + options).enclose();
        let now = NOW + turn(SUM, 1902) + dislodged;
        state.set_units(&now).unwrap();

        assert!(state.units.is_empty());
        let unit = &state.dislodged_units[&SER.subtoken()];
        assert_eq!(unit.retreat_options.len(), 2);
        assert!(unit
            .retreat_options
            .contains(&CoastId::new(TRI.subtoken(), AMY)));
        assert!(state.our_dislodged_units.contains(&SER.subtoken()));
    }

    #[test]
    fn rejects_army_on_named_coast() {
        let mut state = game();
        let location = (STP + SCS).enclose();
        let now = NOW + turn(SPR, 1901) + (RUS + AMY + location).enclose();
        assert!(state.set_units(&now).is_err());
    }

    #[test]
    fn ownership_update() {
        let mut state = game();
        state.set_power_played(ENG);
        let sco = SCO & (ENG + EDI + LON + LVP) & (FRA + BRE) & (UNO + BEL);
        state.set_ownership(&sco).unwrap();

        assert_eq!(state.map.province(LON.subtoken()).owner, ENG);
        assert_eq!(state.map.province(BRE.subtoken()).owner, FRA);
        assert_eq!(state.map.province(BEL.subtoken()).owner, UNO);
        assert_eq!(state.our_centres.len(), 3);
        assert_eq!(state.centre_count(ENG), 3);
    }

    #[test]
    fn open_home_centres_need_ownership_and_vacancy() {
        let mut state = game();
        state.set_power_played(FRA);
        let sco = SCO & (FRA + BRE + MAR + PAR);
        state.set_ownership(&sco).unwrap();
        let now = NOW + turn(WIN, 1901) + unit_message(FRA, AMY, PAR);
        state.set_units(&now).unwrap();

        // Paris is occupied; Brest and Marseilles are open.
        assert!(!state.open_home_centres.contains(&PAR.subtoken()));
        assert!(state.open_home_centres.contains(&BRE.subtoken()));
        assert!(state.open_home_centres.contains(&MAR.subtoken()));
        assert_eq!(state.number_of_disbands, 1 - 3);
    }

    #[test]
    fn order_setters_need_matching_units() {
        let mut state = game();
        let now = NOW + turn(SPR, 1901) + unit_message(FRA, AMY, PAR);
        state.set_units(&now).unwrap();

        assert!(state.set_hold_order(PAR.subtoken()));
        assert!(!state.set_hold_order(BUR.subtoken()));
        assert!(!state.set_retreat_order(PAR.subtoken(), CoastId::new(PIC.subtoken(), AMY)));
        assert!(state.set_move_order(PAR.subtoken(), CoastId::new(BUR.subtoken(), AMY)));
        assert!(state.any_orders_entered());
        state.clear_all_orders();
        assert!(!state.any_orders_entered());
    }

    #[test]
    fn build_orders_replace_same_province() {
        let mut state = game();
        state.set_build_order(CoastId::new(STP.subtoken(), NCS));
        state.set_build_order(CoastId::new(STP.subtoken(), SCS));
        assert_eq!(state.our_winter_orders.builds_or_disbands.len(), 1);
        assert!(state
            .our_winter_orders
            .builds_or_disbands
            .contains_key(&CoastId::new(STP.subtoken(), SCS)));
        assert!(state.cancel_build_order(STP.subtoken()));
        assert!(!state.cancel_build_order(STP.subtoken()));
    }

    #[test]
    fn direct_movement_geometry() {
        let mut state = game();
        let location = (STP + SCS).enclose();
        let now = NOW + turn(SPR, 1901)
            + unit_message(FRA, AMY, PAR)
            + unit_message(ENG, FLT, LON)
            + (RUS + FLT + location).enclose();
        state.set_units(&now).unwrap();

        let paris = state.units[&PAR.subtoken()].clone();
        assert!(state.can_move_to(&paris, CoastId::new(BUR.subtoken(), AMY)));
        assert!(!state.can_move_to(&paris, CoastId::new(LON.subtoken(), AMY)));
        assert!(state.can_move_to_province(&paris, GAS.subtoken()));

        let london = state.units[&LON.subtoken()].clone();
        assert!(state.can_move_to(&london, CoastId::new(NTH.subtoken(), FLT)));
        assert!(state.can_move_to_province(&london, YOR.subtoken()));

        // A fleet on the south coast cannot reach the Barents Sea.
        let stp = state.units[&STP.subtoken()].clone();
        assert!(!state.can_move_to_province(&stp, BAR.subtoken()));
        assert!(state.can_move_to(&stp, CoastId::new(FIN.subtoken(), FLT)));
    }

    #[test]
    fn convoy_route_needs_occupied_seas() {
        let mut state = game();
        let now = NOW + turn(SPR, 1901)
            + unit_message(ENG, AMY, LON)
            + unit_message(ENG, FLT, NTH);
        state.set_units(&now).unwrap();

        let army = state.units[&LON.subtoken()].clone();
        assert!(state.has_route_to_province(&army, NWY.subtoken(), None));
        // Avoiding the only convoying fleet breaks the route.
        assert!(!state.has_route_to_province(&army, NWY.subtoken(), Some(NTH.subtoken())));
        // No fleet chain reaches Brest.
        assert!(!state.has_route_to_province(&army, BRE.subtoken(), None));
    }

    #[test]
    fn duplicate_is_independent() {
        let mut state = game();
        let now = NOW + turn(SPR, 1901) + unit_message(FRA, AMY, PAR);
        state.set_units(&now).unwrap();

        let mut copy = state.duplicate();
        copy.set_move_order(PAR.subtoken(), CoastId::new(BUR.subtoken(), AMY));
        assert_eq!(state.units[&PAR.subtoken()].order, Order::None);
        assert_ne!(copy.units[&PAR.subtoken()].order, Order::None);
    }

    #[test]
    fn variant_settings() {
        let mut state = game();
        state.variant = TokenMessage::new() & (LVL + Token::number(10)) & AOA;
        assert_eq!(state.variant_setting(LVL), Some(Some(Token::number(10))));
        assert_eq!(state.variant_setting(AOA), Some(None));
        assert_eq!(state.variant_setting(PDA), None);
    }
}
