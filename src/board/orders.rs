//! Order submission, validation, and message round-trips.
//!
//! The server side of the library ingests a SUB message and answers each
//! order with a note token (`MBV` when the order belongs). The client side
//! serialises entered orders back into a SUB command and decodes ORD
//! results. Validation runs here when `check_orders_on_submission` is set;
//! any-orders-accepted games defer the checks to the adjudicator.

use crate::board::game::{coast_id_of, GameState, StateError};
use crate::board::map::{CoastId, PowerIndex, ProvinceIndex};
use crate::board::unit::{Order, Unit, WinterOrders};
use crate::token::lexicon::{self, Token};
use crate::token::TokenMessage;

impl GameState {
    /// Ingests a full SUB message for one power, answering each order with
    /// its note token.
    pub fn process_orders(
        &mut self,
        sub: &TokenMessage,
        power: PowerIndex,
    ) -> Result<Vec<Token>, StateError> {
        let command = sub.submessage(0);
        if !command.is_single_token() || command.first() != lexicon::SUB {
            return Err(StateError(0));
        }
        let mut notes = Vec::with_capacity(sub.submessage_count() - 1);
        for index in 1..sub.submessage_count() {
            let order = sub.submessage(index);
            notes.push(self.process_order(&order, power));
        }
        Ok(notes)
    }

    /// Validates and stores a single order, returning its note token.
    pub fn process_order(&mut self, order: &TokenMessage, power: PowerIndex) -> Token {
        let verb = order.submessage(1).first();
        match verb.raw() & lexicon::ORDER_TURN_MASK {
            lexicon::ORDER_MOVE_TURN => self.process_movement_order(order, power, verb),
            lexicon::ORDER_RETREAT_TURN => self.process_retreat_order(order, power, verb),
            lexicon::ORDER_BUILD_TURN => self.process_adjustment_order(order, power, verb),
            _ => lexicon::NRS,
        }
    }

    fn process_movement_order(
        &mut self,
        order: &TokenMessage,
        power: PowerIndex,
        verb: Token,
    ) -> Token {
        if !self.is_movement_season() {
            return lexicon::NRS;
        }
        let Some(province) = self.find_unit(&order.submessage(0), false) else {
            return lexicon::NSU;
        };
        if self.units[&province].nationality != power {
            return lexicon::NYU;
        }
        let check = self.check_orders_on_submission;
        let unit = self.units[&province].clone();

        match verb {
            lexicon::HLD => {
                self.set_hold_order(province);
                lexicon::MBV
            }
            lexicon::MTO => {
                let destination = coast_id_of(&order.submessage(2), unit.unit_type);
                if check && !self.can_move_to(&unit, destination) {
                    lexicon::FAR
                } else {
                    self.set_move_order(province, destination);
                    lexicon::MBV
                }
            }
            lexicon::SUP if order.submessage_count() == 3 => {
                let Some(supported) = self.find_unit(&order.submessage(2), false) else {
                    return lexicon::NSU;
                };
                if check && !self.can_move_to_province(&unit, supported) {
                    lexicon::FAR
                } else if check && supported == province {
                    // A unit may not support itself.
                    lexicon::FAR
                } else {
                    self.set_support_to_hold_order(province, supported);
                    lexicon::MBV
                }
            }
            lexicon::SUP => {
                let Some(supported) = self.find_unit(&order.submessage(2), false) else {
                    return lexicon::NSU;
                };
                let destination = order.submessage(4).first().subtoken();
                let supported_unit = self.units[&supported].clone();
                if check
                    && !self.has_route_to_province(&supported_unit, destination, Some(province))
                {
                    lexicon::FAR
                } else if check && !self.can_move_to_province(&unit, destination) {
                    lexicon::FAR
                } else if check && supported == province {
                    lexicon::FAR
                } else {
                    self.set_support_to_move_order(province, supported, destination);
                    lexicon::MBV
                }
            }
            lexicon::CVY => {
                let Some(army) = self.find_unit(&order.submessage(2), false) else {
                    return lexicon::NSU;
                };
                let destination = order.submessage(4).first().subtoken();
                let army_unit = self.units[&army].clone();
                if check && unit.unit_type != lexicon::FLT {
                    lexicon::NSF
                } else if check && self.map.province(province).is_land {
                    lexicon::NAS
                } else if check && army_unit.unit_type != lexicon::AMY {
                    lexicon::NSA
                } else if check && !self.has_route_to_province(&army_unit, destination, None) {
                    lexicon::FAR
                } else {
                    self.set_convoy_order(province, army, destination);
                    lexicon::MBV
                }
            }
            lexicon::CTO => self.process_move_by_convoy_order(order, province, &unit),
            _ => lexicon::NRS,
        }
    }

    fn process_move_by_convoy_order(
        &mut self,
        order: &TokenMessage,
        province: ProvinceIndex,
        unit: &Unit,
    ) -> Token {
        if self.check_orders_on_submission && unit.unit_type != lexicon::AMY {
            return lexicon::NSA;
        }
        let destination = order.submessage(2).first().subtoken();
        let via_list = order.submessage(4);
        let mut via: Vec<ProvinceIndex> = Vec::with_capacity(via_list.len());
        for step in 0..via_list.len() {
            via.push(via_list.token(step).subtoken());
        }

        if self.check_orders_on_submission {
            let mut previous = province;
            let mut last_fleet: Option<Unit> = None;
            for &step in &via {
                let Some(fleet) = self.units.get(&step).cloned() else {
                    return lexicon::NSF;
                };
                if self.map.province(step).is_land {
                    return lexicon::NAS;
                }
                if !self.can_move_to_province(&fleet, previous) {
                    return lexicon::FAR;
                }
                previous = step;
                last_fleet = Some(fleet);
            }
            if destination == province {
                return lexicon::FAR;
            }
            match last_fleet {
                Some(fleet) if self.can_move_to_province(&fleet, destination) => {}
                _ => return lexicon::FAR,
            }
        }
        self.set_move_by_convoy_order(province, destination, via);
        lexicon::MBV
    }

    fn process_retreat_order(
        &mut self,
        order: &TokenMessage,
        power: PowerIndex,
        verb: Token,
    ) -> Token {
        if !self.is_retreat_season() {
            return lexicon::NRS;
        }
        let Some(province) = self.find_unit(&order.submessage(0), true) else {
            return lexicon::NRN;
        };
        let unit = self.dislodged_units[&province].clone();
        if unit.nationality != power {
            return lexicon::NYU;
        }
        match verb {
            lexicon::RTO => {
                let destination = coast_id_of(&order.submessage(2), unit.unit_type);
                if self.check_orders_on_submission && !self.can_move_to(&unit, destination) {
                    lexicon::FAR
                } else if self.check_orders_on_submission
                    && !unit.retreat_options.contains(&destination)
                {
                    lexicon::NVR
                } else {
                    self.set_retreat_order(province, destination);
                    lexicon::MBV
                }
            }
            lexicon::DSB => {
                self.set_disband_order(province);
                lexicon::MBV
            }
            _ => lexicon::NRS,
        }
    }

    fn process_adjustment_order(
        &mut self,
        order: &TokenMessage,
        power: PowerIndex,
        verb: Token,
    ) -> Token {
        if !self.is_winter() {
            return lexicon::NRS;
        }
        match verb {
            lexicon::BLD => {
                let record = self.winter_orders.entry(power).or_default();
                if !record.is_building || record.orders_entered() >= record.required {
                    return lexicon::NMB;
                }
                let unit = order.submessage(0);
                let location = coast_id_of(&unit.submessage(2), unit.token(1));
                if unit.token(0).subtoken() != power {
                    lexicon::NYU
                } else if !self.map.province(location.province).is_supply_centre {
                    lexicon::NSC
                } else if !self
                    .map
                    .province(location.province)
                    .home_powers
                    .contains(&power)
                {
                    lexicon::HSC
                } else if self.map.province(location.province).owner.subtoken() != power {
                    lexicon::YSC
                } else if self.units.contains_key(&location.province) {
                    lexicon::ESC
                } else if !self
                    .map
                    .province(location.province)
                    .coasts
                    .contains_key(&location.coast)
                {
                    lexicon::CST
                } else {
                    let record = self.winter_orders.entry(power).or_default();
                    let already_built = record
                        .builds_or_disbands
                        .keys()
                        .any(|c| c.province == location.province);
                    if already_built {
                        lexicon::ESC
                    } else {
                        record.builds_or_disbands.insert(location, lexicon::MBV);
                        lexicon::MBV
                    }
                }
            }
            lexicon::REM => {
                let record = self.winter_orders.entry(power).or_default();
                if record.is_building
                    || record.builds_or_disbands.len() as u32 >= record.required
                {
                    return lexicon::NMR;
                }
                let Some(province) = self.find_unit(&order.submessage(0), false) else {
                    return lexicon::NSU;
                };
                let unit = self.units[&province].clone();
                if unit.nationality != power {
                    lexicon::NYU
                } else {
                    self.winter_orders
                        .entry(power)
                        .or_default()
                        .builds_or_disbands
                        .insert(unit.coast, lexicon::MBV);
                    lexicon::MBV
                }
            }
            lexicon::WVE => {
                let record = self.winter_orders.entry(power).or_default();
                if !record.is_building || record.orders_entered() >= record.required {
                    lexicon::NMB
                } else if order.token(0).subtoken() != power {
                    lexicon::NYU
                } else {
                    record.waives += 1;
                    lexicon::MBV
                }
            }
            _ => lexicon::NRS,
        }
    }

    /// Withdraws a previously accepted adjustment order (`NOT (SUB ...)`).
    pub fn unorder_adjustment(&mut self, not_sub: &TokenMessage, power: PowerIndex) -> bool {
        if !self.is_winter() {
            return false;
        }
        let sub = not_sub.submessage(1);
        let order = sub.submessage(1);
        let verb = order.submessage(1).first();
        if verb.raw() & lexicon::ORDER_TURN_MASK != lexicon::ORDER_BUILD_TURN {
            return false;
        }
        let record = self.winter_orders.entry(power).or_default();
        match verb {
            lexicon::BLD | lexicon::REM => {
                if record.is_building != (verb == lexicon::BLD) {
                    return false;
                }
                let unit = order.submessage(0);
                let location = coast_id_of(&unit.submessage(2), unit.token(1));
                if unit.token(0).subtoken() != power {
                    return false;
                }
                record.builds_or_disbands.remove(&location).is_some()
            }
            lexicon::WVE => {
                if !record.is_building || record.waives == 0 || order.token(0).subtoken() != power
                {
                    return false;
                }
                record.waives -= 1;
                true
            }
            _ => false,
        }
    }

    /// Resolves a `(power type location)` unit description to the province
    /// of a matching unit.
    pub fn find_unit(&self, unit: &TokenMessage, in_dislodged: bool) -> Option<ProvinceIndex> {
        if unit.submessage_count() != 3 {
            return None;
        }
        let nationality = unit.submessage(0);
        let unit_type = unit.submessage(1);
        let location = unit.submessage(2);
        if !nationality.is_single_token() || !unit_type.is_single_token() {
            return None;
        }
        let coast = coast_id_of(&location, unit_type.first());
        if coast.province as usize >= self.map.province_count {
            return None;
        }
        let collection = if in_dislodged {
            &self.dislodged_units
        } else {
            &self.units
        };
        let found = collection.get(&coast.province)?;
        if found.coast.coast != coast.coast
            || found.nationality != nationality.first().subtoken()
            || found.unit_type != unit_type.first()
        {
            return None;
        }
        Some(coast.province)
    }

    // ----- message building ----------------------------------------------

    /// `(season year)`.
    pub fn describe_turn(&self) -> TokenMessage {
        (self.season + Token::number(self.year)).enclose()
    }

    /// A province, with its coast when one is named.
    pub fn describe_coast(&self, coast: CoastId) -> TokenMessage {
        let province = self.map.province(coast.province).token;
        if coast.coast.category() == lexicon::CATEGORY_COAST {
            (province + coast.coast).enclose()
        } else {
            TokenMessage::single(province)
        }
    }

    /// `(power type location)`.
    pub fn describe_unit(&self, unit: &Unit) -> TokenMessage {
        (Token::new(lexicon::CATEGORY_POWER, unit.nationality)
            + unit.unit_type
            + self.describe_coast(unit.coast))
        .enclose()
    }

    /// `(power type location MRT (options))`.
    pub fn describe_dislodged_unit(&self, unit: &Unit) -> TokenMessage {
        let mut options = TokenMessage::new();
        for &coast in &unit.retreat_options {
            options = options + self.describe_coast(coast);
        }
        let description = Token::new(lexicon::CATEGORY_POWER, unit.nationality)
            + unit.unit_type
            + self.describe_coast(unit.coast)
            + lexicon::MRT;
        (description & options).enclose()
    }

    /// One movement-phase order in token form.
    pub fn describe_movement_order(&self, unit: &Unit) -> TokenMessage {
        match &unit.order {
            Order::Move(dest) => {
                self.describe_unit(unit) + lexicon::MTO + self.describe_coast(*dest)
            }
            Order::SupportHold(supported) => match self.units.get(supported) {
                Some(other) => {
                    self.describe_unit(unit) + lexicon::SUP + self.describe_unit(other)
                }
                None => self.describe_unit(unit) + lexicon::HLD,
            },
            Order::SupportMove { supported, dest } => match self.units.get(supported) {
                Some(other) => {
                    self.describe_unit(unit)
                        + lexicon::SUP
                        + self.describe_unit(other)
                        + lexicon::MTO
                        + self.map.province(*dest).token
                }
                None => self.describe_unit(unit) + lexicon::HLD,
            },
            Order::Convoy { army, dest } => match self.units.get(army) {
                Some(other) => {
                    self.describe_unit(unit)
                        + lexicon::CVY
                        + self.describe_unit(other)
                        + lexicon::CTO
                        + self.map.province(*dest).token
                }
                None => self.describe_unit(unit) + lexicon::HLD,
            },
            Order::MoveByConvoy { dest, via } => {
                let mut route = TokenMessage::new();
                for &step in via {
                    route = route + self.map.province(step).token;
                }
                self.describe_unit(unit) + lexicon::CTO + self.describe_coast(*dest) + lexicon::VIA
                    & route
            }
            _ => self.describe_unit(unit) + lexicon::HLD,
        }
    }

    /// One retreat-phase order in token form.
    pub fn describe_retreat_order(&self, unit: &Unit) -> TokenMessage {
        match &unit.order {
            Order::Retreat(dest) => {
                self.describe_unit(unit) + lexicon::RTO + self.describe_coast(*dest)
            }
            _ => self.describe_unit(unit) + lexicon::DSB,
        }
    }

    /// Serialises every entered order into a SUB command.
    pub fn build_sub_command(&self) -> TokenMessage {
        let mut sub = TokenMessage::single(lexicon::SUB);
        let our_power = self.power_played.subtoken();

        if self.is_movement_season() {
            for unit in self.units.values() {
                if unit.nationality == our_power && unit.order != Order::None {
                    sub = sub & self.describe_movement_order(unit);
                }
            }
        } else if self.is_retreat_season() {
            for unit in self.dislodged_units.values() {
                if unit.nationality == our_power && unit.order != Order::None {
                    sub = sub & self.describe_retreat_order(unit);
                }
            }
        } else {
            for coast in self.our_winter_orders.builds_or_disbands.keys() {
                let unit_type = if coast.coast == lexicon::AMY {
                    lexicon::AMY
                } else {
                    lexicon::FLT
                };
                let unit =
                    (self.power_played + unit_type + self.describe_coast(*coast)).enclose();
                let verb = if self.our_winter_orders.is_building {
                    lexicon::BLD
                } else {
                    lexicon::REM
                };
                sub = sub & (unit + verb);
            }
            for _ in 0..self.our_winter_orders.waives {
                sub = sub & (self.power_played + lexicon::WVE);
            }
        }
        sub
    }

    /// The current position as a NOW message.
    pub fn get_unit_positions(&self) -> TokenMessage {
        let mut now = lexicon::NOW + self.describe_turn();
        for unit in self.units.values() {
            now = now + self.describe_unit(unit);
        }
        for unit in self.dislodged_units.values() {
            now = now + self.describe_dislodged_unit(unit);
        }
        now
    }

    /// The current centre ownership as an SCO message.
    pub fn get_sc_ownerships(&self) -> TokenMessage {
        let mut owned: Vec<TokenMessage> = (0..self.map.power_count)
            .map(|_| TokenMessage::new())
            .collect();
        let mut unowned = TokenMessage::new();

        for province in self.map.province_indices() {
            let details = self.map.province(province);
            if !details.is_supply_centre {
                continue;
            }
            if details.owner == lexicon::UNO {
                unowned = unowned + details.token;
            } else {
                let index = details.owner.subtoken() as usize;
                if index < owned.len() {
                    owned[index] = owned[index].clone() + details.token;
                }
            }
        }

        let mut sco = TokenMessage::single(lexicon::SCO);
        for (index, centres) in owned.into_iter().enumerate() {
            if !centres.is_empty() {
                sco = sco & (Token::new(lexicon::CATEGORY_POWER, index as u8) + centres);
            }
        }
        if !unowned.is_empty() {
            sco = sco & (lexicon::UNO + unowned);
        }
        sco
    }

    // ----- result ingestion ----------------------------------------------

    /// Reads the order out of an ORD message into a unit record.
    pub fn decode_order(&self, unit: &mut Unit, order: &TokenMessage) {
        let verb = order.submessage(1).first();
        if verb == lexicon::HLD {
            unit.order = Order::Hold;
        } else if verb == lexicon::MTO {
            unit.order = Order::Move(coast_id_of(&order.submessage(2), unit.unit_type));
        } else if verb == lexicon::SUP {
            if order.submessage_count() == 3 {
                unit.order = Order::SupportHold(
                    coast_of_unit_description(&order.submessage(2)).province,
                );
            } else {
                unit.order = Order::SupportMove {
                    supported: coast_of_unit_description(&order.submessage(2)).province,
                    dest: order.submessage(4).first().subtoken(),
                };
            }
        } else if verb == lexicon::CVY {
            unit.order = Order::Convoy {
                army: coast_of_unit_description(&order.submessage(2)).province,
                dest: order.submessage(4).first().subtoken(),
            };
        } else if verb == lexicon::CTO {
            let via_list = order.submessage(4);
            let via = (0..via_list.len())
                .map(|step| via_list.token(step).subtoken())
                .collect();
            unit.order = Order::MoveByConvoy {
                dest: coast_id_of(&order.submessage(2), lexicon::AMY),
                via,
            };
        } else if verb == lexicon::DSB {
            unit.order = Order::Disband;
        } else if verb == lexicon::RTO {
            unit.order = Order::Retreat(coast_id_of(&order.submessage(2), unit.unit_type));
        }
    }

    /// Reads the result tokens of an ORD message into a unit record.
    pub fn decode_result(&self, unit: &mut Unit, result: &TokenMessage) {
        let resolution = &mut unit.resolution;
        resolution.no_convoy = false;
        resolution.no_army_to_convoy = false;
        resolution.convoy_broken = false;
        resolution.support_void = false;
        resolution.support_cut = false;
        resolution.bounce = false;
        resolution.dislodged = false;
        resolution.unit_moves = false;
        resolution.illegal_order = false;
        resolution.illegal_reason = None;

        for index in 0..result.len() {
            let token = result.token(index);
            if token.category() == lexicon::CATEGORY_ORDER_NOTE {
                resolution.illegal_order = true;
                resolution.illegal_reason = Some(token);
            } else if token == lexicon::SUC {
                if matches!(
                    unit.order,
                    Order::Move(_) | Order::MoveByConvoy { .. } | Order::Retreat(_)
                ) {
                    resolution.unit_moves = true;
                }
            } else if token == lexicon::BNC {
                resolution.bounce = true;
            } else if token == lexicon::CUT {
                resolution.support_cut = true;
            } else if token == lexicon::DSR {
                resolution.convoy_broken = true;
            } else if token == lexicon::NSO {
                match unit.order {
                    Order::SupportHold(_) | Order::SupportMove { .. } => {
                        resolution.support_void = true
                    }
                    Order::Convoy { .. } => resolution.no_army_to_convoy = true,
                    Order::MoveByConvoy { .. } => resolution.no_convoy = true,
                    _ => {}
                }
            } else if token == lexicon::RET {
                resolution.dislodged = true;
            }
        }
    }

    /// Stores a historical result from an ORD message.
    pub fn store_result(&mut self, ord: &TokenMessage) -> Result<(), StateError> {
        if !self.map.is_set() {
            return Ok(());
        }
        if ord.submessage_count() != 4 {
            return Err(StateError(0));
        }
        let command = ord.submessage(0);
        if !command.is_single_token() || command.first() != lexicon::ORD {
            return Err(StateError(0));
        }
        let turn = ord.submessage(1);
        let order = ord.submessage(2);
        let result = ord.submessage(3);
        let season = turn.token(0);

        // The first movement result of a new season supersedes the old set.
        if (season == lexicon::SPR || season == lexicon::FAL)
            && season != self.last_movement_result_season
        {
            self.last_movement_result_season = season;
            self.last_movement_results.clear();
            self.last_retreat_results.clear();
            self.last_adjustment_results.clear();
        }

        let unit_description = order.submessage(0);
        let verb = order.submessage(1).first();
        let power = unit_description.token(0).subtoken();

        if season == lexicon::WIN {
            let record = self.last_adjustment_results.entry(power).or_default();
            if verb == lexicon::WVE {
                record.waives += 1;
            } else {
                let location =
                    coast_id_of(&unit_description.submessage(2), unit_description.token(1));
                record.builds_or_disbands.insert(location, lexicon::SUC);
                record.is_building = verb == lexicon::BLD;
            }
        } else {
            let coast = coast_of_unit_description(&unit_description);
            let mut unit = Unit::new(coast, power, unit_description.token(1));
            self.decode_order(&mut unit, &order);
            self.decode_result(&mut unit, &result);
            if season == lexicon::SPR || season == lexicon::FAL {
                self.last_movement_results.insert(coast.province, unit);
            } else {
                self.last_retreat_results.insert(coast.province, unit);
            }
        }
        Ok(())
    }

    // ----- adjudication results ------------------------------------------

    /// The results of the adjudicated turn as ORD messages.
    pub fn get_adjudication_results(&self) -> Vec<TokenMessage> {
        if self.is_movement_season() {
            self.units
                .values()
                .map(|unit| self.describe_movement_result(unit))
                .collect()
        } else if self.is_retreat_season() {
            self.dislodged_units
                .values()
                .map(|unit| self.describe_retreat_result(unit))
                .collect()
        } else {
            let mut results = Vec::new();
            for (&power, orders) in &self.winter_orders {
                for coast in orders.builds_or_disbands.keys() {
                    results.push(self.describe_build_result(power, orders, *coast));
                }
                if orders.is_building {
                    for _ in 0..orders.waives {
                        results.push(self.describe_waive_result(power));
                    }
                }
            }
            results
        }
    }

    fn describe_movement_result(&self, unit: &Unit) -> TokenMessage {
        let order = self.describe_movement_order(unit);
        let resolution = &unit.resolution;
        let mut result = TokenMessage::new();

        match &unit.order {
            Order::None | Order::Hold => {
                if !resolution.dislodged {
                    result = result + lexicon::SUC;
                }
            }
            Order::Move(_) => {
                if resolution.bounce {
                    result = result + lexicon::BNC;
                } else if let Some(reason) = illegal(resolution) {
                    result = result + reason;
                } else {
                    result = result + lexicon::SUC;
                }
            }
            Order::SupportHold(_) | Order::SupportMove { .. } => {
                if resolution.support_cut {
                    result = result + lexicon::CUT;
                } else if resolution.support_void {
                    result = result + lexicon::NSO;
                } else if let Some(reason) = illegal(resolution) {
                    result = result + reason;
                } else {
                    result = result + lexicon::SUC;
                }
            }
            Order::Convoy { .. } => {
                if resolution.no_army_to_convoy {
                    result = result + lexicon::NSO;
                } else if let Some(reason) = illegal(resolution) {
                    result = result + reason;
                } else if !resolution.dislodged {
                    result = result + lexicon::SUC;
                }
            }
            Order::MoveByConvoy { .. } => {
                if resolution.no_convoy {
                    result = result + lexicon::NSO;
                } else if resolution.convoy_broken {
                    result = result + lexicon::DSR;
                } else if resolution.bounce {
                    result = result + lexicon::BNC;
                } else if let Some(reason) = illegal(resolution) {
                    result = result + reason;
                } else {
                    result = result + lexicon::SUC;
                }
            }
            _ => {}
        }

        if resolution.dislodged {
            result = result + lexicon::RET;
        }
        (lexicon::ORD + self.describe_turn()) & order & result
    }

    fn describe_retreat_result(&self, unit: &Unit) -> TokenMessage {
        let order = self.describe_retreat_order(unit);
        let resolution = &unit.resolution;
        let result = match &unit.order {
            Order::Retreat(_) => {
                if resolution.bounce {
                    TokenMessage::single(lexicon::BNC)
                } else if let Some(reason) = illegal(resolution) {
                    TokenMessage::single(reason)
                } else {
                    TokenMessage::single(lexicon::SUC)
                }
            }
            _ => TokenMessage::single(lexicon::SUC),
        };
        (lexicon::ORD + self.describe_turn()) & order & result
    }

    fn describe_build_result(
        &self,
        power: PowerIndex,
        orders: &WinterOrders,
        coast: CoastId,
    ) -> TokenMessage {
        let unit_type = if coast.coast == lexicon::AMY {
            lexicon::AMY
        } else {
            lexicon::FLT
        };
        let unit = (Token::new(lexicon::CATEGORY_POWER, power)
            + unit_type
            + self.describe_coast(coast))
        .enclose();
        let verb = if orders.is_building {
            lexicon::BLD
        } else {
            lexicon::REM
        };
        (lexicon::ORD + self.describe_turn()) & (unit + verb) & lexicon::SUC
    }

    fn describe_waive_result(&self, power: PowerIndex) -> TokenMessage {
        let order = Token::new(lexicon::CATEGORY_POWER, power) + lexicon::WVE;
        (lexicon::ORD + self.describe_turn()) & order & lexicon::SUC
    }
}

/// The coast a `(power type location)` description names.
pub fn coast_of_unit_description(unit: &TokenMessage) -> CoastId {
    coast_id_of(&unit.submessage(2), unit.submessage(1).first())
}

fn illegal(resolution: &crate::board::unit::Resolution) -> Option<Token> {
    if resolution.illegal_order {
        resolution.illegal_reason
    } else {
        None
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

    fn now_units(state: &mut GameState, season: Token, units: &[(Token, Token, Token)]) {
        let mut now = NOW + (season + Token::number(1901)).enclose();
        for &(power, unit_type, province) in units {
            now = now + (power + unit_type + province).enclose();
        }
        state.set_units(&now).unwrap();
    }

    fn pi(token: Token) -> ProvinceIndex {
        token.subtoken()
    }

    #[test]
    fn movement_orders_validate_geometry() {
        let mut state = game();
        now_units(
            &mut state,
            SPR,
            &[(FRA, AMY, PAR), (FRA, AMY, MAR), (ENG, FLT, LON)],
        );

        let unit = (FRA + AMY + PAR).enclose();
        let good = unit.clone() + MTO + BUR;
        assert_eq!(state.process_order(&good, pi(FRA)), MBV);
        assert_eq!(
            state.units[&pi(PAR)].order,
            Order::Move(CoastId::new(pi(BUR), AMY))
        );

        // Paris cannot reach London.
        let far = unit.clone() + MTO + LON;
        assert_eq!(state.process_order(&far, pi(FRA)), FAR);

        // Not our unit.
        let foreign = (ENG + FLT + LON).enclose() + MTO + NTH;
        assert_eq!(state.process_order(&foreign, pi(FRA)), NYU);

        // No such unit.
        let missing = (FRA + AMY + BUR).enclose() + HLD;
        assert_eq!(state.process_order(&missing, pi(FRA)), NSU);

        // Wrong season for a retreat.
        let retreat = unit + RTO + PIC;
        assert_eq!(state.process_order(&retreat, pi(FRA)), NRS);
    }

    #[test]
    fn self_support_is_rejected() {
        let mut state = game();
        now_units(&mut state, SPR, &[(FRA, AMY, PAR), (FRA, AMY, BUR)]);
        let unit = (FRA + AMY + PAR).enclose();
        let own = (FRA + AMY + PAR).enclose();
        let order = unit + SUP + own;
        assert_eq!(state.process_order(&order, pi(FRA)), FAR);
    }

    #[test]
    fn support_to_move_needs_both_routes() {
        let mut state = game();
        now_units(
            &mut state,
            SPR,
            &[(GER, AMY, MUN), (GER, AMY, BOH), (AUS, AMY, VIE)],
        );
        let supporter = (GER + AMY + BOH).enclose();
        let supported = (GER + AMY + MUN).enclose();
        let good = supporter.clone() + SUP + supported.clone() + MTO + TYR;
        assert_eq!(state.process_order(&good, pi(GER)), MBV);
        assert_eq!(
            state.units[&pi(BOH)].order,
            Order::SupportMove {
                supported: pi(MUN),
                dest: pi(TYR),
            }
        );

        // Bohemia cannot support into Ruhr (not adjacent to Bohemia).
        let far = supporter + SUP + supported + MTO + RUH;
        assert_eq!(state.process_order(&far, pi(GER)), FAR);
    }

    #[test]
    fn convoy_orders_validate_fleet_and_route() {
        let mut state = game();
        now_units(
            &mut state,
            SPR,
            &[(ENG, AMY, LON), (ENG, FLT, NTH), (ENG, FLT, EDI)],
        );
        let fleet = (ENG + FLT + NTH).enclose();
        let army = (ENG + AMY + LON).enclose();
        let convoy = fleet + CVY + army.clone() + CTO + NWY;
        assert_eq!(state.process_order(&convoy, pi(ENG)), MBV);

        // A coastal fleet cannot convoy.
        let coastal = (ENG + FLT + EDI).enclose() + CVY + army.clone() + CTO + NWY;
        assert_eq!(state.process_order(&coastal, pi(ENG)), NAS);

        let via = TokenMessage::single(NTH);
        let cto = army + CTO + NWY + VIA + via.enclose();
        assert_eq!(state.process_order(&cto, pi(ENG)), MBV);
        assert_eq!(
            state.units[&pi(LON)].order,
            Order::MoveByConvoy {
                dest: CoastId::new(pi(NWY), AMY),
                via: vec![pi(NTH)],
            }
        );
    }

    #[test]
    fn build_validation_notes() {
        let mut state = game();
        state.set_power_played(FRA);
        let sco = SCO & (FRA + BRE + MAR + PAR) & (ENG + EDI + LON + LVP);
        state.set_ownership(&sco).unwrap();
        now_units(&mut state, WIN, &[(FRA, AMY, PAR)]);
        state.winter_orders.insert(
            pi(FRA),
            WinterOrders {
                required: 2,
                is_building: true,
                ..WinterOrders::default()
            },
        );

        // Not a home centre of France.
        let order = (FRA + AMY + LON).enclose() + BLD;
        assert_eq!(state.process_order(&order, pi(FRA)), HSC);

        // Occupied home centre.
        let order = (FRA + AMY + PAR).enclose() + BLD;
        assert_eq!(state.process_order(&order, pi(FRA)), ESC);

        // Fleet on an inland centre: Paris has no fleet coast, but Paris is
        // occupied anyway; use Marseilles with a bogus coast instead.
        let location = (MAR + NCS).enclose();
        let order = (FRA + FLT + location).enclose() + BLD;
        assert_eq!(state.process_order(&order, pi(FRA)), CST);

        // A good build.
        let order = (FRA + FLT + BRE).enclose() + BLD;
        assert_eq!(state.process_order(&order, pi(FRA)), MBV);

        // Second build in the same province.
        let order = (FRA + AMY + BRE).enclose() + BLD;
        assert_eq!(state.process_order(&order, pi(FRA)), ESC);

        // Waive the second build; a third order is then refused.
        let order = TokenMessage::single(FRA) + WVE;
        assert_eq!(state.process_order(&order, pi(FRA)), MBV);
        let order = TokenMessage::single(FRA) + WVE;
        assert_eq!(state.process_order(&order, pi(FRA)), NMB);
    }

    #[test]
    fn unorder_adjustment_removes_builds() {
        let mut state = game();
        state.set_power_played(FRA);
        let sco = SCO & (FRA + BRE + MAR + PAR);
        state.set_ownership(&sco).unwrap();
        now_units(&mut state, WIN, &[]);
        state.winter_orders.insert(
            pi(FRA),
            WinterOrders {
                required: 1,
                is_building: true,
                ..WinterOrders::default()
            },
        );
        let order = (FRA + AMY + BRE).enclose() + BLD;
        assert_eq!(state.process_order(&order, pi(FRA)), MBV);

        let not_sub = NOT & (SUB & ((FRA + AMY + BRE).enclose() + BLD));
        assert!(state.unorder_adjustment(&not_sub, pi(FRA)));
        assert!(state.winter_orders[&pi(FRA)].builds_or_disbands.is_empty());
        assert!(!state.unorder_adjustment(&not_sub, pi(FRA)));
    }

    #[test]
    fn sub_command_roundtrip() {
        let mut state = game();
        state.set_power_played(ENG);
        now_units(
            &mut state,
            SPR,
            &[(ENG, FLT, LON), (ENG, FLT, NTH), (ENG, AMY, YOR)],
        );
        state.set_move_order(pi(LON), CoastId::new(pi(NTH), FLT));
        // London's move is nonsense combined with North Sea holding, but the
        // SUB builder reports whatever was entered.
        state.set_hold_order(pi(NTH));
        state.set_support_to_hold_order(pi(YOR), pi(LON));

        let sub = state.build_sub_command();
        assert_eq!(sub.first(), SUB);
        assert_eq!(sub.submessage_count(), 4);

        // Feed the orders back through the server path.
        let mut server = state.duplicate();
        server.clear_all_orders();
        let notes = server.process_orders(&sub, pi(ENG)).unwrap();
        assert_eq!(notes, vec![MBV, MBV, MBV]);
        assert_eq!(server.units[&pi(YOR)].order, Order::SupportHold(pi(LON)));
    }

    #[test]
    fn now_and_sco_roundtrip() {
        let mut state = game();
        state.set_power_played(RUS);
        let location = (STP + SCS).enclose();
        let now = NOW + (FAL + Token::number(1902)).enclose()
            + (RUS + FLT + location).enclose()
            + (RUS + AMY + MOS).enclose();
        state.set_units(&now).unwrap();
        let sco = SCO & (RUS + MOS + STP) & (UNO + RUM);
        state.set_ownership(&sco).unwrap();

        let mut copy = game();
        copy.set_power_played(RUS);
        copy.set_units(&state.get_unit_positions()).unwrap();
        copy.set_ownership(&state.get_sc_ownerships()).unwrap();

        assert_eq!(copy.units.len(), 2);
        assert_eq!(
            copy.units[&pi(STP)].coast,
            CoastId::new(pi(STP), SCS)
        );
        assert_eq!(copy.map.province(pi(RUM)).owner, UNO);
        // Moscow and St. Petersburg from the SCO, Sevastopol and Warsaw
        // still from the initial map ownership.
        assert_eq!(copy.centre_count(RUS), 4);
    }

    #[test]
    fn ord_results_are_stored() {
        let mut state = game();
        now_units(&mut state, SPR, &[(FRA, AMY, PAR)]);
        let order = (FRA + AMY + PAR).enclose() + MTO + BUR;
        let ord = (ORD + (SPR + Token::number(1901)).enclose()) & order & BNC;
        state.store_result(&ord).unwrap();

        let stored = &state.last_movement_results[&pi(PAR)];
        assert_eq!(stored.order, Order::Move(CoastId::new(pi(BUR), AMY)));
        assert!(stored.resolution.bounce);
        assert!(!stored.resolution.unit_moves);
    }
}
