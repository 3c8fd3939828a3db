//! Movement-turn adjudication, after the DPTG algorithm.
//!
//! The resolution walks fixed stages: cancel inconsistent convoys and
//! supports, cut supports under direct attack, build support lists, then
//! untangle convoys (subverted, futile, indomitable, confused, and circles
//! of subversion), rings of attack, head-to-head battles, and finally the
//! ordinary province fights. Every collection iterates in key order, so the
//! outcome is a pure function of the submitted orders.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::board::game::GameState;
use crate::board::map::ProvinceIndex;
use crate::board::unit::{Order, RingStatus};
use crate::token::lexicon;

/// How a convoy stands in the subversion graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubversionKind {
    NotSubverted,
    Subverted,
    Confused,
}

/// Subversion bookkeeping for one convoyed army.
#[derive(Debug, Clone)]
struct ConvoySubversion {
    /// The convoyed army of the convoy this one subverts, if any.
    subverted_army: Option<ProvinceIndex>,
    /// How many convoys subvert this one.
    subversion_count: u32,
    kind: SubversionKind,
}

/// Scratch state for one movement resolution.
struct MoveAdjudicator<'a> {
    state: &'a mut GameState,
    /// Destination province to the set of provinces attacking it.
    attacker_map: BTreeMap<ProvinceIndex, BTreeSet<ProvinceIndex>>,
    supporting_units: BTreeSet<ProvinceIndex>,
    convoying_units: BTreeSet<ProvinceIndex>,
    convoyed_units: BTreeSet<ProvinceIndex>,
    subversions: BTreeMap<ProvinceIndex, ConvoySubversion>,
    rings_of_attack: BTreeSet<ProvinceIndex>,
    balanced_head_to_heads: BTreeSet<ProvinceIndex>,
    unbalanced_head_to_heads: BTreeSet<ProvinceIndex>,
}

/// Resolves the movement turn in place.
pub fn adjudicate_moves(state: &mut GameState) {
    let mut adjudicator = MoveAdjudicator {
        state,
        attacker_map: BTreeMap::new(),
        supporting_units: BTreeSet::new(),
        convoying_units: BTreeSet::new(),
        convoyed_units: BTreeSet::new(),
        subversions: BTreeMap::new(),
        rings_of_attack: BTreeSet::new(),
        balanced_head_to_heads: BTreeSet::new(),
        unbalanced_head_to_heads: BTreeSet::new(),
    };
    adjudicator.run();
}

impl<'a> MoveAdjudicator<'a> {
    fn run(&mut self) {
        self.initialise();
        if self.state.check_orders_on_adjudication {
            self.check_for_illegal_orders();
        }
        self.partition_units();
        self.cancel_inconsistent_convoys();
        self.cancel_inconsistent_supports();
        self.direct_attacks_cut_support();
        self.build_support_lists();
        self.build_convoy_subversion_list();

        let mut futile_checked = false;
        let mut indomitable_checked = false;
        let mut changes = true;
        while changes {
            changes = self.resolve_attacks_on_non_subverted_convoys();
            if !changes && !futile_checked {
                changes = self.check_for_futile_convoys();
                futile_checked = true;
            }
            if !changes && !indomitable_checked {
                changes = self.check_for_indomitable_and_futile_convoys();
                indomitable_checked = true;
            }
        }

        self.resolve_circles_of_subversion();
        self.identify_rings_and_head_to_heads();
        self.advance_rings_of_attack();
        self.resolve_unbalanced_head_to_heads();
        self.resolve_balanced_head_to_heads();
        self.fight_ordinary_battles();
    }

    fn provinces(&self) -> Vec<ProvinceIndex> {
        self.state.units.keys().copied().collect()
    }

    fn resolution_order(&self, province: ProvinceIndex) -> Option<Order> {
        self.state
            .units
            .get(&province)
            .map(|u| u.resolution.order.clone())
    }

    fn initialise(&mut self) {
        self.state.bounce_locations.clear();
        for unit in self.state.units.values_mut() {
            unit.reset_resolution();
        }
    }

    /// Downgrades geometrically impossible orders to holds, recording the
    /// reason. Runs only for any-orders-accepted games.
    fn check_for_illegal_orders(&mut self) {
        for province in self.provinces() {
            let unit = self.state.units[&province].clone();
            let illegal = match &unit.resolution.order {
                Order::Hold => None,
                Order::None => {
                    // No order entered: the unit just holds.
                    self.state.units.get_mut(&province).unwrap().resolution.order = Order::Hold;
                    None
                }
                Order::Move(dest) => {
                    if !self.state.can_move_to(&unit, *dest) {
                        Some(lexicon::FAR)
                    } else {
                        None
                    }
                }
                Order::SupportHold(supported) => {
                    if *supported == province
                        || !self.state.can_move_to_province(&unit, *supported)
                    {
                        Some(lexicon::FAR)
                    } else {
                        None
                    }
                }
                Order::SupportMove { supported, dest } => {
                    if *supported == province {
                        Some(lexicon::FAR)
                    } else if !self.state.can_move_to_province(&unit, *dest) {
                        Some(lexicon::FAR)
                    } else {
                        None
                    }
                }
                Order::Convoy { army, .. } => {
                    if unit.unit_type != lexicon::FLT {
                        Some(lexicon::NSF)
                    } else if self.state.map.province(province).is_land {
                        Some(lexicon::NAS)
                    } else if self
                        .state
                        .units
                        .get(army)
                        .is_some_and(|a| a.unit_type != lexicon::AMY)
                    {
                        Some(lexicon::NSA)
                    } else {
                        None
                    }
                }
                Order::MoveByConvoy { dest, via } => {
                    self.illegal_convoy_route(&unit, province, dest.province, via)
                }
                _ => {
                    self.state.units.get_mut(&province).unwrap().resolution.order = Order::Hold;
                    None
                }
            };
            if let Some(reason) = illegal {
                let unit = self.state.units.get_mut(&province).unwrap();
                unit.resolution.order = Order::Hold;
                unit.resolution.illegal_order = true;
                unit.resolution.illegal_reason = Some(reason);
            }
        }
    }

    fn illegal_convoy_route(
        &self,
        unit: &crate::board::Unit,
        province: ProvinceIndex,
        destination: ProvinceIndex,
        via: &[ProvinceIndex],
    ) -> Option<crate::token::Token> {
        if unit.unit_type != lexicon::AMY {
            return Some(lexicon::NSA);
        }
        let mut previous = province;
        let mut last_fleet = None;
        for &step in via {
            let Some(fleet) = self.state.units.get(&step) else {
                return Some(lexicon::NSF);
            };
            if self.state.map.province(step).is_land {
                return Some(lexicon::NAS);
            }
            if !self.state.can_move_to_province(fleet, previous) {
                return Some(lexicon::FAR);
            }
            previous = step;
            last_fleet = Some(fleet);
        }
        match last_fleet {
            Some(fleet) if self.state.can_move_to_province(fleet, destination) => {}
            _ => return Some(lexicon::FAR),
        }
        if destination == province {
            return Some(lexicon::FAR);
        }
        None
    }

    /// Sorts each unit into the attacker map or the supporter/convoy sets.
    fn partition_units(&mut self) {
        for province in self.provinces() {
            match self.resolution_order(province) {
                Some(Order::Move(dest)) => {
                    self.attacker_map
                        .entry(dest.province)
                        .or_default()
                        .insert(province);
                }
                Some(Order::SupportHold(_)) | Some(Order::SupportMove { .. }) => {
                    self.supporting_units.insert(province);
                }
                Some(Order::Convoy { .. }) => {
                    self.convoying_units.insert(province);
                }
                Some(Order::MoveByConvoy { .. }) => {
                    self.convoyed_units.insert(province);
                }
                _ => {}
            }
        }
    }

    /// An army moving by convoy needs every listed fleet ordered to convoy
    /// it; a convoying fleet needs its army ordered onto the convoy.
    fn cancel_inconsistent_convoys(&mut self) {
        let armies: Vec<ProvinceIndex> = self.convoyed_units.iter().copied().collect();
        for army in armies {
            let Some(Order::MoveByConvoy { dest, via }) = self.resolution_order(army) else {
                continue;
            };
            let mut order_ok = true;
            for step in &via {
                match self.state.units.get(step) {
                    Some(fleet) => match fleet.resolution.order {
                        Order::Convoy {
                            army: convoyed,
                            dest: convoy_dest,
                        } if convoyed == army && convoy_dest == dest.province => {}
                        _ => order_ok = false,
                    },
                    None => order_ok = false,
                }
            }
            if !order_ok {
                let unit = self.state.units.get_mut(&army).unwrap();
                unit.resolution.order = Order::HoldNoSupport;
                unit.resolution.no_convoy = true;
                self.convoyed_units.remove(&army);
            }
        }

        let fleets: Vec<ProvinceIndex> = self.convoying_units.iter().copied().collect();
        for fleet in fleets {
            let Some(Order::Convoy { army, dest }) = self.resolution_order(fleet) else {
                continue;
            };
            let order_ok = match self.state.units.get(&army) {
                Some(unit) => {
                    let ordered = matches!(
                        &unit.order,
                        Order::MoveByConvoy { dest: move_dest, .. }
                            if move_dest.province == dest
                    );
                    // The army must also still be convoying: other fleets
                    // may already have broken the chain.
                    ordered && matches!(unit.resolution.order, Order::MoveByConvoy { .. })
                }
                None => false,
            };
            if !order_ok {
                let unit = self.state.units.get_mut(&fleet).unwrap();
                unit.resolution.no_army_to_convoy = true;
                unit.resolution.order = Order::Hold;
                self.convoying_units.remove(&fleet);
            }
        }
    }

    /// Voids supports whose supported unit is not doing what the support
    /// declares. Self-supports are void outright.
    fn cancel_inconsistent_supports(&mut self) {
        let supporters: Vec<ProvinceIndex> = self.supporting_units.iter().copied().collect();
        for supporter in supporters {
            let Some(order) = self.resolution_order(supporter) else {
                continue;
            };
            let Some(supported) = order.supported_province() else {
                continue;
            };

            let mut order_ok = true;
            let mut void = false;
            if supported == supporter {
                order_ok = false;
                void = true;
            } else {
                match self.state.units.get(&supported) {
                    None => {
                        order_ok = false;
                        void = true;
                    }
                    Some(unit) => match &order {
                        Order::SupportHold(_) => {
                            if unit.resolution.order.is_move()
                                || unit.resolution.order == Order::HoldNoSupport
                            {
                                order_ok = false;
                                void = true;
                            }
                        }
                        Order::SupportMove { dest, .. } => {
                            let ordered_to_move = match unit.order.move_dest() {
                                Some(move_dest) => {
                                    !matches!(unit.order, Order::Retreat(_))
                                        && move_dest.province == *dest
                                }
                                None => false,
                            };
                            if !ordered_to_move {
                                order_ok = false;
                                void = true;
                            } else if !unit.resolution.order.is_move() {
                                // Ordered correctly, but the move already
                                // failed; the support lapses silently.
                                order_ok = false;
                            }
                        }
                        _ => {}
                    },
                }
            }

            if !order_ok {
                let unit = self.state.units.get_mut(&supporter).unwrap();
                if void {
                    unit.resolution.support_void = true;
                }
                unit.resolution.order = Order::Hold;
                self.supporting_units.remove(&supporter);
            }
        }
    }

    /// A direct (non-convoyed) attack cuts support in its target province
    /// unless the support is aimed back at the attacker's own province.
    fn direct_attacks_cut_support(&mut self) {
        let attacks: Vec<(ProvinceIndex, ProvinceIndex)> = self
            .attacker_map
            .iter()
            .flat_map(|(&dest, sources)| sources.iter().map(move |&s| (dest, s)))
            .collect();

        for (dest, attacker) in attacks {
            let attacker_nationality = self.state.units[&attacker].nationality;
            let Some(target) = self.state.units.get(&dest) else {
                continue;
            };
            if target.nationality == attacker_nationality {
                continue;
            }
            let cuts = match &target.resolution.order {
                Order::SupportHold(_) => true,
                Order::SupportMove { dest: aim, .. } => *aim != attacker,
                _ => false,
            };
            if cuts {
                let target = self.state.units.get_mut(&dest).unwrap();
                target.resolution.support_cut = true;
                target.resolution.order = Order::Hold;
                self.supporting_units.remove(&dest);
            }
        }
    }

    /// Records each surviving support against its supported unit, counting
    /// the supports valid for dislodgement (no power can support the
    /// dislodgement of its own unit).
    fn build_support_lists(&mut self) {
        let supporters: Vec<ProvinceIndex> = self.supporting_units.iter().copied().collect();
        for supporter in supporters {
            let Some(order) = self.resolution_order(supporter) else {
                continue;
            };
            let Some(supported) = order.supported_province() else {
                continue;
            };
            let supporter_nationality = self.state.units[&supporter].nationality;
            let supported_nationality = self.state.units[&supported].nationality;

            self.state
                .units
                .get_mut(&supported)
                .unwrap()
                .resolution
                .supports
                .insert(supporter);

            if let Order::SupportMove { dest, .. } = order {
                let counts = match self.state.units.get(&dest) {
                    None => true,
                    Some(attacked) => {
                        supporter_nationality != attacked.nationality
                            && supported_nationality != attacked.nationality
                    }
                };
                if counts {
                    self.state
                        .units
                        .get_mut(&supporter)
                        .unwrap()
                        .resolution
                        .is_support_to_dislodge = true;
                    self.state
                        .units
                        .get_mut(&supported)
                        .unwrap()
                        .resolution
                        .supports_to_dislodge += 1;
                }
            }
        }
    }

    /// A convoy subverts another when its attack target is supporting one of
    /// the other convoy's fleets, or supporting a move against one.
    fn build_convoy_subversion_list(&mut self) {
        let armies: Vec<ProvinceIndex> = self.convoyed_units.iter().copied().collect();
        for army in armies {
            let mut subverted_army = None;
            let unit = &self.state.units[&army];
            let nationality = unit.nationality;
            if let Some(dest) = unit.resolution.order.move_dest() {
                if let Some(attacked) = self.state.units.get(&dest.province) {
                    if attacked.nationality != nationality {
                        let supported_fleet = match &attacked.resolution.order {
                            Order::SupportHold(supported) => Some(*supported),
                            Order::SupportMove { dest: aim, .. } => Some(*aim),
                            _ => None,
                        };
                        if let Some(fleet) = supported_fleet {
                            if let Some(Order::Convoy { army: other, .. }) =
                                self.resolution_order(fleet)
                            {
                                subverted_army = Some(other);
                            }
                        }
                    }
                }
            }
            self.subversions.insert(
                army,
                ConvoySubversion {
                    subverted_army,
                    subversion_count: 0,
                    kind: SubversionKind::NotSubverted,
                },
            );
        }

        let armies: Vec<ProvinceIndex> = self.subversions.keys().copied().collect();
        for army in armies {
            if let Some(target) = self.subversions[&army].subverted_army {
                if let Some(record) = self.subversions.get_mut(&target) {
                    record.kind = SubversionKind::Subverted;
                    record.subversion_count += 1;
                }
            }
        }
    }

    /// The subverting convoy stops mattering to `target`.
    fn release_subversion(&mut self, target: ProvinceIndex) {
        if let Some(record) = self.subversions.get_mut(&target) {
            record.subversion_count = record.subversion_count.saturating_sub(1);
            if record.subversion_count == 0 && record.kind == SubversionKind::Subverted {
                record.kind = SubversionKind::NotSubverted;
            }
        }
    }

    /// Reverts a whole convoy: fleets to hold, the army to an unsupported
    /// hold with its convoy marked broken.
    fn break_convoy(&mut self, army: ProvinceIndex, via: &[ProvinceIndex]) {
        for step in via {
            if let Some(fleet) = self.state.units.get_mut(step) {
                fleet.resolution.order = Order::Hold;
            }
        }
        if let Some(unit) = self.state.units.get_mut(&army) {
            unit.resolution.order = Order::HoldNoSupport;
            unit.resolution.convoy_broken = true;
            unit.resolution.supports.clear();
            unit.resolution.supports_to_dislodge = 0;
        }
    }

    /// Resolves every convoy that currently subverts nothing: either a fleet
    /// is dislodged and the convoy breaks, or the convoyed attack lands.
    fn resolve_attacks_on_non_subverted_convoys(&mut self) -> bool {
        let mut changes = false;
        let armies: Vec<ProvinceIndex> = self.subversions.keys().copied().collect();
        for army in armies {
            let Some(record) = self.subversions.get(&army) else {
                continue;
            };
            if record.kind != SubversionKind::NotSubverted {
                continue;
            }
            let Some(Order::MoveByConvoy { dest, via }) = self.resolution_order(army) else {
                self.subversions.remove(&army);
                changes = true;
                continue;
            };

            let mut convoy_broken = false;
            for &fleet in &via {
                if self.resolve_attacks_on_occupied_province(fleet) {
                    convoy_broken = true;
                }
            }
            if convoy_broken {
                self.break_convoy(army, &via);
            } else {
                self.cut_support(dest.province);
                self.attacker_map
                    .entry(dest.province)
                    .or_default()
                    .insert(army);
            }

            if let Some(target) = self.subversions[&army].subverted_army {
                self.release_subversion(target);
            }
            self.subversions.remove(&army);
            changes = true;
        }
        changes
    }

    /// The fleet whose support the subverting convoy attacks.
    fn subverted_fleet_of(&self, army: ProvinceIndex) -> Option<ProvinceIndex> {
        let dest = self.resolution_order(army)?.move_dest()?;
        let attacked = self.state.units.get(&dest.province)?;
        match &attacked.resolution.order {
            Order::SupportHold(supported) => Some(*supported),
            Order::SupportMove { dest: aim, .. } => Some(*aim),
            _ => None,
        }
    }

    /// Tries to dislodge every fleet of each subverted chain except the
    /// subverted fleet itself; a hit breaks that convoy as futile.
    fn check_for_futile_convoys(&mut self) -> bool {
        let mut changes = false;
        let armies: Vec<ProvinceIndex> = self.subversions.keys().copied().collect();
        for army in armies {
            let Some(record) = self.subversions.get(&army) else {
                continue;
            };
            let Some(subverted_army) = record.subverted_army else {
                continue;
            };
            let Some(subverted_fleet) = self.subverted_fleet_of(army) else {
                continue;
            };
            let Some(Order::MoveByConvoy { via, .. }) = self.resolution_order(subverted_army)
            else {
                continue;
            };

            let mut convoy_broken = false;
            for &fleet in &via {
                if fleet != subverted_fleet && self.resolve_attacks_on_occupied_province(fleet) {
                    convoy_broken = true;
                }
            }
            if convoy_broken {
                self.break_convoy(subverted_army, &via);
                if let Some(target) = self
                    .subversions
                    .get(&subverted_army)
                    .and_then(|r| r.subverted_army)
                {
                    self.release_subversion(target);
                }
                self.subversions.remove(&subverted_army);
                if let Some(record) = self.subversions.get_mut(&army) {
                    record.subverted_army = None;
                }
                changes = true;
            }
        }
        changes
    }

    /// Compares who would dislodge the subverted fleet with the attacked
    /// support intact against with it cut, classifying the subverted convoy
    /// as futile, still subverted, confused, or indomitable.
    fn check_for_indomitable_and_futile_convoys(&mut self) -> bool {
        let mut changes = false;
        let armies: Vec<ProvinceIndex> = self.subversions.keys().copied().collect();
        for army in armies {
            let Some(record) = self.subversions.get(&army) else {
                continue;
            };
            let Some(subverted_army) = record.subverted_army else {
                continue;
            };
            let Some(dest) = self
                .resolution_order(army)
                .and_then(|order| order.move_dest())
            else {
                continue;
            };
            let Some(attacked) = self.state.units.get(&dest.province) else {
                continue;
            };
            let attacked_province = dest.province;
            let attacked_counts = attacked.resolution.is_support_to_dislodge;
            let (subverted_fleet, supported) = match &attacked.resolution.order {
                Order::SupportHold(supported) => (*supported, *supported),
                Order::SupportMove {
                    supported,
                    dest: aim,
                } => (*aim, *supported),
                _ => continue,
            };

            let dislodger_if_not_cut = self.find_dislodging_unit(subverted_fleet, false);

            // Temporarily withdraw the attacked unit's support.
            if let Some(unit) = self.state.units.get_mut(&supported) {
                unit.resolution.supports.remove(&attacked_province);
                if attacked_counts {
                    unit.resolution.supports_to_dislodge -= 1;
                }
            }
            let dislodger_if_cut = self.find_dislodging_unit(subverted_fleet, false);
            if let Some(unit) = self.state.units.get_mut(&supported) {
                unit.resolution.supports.insert(attacked_province);
                if attacked_counts {
                    unit.resolution.supports_to_dislodge += 1;
                }
            }

            match (dislodger_if_not_cut.is_some(), dislodger_if_cut.is_some()) {
                (true, true) => {
                    // Futile: the fleet falls either way.
                    if let Some(Order::MoveByConvoy { via, .. }) =
                        self.resolution_order(subverted_army)
                    {
                        self.break_convoy(subverted_army, &via);
                    }
                    if let Some(target) = self
                        .subversions
                        .get(&subverted_army)
                        .and_then(|r| r.subverted_army)
                    {
                        self.release_subversion(target);
                    }
                    self.subversions.remove(&subverted_army);
                    if let Some(record) = self.subversions.get_mut(&army) {
                        record.subverted_army = None;
                    }
                    changes = true;
                }
                (true, false) => {
                    // Still subverted; nothing to conclude this round.
                }
                (false, true) => {
                    // Confused: settled with its circle of subversion.
                    if let Some(record) = self.subversions.get_mut(&subverted_army) {
                        record.kind = SubversionKind::Confused;
                    }
                }
                (false, false) => {
                    // Indomitable: the subverted convoy's attack lands.
                    if let Some(target_dest) = self
                        .resolution_order(subverted_army)
                        .and_then(|order| order.move_dest())
                    {
                        self.cut_support(target_dest.province);
                        self.attacker_map
                            .entry(target_dest.province)
                            .or_default()
                            .insert(subverted_army);
                    }
                    if let Some(target) = self
                        .subversions
                        .get(&subverted_army)
                        .and_then(|r| r.subverted_army)
                    {
                        self.release_subversion(target);
                    }
                    self.subversions.remove(&subverted_army);
                    if let Some(record) = self.subversions.get_mut(&army) {
                        record.subverted_army = None;
                    }
                    changes = true;
                }
            }
        }
        changes
    }

    /// The convoys left over form subversion loops. A confused member makes
    /// every attack on the loop's fleets fail; the loop's convoys all break.
    fn resolve_circles_of_subversion(&mut self) {
        loop {
            let Some(&start) = self.subversions.keys().next() else {
                break;
            };
            let mut members = vec![start];
            let mut confused = self.subversions[&start].kind == SubversionKind::Confused;
            let mut next = self.subversions[&start].subverted_army;
            while let Some(current) = next {
                if current == start {
                    break;
                }
                let Some(record) = self.subversions.get(&current) else {
                    break;
                };
                if record.kind == SubversionKind::Confused {
                    confused = true;
                }
                members.push(current);
                next = record.subverted_army;
            }

            if confused {
                for &army in &members {
                    let Some(Order::MoveByConvoy { via, .. }) = self.resolution_order(army)
                    else {
                        continue;
                    };
                    for fleet in via {
                        let attackers = self.attacker_map.remove(&fleet).unwrap_or_default();
                        for attacker in attackers {
                            if let Some(unit) = self.state.units.get_mut(&attacker) {
                                unit.resolution.order = Order::HoldNoSupport;
                                unit.resolution.supports.clear();
                                unit.resolution.supports_to_dislodge = 0;
                                unit.resolution.bounce = true;
                            }
                        }
                    }
                }
            }

            for &army in &members {
                if let Some(Order::MoveByConvoy { via, .. }) = self.resolution_order(army) {
                    self.break_convoy(army, &via);
                }
                self.subversions.remove(&army);
            }
        }
    }

    /// Follows each movement chain; a chain that closes on itself is a ring
    /// of attack (three or more movers, or any convoyed member) or a
    /// head-to-head (exactly two, moving directly into each other).
    fn identify_rings_and_head_to_heads(&mut self) {
        let mut counter: u32 = 0;
        let attackers: Vec<ProvinceIndex> = self
            .attacker_map
            .values()
            .flat_map(|sources| sources.iter().copied())
            .collect();

        for start in attackers {
            let chain_start = counter;
            let mut last_convoy: Option<u32> = None;
            let mut current = start;
            loop {
                let (move_number, is_move, is_convoyed, dest) = {
                    let Some(unit) = self.state.units.get(&current) else {
                        break;
                    };
                    (
                        unit.resolution.move_number,
                        unit.resolution.order.is_move(),
                        matches!(unit.resolution.order, Order::MoveByConvoy { .. }),
                        unit.resolution.order.move_dest().map(|c| c.province),
                    )
                };
                if let Some(number) = move_number {
                    if number >= chain_start {
                        self.classify_loop(current, counter, number, last_convoy);
                    }
                    break;
                }
                if !is_move {
                    break;
                }
                self.state
                    .units
                    .get_mut(&current)
                    .unwrap()
                    .resolution
                    .move_number = Some(counter);
                if is_convoyed {
                    last_convoy = Some(counter);
                }
                counter += 1;
                let Some(dest) = dest else { break };
                if !self.state.units.contains_key(&dest) {
                    break;
                }
                current = dest;
            }
        }
    }

    fn classify_loop(
        &mut self,
        loop_entry: ProvinceIndex,
        counter: u32,
        entry_number: u32,
        last_convoy: Option<u32>,
    ) {
        let loop_length = counter - entry_number;
        let has_convoy = last_convoy.is_some_and(|number| number >= entry_number);
        if loop_length >= 3 || has_convoy {
            self.rings_of_attack.insert(loop_entry);
            return;
        }

        // A two-step loop: units swapping provinces head to head.
        let unit = &self.state.units[&loop_entry];
        let other_province = unit.resolution.order.move_dest().unwrap().province;
        let unit_dislodge = unit.resolution.supports_to_dislodge;
        let unit_supports = unit.resolution.supports.len() as i32;
        let other = &self.state.units[&other_province];
        if unit_dislodge > other.resolution.supports.len() as i32 {
            self.unbalanced_head_to_heads.insert(loop_entry);
        } else if other.resolution.supports_to_dislodge > unit_supports {
            self.unbalanced_head_to_heads.insert(other_province);
        } else {
            self.balanced_head_to_heads.insert(loop_entry);
        }
    }

    /// A ring where every member can advance rotates; otherwise the blockage
    /// propagates backwards from the first member that cannot.
    fn advance_rings_of_attack(&mut self) {
        let rings: Vec<ProvinceIndex> = self.rings_of_attack.iter().copied().collect();
        for first in rings {
            let mut ring: VecDeque<ProvinceIndex> = VecDeque::new();
            let mut breaker: Option<ProvinceIndex> = None;
            let mut current = first;
            loop {
                ring.push_front(current);
                let dest = self.state.units[&current]
                    .resolution
                    .order
                    .move_dest()
                    .unwrap()
                    .province;
                let status = self.determine_ring_status(dest, current);
                self.state
                    .units
                    .get_mut(&current)
                    .unwrap()
                    .resolution
                    .ring_status = Some(status);
                if status != RingStatus::RingAdvancesRegardless
                    && status != RingStatus::RingAdvancesIfVacant
                {
                    breaker = Some(current);
                }
                current = dest;
                if current == first {
                    break;
                }
            }

            let Some(breaker) = breaker else {
                // The whole ring rotates.
                let members: Vec<ProvinceIndex> = ring.iter().copied().collect();
                for member in members {
                    self.advance_unit(member);
                }
                continue;
            };

            let status = self.ring_status_of(breaker);
            if status == RingStatus::StandoffRegardless {
                let dest = self.dest_of(breaker);
                self.bounce_all_attacks_on_province(dest);
            } else if status == RingStatus::SideAdvancesRegardless {
                self.bounce_attack(breaker);
            } else {
                // The breaker only advances if its square empties, and it
                // will not; walk backwards through the units behind it.
                let position = ring.iter().position(|&p| p == breaker).unwrap();
                let length = ring.len();
                let mut index = (position + 1) % length;
                let behind = ring[index];
                let status = self.ring_status_of(behind);
                if status == RingStatus::SideAdvancesRegardless {
                    self.bounce_attack(behind);
                } else if status != RingStatus::RingAdvancesRegardless {
                    let dest = self.dest_of(behind);
                    self.bounce_all_attacks_on_province(dest);
                } else {
                    // This one dislodges the breaker; keep walking back
                    // until a unit fails to advance.
                    loop {
                        index = (index + 1) % length;
                        let member = ring[index];
                        let status = self.ring_status_of(member);
                        if status == RingStatus::SideAdvancesRegardless
                            || status == RingStatus::SideAdvancesIfVacant
                        {
                            self.bounce_attack(member);
                        } else if status == RingStatus::StandoffRegardless {
                            let dest = self.dest_of(member);
                            self.bounce_all_attacks_on_province(dest);
                        }
                        if status != RingStatus::RingAdvancesIfVacant
                            && status != RingStatus::RingAdvancesRegardless
                        {
                            break;
                        }
                    }
                }
            }
        }
    }

    fn ring_status_of(&self, province: ProvinceIndex) -> RingStatus {
        self.state.units[&province]
            .resolution
            .ring_status
            .unwrap_or(RingStatus::StandoffRegardless)
    }

    fn dest_of(&self, province: ProvinceIndex) -> ProvinceIndex {
        self.state.units[&province]
            .resolution
            .order
            .move_dest()
            .map(|coast| coast.province)
            .unwrap_or(province)
    }

    /// Evaluates one ring member's destination square: who is strongest
    /// there, and does strength suffice without the square being vacated?
    fn determine_ring_status(
        &self,
        province: ProvinceIndex,
        ring_unit_source: ProvinceIndex,
    ) -> RingStatus {
        let mut most_supports = -1i32;
        let mut most_supports_to_dislodge = -1i32;
        let mut second_most_supports = -1i32;
        let mut most_supported: Option<ProvinceIndex> = None;

        if let Some(attackers) = self.attacker_map.get(&province) {
            for &attacker in attackers {
                let resolution = &self.state.units[&attacker].resolution;
                let supports = resolution.supports.len() as i32;
                if supports > most_supports {
                    second_most_supports = most_supports;
                    most_supports = supports;
                    most_supports_to_dislodge = resolution.supports_to_dislodge;
                    most_supported = Some(attacker);
                } else if supports > second_most_supports {
                    second_most_supports = supports;
                }
            }
        }

        let wins_outright = most_supports_to_dislodge > 0
            && most_supports_to_dislodge > second_most_supports;
        if most_supports == second_most_supports {
            RingStatus::StandoffRegardless
        } else if most_supported == Some(ring_unit_source) {
            if wins_outright {
                RingStatus::RingAdvancesRegardless
            } else {
                RingStatus::RingAdvancesIfVacant
            }
        } else if wins_outright {
            RingStatus::SideAdvancesRegardless
        } else {
            RingStatus::SideAdvancesIfVacant
        }
    }

    /// The stronger side of an unbalanced head-to-head tries to dislodge
    /// the weaker directly; the weaker always bounces.
    fn resolve_unbalanced_head_to_heads(&mut self) {
        let battles: Vec<ProvinceIndex> = self.unbalanced_head_to_heads.iter().copied().collect();
        for stronger in battles {
            let weaker = self.dest_of(stronger);

            let dislodger_into_weaker = self.find_dislodging_unit(weaker, true);
            if dislodger_into_weaker == Some(stronger) {
                self.bounce_attack(weaker);
                self.advance_unit(stronger);
                let unit = self.state.units.get_mut(&weaker).unwrap();
                unit.resolution.dislodged = true;
                unit.resolution.dislodged_from = Some(stronger);
                continue;
            }

            let dislodger_into_stronger = self.find_dislodging_unit(stronger, true);
            self.bounce_attack(weaker);

            match dislodger_into_weaker {
                Some(dislodger) => {
                    self.advance_unit(dislodger);
                    let unit = self.state.units.get_mut(&weaker).unwrap();
                    unit.resolution.dislodged = true;
                    unit.resolution.dislodged_from = Some(dislodger);
                }
                None => self.bounce_all_attacks_on_province(weaker),
            }

            match dislodger_into_stronger {
                Some(dislodger) if dislodger != weaker => {
                    self.advance_unit(dislodger);
                    let unit = self.state.units.get_mut(&stronger).unwrap();
                    unit.resolution.dislodged = true;
                    unit.resolution.dislodged_from = Some(dislodger);
                }
                _ => self.bounce_all_attacks_on_province(stronger),
            }
        }
    }

    /// In a balanced head-to-head the swap fails for both sides; only a
    /// third party can dislodge either unit.
    fn resolve_balanced_head_to_heads(&mut self) {
        let battles: Vec<ProvinceIndex> = self.balanced_head_to_heads.iter().copied().collect();
        for first in battles {
            let second = self.dest_of(first);
            let dislodger_into_first = self.find_dislodging_unit(first, true);
            let dislodger_into_second = self.find_dislodging_unit(second, true);

            match dislodger_into_first {
                Some(dislodger) if dislodger != second => {
                    self.advance_unit(dislodger);
                    let unit = self.state.units.get_mut(&first).unwrap();
                    unit.resolution.dislodged = true;
                    unit.resolution.dislodged_from = Some(dislodger);
                }
                _ => self.bounce_all_attacks_on_province(first),
            }

            match dislodger_into_second {
                Some(dislodger) if dislodger != first => {
                    self.advance_unit(dislodger);
                    let unit = self.state.units.get_mut(&second).unwrap();
                    unit.resolution.dislodged = true;
                    unit.resolution.dislodged_from = Some(dislodger);
                }
                _ => self.bounce_all_attacks_on_province(second),
            }
        }
    }

    /// Resolves the remaining contested provinces, recursing on the
    /// destination when the occupant is itself an unresolved mover.
    fn fight_ordinary_battles(&mut self) {
        loop {
            let Some(&province) = self.attacker_map.keys().next() else {
                break;
            };
            self.resolve_attacks_on_province(province);
        }
    }

    fn resolve_attacks_on_province(&mut self, province: ProvinceIndex) {
        let mut occupied = false;
        if let Some(occupier) = self.state.units.get(&province) {
            if occupier.resolution.order.is_move() && !occupier.resolution.unit_moves {
                let dest = occupier.resolution.order.move_dest().unwrap().province;
                self.resolve_attacks_on_province(dest);
            }
            occupied = !self.state.units[&province].resolution.unit_moves;
        }

        if occupied {
            self.resolve_attacks_on_occupied_province(province);
        } else {
            match self.find_successful_attack_on_empty_province(province) {
                Some(winner) => self.advance_unit(winner),
                None => self.bounce_all_attacks_on_province(province),
            }
        }
    }

    /// Resolves the attacks on an occupied province, returning whether the
    /// occupier was dislodged. A province under no attack resolves to
    /// nothing happening.
    fn resolve_attacks_on_occupied_province(&mut self, province: ProvinceIndex) -> bool {
        if !self.attacker_map.contains_key(&province) {
            return false;
        }
        match self.find_dislodging_unit(province, false) {
            None => {
                self.bounce_all_attacks_on_province(province);
                false
            }
            Some(dislodger) => {
                self.cut_support(province);
                self.advance_unit(dislodger);
                if let Some(occupier) = self.state.units.get_mut(&province) {
                    occupier.resolution.dislodged = true;
                    occupier.resolution.dislodged_from = Some(dislodger);
                }
                true
            }
        }
    }

    /// Withdraws the support of the unit in an attacked province.
    fn cut_support(&mut self, attacked_province: ProvinceIndex) {
        let Some(unit) = self.state.units.get(&attacked_province) else {
            return;
        };
        let Some(supported) = unit.resolution.order.supported_province() else {
            return;
        };
        let counts = unit.resolution.is_support_to_dislodge;

        if let Some(supported_unit) = self.state.units.get_mut(&supported) {
            supported_unit.resolution.supports.remove(&attacked_province);
            if counts {
                supported_unit.resolution.supports_to_dislodge -= 1;
            }
        }
        let unit = self.state.units.get_mut(&attacked_province).unwrap();
        unit.resolution.order = Order::Hold;
        unit.resolution.support_cut = true;
    }

    /// The attacker that dislodges the occupant of a province, if any: its
    /// dislodge-supports must strictly exceed both every rival attacker's
    /// supports and the occupier's own.
    fn find_dislodging_unit(
        &self,
        attacked_province: ProvinceIndex,
        ignore_occupying_unit: bool,
    ) -> Option<ProvinceIndex> {
        let mut most_supports = -1i32;
        let mut most_supports_to_dislodge = -1i32;
        let mut second_most_supports = -1i32;
        let mut most_supported: Option<ProvinceIndex> = None;

        if let Some(attackers) = self.attacker_map.get(&attacked_province) {
            for &attacker in attackers {
                let resolution = &self.state.units[&attacker].resolution;
                let supports = resolution.supports.len() as i32;
                if supports > most_supports {
                    second_most_supports = most_supports;
                    most_supports = supports;
                    most_supports_to_dislodge = resolution.supports_to_dislodge;
                    most_supported = Some(attacker);
                } else if supports > second_most_supports {
                    second_most_supports = supports;
                }
            }
        }

        if !ignore_occupying_unit {
            if let Some(occupier) = self.state.units.get(&attacked_province) {
                let defence = occupier.resolution.supports.len() as i32;
                if defence > second_most_supports {
                    second_most_supports = defence;
                }
            }
        }

        if most_supports_to_dislodge <= second_most_supports || most_supports_to_dislodge <= 0 {
            None
        } else {
            most_supported
        }
    }

    /// The uniquely strongest attacker on an empty province, if any.
    fn find_successful_attack_on_empty_province(
        &self,
        attacked_province: ProvinceIndex,
    ) -> Option<ProvinceIndex> {
        let mut most_supports = -1i32;
        let mut second_most_supports = -1i32;
        let mut most_supported: Option<ProvinceIndex> = None;

        if let Some(attackers) = self.attacker_map.get(&attacked_province) {
            for &attacker in attackers {
                let supports = self.state.units[&attacker].resolution.supports.len() as i32;
                if supports > most_supports {
                    second_most_supports = most_supports;
                    most_supports = supports;
                    most_supported = Some(attacker);
                } else if supports > second_most_supports {
                    second_most_supports = supports;
                }
            }
        }

        if most_supports <= second_most_supports {
            None
        } else {
            most_supported
        }
    }

    /// Moves a unit into its destination; every rival attack on the same
    /// square bounces.
    fn advance_unit(&mut self, unit_to_advance: ProvinceIndex) {
        let Some(dest) = self
            .resolution_order(unit_to_advance)
            .and_then(|order| order.move_dest())
        else {
            return;
        };
        self.state
            .units
            .get_mut(&unit_to_advance)
            .unwrap()
            .resolution
            .unit_moves = true;

        if let Some(attackers) = self.attacker_map.remove(&dest.province) {
            for attacker in attackers {
                if attacker == unit_to_advance {
                    continue;
                }
                if let Some(unit) = self.state.units.get_mut(&attacker) {
                    unit.resolution.order = Order::HoldNoSupport;
                    unit.resolution.supports.clear();
                    unit.resolution.supports_to_dislodge = 0;
                    unit.resolution.bounce = true;
                }
            }
        }
    }

    /// Bounces every attack on a province and records the standoff.
    fn bounce_all_attacks_on_province(&mut self, province: ProvinceIndex) {
        if let Some(attackers) = self.attacker_map.remove(&province) {
            for attacker in attackers {
                if let Some(unit) = self.state.units.get_mut(&attacker) {
                    unit.resolution.order = Order::HoldNoSupport;
                    unit.resolution.supports.clear();
                    unit.resolution.supports_to_dislodge = 0;
                    unit.resolution.bounce = true;
                }
            }
        }
        self.state.bounce_locations.insert(province);
    }

    /// Bounces one unit out of the province it is attacking.
    fn bounce_attack(&mut self, bounced: ProvinceIndex) {
        let dest = self.dest_of(bounced);
        if let Some(unit) = self.state.units.get_mut(&bounced) {
            unit.resolution.order = Order::HoldNoSupport;
            unit.resolution.supports.clear();
            unit.resolution.supports_to_dislodge = 0;
            unit.resolution.bounce = true;
        }
        let emptied = match self.attacker_map.get_mut(&dest) {
            Some(attackers) => {
                attackers.remove(&bounced);
                attackers.is_empty()
            }
            None => false,
        };
        if emptied {
            self.attacker_map.remove(&dest);
        }
    }
}
