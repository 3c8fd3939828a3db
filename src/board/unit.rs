//! Units, orders, and winter adjustment orders.
//!
//! An order is a tagged variant; the adjudication scratch state lives in a
//! separate `Resolution` struct alongside the unit so a resolution run can
//! degrade its working copy of the order without losing what was actually
//! submitted.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::board::map::{CoastId, PowerIndex, ProvinceIndex};
use crate::token::Token;

/// An order for one unit.
///
/// `HoldNoSupport` cannot be submitted; the adjudicator downgrades orders to
/// it when the unit must hold but may no longer receive support.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    None,
    Hold,
    Move(CoastId),
    SupportHold(ProvinceIndex),
    SupportMove {
        supported: ProvinceIndex,
        dest: ProvinceIndex,
    },
    Convoy {
        army: ProvinceIndex,
        dest: ProvinceIndex,
    },
    MoveByConvoy {
        dest: CoastId,
        via: Vec<ProvinceIndex>,
    },
    Retreat(CoastId),
    Disband,
    HoldNoSupport,
}

impl Order {
    /// True for plain moves and moves by convoy.
    pub fn is_move(&self) -> bool {
        matches!(self, Order::Move(_) | Order::MoveByConvoy { .. })
    }

    /// The movement destination, for moves, convoyed moves, and retreats.
    pub fn move_dest(&self) -> Option<CoastId> {
        match self {
            Order::Move(dest) | Order::MoveByConvoy { dest, .. } | Order::Retreat(dest) => {
                Some(*dest)
            }
            _ => None,
        }
    }

    /// True for either kind of support.
    pub fn is_support(&self) -> bool {
        matches!(self, Order::SupportHold(_) | Order::SupportMove { .. })
    }

    /// The province of the unit a support order props up.
    pub fn supported_province(&self) -> Option<ProvinceIndex> {
        match self {
            Order::SupportHold(supported) => Some(*supported),
            Order::SupportMove { supported, .. } => Some(*supported),
            _ => None,
        }
    }
}

/// Status of one unit inside a ring of attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingStatus {
    RingAdvancesRegardless,
    RingAdvancesIfVacant,
    StandoffRegardless,
    SideAdvancesIfVacant,
    SideAdvancesRegardless,
}

/// Adjudication scratch state, cleared at the start of each resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Working copy of the order; may degrade to `Hold` or `HoldNoSupport`.
    pub order: Order,
    /// Provinces of the units currently supporting this unit.
    pub supports: BTreeSet<ProvinceIndex>,
    /// How many of those supports count toward dislodging the target.
    pub supports_to_dislodge: i32,
    /// For a supporter: whether its own support counts toward dislodgement.
    pub is_support_to_dislodge: bool,
    /// Position in a movement chain, for ring detection.
    pub move_number: Option<u32>,
    pub ring_status: Option<RingStatus>,
    pub dislodged_from: Option<ProvinceIndex>,

    // Result flags.
    pub no_convoy: bool,
    pub no_army_to_convoy: bool,
    pub convoy_broken: bool,
    pub support_void: bool,
    pub support_cut: bool,
    pub bounce: bool,
    pub dislodged: bool,
    pub unit_moves: bool,
    pub illegal_order: bool,
    pub illegal_reason: Option<Token>,
}

/// A unit on the board (or a dislodged unit awaiting retreat).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub coast: CoastId,
    pub nationality: PowerIndex,
    /// `AMY` or `FLT`.
    pub unit_type: Token,
    /// The order as submitted.
    pub order: Order,
    pub resolution: Resolution,
    /// Legal retreat destinations, for dislodged units.
    pub retreat_options: BTreeSet<CoastId>,
}

impl Unit {
    pub fn new(coast: CoastId, nationality: PowerIndex, unit_type: Token) -> Unit {
        Unit {
            coast,
            nationality,
            unit_type,
            order: Order::None,
            resolution: Resolution::default(),
            retreat_options: BTreeSet::new(),
        }
    }

    pub fn province(&self) -> ProvinceIndex {
        self.coast.province
    }

    /// Resets the scratch state ahead of an adjudication run.
    pub fn reset_resolution(&mut self) {
        self.resolution = Resolution {
            order: self.order.clone(),
            ..Resolution::default()
        };
    }
}

/// The winter orders of one power.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WinterOrders {
    /// Build or disband locations, each against a result token.
    pub builds_or_disbands: BTreeMap<CoastId, Token>,
    pub waives: u32,
    pub required: u32,
    pub is_building: bool,
}

impl WinterOrders {
    /// Orders submitted so far, counting waives.
    pub fn orders_entered(&self) -> u32 {
        self.builds_or_disbands.len() as u32 + self.waives
    }

    pub fn clear(&mut self) {
        self.builds_or_disbands.clear();
        self.waives = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::lexicon::*;

    fn coast(province: Token) -> CoastId {
        CoastId::new(province.subtoken(), AMY)
    }

    #[test]
    fn order_classification() {
        assert!(Order::Move(coast(BUR)).is_move());
        assert!(Order::MoveByConvoy {
            dest: coast(NWY),
            via: vec![NTH.subtoken()],
        }
        .is_move());
        assert!(!Order::Hold.is_move());
        assert!(Order::SupportHold(PAR.subtoken()).is_support());
        assert_eq!(
            Order::SupportMove {
                supported: PAR.subtoken(),
                dest: BUR.subtoken(),
            }
            .supported_province(),
            Some(PAR.subtoken())
        );
        assert_eq!(Order::Retreat(coast(PIC)).move_dest(), Some(coast(PIC)));
        assert_eq!(Order::Hold.move_dest(), None);
    }

    #[test]
    fn reset_resolution_copies_the_order() {
        let mut unit = Unit::new(coast(PAR), FRA.subtoken(), AMY);
        unit.order = Order::Move(coast(BUR));
        unit.resolution.bounce = true;
        unit.resolution.dislodged = true;

        unit.reset_resolution();
        assert_eq!(unit.resolution.order, Order::Move(coast(BUR)));
        assert!(!unit.resolution.bounce);
        assert!(!unit.resolution.dislodged);
        assert!(unit.resolution.supports.is_empty());
    }

    #[test]
    fn winter_orders_counting() {
        let mut orders = WinterOrders {
            required: 3,
            is_building: true,
            ..WinterOrders::default()
        };
        orders
            .builds_or_disbands
            .insert(CoastId::new(PAR.subtoken(), AMY), MBV);
        orders.waives = 1;
        assert_eq!(orders.orders_entered(), 2);
        orders.clear();
        assert_eq!(orders.orders_entered(), 0);
    }
}
