//! The province graph.
//!
//! A map is built once from an MDF message and is immutable for the rest of
//! the game apart from supply-centre ownership. Provinces are addressed by
//! their token subtoken, so the map is an arena indexed by `ProvinceIndex`;
//! units refer to provinces by index, never by pointer.
//!
//! Adjacency is stored per coast, keyed on a coast token: `AMY` for army
//! movement, `FLT` for fleets in single-coast provinces, or a named coast
//! token (`NCS`, `SCS`, ...) for split-coast provinces. The adjacency
//! relation is taken from the MDF as given; it is not symmetrised.

use std::collections::{BTreeMap, BTreeSet};

use crate::token::lexicon::{self, Token};
use crate::token::TokenMessage;

/// Maximum number of provinces addressable by a subtoken.
pub const MAX_PROVINCES: usize = 256;

/// A province arena index (the province token's subtoken).
pub type ProvinceIndex = u8;

/// A power index (the power token's subtoken).
pub type PowerIndex = u8;

/// A malformed MDF message; the payload is the approximate token offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("malformed MDF near token offset {0}")]
pub struct MdfError(pub usize);

/// A province plus the coast a unit sits on: `AMY` for an army, `FLT` for a
/// fleet in a single-coast province, or a named coast token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoastId {
    pub province: ProvinceIndex,
    pub coast: Token,
}

impl CoastId {
    pub fn new(province: ProvinceIndex, coast: Token) -> CoastId {
        CoastId { province, coast }
    }
}

/// Everything known about one province.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Province {
    pub token: Token,
    pub in_use: bool,
    pub is_supply_centre: bool,
    pub is_land: bool,
    /// Owning power token, or `UNO` when unowned.
    pub owner: Token,
    /// Powers for which this is a home centre.
    pub home_powers: BTreeSet<PowerIndex>,
    /// Adjacency sets keyed on coast token.
    pub coasts: BTreeMap<Token, BTreeSet<CoastId>>,
}

/// The province graph for one game.
#[derive(Debug, Clone)]
pub struct Map {
    pub name: String,
    provinces: Vec<Province>,
    pub province_count: usize,
    pub power_count: usize,
}

impl Default for Map {
    fn default() -> Map {
        Map {
            name: String::new(),
            provinces: vec![Province::default(); MAX_PROVINCES],
            province_count: 0,
            power_count: 0,
        }
    }
}

impl Map {
    pub fn new() -> Map {
        Map::default()
    }

    /// True once an MDF has been accepted.
    pub fn is_set(&self) -> bool {
        self.province_count > 0
    }

    pub fn province(&self, index: ProvinceIndex) -> &Province {
        &self.provinces[index as usize]
    }

    pub fn province_mut(&mut self, index: ProvinceIndex) -> &mut Province {
        &mut self.provinces[index as usize]
    }

    /// Indices of the in-use provinces.
    pub fn province_indices(&self) -> impl Iterator<Item = ProvinceIndex> + '_ {
        (0..self.province_count).map(|i| i as ProvinceIndex)
    }

    /// The adjacency set of one coast, if the coast exists.
    pub fn adjacent_coasts(&self, coast: CoastId) -> Option<&BTreeSet<CoastId>> {
        self.provinces[coast.province as usize].coasts.get(&coast.coast)
    }

    /// Builds the map from an MDF message:
    /// `MDF (powers) ((centres) (provinces)) (adjacencies)`.
    pub fn set_map(&mut self, mdf: &TokenMessage) -> Result<(), MdfError> {
        if mdf.submessage_count() != 4 {
            return Err(MdfError(0));
        }
        let command = mdf.submessage(0);
        if !command.is_single_token() || command.first() != lexicon::MDF {
            return Err(MdfError(0));
        }

        self.process_power_list(&mdf.submessage(1))
            .map_err(|MdfError(at)| MdfError(at + mdf.submessage_start(1)))?;
        self.process_provinces(&mdf.submessage(2))
            .map_err(|MdfError(at)| MdfError(at + mdf.submessage_start(2)))?;
        self.process_adjacencies(&mdf.submessage(3))
            .map_err(|MdfError(at)| MdfError(at + mdf.submessage_start(3)))?;
        Ok(())
    }

    fn process_power_list(&mut self, powers: &TokenMessage) -> Result<(), MdfError> {
        let count = powers.len();
        if count == 0 || count > MAX_PROVINCES {
            return Err(MdfError(0));
        }
        let mut used = vec![false; count];
        for offset in 0..count {
            let power = powers.token(offset);
            let index = power.subtoken() as usize;
            if power.category() != lexicon::CATEGORY_POWER || index >= count || used[index] {
                return Err(MdfError(offset));
            }
            used[index] = true;
        }
        self.power_count = count;
        Ok(())
    }

    fn process_provinces(&mut self, provinces: &TokenMessage) -> Result<(), MdfError> {
        for province in self.provinces.iter_mut() {
            *province = Province::default();
        }

        if provinces.submessage_count() != 2 {
            return Err(MdfError(0));
        }
        self.process_supply_centres(&provinces.submessage(0))
            .map_err(|MdfError(at)| MdfError(at + provinces.submessage_start(0)))?;
        self.process_non_supply_centres(&provinces.submessage(1))
            .map_err(|MdfError(at)| MdfError(at + provinces.submessage_start(1)))?;

        // In-use provinces must form a compact prefix of the index space.
        self.province_count = 0;
        let mut gap_seen = false;
        for (index, province) in self.provinces.iter().enumerate() {
            if province.in_use {
                if gap_seen {
                    return Err(MdfError(provinces.submessage_start(1)));
                }
                self.province_count = index + 1;
            } else {
                gap_seen = true;
            }
        }
        if self.province_count == 0 {
            return Err(MdfError(0));
        }
        Ok(())
    }

    fn process_supply_centres(&mut self, centres: &TokenMessage) -> Result<(), MdfError> {
        for block in 0..centres.submessage_count() {
            self.process_supply_centres_for_power(&centres.submessage(block))
                .map_err(|MdfError(at)| MdfError(at + centres.submessage_start(block)))?;
        }
        Ok(())
    }

    /// One centre block: one or more power tokens (or `UNO`) followed by the
    /// provinces that are home centres of those powers.
    fn process_supply_centres_for_power(&mut self, block: &TokenMessage) -> Result<(), MdfError> {
        let mut home_powers: BTreeSet<PowerIndex> = BTreeSet::new();
        let mut owner = lexicon::UNO;

        for index in 0..block.submessage_count() {
            let submessage = block.submessage(index);
            if submessage.is_single_token() {
                let token = submessage.first();
                if token.category() == lexicon::CATEGORY_POWER {
                    if (token.subtoken() as usize) >= self.power_count {
                        return Err(MdfError(block.submessage_start(index)));
                    }
                    home_powers.insert(token.subtoken());
                    owner = token;
                } else if token.is_province() {
                    let province = &mut self.provinces[token.subtoken() as usize];
                    if province.in_use {
                        return Err(MdfError(block.submessage_start(index)));
                    }
                    province.token = token;
                    province.in_use = true;
                    province.is_supply_centre = true;
                    province.home_powers = home_powers.clone();
                    province.owner = owner;
                } else if token != lexicon::UNO {
                    return Err(MdfError(block.submessage_start(index)));
                }
            } else {
                // A bracketed list of powers sharing the home centres.
                for offset in 0..submessage.len() {
                    let token = submessage.token(offset);
                    if token.category() != lexicon::CATEGORY_POWER
                        || (token.subtoken() as usize) >= self.power_count
                    {
                        return Err(MdfError(block.submessage_start(index) + offset));
                    }
                    home_powers.insert(token.subtoken());
                    owner = token;
                }
            }
        }
        Ok(())
    }

    fn process_non_supply_centres(&mut self, provinces: &TokenMessage) -> Result<(), MdfError> {
        for offset in 0..provinces.len() {
            let token = provinces.token(offset);
            if token.is_province() {
                let province = &mut self.provinces[token.subtoken() as usize];
                if province.in_use {
                    return Err(MdfError(offset));
                }
                province.token = token;
                province.in_use = true;
                province.owner = lexicon::UNO;
            } else if token != lexicon::UNO {
                return Err(MdfError(offset));
            }
        }
        Ok(())
    }

    fn process_adjacencies(&mut self, adjacencies: &TokenMessage) -> Result<(), MdfError> {
        for index in 0..adjacencies.submessage_count() {
            self.process_province_adjacency(&adjacencies.submessage(index))
                .map_err(|MdfError(at)| MdfError(at + adjacencies.submessage_start(index)))?;
        }
        Ok(())
    }

    /// `(province (coast-list) (coast-list) ...)`.
    fn process_province_adjacency(&mut self, adjacency: &TokenMessage) -> Result<(), MdfError> {
        let province_token = adjacency.token(0);
        if !province_token.is_province() {
            return Err(MdfError(0));
        }
        let index = province_token.subtoken();
        if !self.provinces[index as usize].in_use
            || !self.provinces[index as usize].coasts.is_empty()
        {
            return Err(MdfError(0));
        }
        for list in 1..adjacency.submessage_count() {
            self.process_adjacency_list(index, &adjacency.submessage(list))
                .map_err(|MdfError(at)| MdfError(at + adjacency.submessage_start(list)))?;
        }
        Ok(())
    }

    /// One coast list: `(AMY adj...)`, `(FLT adj...)` or `((FLT coast)
    /// adj...)`. A bare adjacent province inherits the declaring coast's
    /// token; `(province coast)` names a specific destination coast.
    fn process_adjacency_list(
        &mut self,
        province: ProvinceIndex,
        list: &TokenMessage,
    ) -> Result<(), MdfError> {
        let indicator = list.submessage(0);
        let (coast_token, inherited_coast) = if indicator.is_single_token() {
            let token = indicator.first();
            if token == lexicon::AMY {
                self.provinces[province as usize].is_land = true;
            }
            (token, token)
        } else {
            (indicator.token(1), lexicon::FLT)
        };

        let details = &mut self.provinces[province as usize];
        if details.coasts.contains_key(&coast_token) {
            return Err(MdfError(0));
        }

        let mut adjacent: BTreeSet<CoastId> = BTreeSet::new();
        for index in 1..list.submessage_count() {
            let entry = list.submessage(index);
            let coast = if entry.is_single_token() {
                CoastId::new(entry.first().subtoken(), inherited_coast)
            } else {
                CoastId::new(entry.token(0).subtoken(), entry.token(1))
            };
            adjacent.insert(coast);
        }
        details.coasts.insert(coast_token, adjacent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::standard::standard_mdf;
    use crate::token::lexicon::*;

    fn standard_map() -> Map {
        let mut map = Map::new();
        map.set_map(&standard_mdf()).unwrap();
        map
    }

    #[test]
    fn standard_map_counts() {
        let map = standard_map();
        assert!(map.is_set());
        assert_eq!(map.power_count, 7);
        assert_eq!(map.province_count, 75);

        let centres = map
            .province_indices()
            .filter(|&p| map.province(p).is_supply_centre)
            .count();
        assert_eq!(centres, 34);

        let land = map
            .province_indices()
            .filter(|&p| map.province(p).is_land)
            .count();
        // 14 inland + 42 coastal (including the three split-coast provinces).
        assert_eq!(land, 56);
    }

    #[test]
    fn home_centres_and_ownership() {
        let map = standard_map();
        let vienna = map.province(VIE.subtoken());
        assert!(vienna.is_supply_centre);
        assert_eq!(vienna.owner, AUS);
        assert_eq!(
            vienna.home_powers.iter().copied().collect::<Vec<_>>(),
            vec![AUS.subtoken()]
        );

        let belgium = map.province(BEL.subtoken());
        assert!(belgium.is_supply_centre);
        assert_eq!(belgium.owner, UNO);
        assert!(belgium.home_powers.is_empty());

        let bohemia = map.province(BOH.subtoken());
        assert!(!bohemia.is_supply_centre);
        assert_eq!(bohemia.owner, UNO);
    }

    #[test]
    fn coast_structure() {
        let map = standard_map();

        // Paris: armies only.
        let paris = map.province(PAR.subtoken());
        assert_eq!(paris.coasts.len(), 1);
        assert!(paris.coasts.contains_key(&AMY));
        assert!(paris.is_land);

        // North Sea: fleets only.
        let north_sea = map.province(NTH.subtoken());
        assert_eq!(north_sea.coasts.len(), 1);
        assert!(north_sea.coasts.contains_key(&FLT));
        assert!(!north_sea.is_land);

        // Brest: both.
        let brest = map.province(BRE.subtoken());
        assert_eq!(brest.coasts.len(), 2);

        // Spain: army plus two named coasts with disjoint fleet adjacency.
        let spain = map.province(SPA.subtoken());
        assert_eq!(spain.coasts.len(), 3);
        assert!(spain.coasts.contains_key(&NCS));
        assert!(spain.coasts.contains_key(&SCS));
        let north = &spain.coasts[&NCS];
        let south = &spain.coasts[&SCS];
        assert!(north.contains(&CoastId::new(GAS.subtoken(), FLT)));
        assert!(!south.contains(&CoastId::new(GAS.subtoken(), FLT)));
        assert!(south.contains(&CoastId::new(GOL.subtoken(), FLT)));
    }

    #[test]
    fn fleet_adjacency_names_destination_coasts() {
        let map = standard_map();
        let mao = map
            .adjacent_coasts(CoastId::new(MAO.subtoken(), FLT))
            .unwrap();
        assert!(mao.contains(&CoastId::new(SPA.subtoken(), NCS)));
        assert!(mao.contains(&CoastId::new(SPA.subtoken(), SCS)));
        assert!(!mao.contains(&CoastId::new(SPA.subtoken(), FLT)));

        let north_sea = map
            .adjacent_coasts(CoastId::new(NTH.subtoken(), FLT))
            .unwrap();
        assert_eq!(north_sea.len(), 11);
    }

    #[test]
    fn army_adjacency_ignores_coasts() {
        let map = standard_map();
        let gascony = map
            .adjacent_coasts(CoastId::new(GAS.subtoken(), AMY))
            .unwrap();
        assert!(gascony.contains(&CoastId::new(SPA.subtoken(), AMY)));
        assert!(gascony.contains(&CoastId::new(PAR.subtoken(), AMY)));
        assert!(!gascony.contains(&CoastId::new(MAO.subtoken(), AMY)));
    }

    #[test]
    fn rejects_malformed_mdf() {
        let mut map = Map::new();
        assert!(map.set_map(&TokenMessage::single(MDF)).is_err());

        // Not an MDF at all.
        let bogus = NOW & (SPR + Token::number(1901));
        assert!(map.set_map(&bogus).is_err());
    }

    #[test]
    fn rejects_duplicate_province_declaration() {
        let mut map = Map::new();
        let powers = TokenMessage::single(AUS);
        let centres = TokenMessage::new() & (AUS + BUD + BUD);
        let provinces = centres.enclose() & TokenMessage::new();
        let adjacencies = TokenMessage::new() & (BUD + TokenMessage::new().enclose());
        let mdf = MDF & powers & provinces & adjacencies;
        assert!(map.set_map(&mdf).is_err());
    }
}
