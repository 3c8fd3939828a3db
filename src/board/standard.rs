//! The standard Diplomacy map as an MDF message.
//!
//! Embedding the standard map lets the adjudicator run offline and gives
//! the test suites a board without a server round-trip. The adjacency
//! table lists, for every province, one entry per coast: armies, fleets,
//! or a named coast for the three split-coast provinces.

use crate::token::lexicon::*;
use crate::token::{Token, TokenMessage};

/// An adjacent entry: a bare province, or a province with a named coast.
enum Adj {
    P(Token),
    C(Token, Token),
}

/// One coast list of a province adjacency record.
enum Coastline {
    Army(&'static [Adj]),
    Fleet(&'static [Adj]),
    FleetCoast(Token, &'static [Adj]),
}

use Adj::{C, P};
use Coastline::{Army, Fleet, FleetCoast};

struct StdProvince {
    token: Token,
    lines: &'static [Coastline],
}

const POWERS: [Token; 7] = [AUS, ENG, FRA, GER, ITA, RUS, TUR];

/// Home supply centres per power, plus the neutral centres under `UNO`.
const CENTRE_BLOCKS: &[(Token, &[Token])] = &[
    (AUS, &[BUD, TRI, VIE]),
    (ENG, &[EDI, LON, LVP]),
    (FRA, &[BRE, MAR, PAR]),
    (GER, &[BER, KIE, MUN]),
    (ITA, &[NAP, ROM, VEN]),
    (RUS, &[MOS, SEV, STP, WAR]),
    (TUR, &[ANK, CON, SMY]),
    (
        UNO,
        &[BEL, BUL, DEN, GRE, HOL, NWY, POR, RUM, SER, SPA, SWE, TUN],
    ),
];

const NON_CENTRES: &[Token] = &[
    BOH, BUR, GAL, RUH, SIL, TYR, UKR, ADR, AEG, BAL, BAR, BLA, EAS, ECH, GOB, GOL, HEL, ION, IRI,
    MAO, NAO, NTH, NWG, SKA, TYS, WES, ALB, APU, ARM, CLY, FIN, GAS, LVN, NAF, PIC, PIE, PRU, SYR,
    TUS, WAL, YOR,
];

static PROVINCES: &[StdProvince] = &[
    // Inland.
    StdProvince {
        token: BOH,
        lines: &[Army(&[P(GAL), P(MUN), P(SIL), P(TYR), P(VIE)])],
    },
    StdProvince {
        token: BUR,
        lines: &[Army(&[P(MUN), P(PAR), P(RUH), P(BEL), P(GAS), P(MAR), P(PIC)])],
    },
    StdProvince {
        token: GAL,
        lines: &[Army(&[P(BOH), P(BUD), P(SIL), P(UKR), P(VIE), P(WAR), P(RUM)])],
    },
    StdProvince {
        token: RUH,
        lines: &[Army(&[P(BUR), P(MUN), P(BEL), P(HOL), P(KIE)])],
    },
    StdProvince {
        token: SIL,
        lines: &[Army(&[P(BOH), P(GAL), P(MUN), P(WAR), P(BER), P(PRU)])],
    },
    StdProvince {
        token: TYR,
        lines: &[Army(&[P(BOH), P(MUN), P(VIE), P(PIE), P(TRI), P(VEN)])],
    },
    StdProvince {
        token: UKR,
        lines: &[Army(&[P(GAL), P(MOS), P(WAR), P(RUM), P(SEV)])],
    },
    StdProvince {
        token: BUD,
        lines: &[Army(&[P(GAL), P(VIE), P(RUM), P(SER), P(TRI)])],
    },
    StdProvince {
        token: MOS,
        lines: &[Army(&[P(UKR), P(WAR), P(LVN), P(SEV), P(STP)])],
    },
    StdProvince {
        token: MUN,
        lines: &[Army(&[P(BOH), P(BUR), P(RUH), P(SIL), P(TYR), P(BER), P(KIE)])],
    },
    StdProvince {
        token: PAR,
        lines: &[Army(&[P(BUR), P(BRE), P(GAS), P(PIC)])],
    },
    StdProvince {
        token: SER,
        lines: &[Army(&[P(BUD), P(ALB), P(BUL), P(GRE), P(RUM), P(TRI)])],
    },
    StdProvince {
        token: VIE,
        lines: &[Army(&[P(BOH), P(BUD), P(GAL), P(TYR), P(TRI)])],
    },
    StdProvince {
        token: WAR,
        lines: &[Army(&[P(GAL), P(MOS), P(SIL), P(UKR), P(LVN), P(PRU)])],
    },
    // Seas.
    StdProvince {
        token: ADR,
        lines: &[Fleet(&[P(ION), P(ALB), P(APU), P(TRI), P(VEN)])],
    },
    StdProvince {
        token: AEG,
        lines: &[Fleet(&[P(EAS), P(ION), C(BUL, SCS), P(CON), P(GRE), P(SMY)])],
    },
    StdProvince {
        token: BAL,
        lines: &[Fleet(&[P(GOB), P(BER), P(DEN), P(KIE), P(LVN), P(PRU), P(SWE)])],
    },
    StdProvince {
        token: BAR,
        lines: &[Fleet(&[P(NWG), P(NWY), C(STP, NCS)])],
    },
    StdProvince {
        token: BLA,
        lines: &[Fleet(&[P(ANK), P(ARM), C(BUL, ECS), P(CON), P(RUM), P(SEV)])],
    },
    StdProvince {
        token: EAS,
        lines: &[Fleet(&[P(AEG), P(ION), P(SMY), P(SYR)])],
    },
    StdProvince {
        token: ECH,
        lines: &[Fleet(&[
            P(IRI),
            P(MAO),
            P(NTH),
            P(BEL),
            P(BRE),
            P(LON),
            P(PIC),
            P(WAL),
        ])],
    },
    StdProvince {
        token: GOB,
        lines: &[Fleet(&[P(BAL), P(FIN), P(LVN), C(STP, SCS), P(SWE)])],
    },
    StdProvince {
        token: GOL,
        lines: &[Fleet(&[P(TYS), P(WES), P(MAR), P(PIE), C(SPA, SCS), P(TUS)])],
    },
    StdProvince {
        token: HEL,
        lines: &[Fleet(&[P(NTH), P(DEN), P(HOL), P(KIE)])],
    },
    StdProvince {
        token: ION,
        lines: &[Fleet(&[
            P(ADR),
            P(AEG),
            P(EAS),
            P(TYS),
            P(ALB),
            P(APU),
            P(GRE),
            P(NAP),
            P(TUN),
        ])],
    },
    StdProvince {
        token: IRI,
        lines: &[Fleet(&[P(ECH), P(MAO), P(NAO), P(LVP), P(WAL)])],
    },
    StdProvince {
        token: MAO,
        lines: &[Fleet(&[
            P(ECH),
            P(IRI),
            P(NAO),
            P(WES),
            P(BRE),
            P(GAS),
            P(NAF),
            P(POR),
            C(SPA, NCS),
            C(SPA, SCS),
        ])],
    },
    StdProvince {
        token: NAO,
        lines: &[Fleet(&[P(IRI), P(MAO), P(NWG), P(CLY), P(LVP)])],
    },
    StdProvince {
        token: NTH,
        lines: &[Fleet(&[
            P(ECH),
            P(HEL),
            P(NWG),
            P(SKA),
            P(BEL),
            P(DEN),
            P(EDI),
            P(HOL),
            P(LON),
            P(NWY),
            P(YOR),
        ])],
    },
    StdProvince {
        token: NWG,
        lines: &[Fleet(&[P(NAO), P(NTH), P(BAR), P(CLY), P(EDI), P(NWY)])],
    },
    StdProvince {
        token: SKA,
        lines: &[Fleet(&[P(NTH), P(DEN), P(NWY), P(SWE)])],
    },
    StdProvince {
        token: TYS,
        lines: &[Fleet(&[P(GOL), P(ION), P(WES), P(NAP), P(ROM), P(TUN), P(TUS)])],
    },
    StdProvince {
        token: WES,
        lines: &[Fleet(&[P(GOL), P(MAO), P(TYS), P(NAF), C(SPA, SCS), P(TUN)])],
    },
    // Coastal.
    StdProvince {
        token: ALB,
        lines: &[
            Army(&[P(SER), P(GRE), P(TRI)]),
            Fleet(&[P(ADR), P(ION), P(GRE), P(TRI)]),
        ],
    },
    StdProvince {
        token: APU,
        lines: &[
            Army(&[P(NAP), P(VEN), P(ROM)]),
            Fleet(&[P(ADR), P(ION), P(NAP), P(VEN)]),
        ],
    },
    StdProvince {
        token: ARM,
        lines: &[
            Army(&[P(ANK), P(SEV), P(SMY), P(SYR)]),
            Fleet(&[P(BLA), P(ANK), P(SEV)]),
        ],
    },
    StdProvince {
        token: CLY,
        lines: &[
            Army(&[P(EDI), P(LVP)]),
            Fleet(&[P(NAO), P(NWG), P(EDI), P(LVP)]),
        ],
    },
    StdProvince {
        token: FIN,
        lines: &[
            Army(&[P(NWY), P(SWE), P(STP)]),
            Fleet(&[P(GOB), P(SWE), C(STP, SCS)]),
        ],
    },
    StdProvince {
        token: GAS,
        lines: &[
            Army(&[P(BUR), P(MAR), P(PAR), P(BRE), P(SPA)]),
            Fleet(&[P(MAO), P(BRE), C(SPA, NCS)]),
        ],
    },
    StdProvince {
        token: LVN,
        lines: &[
            Army(&[P(MOS), P(WAR), P(PRU), P(STP)]),
            Fleet(&[P(BAL), P(GOB), P(PRU), C(STP, SCS)]),
        ],
    },
    StdProvince {
        token: NAF,
        lines: &[Army(&[P(TUN)]), Fleet(&[P(MAO), P(WES), P(TUN)])],
    },
    StdProvince {
        token: PIC,
        lines: &[
            Army(&[P(BUR), P(PAR), P(BEL), P(BRE)]),
            Fleet(&[P(ECH), P(BEL), P(BRE)]),
        ],
    },
    StdProvince {
        token: PIE,
        lines: &[
            Army(&[P(TYR), P(MAR), P(TUS), P(VEN)]),
            Fleet(&[P(GOL), P(MAR), P(TUS)]),
        ],
    },
    StdProvince {
        token: PRU,
        lines: &[
            Army(&[P(SIL), P(WAR), P(BER), P(LVN)]),
            Fleet(&[P(BAL), P(BER), P(LVN)]),
        ],
    },
    StdProvince {
        token: SYR,
        lines: &[Army(&[P(ARM), P(SMY)]), Fleet(&[P(EAS), P(SMY)])],
    },
    StdProvince {
        token: TUS,
        lines: &[
            Army(&[P(PIE), P(ROM), P(VEN)]),
            Fleet(&[P(GOL), P(TYS), P(PIE), P(ROM)]),
        ],
    },
    StdProvince {
        token: WAL,
        lines: &[
            Army(&[P(LON), P(LVP), P(YOR)]),
            Fleet(&[P(ECH), P(IRI), P(LON), P(LVP)]),
        ],
    },
    StdProvince {
        token: YOR,
        lines: &[
            Army(&[P(EDI), P(LON), P(LVP), P(WAL)]),
            Fleet(&[P(NTH), P(EDI), P(LON)]),
        ],
    },
    StdProvince {
        token: ANK,
        lines: &[
            Army(&[P(ARM), P(CON), P(SMY)]),
            Fleet(&[P(BLA), P(ARM), P(CON)]),
        ],
    },
    StdProvince {
        token: BEL,
        lines: &[
            Army(&[P(BUR), P(RUH), P(HOL), P(PIC)]),
            Fleet(&[P(ECH), P(NTH), P(HOL), P(PIC)]),
        ],
    },
    StdProvince {
        token: BER,
        lines: &[
            Army(&[P(MUN), P(SIL), P(KIE), P(PRU)]),
            Fleet(&[P(BAL), P(KIE), P(PRU)]),
        ],
    },
    StdProvince {
        token: BRE,
        lines: &[
            Army(&[P(PAR), P(GAS), P(PIC)]),
            Fleet(&[P(ECH), P(MAO), P(GAS), P(PIC)]),
        ],
    },
    StdProvince {
        token: CON,
        lines: &[
            Army(&[P(ANK), P(SMY), P(BUL)]),
            Fleet(&[
                P(AEG),
                P(BLA),
                P(ANK),
                P(SMY),
                C(BUL, ECS),
                C(BUL, SCS),
            ]),
        ],
    },
    StdProvince {
        token: DEN,
        lines: &[
            Army(&[P(KIE), P(SWE)]),
            Fleet(&[P(BAL), P(HEL), P(NTH), P(SKA), P(KIE), P(SWE)]),
        ],
    },
    StdProvince {
        token: EDI,
        lines: &[
            Army(&[P(CLY), P(LVP), P(YOR)]),
            Fleet(&[P(NTH), P(NWG), P(CLY), P(YOR)]),
        ],
    },
    StdProvince {
        token: GRE,
        lines: &[
            Army(&[P(SER), P(ALB), P(BUL)]),
            Fleet(&[P(AEG), P(ION), P(ALB), C(BUL, SCS)]),
        ],
    },
    StdProvince {
        token: HOL,
        lines: &[
            Army(&[P(RUH), P(BEL), P(KIE)]),
            Fleet(&[P(HEL), P(NTH), P(BEL), P(KIE)]),
        ],
    },
    StdProvince {
        token: KIE,
        lines: &[
            Army(&[P(MUN), P(RUH), P(BER), P(DEN), P(HOL)]),
            Fleet(&[P(BAL), P(HEL), P(BER), P(DEN), P(HOL)]),
        ],
    },
    StdProvince {
        token: LON,
        lines: &[
            Army(&[P(WAL), P(YOR)]),
            Fleet(&[P(ECH), P(NTH), P(WAL), P(YOR)]),
        ],
    },
    StdProvince {
        token: LVP,
        lines: &[
            Army(&[P(CLY), P(EDI), P(WAL), P(YOR)]),
            Fleet(&[P(IRI), P(NAO), P(CLY), P(WAL)]),
        ],
    },
    StdProvince {
        token: MAR,
        lines: &[
            Army(&[P(BUR), P(GAS), P(PIE), P(SPA)]),
            Fleet(&[P(GOL), P(PIE), C(SPA, SCS)]),
        ],
    },
    StdProvince {
        token: NAP,
        lines: &[
            Army(&[P(APU), P(ROM)]),
            Fleet(&[P(ION), P(TYS), P(APU), P(ROM)]),
        ],
    },
    StdProvince {
        token: NWY,
        lines: &[
            Army(&[P(FIN), P(SWE), P(STP)]),
            Fleet(&[P(BAR), P(NTH), P(NWG), P(SKA), P(SWE), C(STP, NCS)]),
        ],
    },
    StdProvince {
        token: POR,
        lines: &[
            Army(&[P(SPA)]),
            Fleet(&[P(MAO), C(SPA, NCS), C(SPA, SCS)]),
        ],
    },
    StdProvince {
        token: ROM,
        lines: &[
            Army(&[P(APU), P(NAP), P(TUS), P(VEN)]),
            Fleet(&[P(TYS), P(NAP), P(TUS)]),
        ],
    },
    StdProvince {
        token: RUM,
        lines: &[
            Army(&[P(BUD), P(GAL), P(UKR), P(SER), P(SEV), P(BUL)]),
            Fleet(&[P(BLA), P(SEV), C(BUL, ECS)]),
        ],
    },
    StdProvince {
        token: SEV,
        lines: &[
            Army(&[P(MOS), P(UKR), P(ARM), P(RUM)]),
            Fleet(&[P(BLA), P(ARM), P(RUM)]),
        ],
    },
    StdProvince {
        token: SMY,
        lines: &[
            Army(&[P(ANK), P(ARM), P(CON), P(SYR)]),
            Fleet(&[P(AEG), P(EAS), P(CON), P(SYR)]),
        ],
    },
    StdProvince {
        token: SWE,
        lines: &[
            Army(&[P(DEN), P(FIN), P(NWY)]),
            Fleet(&[P(BAL), P(GOB), P(SKA), P(DEN), P(FIN), P(NWY)]),
        ],
    },
    StdProvince {
        token: TRI,
        lines: &[
            Army(&[P(BUD), P(SER), P(TYR), P(VIE), P(ALB), P(VEN)]),
            Fleet(&[P(ADR), P(ALB), P(VEN)]),
        ],
    },
    StdProvince {
        token: TUN,
        lines: &[Army(&[P(NAF)]), Fleet(&[P(ION), P(TYS), P(WES), P(NAF)])],
    },
    StdProvince {
        token: VEN,
        lines: &[
            Army(&[P(TYR), P(APU), P(PIE), P(ROM), P(TRI), P(TUS)]),
            Fleet(&[P(ADR), P(APU), P(TRI)]),
        ],
    },
    // Split coasts.
    StdProvince {
        token: BUL,
        lines: &[
            Army(&[P(SER), P(CON), P(GRE), P(RUM)]),
            FleetCoast(ECS, &[P(BLA), P(CON), P(RUM)]),
            FleetCoast(SCS, &[P(AEG), P(CON), P(GRE)]),
        ],
    },
    StdProvince {
        token: SPA,
        lines: &[
            Army(&[P(GAS), P(MAR), P(POR)]),
            FleetCoast(NCS, &[P(MAO), P(GAS), P(POR)]),
            FleetCoast(SCS, &[P(GOL), P(MAO), P(WES), P(MAR), P(POR)]),
        ],
    },
    StdProvince {
        token: STP,
        lines: &[
            Army(&[P(MOS), P(FIN), P(LVN), P(NWY)]),
            FleetCoast(NCS, &[P(BAR), P(NWY)]),
            FleetCoast(SCS, &[P(GOB), P(FIN), P(LVN)]),
        ],
    },
];

fn adjacency_entry(entry: &Adj) -> TokenMessage {
    match entry {
        P(province) => TokenMessage::single(*province),
        C(province, coast) => (*province + *coast).enclose(),
    }
}

fn coastline_message(line: &Coastline) -> TokenMessage {
    let (mut message, entries) = match line {
        Army(entries) => (TokenMessage::single(AMY), entries),
        Fleet(entries) => (TokenMessage::single(FLT), entries),
        FleetCoast(coast, entries) => ((FLT + *coast).enclose(), entries),
    };
    for entry in entries.iter() {
        message = message + adjacency_entry(entry);
    }
    message
}

/// Builds the MDF message for the standard map.
pub fn standard_mdf() -> TokenMessage {
    let mut powers = TokenMessage::new();
    for &power in POWERS.iter() {
        powers = powers + power;
    }

    let mut centres = TokenMessage::new();
    for &(owner, provinces) in CENTRE_BLOCKS {
        let mut block = TokenMessage::single(owner);
        for &province in provinces {
            block = block + province;
        }
        centres = centres & block;
    }
    let mut non_centres = TokenMessage::new();
    for &province in NON_CENTRES {
        non_centres = non_centres + province;
    }
    let provinces = centres.enclose() & non_centres;

    let mut adjacencies = TokenMessage::new();
    for province in PROVINCES {
        let mut record = TokenMessage::single(province.token);
        for line in province.lines {
            record = record & coastline_message(line);
        }
        adjacencies = adjacencies & record;
    }

    MDF & powers & provinces & adjacencies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_provinces_have_adjacency_records() {
        assert_eq!(PROVINCES.len(), 75);
        assert_eq!(
            CENTRE_BLOCKS.iter().map(|(_, p)| p.len()).sum::<usize>() + NON_CENTRES.len(),
            75
        );
    }

    #[test]
    fn mdf_has_four_parts() {
        let mdf = standard_mdf();
        assert_eq!(mdf.submessage_count(), 4);
        assert_eq!(mdf.submessage(0).first(), MDF);
        assert_eq!(mdf.submessage(1).len(), 7);
    }

    #[test]
    fn adjacency_is_symmetric_per_unit_type() {
        let mut map = crate::board::Map::new();
        map.set_map(&standard_mdf()).unwrap();

        // Army adjacency: a -> b implies b -> a.
        for a in map.province_indices() {
            let Some(adjacent) = map.adjacent_coasts(crate::board::CoastId::new(a, AMY)) else {
                continue;
            };
            for coast in adjacent {
                let back = map
                    .adjacent_coasts(crate::board::CoastId::new(coast.province, AMY))
                    .unwrap_or_else(|| {
                        panic!("no army coast on {:?}", map.province(coast.province).token)
                    });
                assert!(
                    back.contains(&crate::board::CoastId::new(a, AMY)),
                    "army edge {:?} -> {:?} not mirrored",
                    map.province(a).token,
                    map.province(coast.province).token
                );
            }
        }

        // Fleet adjacency: every destination coast must link back to some
        // coast of the source province.
        for a in map.province_indices() {
            for (&coast_token, adjacent) in &map.province(a).coasts {
                if coast_token == AMY {
                    continue;
                }
                for coast in adjacent {
                    let back = map
                        .adjacent_coasts(*coast)
                        .unwrap_or_else(|| panic!("missing coast {:?}", coast));
                    assert!(
                        back.iter().any(|c| c.province == a),
                        "fleet edge {:?} -> {:?} not mirrored",
                        map.province(a).token,
                        map.province(coast.province).token
                    );
                }
            }
        }
    }
}
