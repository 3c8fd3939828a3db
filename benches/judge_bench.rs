use criterion::{black_box, criterion_group, criterion_main, Criterion};

use entente::board::standard::standard_mdf;
use entente::board::{CoastId, GameState, ProvinceIndex};
use entente::judge;
use entente::token::lexicon::*;
use entente::token::{Token, TokenMessage};

fn pi(token: Token) -> ProvinceIndex {
    token.subtoken()
}

/// The 22-unit opening position of the standard game.
fn opening_position() -> GameState {
    let mut state = GameState::new();
    state.set_map(&standard_mdf()).unwrap();

    let units = [
        (AUS, AMY, VIE),
        (AUS, AMY, BUD),
        (AUS, FLT, TRI),
        (ENG, FLT, LON),
        (ENG, FLT, EDI),
        (ENG, AMY, LVP),
        (FRA, FLT, BRE),
        (FRA, AMY, PAR),
        (FRA, AMY, MAR),
        (GER, FLT, KIE),
        (GER, AMY, BER),
        (GER, AMY, MUN),
        (ITA, FLT, NAP),
        (ITA, AMY, ROM),
        (ITA, AMY, VEN),
        (RUS, AMY, MOS),
        (RUS, AMY, WAR),
        (RUS, FLT, SEV),
        (TUR, FLT, ANK),
        (TUR, AMY, CON),
        (TUR, AMY, SMY),
    ];
    let mut now = NOW + (SPR + Token::number(1901)).enclose();
    for (power, unit_type, province) in units {
        now = now + (power + unit_type + province).enclose();
    }
    // St. Petersburg's fleet sits on the south coast.
    now = now + (RUS + FLT + (STP + SCS).enclose()).enclose();
    state.set_units(&now).unwrap();
    state
}

fn bench_adjudicate_holds(c: &mut Criterion) {
    let mut state = opening_position();
    let provinces: Vec<ProvinceIndex> = state.units.keys().copied().collect();
    for province in provinces {
        state.set_hold_order(province);
    }
    c.bench_function("adjudicate_22_holds", |b| {
        b.iter(|| {
            let mut copy = black_box(&state).duplicate();
            judge::adjudicate(&mut copy);
            black_box(copy.units.len())
        })
    });
}

fn bench_adjudicate_opening_moves(c: &mut Criterion) {
    let mut state = opening_position();
    // A busy spring: moves, supports, a contested Galicia, and a convoy.
    state.set_move_order(pi(VIE), CoastId::new(pi(GAL), AMY));
    state.set_move_order(pi(BUD), CoastId::new(pi(SER), AMY));
    state.set_move_order(pi(TRI), CoastId::new(pi(ALB), FLT));
    state.set_move_order(pi(LON), CoastId::new(pi(NTH), FLT));
    state.set_move_order(pi(EDI), CoastId::new(pi(NWG), FLT));
    state.set_move_order(pi(LVP), CoastId::new(pi(YOR), AMY));
    state.set_move_order(pi(BRE), CoastId::new(pi(MAO), FLT));
    state.set_move_order(pi(PAR), CoastId::new(pi(BUR), AMY));
    state.set_support_to_move_order(pi(MAR), pi(PAR), pi(BUR));
    state.set_move_order(pi(KIE), CoastId::new(pi(DEN), FLT));
    state.set_move_order(pi(BER), CoastId::new(pi(KIE), AMY));
    state.set_move_order(pi(MUN), CoastId::new(pi(RUH), AMY));
    state.set_move_order(pi(NAP), CoastId::new(pi(ION), FLT));
    state.set_move_order(pi(ROM), CoastId::new(pi(APU), AMY));
    state.set_move_order(pi(VEN), CoastId::new(pi(TYR), AMY));
    state.set_move_order(pi(MOS), CoastId::new(pi(UKR), AMY));
    state.set_move_order(pi(WAR), CoastId::new(pi(GAL), AMY));
    state.set_move_order(pi(SEV), CoastId::new(pi(BLA), FLT));
    state.set_move_order(pi(ANK), CoastId::new(pi(BLA), FLT));
    state.set_move_order(pi(CON), CoastId::new(pi(BUL), AMY));
    state.set_move_order(pi(SMY), CoastId::new(pi(ARM), AMY));
    state.set_move_order(pi(STP), CoastId::new(pi(GOB), FLT));

    c.bench_function("adjudicate_spring_opening", |b| {
        b.iter(|| {
            let mut copy = black_box(&state).duplicate();
            judge::adjudicate(&mut copy);
            black_box(copy.units.len())
        })
    });
}

criterion_group!(benches, bench_adjudicate_holds, bench_adjudicate_opening_moves);
criterion_main!(benches);
