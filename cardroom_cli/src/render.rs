use cardroom_core::eval::blackjack::total;
use cardroom_core::games::blackjack::BlackjackState;
use cardroom_core::games::dummy::{DummyOutcome, DummyState};
use cardroom_core::games::holdem::HoldemState;
use cardroom_core::games::kang::KangState;
use cardroom_core::games::pok_deng::PokDengState;
use cardroom_core::games::slave::SlaveState;
use cardroom_core::{Card, GameSnapshot, PlayerId, PlayerProfile};
use cardroom_mesh::TableView;
use std::fmt::Write;

fn cards(cards: &[Card]) -> String {
    if cards.is_empty() {
        return "-".to_string();
    }
    cards.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
}

/// 座位号、名字，以及是否轮到他
fn seat_label(seat: usize, profile: &PlayerProfile, current: Option<usize>) -> String {
    let marker = if current == Some(seat) { "▶" } else { " " };
    format!("{} [{}] {}", marker, seat, profile.display_name)
}

fn name_of<'a>(mut profiles: impl Iterator<Item = &'a PlayerProfile>, id: PlayerId) -> String {
    profiles.find(|p| p.id == id).map_or_else(|| id.to_string(), |p| p.display_name.clone())
}

/// 以全知视角把一个快照画成多行文本
pub fn view(view: &TableView) -> String {
    let mut out = format!("==== {} 第 {} 局 (版本 {}) ====\n", view.snapshot.kind(), view.snapshot.round(), view.revision);
    match &view.snapshot {
        GameSnapshot::Blackjack(s) => blackjack(&mut out, s),
        GameSnapshot::Kang(s) => kang(&mut out, s),
        GameSnapshot::Dummy(s) => dummy(&mut out, s),
        GameSnapshot::PokDeng(s) => pok_deng(&mut out, s),
        GameSnapshot::Slave(s) => slave(&mut out, s),
        GameSnapshot::Holdem(s) => holdem(&mut out, s),
    }
    out
}

fn blackjack(out: &mut String, s: &BlackjackState) {
    let _ = writeln!(out, "阶段: {:?}  庄家: {} ({})", s.phase, cards(s.visible_dealer_cards()), total(s.visible_dealer_cards()));
    for (seat, p) in s.players.iter().enumerate() {
        let _ = writeln!(out, "{}  累计 {:+}", seat_label(seat, &p.profile, s.current_player), p.total);
        for (i, hand) in p.hands.iter().enumerate() {
            let _ = writeln!(
                out,
                "      手牌{}: {} ({}) 注 {} {:?}{}",
                i,
                cards(&hand.cards),
                total(&hand.cards),
                hand.bet,
                hand.status,
                hand.payout.map_or(String::new(), |v| format!(" 结果 {:+}", v))
            );
        }
    }
}

fn kang(out: &mut String, s: &KangState) {
    let dealer = s.dealer_id.map_or("-".to_string(), |id| name_of(s.players.iter().map(|p| &p.profile), id));
    let _ = writeln!(out, "阶段: {:?}  庄家: {}", s.phase, dealer);
    for (seat, p) in s.players.iter().enumerate() {
        let result = p.result.map_or(String::new(), |h| format!(" {}", h.category));
        let _ = writeln!(
            out,
            "{}  注 {}  手牌: {}{}  本局 {:+}  累计 {:+}",
            seat_label(seat, &p.profile, s.current_player),
            p.bet,
            cards(&p.hand),
            result,
            p.round_delta,
            p.total
        );
    }
}

fn pok_deng(out: &mut String, s: &PokDengState) {
    let dealer = s.dealer_id.map_or("-".to_string(), |id| name_of(s.players.iter().map(|p| &p.profile), id));
    let _ = writeln!(out, "阶段: {:?}  庄家: {}", s.phase, dealer);
    for (seat, p) in s.players.iter().enumerate() {
        let result = p.result.as_ref().map_or(String::new(), |h| format!(" {:?} x{}", h.class, h.deng));
        let _ = writeln!(
            out,
            "{}  注 {}  手牌: {}{}  本局 {:+}  累计 {:+}",
            seat_label(seat, &p.profile, s.current_player),
            p.bet,
            cards(&p.hand),
            result,
            p.round_delta,
            p.total
        );
    }
}

fn dummy(out: &mut String, s: &DummyState) {
    let _ = writeln!(out, "阶段: {:?}  弃牌堆顶: {}", s.phase, s.discard_top().map_or("-".to_string(), |c| c.to_string()));
    for meld in &s.melds {
        let _ = writeln!(out, "  组合#{} {:?}: {}", meld.id, meld.kind, cards(&meld.cards));
    }
    let profiles = || s.players.iter().map(|p| &p.profile);
    for (seat, p) in s.players.iter().enumerate() {
        let deadwood = p.deadwood.map_or(String::new(), |d| format!(" 散牌 {}", d));
        let _ = writeln!(
            out,
            "{}  手牌: {}{}  本局 {:+}  累计 {:+}",
            seat_label(seat, &p.profile, s.current_player),
            cards(&p.hand),
            deadwood,
            p.round_delta,
            p.total
        );
    }
    if let Some(outcome) = &s.outcome {
        let line = match outcome {
            DummyOutcome::Gin { by } => format!("{} 胡牌 (gin)", name_of(profiles(), *by)),
            DummyOutcome::Knock { by } => format!("{} 敲门获胜", name_of(profiles(), *by)),
            DummyOutcome::Undercut { knocker, by } => {
                format!("{} 敲门被 {} 反超", name_of(profiles(), *knocker), name_of(profiles(), *by))
            }
            DummyOutcome::StockExhausted => "牌堆摸完，本局流局".to_string(),
        };
        let _ = writeln!(out, "结果: {}", line);
    }
}

fn slave(out: &mut String, s: &SlaveState) {
    let profiles = || s.players.iter().map(|p| &p.profile);
    let trick = s.trick.as_ref().map_or("-".to_string(), |t| format!("{} ({})", cards(&t.cards), name_of(profiles(), t.by)));
    let _ = writeln!(out, "阶段: {:?}  桌面: {}", s.phase, trick);
    for (seat, p) in s.players.iter().enumerate() {
        let status = match (p.finish_place, p.passed) {
            (Some(place), _) => format!(" 第{}名", place + 1),
            (None, true) => " 不要".to_string(),
            (None, false) => String::new(),
        };
        let _ = writeln!(
            out,
            "{}  手牌({}): {}{}  本局 {:+}  累计 {:+}",
            seat_label(seat, &p.profile, s.current_player),
            p.hand.len(),
            cards(&p.hand),
            status,
            p.round_delta,
            p.total
        );
    }
}

fn holdem(out: &mut String, s: &HoldemState) {
    let _ = writeln!(
        out,
        "阶段: {:?}  公共牌: {}  底池: {}  当前最高注: {}",
        s.phase,
        cards(&s.community_cards),
        s.pot,
        s.cur_max_bet
    );
    for (seat, p) in s.players.iter().enumerate() {
        let button = if s.button == Some(seat) { " (D)" } else { "" };
        let rank = p.hand_rank.as_ref().map_or(String::new(), |r| format!(" {}", r));
        let _ = writeln!(
            out,
            "{}{}  筹码 {}  本轮 {}  {:?}  底牌: {}{}",
            seat_label(seat, &p.profile, s.current_player),
            button,
            p.stack,
            p.street_bet,
            p.state,
            cards(&p.hole_cards),
            rank
        );
    }
}
