use crate::card::{Card, Rank};

/// 单张牌的初始点数：A 先记 11，J/Q/K 记 10
pub fn card_points(rank: Rank) -> u8 {
    match rank {
        Rank::Ace => 11,
        r if r.is_face() => 10,
        r => r.pip(),
    }
}

/// 手牌点数以及是否为软牌 (仍有 A 记作 11)
///
/// 超过 21 时，每次把一张记作 11 的 A 改记为 1，直到不超过 21 或没有可改的 A。
pub fn hand_value(cards: &[Card]) -> (u8, bool) {
    let mut total: u32 = cards.iter().map(|c| card_points(c.rank) as u32).sum();
    let mut soft_aces = cards.iter().filter(|c| c.rank == Rank::Ace).count();
    while total > 21 && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    (total.min(u8::MAX as u32) as u8, soft_aces > 0)
}

pub fn total(cards: &[Card]) -> u8 {
    hand_value(cards).0
}

/// 天然 21 点：恰好两张牌且为 21。分牌后的手牌由调用方排除。
pub fn is_natural(cards: &[Card]) -> bool {
    cards.len() == 2 && total(cards) == 21
}

pub fn is_bust(cards: &[Card]) -> bool {
    total(cards) > 21
}

/// 庄家是否需要继续要牌
pub fn dealer_should_hit(cards: &[Card], hits_soft_17: bool) -> bool {
    let (value, soft) = hand_value(cards);
    value < 17 || (value == 17 && soft && hits_soft_17)
}
