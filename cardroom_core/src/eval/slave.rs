use crate::card::{Card, Rank};
use serde::{Deserialize, Serialize};

/// 出牌强度：3 最小，2 最大
pub fn power(rank: Rank) -> u8 {
    match rank {
        Rank::Two => 12,
        Rank::Ace => 11,
        other => other as u8 - 1,
    }
}

/// 一手可以打出的牌：1~4 张同点数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combo {
    pub size: u8,
    pub power: u8,
}

pub fn classify(cards: &[Card]) -> Option<Combo> {
    if !(1..=4).contains(&cards.len()) || !cards.iter().all(|c| c.rank == cards[0].rank) {
        return None;
    }
    Some(Combo { size: cards.len() as u8, power: power(cards[0].rank) })
}

/// 跟牌必须张数相同且点数更大
pub fn beats(challenger: Combo, on_table: Combo) -> bool {
    challenger.size == on_table.size && challenger.power > on_table.power
}
