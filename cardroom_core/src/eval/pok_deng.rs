use crate::card::{Card, Rank};
use serde::{Deserialize, Serialize};

/// 手牌等级，变体顺序从小到大；同一变体内再比较携带的数值
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "class", content = "value")]
pub enum PokDengClass {
    /// 普通点数 0..=9
    Points(u8),
    /// 三张人头牌 (J/Q/K)
    ThreeFaces,
    /// 三张顺子，携带最大牌 (A-2-3 中为 3)
    Straight(u8),
    StraightFlush(u8),
    /// 三条，携带点数 (A = 14)
    Tong(u8),
    /// 两张牌 8 或 9 点
    Pok(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokDengHand {
    pub class: PokDengClass,
    pub points: u8,
    /// 赢时按此倍数收取下注
    pub deng: u32,
}

/// 单张牌的点数：A = 1，10/J/Q/K = 0
pub fn card_points(rank: Rank) -> u8 {
    match rank.pip() {
        p if p >= 10 => 0,
        p => p,
    }
}

pub fn points(cards: &[Card]) -> u8 {
    (cards.iter().map(|c| card_points(c.rank) as u32).sum::<u32>() % 10) as u8
}

/// 前两张是否为 Pok (8 或 9 点)
pub fn is_pok(cards: &[Card]) -> bool {
    cards.len() == 2 && points(cards) >= 8
}

/// 三张是否为顺子，返回最大牌。A 既可以作 1 (A-2-3) 也可以作 14 (Q-K-A)，但不能绕圈 (K-A-2)。
fn straight_high(cards: &[Card]) -> Option<u8> {
    let consecutive = |mut values: Vec<u8>| {
        values.sort_unstable();
        values.windows(2).all(|w| w[1] == w[0] + 1).then(|| values[values.len() - 1])
    };
    consecutive(cards.iter().map(|c| c.rank.ace_high()).collect())
        .or_else(|| consecutive(cards.iter().map(|c| c.rank.pip()).collect()))
}

/// 评估 2 或 3 张牌
pub fn evaluate(cards: &[Card]) -> Option<PokDengHand> {
    let pts = points(cards);
    let suited = cards.windows(2).all(|w| w[0].suit == w[1].suit);
    let (class, deng) = match cards.len() {
        2 => {
            let deng = if suited || cards[0].rank == cards[1].rank { 2 } else { 1 };
            let class = if pts >= 8 { PokDengClass::Pok(pts) } else { PokDengClass::Points(pts) };
            (class, deng)
        }
        3 => {
            if cards.iter().all(|c| c.rank == cards[0].rank) {
                (PokDengClass::Tong(cards[0].rank.ace_high()), 5)
            } else if let Some(high) = straight_high(cards) {
                if suited { (PokDengClass::StraightFlush(high), 5) } else { (PokDengClass::Straight(high), 3) }
            } else if cards.iter().all(|c| c.rank.is_face()) {
                (PokDengClass::ThreeFaces, 3)
            } else {
                (PokDengClass::Points(pts), if suited { 3 } else { 1 })
            }
        }
        _ => return None,
    };
    Some(PokDengHand { class, points: pts, deng })
}
