use crate::card::{Card, Rank};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeldKind {
    /// 3~4 张同点数、花色各不相同
    Set,
    /// 至少 3 张同花色的连续点数，A 只能作 1
    Run,
}

/// 散牌计分表：A = 1，2..=9 按点数，10/J/Q/K = 10
pub fn card_points(rank: Rank) -> u32 {
    rank.pip().min(10) as u32
}

pub fn deadwood(cards: &[Card]) -> u32 {
    cards.iter().map(|c| card_points(c.rank)).sum()
}

fn is_set(cards: &[Card]) -> bool {
    if !(3..=4).contains(&cards.len()) || !cards.iter().all(|c| c.rank == cards[0].rank) {
        return false;
    }
    let mut suits: Vec<_> = cards.iter().map(|c| c.suit).collect();
    suits.sort_unstable();
    suits.dedup();
    suits.len() == cards.len()
}

fn is_run(cards: &[Card]) -> bool {
    if cards.len() < 3 || !cards.iter().all(|c| c.suit == cards[0].suit) {
        return false;
    }
    let mut pips: Vec<u8> = cards.iter().map(|c| c.rank.pip()).collect();
    pips.sort_unstable();
    pips.windows(2).all(|w| w[1] == w[0] + 1)
}

/// 判断一组牌构成哪种组合
pub fn classify_meld(cards: &[Card]) -> Option<MeldKind> {
    if is_set(cards) {
        Some(MeldKind::Set)
    } else if is_run(cards) {
        Some(MeldKind::Run)
    } else {
        None
    }
}

/// 在已有组合上再加一张后是否仍是同类组合
pub fn can_lay_off(kind: MeldKind, meld: &[Card], card: Card) -> bool {
    let mut extended = meld.to_vec();
    extended.push(card);
    match kind {
        MeldKind::Set => is_set(&extended),
        MeldKind::Run => is_run(&extended),
    }
}

/// 手牌中所有可能的组合 (以位掩码表示)
fn candidate_melds(hand: &[Card]) -> Vec<u64> {
    let n = hand.len();
    (0u64..(1 << n))
        .filter(|mask| mask.count_ones() >= 3)
        .filter(|&mask| {
            let cards: Vec<Card> = (0..n).filter(|i| mask & (1 << i) != 0).map(|i| hand[i]).collect();
            classify_meld(&cards).is_some()
        })
        .collect()
}

/// 把手牌最优地拆成组合后剩下的最小散牌分
pub fn best_deadwood(hand: &[Card]) -> u32 {
    if hand.len() > 16 {
        // 超过实际可能的手牌大小，不做组合搜索
        return deadwood(hand);
    }
    let points: Vec<u32> = hand.iter().map(|c| card_points(c.rank)).collect();
    let total: u32 = points.iter().sum();
    let candidates = candidate_melds(hand);

    fn search(candidates: &[u64], start: usize, used: u64, melded: u32, points: &[u32], best: &mut u32) {
        *best = (*best).max(melded);
        for (offset, &mask) in candidates[start..].iter().enumerate() {
            if mask & used != 0 {
                continue;
            }
            let gained: u32 = (0..points.len()).filter(|i| mask & (1 << i) != 0).map(|i| points[i]).sum();
            search(candidates, start + offset + 1, used | mask, melded + gained, points, best);
        }
    }

    let mut best_melded = 0;
    search(&candidates, 0, 0, 0, &points, &mut best_melded);
    total - best_melded
}
