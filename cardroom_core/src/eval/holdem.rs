use crate::card::{Card, Rank};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 德州扑克牌型等级
///
/// 1. 变体从小到大排列，可以直接利用 `Ord` 比较。
/// 2. 变体内部携带比较所需的全部信息 (对子大小、踢脚牌等)。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Serialize, Deserialize)]
pub enum HandRank {
    HighCard(Rank, Rank, Rank, Rank, Rank),
    OnePair(Rank, Rank, Rank, Rank),
    TwoPair(Rank, Rank, Rank),
    ThreeOfAKind(Rank, Rank, Rank),
    /// 顺子 (最高牌)
    Straight(Rank),
    Flush(Rank, Rank, Rank, Rank, Rank),
    /// 葫芦 (三条的点数, 对子的点数)
    FullHouse(Rank, Rank),
    /// 四条 (四条的点数, 踢脚牌)
    FourOfAKind(Rank, Rank),
    StraightFlush(Rank),
    RoyalFlush,
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HandRank::HighCard(..) => write!(f, "高牌"),
            HandRank::OnePair(r, ..) => write!(f, "一对({})", r),
            HandRank::TwoPair(r1, r2, _) => write!(f, "两对({},{})", r1, r2),
            HandRank::ThreeOfAKind(r, ..) => write!(f, "三条({})", r),
            HandRank::Straight(r) => write!(f, "顺子({}高)", r),
            HandRank::Flush(..) => write!(f, "同花"),
            HandRank::FullHouse(r1, r2) => write!(f, "葫芦({}带{})", r1, r2),
            HandRank::FourOfAKind(r, _) => write!(f, "四条({})", r),
            HandRank::StraightFlush(r) => write!(f, "同花顺({}高)", r),
            HandRank::RoyalFlush => write!(f, "皇家同花顺"),
        }
    }
}

/// 从 5 到 7 张牌中找出最优的 5 张组合。张数不在范围内时返回 None。
///
/// 穷举所有 5 张组合：贪心地丢掉最小的牌可能会破坏顺子或同花。
pub fn find_best_hand(all_cards: &[Card]) -> Option<HandRank> {
    if !(5..=7).contains(&all_cards.len()) {
        return None;
    }
    let mut best: Option<HandRank> = None;
    let mut chosen = Vec::with_capacity(5);
    for_each_combination(all_cards, 5, 0, &mut chosen, &mut |hand: &[Card]| {
        let rank = evaluate_5_card_hand(hand);
        if best.as_ref().is_none_or(|b| rank > *b) {
            best = Some(rank);
        }
    });
    best
}

fn for_each_combination(cards: &[Card], k: usize, start: usize, chosen: &mut Vec<Card>, visit: &mut impl FnMut(&[Card])) {
    if chosen.len() == k {
        visit(chosen.as_slice());
        return;
    }
    for i in start..cards.len() {
        if cards.len() - i < k - chosen.len() {
            break;
        }
        chosen.push(cards[i]);
        for_each_combination(cards, k, i + 1, chosen, visit);
        chosen.pop();
    }
}

/// 评估恰好 5 张牌
fn evaluate_5_card_hand(hand: &[Card]) -> HandRank {
    let mut ranks: Vec<Rank> = hand.iter().map(|c| c.rank).collect();
    ranks.sort_by(|a, b| b.cmp(a));

    let is_flush = hand.windows(2).all(|w| w[0].suit == w[1].suit);
    let is_wheel = ranks == [Rank::Ace, Rank::Five, Rank::Four, Rank::Three, Rank::Two];
    let is_straight = ranks.windows(2).all(|w| w[0] as u8 == w[1] as u8 + 1) || is_wheel;
    // A-5 顺子中 5 是最大的牌
    let high_card = if is_wheel { Rank::Five } else { ranks[0] };

    if is_straight && is_flush {
        return if high_card == Rank::Ace { HandRank::RoyalFlush } else { HandRank::StraightFlush(high_card) };
    }

    // (出现次数, 点数)，先按次数再按点数从大到小
    let mut counts: HashMap<Rank, u8> = HashMap::new();
    for rank in &ranks {
        *counts.entry(*rank).or_insert(0) += 1;
    }
    let mut groups: Vec<(u8, Rank)> = counts.into_iter().map(|(r, c)| (c, r)).collect();
    groups.sort_by(|a, b| b.cmp(a));

    match (groups[0].0, groups.get(1).map(|g| g.0)) {
        (4, _) => HandRank::FourOfAKind(groups[0].1, groups[1].1),
        (3, Some(2)) => HandRank::FullHouse(groups[0].1, groups[1].1),
        (3, _) => HandRank::ThreeOfAKind(groups[0].1, groups[1].1, groups[2].1),
        (2, Some(2)) => HandRank::TwoPair(groups[0].1, groups[1].1, groups[2].1),
        (2, _) => HandRank::OnePair(groups[0].1, groups[1].1, groups[2].1, groups[3].1),
        _ if is_flush => HandRank::Flush(ranks[0], ranks[1], ranks[2], ranks[3], ranks[4]),
        _ if is_straight => HandRank::Straight(high_card),
        _ => HandRank::HighCard(ranks[0], ranks[1], ranks[2], ranks[3], ranks[4]),
    }
}
