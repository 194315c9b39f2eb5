use crate::card::{Card, Rank};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kang 的牌型，变体顺序从小到大，直接用 `Ord` 比较
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KangCategory {
    HighCard,
    Pair,
    TwoPair,
    Straight,
    Flush,
    /// 三条 (四条也算作三条)
    Tong,
    StraightFlush,
    /// 三条加一对
    Kang,
}

impl KangCategory {
    /// 赢家按自己牌型的倍数结算
    pub fn multiplier(self) -> u32 {
        match self {
            KangCategory::Kang | KangCategory::StraightFlush => 5,
            KangCategory::Tong | KangCategory::Flush => 3,
            KangCategory::Straight | KangCategory::TwoPair => 2,
            KangCategory::Pair | KangCategory::HighCard => 1,
        }
    }
}

impl fmt::Display for KangCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            KangCategory::HighCard => "高牌",
            KangCategory::Pair => "一对",
            KangCategory::TwoPair => "两对",
            KangCategory::Straight => "顺子",
            KangCategory::Flush => "同花",
            KangCategory::Tong => "Tong",
            KangCategory::StraightFlush => "同花顺",
            KangCategory::Kang => "Kang",
        })
    }
}

/// 牌型加上用于同牌型比较的最大单张 (A = 14，A-2-3-4-5 顺子中为 5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KangHand {
    pub category: KangCategory,
    pub high_card: u8,
}

/// 评估 5 张牌，张数不对时返回 None
pub fn evaluate(hand: &[Card]) -> Option<KangHand> {
    if hand.len() != 5 {
        return None;
    }

    // 从大到小排序
    let mut values: Vec<u8> = hand.iter().map(|c| c.rank.ace_high()).collect();
    values.sort_unstable_by(|a, b| b.cmp(a));

    let is_flush = hand.windows(2).all(|w| w[0].suit == w[1].suit);
    let is_wheel = values == [Rank::Ace.ace_high(), 5, 4, 3, 2];
    let is_straight = values.windows(2).all(|w| w[0] == w[1] + 1) || is_wheel;
    let high_card = if is_wheel { 5 } else { values[0] };

    let mut counts: HashMap<u8, u8> = HashMap::new();
    for v in &values {
        *counts.entry(*v).or_insert(0) += 1;
    }
    let mut shape: Vec<u8> = counts.into_values().collect();
    shape.sort_unstable_by(|a, b| b.cmp(a));

    let category = match shape.as_slice() {
        [3, 2] => KangCategory::Kang,
        _ if is_straight && is_flush => KangCategory::StraightFlush,
        [4, ..] | [3, ..] => KangCategory::Tong,
        _ if is_flush => KangCategory::Flush,
        _ if is_straight => KangCategory::Straight,
        [2, 2, ..] => KangCategory::TwoPair,
        [2, ..] => KangCategory::Pair,
        _ => KangCategory::HighCard,
    };

    Some(KangHand { category, high_card })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Suit;
    use Rank::*;
    use Suit::*;

    fn card(rank: Rank, suit: Suit) -> Card {
        Card { rank, suit }
    }

    fn category(hand: [Card; 5]) -> KangCategory {
        evaluate(&hand).unwrap().category
    }

    #[test]
    fn test_kang_outranks_straight_flush() {
        let kang = [card(Two, Spade), card(Two, Heart), card(Two, Club), card(Three, Spade), card(Three, Heart)];
        let straight_flush = [card(Nine, Heart), card(Ten, Heart), card(Jack, Heart), card(Queen, Heart), card(King, Heart)];
        assert_eq!(category(kang), KangCategory::Kang);
        assert_eq!(category(straight_flush), KangCategory::StraightFlush);
        assert!(evaluate(&kang).unwrap() > evaluate(&straight_flush).unwrap());
    }

    #[test]
    fn test_tong_outranks_flush() {
        let tong = [card(Five, Spade), card(Five, Heart), card(Five, Club), card(Nine, Spade), card(King, Diamond)];
        let flush = [card(Two, Club), card(Six, Club), card(Nine, Club), card(Jack, Club), card(Ace, Club)];
        assert_eq!(category(tong), KangCategory::Tong);
        assert_eq!(category(flush), KangCategory::Flush);
        assert!(KangCategory::Tong > KangCategory::Flush);
    }

    #[test]
    fn test_four_of_a_kind_counts_as_tong() {
        let quads = [card(Seven, Spade), card(Seven, Heart), card(Seven, Club), card(Seven, Diamond), card(Two, Spade)];
        assert_eq!(category(quads), KangCategory::Tong);
    }

    #[test]
    fn test_wheel_is_straight_with_five_high() {
        let wheel = [card(Ace, Spade), card(Two, Heart), card(Three, Club), card(Four, Diamond), card(Five, Spade)];
        let hand = evaluate(&wheel).unwrap();
        assert_eq!(hand.category, KangCategory::Straight);
        assert_eq!(hand.high_card, 5);
    }

    #[test]
    fn test_ace_high_straight() {
        let broadway = [card(Ten, Spade), card(Jack, Heart), card(Queen, Club), card(King, Diamond), card(Ace, Spade)];
        let hand = evaluate(&broadway).unwrap();
        assert_eq!(hand.category, KangCategory::Straight);
        assert_eq!(hand.high_card, 14);
    }

    #[test]
    fn test_wrap_around_is_not_straight() {
        let wrap = [card(Queen, Spade), card(King, Heart), card(Ace, Club), card(Two, Diamond), card(Three, Spade)];
        assert_eq!(category(wrap), KangCategory::HighCard);
    }

    #[test]
    fn test_pairs_and_high_card() {
        let two_pair = [card(Jack, Spade), card(Jack, Heart), card(Nine, Diamond), card(Nine, Club), card(Ten, Spade)];
        let pair = [card(Ace, Spade), card(Ace, Heart), card(King, Diamond), card(Queen, Club), card(Jack, Spade)];
        let high = [card(King, Spade), card(Queen, Heart), card(Jack, Diamond), card(Nine, Club), card(Seven, Spade)];
        assert_eq!(category(two_pair), KangCategory::TwoPair);
        assert_eq!(category(pair), KangCategory::Pair);
        assert_eq!(category(high), KangCategory::HighCard);
    }

    #[test]
    fn test_same_category_breaks_on_highest_card() {
        let king_high = [card(King, Spade), card(Queen, Heart), card(Jack, Diamond), card(Nine, Club), card(Seven, Spade)];
        let ace_high = [card(Ace, Spade), card(Four, Heart), card(Six, Diamond), card(Nine, Heart), card(Seven, Club)];
        assert!(evaluate(&ace_high).unwrap() > evaluate(&king_high).unwrap());
        let same_top = [card(King, Heart), card(Two, Heart), card(Four, Diamond), card(Nine, Diamond), card(Seven, Diamond)];
        assert_eq!(evaluate(&same_top).unwrap(), evaluate(&king_high).unwrap());
    }

    #[test]
    fn test_wrong_size_is_none() {
        assert!(evaluate(&[card(Ace, Spade)]).is_none());
    }
}
