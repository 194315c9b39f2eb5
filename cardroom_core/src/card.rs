use crate::error::SnapshotError;
use rand::Rng;
use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// --- 核心数据结构定义 ---

/// 一副牌的张数
pub const CARDS_PER_DECK: usize = 52;

/// 花色 (Suit)
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    #[serde(rename = "clubs")]
    Club, // 梅花 ♣️
    #[serde(rename = "diamonds")]
    Diamond, // 方块 ♦️
    #[serde(rename = "hearts")]
    Heart, // 红心 ♥️
    #[serde(rename = "spades")]
    Spade, // 黑桃 ♠️
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Diamond, Suit::Heart, Suit::Spade];
}

/// 点数 (Rank)
///
/// 枚举顺序让 Ace 默认最大，各游戏再通过 [`Rank::pip`] / [`Rank::ace_high`] 取各自需要的数值。
/// 序列化时使用 1..=13 (1 = A, 11 = J, 12 = Q, 13 = K)。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
        Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King, Rank::Ace,
    ];

    /// A 记作 1，K 记作 13
    pub fn pip(self) -> u8 {
        match self {
            Rank::Ace => 1,
            other => other as u8 + 2,
        }
    }

    /// A 记作 14
    pub fn ace_high(self) -> u8 {
        self as u8 + 2
    }

    pub fn from_pip(pip: u8) -> Option<Rank> {
        match pip {
            1 => Some(Rank::Ace),
            2..=13 => Some(Rank::ALL[(pip - 2) as usize]),
            _ => None,
        }
    }

    pub fn is_face(self) -> bool {
        matches!(self, Rank::Jack | Rank::Queen | Rank::King)
    }
}

impl From<Rank> for u8 {
    fn from(rank: Rank) -> u8 {
        rank.pip()
    }
}

impl TryFrom<u8> for Rank {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rank::from_pip(value).ok_or_else(|| format!("点数 {} 不在 1..=13 之间", value))
    }
}

/// 单张扑克牌 (Card)
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card { rank, suit }
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Spade => "♠️",
            Suit::Heart => "♥️",
            Suit::Club => "♣️",
            Suit::Diamond => "♦️",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "T",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.suit, self.rank)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("无法解析的牌: {0:?} (示例: AS, 10H, TD, 3c)")]
pub struct CardParseError(pub String);

/// 解析 "AS"、"10H"、"TD"、"3c" 这样的简写，点数在前，花色字母在后
impl FromStr for Card {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || CardParseError(s.to_string());
        let s_upper = s.trim().to_ascii_uppercase();
        if s_upper.len() < 2 {
            return Err(err());
        }
        let (rank_part, suit_part) = s_upper.split_at(s_upper.len() - 1);
        let suit = match suit_part {
            "S" => Suit::Spade,
            "H" => Suit::Heart,
            "D" => Suit::Diamond,
            "C" => Suit::Club,
            _ => return Err(err()),
        };
        let rank = match rank_part {
            "A" => Rank::Ace,
            "K" => Rank::King,
            "Q" => Rank::Queen,
            "J" => Rank::Jack,
            "T" | "10" => Rank::Ten,
            n => n.parse::<u8>().ok().filter(|p| (2..=9).contains(p)).and_then(Rank::from_pip).ok_or_else(err)?,
        };
        Ok(Card::new(rank, suit))
    }
}

// --- 牌堆 ---

/// 按固定顺序生成 `deck_count` 副完整的牌
pub fn full_shoe(deck_count: u8) -> Vec<Card> {
    let mut cards = Vec::with_capacity(CARDS_PER_DECK * deck_count as usize);
    for _ in 0..deck_count {
        for &suit in &Suit::ALL {
            for &rank in &Rank::ALL {
                cards.push(Card { rank, suit });
            }
        }
    }
    cards
}

/// 多副牌组成的发牌源。
///
/// 只保存尚未发出的牌，已发出的牌分散在各玩家手牌、弃牌堆等位置，由引擎自己持有。
/// `cards` 的末尾是牌顶。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    deck_count: u8,
    cards: Vec<Card>,
}

impl Deck {
    /// 未洗的完整牌堆
    pub fn new(deck_count: u8) -> Deck {
        Deck { deck_count, cards: full_shoe(deck_count) }
    }

    pub fn shuffled<R: Rng + ?Sized>(deck_count: u8, rng: &mut R) -> Deck {
        let mut deck = Deck::new(deck_count);
        deck.shuffle(rng);
        deck
    }

    /// 按给定顺序发牌的牌堆，第一张最先发出。用于测试和重放。
    pub fn stacked(deck_count: u8, mut deal_order: Vec<Card>) -> Deck {
        deal_order.reverse();
        Deck { deck_count, cards: deal_order }
    }

    /// 收回全部牌并洗牌 (Fisher–Yates)
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards = full_shoe(self.deck_count);
        self.cards.shuffle(rng);
    }

    /// 把弃牌放回牌堆并重新洗匀剩余的牌 (牌局进行中牌堆耗尽时使用)
    pub fn restock<R: Rng + ?Sized>(&mut self, cards: Vec<Card>, rng: &mut R) {
        self.cards.extend(cards);
        self.cards.shuffle(rng);
    }

    pub fn deal(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// 一次发出 n 张。剩余不足时不发任何牌并返回 None。
    pub fn deal_many(&mut self, n: usize) -> Option<Vec<Card>> {
        if n > self.cards.len() {
            return None;
        }
        let split_at = self.cards.len() - n;
        let mut taken = self.cards.split_off(split_at);
        taken.reverse();
        Some(taken)
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    pub fn deck_count(&self) -> u8 {
        self.deck_count
    }

    pub fn full_size(&self) -> usize {
        CARDS_PER_DECK * self.deck_count as usize
    }

    /// 剩余张数是否低于总量的给定比例
    pub fn is_below(&self, fraction: f64) -> bool {
        (self.cards.len() as f64) < self.full_size() as f64 * fraction
    }

    /// 未发出的牌，按发牌顺序 (第一张最先发出)
    pub fn undealt(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().rev()
    }

    pub fn serialize(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn deserialize(payload: &str) -> Result<Deck, SnapshotError> {
        let deck: Deck = serde_json::from_str(payload)?;
        if deck.cards.len() > deck.full_size() {
            return Err(SnapshotError::CardCount { found: deck.cards.len(), expected: deck.full_size() });
        }
        let mut counts: HashMap<Card, usize> = HashMap::new();
        for card in &deck.cards {
            let count = counts.entry(*card).or_insert(0);
            *count += 1;
            if *count > deck.deck_count as usize {
                return Err(SnapshotError::CardConservation {
                    card: *card,
                    found: *count,
                    expected: deck.deck_count as usize,
                });
            }
        }
        Ok(deck)
    }
}

/// 检查牌张守恒：牌堆加上桌面上所有位置的牌，必须恰好是 `deck_count` 副完整的牌
pub fn verify_conservation<'a>(
    deck: &'a Deck,
    on_table: impl IntoIterator<Item = &'a Card>,
) -> Result<(), SnapshotError> {
    let mut counts: HashMap<Card, usize> = HashMap::new();
    let mut total = 0;
    for card in deck.undealt().chain(on_table) {
        *counts.entry(*card).or_insert(0) += 1;
        total += 1;
    }
    if total != deck.full_size() {
        return Err(SnapshotError::CardCount { found: total, expected: deck.full_size() });
    }
    let expected = deck.deck_count as usize;
    for card in full_shoe(1) {
        let found = counts.get(&card).copied().unwrap_or(0);
        if found != expected {
            return Err(SnapshotError::CardConservation { card, found, expected });
        }
    }
    Ok(())
}

// --- 单元测试 ---
