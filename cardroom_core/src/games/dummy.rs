//! Dummy：摸牌、组牌、弃牌，散牌分足够低时敲门结算。
//!
//! 每人发 `hand_size` 张，再翻一张到弃牌堆。轮到的玩家先从牌堆或弃牌堆摸一张，
//! 然后可以亮出组合 (set / run)、往桌上已有的组合上添牌，最后弃一张或敲门。

use super::{check_can_seat, make_rng, seat_of};
use crate::card::{Card, Deck};
use crate::engine::{GameEngine, check_roster, ensure, locate_cards, remove_positions};
use crate::error::{RuleViolation, SnapshotError};
use crate::eval::dummy::{MeldKind, best_deadwood, can_lay_off, classify_meld};
use crate::state::{PlayerId, PlayerProfile, next_seat};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DummyConfig {
    pub hand_size: usize,
    pub knock_limit: u32,
    pub gin_bonus: u32,
    pub undercut_bonus: u32,
    pub max_players: usize,
    pub seed: Option<u64>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        DummyConfig { hand_size: 7, knock_limit: 10, gin_bonus: 25, undercut_bonus: 25, max_players: 4, seed: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DummyPhase {
    Waiting,
    /// 轮到的玩家需要摸牌
    Drawing,
    /// 已摸牌，可以组牌、添牌，最后弃牌或敲门
    Discarding,
    Settled,
}

/// 一局的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DummyOutcome {
    Gin { by: PlayerId },
    Knock { by: PlayerId },
    Undercut { knocker: PlayerId, by: PlayerId },
    /// 牌堆摸完，本局不结算
    StockExhausted,
}

/// 摊在桌上的组合，一经亮出不会再移除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meld {
    pub id: u32,
    pub kind: MeldKind,
    pub cards: Vec<Card>,
    pub owner: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DummyPlayer {
    pub profile: PlayerProfile,
    pub total: i64,
    pub hand: Vec<Card>,
    /// 结算时的散牌分
    pub deadwood: Option<u32>,
    pub round_delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DummyState {
    pub phase: DummyPhase,
    pub players: Vec<DummyPlayer>,
    pub current_player: Option<usize>,
    /// 末尾是最上面一张
    pub discard: Vec<Card>,
    pub melds: Vec<Meld>,
    pub next_meld_id: u32,
    pub outcome: Option<DummyOutcome>,
    pub round: u32,
}

impl DummyState {
    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.current_player.and_then(|idx| self.players.get(idx)).map(|p| p.profile.id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&DummyPlayer> {
        self.players.iter().find(|p| p.profile.id == player_id)
    }

    pub fn discard_top(&self) -> Option<Card> {
        self.discard.last().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum DummyIntent {
    DrawStock { player_id: PlayerId },
    DrawDiscard { player_id: PlayerId },
    Meld { player_id: PlayerId, cards: Vec<Card> },
    LayOff { player_id: PlayerId, meld_id: u32, card: Card },
    Discard { player_id: PlayerId, card: Card },
    /// 弃掉这张牌并敲门
    Knock { player_id: PlayerId, card: Card },
}

impl DummyIntent {
    pub fn player_id(&self) -> PlayerId {
        match self {
            DummyIntent::DrawStock { player_id }
            | DummyIntent::DrawDiscard { player_id }
            | DummyIntent::Meld { player_id, .. }
            | DummyIntent::LayOff { player_id, .. }
            | DummyIntent::Discard { player_id, .. }
            | DummyIntent::Knock { player_id, .. } => *player_id,
        }
    }
}

pub struct Dummy {
    config: DummyConfig,
    state: DummyState,
    deck: Deck,
    rng: StdRng,
}

impl Dummy {
    pub fn new(config: DummyConfig) -> Self {
        let mut rng = make_rng(config.seed);
        let deck = Deck::shuffled(1, &mut rng);
        Dummy {
            state: DummyState {
                phase: DummyPhase::Waiting,
                players: Vec::new(),
                current_player: None,
                discard: Vec::new(),
                melds: Vec::new(),
                next_meld_id: 0,
                outcome: None,
                round: 0,
            },
            config,
            deck,
            rng,
        }
    }

    /// 阶段检查后再检查是否轮到该玩家，返回座位号
    fn turn_seat(&self, player_id: PlayerId, phase: DummyPhase) -> Result<usize, RuleViolation> {
        if self.state.phase != phase {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = seat_of(self.state.players.iter().map(|p| &p.profile), player_id)?;
        if self.state.current_player != Some(seat) {
            return Err(RuleViolation::NotPlayersTurn(player_id));
        }
        Ok(seat)
    }

    pub fn draw_stock(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        let seat = self.turn_seat(player_id, DummyPhase::Drawing)?;
        match self.deck.deal() {
            Some(card) => {
                self.state.players[seat].hand.push(card);
                self.state.phase = DummyPhase::Discarding;
            }
            None => self.finish(DummyOutcome::StockExhausted),
        }
        Ok(())
    }

    pub fn draw_discard(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        let seat = self.turn_seat(player_id, DummyPhase::Drawing)?;
        let card = self.state.discard.pop().ok_or(RuleViolation::InvalidCardSelection)?;
        self.state.players[seat].hand.push(card);
        self.state.phase = DummyPhase::Discarding;
        Ok(())
    }

    pub fn meld(&mut self, player_id: PlayerId, cards: &[Card]) -> Result<(), RuleViolation> {
        let seat = self.turn_seat(player_id, DummyPhase::Discarding)?;
        let hand = &self.state.players[seat].hand;
        let positions = locate_cards(hand, cards)?;
        let kind = classify_meld(cards).ok_or(RuleViolation::IllegalMeldOrRun)?;
        if hand.len() <= cards.len() {
            return Err(RuleViolation::OutOfBounds);
        }

        let mut melded = remove_positions(&mut self.state.players[seat].hand, &positions);
        melded.sort_by_key(|c| (c.rank.pip(), c.suit));
        self.state.melds.push(Meld { id: self.state.next_meld_id, kind, cards: melded, owner: player_id });
        self.state.next_meld_id += 1;
        Ok(())
    }

    /// 往任意玩家的组合上添一张牌
    pub fn lay_off(&mut self, player_id: PlayerId, meld_id: u32, card: Card) -> Result<(), RuleViolation> {
        let seat = self.turn_seat(player_id, DummyPhase::Discarding)?;
        let meld_idx =
            self.state.melds.iter().position(|m| m.id == meld_id).ok_or(RuleViolation::InvalidCardSelection)?;
        let hand = &self.state.players[seat].hand;
        let positions = locate_cards(hand, &[card])?;
        let meld = &self.state.melds[meld_idx];
        if !can_lay_off(meld.kind, &meld.cards, card) {
            return Err(RuleViolation::IllegalMeldOrRun);
        }
        if hand.len() <= 1 {
            return Err(RuleViolation::OutOfBounds);
        }

        remove_positions(&mut self.state.players[seat].hand, &positions);
        let meld = &mut self.state.melds[meld_idx];
        meld.cards.push(card);
        meld.cards.sort_by_key(|c| (c.rank.pip(), c.suit));
        Ok(())
    }

    pub fn discard(&mut self, player_id: PlayerId, card: Card) -> Result<(), RuleViolation> {
        let seat = self.turn_seat(player_id, DummyPhase::Discarding)?;
        let positions = locate_cards(&self.state.players[seat].hand, &[card])?;
        remove_positions(&mut self.state.players[seat].hand, &positions);
        self.state.discard.push(card);

        // 最后一张牌弃出等同于零散牌敲门
        if self.state.players[seat].hand.is_empty() {
            self.settle_knock(seat);
            return Ok(());
        }
        let n = self.state.players.len();
        self.state.current_player = next_seat(seat, n, |_| true).or(Some(seat));
        self.state.phase = DummyPhase::Drawing;
        Ok(())
    }

    pub fn knock(&mut self, player_id: PlayerId, card: Card) -> Result<(), RuleViolation> {
        let seat = self.turn_seat(player_id, DummyPhase::Discarding)?;
        let hand = &self.state.players[seat].hand;
        let positions = locate_cards(hand, &[card])?;
        let remaining: Vec<Card> =
            hand.iter().enumerate().filter(|(i, _)| !positions.contains(i)).map(|(_, c)| *c).collect();
        let actual = best_deadwood(&remaining);
        if actual > self.config.knock_limit {
            return Err(RuleViolation::ThresholdNotMet { actual, limit: self.config.knock_limit });
        }

        self.state.players[seat].hand = remaining;
        self.state.discard.push(card);
        self.settle_knock(seat);
        Ok(())
    }

    fn settle_knock(&mut self, knocker: usize) {
        let n = self.state.players.len();
        for player in &mut self.state.players {
            player.deadwood = Some(best_deadwood(&player.hand));
        }
        let deadwood = |seat: usize| self.state.players[seat].deadwood.unwrap_or(0) as i64;
        let knocker_id = self.state.players[knocker].profile.id;
        let knocker_dw = deadwood(knocker);
        // 从敲门者下家开始的座位顺序
        let opponents: Vec<usize> = (1..n).map(|step| (knocker + step) % n).collect();

        let mut deltas = vec![0i64; n];
        let outcome = if knocker_dw == 0 {
            for &seat in &opponents {
                let pay = deadwood(seat) + self.config.gin_bonus as i64;
                deltas[seat] -= pay;
                deltas[knocker] += pay;
            }
            DummyOutcome::Gin { by: knocker_id }
        } else if let Some(&under) = opponents
            .iter()
            .filter(|&&seat| deadwood(seat) < knocker_dw)
            .min_by_key(|&&seat| deadwood(seat))
        {
            let pay = knocker_dw - deadwood(under) + self.config.undercut_bonus as i64;
            deltas[knocker] -= pay;
            deltas[under] += pay;
            DummyOutcome::Undercut { knocker: knocker_id, by: self.state.players[under].profile.id }
        } else {
            for &seat in &opponents {
                let pay = deadwood(seat) - knocker_dw;
                deltas[seat] -= pay;
                deltas[knocker] += pay;
            }
            DummyOutcome::Knock { by: knocker_id }
        };

        for (player, delta) in self.state.players.iter_mut().zip(deltas) {
            player.round_delta = delta;
            player.total += delta;
        }
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: DummyOutcome) {
        self.state.outcome = Some(outcome);
        self.state.current_player = None;
        self.state.phase = DummyPhase::Settled;
    }

    fn in_progress(&self) -> bool {
        matches!(self.state.phase, DummyPhase::Drawing | DummyPhase::Discarding)
    }
}

impl GameEngine for Dummy {
    type State = DummyState;
    type Intent = DummyIntent;

    fn add_player(&mut self, profile: PlayerProfile) -> Result<(), RuleViolation> {
        if self.in_progress() {
            return Err(RuleViolation::WrongPhase);
        }
        check_can_seat(
            self.state.players.iter().map(|p| &p.profile),
            self.state.players.len(),
            self.config.max_players,
            &profile,
        )?;
        self.state.players.push(DummyPlayer { profile, total: 0, hand: Vec::new(), deadwood: None, round_delta: 0 });
        Ok(())
    }

    fn remove_player(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        if self.in_progress() {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = seat_of(self.state.players.iter().map(|p| &p.profile), player_id)?;
        let player = self.state.players.remove(seat);
        // 手牌压到弃牌堆底，不改变翻开的那张
        let mut cards = player.hand;
        cards.append(&mut self.state.discard);
        self.state.discard = cards;
        Ok(())
    }

    fn start_round(&mut self) -> Result<(), RuleViolation> {
        if self.in_progress() {
            return Err(RuleViolation::WrongPhase);
        }
        let n = self.state.players.len();
        if n < 2 {
            return Err(RuleViolation::NotEnoughPlayers);
        }
        if self.config.hand_size == 0 || self.config.hand_size * n + 1 > self.deck.full_size() {
            return Err(RuleViolation::OutOfBounds);
        }

        self.deck.shuffle(&mut self.rng);
        self.state.discard.clear();
        self.state.melds.clear();
        self.state.next_meld_id = 0;
        self.state.outcome = None;
        for player in &mut self.state.players {
            player.hand.clear();
            player.deadwood = None;
            player.round_delta = 0;
        }
        for _ in 0..self.config.hand_size {
            for player in &mut self.state.players {
                if let Some(card) = self.deck.deal() {
                    player.hand.push(card);
                }
            }
        }
        if let Some(card) = self.deck.deal() {
            self.state.discard.push(card);
        }

        // 先手每局轮换
        self.state.current_player = Some(self.state.round as usize % n);
        self.state.round += 1;
        self.state.phase = DummyPhase::Drawing;
        Ok(())
    }

    fn apply(&mut self, intent: DummyIntent) -> Result<(), RuleViolation> {
        match intent {
            DummyIntent::DrawStock { player_id } => self.draw_stock(player_id),
            DummyIntent::DrawDiscard { player_id } => self.draw_discard(player_id),
            DummyIntent::Meld { player_id, cards } => self.meld(player_id, &cards),
            DummyIntent::LayOff { player_id, meld_id, card } => self.lay_off(player_id, meld_id, card),
            DummyIntent::Discard { player_id, card } => self.discard(player_id, card),
            DummyIntent::Knock { player_id, card } => self.knock(player_id, card),
        }
    }

    fn state(&self) -> DummyState {
        self.state.clone()
    }

    fn set_state(&mut self, state: DummyState) {
        self.state = state;
    }

    fn deck(&self) -> &Deck {
        &self.deck
    }

    fn set_deck(&mut self, deck: Deck) {
        self.deck = deck;
    }

    fn cards_in_play(state: &DummyState) -> Vec<Card> {
        let mut cards = state.discard.clone();
        for player in &state.players {
            cards.extend(player.hand.iter().copied());
        }
        for meld in &state.melds {
            cards.extend(meld.cards.iter().copied());
        }
        cards
    }

    fn validate(&self, state: &DummyState) -> Result<(), SnapshotError> {
        check_roster(state.players.iter().map(|p| &p.profile), state.current_player)?;
        let mut ids: Vec<u32> = state.melds.iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ids.dedup();
        ensure(ids.len() == state.melds.len(), "组合编号重复")?;
        for meld in &state.melds {
            ensure(meld.id < state.next_meld_id, "组合编号超出已分配范围")?;
            ensure(classify_meld(&meld.cards) == Some(meld.kind), "桌上的组合不合法")?;
        }

        match state.phase {
            DummyPhase::Drawing | DummyPhase::Discarding => {
                let current = state.current_player.ok_or(SnapshotError::Invalid("牌局进行中没有当前玩家"))?;
                ensure(!state.players[current].hand.is_empty(), "当前玩家没有手牌")?;
                ensure(state.outcome.is_none(), "牌局进行中不应有结果")?;
            }
            DummyPhase::Waiting => {
                ensure(state.current_player.is_none(), "开局前不应有当前玩家")?;
                ensure(state.outcome.is_none(), "开局前不应有结果")?;
            }
            DummyPhase::Settled => ensure(state.current_player.is_none(), "结算后不应有当前玩家")?,
        }
        Ok(())
    }
}
