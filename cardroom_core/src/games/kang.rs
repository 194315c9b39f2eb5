//! Kang：5 张牌与庄家比大小。
//!
//! 庄家坐在某个座位上，其余玩家下注后由庄家发牌，每人 5 张。之后从庄家左手边开始
//! 依次换牌 (最多换 `max_discard` 张)，庄家最后换。全部换完后与庄家逐一比牌结算。

use super::{check_can_seat, make_rng, seat_of};
use crate::card::{Card, Deck};
use crate::engine::{GameEngine, check_bet, check_roster, ensure, remove_positions};
use crate::error::{RuleViolation, SnapshotError};
use crate::eval::kang::{KangHand, evaluate};
use crate::state::{PlayerId, PlayerProfile, next_seat};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const HAND_SIZE: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KangConfig {
    pub min_bet: u32,
    pub max_bet: u32,
    pub max_discard: usize,
    pub max_players: usize,
    pub seed: Option<u64>,
}

impl Default for KangConfig {
    fn default() -> Self {
        KangConfig { min_bet: 10, max_bet: 1000, max_discard: 2, max_players: 6, seed: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KangPhase {
    Waiting,
    Betting,
    Drawing,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KangPlayer {
    pub profile: PlayerProfile,
    pub total: i64,
    /// 本局下注，0 表示没有下注 (下注和换牌阶段庄家始终为 0)
    pub bet: u32,
    pub hand: Vec<Card>,
    pub has_drawn: bool,
    pub result: Option<KangHand>,
    pub round_delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KangState {
    pub phase: KangPhase,
    pub players: Vec<KangPlayer>,
    pub dealer_id: Option<PlayerId>,
    pub current_player: Option<usize>,
    pub discard: Vec<Card>,
    pub round: u32,
}

impl KangState {
    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.current_player.and_then(|idx| self.players.get(idx)).map(|p| p.profile.id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&KangPlayer> {
        self.players.iter().find(|p| p.profile.id == player_id)
    }

    fn dealer_seat(&self) -> Option<usize> {
        let dealer_id = self.dealer_id?;
        self.players.iter().position(|p| p.profile.id == dealer_id)
    }

    /// 本局参与比牌的座位：下了注的玩家和庄家
    fn is_participant(&self, seat: usize) -> bool {
        self.players[seat].bet > 0 || Some(seat) == self.dealer_seat()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum KangIntent {
    Bet { player_id: PlayerId, amount: u32 },
    Deal { player_id: PlayerId },
    /// 换掉手牌中这些位置的牌，空列表表示不换
    Draw { player_id: PlayerId, card_indices: Vec<usize> },
}

impl KangIntent {
    pub fn player_id(&self) -> PlayerId {
        match self {
            KangIntent::Bet { player_id, .. } | KangIntent::Deal { player_id } | KangIntent::Draw { player_id, .. } => *player_id,
        }
    }
}

pub struct Kang {
    config: KangConfig,
    state: KangState,
    deck: Deck,
    rng: StdRng,
}

impl Kang {
    pub fn new(config: KangConfig) -> Self {
        let mut rng = make_rng(config.seed);
        let deck = Deck::shuffled(1, &mut rng);
        Kang {
            state: KangState {
                phase: KangPhase::Waiting,
                players: Vec::new(),
                dealer_id: None,
                current_player: None,
                discard: Vec::new(),
                round: 0,
            },
            config,
            deck,
            rng,
        }
    }

    fn seat(&self, player_id: PlayerId) -> Result<usize, RuleViolation> {
        seat_of(self.state.players.iter().map(|p| &p.profile), player_id)
    }

    /// 指定庄家，只能在两局之间进行
    pub fn set_dealer(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        if !matches!(self.state.phase, KangPhase::Waiting | KangPhase::Settled) {
            return Err(RuleViolation::WrongPhase);
        }
        self.seat(player_id)?;
        self.state.dealer_id = Some(player_id);
        Ok(())
    }

    pub fn bet(&mut self, player_id: PlayerId, amount: u32) -> Result<(), RuleViolation> {
        if self.state.phase != KangPhase::Betting {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = self.seat(player_id)?;
        if Some(player_id) == self.state.dealer_id || self.state.players[seat].bet > 0 {
            return Err(RuleViolation::NotPlayersTurn(player_id));
        }
        check_bet(amount, self.config.min_bet, self.config.max_bet)?;
        self.state.players[seat].bet = amount;
        Ok(())
    }

    /// 庄家发牌：从庄家左手边开始，一次一张，每人 5 张
    pub fn deal(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        if self.state.phase != KangPhase::Betting {
            return Err(RuleViolation::WrongPhase);
        }
        let dealer = self.seat(player_id)?;
        if Some(player_id) != self.state.dealer_id {
            return Err(RuleViolation::NotPlayersTurn(player_id));
        }
        let participants: Vec<usize> = {
            let n = self.state.players.len();
            (1..=n).map(|step| (dealer + step) % n).filter(|&s| self.state.is_participant(s)).collect()
        };
        if participants.len() < 2 {
            return Err(RuleViolation::NotEnoughPlayers);
        }
        if self.deck.remaining() < participants.len() * HAND_SIZE {
            return Err(RuleViolation::OutOfBounds);
        }

        for _ in 0..HAND_SIZE {
            for &seat in &participants {
                if let Some(card) = self.deck.deal() {
                    self.state.players[seat].hand.push(card);
                }
            }
        }
        self.state.phase = KangPhase::Drawing;
        self.state.current_player = Some(participants[0]);
        Ok(())
    }

    /// 换牌：弃掉指定位置的牌并补同样多张
    pub fn draw(&mut self, player_id: PlayerId, card_indices: &[usize]) -> Result<(), RuleViolation> {
        if self.state.phase != KangPhase::Drawing {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = self.seat(player_id)?;
        if self.state.current_player != Some(seat) {
            return Err(RuleViolation::NotPlayersTurn(player_id));
        }
        let hand_len = self.state.players[seat].hand.len();
        let mut unique = card_indices.to_vec();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() != card_indices.len() || unique.iter().any(|&i| i >= hand_len) {
            return Err(RuleViolation::InvalidCardSelection);
        }
        if card_indices.len() > self.config.max_discard || card_indices.len() > self.deck.remaining() {
            return Err(RuleViolation::OutOfBounds);
        }

        let replacements = self.deck.deal_many(card_indices.len()).ok_or(RuleViolation::OutOfBounds)?;
        let player = &mut self.state.players[seat];
        let discarded = remove_positions(&mut player.hand, card_indices);
        player.hand.extend(replacements);
        player.has_drawn = true;
        self.state.discard.extend(discarded);

        let state = &self.state;
        match next_seat(seat, state.players.len(), |s| state.is_participant(s) && !state.players[s].has_drawn) {
            Some(next) => self.state.current_player = Some(next),
            None => self.showdown(),
        }
        Ok(())
    }

    /// 每位下注的玩家与庄家比牌
    /// 庄家缺席时本局不结算，所有人输赢为 0
    fn showdown(&mut self) {
        self.state.current_player = None;
        self.state.phase = KangPhase::Settled;
        for player in &mut self.state.players {
            player.result = evaluate(&player.hand);
        }
        let state = &self.state;
        let Some((dealer, dealer_hand)) = state.dealer_seat().and_then(|d| state.players[d].result.map(|h| (d, h)))
        else {
            return;
        };

        let mut dealer_delta = 0;
        for (seat, player) in self.state.players.iter_mut().enumerate() {
            if seat == dealer || player.bet == 0 {
                continue;
            }
            let Some(hand) = player.result else { continue };
            let bet = player.bet as i64;
            let delta = match hand.cmp(&dealer_hand) {
                Ordering::Greater => bet * hand.category.multiplier() as i64,
                Ordering::Less => -bet * dealer_hand.category.multiplier() as i64,
                Ordering::Equal => 0,
            };
            player.round_delta = delta;
            player.total += delta;
            dealer_delta -= delta;
        }
        let dealer_player = &mut self.state.players[dealer];
        dealer_player.round_delta = dealer_delta;
        dealer_player.total += dealer_delta;
    }
}

impl GameEngine for Kang {
    type State = KangState;
    type Intent = KangIntent;

    fn add_player(&mut self, profile: PlayerProfile) -> Result<(), RuleViolation> {
        if self.state.phase == KangPhase::Drawing {
            return Err(RuleViolation::WrongPhase);
        }
        check_can_seat(
            self.state.players.iter().map(|p| &p.profile),
            self.state.players.len(),
            self.config.max_players,
            &profile,
        )?;
        if self.state.dealer_id.is_none() {
            self.state.dealer_id = Some(profile.id);
        }
        self.state.players.push(KangPlayer {
            profile,
            total: 0,
            bet: 0,
            hand: Vec::new(),
            has_drawn: false,
            result: None,
            round_delta: 0,
        });
        Ok(())
    }

    fn remove_player(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        if self.state.phase == KangPhase::Drawing {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = self.seat(player_id)?;
        let player = self.state.players.remove(seat);
        self.state.discard.extend(player.hand);
        if self.state.dealer_id == Some(player_id) {
            self.state.dealer_id = self.state.players.first().map(|p| p.profile.id);
            // 下注阶段接手的庄家退回已下的注
            if self.state.phase == KangPhase::Betting {
                if let Some(new_dealer) = self.state.players.first_mut() {
                    new_dealer.bet = 0;
                }
            }
        }
        Ok(())
    }

    fn start_round(&mut self) -> Result<(), RuleViolation> {
        if !matches!(self.state.phase, KangPhase::Waiting | KangPhase::Settled) {
            return Err(RuleViolation::WrongPhase);
        }
        if self.state.players.len() < 2 {
            return Err(RuleViolation::NotEnoughPlayers);
        }
        // 每局使用一副新洗的牌
        self.state.discard.clear();
        self.deck.shuffle(&mut self.rng);
        for player in &mut self.state.players {
            player.bet = 0;
            player.hand.clear();
            player.has_drawn = false;
            player.result = None;
            player.round_delta = 0;
        }
        self.state.current_player = None;
        self.state.round += 1;
        self.state.phase = KangPhase::Betting;
        Ok(())
    }

    fn apply(&mut self, intent: KangIntent) -> Result<(), RuleViolation> {
        match intent {
            KangIntent::Bet { player_id, amount } => self.bet(player_id, amount),
            KangIntent::Deal { player_id } => self.deal(player_id),
            KangIntent::Draw { player_id, card_indices } => self.draw(player_id, &card_indices),
        }
    }

    fn state(&self) -> KangState {
        self.state.clone()
    }

    fn set_state(&mut self, state: KangState) {
        self.state = state;
    }

    fn deck(&self) -> &Deck {
        &self.deck
    }

    fn set_deck(&mut self, deck: Deck) {
        self.deck = deck;
    }

    fn cards_in_play(state: &KangState) -> Vec<Card> {
        let mut cards = state.discard.clone();
        for player in &state.players {
            cards.extend(player.hand.iter().copied());
        }
        cards
    }

    fn validate(&self, state: &KangState) -> Result<(), SnapshotError> {
        let n = check_roster(state.players.iter().map(|p| &p.profile), state.current_player)?;
        let dealer = state.dealer_seat();
        ensure(state.dealer_id.is_none() || dealer.is_some(), "庄家不在座位上")?;
        ensure(n == 0 || dealer.is_some(), "有玩家入座但没有庄家")?;
        ensure(state.players.iter().all(|p| p.hand.is_empty() || p.hand.len() == HAND_SIZE), "手牌张数错误")?;

        match state.phase {
            KangPhase::Waiting | KangPhase::Betting => {
                ensure(state.current_player.is_none(), "发牌前不应有当前玩家")?;
                ensure(state.players.iter().all(|p| p.hand.is_empty()), "发牌前不应有手牌")?;
                ensure(dealer.is_none_or(|d| state.players[d].bet == 0), "庄家不能下注")?;
            }
            KangPhase::Drawing => {
                let current = state.current_player.ok_or(SnapshotError::Invalid("换牌阶段没有当前玩家"))?;
                ensure(state.is_participant(current) && !state.players[current].has_drawn, "当前玩家不能换牌")?;
                ensure(dealer.is_none_or(|d| state.players[d].bet == 0), "庄家不能下注")?;
                ensure(
                    (0..n).all(|s| state.is_participant(s) == (state.players[s].hand.len() == HAND_SIZE)),
                    "只有参与比牌的座位持有手牌",
                )?;
            }
            KangPhase::Settled => ensure(state.current_player.is_none(), "结算后不应有当前玩家")?,
        }
        Ok(())
    }
}
