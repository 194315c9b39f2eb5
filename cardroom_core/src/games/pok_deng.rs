//! 博登 (Pok Deng)：2 到 3 张牌与庄家比点数。
//!
//! 下注和发牌流程与 Kang 相同，每人 2 张。庄家拿到 Pok 立即结算；
//! 玩家拿到 Pok 则跳过补牌。其余玩家依次选择补一张或停牌，庄家最后行动。

use super::{check_can_seat, make_rng, seat_of};
use crate::card::{Card, Deck};
use crate::engine::{GameEngine, check_bet, check_roster, ensure};
use crate::error::{RuleViolation, SnapshotError};
use crate::eval::pok_deng::{PokDengHand, evaluate, is_pok};
use crate::state::{PlayerId, PlayerProfile, next_seat};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PokDengConfig {
    pub min_bet: u32,
    pub max_bet: u32,
    pub max_players: usize,
    pub seed: Option<u64>,
}

impl Default for PokDengConfig {
    fn default() -> Self {
        PokDengConfig { min_bet: 10, max_bet: 1000, max_players: 9, seed: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PokDengPhase {
    Waiting,
    Betting,
    Drawing,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokDengPlayer {
    pub profile: PlayerProfile,
    pub total: i64,
    pub bet: u32,
    pub hand: Vec<Card>,
    pub has_acted: bool,
    pub result: Option<PokDengHand>,
    pub round_delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokDengState {
    pub phase: PokDengPhase,
    pub players: Vec<PokDengPlayer>,
    pub dealer_id: Option<PlayerId>,
    pub current_player: Option<usize>,
    pub round: u32,
}

impl PokDengState {
    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.current_player.and_then(|idx| self.players.get(idx)).map(|p| p.profile.id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&PokDengPlayer> {
        self.players.iter().find(|p| p.profile.id == player_id)
    }

    fn dealer_seat(&self) -> Option<usize> {
        let dealer_id = self.dealer_id?;
        self.players.iter().position(|p| p.profile.id == dealer_id)
    }

    fn is_participant(&self, seat: usize) -> bool {
        self.players[seat].bet > 0 || Some(seat) == self.dealer_seat()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum PokDengIntent {
    Bet { player_id: PlayerId, amount: u32 },
    Deal { player_id: PlayerId },
    /// 补第三张牌
    Draw { player_id: PlayerId },
    Stay { player_id: PlayerId },
}

impl PokDengIntent {
    pub fn player_id(&self) -> PlayerId {
        match self {
            PokDengIntent::Bet { player_id, .. }
            | PokDengIntent::Deal { player_id }
            | PokDengIntent::Draw { player_id }
            | PokDengIntent::Stay { player_id } => *player_id,
        }
    }
}

pub struct PokDeng {
    config: PokDengConfig,
    state: PokDengState,
    deck: Deck,
    rng: StdRng,
}

impl PokDeng {
    pub fn new(config: PokDengConfig) -> Self {
        let mut rng = make_rng(config.seed);
        let deck = Deck::shuffled(1, &mut rng);
        PokDeng {
            state: PokDengState {
                phase: PokDengPhase::Waiting,
                players: Vec::new(),
                dealer_id: None,
                current_player: None,
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

    pub fn set_dealer(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        if !matches!(self.state.phase, PokDengPhase::Waiting | PokDengPhase::Settled) {
            return Err(RuleViolation::WrongPhase);
        }
        self.seat(player_id)?;
        self.state.dealer_id = Some(player_id);
        Ok(())
    }

    pub fn bet(&mut self, player_id: PlayerId, amount: u32) -> Result<(), RuleViolation> {
        if self.state.phase != PokDengPhase::Betting {
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

    pub fn deal(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        if self.state.phase != PokDengPhase::Betting {
            return Err(RuleViolation::WrongPhase);
        }
        let dealer = self.seat(player_id)?;
        if Some(player_id) != self.state.dealer_id {
            return Err(RuleViolation::NotPlayersTurn(player_id));
        }
        let n = self.state.players.len();
        let participants: Vec<usize> =
            (1..=n).map(|step| (dealer + step) % n).filter(|&s| self.state.is_participant(s)).collect();
        if participants.len() < 2 {
            return Err(RuleViolation::NotEnoughPlayers);
        }
        // 每人最多 3 张
        if self.deck.remaining() < participants.len() * 3 {
            return Err(RuleViolation::OutOfBounds);
        }

        for _ in 0..2 {
            for &seat in &participants {
                if let Some(card) = self.deck.deal() {
                    self.state.players[seat].hand.push(card);
                }
            }
        }
        self.state.phase = PokDengPhase::Drawing;

        if is_pok(&self.state.players[dealer].hand) {
            self.settle();
            return Ok(());
        }
        for &seat in &participants {
            let player = &mut self.state.players[seat];
            player.has_acted = is_pok(&player.hand);
        }
        let state = &self.state;
        let first = next_seat(dealer, n, |s| state.is_participant(s) && !state.players[s].has_acted);
        self.state.current_player = Some(first.unwrap_or(dealer));
        Ok(())
    }

    /// 补牌 (`draw = true`) 或停牌，然后轮到下一位
    fn act(&mut self, player_id: PlayerId, draw: bool) -> Result<(), RuleViolation> {
        if self.state.phase != PokDengPhase::Drawing {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = self.seat(player_id)?;
        if self.state.current_player != Some(seat) {
            return Err(RuleViolation::NotPlayersTurn(player_id));
        }
        if draw {
            let card = self.deck.deal().ok_or(RuleViolation::OutOfBounds)?;
            self.state.players[seat].hand.push(card);
        }
        self.state.players[seat].has_acted = true;

        let state = &self.state;
        match next_seat(seat, state.players.len(), |s| state.is_participant(s) && !state.players[s].has_acted) {
            Some(next) => self.state.current_player = Some(next),
            None => self.settle(),
        }
        Ok(())
    }

    fn settle(&mut self) {
        self.state.current_player = None;
        self.state.phase = PokDengPhase::Settled;
        let Some(dealer) = self.state.dealer_seat() else { return };
        for player in &mut self.state.players {
            player.result = evaluate(&player.hand);
        }
        let Some(dealer_hand) = self.state.players[dealer].result else { return };

        let mut dealer_delta = 0;
        for (seat, player) in self.state.players.iter_mut().enumerate() {
            if seat == dealer || player.bet == 0 {
                continue;
            }
            let Some(hand) = player.result else { continue };
            let bet = player.bet as i64;
            let delta = match hand.class.cmp(&dealer_hand.class) {
                Ordering::Greater => bet * hand.deng as i64,
                Ordering::Less => -bet * dealer_hand.deng as i64,
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

impl GameEngine for PokDeng {
    type State = PokDengState;
    type Intent = PokDengIntent;

    fn add_player(&mut self, profile: PlayerProfile) -> Result<(), RuleViolation> {
        if self.state.phase == PokDengPhase::Drawing {
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
        self.state.players.push(PokDengPlayer {
            profile,
            total: 0,
            bet: 0,
            hand: Vec::new(),
            has_acted: false,
            result: None,
            round_delta: 0,
        });
        Ok(())
    }

    fn remove_player(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        if self.state.phase == PokDengPhase::Drawing {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = self.seat(player_id)?;
        let player = &self.state.players[seat];
        // 结算后离座的玩家手牌放回牌堆底
        if !player.hand.is_empty() {
            let mut cards: Vec<Card> = self.deck.undealt().copied().collect();
            cards.extend(player.hand.iter().copied());
            self.deck = Deck::stacked(self.deck.deck_count(), cards);
        }
        self.state.players.remove(seat);
        if self.state.dealer_id == Some(player_id) {
            self.state.dealer_id = self.state.players.first().map(|p| p.profile.id);
            if self.state.phase == PokDengPhase::Betting {
                if let Some(new_dealer) = self.state.players.first_mut() {
                    new_dealer.bet = 0;
                }
            }
        }
        Ok(())
    }

    fn start_round(&mut self) -> Result<(), RuleViolation> {
        if !matches!(self.state.phase, PokDengPhase::Waiting | PokDengPhase::Settled) {
            return Err(RuleViolation::WrongPhase);
        }
        if self.state.players.len() < 2 {
            return Err(RuleViolation::NotEnoughPlayers);
        }
        self.deck.shuffle(&mut self.rng);
        for player in &mut self.state.players {
            player.bet = 0;
            player.hand.clear();
            player.has_acted = false;
            player.result = None;
            player.round_delta = 0;
        }
        self.state.current_player = None;
        self.state.round += 1;
        self.state.phase = PokDengPhase::Betting;
        Ok(())
    }

    fn apply(&mut self, intent: PokDengIntent) -> Result<(), RuleViolation> {
        match intent {
            PokDengIntent::Bet { player_id, amount } => self.bet(player_id, amount),
            PokDengIntent::Deal { player_id } => self.deal(player_id),
            PokDengIntent::Draw { player_id } => self.act(player_id, true),
            PokDengIntent::Stay { player_id } => self.act(player_id, false),
        }
    }

    fn state(&self) -> PokDengState {
        self.state.clone()
    }

    fn set_state(&mut self, state: PokDengState) {
        self.state = state;
    }

    fn deck(&self) -> &Deck {
        &self.deck
    }

    fn set_deck(&mut self, deck: Deck) {
        self.deck = deck;
    }

    fn cards_in_play(state: &PokDengState) -> Vec<Card> {
        state.players.iter().flat_map(|p| p.hand.iter().copied()).collect()
    }

    fn validate(&self, state: &PokDengState) -> Result<(), SnapshotError> {
        let n = check_roster(state.players.iter().map(|p| &p.profile), state.current_player)?;
        let dealer = state.dealer_seat();
        ensure(state.dealer_id.is_none() || dealer.is_some(), "庄家不在座位上")?;
        ensure(n == 0 || dealer.is_some(), "有玩家入座但没有庄家")?;
        ensure(state.players.iter().all(|p| matches!(p.hand.len(), 0 | 2 | 3)), "手牌张数错误")?;
        let dealer_unstaked = dealer.is_none_or(|d| state.players[d].bet == 0);

        match state.phase {
            PokDengPhase::Waiting | PokDengPhase::Betting => {
                ensure(state.current_player.is_none(), "发牌前不应有当前玩家")?;
                ensure(state.players.iter().all(|p| p.hand.is_empty()), "发牌前不应有手牌")?;
                ensure(dealer_unstaked, "庄家不能下注")?;
            }
            PokDengPhase::Drawing => {
                let current = state.current_player.ok_or(SnapshotError::Invalid("补牌阶段没有当前玩家"))?;
                ensure(state.is_participant(current) && !state.players[current].has_acted, "当前玩家不能补牌")?;
                ensure(dealer_unstaked, "庄家不能下注")?;
                ensure(
                    (0..n).all(|s| state.is_participant(s) != state.players[s].hand.is_empty()),
                    "只有参与比牌的座位持有手牌",
                )?;
            }
            PokDengPhase::Settled => ensure(state.current_player.is_none(), "结算后不应有当前玩家")?,
        }
        Ok(())
    }
}
