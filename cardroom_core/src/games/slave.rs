//! 奴隶 (Slave)：出完手牌的顺序决定名次。
//!
//! 整副牌轮流发完，持有梅花 3 的玩家先出。每一手是 1~4 张同点数的牌，
//! 跟牌必须张数相同且更大；其他人都不要时，最后出牌的人重新起牌。

use super::{check_can_seat, make_rng, seat_of};
use crate::card::{Card, Deck, Rank, Suit};
use crate::engine::{GameEngine, check_roster, ensure, locate_cards, remove_positions};
use crate::error::{RuleViolation, SnapshotError};
use crate::eval::slave::{Combo, beats, classify, power};
use crate::state::{PlayerId, PlayerProfile, next_seat};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

const OPENING_CARD: Card = Card { suit: Suit::Club, rank: Rank::Three };

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlaveConfig {
    /// 每个名次差对应的筹码
    pub stake: i64,
    pub max_players: usize,
    pub seed: Option<u64>,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        SlaveConfig { stake: 10, max_players: 6, seed: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlavePhase {
    Waiting,
    Playing,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlavePlayer {
    pub profile: PlayerProfile,
    pub total: i64,
    pub hand: Vec<Card>,
    /// 自上一次有人出牌以来是否选择了不要
    pub passed: bool,
    /// 名次，0 为第一个出完
    pub finish_place: Option<usize>,
    pub round_delta: i64,
}

/// 桌面上等待被压的一手牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trick {
    pub cards: Vec<Card>,
    pub combo: Combo,
    pub by: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaveState {
    pub phase: SlavePhase,
    pub players: Vec<SlavePlayer>,
    pub current_player: Option<usize>,
    pub trick: Option<Trick>,
    /// 已经清出桌面的牌
    pub pile: Vec<Card>,
    pub finish_order: Vec<PlayerId>,
    pub round: u32,
}

impl SlaveState {
    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.current_player.and_then(|idx| self.players.get(idx)).map(|p| p.profile.id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&SlavePlayer> {
        self.players.iter().find(|p| p.profile.id == player_id)
    }

    /// 手里还有牌的玩家
    fn in_game(&self, seat: usize) -> bool {
        !self.players[seat].hand.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum SlaveIntent {
    Play { player_id: PlayerId, cards: Vec<Card> },
    Pass { player_id: PlayerId },
}

impl SlaveIntent {
    pub fn player_id(&self) -> PlayerId {
        match self {
            SlaveIntent::Play { player_id, .. } | SlaveIntent::Pass { player_id } => *player_id,
        }
    }
}

pub struct Slave {
    config: SlaveConfig,
    state: SlaveState,
    deck: Deck,
    rng: StdRng,
}

impl Slave {
    pub fn new(config: SlaveConfig) -> Self {
        let mut rng = make_rng(config.seed);
        let deck = Deck::shuffled(1, &mut rng);
        Slave {
            state: SlaveState {
                phase: SlavePhase::Waiting,
                players: Vec::new(),
                current_player: None,
                trick: None,
                pile: Vec::new(),
                finish_order: Vec::new(),
                round: 0,
            },
            config,
            deck,
            rng,
        }
    }

    fn turn_seat(&self, player_id: PlayerId) -> Result<usize, RuleViolation> {
        if self.state.phase != SlavePhase::Playing {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = seat_of(self.state.players.iter().map(|p| &p.profile), player_id)?;
        if self.state.current_player != Some(seat) {
            return Err(RuleViolation::NotPlayersTurn(player_id));
        }
        Ok(seat)
    }

    pub fn play(&mut self, player_id: PlayerId, cards: &[Card]) -> Result<(), RuleViolation> {
        let seat = self.turn_seat(player_id)?;
        let positions = locate_cards(&self.state.players[seat].hand, cards)?;
        let combo = classify(cards).ok_or(RuleViolation::InvalidCardSelection)?;
        if let Some(trick) = &self.state.trick {
            if !beats(combo, trick.combo) {
                return Err(RuleViolation::InvalidCardSelection);
            }
        }

        let played = remove_positions(&mut self.state.players[seat].hand, &positions);
        if let Some(old) = self.state.trick.take() {
            self.state.pile.extend(old.cards);
        }
        self.state.trick = Some(Trick { cards: played, combo, by: player_id });
        for player in &mut self.state.players {
            player.passed = false;
        }

        if self.state.players[seat].hand.is_empty() {
            self.finish_player(seat);
            if self.state.phase == SlavePhase::Settled {
                return Ok(());
            }
        }
        let state = &self.state;
        self.state.current_player = next_seat(seat, state.players.len(), |s| state.in_game(s));
        Ok(())
    }

    pub fn pass(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        let seat = self.turn_seat(player_id)?;
        let Some(trick) = &self.state.trick else {
            // 起牌时不能不要
            return Err(RuleViolation::WrongPhase);
        };
        let last = seat_of(self.state.players.iter().map(|p| &p.profile), trick.by)?;
        self.state.players[seat].passed = true;

        let n = self.state.players.len();
        let state = &self.state;
        let everyone_passed = (0..n).filter(|&s| s != last && state.in_game(s)).all(|s| state.players[s].passed);
        if !everyone_passed {
            self.state.current_player = next_seat(seat, n, |s| state.in_game(s) && !state.players[s].passed);
            return Ok(());
        }

        // 一轮结束，清桌后由最后出牌的人起牌；他已出完则交给下一位
        if let Some(trick) = self.state.trick.take() {
            self.state.pile.extend(trick.cards);
        }
        for player in &mut self.state.players {
            player.passed = false;
        }
        let state = &self.state;
        self.state.current_player =
            if state.in_game(last) { Some(last) } else { next_seat(last, n, |s| state.in_game(s)) };
        Ok(())
    }

    /// 记录出完牌的玩家，只剩一人时该玩家垫底并结算
    fn finish_player(&mut self, seat: usize) {
        let id = self.state.players[seat].profile.id;
        self.state.players[seat].finish_place = Some(self.state.finish_order.len());
        self.state.finish_order.push(id);

        let remaining: Vec<usize> = (0..self.state.players.len()).filter(|&s| self.state.in_game(s)).collect();
        if let [last] = remaining.as_slice() {
            let id = self.state.players[*last].profile.id;
            self.state.players[*last].finish_place = Some(self.state.finish_order.len());
            self.state.finish_order.push(id);
        }
        if self.state.finish_order.len() == self.state.players.len() {
            self.settle();
        }
    }

    fn settle(&mut self) {
        let n = self.state.players.len() as i64;
        for player in &mut self.state.players {
            let place = player.finish_place.unwrap_or(0) as i64;
            player.round_delta = self.config.stake * (n - 1 - 2 * place);
            player.total += player.round_delta;
        }
        self.state.current_player = None;
        self.state.phase = SlavePhase::Settled;
    }
}

impl GameEngine for Slave {
    type State = SlaveState;
    type Intent = SlaveIntent;

    fn add_player(&mut self, profile: PlayerProfile) -> Result<(), RuleViolation> {
        if self.state.phase == SlavePhase::Playing {
            return Err(RuleViolation::WrongPhase);
        }
        check_can_seat(
            self.state.players.iter().map(|p| &p.profile),
            self.state.players.len(),
            self.config.max_players,
            &profile,
        )?;
        self.state.players.push(SlavePlayer {
            profile,
            total: 0,
            hand: Vec::new(),
            passed: false,
            finish_place: None,
            round_delta: 0,
        });
        Ok(())
    }

    fn remove_player(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        if self.state.phase == SlavePhase::Playing {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = seat_of(self.state.players.iter().map(|p| &p.profile), player_id)?;
        let player = self.state.players.remove(seat);
        self.state.pile.extend(player.hand);
        Ok(())
    }

    fn start_round(&mut self) -> Result<(), RuleViolation> {
        if self.state.phase == SlavePhase::Playing {
            return Err(RuleViolation::WrongPhase);
        }
        let n = self.state.players.len();
        if n < 2 {
            return Err(RuleViolation::NotEnoughPlayers);
        }

        self.deck.shuffle(&mut self.rng);
        self.state.pile.clear();
        self.state.trick = None;
        self.state.finish_order.clear();
        for player in &mut self.state.players {
            player.hand.clear();
            player.passed = false;
            player.finish_place = None;
            player.round_delta = 0;
        }
        let mut seat = 0;
        while let Some(card) = self.deck.deal() {
            self.state.players[seat].hand.push(card);
            seat = (seat + 1) % n;
        }
        for player in &mut self.state.players {
            player.hand.sort_by_key(|c| (power(c.rank), c.suit));
        }

        let leader = self.state.players.iter().position(|p| p.hand.contains(&OPENING_CARD));
        self.state.current_player = leader.or(Some(0));
        self.state.round += 1;
        self.state.phase = SlavePhase::Playing;
        Ok(())
    }

    fn apply(&mut self, intent: SlaveIntent) -> Result<(), RuleViolation> {
        match intent {
            SlaveIntent::Play { player_id, cards } => self.play(player_id, &cards),
            SlaveIntent::Pass { player_id } => self.pass(player_id),
        }
    }

    fn state(&self) -> SlaveState {
        self.state.clone()
    }

    fn set_state(&mut self, state: SlaveState) {
        self.state = state;
    }

    fn deck(&self) -> &Deck {
        &self.deck
    }

    fn set_deck(&mut self, deck: Deck) {
        self.deck = deck;
    }

    fn cards_in_play(state: &SlaveState) -> Vec<Card> {
        let mut cards = state.pile.clone();
        if let Some(trick) = &state.trick {
            cards.extend(trick.cards.iter().copied());
        }
        for player in &state.players {
            cards.extend(player.hand.iter().copied());
        }
        cards
    }

    fn validate(&self, state: &SlaveState) -> Result<(), SnapshotError> {
        let n = check_roster(state.players.iter().map(|p| &p.profile), state.current_player)?;
        let mut finished = state.finish_order.clone();
        finished.sort_unstable();
        finished.dedup();
        ensure(finished.len() == state.finish_order.len(), "名次记录重复")?;

        match state.phase {
            SlavePhase::Playing => {
                ensure(state.finish_order.len() < n, "所有人都已出完牌")?;
                ensure(
                    state.finish_order.iter().all(|id| state.player(*id).is_some_and(|p| p.hand.is_empty())),
                    "出完牌的玩家不在桌上或仍有手牌",
                )?;
                let current = state.current_player.ok_or(SnapshotError::Invalid("出牌阶段没有当前玩家"))?;
                ensure(state.in_game(current) && !state.players[current].passed, "当前玩家不能出牌")?;
                if let Some(trick) = &state.trick {
                    ensure(classify(&trick.cards) == Some(trick.combo), "桌面上的牌型与牌不符")?;
                    ensure(state.player(trick.by).is_some(), "桌面上的牌不属于任何玩家")?;
                }
            }
            SlavePhase::Waiting | SlavePhase::Settled => ensure(state.current_player.is_none(), "牌局外不应有当前玩家")?,
        }
        Ok(())
    }
}
