//! 德州扑克 (Hold'em) 的牌局流程。
//!
//! 筹码在多局之间保留，输光的玩家自动旁观。每局轮换庄家、收大小盲注，
//! 依次进行翻牌前、翻牌、转牌、河牌四轮下注 (每次发公共牌前先烧一张)，最后按边池摊牌。

use super::{check_can_seat, make_rng, seat_of};
use crate::card::{Card, Deck};
use crate::engine::{GameEngine, check_roster, ensure};
use crate::error::{RuleViolation, SnapshotError};
use crate::eval::holdem::{HandRank, find_best_hand};
use crate::state::{PlayerId, PlayerProfile, next_seat};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HoldemConfig {
    pub small_blind: u32,
    pub big_blind: u32,
    pub starting_stack: u32,
    pub max_players: usize,
    pub seed: Option<u64>,
}

impl Default for HoldemConfig {
    fn default() -> Self {
        HoldemConfig { small_blind: 10, big_blind: 20, starting_stack: 1000, max_players: 9, seed: None }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HoldemPhase {
    WaitingForPlayers,
    PreFlop,
    Flop,
    Turn,
    River,
    /// 一局结束，结算完成
    HandOver,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlayerState {
    /// 等待下一局开始
    WaitingForHand,
    /// 轮到其行动
    Acting,
    /// 等待他人
    WaitingForTurn,
    AllIn,
    Folded,
    /// 没有筹码，本局不参与
    SittingOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    Fold,
    Check,
    Call,
    /// 金额为本轮下注后的总额
    BetOrRaise(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldemPlayer {
    pub profile: PlayerProfile,
    /// 剩余筹码
    pub stack: u32,
    pub wins: u32,
    pub state: PlayerState,
    pub hole_cards: Vec<Card>,
    /// 当前这一轮的下注额
    pub street_bet: u32,
    /// 本局累计投入
    pub contributed: u32,
    pub has_acted: bool,
    pub hand_rank: Option<HandRank>,
    pub round_delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldemState {
    pub phase: HoldemPhase,
    pub players: Vec<HoldemPlayer>,
    pub button: Option<usize>,
    pub current_player: Option<usize>,
    pub community_cards: Vec<Card>,
    /// 每次发公共牌前烧掉的牌
    pub burned: Vec<Card>,
    /// 离座玩家留下的底牌
    pub muck: Vec<Card>,
    /// 总奖池金额
    pub pot: u32,
    /// 当前轮下注的最高金额
    pub cur_max_bet: u32,
    /// 再加注时至少要加的数额
    pub min_raise: u32,
    pub round: u32,
}

impl HoldemState {
    /// 获取当前行动的玩家ID (如果存在)
    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.current_player.and_then(|idx| self.players.get(idx)).map(|p| p.profile.id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&HoldemPlayer> {
        self.players.iter().find(|p| p.profile.id == player_id)
    }

    /// 仍在争夺奖池 (未弃牌) 的玩家
    pub fn in_hand(&self, seat: usize) -> bool {
        matches!(self.players[seat].state, PlayerState::Acting | PlayerState::WaitingForTurn | PlayerState::AllIn)
    }

    /// 还能继续下注的玩家
    pub fn can_act(&self, seat: usize) -> bool {
        matches!(self.players[seat].state, PlayerState::Acting | PlayerState::WaitingForTurn)
    }

    fn is_betting(&self) -> bool {
        matches!(self.phase, HoldemPhase::PreFlop | HoldemPhase::Flop | HoldemPhase::Turn | HoldemPhase::River)
    }

    /// 该玩家本轮是否还需要表态
    fn owes_action(&self, seat: usize) -> bool {
        let player = &self.players[seat];
        self.can_act(seat) && (!player.has_acted || player.street_bet < self.cur_max_bet)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum HoldemIntent {
    Fold { player_id: PlayerId },
    Check { player_id: PlayerId },
    Call { player_id: PlayerId },
    BetOrRaise { player_id: PlayerId, amount: u32 },
}

impl HoldemIntent {
    pub fn player_id(&self) -> PlayerId {
        match self {
            HoldemIntent::Fold { player_id }
            | HoldemIntent::Check { player_id }
            | HoldemIntent::Call { player_id }
            | HoldemIntent::BetOrRaise { player_id, .. } => *player_id,
        }
    }

    pub fn action(&self) -> PlayerAction {
        match self {
            HoldemIntent::Fold { .. } => PlayerAction::Fold,
            HoldemIntent::Check { .. } => PlayerAction::Check,
            HoldemIntent::Call { .. } => PlayerAction::Call,
            HoldemIntent::BetOrRaise { amount, .. } => PlayerAction::BetOrRaise(*amount),
        }
    }
}

/// 边池：只有 `eligible` 中的座位有资格赢
#[derive(Debug, Clone, PartialEq, Eq)]
struct SidePot {
    amount: u32,
    eligible: Vec<usize>,
}

/// 按投入额分层计算边池，从最低一层开始
fn compute_side_pots(contributions: &[(usize, u32)]) -> Vec<SidePot> {
    let mut entries: Vec<(usize, u32)> = contributions.iter().copied().filter(|(_, c)| *c > 0).collect();
    entries.sort_by_key(|(_, c)| *c);

    let mut pots = Vec::new();
    let mut prev_level = 0;
    for &(_, level) in &entries {
        if level == prev_level {
            continue;
        }
        let eligible: Vec<usize> = entries.iter().filter(|(_, c)| *c >= level).map(|(s, _)| *s).collect();
        pots.push(SidePot { amount: (level - prev_level) * eligible.len() as u32, eligible });
        prev_level = level;
    }
    pots
}

pub struct Holdem {
    config: HoldemConfig,
    state: HoldemState,
    deck: Deck,
    rng: StdRng,
}

impl Holdem {
    pub fn new(config: HoldemConfig) -> Self {
        let mut rng = make_rng(config.seed);
        let deck = Deck::shuffled(1, &mut rng);
        Holdem {
            state: HoldemState {
                phase: HoldemPhase::WaitingForPlayers,
                players: Vec::new(),
                button: None,
                current_player: None,
                community_cards: Vec::new(),
                burned: Vec::new(),
                muck: Vec::new(),
                pot: 0,
                cur_max_bet: 0,
                min_raise: config.big_blind,
                round: 0,
            },
            config,
            deck,
            rng,
        }
    }

    // --- 核心游戏流程函数 ---

    /// 处理单个玩家的动作
    ///
    /// 校验合法性后扣除筹码、更新玩家状态和本轮最高下注额，然后判断：
    /// 只剩一人则直接获胜；本轮下注结束则推进到下一阶段；否则行动权交给下一位。
    pub fn handle_player_action(&mut self, player_id: PlayerId, action: PlayerAction) -> Result<(), RuleViolation> {
        if !self.state.is_betting() {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = seat_of(self.state.players.iter().map(|p| &p.profile), player_id)?;
        if self.state.current_player != Some(seat) {
            return Err(RuleViolation::NotPlayersTurn(player_id));
        }
        let player = &self.state.players[seat];
        let to_call = self.state.cur_max_bet.saturating_sub(player.street_bet);

        match action {
            PlayerAction::Fold => {
                self.state.players[seat].state = PlayerState::Folded;
            }
            PlayerAction::Check => {
                if to_call != 0 {
                    return Err(RuleViolation::OutOfBounds);
                }
            }
            PlayerAction::Call => {
                let call_amount = to_call.min(player.stack);
                self.commit(seat, call_amount);
            }
            PlayerAction::BetOrRaise(amount) => {
                let all_in = player.stack + player.street_bet;
                if amount <= self.state.cur_max_bet || amount > all_in {
                    return Err(RuleViolation::OutOfBounds);
                }
                // 不足最小加注额时只允许全下
                let increase = amount - self.state.cur_max_bet;
                if increase < self.state.min_raise && amount < all_in {
                    return Err(RuleViolation::OutOfBounds);
                }
                let street_bet = player.street_bet;
                self.state.min_raise = self.state.min_raise.max(increase);
                self.commit(seat, amount - street_bet);
                self.state.cur_max_bet = amount;
                for (other, p) in self.state.players.iter_mut().enumerate() {
                    if other != seat {
                        p.has_acted = false;
                    }
                }
            }
        }
        self.state.players[seat].has_acted = true;
        self.advance(seat);
        Ok(())
    }

    // --- 辅助逻辑函数 ---

    /// 下注筹码进入奖池，筹码用完即全下
    fn commit(&mut self, seat: usize, chips: u32) {
        let player = &mut self.state.players[seat];
        let chips = chips.min(player.stack);
        player.stack -= chips;
        player.street_bet += chips;
        player.contributed += chips;
        self.state.pot += chips;
        if player.stack == 0 {
            player.state = PlayerState::AllIn;
        }
    }

    fn set_current(&mut self, seat: usize) {
        for player in &mut self.state.players {
            if player.state == PlayerState::Acting {
                player.state = PlayerState::WaitingForTurn;
            }
        }
        self.state.players[seat].state = PlayerState::Acting;
        self.state.current_player = Some(seat);
    }

    fn advance(&mut self, from: usize) {
        let n = self.state.players.len();
        let in_hand: Vec<usize> = (0..n).filter(|&s| self.state.in_hand(s)).collect();
        if let [winner] = in_hand.as_slice() {
            let mut payouts = vec![0; n];
            payouts[*winner] = self.state.pot;
            self.finish_hand(payouts);
            return;
        }

        let state = &self.state;
        let acting: Vec<usize> = (0..n).filter(|&s| state.can_act(s)).collect();
        // 其他人都已全下时，最后一个能行动的玩家跟平后不用再表态
        let lone_matched = acting.len() == 1 && state.players[acting[0]].street_bet >= state.cur_max_bet;
        if lone_matched || !acting.iter().any(|&s| state.owes_action(s)) {
            self.advance_to_next_phase();
            return;
        }
        match next_seat(from, n, |s| state.owes_action(s)) {
            Some(next) => self.set_current(next),
            None => self.advance_to_next_phase(),
        }
    }

    /// 先烧一张，再发 `count` 张公共牌
    fn deal_community(&mut self, count: usize) {
        if let Some(card) = self.deck.deal() {
            self.state.burned.push(card);
        }
        for _ in 0..count {
            if let Some(card) = self.deck.deal() {
                self.state.community_cards.push(card);
            }
        }
    }

    /// 推进到下一个游戏阶段
    ///
    /// 重置本轮下注状态并发出公共牌，由庄家左边第一个还能行动的玩家先说话。
    /// 少于两人能行动时不再下注，直接发完公共牌摊牌。
    fn advance_to_next_phase(&mut self) {
        loop {
            for player in &mut self.state.players {
                player.street_bet = 0;
                player.has_acted = false;
            }
            self.state.cur_max_bet = 0;
            self.state.min_raise = self.config.big_blind;
            self.state.current_player = None;

            match self.state.phase {
                HoldemPhase::PreFlop => {
                    self.deal_community(3);
                    self.state.phase = HoldemPhase::Flop;
                }
                HoldemPhase::Flop => {
                    self.deal_community(1);
                    self.state.phase = HoldemPhase::Turn;
                }
                HoldemPhase::Turn => {
                    self.deal_community(1);
                    self.state.phase = HoldemPhase::River;
                }
                HoldemPhase::River => {
                    self.handle_showdown();
                    return;
                }
                _ => return,
            }

            let n = self.state.players.len();
            let state = &self.state;
            if (0..n).filter(|&s| state.can_act(s)).count() >= 2 {
                let button = state.button.unwrap_or(0);
                if let Some(first) = next_seat(button, n, |s| state.can_act(s)) {
                    self.set_current(first);
                    return;
                }
            }
        }
    }

    /// 处理摊牌：逐个边池比较有资格的玩家的最大牌型，平分时零头给庄家左边最近的赢家
    fn handle_showdown(&mut self) {
        let n = self.state.players.len();
        for seat in 0..n {
            let rank = if self.state.in_hand(seat) {
                let mut all_cards = self.state.community_cards.clone();
                all_cards.extend(self.state.players[seat].hole_cards.iter().copied());
                find_best_hand(&all_cards)
            } else {
                None
            };
            self.state.players[seat].hand_rank = rank;
        }

        let contributions: Vec<(usize, u32)> =
            self.state.players.iter().enumerate().map(|(s, p)| (s, p.contributed)).collect();
        let button = self.state.button.unwrap_or(0);
        // 从庄家左边开始的座位顺序
        let order: Vec<usize> = (1..=n).map(|step| (button + step) % n).collect();
        let mut payouts = vec![0u32; n];

        for pot in compute_side_pots(&contributions) {
            let mut contenders: Vec<usize> =
                order.iter().copied().filter(|s| pot.eligible.contains(s) && self.state.in_hand(*s)).collect();
            if contenders.is_empty() {
                contenders = order.iter().copied().filter(|&s| self.state.in_hand(s)).collect();
            }
            let players = &self.state.players;
            let Some(best) = contenders.iter().filter_map(|&s| players[s].hand_rank.clone()).max() else {
                continue;
            };
            let winners: Vec<usize> =
                contenders.into_iter().filter(|&s| players[s].hand_rank.as_ref() == Some(&best)).collect();

            let share = pot.amount / winners.len() as u32;
            let remainder = pot.amount % winners.len() as u32;
            for (i, &winner) in winners.iter().enumerate() {
                payouts[winner] += share + if i == 0 { remainder } else { 0 };
            }
        }
        self.finish_hand(payouts);
    }

    /// 将奖池分配给赢家并记录本局输赢
    fn finish_hand(&mut self, payouts: Vec<u32>) {
        for (player, won) in self.state.players.iter_mut().zip(payouts) {
            player.stack += won;
            player.round_delta = won as i64 - player.contributed as i64;
            if won > 0 {
                player.wins += 1;
            }
            if player.state == PlayerState::Acting {
                player.state = PlayerState::WaitingForTurn;
            }
        }
        self.state.pot = 0;
        self.state.current_player = None;
        self.state.phase = HoldemPhase::HandOver;
    }
}

impl GameEngine for Holdem {
    type State = HoldemState;
    type Intent = HoldemIntent;

    /// 牌局进行中也可以入座，从下一局开始参与
    fn add_player(&mut self, profile: PlayerProfile) -> Result<(), RuleViolation> {
        check_can_seat(
            self.state.players.iter().map(|p| &p.profile),
            self.state.players.len(),
            self.config.max_players,
            &profile,
        )?;
        self.state.players.push(HoldemPlayer {
            profile,
            stack: self.config.starting_stack,
            wins: 0,
            state: PlayerState::WaitingForHand,
            hole_cards: Vec::new(),
            street_bet: 0,
            contributed: 0,
            has_acted: false,
            hand_rank: None,
            round_delta: 0,
        });
        Ok(())
    }

    fn remove_player(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        if self.state.is_betting() {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = seat_of(self.state.players.iter().map(|p| &p.profile), player_id)?;
        let player = self.state.players.remove(seat);
        self.state.muck.extend(player.hole_cards);
        // 庄家位置跟着座位一起前移，下一局仍从原来的下家开始
        if let Some(button) = self.state.button {
            if seat <= button && button > 0 {
                self.state.button = Some(button - 1);
            }
        }
        Ok(())
    }

    /// 开始新的一局
    ///
    /// 收回所有牌重新洗牌，轮换庄家，给有筹码的玩家发两张底牌并收取大小盲注。
    /// 单挑时庄家是小盲。
    fn start_round(&mut self) -> Result<(), RuleViolation> {
        if self.state.is_betting() {
            return Err(RuleViolation::WrongPhase);
        }
        let n = self.state.players.len();
        let eligible: Vec<bool> = self.state.players.iter().map(|p| p.stack > 0).collect();
        let active_count = eligible.iter().filter(|&&e| e).count();
        if active_count < 2 {
            return Err(RuleViolation::NotEnoughPlayers);
        }

        // 轮换庄家位置
        let button = match self.state.button {
            Some(prev) if prev < n => next_seat(prev, n, |s| eligible[s]).unwrap_or(prev),
            _ => eligible.iter().position(|&e| e).unwrap_or(0),
        };

        self.deck.shuffle(&mut self.rng);
        self.state.community_cards.clear();
        self.state.burned.clear();
        self.state.muck.clear();
        self.state.pot = 0;
        self.state.cur_max_bet = 0;
        self.state.min_raise = self.config.big_blind;
        for (player, &plays) in self.state.players.iter_mut().zip(&eligible) {
            player.state = if plays { PlayerState::WaitingForTurn } else { PlayerState::SittingOut };
            player.hole_cards.clear();
            player.street_bet = 0;
            player.contributed = 0;
            player.has_acted = false;
            player.hand_rank = None;
            player.round_delta = 0;
        }

        // 从庄家左边开始发底牌
        let seats: Vec<usize> = (1..=n).map(|step| (button + step) % n).filter(|&s| eligible[s]).collect();
        for _ in 0..2 {
            for &seat in &seats {
                if let Some(card) = self.deck.deal() {
                    self.state.players[seat].hole_cards.push(card);
                }
            }
        }

        let sb = if active_count == 2 { button } else { next_seat(button, n, |s| eligible[s]).unwrap_or(button) };
        let bb = next_seat(sb, n, |s| eligible[s]).unwrap_or(sb);
        self.commit(sb, self.config.small_blind);
        self.commit(bb, self.config.big_blind);
        self.state.cur_max_bet = self.config.big_blind;

        self.state.button = Some(button);
        self.state.round += 1;
        self.state.phase = HoldemPhase::PreFlop;
        self.advance(bb);
        Ok(())
    }

    fn apply(&mut self, intent: HoldemIntent) -> Result<(), RuleViolation> {
        self.handle_player_action(intent.player_id(), intent.action())
    }

    fn state(&self) -> HoldemState {
        self.state.clone()
    }

    fn set_state(&mut self, state: HoldemState) {
        self.state = state;
    }

    fn deck(&self) -> &Deck {
        &self.deck
    }

    fn set_deck(&mut self, deck: Deck) {
        self.deck = deck;
    }

    fn cards_in_play(state: &HoldemState) -> Vec<Card> {
        let mut cards = state.community_cards.clone();
        cards.extend(state.burned.iter().copied());
        cards.extend(state.muck.iter().copied());
        for player in &state.players {
            cards.extend(player.hole_cards.iter().copied());
        }
        cards
    }

    fn validate(&self, state: &HoldemState) -> Result<(), SnapshotError> {
        let n = check_roster(state.players.iter().map(|p| &p.profile), state.current_player)?;
        ensure(state.community_cards.len() <= 5, "公共牌超过 5 张")?;

        if state.is_betting() {
            let current = state.current_player.ok_or(SnapshotError::Invalid("下注阶段没有当前玩家"))?;
            ensure(state.players[current].state == PlayerState::Acting, "当前玩家不在行动状态")?;
            ensure(state.button.is_some_and(|b| b < n), "下注阶段庄家位置无效")?;
            let expected = match state.phase {
                HoldemPhase::PreFlop => 0,
                HoldemPhase::Flop => 3,
                HoldemPhase::Turn => 4,
                _ => 5,
            };
            ensure(state.community_cards.len() == expected, "公共牌张数与阶段不符")?;
            ensure(
                state.pot as u64 == state.players.iter().map(|p| p.contributed as u64).sum::<u64>(),
                "奖池与玩家投入不符",
            )?;
            ensure(
                (0..n).filter(|&s| state.in_hand(s)).all(|s| state.players[s].hole_cards.len() == 2),
                "在局玩家应有两张底牌",
            )?;
        } else {
            ensure(state.current_player.is_none(), "下注阶段之外不应有当前玩家")?;
        }
        Ok(())
    }
}

// --- 单元测试 ---
