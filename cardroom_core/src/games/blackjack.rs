//! 21 点。
//!
//! 庄家由引擎扮演。所有玩家下注后自动发牌，玩家依座位顺序行动，分牌后的手牌
//! 先全部打完再轮到下一位玩家，最后庄家补牌到 17 点并结算。
//! 上一局的牌进入弃牌盒，牌靴剩余低于阈值时在开局前整体重洗。

use super::{check_can_seat, make_rng, seat_of};
use crate::card::{Card, Deck};
use crate::engine::{GameEngine, check_bet, check_roster, ensure};
use crate::error::{RuleViolation, SnapshotError};
use crate::eval::blackjack::{dealer_should_hit, is_natural, total};
use crate::state::{PlayerId, PlayerProfile};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlackjackConfig {
    pub decks: u8,
    pub min_bet: u32,
    pub max_bet: u32,
    /// 牌靴剩余低于这个比例时，下一局开始前重洗
    pub reshuffle_below: f64,
    pub max_players: usize,
    /// 分牌后最多的手牌数
    pub max_hands: usize,
    pub dealer_hits_soft_17: bool,
    pub seed: Option<u64>,
}

impl Default for BlackjackConfig {
    fn default() -> Self {
        BlackjackConfig {
            decks: 6,
            min_bet: 10,
            max_bet: 1000,
            reshuffle_below: 0.25,
            max_players: 7,
            max_hands: 4,
            dealer_hits_soft_17: false,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlackjackPhase {
    Waiting,
    Betting,
    PlayerTurns,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandStatus {
    Playing,
    Stood,
    Bust,
    /// 天然 21 点
    Blackjack,
    Surrendered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackjackHand {
    pub cards: Vec<Card>,
    pub bet: u32,
    pub status: HandStatus,
    pub doubled: bool,
    pub from_split: bool,
    /// 结算后的输赢 (正数为玩家赢)
    pub payout: Option<i64>,
}

impl BlackjackHand {
    fn new(bet: u32) -> Self {
        BlackjackHand { cards: Vec::new(), bet, status: HandStatus::Playing, doubled: false, from_split: false, payout: None }
    }

    /// 刚发完两张、尚未做过任何操作
    fn is_untouched(&self) -> bool {
        self.cards.len() == 2 && self.status == HandStatus::Playing && !self.doubled
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackjackPlayer {
    pub profile: PlayerProfile,
    /// 跨局累计的输赢
    pub total: i64,
    /// 本局的手牌，下注后才有；分牌会追加
    pub hands: Vec<BlackjackHand>,
    pub active_hand: usize,
    pub round_delta: i64,
}

impl BlackjackPlayer {
    fn has_bet(&self) -> bool {
        !self.hands.is_empty()
    }

    fn first_playing_hand(&self, from: usize) -> Option<usize> {
        (from..self.hands.len()).find(|&i| self.hands[i].status == HandStatus::Playing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackjackState {
    pub phase: BlackjackPhase,
    pub players: Vec<BlackjackPlayer>,
    pub dealer: Vec<Card>,
    pub hole_revealed: bool,
    pub current_player: Option<usize>,
    /// 弃牌盒
    pub discard: Vec<Card>,
    pub dealer_delta: i64,
    pub round: u32,
}

impl BlackjackState {
    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.current_player.and_then(|idx| self.players.get(idx)).map(|p| p.profile.id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&BlackjackPlayer> {
        self.players.iter().find(|p| p.profile.id == player_id)
    }

    /// 桌面上可以展示的庄家牌：暗牌翻开之前只有明牌
    pub fn visible_dealer_cards(&self) -> &[Card] {
        if self.hole_revealed { &self.dealer } else { &self.dealer[..self.dealer.len().min(1)] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum BlackjackIntent {
    Bet { player_id: PlayerId, amount: u32 },
    Hit { player_id: PlayerId, hand_index: usize },
    Stand { player_id: PlayerId, hand_index: usize },
    Double { player_id: PlayerId, hand_index: usize },
    Split { player_id: PlayerId, hand_index: usize },
    Surrender { player_id: PlayerId, hand_index: usize },
}

impl BlackjackIntent {
    pub fn player_id(&self) -> PlayerId {
        match self {
            BlackjackIntent::Bet { player_id, .. }
            | BlackjackIntent::Hit { player_id, .. }
            | BlackjackIntent::Stand { player_id, .. }
            | BlackjackIntent::Double { player_id, .. }
            | BlackjackIntent::Split { player_id, .. }
            | BlackjackIntent::Surrender { player_id, .. } => *player_id,
        }
    }
}

pub struct Blackjack {
    config: BlackjackConfig,
    state: BlackjackState,
    deck: Deck,
    rng: StdRng,
}

impl Blackjack {
    pub fn new(config: BlackjackConfig) -> Self {
        let mut rng = make_rng(config.seed);
        let deck = Deck::shuffled(config.decks, &mut rng);
        Blackjack {
            state: BlackjackState {
                phase: BlackjackPhase::Waiting,
                players: Vec::new(),
                dealer: Vec::new(),
                hole_revealed: false,
                current_player: None,
                discard: Vec::new(),
                dealer_delta: 0,
                round: 0,
            },
            config,
            deck,
            rng,
        }
    }

    pub fn config(&self) -> &BlackjackConfig {
        &self.config
    }

    fn seat(&self, player_id: PlayerId) -> Result<usize, RuleViolation> {
        seat_of(self.state.players.iter().map(|p| &p.profile), player_id)
    }

    /// 轮到该玩家且 `hand_index` 正是其当前手牌，返回座位号
    fn acting_seat(&self, player_id: PlayerId, hand_index: usize) -> Result<usize, RuleViolation> {
        if self.state.phase != BlackjackPhase::PlayerTurns {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = self.seat(player_id)?;
        let player = &self.state.players[seat];
        if self.state.current_player != Some(seat)
            || player.active_hand != hand_index
            || player.hands.get(hand_index).map(|h| h.status) != Some(HandStatus::Playing)
        {
            return Err(RuleViolation::NotPlayersTurn(player_id));
        }
        Ok(seat)
    }

    /// 牌靴用完时把弃牌盒洗回去
    fn draw_card(&mut self) -> Option<Card> {
        if self.deck.remaining() == 0 && !self.state.discard.is_empty() {
            let tray = std::mem::take(&mut self.state.discard);
            self.deck.restock(tray, &mut self.rng);
        }
        self.deck.deal()
    }

    fn available_cards(&self) -> usize {
        self.deck.remaining() + self.state.discard.len()
    }

    /// 给 `seated` 位玩家和庄家各发两张是否够用
    fn enough_to_deal(&self, seated: usize) -> bool {
        self.available_cards() >= 2 * (seated + 1)
    }

    pub fn bet(&mut self, player_id: PlayerId, amount: u32) -> Result<(), RuleViolation> {
        if self.state.phase != BlackjackPhase::Betting {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = self.seat(player_id)?;
        if self.state.players[seat].has_bet() {
            return Err(RuleViolation::NotPlayersTurn(player_id));
        }
        check_bet(amount, self.config.min_bet, self.config.max_bet)?;
        if self.state.players.iter().all(|p| p.has_bet() || p.profile.id == player_id)
            && !self.enough_to_deal(self.state.players.len())
        {
            return Err(RuleViolation::OutOfBounds);
        }

        self.state.players[seat].hands.push(BlackjackHand::new(amount));
        if self.state.players.iter().all(BlackjackPlayer::has_bet) {
            self.deal();
        }
        Ok(())
    }

    /// 每人两张，庄家一明一暗。调用前已确认牌量足够。
    fn deal(&mut self) {
        for _ in 0..2 {
            for seat in 0..self.state.players.len() {
                if let Some(card) = self.draw_card() {
                    self.state.players[seat].hands[0].cards.push(card);
                }
            }
            if let Some(card) = self.draw_card() {
                self.state.dealer.push(card);
            }
        }

        for player in &mut self.state.players {
            let hand = &mut player.hands[0];
            if is_natural(&hand.cards) {
                hand.status = HandStatus::Blackjack;
            }
        }

        // 庄家天然 21 点直接结算
        if is_natural(&self.state.dealer) {
            self.state.hole_revealed = true;
            self.settle();
            return;
        }

        self.state.phase = BlackjackPhase::PlayerTurns;
        let first = (0..self.state.players.len()).find_map(|seat| {
            self.state.players[seat].first_playing_hand(0).map(|hand| (seat, hand))
        });
        match first {
            Some((seat, hand)) => {
                self.state.current_player = Some(seat);
                self.state.players[seat].active_hand = hand;
            }
            None => self.dealer_turn(),
        }
    }

    pub fn hit(&mut self, player_id: PlayerId, hand_index: usize) -> Result<(), RuleViolation> {
        let seat = self.acting_seat(player_id, hand_index)?;
        let card = self.draw_card().ok_or(RuleViolation::OutOfBounds)?;
        let hand = &mut self.state.players[seat].hands[hand_index];
        hand.cards.push(card);
        match total(&hand.cards) {
            t if t > 21 => hand.status = HandStatus::Bust,
            21 => hand.status = HandStatus::Stood,
            _ => return Ok(()),
        }
        self.advance();
        Ok(())
    }

    pub fn stand(&mut self, player_id: PlayerId, hand_index: usize) -> Result<(), RuleViolation> {
        let seat = self.acting_seat(player_id, hand_index)?;
        self.state.players[seat].hands[hand_index].status = HandStatus::Stood;
        self.advance();
        Ok(())
    }

    /// 加倍：只能在未动过的两张牌上，下注翻倍并且只再拿一张
    pub fn double(&mut self, player_id: PlayerId, hand_index: usize) -> Result<(), RuleViolation> {
        let seat = self.acting_seat(player_id, hand_index)?;
        if !self.state.players[seat].hands[hand_index].is_untouched() {
            return Err(RuleViolation::InvalidCardSelection);
        }
        let card = self.draw_card().ok_or(RuleViolation::OutOfBounds)?;
        let hand = &mut self.state.players[seat].hands[hand_index];
        hand.bet *= 2;
        hand.doubled = true;
        hand.cards.push(card);
        hand.status = if total(&hand.cards) > 21 { HandStatus::Bust } else { HandStatus::Stood };
        self.advance();
        Ok(())
    }

    /// 分牌：两张同点数的牌拆成两手，各补一张，新手牌押同样的注
    pub fn split(&mut self, player_id: PlayerId, hand_index: usize) -> Result<(), RuleViolation> {
        let seat = self.acting_seat(player_id, hand_index)?;
        let player = &self.state.players[seat];
        let hand = &player.hands[hand_index];
        if !hand.is_untouched() || hand.cards[0].rank != hand.cards[1].rank {
            return Err(RuleViolation::InvalidCardSelection);
        }
        if player.hands.len() >= self.config.max_hands {
            return Err(RuleViolation::OutOfBounds);
        }
        if self.available_cards() < 2 {
            return Err(RuleViolation::OutOfBounds);
        }
        let (first_card, second_card) = match (self.draw_card(), self.draw_card()) {
            (Some(a), Some(b)) => (a, b),
            // available_cards 已经保证有两张
            _ => return Err(RuleViolation::OutOfBounds),
        };

        let hands = &mut self.state.players[seat].hands;
        let moved = hands[hand_index].cards.remove(1);
        let bet = hands[hand_index].bet;
        hands[hand_index].from_split = true;
        hands[hand_index].cards.push(first_card);
        let mut new_hand = BlackjackHand::new(bet);
        new_hand.from_split = true;
        new_hand.cards = vec![moved, second_card];
        hands.insert(hand_index + 1, new_hand);

        // 分牌后的 21 点不算天然 21 点，直接停牌
        for idx in [hand_index, hand_index + 1] {
            if total(&hands[idx].cards) == 21 {
                hands[idx].status = HandStatus::Stood;
            }
        }
        if hands[hand_index].status != HandStatus::Playing {
            self.advance();
        }
        Ok(())
    }

    /// 投降：未分牌、未动过的两张牌，输掉一半下注
    pub fn surrender(&mut self, player_id: PlayerId, hand_index: usize) -> Result<(), RuleViolation> {
        let seat = self.acting_seat(player_id, hand_index)?;
        let player = &self.state.players[seat];
        let hand = &player.hands[hand_index];
        if !hand.is_untouched() || hand.from_split || player.hands.len() != 1 {
            return Err(RuleViolation::InvalidCardSelection);
        }
        self.state.players[seat].hands[hand_index].status = HandStatus::Surrendered;
        self.advance();
        Ok(())
    }

    /// 先打完当前玩家剩余的手牌，再轮到后面的玩家，都打完后庄家行动
    fn advance(&mut self) {
        let Some(seat) = self.state.current_player else { return };
        let player = &mut self.state.players[seat];
        if let Some(next_hand) = player.first_playing_hand(player.active_hand + 1) {
            player.active_hand = next_hand;
            return;
        }
        for next_seat in seat + 1..self.state.players.len() {
            if let Some(hand) = self.state.players[next_seat].first_playing_hand(0) {
                self.state.current_player = Some(next_seat);
                self.state.players[next_seat].active_hand = hand;
                return;
            }
        }
        self.dealer_turn();
    }

    fn dealer_turn(&mut self) {
        self.state.current_player = None;
        self.state.hole_revealed = true;
        let anyone_standing = self
            .state
            .players
            .iter()
            .flat_map(|p| &p.hands)
            .any(|h| h.status == HandStatus::Stood);
        if anyone_standing {
            while dealer_should_hit(&self.state.dealer, self.config.dealer_hits_soft_17) {
                match self.draw_card() {
                    Some(card) => self.state.dealer.push(card),
                    None => break,
                }
            }
        }
        self.settle();
    }

    fn settle(&mut self) {
        let dealer_total = total(&self.state.dealer);
        let dealer_natural = is_natural(&self.state.dealer);
        let mut dealer_delta = 0;

        for player in &mut self.state.players {
            player.round_delta = 0;
            for hand in &mut player.hands {
                let bet = hand.bet as i64;
                let payout = match hand.status {
                    HandStatus::Surrendered => -(bet / 2),
                    HandStatus::Bust => -bet,
                    HandStatus::Blackjack if dealer_natural => 0,
                    HandStatus::Blackjack => bet * 3 / 2,
                    _ if dealer_natural => -bet,
                    _ => {
                        let player_total = total(&hand.cards);
                        if dealer_total > 21 || player_total > dealer_total {
                            bet
                        } else if player_total < dealer_total {
                            -bet
                        } else {
                            0
                        }
                    }
                };
                hand.payout = Some(payout);
                player.round_delta += payout;
            }
            player.total += player.round_delta;
            dealer_delta -= player.round_delta;
        }

        self.state.dealer_delta = dealer_delta;
        self.state.current_player = None;
        self.state.phase = BlackjackPhase::Settled;
    }

    /// 把桌上的牌收进弃牌盒
    fn collect_cards(&mut self) {
        let state = &mut self.state;
        state.discard.append(&mut state.dealer);
        for player in &mut state.players {
            for mut hand in player.hands.drain(..) {
                state.discard.append(&mut hand.cards);
            }
        }
    }
}

impl GameEngine for Blackjack {
    type State = BlackjackState;
    type Intent = BlackjackIntent;

    fn add_player(&mut self, profile: PlayerProfile) -> Result<(), RuleViolation> {
        if self.state.phase == BlackjackPhase::PlayerTurns {
            return Err(RuleViolation::WrongPhase);
        }
        check_can_seat(
            self.state.players.iter().map(|p| &p.profile),
            self.state.players.len(),
            self.config.max_players,
            &profile,
        )?;
        self.state.players.push(BlackjackPlayer { profile, total: 0, hands: Vec::new(), active_hand: 0, round_delta: 0 });
        Ok(())
    }

    fn remove_player(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        if self.state.phase == BlackjackPhase::PlayerTurns {
            return Err(RuleViolation::WrongPhase);
        }
        let seat = self.seat(player_id)?;
        // 剩下的人都已下注时直接发牌，牌不够则不能离座
        let completes_bets = self.state.phase == BlackjackPhase::Betting
            && self.state.players.len() > 1
            && self.state.players.iter().enumerate().all(|(s, p)| s == seat || p.has_bet());
        if completes_bets && !self.enough_to_deal(self.state.players.len() - 1) {
            return Err(RuleViolation::OutOfBounds);
        }

        let player = self.state.players.remove(seat);
        for hand in player.hands {
            self.state.discard.extend(hand.cards);
        }
        if completes_bets {
            self.deal();
        }
        Ok(())
    }

    fn start_round(&mut self) -> Result<(), RuleViolation> {
        if !matches!(self.state.phase, BlackjackPhase::Waiting | BlackjackPhase::Settled) {
            return Err(RuleViolation::WrongPhase);
        }
        if self.state.players.is_empty() {
            return Err(RuleViolation::NotEnoughPlayers);
        }

        self.collect_cards();
        if self.deck.is_below(self.config.reshuffle_below) {
            self.state.discard.clear();
            self.deck.shuffle(&mut self.rng);
        }

        let state = &mut self.state;
        for player in &mut state.players {
            player.active_hand = 0;
            player.round_delta = 0;
        }
        state.hole_revealed = false;
        state.current_player = None;
        state.dealer_delta = 0;
        state.round += 1;
        state.phase = BlackjackPhase::Betting;
        Ok(())
    }

    fn apply(&mut self, intent: BlackjackIntent) -> Result<(), RuleViolation> {
        match intent {
            BlackjackIntent::Bet { player_id, amount } => self.bet(player_id, amount),
            BlackjackIntent::Hit { player_id, hand_index } => self.hit(player_id, hand_index),
            BlackjackIntent::Stand { player_id, hand_index } => self.stand(player_id, hand_index),
            BlackjackIntent::Double { player_id, hand_index } => self.double(player_id, hand_index),
            BlackjackIntent::Split { player_id, hand_index } => self.split(player_id, hand_index),
            BlackjackIntent::Surrender { player_id, hand_index } => self.surrender(player_id, hand_index),
        }
    }

    fn state(&self) -> BlackjackState {
        self.state.clone()
    }

    fn set_state(&mut self, state: BlackjackState) {
        self.state = state;
    }

    fn deck(&self) -> &Deck {
        &self.deck
    }

    fn set_deck(&mut self, deck: Deck) {
        self.deck = deck;
    }

    fn cards_in_play(state: &BlackjackState) -> Vec<Card> {
        let mut cards = state.dealer.clone();
        cards.extend(state.discard.iter().copied());
        for player in &state.players {
            for hand in &player.hands {
                cards.extend(hand.cards.iter().copied());
            }
        }
        cards
    }

    fn validate(&self, state: &BlackjackState) -> Result<(), SnapshotError> {
        check_roster(state.players.iter().map(|p| &p.profile), state.current_player)?;
        for player in &state.players {
            ensure(player.hands.len() <= self.config.max_hands, "分牌超过上限")?;
            ensure(
                player.active_hand < player.hands.len().max(1),
                "当前手牌序号超出范围",
            )?;
        }

        match state.phase {
            BlackjackPhase::Waiting | BlackjackPhase::Betting => {
                ensure(state.current_player.is_none(), "发牌前不应有当前玩家")?;
                ensure(state.dealer.is_empty(), "发牌前庄家不应有牌")?;
                ensure(
                    state.players.iter().all(|p| p.hands.len() <= 1 && p.hands.iter().all(|h| h.cards.is_empty())),
                    "发牌前不应有手牌",
                )?;
            }
            BlackjackPhase::PlayerTurns => {
                let current = state.current_player.ok_or(SnapshotError::Invalid("玩家回合没有当前玩家"))?;
                ensure(state.dealer.len() == 2, "庄家应当只有两张牌")?;
                ensure(
                    state.players.iter().all(|p| p.has_bet() && p.hands.iter().all(|h| h.cards.len() >= 2)),
                    "玩家回合中每手牌至少两张",
                )?;
                let player = &state.players[current];
                ensure(
                    player.hands.get(player.active_hand).map(|h| h.status) == Some(HandStatus::Playing),
                    "当前手牌已经结束",
                )?;
            }
            BlackjackPhase::Settled => {
                ensure(state.current_player.is_none(), "结算后不应有当前玩家")?;
                ensure(state.hole_revealed, "结算后庄家暗牌应已翻开")?;
            }
        }
        Ok(())
    }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Rank, Suit};
    use crate::engine::testing::{assert_conserved, assert_rejects_state, assert_round_trip, profiles};
    use Rank::*;
    use Suit::*;

    fn card(rank: Rank, suit: Suit) -> Card {
        Card { rank, suit }
    }

    fn config() -> BlackjackConfig {
        BlackjackConfig { decks: 1, seed: Some(42), ..BlackjackConfig::default() }
    }

    // 入座并开局，之后用预先排好的牌堆发牌
    fn setup_game(n: usize, deal_order: Vec<Card>) -> (Blackjack, Vec<PlayerId>) {
        let mut game = Blackjack::new(config());
        let players = profiles(n);
        for p in &players {
            game.add_player(p.clone()).unwrap();
        }
        game.start_round().unwrap();
        game.set_deck(stacked_with_rest(deal_order));
        (game, players.iter().map(|p| p.id).collect())
    }

    // 指定的牌放在最前面，其余的牌按顺序跟在后面，保证仍是完整的一副
    fn stacked_with_rest(front: Vec<Card>) -> Deck {
        let mut order = front.clone();
        order.extend(crate::card::full_shoe(1).into_iter().filter(|c| !front.contains(c)));
        Deck::stacked(1, order)
    }

    #[test]
    fn test_bets_trigger_deal() {
        let (mut game, ids) = setup_game(2, vec![]);
        game.bet(ids[0], 20).unwrap();
        assert_eq!(game.state().phase, BlackjackPhase::Betting);
        game.bet(ids[1], 30).unwrap();

        let state = game.state();
        assert!(state.players.iter().all(|p| p.hands[0].cards.len() == 2));
        assert_eq!(state.dealer.len(), 2);
        assert_conserved(&game);
        assert_round_trip(&mut game);
    }

    #[test]
    fn test_bet_bounds_and_duplicates() {
        let (mut game, ids) = setup_game(2, vec![]);
        assert_eq!(game.bet(ids[0], 5), Err(RuleViolation::OutOfBounds));
        assert_eq!(game.bet(ids[0], 5000), Err(RuleViolation::OutOfBounds));
        game.bet(ids[0], 10).unwrap();
        assert_eq!(game.bet(ids[0], 10), Err(RuleViolation::NotPlayersTurn(ids[0])));
    }

    #[test]
    fn test_turn_rejection_has_no_effect() {
        // p0: 10 6, p1: 9 7, 庄家: 10 8
        let (mut game, ids) = setup_game(2, vec![
            card(Ten, Spade), card(Nine, Spade), card(Ten, Heart),
            card(Six, Club), card(Seven, Club), card(Eight, Heart),
        ]);
        game.bet(ids[0], 10).unwrap();
        game.bet(ids[1], 10).unwrap();
        let before = game.state();
        assert_eq!(game.hit(ids[1], 0), Err(RuleViolation::NotPlayersTurn(ids[1])));
        assert_eq!(game.hit(ids[0], 1), Err(RuleViolation::NotPlayersTurn(ids[0])));
        assert_eq!(game.state(), before);
    }

    #[test]
    fn test_round_plays_to_settlement() {
        // p0: 10 6 然后要到 5 = 21; p1: 9 7 停牌; 庄家: 10 8 = 18
        let (mut game, ids) = setup_game(2, vec![
            card(Ten, Spade), card(Nine, Spade), card(Ten, Heart),
            card(Six, Club), card(Seven, Club), card(Eight, Heart),
            card(Five, Diamond),
        ]);
        game.bet(ids[0], 10).unwrap();
        game.bet(ids[1], 20).unwrap();
        game.hit(ids[0], 0).unwrap();
        // 21 点自动停牌，轮到 p1
        assert_eq!(game.state().current_player_id(), Some(ids[1]));
        game.stand(ids[1], 0).unwrap();

        let state = game.state();
        assert_eq!(state.phase, BlackjackPhase::Settled);
        assert_eq!(state.players[0].round_delta, 10);
        assert_eq!(state.players[1].round_delta, -20);
        assert_eq!(state.dealer_delta, 10);
        assert_eq!(state.players.iter().map(|p| p.round_delta).sum::<i64>() + state.dealer_delta, 0);
        assert_conserved(&game);
        assert_round_trip(&mut game);
    }

    #[test]
    fn test_player_blackjack_pays_three_to_two() {
        // p0: A K; 庄家: 9 8
        let (mut game, ids) = setup_game(1, vec![card(Ace, Spade), card(Nine, Heart), card(King, Club), card(Eight, Heart)]);
        game.bet(ids[0], 20).unwrap();
        let state = game.state();
        assert_eq!(state.players[0].hands[0].status, HandStatus::Blackjack);
        assert_eq!(state.phase, BlackjackPhase::Settled);
        assert_eq!(state.players[0].round_delta, 30);
        assert_eq!(state.dealer.len(), 2);
    }

    #[test]
    fn test_dealer_blackjack_pushes_player_blackjack() {
        // p0: A K, p1: 10 9, 庄家: A Q
        let (mut game, ids) = setup_game(2, vec![
            card(Ace, Spade), card(Ten, Spade), card(Ace, Heart),
            card(King, Club), card(Nine, Club), card(Queen, Heart),
        ]);
        game.bet(ids[0], 20).unwrap();
        game.bet(ids[1], 20).unwrap();
        let state = game.state();
        assert_eq!(state.phase, BlackjackPhase::Settled);
        assert!(state.hole_revealed);
        assert_eq!(state.players[0].round_delta, 0);
        assert_eq!(state.players[1].round_delta, -20);
        assert_eq!(state.dealer_delta, 20);
    }

    #[test]
    fn test_natural_beats_dealer_three_card_21() {
        // p0: A Q, p1: 10 6 停牌; 庄家 7 4 再补 K = 21
        let (mut game, ids) = setup_game(2, vec![
            card(Ace, Spade), card(Ten, Spade), card(Seven, Heart),
            card(Queen, Club), card(Six, Club), card(Four, Heart),
            card(King, Diamond),
        ]);
        game.bet(ids[0], 10).unwrap();
        game.bet(ids[1], 10).unwrap();
        game.stand(ids[1], 0).unwrap();
        let state = game.state();
        assert_eq!(total(&state.dealer), 21);
        assert_eq!(state.players[0].round_delta, 15);
        assert_eq!(state.players[1].round_delta, -10);
    }

    #[test]
    fn test_split_plays_each_hand_before_next_player() {
        // p0: 8 8, p1: 10 7, 庄家: 10 7; 分牌补 3 和 2
        let (mut game, ids) = setup_game(2, vec![
            card(Eight, Spade), card(Ten, Spade), card(Ten, Heart),
            card(Eight, Club), card(Seven, Club), card(Seven, Heart),
            card(Three, Diamond), card(Two, Diamond),
        ]);
        game.bet(ids[0], 10).unwrap();
        game.bet(ids[1], 10).unwrap();
        game.split(ids[0], 0).unwrap();

        let state = game.state();
        let hands = &state.players[0].hands;
        assert_eq!(hands.len(), 2);
        assert_eq!(hands[0].cards, vec![card(Eight, Spade), card(Three, Diamond)]);
        assert_eq!(hands[1].cards, vec![card(Eight, Club), card(Two, Diamond)]);
        assert!(hands.iter().all(|h| h.from_split && h.bet == 10));

        game.stand(ids[0], 0).unwrap();
        assert_eq!(game.state().current_player_id(), Some(ids[0]));
        assert_eq!(game.state().players[0].active_hand, 1);
        // 分牌后的手牌不能投降
        assert_eq!(game.surrender(ids[0], 1), Err(RuleViolation::InvalidCardSelection));
        game.stand(ids[0], 1).unwrap();
        assert_eq!(game.state().current_player_id(), Some(ids[1]));
        assert_conserved(&game);
    }

    #[test]
    fn test_split_requires_pair() {
        let (mut game, ids) = setup_game(1, vec![card(Eight, Spade), card(Ten, Heart), card(Nine, Club), card(Seven, Heart)]);
        game.bet(ids[0], 10).unwrap();
        let before = game.state();
        assert_eq!(game.split(ids[0], 0), Err(RuleViolation::InvalidCardSelection));
        assert_eq!(game.state(), before);
    }

    #[test]
    fn test_double_takes_one_card_and_doubles_bet() {
        // p0: 5 6 加倍拿 10 = 21; 庄家 10 7
        let (mut game, ids) = setup_game(1, vec![
            card(Five, Spade), card(Ten, Heart), card(Six, Club), card(Seven, Heart), card(Ten, Diamond),
        ]);
        game.bet(ids[0], 10).unwrap();
        game.double(ids[0], 0).unwrap();
        let state = game.state();
        let hand = &state.players[0].hands[0];
        assert_eq!(hand.bet, 20);
        assert_eq!(hand.cards.len(), 3);
        assert_eq!(state.phase, BlackjackPhase::Settled);
        assert_eq!(state.players[0].round_delta, 20);
    }

    #[test]
    fn test_surrender_forfeits_half() {
        let (mut game, ids) = setup_game(1, vec![card(Ten, Spade), card(Ten, Heart), card(Six, Club), card(Nine, Heart)]);
        game.bet(ids[0], 30).unwrap();
        game.surrender(ids[0], 0).unwrap();
        let state = game.state();
        assert_eq!(state.players[0].round_delta, -15);
        assert_eq!(state.dealer_delta, 15);
        // 没人停牌，庄家不补牌
        assert_eq!(state.dealer.len(), 2);
    }

    #[test]
    fn test_surrender_rejected_after_hit() {
        let (mut game, ids) = setup_game(1, vec![
            card(Two, Spade), card(Ten, Heart), card(Three, Club), card(Nine, Heart), card(Four, Diamond),
        ]);
        game.bet(ids[0], 10).unwrap();
        game.hit(ids[0], 0).unwrap();
        assert_eq!(game.surrender(ids[0], 0), Err(RuleViolation::InvalidCardSelection));
    }

    #[test]
    fn test_bust_loses_even_if_dealer_busts() {
        // p0: 10 6 要到 K 爆牌; p1: 10 5 停牌; 庄家 10 6 再补 9 爆牌
        let (mut game, ids) = setup_game(2, vec![
            card(Ten, Spade), card(Ten, Club), card(Ten, Heart),
            card(Six, Club), card(Five, Club), card(Six, Heart),
            card(King, Diamond), card(Nine, Diamond),
        ]);
        game.bet(ids[0], 10).unwrap();
        game.bet(ids[1], 10).unwrap();
        game.hit(ids[0], 0).unwrap();
        game.stand(ids[1], 0).unwrap();
        let state = game.state();
        assert_eq!(state.players[0].hands[0].status, HandStatus::Bust);
        assert_eq!(state.players[0].round_delta, -10);
        assert_eq!(state.players[1].round_delta, 10);
        assert_eq!(state.dealer_delta, 0);
    }

    #[test]
    fn test_next_round_collects_cards_and_reshuffles() {
        let (mut game, ids) = setup_game(1, vec![card(Ten, Spade), card(Ten, Heart), card(Nine, Club), card(Eight, Heart)]);
        game.bet(ids[0], 10).unwrap();
        game.stand(ids[0], 0).unwrap();
        game.start_round().unwrap();
        let state = game.state();
        assert_eq!(state.round, 2);
        assert!(state.players[0].hands.is_empty());
        // 单副牌发出 4 张后剩余 48 张，不低于 25%，弃牌进入弃牌盒
        assert_eq!(state.discard.len(), 4);
        assert_conserved(&game);

        // 牌靴用完时，发牌会把弃牌盒洗回牌靴
        game.set_deck(Deck::stacked(1, vec![]));
        let mut state = game.state();
        state.discard = crate::card::full_shoe(1);
        game.set_state(state);
        game.bet(ids[0], 10).unwrap();
        assert_conserved(&game);
    }

    #[test]
    fn test_remove_player_only_between_turns() {
        let (mut game, ids) = setup_game(2, vec![
            card(Ten, Spade), card(Nine, Spade), card(Ten, Heart),
            card(Six, Club), card(Seven, Club), card(Eight, Heart),
        ]);
        game.bet(ids[0], 10).unwrap();
        game.bet(ids[1], 10).unwrap();
        assert_eq!(game.remove_player(ids[0]), Err(RuleViolation::WrongPhase));
        game.stand(ids[0], 0).unwrap();
        game.stand(ids[1], 0).unwrap();
        game.remove_player(ids[0]).unwrap();
        assert_eq!(game.state().players.len(), 1);
        assert_conserved(&game);
    }

    #[test]
    fn test_deserialize_rejects_duplicated_card() {
        let (mut game, ids) = setup_game(1, vec![card(Ten, Spade), card(Ten, Heart), card(Nine, Club), card(Eight, Heart)]);
        game.bet(ids[0], 10).unwrap();
        let mut state = game.state();
        state.dealer.push(card(Ten, Spade));
        let corrupt = serde_json::to_string(&crate::engine::EngineSnapshot { state, deck: game.deck().clone() }).unwrap();
        let before = game.state();
        assert!(game.deserialize(&corrupt).is_err());
        assert_eq!(game.state(), before);
    }

    #[test]
    fn test_intent_rejects_unknown_fields() {
        let id = uuid::Uuid::new_v4();
        let ok = format!(r#"{{"type":"hit","player_id":"{}","hand_index":0}}"#, id);
        assert!(serde_json::from_str::<BlackjackIntent>(&ok).is_ok());
        let extra = format!(r#"{{"type":"hit","player_id":"{}","hand_index":0,"amount":5}}"#, id);
        assert!(serde_json::from_str::<BlackjackIntent>(&extra).is_err());
        let unknown = format!(r#"{{"type":"insurance","player_id":"{}"}}"#, id);
        assert!(serde_json::from_str::<BlackjackIntent>(&unknown).is_err());
    }

    #[test]
    fn test_leaving_cannot_trigger_a_short_deal() {
        let (mut game, ids) = setup_game(3, vec![]);
        let short: Vec<Card> = crate::card::full_shoe(1).into_iter().take(5).collect();
        game.set_deck(Deck::stacked(1, short));
        game.bet(ids[0], 10).unwrap();
        game.bet(ids[1], 10).unwrap();
        let before = game.state();

        // 剩下两人加庄家需要 6 张
        assert_eq!(game.remove_player(ids[2]), Err(RuleViolation::OutOfBounds));
        assert_eq!(game.state(), before);
        assert_eq!(game.bet(ids[2], 10), Err(RuleViolation::OutOfBounds));
    }

    #[test]
    fn test_deserialize_rejects_broken_structure() {
        let (mut game, ids) = setup_game(2, vec![
            card(Ten, Spade), card(Nine, Spade), card(Ten, Heart),
            card(Six, Club), card(Seven, Club), card(Eight, Heart),
        ]);
        game.bet(ids[0], 10).unwrap();
        game.bet(ids[1], 10).unwrap();
        let state = game.state();
        assert_eq!(state.current_player, Some(0));

        assert_rejects_state(&mut game, BlackjackState { current_player: Some(5), ..state.clone() });
        assert_rejects_state(&mut game, BlackjackState { current_player: None, ..state.clone() });
        assert_rejects_state(&mut game, BlackjackState { phase: BlackjackPhase::Betting, current_player: None, ..state.clone() });
        let mut bad_hand = state.clone();
        bad_hand.players[0].active_hand = 3;
        assert_rejects_state(&mut game, bad_hand);
        let mut finished = state.clone();
        finished.players[0].hands[0].status = HandStatus::Stood;
        assert_rejects_state(&mut game, finished);

        assert_eq!(BlackjackState { current_player: Some(5), ..state }.current_player_id(), None);
        assert_round_trip(&mut game);
    }
}
