use crate::card::{Card, Deck, verify_conservation};
use crate::error::{RuleViolation, SnapshotError};
use crate::state::{PlayerId, PlayerProfile};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// 所有游戏引擎共享的契约。
///
/// 引擎持有一局的权威状态，校验并应用玩家意图，推进阶段，并在结算时调用对应的牌力评估。
/// 每个修改方法都按同样的顺序检查前置条件：阶段 → 行动资格 → 所选牌 → 数值范围。
/// 任一条件不满足就返回 [`RuleViolation`]，状态保持原样。
pub trait GameEngine {
    type State: Clone + Debug + PartialEq + Serialize + DeserializeOwned;
    type Intent;

    fn add_player(&mut self, profile: PlayerProfile) -> Result<(), RuleViolation>;

    /// 只有在没有进行中的牌局时才能离座
    fn remove_player(&mut self, player_id: PlayerId) -> Result<(), RuleViolation>;

    fn start_round(&mut self) -> Result<(), RuleViolation>;

    fn apply(&mut self, intent: Self::Intent) -> Result<(), RuleViolation>;

    /// 当前状态的深拷贝，调用方拿到的对象与引擎内部不再共享任何可变数据
    fn state(&self) -> Self::State;

    fn set_state(&mut self, state: Self::State);

    fn deck(&self) -> &Deck;

    fn set_deck(&mut self, deck: Deck);

    /// 状态中所有不在牌堆里的牌：手牌、弃牌堆、公共牌、桌面组合等
    fn cards_in_play(state: &Self::State) -> Vec<Card>;

    /// 恢复前的结构检查：座位索引、庄家、阶段与手牌要互相吻合，
    /// 通过检查的状态可以安全地继续 `apply`
    fn validate(&self, state: &Self::State) -> Result<(), SnapshotError>;

    /// 状态加上牌堆中未发出的牌
    fn serialize(&self) -> Result<String, SnapshotError> {
        let snapshot = EngineSnapshot { state: self.state(), deck: self.deck().clone() };
        Ok(serde_json::to_string(&snapshot)?)
    }

    /// 从 [`GameEngine::serialize`] 的结果恢复。校验牌张守恒和状态结构，失败时引擎不变。
    fn deserialize(&mut self, payload: &str) -> Result<(), SnapshotError> {
        let snapshot: EngineSnapshot<Self::State> = serde_json::from_str(payload)?;
        let expected = self.deck().deck_count();
        if snapshot.deck.deck_count() != expected {
            return Err(SnapshotError::DeckMismatch { found: snapshot.deck.deck_count(), expected });
        }
        verify_conservation(&snapshot.deck, &Self::cards_in_play(&snapshot.state))?;
        self.validate(&snapshot.state)?;
        self.set_state(snapshot.state);
        self.set_deck(snapshot.deck);
        Ok(())
    }
}

/// `serialize` 的载荷格式
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSnapshot<S> {
    pub state: S,
    pub deck: Deck,
}

// --- 快照结构检查 ---

pub(crate) fn ensure(ok: bool, reason: &'static str) -> Result<(), SnapshotError> {
    if ok { Ok(()) } else { Err(SnapshotError::Invalid(reason)) }
}

/// 各引擎共有的检查：玩家不重复，当前行动座位在范围内。返回座位数。
pub(crate) fn check_roster<'a>(
    profiles: impl Iterator<Item = &'a PlayerProfile>,
    current_player: Option<usize>,
) -> Result<usize, SnapshotError> {
    let mut ids: Vec<PlayerId> = profiles.map(|p| p.id).collect();
    let n = ids.len();
    ids.sort_unstable();
    ids.dedup();
    ensure(ids.len() == n, "同一玩家占了多个座位")?;
    ensure(current_player.is_none_or(|seat| seat < n), "当前行动座位超出范围")?;
    Ok(n)
}

/// 校验下注金额在 [min, max] 之内
pub(crate) fn check_bet(amount: u32, min: u32, max: u32) -> Result<(), RuleViolation> {
    if amount < min || amount > max {
        return Err(RuleViolation::OutOfBounds);
    }
    Ok(())
}

/// 检查 `wanted` 中的每张牌都在 `hand` 里 (按多重集合计)，返回它们在手牌中的位置
pub(crate) fn locate_cards(hand: &[Card], wanted: &[Card]) -> Result<Vec<usize>, RuleViolation> {
    let mut used = vec![false; hand.len()];
    let mut positions = Vec::with_capacity(wanted.len());
    for card in wanted {
        let pos = hand
            .iter()
            .enumerate()
            .position(|(i, c)| !used[i] && c == card)
            .ok_or(RuleViolation::InvalidCardSelection)?;
        used[pos] = true;
        positions.push(pos);
    }
    Ok(positions)
}

/// 从手牌中按位置移除，位置必须互不相同且有效
pub(crate) fn remove_positions(hand: &mut Vec<Card>, positions: &[usize]) -> Vec<Card> {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let mut removed: Vec<Card> = sorted.into_iter().map(|i| hand.remove(i)).collect();
    removed.reverse();
    removed
}

#[cfg(test)]
pub(crate) mod testing {
    //! 各引擎测试共用的辅助函数

    use super::*;
    use uuid::Uuid;

    pub fn profiles(n: usize) -> Vec<PlayerProfile> {
        (0..n).map(|i| PlayerProfile::new(Uuid::new_v4(), format!("Player_{}", i))).collect()
    }

    /// 序列化再反序列化到同一个引擎，状态不变且守恒检查通过
    pub fn assert_round_trip<E: GameEngine>(engine: &mut E) {
        let before = engine.state();
        let payload = engine.serialize().unwrap();
        engine.deserialize(&payload).unwrap();
        assert_eq!(engine.state(), before);
    }

    pub fn assert_conserved<E: GameEngine>(engine: &E) {
        let state = engine.state();
        verify_conservation(engine.deck(), &E::cards_in_play(&state)).unwrap();
    }

    /// 牌张守恒但结构错误的状态必须被拒绝，引擎保持原样
    pub fn assert_rejects_state<E: GameEngine>(engine: &mut E, state: E::State) {
        let before = engine.state();
        let payload = serde_json::to_string(&EngineSnapshot { state, deck: engine.deck().clone() }).unwrap();
        assert!(matches!(engine.deserialize(&payload), Err(SnapshotError::Invalid(_))));
        assert_eq!(engine.state(), before);
    }
}
