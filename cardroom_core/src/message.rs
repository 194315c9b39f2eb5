use crate::games::blackjack::{BlackjackIntent, BlackjackState};
use crate::games::dummy::{DummyIntent, DummyState};
use crate::games::holdem::{HoldemIntent, HoldemState};
use crate::games::kang::{KangIntent, KangState};
use crate::games::pok_deng::{PokDengIntent, PokDengState};
use crate::games::slave::{SlaveIntent, SlaveState};
use crate::state::{GameKind, PlayerId};
use serde::{Deserialize, Serialize};

// --- 玩家 -> 主机 的意图 ---
// 外层按游戏区分，内层按意图类型区分；未知的游戏、类型或字段在反序列化时直接报错。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "game", content = "intent", rename_all = "snake_case", deny_unknown_fields)]
pub enum GameIntent {
    Blackjack(BlackjackIntent),
    Kang(KangIntent),
    Dummy(DummyIntent),
    PokDeng(PokDengIntent),
    Slave(SlaveIntent),
    Holdem(HoldemIntent),
}

impl GameIntent {
    /// 发起该意图的玩家，主机用它与发送方比对
    pub fn player_id(&self) -> PlayerId {
        match self {
            GameIntent::Blackjack(intent) => intent.player_id(),
            GameIntent::Kang(intent) => intent.player_id(),
            GameIntent::Dummy(intent) => intent.player_id(),
            GameIntent::PokDeng(intent) => intent.player_id(),
            GameIntent::Slave(intent) => intent.player_id(),
            GameIntent::Holdem(intent) => intent.player_id(),
        }
    }

    pub fn kind(&self) -> GameKind {
        match self {
            GameIntent::Blackjack(_) => GameKind::Blackjack,
            GameIntent::Kang(_) => GameKind::Kang,
            GameIntent::Dummy(_) => GameKind::Dummy,
            GameIntent::PokDeng(_) => GameKind::PokDeng,
            GameIntent::Slave(_) => GameKind::Slave,
            GameIntent::Holdem(_) => GameKind::Holdem,
        }
    }
}

// --- 主机 -> 所有对端 的状态快照 ---
// 不含牌堆，对端只读不写。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "game", content = "state", rename_all = "snake_case")]
pub enum GameSnapshot {
    Blackjack(BlackjackState),
    Kang(KangState),
    Dummy(DummyState),
    PokDeng(PokDengState),
    Slave(SlaveState),
    Holdem(HoldemState),
}

impl GameSnapshot {
    pub fn kind(&self) -> GameKind {
        match self {
            GameSnapshot::Blackjack(_) => GameKind::Blackjack,
            GameSnapshot::Kang(_) => GameKind::Kang,
            GameSnapshot::Dummy(_) => GameKind::Dummy,
            GameSnapshot::PokDeng(_) => GameKind::PokDeng,
            GameSnapshot::Slave(_) => GameKind::Slave,
            GameSnapshot::Holdem(_) => GameKind::Holdem,
        }
    }

    /// 按座位顺序排列的玩家ID
    pub fn player_ids(&self) -> Vec<PlayerId> {
        match self {
            GameSnapshot::Blackjack(s) => s.players.iter().map(|p| p.profile.id).collect(),
            GameSnapshot::Kang(s) => s.players.iter().map(|p| p.profile.id).collect(),
            GameSnapshot::Dummy(s) => s.players.iter().map(|p| p.profile.id).collect(),
            GameSnapshot::PokDeng(s) => s.players.iter().map(|p| p.profile.id).collect(),
            GameSnapshot::Slave(s) => s.players.iter().map(|p| p.profile.id).collect(),
            GameSnapshot::Holdem(s) => s.players.iter().map(|p| p.profile.id).collect(),
        }
    }

    pub fn current_player_id(&self) -> Option<PlayerId> {
        match self {
            GameSnapshot::Blackjack(s) => s.current_player_id(),
            GameSnapshot::Kang(s) => s.current_player_id(),
            GameSnapshot::Dummy(s) => s.current_player_id(),
            GameSnapshot::PokDeng(s) => s.current_player_id(),
            GameSnapshot::Slave(s) => s.current_player_id(),
            GameSnapshot::Holdem(s) => s.current_player_id(),
        }
    }

    pub fn round(&self) -> u32 {
        match self {
            GameSnapshot::Blackjack(s) => s.round,
            GameSnapshot::Kang(s) => s.round,
            GameSnapshot::Dummy(s) => s.round,
            GameSnapshot::PokDeng(s) => s.round,
            GameSnapshot::Slave(s) => s.round,
            GameSnapshot::Holdem(s) => s.round,
        }
    }
}
