use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 稳定的对端标识，也是玩家在所有游戏状态中的主键。
/// 玩家在列表中的位置不一定与加入顺序一致，任何查找都应以此为准。
pub type PlayerId = Uuid;

/// 身份信息，由外部的资料模块在入座时提供，核心只读不写
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub display_name: String,
    pub avatar: Option<String>,
}

impl PlayerProfile {
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        PlayerProfile { id, display_name: display_name.into(), avatar: None }
    }
}

/// 本系统支持的游戏
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Blackjack,
    Kang,
    Dummy,
    PokDeng,
    Slave,
    Holdem,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            GameKind::Blackjack => "21点",
            GameKind::Kang => "Kang",
            GameKind::Dummy => "Dummy",
            GameKind::PokDeng => "博登 (Pok Deng)",
            GameKind::Slave => "奴隶 (Slave)",
            GameKind::Holdem => "德州扑克",
        })
    }
}

/// 按座位顺序从 `from` 的下一个位置开始，找到第一个满足条件的座位 (最多绕一圈，不含 `from` 本身)
pub fn next_seat(from: usize, len: usize, mut eligible: impl FnMut(usize) -> bool) -> Option<usize> {
    (1..=len).map(|step| (from + step) % len).find(|&idx| idx != from && eligible(idx))
}
