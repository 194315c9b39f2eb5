//! # 纸牌游戏核心逻辑库
//!
//! 这个 `core` crate 包含六种纸牌游戏 (21点、Kang、Dummy、博登、奴隶、德州扑克) 的
//! 规则引擎、牌力评估、状态快照，以及玩家意图与状态广播的消息定义。
//! 它不做任何 I/O，网络同步交给 `cardroom_mesh`，界面交给上层应用。

pub mod card;
pub mod engine;
pub mod error;
pub mod eval;
pub mod games;
mod message;
mod state;
mod table;

pub use card::{Card, CardParseError, Deck, Rank, Suit};
pub use engine::GameEngine;
pub use error::{RuleViolation, SnapshotError};

pub use message::*;

pub use state::*;

pub use table::*;
