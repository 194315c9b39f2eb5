use crate::card::Card;
use crate::state::PlayerId;
use thiserror::Error;

/// 规则校验失败的原因。
///
/// 引擎的每个修改方法在拒绝一个意图时返回其中之一，且保证状态没有任何改动。
/// 这些都是预期之内的情况，调用方只需要把它当作"这次操作无效"处理。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("当前阶段不允许该操作")]
    WrongPhase,

    #[error("现在不是玩家 {0} 的回合")]
    NotPlayersTurn(PlayerId),

    #[error("所选的牌不在手中或不构成所声明的组合")]
    InvalidCardSelection,

    #[error("数值超出允许范围")]
    OutOfBounds,

    #[error("不是合法的组合或顺子")]
    IllegalMeldOrRun,

    #[error("未达到操作所需的门槛 (当前 {actual}, 上限 {limit})")]
    ThresholdNotMet { actual: u32, limit: u32 },

    #[error("玩家 {0} 不在桌上")]
    UnknownPlayer(PlayerId),

    #[error("玩家 {0} 已经入座")]
    SeatTaken(PlayerId),

    #[error("桌子已满")]
    TableFull,

    #[error("玩家数量不足")]
    NotEnoughPlayers,

    #[error("该意图不属于当前桌子的游戏")]
    WrongGame,
}

/// 快照无法恢复时的错误。
///
/// 与 [`RuleViolation`] 不同，这类错误意味着数据本身已经损坏，调用方必须上报而不是忽略。
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("快照格式错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("牌张守恒被破坏: {card} 出现 {found} 次, 应为 {expected} 次")]
    CardConservation { card: Card, found: usize, expected: usize },

    #[error("牌张总数错误: 共 {found} 张, 应为 {expected} 张")]
    CardCount { found: usize, expected: usize },

    #[error("牌堆副数不符: 快照为 {found}, 引擎配置为 {expected}")]
    DeckMismatch { found: u8, expected: u8 },

    #[error("快照结构无效: {0}")]
    Invalid(&'static str),
}
