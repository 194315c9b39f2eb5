//! 六个游戏引擎，全部实现 [`crate::engine::GameEngine`]。

pub mod blackjack;
pub mod dummy;
pub mod holdem;
pub mod kang;
pub mod pok_deng;
pub mod slave;

use crate::error::RuleViolation;
use crate::state::{PlayerId, PlayerProfile};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// 配置了种子时结果可复现，否则从操作系统取随机源
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// 入座前的通用检查：不能重复入座，不能超过人数上限
pub(crate) fn check_can_seat<'a>(
    mut seated: impl Iterator<Item = &'a PlayerProfile>,
    count: usize,
    max_players: usize,
    profile: &PlayerProfile,
) -> Result<(), RuleViolation> {
    if seated.any(|p| p.id == profile.id) {
        return Err(RuleViolation::SeatTaken(profile.id));
    }
    if count >= max_players {
        return Err(RuleViolation::TableFull);
    }
    Ok(())
}

pub(crate) fn seat_of<'a>(
    mut seated: impl Iterator<Item = &'a PlayerProfile>,
    player_id: PlayerId,
) -> Result<usize, RuleViolation> {
    seated.position(|p| p.id == player_id).ok_or(RuleViolation::UnknownPlayer(player_id))
}
