//! 各游戏的牌力评估。
//!
//! 全部是纯函数：输入一组牌，输出可比较的等级或分数，不触碰任何引擎状态。

pub mod blackjack;
pub mod dummy;
pub mod holdem;
pub mod kang;
pub mod pok_deng;
pub mod slave;
