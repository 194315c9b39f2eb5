//! # 主机权威的状态复制
//!
//! 桌上只有一个主机节点持有真正的游戏引擎。其他节点把玩家意图发给主机，
//! 主机逐条校验应用，每次状态变化后把完整快照广播给所有节点。
//!
//! 传输层只需实现 [`Transport`]；[`LocalMesh`] 是同一进程内的实现，供测试和演示使用。

mod config;
mod coordinator;
mod error;
mod session;
mod transport;
mod wire;

pub use config::SessionConfig;
pub use coordinator::{Coordinator, TableView};
pub use error::{ConfigError, SessionError};
pub use session::{Session, SessionHandle};
pub use transport::{ConnectionEvent, Envelope, LocalMesh, LocalTransport, PeerId, Transport};
pub use wire::WireMessage;
