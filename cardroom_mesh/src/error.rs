use cardroom_core::{RuleViolation, SnapshotError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// 发往主机的帧没有送达
    #[error("无法连接到主机")]
    HostUnreachable,

    /// 主机离开了网络，本局无法继续
    #[error("主机已断开")]
    HostDisconnected,

    #[error("操作被拒绝: {0}")]
    Rejected(#[from] RuleViolation),

    #[error("只有主机可以执行该操作")]
    NotHost,

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("消息编码失败: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("会话已结束")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("无法读取配置文件: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置格式错误: {0}")]
    Json(#[from] serde_json::Error),
}
