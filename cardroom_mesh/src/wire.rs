use cardroom_core::{GameIntent, GameSnapshot, PlayerProfile};
use serde::{Deserialize, Serialize};

/// 节点之间传输的消息，以 JSON 文本发送
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum WireMessage {
    // --- 对端 -> 主机 ---
    /// 请求入座，`profile.id` 必须是发送方自己
    Join { profile: PlayerProfile },
    /// 离座
    Leave,
    Intent { intent: GameIntent },

    // --- 主机 -> 对端 ---
    /// 完整状态，`revision` 每次变化递增
    Snapshot { revision: u64, snapshot: GameSnapshot },
}

impl WireMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(payload: &str) -> Result<WireMessage, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
