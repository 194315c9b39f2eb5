use cardroom_core::PlayerId;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

/// 网络层的节点标识，与该节点上玩家的 [`PlayerId`] 相同
pub type PeerId = PlayerId;

/// 收到的一帧原始数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: PeerId,
    pub payload: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected(PeerId),
    Disconnected(PeerId),
}

/// 复制层依赖的传输契约。
///
/// 投递是尽力而为的：同一发送方的帧按顺序到达，不同发送方之间没有顺序保证。
/// 订阅返回接收端，丢弃接收端即取消订阅。
pub trait Transport: Send + 'static {
    fn local_id(&self) -> PeerId;

    /// 对方当前可达时返回 `true`
    fn send(&self, to: PeerId, payload: String) -> bool;

    fn broadcast(&self, payload: String, exclude: Option<PeerId>);

    fn on_message(&self) -> UnboundedReceiver<Envelope>;

    fn on_connection_change(&self) -> UnboundedReceiver<ConnectionEvent>;
}

// --- 进程内传输 ---

/// 每个信箱最多暂存的条数，超出时丢弃最旧的
const BACKLOG_LIMIT: usize = 256;

/// 还没有订阅者时收到的内容先暂存，第一个订阅者会收到积压中最新的 [`BACKLOG_LIMIT`] 条
struct Mailbox<T> {
    subscribers: Vec<UnboundedSender<T>>,
    backlog: VecDeque<T>,
}

impl<T: Clone> Mailbox<T> {
    fn new() -> Self {
        Mailbox { subscribers: Vec::new(), backlog: VecDeque::new() }
    }

    fn deliver(&mut self, item: T) {
        self.subscribers.retain(|tx| !tx.is_closed());
        if self.subscribers.is_empty() {
            if self.backlog.len() == BACKLOG_LIMIT {
                self.backlog.pop_front();
                debug!("信箱积压已满，丢弃最旧的一条");
            }
            self.backlog.push_back(item);
            return;
        }
        for tx in &self.subscribers {
            let _ = tx.send(item.clone());
        }
    }

    fn subscribe(&mut self) -> UnboundedReceiver<T> {
        let (tx, rx) = unbounded_channel();
        for item in self.backlog.drain(..) {
            let _ = tx.send(item);
        }
        self.subscribers.push(tx);
        rx
    }
}

struct Endpoint {
    messages: Mailbox<Envelope>,
    connections: Mailbox<ConnectionEvent>,
}

/// 同一进程内的一组节点，所有节点两两直连。
///
/// 用于测试和终端演示；克隆出来的句柄指向同一张网。
#[derive(Clone, Default)]
pub struct LocalMesh {
    endpoints: Arc<DashMap<PeerId, Endpoint>>,
}

impl LocalMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入网络。已连接的节点会收到 `Connected`，新节点也会收到每个已有节点的 `Connected`。
    pub fn connect(&self, peer_id: PeerId) -> LocalTransport {
        let existing: Vec<PeerId> = self.endpoints.iter().map(|e| *e.key()).filter(|id| *id != peer_id).collect();
        for id in &existing {
            if let Some(mut endpoint) = self.endpoints.get_mut(id) {
                endpoint.connections.deliver(ConnectionEvent::Connected(peer_id));
            }
        }

        let mut endpoint = Endpoint { messages: Mailbox::new(), connections: Mailbox::new() };
        for id in existing {
            endpoint.connections.deliver(ConnectionEvent::Connected(id));
        }
        self.endpoints.insert(peer_id, endpoint);
        debug!("节点 {} 已接入", peer_id);

        LocalTransport { id: peer_id, mesh: self.clone() }
    }

    /// 模拟网络断开：节点从网络中消失，其他节点收到 `Disconnected`
    pub fn sever(&self, peer_id: PeerId) {
        if self.endpoints.remove(&peer_id).is_none() {
            return;
        }
        debug!("节点 {} 已断开", peer_id);
        for mut endpoint in self.endpoints.iter_mut() {
            endpoint.connections.deliver(ConnectionEvent::Disconnected(peer_id));
        }
    }

    pub fn is_connected(&self, peer_id: PeerId) -> bool {
        self.endpoints.contains_key(&peer_id)
    }

    fn deliver(&self, from: PeerId, to: PeerId, payload: String) -> bool {
        match self.endpoints.get_mut(&to) {
            Some(mut endpoint) => {
                endpoint.messages.deliver(Envelope { from, payload });
                true
            }
            None => false,
        }
    }
}

/// [`LocalMesh`] 上的一个节点，丢弃即断开
pub struct LocalTransport {
    id: PeerId,
    mesh: LocalMesh,
}

impl Transport for LocalTransport {
    fn local_id(&self) -> PeerId {
        self.id
    }

    fn send(&self, to: PeerId, payload: String) -> bool {
        // 已经被断开的节点什么也发不出去
        self.mesh.is_connected(self.id) && self.mesh.deliver(self.id, to, payload)
    }

    fn broadcast(&self, payload: String, exclude: Option<PeerId>) {
        if !self.mesh.is_connected(self.id) {
            return;
        }
        let targets: Vec<PeerId> = self
            .mesh
            .endpoints
            .iter()
            .map(|e| *e.key())
            .filter(|id| *id != self.id && Some(*id) != exclude)
            .collect();
        for to in targets {
            self.mesh.deliver(self.id, to, payload.clone());
        }
    }

    fn on_message(&self) -> UnboundedReceiver<Envelope> {
        match self.mesh.endpoints.get_mut(&self.id) {
            Some(mut endpoint) => endpoint.messages.subscribe(),
            // 已断开：返回一个立即结束的接收端
            None => unbounded_channel().1,
        }
    }

    fn on_connection_change(&self) -> UnboundedReceiver<ConnectionEvent> {
        match self.mesh.endpoints.get_mut(&self.id) {
            Some(mut endpoint) => endpoint.connections.subscribe(),
            None => unbounded_channel().1,
        }
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.mesh.sever(self.id);
    }
}
