use crate::config::SessionConfig;
use crate::coordinator::{Coordinator, TableView};
use crate::error::SessionError;
use crate::transport::{ConnectionEvent, Envelope, PeerId, Transport};
use cardroom_core::{GameIntent, PlayerId, PlayerProfile};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

type Reply<R> = oneshot::Sender<Result<R, SessionError>>;

/// 会话所有者发给事件循环的命令
enum Command {
    Submit(GameIntent, Reply<()>),
    StartRound(Reply<()>),
    SetDealer(PlayerId, Reply<()>),
    Save(Reply<String>),
    Restore(String, Reply<()>),
    Leave(Reply<()>),
}

/// 单个节点的事件循环。
///
/// 本地命令、网络帧和连接变化都在同一个任务里逐个处理，协调器不需要任何锁。
pub struct Session<T: Transport> {
    coordinator: Coordinator<T>,
    commands: UnboundedReceiver<Command>,
    messages: UnboundedReceiver<Envelope>,
    connections: UnboundedReceiver<ConnectionEvent>,
}

impl<T: Transport> Session<T> {
    /// 以主机身份开桌，返回控制句柄
    pub fn host(transport: T, profile: PlayerProfile, config: &SessionConfig) -> Result<SessionHandle, SessionError> {
        // 先订阅，再对外可见
        let messages = transport.on_message();
        let connections = transport.on_connection_change();
        let coordinator = Coordinator::host(transport, profile, config)?;
        Ok(Self::spawn(coordinator, messages, connections))
    }

    /// 加入 `host_id` 主持的桌子
    pub fn join(transport: T, profile: PlayerProfile, host_id: PeerId) -> Result<SessionHandle, SessionError> {
        let messages = transport.on_message();
        let connections = transport.on_connection_change();
        let coordinator = Coordinator::peer(transport, profile, host_id)?;
        Ok(Self::spawn(coordinator, messages, connections))
    }

    fn spawn(
        coordinator: Coordinator<T>,
        messages: UnboundedReceiver<Envelope>,
        connections: UnboundedReceiver<ConnectionEvent>,
    ) -> SessionHandle {
        let (tx, commands) = unbounded_channel();
        let player_id = coordinator.player_id();
        let is_host = coordinator.is_host();
        let view = coordinator.subscribe();
        let session = Session { coordinator, commands, messages, connections };
        SessionHandle { player_id, is_host, commands: tx, view, task: tokio::spawn(session.run()) }
    }

    async fn run(mut self) -> Result<(), SessionError> {
        let player_id = self.coordinator.player_id();
        let result = loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if self.execute(command) {
                            break Ok(());
                        }
                    }
                    // 句柄已全部丢弃
                    None => break Ok(()),
                },
                Some(envelope) = self.messages.recv() => {
                    if let Err(e) = self.coordinator.handle_frame(envelope) {
                        break Err(e);
                    }
                }
                Some(event) = self.connections.recv() => {
                    if let Err(e) = self.coordinator.handle_connection(event) {
                        break Err(e);
                    }
                }
            }
        };
        match &result {
            Ok(()) => info!("节点 {} 的会话结束", player_id),
            Err(e) => warn!("节点 {} 的会话异常结束: {}", player_id, e),
        }
        result
    }

    /// 返回 `true` 表示会话应当结束
    fn execute(&mut self, command: Command) -> bool {
        match command {
            Command::Submit(intent, reply) => {
                let _ = reply.send(self.coordinator.submit(intent));
            }
            Command::StartRound(reply) => {
                let _ = reply.send(self.coordinator.start_round());
            }
            Command::SetDealer(player_id, reply) => {
                let _ = reply.send(self.coordinator.set_dealer(player_id));
            }
            Command::Save(reply) => {
                let _ = reply.send(self.coordinator.save());
            }
            Command::Restore(payload, reply) => {
                let _ = reply.send(self.coordinator.restore(&payload));
            }
            Command::Leave(reply) => {
                let _ = reply.send(self.coordinator.leave());
                return true;
            }
        }
        false
    }
}

/// 会话所有者 (界面层) 持有的句柄。
///
/// 最新的桌面状态通过 `watch` 通道读取，丢弃句柄会结束会话。
pub struct SessionHandle {
    player_id: PlayerId,
    is_host: bool,
    commands: UnboundedSender<Command>,
    view: watch::Receiver<Option<TableView>>,
    task: JoinHandle<Result<(), SessionError>>,
}

impl SessionHandle {
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn view(&self) -> watch::Receiver<Option<TableView>> {
        self.view.clone()
    }

    pub fn latest(&self) -> Option<TableView> {
        self.view.borrow().clone()
    }

    /// 等到视图满足条件
    pub async fn wait_for(&self, mut condition: impl FnMut(&TableView) -> bool) -> Result<TableView, SessionError> {
        let mut view = self.view.clone();
        let current = view
            .wait_for(|v| v.as_ref().is_some_and(&mut condition))
            .await
            .map_err(|_| SessionError::Closed)?;
        current.clone().ok_or(SessionError::Closed)
    }

    /// 主机会立即给出规则校验的结果；其他节点只保证意图已经发出
    pub async fn submit(&self, intent: GameIntent) -> Result<(), SessionError> {
        self.request(|reply| Command::Submit(intent, reply)).await
    }

    pub async fn start_round(&self) -> Result<(), SessionError> {
        self.request(Command::StartRound).await
    }

    pub async fn set_dealer(&self, player_id: PlayerId) -> Result<(), SessionError> {
        self.request(|reply| Command::SetDealer(player_id, reply)).await
    }

    pub async fn save(&self) -> Result<String, SessionError> {
        self.request(Command::Save).await
    }

    pub async fn restore(&self, payload: String) -> Result<(), SessionError> {
        self.request(|reply| Command::Restore(payload, reply)).await
    }

    /// 离开并等待会话结束
    pub async fn leave(self) -> Result<(), SessionError> {
        self.request(Command::Leave).await?;
        self.finished().await
    }

    /// 等待事件循环退出，返回其结果
    pub async fn finished(self) -> Result<(), SessionError> {
        self.task.await.unwrap_or(Err(SessionError::Closed))
    }

    async fn request<R>(&self, make: impl FnOnce(Reply<R>) -> Command) -> Result<R, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(make(tx)).map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }
}
