use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::transport::{ConnectionEvent, Envelope, PeerId, Transport};
use crate::wire::WireMessage;
use cardroom_core::{GameIntent, GameSnapshot, PlayerId, PlayerProfile, RuleViolation, Table};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 某个版本的桌面状态，渲染层只读
#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub revision: u64,
    pub snapshot: GameSnapshot,
}

enum Role {
    /// 唯一持有权威状态的节点
    Host { table: Table },
    /// 只保存主机广播来的镜像
    Peer { host_id: PeerId },
}

/// 复制协调器。
///
/// 主机逐条应用意图，每次状态变化后广播完整快照；其他节点把意图转发给主机，
/// 只接受来自主机、版本更新的快照。所有方法都是同步的，由 [`crate::Session`] 的事件循环驱动。
pub struct Coordinator<T: Transport> {
    transport: T,
    profile: PlayerProfile,
    role: Role,
    revision: u64,
    view: watch::Sender<Option<TableView>>,
    /// 已断开但当时不能离座的节点，每次广播后重试
    departed: Vec<PeerId>,
}

impl<T: Transport> Coordinator<T> {
    /// 开桌并入座，主机自己也是玩家
    pub fn host(transport: T, profile: PlayerProfile, config: &SessionConfig) -> Result<Self, SessionError> {
        let mut table = Table::new(config.game.clone());
        table.add_player(profile.clone())?;
        info!("{} 在 {} 桌开桌", profile.display_name, table.kind());

        let (view, _) = watch::channel(None);
        let mut coordinator = Coordinator {
            transport,
            profile,
            role: Role::Host { table },
            revision: 0,
            view,
            departed: Vec::new(),
        };
        coordinator.publish()?;
        Ok(coordinator)
    }

    /// 连接到主机并请求入座
    pub fn peer(transport: T, profile: PlayerProfile, host_id: PeerId) -> Result<Self, SessionError> {
        let (view, _) = watch::channel(None);
        let coordinator = Coordinator {
            transport,
            profile,
            role: Role::Peer { host_id },
            revision: 0,
            view,
            departed: Vec::new(),
        };
        coordinator.send_to_host(&WireMessage::Join { profile: coordinator.profile.clone() })?;
        Ok(coordinator)
    }

    pub fn is_host(&self) -> bool {
        matches!(self.role, Role::Host { .. })
    }

    pub fn player_id(&self) -> PlayerId {
        self.profile.id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn view(&self) -> Option<TableView> {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<TableView>> {
        self.view.subscribe()
    }

    // --- 本地玩家的操作 ---

    /// 主机直接应用；其他节点转发给主机，不修改本地镜像
    pub fn submit(&mut self, intent: GameIntent) -> Result<(), SessionError> {
        if intent.player_id() != self.profile.id {
            return Err(RuleViolation::NotPlayersTurn(intent.player_id()).into());
        }
        if self.is_host() {
            self.table_mut()?.apply(intent)?;
            self.publish()
        } else {
            self.send_to_host(&WireMessage::Intent { intent })
        }
    }

    pub fn start_round(&mut self) -> Result<(), SessionError> {
        self.table_mut()?.start_round()?;
        self.publish()
    }

    pub fn set_dealer(&mut self, player_id: PlayerId) -> Result<(), SessionError> {
        self.table_mut()?.set_dealer(player_id)?;
        info!("庄家换为 {}", player_id);
        self.publish()
    }

    /// 导出完整的权威状态 (含牌堆)
    pub fn save(&self) -> Result<String, SessionError> {
        match &self.role {
            Role::Host { table } => Ok(table.serialize()?),
            Role::Peer { .. } => Err(SessionError::NotHost),
        }
    }

    /// 从 [`Coordinator::save`] 的结果恢复并广播
    pub fn restore(&mut self, payload: &str) -> Result<(), SessionError> {
        self.table_mut()?.deserialize(payload)?;
        info!("已从存档恢复");
        self.publish()
    }

    pub fn leave(&mut self) -> Result<(), SessionError> {
        match self.role {
            Role::Host { .. } => Ok(()),
            Role::Peer { .. } => self.send_to_host(&WireMessage::Leave),
        }
    }

    // --- 网络事件 ---

    /// 无法解析的帧记录后丢弃
    pub fn handle_frame(&mut self, envelope: Envelope) -> Result<(), SessionError> {
        let message = match WireMessage::decode(&envelope.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("丢弃来自 {} 的无法解析的消息: {}", envelope.from, e);
                return Ok(());
            }
        };
        match self.role {
            Role::Host { .. } => self.host_message(envelope.from, message),
            Role::Peer { host_id } => {
                self.peer_message(host_id, envelope.from, message);
                Ok(())
            }
        }
    }

    /// 主机断开对其他节点是致命的
    pub fn handle_connection(&mut self, event: ConnectionEvent) -> Result<(), SessionError> {
        let host_id = match self.role {
            Role::Host { .. } => None,
            Role::Peer { host_id } => Some(host_id),
        };
        match (host_id, event) {
            (None, ConnectionEvent::Connected(peer)) => {
                self.departed.retain(|p| *p != peer);
                self.send_view(peer)
            }
            (None, ConnectionEvent::Disconnected(peer)) => match self.table_mut()?.remove_player(peer) {
                Ok(()) => {
                    info!("玩家 {} 断开，已离座", peer);
                    self.publish()
                }
                Err(RuleViolation::UnknownPlayer(_)) => Ok(()),
                Err(e) => {
                    info!("玩家 {} 断开，但暂时不能离座: {}", peer, e);
                    if !self.departed.contains(&peer) {
                        self.departed.push(peer);
                    }
                    Ok(())
                }
            },
            (Some(host_id), ConnectionEvent::Disconnected(peer)) if host_id == peer => {
                warn!("主机 {} 已断开", peer);
                Err(SessionError::HostDisconnected)
            }
            (Some(_), _) => Ok(()),
        }
    }

    fn host_message(&mut self, from: PeerId, message: WireMessage) -> Result<(), SessionError> {
        let table = self.table_mut()?;
        match message {
            WireMessage::Join { profile } => {
                if profile.id != from {
                    warn!("节点 {} 试图以 {} 的身份入座", from, profile.id);
                    return Ok(());
                }
                let name = profile.display_name.clone();
                match table.add_player(profile) {
                    Ok(()) => {
                        info!("玩家 {} ({}) 入座", name, from);
                        self.publish()
                    }
                    // 重连的玩家只需要最新状态
                    Err(RuleViolation::SeatTaken(_)) => {
                        self.departed.retain(|p| *p != from);
                        self.send_view(from)
                    }
                    Err(_) => Ok(()),
                }
            }
            WireMessage::Leave => match table.remove_player(from) {
                Ok(()) => {
                    info!("玩家 {} 离座", from);
                    self.publish()
                }
                Err(_) => Ok(()),
            },
            WireMessage::Intent { intent } => {
                if intent.player_id() != from {
                    warn!("节点 {} 试图替 {} 提交意图", from, intent.player_id());
                    return Ok(());
                }
                let kind = intent.kind();
                match table.apply(intent) {
                    Ok(()) => {
                        info!("接受玩家 {} 的 {} 意图", from, kind);
                        self.publish()
                    }
                    Err(_) => Ok(()),
                }
            }
            WireMessage::Snapshot { .. } => {
                warn!("主机忽略来自 {} 的快照", from);
                Ok(())
            }
        }
    }

    fn peer_message(&mut self, host_id: PeerId, from: PeerId, message: WireMessage) {
        let WireMessage::Snapshot { revision, snapshot } = message else {
            warn!("忽略来自 {} 的非快照消息", from);
            return;
        };
        if from != host_id {
            warn!("忽略来自非主机节点 {} 的快照", from);
            return;
        }
        if revision <= self.revision {
            debug!("丢弃过期的快照 {} (当前 {})", revision, self.revision);
            return;
        }
        self.revision = revision;
        self.view.send_replace(Some(TableView { revision, snapshot }));
    }

    fn table_mut(&mut self) -> Result<&mut Table, SessionError> {
        match &mut self.role {
            Role::Host { table } => Ok(table),
            Role::Peer { .. } => Err(SessionError::NotHost),
        }
    }

    /// 广播当前状态，之后让断开的玩家离座，有人离座就再广播一次
    fn publish(&mut self) -> Result<(), SessionError> {
        self.broadcast_snapshot()?;
        if self.sweep_departed()? {
            self.broadcast_snapshot()?;
        }
        Ok(())
    }

    /// 返回是否有玩家离座
    fn sweep_departed(&mut self) -> Result<bool, SessionError> {
        if self.departed.is_empty() {
            return Ok(false);
        }
        let pending = std::mem::take(&mut self.departed);
        let table = self.table_mut()?;
        let mut removed = false;
        let mut still_seated = Vec::new();
        for peer in pending {
            match table.remove_player(peer) {
                Ok(()) => {
                    info!("断开的玩家 {} 已离座", peer);
                    removed = true;
                }
                Err(RuleViolation::UnknownPlayer(_)) => {}
                Err(_) => still_seated.push(peer),
            }
        }
        self.departed = still_seated;
        Ok(removed)
    }

    /// 版本号加一，广播并更新本地视图
    fn broadcast_snapshot(&mut self) -> Result<(), SessionError> {
        let snapshot = self.table_mut()?.snapshot();
        self.revision += 1;
        let message = WireMessage::Snapshot { revision: self.revision, snapshot };
        self.transport.broadcast(message.encode()?, None);
        if let WireMessage::Snapshot { revision, snapshot } = message {
            self.view.send_replace(Some(TableView { revision, snapshot }));
        }
        Ok(())
    }

    /// 把当前视图单独发给一个节点
    fn send_view(&self, to: PeerId) -> Result<(), SessionError> {
        let Some(view) = self.view() else {
            return Ok(());
        };
        let message = WireMessage::Snapshot { revision: view.revision, snapshot: view.snapshot };
        if !self.transport.send(to, message.encode()?) {
            debug!("节点 {} 已不可达", to);
        }
        Ok(())
    }

    fn send_to_host(&self, message: &WireMessage) -> Result<(), SessionError> {
        let Role::Peer { host_id } = self.role else {
            return Err(SessionError::NotHost);
        };
        if self.transport.send(host_id, message.encode()?) {
            Ok(())
        } else {
            Err(SessionError::HostUnreachable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LocalMesh, LocalTransport};
    use cardroom_core::games::kang::{KangIntent, KangPhase};
    use cardroom_core::{GameKind, TableConfig};
    use tokio::sync::mpsc::UnboundedReceiver;
    use uuid::Uuid;

    fn profile(name: &str) -> PlayerProfile {
        PlayerProfile::new(Uuid::new_v4(), name)
    }

    fn kang_config() -> SessionConfig {
        let mut config = SessionConfig::for_game(GameKind::Kang);
        if let TableConfig::Kang(c) = &mut config.game {
            c.seed = Some(3);
        }
        config
    }

    fn frame(from: PeerId, message: &WireMessage) -> Envelope {
        Envelope { from, payload: message.encode().unwrap() }
    }

    fn drain_snapshots(rx: &mut UnboundedReceiver<Envelope>) -> Vec<u64> {
        let mut revisions = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            if let Ok(WireMessage::Snapshot { revision, .. }) = WireMessage::decode(&envelope.payload) {
                revisions.push(revision);
            }
        }
        revisions
    }

    /// 主机加一个已入座的对端 (对端用裸传输模拟)
    fn host_with_peer(mesh: &LocalMesh) -> (Coordinator<LocalTransport>, PlayerProfile, LocalTransport) {
        let host = profile("host");
        let mut coordinator = Coordinator::host(mesh.connect(host.id), host, &kang_config()).unwrap();
        let guest = profile("guest");
        let transport = mesh.connect(guest.id);
        coordinator.handle_frame(frame(guest.id, &WireMessage::Join { profile: guest.clone() })).unwrap();
        (coordinator, guest, transport)
    }

    fn kang_phase(coordinator: &Coordinator<LocalTransport>) -> KangPhase {
        match coordinator.view().unwrap().snapshot {
            GameSnapshot::Kang(state) => state.phase,
            other => panic!("快照类型错误: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_host_seats_joiner_and_broadcasts() {
        let mesh = LocalMesh::new();
        let (coordinator, guest, transport) = host_with_peer(&mesh);
        let mut inbox = transport.on_message();

        let view = coordinator.view().unwrap();
        assert_eq!(view.revision, 2);
        assert_eq!(view.snapshot.player_ids(), vec![coordinator.player_id(), guest.id]);
        assert_eq!(drain_snapshots(&mut inbox), vec![2]);
    }

    #[test]
    fn test_host_rejects_impersonation() {
        let mesh = LocalMesh::new();
        let (mut coordinator, guest, _transport) = host_with_peer(&mesh);
        let intruder = profile("intruder");
        let _intruder_transport = mesh.connect(intruder.id);

        // 冒充别人入座
        coordinator.handle_frame(frame(intruder.id, &WireMessage::Join { profile: profile("fake") })).unwrap();
        assert_eq!(coordinator.revision(), 2);

        coordinator.start_round().unwrap();
        assert_eq!(coordinator.revision(), 3);

        // 替别人下注
        let spoofed = GameIntent::Kang(KangIntent::Bet { player_id: guest.id, amount: 20 });
        coordinator.handle_frame(frame(intruder.id, &WireMessage::Intent { intent: spoofed.clone() })).unwrap();
        assert_eq!(coordinator.revision(), 3);

        coordinator.handle_frame(frame(guest.id, &WireMessage::Intent { intent: spoofed })).unwrap();
        assert_eq!(coordinator.revision(), 4);
    }

    #[test]
    fn test_rejected_intent_is_not_broadcast() {
        let mesh = LocalMesh::new();
        let (mut coordinator, guest, transport) = host_with_peer(&mesh);
        let mut inbox = transport.on_message();
        drain_snapshots(&mut inbox);

        // 还没开局
        let bet = GameIntent::Kang(KangIntent::Bet { player_id: guest.id, amount: 20 });
        coordinator.handle_frame(frame(guest.id, &WireMessage::Intent { intent: bet })).unwrap();
        assert_eq!(coordinator.revision(), 2);
        assert!(drain_snapshots(&mut inbox).is_empty());

        let own_deal = GameIntent::Kang(KangIntent::Deal { player_id: coordinator.player_id() });
        assert!(matches!(
            coordinator.submit(own_deal),
            Err(SessionError::Rejected(RuleViolation::WrongPhase))
        ));
        assert_eq!(coordinator.revision(), 2);
    }

    #[test]
    fn test_garbage_and_snapshots_ignored_by_host() {
        let mesh = LocalMesh::new();
        let (mut coordinator, guest, _transport) = host_with_peer(&mesh);
        coordinator.handle_frame(Envelope { from: guest.id, payload: "{\"type\":\"nope\"}".to_string() }).unwrap();
        let fake = WireMessage::Snapshot { revision: 99, snapshot: coordinator.view().unwrap().snapshot };
        coordinator.handle_frame(frame(guest.id, &fake)).unwrap();
        assert_eq!(coordinator.revision(), 2);
    }

    #[test]
    fn test_new_connection_receives_current_view() {
        let mesh = LocalMesh::new();
        let (mut coordinator, _guest, _transport) = host_with_peer(&mesh);
        let late = Uuid::new_v4();
        let late_transport = mesh.connect(late);
        let mut inbox = late_transport.on_message();
        coordinator.handle_connection(ConnectionEvent::Connected(late)).unwrap();
        assert_eq!(drain_snapshots(&mut inbox), vec![2]);
    }

    #[test]
    fn test_disconnect_removes_player_only_between_rounds() {
        let mesh = LocalMesh::new();
        let (mut coordinator, guest, _transport) = host_with_peer(&mesh);
        coordinator.start_round().unwrap();
        let bet = GameIntent::Kang(KangIntent::Bet { player_id: guest.id, amount: 20 });
        coordinator.handle_frame(frame(guest.id, &WireMessage::Intent { intent: bet })).unwrap();
        coordinator.submit(GameIntent::Kang(KangIntent::Deal { player_id: coordinator.player_id() })).unwrap();
        assert_eq!(kang_phase(&coordinator), KangPhase::Drawing);

        let revision = coordinator.revision();
        coordinator.handle_connection(ConnectionEvent::Disconnected(guest.id)).unwrap();
        assert_eq!(coordinator.revision(), revision);
        assert_eq!(coordinator.view().unwrap().snapshot.player_ids().len(), 2);

        // 重连后不再等待离座
        coordinator.handle_connection(ConnectionEvent::Connected(guest.id)).unwrap();
        let draw = GameIntent::Kang(KangIntent::Draw { player_id: guest.id, card_indices: vec![] });
        coordinator.handle_frame(frame(guest.id, &WireMessage::Intent { intent: draw })).unwrap();
        coordinator.submit(GameIntent::Kang(KangIntent::Draw { player_id: coordinator.player_id(), card_indices: vec![] })).unwrap();
        assert_eq!(kang_phase(&coordinator), KangPhase::Settled);
        assert_eq!(coordinator.view().unwrap().snapshot.player_ids().len(), 2);

        // 局外离开
        let mesh = LocalMesh::new();
        let (mut coordinator, guest, _transport) = host_with_peer(&mesh);
        coordinator.handle_connection(ConnectionEvent::Disconnected(guest.id)).unwrap();
        assert_eq!(coordinator.revision(), 3);
        assert_eq!(coordinator.view().unwrap().snapshot.player_ids(), vec![coordinator.player_id()]);
    }

    #[test]
    fn test_peer_mirror_rules() {
        let mesh = LocalMesh::new();
        let host_id = Uuid::new_v4();
        let host_transport = mesh.connect(host_id);
        let mut host_inbox = host_transport.on_message();
        let me = profile("me");
        let mut peer = Coordinator::peer(mesh.connect(me.id), me.clone(), host_id).unwrap();
        assert!(!peer.is_host());
        assert_eq!(WireMessage::decode(&host_inbox.try_recv().unwrap().payload).unwrap(), WireMessage::Join { profile: me.clone() });
        assert!(peer.view().is_none());

        let table = Table::new(TableConfig::default_for(GameKind::Slave));
        let first = table.snapshot();
        let mut other_table = Table::new(TableConfig::default_for(GameKind::Slave));
        other_table.add_player(me.clone()).unwrap();
        let second = other_table.snapshot();

        peer.handle_frame(frame(host_id, &WireMessage::Snapshot { revision: 2, snapshot: first.clone() })).unwrap();
        assert_eq!(peer.view(), Some(TableView { revision: 2, snapshot: first.clone() }));

        // 乱序到达的旧版本
        peer.handle_frame(frame(host_id, &WireMessage::Snapshot { revision: 1, snapshot: second.clone() })).unwrap();
        assert_eq!(peer.view().unwrap().snapshot, first);

        // 非主机发来的快照
        peer.handle_frame(frame(Uuid::new_v4(), &WireMessage::Snapshot { revision: 5, snapshot: second.clone() }))
            .unwrap();
        assert_eq!(peer.revision(), 2);

        peer.handle_frame(frame(host_id, &WireMessage::Snapshot { revision: 3, snapshot: second.clone() })).unwrap();
        assert_eq!(peer.view(), Some(TableView { revision: 3, snapshot: second }));

        assert!(peer.handle_connection(ConnectionEvent::Disconnected(Uuid::new_v4())).is_ok());
        assert!(matches!(
            peer.handle_connection(ConnectionEvent::Disconnected(host_id)),
            Err(SessionError::HostDisconnected)
        ));
    }

    #[test]
    fn test_peer_forwards_without_local_mutation() {
        let mesh = LocalMesh::new();
        let host_id = Uuid::new_v4();
        let host_transport = mesh.connect(host_id);
        let mut host_inbox = host_transport.on_message();
        let me = profile("me");
        let mut peer = Coordinator::peer(mesh.connect(me.id), me.clone(), host_id).unwrap();
        host_inbox.try_recv().unwrap();

        let bet = GameIntent::Kang(KangIntent::Bet { player_id: me.id, amount: 20 });
        peer.submit(bet.clone()).unwrap();
        assert_eq!(WireMessage::decode(&host_inbox.try_recv().unwrap().payload).unwrap(), WireMessage::Intent { intent: bet });
        assert!(peer.view().is_none());

        let not_mine = GameIntent::Kang(KangIntent::Deal { player_id: host_id });
        assert!(matches!(peer.submit(not_mine), Err(SessionError::Rejected(RuleViolation::NotPlayersTurn(_)))));
        assert!(matches!(peer.start_round(), Err(SessionError::NotHost)));
        assert!(matches!(peer.save(), Err(SessionError::NotHost)));

        mesh.sever(host_id);
        assert!(matches!(peer.leave(), Err(SessionError::HostUnreachable)));
    }

    #[test]
    fn test_peer_to_missing_host() {
        let mesh = LocalMesh::new();
        let me = profile("me");
        let result = Coordinator::peer(mesh.connect(me.id), me, Uuid::new_v4());
        assert!(matches!(result, Err(SessionError::HostUnreachable)));
    }

    #[test]
    fn test_save_and_restore() {
        let mesh = LocalMesh::new();
        let (mut coordinator, guest, _transport) = host_with_peer(&mesh);
        coordinator.start_round().unwrap();
        let saved = coordinator.save().unwrap();
        let saved_view = coordinator.view().unwrap().snapshot;

        let bet = GameIntent::Kang(KangIntent::Bet { player_id: guest.id, amount: 20 });
        coordinator.handle_frame(frame(guest.id, &WireMessage::Intent { intent: bet })).unwrap();
        assert_ne!(coordinator.view().unwrap().snapshot, saved_view);

        coordinator.restore(&saved).unwrap();
        let view = coordinator.view().unwrap();
        assert_eq!(view.snapshot, saved_view);
        assert_eq!(view.revision, 5);

        assert!(matches!(coordinator.restore("{}"), Err(SessionError::Snapshot(_))));
        assert_eq!(coordinator.revision(), 5);
    }

    #[test]
    fn test_disconnected_player_leaves_once_round_settles() {
        let mesh = LocalMesh::new();
        let (mut coordinator, guest, transport) = host_with_peer(&mesh);
        let mut inbox = transport.on_message();
        coordinator.start_round().unwrap();
        let bet = GameIntent::Kang(KangIntent::Bet { player_id: guest.id, amount: 20 });
        coordinator.handle_frame(frame(guest.id, &WireMessage::Intent { intent: bet })).unwrap();
        coordinator.submit(GameIntent::Kang(KangIntent::Deal { player_id: coordinator.player_id() })).unwrap();
        assert_eq!(coordinator.revision(), 5);

        // 换牌阶段断开：暂不离座，但排在当前行动位上的意图仍然有效
        coordinator.handle_connection(ConnectionEvent::Disconnected(guest.id)).unwrap();
        assert_eq!(coordinator.revision(), 5);
        let draw = GameIntent::Kang(KangIntent::Draw { player_id: guest.id, card_indices: vec![0] });
        coordinator.handle_frame(frame(guest.id, &WireMessage::Intent { intent: draw })).unwrap();
        assert_eq!(coordinator.revision(), 6);
        assert_eq!(coordinator.view().unwrap().snapshot.player_ids().len(), 2);

        drain_snapshots(&mut inbox);
        coordinator.submit(GameIntent::Kang(KangIntent::Draw { player_id: coordinator.player_id(), card_indices: vec![] })).unwrap();

        // 结算广播一次，离座再广播一次
        assert_eq!(coordinator.revision(), 8);
        assert_eq!(coordinator.view().unwrap().snapshot.player_ids(), vec![coordinator.player_id()]);
        assert_eq!(kang_phase(&coordinator), KangPhase::Settled);
        assert_eq!(drain_snapshots(&mut inbox), vec![7, 8]);

        // 已经离座，后续广播不再重复
        let newcomer = profile("newcomer");
        let _newcomer_transport = mesh.connect(newcomer.id);
        coordinator.handle_frame(frame(newcomer.id, &WireMessage::Join { profile: newcomer.clone() })).unwrap();
        assert_eq!(coordinator.revision(), 9);
        assert_eq!(drain_snapshots(&mut inbox), vec![9]);
    }
}
