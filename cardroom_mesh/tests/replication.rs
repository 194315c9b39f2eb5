use cardroom_core::games::kang::{KangIntent, KangPhase, KangState};
use cardroom_core::games::slave::SlaveIntent;
use cardroom_core::{GameIntent, GameKind, GameSnapshot, PlayerProfile, RuleViolation, TableConfig};
use cardroom_mesh::{LocalMesh, Session, SessionConfig, SessionError, SessionHandle, TableView};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

fn profile(name: &str) -> PlayerProfile {
    PlayerProfile::new(Uuid::new_v4(), name)
}

fn kang_config() -> SessionConfig {
    let mut config = SessionConfig::for_game(GameKind::Kang);
    if let TableConfig::Kang(c) = &mut config.game {
        c.seed = Some(11);
    }
    config
}

async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future).await.expect("等待超时")
}

fn kang(view: &TableView) -> &KangState {
    match &view.snapshot {
        GameSnapshot::Kang(state) => state,
        other => panic!("快照类型错误: {:?}", other.kind()),
    }
}

/// 主机 + 两个对端，全部入座
async fn kang_table(mesh: &LocalMesh) -> (SessionHandle, SessionHandle, SessionHandle) {
    let host_profile = profile("庄家");
    let host = Session::host(mesh.connect(host_profile.id), host_profile.clone(), &kang_config()).unwrap();
    let a_profile = profile("A");
    let a = Session::join(mesh.connect(a_profile.id), a_profile, host_profile.id).unwrap();
    let b_profile = profile("B");
    let b = Session::join(mesh.connect(b_profile.id), b_profile, host_profile.id).unwrap();

    let seated = host.player_id();
    within(host.wait_for(|v| v.snapshot.player_ids().len() == 3)).await.unwrap();
    for peer in [&a, &b] {
        let view = within(peer.wait_for(|v| v.snapshot.player_ids().len() == 3)).await.unwrap();
        assert_eq!(view.snapshot.player_ids()[0], seated);
    }
    (host, a, b)
}

#[tokio::test]
async fn test_kang_round_over_the_mesh() {
    let mesh = LocalMesh::new();
    let (host, a, b) = kang_table(&mesh).await;

    host.start_round().await.unwrap();
    within(a.wait_for(|v| kang(v).phase == KangPhase::Betting)).await.unwrap();

    a.submit(GameIntent::Kang(KangIntent::Bet { player_id: a.player_id(), amount: 20 })).await.unwrap();
    b.submit(GameIntent::Kang(KangIntent::Bet { player_id: b.player_id(), amount: 50 })).await.unwrap();
    within(host.wait_for(|v| kang(v).players.iter().filter(|p| p.bet > 0).count() == 2)).await.unwrap();

    host.submit(GameIntent::Kang(KangIntent::Deal { player_id: host.player_id() })).await.unwrap();

    // 从庄家左手边开始依次换牌，最后是庄家
    let a_id = a.player_id();
    within(a.wait_for(|v| v.snapshot.current_player_id() == Some(a_id))).await.unwrap();
    a.submit(GameIntent::Kang(KangIntent::Draw { player_id: a_id, card_indices: vec![0, 1] })).await.unwrap();
    let b_id = b.player_id();
    within(b.wait_for(|v| v.snapshot.current_player_id() == Some(b_id))).await.unwrap();
    b.submit(GameIntent::Kang(KangIntent::Draw { player_id: b_id, card_indices: vec![] })).await.unwrap();
    let host_id = host.player_id();
    within(host.wait_for(|v| v.snapshot.current_player_id() == Some(host_id))).await.unwrap();
    host.submit(GameIntent::Kang(KangIntent::Draw { player_id: host_id, card_indices: vec![4] })).await.unwrap();

    let settled = within(host.wait_for(|v| kang(v).phase == KangPhase::Settled)).await.unwrap();
    let state = kang(&settled);
    assert_eq!(state.players.iter().map(|p| p.round_delta).sum::<i64>(), 0);
    assert_eq!(state.discard.len(), 3);

    // 所有镜像收敛到主机的最终版本
    for peer in [&a, &b] {
        let mirror = within(peer.wait_for(|v| v.revision == settled.revision)).await.unwrap();
        assert_eq!(mirror, settled);
    }
}

#[tokio::test]
async fn test_host_reports_rule_violations() {
    let mesh = LocalMesh::new();
    let (host, a, _b) = kang_table(&mesh).await;
    let before = host.latest().unwrap();

    let deal = GameIntent::Kang(KangIntent::Deal { player_id: host.player_id() });
    assert!(matches!(host.submit(deal).await, Err(SessionError::Rejected(RuleViolation::WrongPhase))));
    assert!(matches!(
        host.submit(GameIntent::Slave(SlaveIntent::Pass { player_id: host.player_id() })).await,
        Err(SessionError::Rejected(RuleViolation::WrongGame))
    ));
    assert_eq!(host.latest().unwrap(), before);

    // 对端只知道意图已发出，被拒绝时不会有任何广播
    let not_dealer = GameIntent::Kang(KangIntent::Deal { player_id: a.player_id() });
    a.submit(not_dealer.clone()).await.unwrap();
    host.start_round().await.unwrap();
    within(a.wait_for(|v| kang(v).phase == KangPhase::Betting)).await.unwrap();
    a.submit(not_dealer).await.unwrap();
    a.submit(GameIntent::Kang(KangIntent::Bet { player_id: a.player_id(), amount: 20 })).await.unwrap();
    let view = within(a.wait_for(|v| kang(v).players[1].bet == 20)).await.unwrap();
    assert_eq!(view.revision, before.revision + 2);
    assert_eq!(kang(&view).phase, KangPhase::Betting);

    assert!(matches!(a.start_round().await, Err(SessionError::NotHost)));
}

#[tokio::test]
async fn test_peer_leaving_between_rounds() {
    let mesh = LocalMesh::new();
    let (host, a, b) = kang_table(&mesh).await;
    let b_id = b.player_id();

    b.leave().await.unwrap();
    let view = within(host.wait_for(|v| v.snapshot.player_ids().len() == 2)).await.unwrap();
    assert!(!view.snapshot.player_ids().contains(&b_id));
    within(a.wait_for(|v| v.revision == view.revision)).await.unwrap();
}

#[tokio::test]
async fn test_host_departure_is_fatal() {
    let mesh = LocalMesh::new();
    let (host, a, b) = kang_table(&mesh).await;

    host.leave().await.unwrap();
    assert!(matches!(within(a.finished()).await, Err(SessionError::HostDisconnected)));
    assert!(matches!(within(b.finished()).await, Err(SessionError::HostDisconnected)));
}

#[tokio::test]
async fn test_join_without_host() {
    let mesh = LocalMesh::new();
    let me = profile("孤单");
    let result = Session::join(mesh.connect(me.id), me, Uuid::new_v4());
    assert!(matches!(result, Err(SessionError::HostUnreachable)));
}

#[tokio::test]
async fn test_late_joiner_gets_current_state_and_dealer_change() {
    let mesh = LocalMesh::new();
    let (host, a, _b) = kang_table(&mesh).await;
    host.set_dealer(a.player_id()).await.unwrap();
    let a_id = a.player_id();
    within(a.wait_for(|v| kang(v).dealer_id == Some(a_id))).await.unwrap();

    let late_profile = profile("C");
    let late = Session::join(mesh.connect(late_profile.id), late_profile.clone(), host.player_id()).unwrap();
    let view = within(late.wait_for(|v| v.snapshot.player_ids().contains(&late_profile.id))).await.unwrap();
    assert_eq!(kang(&view).dealer_id, Some(a_id));
}

#[tokio::test]
async fn test_save_and_restore_through_handle() {
    let mesh = LocalMesh::new();
    let (host, a, _b) = kang_table(&mesh).await;
    host.start_round().await.unwrap();
    let saved = host.save().await.unwrap();
    let saved_view = host.latest().unwrap();

    a.submit(GameIntent::Kang(KangIntent::Bet { player_id: a.player_id(), amount: 20 })).await.unwrap();
    within(host.wait_for(|v| v.revision > saved_view.revision)).await.unwrap();

    host.restore(saved).await.unwrap();
    let restored = within(a.wait_for(|v| v.revision == saved_view.revision + 2)).await.unwrap();
    assert_eq!(restored.snapshot, saved_view.snapshot);
    assert!(matches!(a.save().await, Err(SessionError::NotHost)));
}
