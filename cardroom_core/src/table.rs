use crate::engine::GameEngine;
use crate::error::{RuleViolation, SnapshotError};
use crate::games::blackjack::{Blackjack, BlackjackConfig};
use crate::games::dummy::{Dummy, DummyConfig};
use crate::games::holdem::{Holdem, HoldemConfig};
use crate::games::kang::{Kang, KangConfig};
use crate::games::pok_deng::{PokDeng, PokDengConfig};
use crate::games::slave::{Slave, SlaveConfig};
use crate::message::{GameIntent, GameSnapshot};
use crate::state::{GameKind, PlayerId, PlayerProfile};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// 开桌时选定的游戏及其规则参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "game", content = "config", rename_all = "snake_case", deny_unknown_fields)]
pub enum TableConfig {
    Blackjack(BlackjackConfig),
    Kang(KangConfig),
    Dummy(DummyConfig),
    PokDeng(PokDengConfig),
    Slave(SlaveConfig),
    Holdem(HoldemConfig),
}

impl TableConfig {
    pub fn default_for(kind: GameKind) -> TableConfig {
        match kind {
            GameKind::Blackjack => TableConfig::Blackjack(BlackjackConfig::default()),
            GameKind::Kang => TableConfig::Kang(KangConfig::default()),
            GameKind::Dummy => TableConfig::Dummy(DummyConfig::default()),
            GameKind::PokDeng => TableConfig::PokDeng(PokDengConfig::default()),
            GameKind::Slave => TableConfig::Slave(SlaveConfig::default()),
            GameKind::Holdem => TableConfig::Holdem(HoldemConfig::default()),
        }
    }

    pub fn kind(&self) -> GameKind {
        match self {
            TableConfig::Blackjack(_) => GameKind::Blackjack,
            TableConfig::Kang(_) => GameKind::Kang,
            TableConfig::Dummy(_) => GameKind::Dummy,
            TableConfig::PokDeng(_) => GameKind::PokDeng,
            TableConfig::Slave(_) => GameKind::Slave,
            TableConfig::Holdem(_) => GameKind::Holdem,
        }
    }
}

/// 一张桌子，持有某一种游戏的引擎。
///
/// 复制层只和这个类型打交道，不需要知道具体是哪种游戏。
pub enum Table {
    Blackjack(Blackjack),
    Kang(Kang),
    Dummy(Dummy),
    PokDeng(PokDeng),
    Slave(Slave),
    Holdem(Holdem),
}

/// 对每种引擎执行同一段代码
macro_rules! dispatch {
    ($table:expr, $engine:ident => $body:expr) => {
        match $table {
            Table::Blackjack($engine) => $body,
            Table::Kang($engine) => $body,
            Table::Dummy($engine) => $body,
            Table::PokDeng($engine) => $body,
            Table::Slave($engine) => $body,
            Table::Holdem($engine) => $body,
        }
    };
}

impl Table {
    pub fn new(config: TableConfig) -> Table {
        match config {
            TableConfig::Blackjack(c) => Table::Blackjack(Blackjack::new(c)),
            TableConfig::Kang(c) => Table::Kang(Kang::new(c)),
            TableConfig::Dummy(c) => Table::Dummy(Dummy::new(c)),
            TableConfig::PokDeng(c) => Table::PokDeng(PokDeng::new(c)),
            TableConfig::Slave(c) => Table::Slave(Slave::new(c)),
            TableConfig::Holdem(c) => Table::Holdem(Holdem::new(c)),
        }
    }

    pub fn kind(&self) -> GameKind {
        match self {
            Table::Blackjack(_) => GameKind::Blackjack,
            Table::Kang(_) => GameKind::Kang,
            Table::Dummy(_) => GameKind::Dummy,
            Table::PokDeng(_) => GameKind::PokDeng,
            Table::Slave(_) => GameKind::Slave,
            Table::Holdem(_) => GameKind::Holdem,
        }
    }

    pub fn add_player(&mut self, profile: PlayerProfile) -> Result<(), RuleViolation> {
        let player_id = profile.id;
        let result = dispatch!(self, engine => engine.add_player(profile));
        if let Err(e) = &result {
            debug!("玩家 {} 入座被拒绝: {}", player_id, e);
        }
        result
    }

    pub fn remove_player(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        let result = dispatch!(self, engine => engine.remove_player(player_id));
        if let Err(e) = &result {
            debug!("玩家 {} 离座被拒绝: {}", player_id, e);
        }
        result
    }

    pub fn start_round(&mut self) -> Result<(), RuleViolation> {
        dispatch!(self, engine => engine.start_round())?;
        info!("{} 开始第 {} 局", self.kind(), self.snapshot().round());
        Ok(())
    }

    /// 只有庄家轮换的游戏 (Kang、博登) 支持
    pub fn set_dealer(&mut self, player_id: PlayerId) -> Result<(), RuleViolation> {
        match self {
            Table::Kang(engine) => engine.set_dealer(player_id),
            Table::PokDeng(engine) => engine.set_dealer(player_id),
            _ => Err(RuleViolation::WrongGame),
        }
    }

    /// 把意图交给对应的引擎。游戏类型不符时返回 [`RuleViolation::WrongGame`]。
    pub fn apply(&mut self, intent: GameIntent) -> Result<(), RuleViolation> {
        let player_id = intent.player_id();
        let result = match (&mut *self, intent) {
            (Table::Blackjack(engine), GameIntent::Blackjack(intent)) => engine.apply(intent),
            (Table::Kang(engine), GameIntent::Kang(intent)) => engine.apply(intent),
            (Table::Dummy(engine), GameIntent::Dummy(intent)) => engine.apply(intent),
            (Table::PokDeng(engine), GameIntent::PokDeng(intent)) => engine.apply(intent),
            (Table::Slave(engine), GameIntent::Slave(intent)) => engine.apply(intent),
            (Table::Holdem(engine), GameIntent::Holdem(intent)) => engine.apply(intent),
            _ => Err(RuleViolation::WrongGame),
        };
        if let Err(e) = &result {
            debug!("拒绝玩家 {} 的意图: {}", player_id, e);
        }
        result
    }

    /// 广播用的快照，不含牌堆
    pub fn snapshot(&self) -> GameSnapshot {
        match self {
            Table::Blackjack(engine) => GameSnapshot::Blackjack(engine.state()),
            Table::Kang(engine) => GameSnapshot::Kang(engine.state()),
            Table::Dummy(engine) => GameSnapshot::Dummy(engine.state()),
            Table::PokDeng(engine) => GameSnapshot::PokDeng(engine.state()),
            Table::Slave(engine) => GameSnapshot::Slave(engine.state()),
            Table::Holdem(engine) => GameSnapshot::Holdem(engine.state()),
        }
    }

    /// 完整的权威状态 (含牌堆)
    pub fn serialize(&self) -> Result<String, SnapshotError> {
        dispatch!(self, engine => engine.serialize())
    }

    pub fn deserialize(&mut self, payload: &str) -> Result<(), SnapshotError> {
        dispatch!(self, engine => engine.deserialize(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::profiles;
    use crate::games::kang::{KangIntent, KangPhase};
    use crate::games::pok_deng::PokDengIntent;
    use crate::games::slave::SlaveIntent;

    fn seeded(kind: GameKind) -> TableConfig {
        match TableConfig::default_for(kind) {
            TableConfig::Blackjack(c) => TableConfig::Blackjack(BlackjackConfig { seed: Some(7), ..c }),
            TableConfig::Kang(c) => TableConfig::Kang(KangConfig { seed: Some(7), ..c }),
            TableConfig::Dummy(c) => TableConfig::Dummy(DummyConfig { seed: Some(7), ..c }),
            TableConfig::PokDeng(c) => TableConfig::PokDeng(PokDengConfig { seed: Some(7), ..c }),
            TableConfig::Slave(c) => TableConfig::Slave(SlaveConfig { seed: Some(7), ..c }),
            TableConfig::Holdem(c) => TableConfig::Holdem(HoldemConfig { seed: Some(7), ..c }),
        }
    }

    const ALL: [GameKind; 6] =
        [GameKind::Blackjack, GameKind::Kang, GameKind::Dummy, GameKind::PokDeng, GameKind::Slave, GameKind::Holdem];

    #[test]
    fn test_config_json_defaults() {
        let config: TableConfig = serde_json::from_str(r#"{"game":"kang","config":{"min_bet":50}}"#).unwrap();
        match config {
            TableConfig::Kang(c) => {
                assert_eq!(c.min_bet, 50);
                assert_eq!(c.max_discard, 2);
            }
            other => panic!("解析出了错误的游戏: {:?}", other),
        }

        let empty: TableConfig = serde_json::from_str(r#"{"game":"slave","config":{}}"#).unwrap();
        assert_eq!(empty.kind(), GameKind::Slave);

        assert!(serde_json::from_str::<TableConfig>(r#"{"game":"kang","config":{"bogus":1}}"#).is_err());
    }

    #[test]
    fn test_every_game_starts_and_round_trips() {
        for kind in ALL {
            let mut table = Table::new(seeded(kind));
            assert_eq!(table.kind(), kind);
            for profile in profiles(2) {
                table.add_player(profile).unwrap();
            }
            table.start_round().unwrap();
            assert_eq!(table.snapshot().kind(), kind);
            assert_eq!(table.snapshot().player_ids().len(), 2);

            let payload = table.serialize().unwrap();
            let mut restored = Table::new(seeded(kind));
            restored.deserialize(&payload).unwrap();
            assert_eq!(restored.snapshot(), table.snapshot());
        }
    }

    #[test]
    fn test_mismatched_intent_rejected() {
        let mut table = Table::new(seeded(GameKind::Kang));
        let players = profiles(2);
        for p in &players {
            table.add_player(p.clone()).unwrap();
        }
        table.start_round().unwrap();
        let before = table.snapshot();

        let wrong = GameIntent::Slave(SlaveIntent::Pass { player_id: players[1].id });
        assert_eq!(table.apply(wrong), Err(RuleViolation::WrongGame));
        assert_eq!(table.snapshot(), before);

        let bet = GameIntent::Kang(KangIntent::Bet { player_id: players[1].id, amount: 20 });
        table.apply(bet).unwrap();
        match table.snapshot() {
            GameSnapshot::Kang(state) => {
                assert_eq!(state.phase, KangPhase::Betting);
                assert_eq!(state.players[1].bet, 20);
            }
            other => panic!("快照类型错误: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_set_dealer_only_for_banker_games() {
        let players = profiles(2);

        let mut pok = Table::new(seeded(GameKind::PokDeng));
        for p in &players {
            pok.add_player(p.clone()).unwrap();
        }
        pok.set_dealer(players[1].id).unwrap();
        pok.start_round().unwrap();
        // 新庄家不能下注
        let bet = GameIntent::PokDeng(PokDengIntent::Bet { player_id: players[1].id, amount: 20 });
        assert_eq!(pok.apply(bet), Err(RuleViolation::NotPlayersTurn(players[1].id)));

        let mut slave = Table::new(seeded(GameKind::Slave));
        slave.add_player(players[0].clone()).unwrap();
        assert_eq!(slave.set_dealer(players[0].id), Err(RuleViolation::WrongGame));
    }

    #[test]
    fn test_corrupt_payload_leaves_table_untouched() {
        let mut table = Table::new(seeded(GameKind::Dummy));
        for p in profiles(2) {
            table.add_player(p).unwrap();
        }
        let before = table.snapshot();
        assert!(matches!(table.deserialize("{\"state\":"), Err(SnapshotError::Json(_))));
        assert_eq!(table.snapshot(), before);
    }
}
