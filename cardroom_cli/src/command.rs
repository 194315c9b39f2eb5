use cardroom_core::games::blackjack::BlackjackIntent;
use cardroom_core::games::dummy::DummyIntent;
use cardroom_core::games::holdem::HoldemIntent;
use cardroom_core::games::kang::KangIntent;
use cardroom_core::games::pok_deng::PokDengIntent;
use cardroom_core::games::slave::SlaveIntent;
use cardroom_core::{Card, CardParseError, GameIntent, GameKind, PlayerId};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("用法: {0}")]
    Usage(&'static str),

    #[error("{0} 中没有 {1} 这个操作，输入 help 查看可用命令")]
    UnknownAction(GameKind, String),

    #[error("无效的数字: {0}")]
    Number(String),

    #[error(transparent)]
    Card(#[from] CardParseError),
}

/// 终端里的一条命令
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Dealer(usize),
    Show,
    Save(String),
    Load(String),
    Leave(usize),
    Help,
    Exit,
    /// `<座位> <操作> [参数...]`
    Act { seat: usize, action: String, args: Vec<String> },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let command = match parts.as_slice() {
            ["start"] => Command::Start,
            ["dealer", seat] => Command::Dealer(number(seat)?),
            ["dealer", ..] => return Err(CommandError::Usage("dealer <座位>")),
            ["show"] | [] => Command::Show,
            ["save", path] => Command::Save(path.to_string()),
            ["load", path] => Command::Load(path.to_string()),
            ["save" | "load", ..] => return Err(CommandError::Usage("save|load <文件>")),
            ["leave", seat] => Command::Leave(number(seat)?),
            ["help"] => Command::Help,
            ["exit" | "quit"] => Command::Exit,
            [seat, action, args @ ..] => Command::Act {
                seat: number(seat)?,
                action: action.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
            _ => return Err(CommandError::Usage("<座位> <操作> [参数...]")),
        };
        Ok(command)
    }
}

fn number<T: FromStr>(text: &str) -> Result<T, CommandError> {
    text.parse().map_err(|_| CommandError::Number(text.to_string()))
}

fn cards(args: &[String]) -> Result<Vec<Card>, CommandError> {
    args.iter().map(|a| a.parse::<Card>().map_err(CommandError::from)).collect()
}

fn one_card(args: &[String], usage: &'static str) -> Result<Card, CommandError> {
    match args {
        [card] => Ok(card.parse()?),
        _ => Err(CommandError::Usage(usage)),
    }
}

fn amount(args: &[String], usage: &'static str) -> Result<u32, CommandError> {
    match args {
        [value] => number(value),
        _ => Err(CommandError::Usage(usage)),
    }
}

/// 没写手牌序号时默认第 0 手
fn hand_index(args: &[String]) -> Result<usize, CommandError> {
    args.first().map_or(Ok(0), |a| number(a))
}

/// 把 `<操作> [参数...]` 翻译成某个游戏的意图
pub fn parse_intent(kind: GameKind, player_id: PlayerId, action: &str, args: &[String]) -> Result<GameIntent, CommandError> {
    let unknown = || CommandError::UnknownAction(kind, action.to_string());
    let intent = match kind {
        GameKind::Blackjack => GameIntent::Blackjack(match action {
            "bet" => BlackjackIntent::Bet { player_id, amount: amount(args, "bet <金额>")? },
            "hit" => BlackjackIntent::Hit { player_id, hand_index: hand_index(args)? },
            "stand" => BlackjackIntent::Stand { player_id, hand_index: hand_index(args)? },
            "double" => BlackjackIntent::Double { player_id, hand_index: hand_index(args)? },
            "split" => BlackjackIntent::Split { player_id, hand_index: hand_index(args)? },
            "surrender" => BlackjackIntent::Surrender { player_id, hand_index: hand_index(args)? },
            _ => return Err(unknown()),
        }),
        GameKind::Kang => GameIntent::Kang(match action {
            "bet" => KangIntent::Bet { player_id, amount: amount(args, "bet <金额>")? },
            "deal" => KangIntent::Deal { player_id },
            "draw" => KangIntent::Draw {
                player_id,
                card_indices: args.iter().map(|a| number(a)).collect::<Result<Vec<usize>, CommandError>>()?,
            },
            _ => return Err(unknown()),
        }),
        GameKind::Dummy => GameIntent::Dummy(match action {
            "stock" => DummyIntent::DrawStock { player_id },
            "pickup" => DummyIntent::DrawDiscard { player_id },
            "meld" => DummyIntent::Meld { player_id, cards: cards(args)? },
            "layoff" => match args {
                [meld_id, card] => DummyIntent::LayOff { player_id, meld_id: number(meld_id)?, card: card.parse()? },
                _ => return Err(CommandError::Usage("layoff <组合编号> <牌>")),
            },
            "discard" => DummyIntent::Discard { player_id, card: one_card(args, "discard <牌>")? },
            "knock" => DummyIntent::Knock { player_id, card: one_card(args, "knock <牌>")? },
            _ => return Err(unknown()),
        }),
        GameKind::PokDeng => GameIntent::PokDeng(match action {
            "bet" => PokDengIntent::Bet { player_id, amount: amount(args, "bet <金额>")? },
            "deal" => PokDengIntent::Deal { player_id },
            "draw" => PokDengIntent::Draw { player_id },
            "stay" => PokDengIntent::Stay { player_id },
            _ => return Err(unknown()),
        }),
        GameKind::Slave => GameIntent::Slave(match action {
            "play" => SlaveIntent::Play { player_id, cards: cards(args)? },
            "pass" => SlaveIntent::Pass { player_id },
            _ => return Err(unknown()),
        }),
        GameKind::Holdem => GameIntent::Holdem(match action {
            "fold" => HoldemIntent::Fold { player_id },
            "check" => HoldemIntent::Check { player_id },
            "call" => HoldemIntent::Call { player_id },
            "raise" | "bet" => HoldemIntent::BetOrRaise { player_id, amount: amount(args, "raise <总额>")? },
            _ => return Err(unknown()),
        }),
    };
    Ok(intent)
}

/// 各游戏可用的操作
pub fn actions_help(kind: GameKind) -> &'static str {
    match kind {
        GameKind::Blackjack => "bet <金额> | hit|stand|double|split|surrender [手牌序号]",
        GameKind::Kang => "bet <金额> | deal (庄家) | draw [手牌位置...]",
        GameKind::Dummy => "stock | pickup | meld <牌...> | layoff <组合编号> <牌> | discard <牌> | knock <牌>",
        GameKind::PokDeng => "bet <金额> | deal (庄家) | draw | stay",
        GameKind::Slave => "play <牌...> | pass",
        GameKind::Holdem => "fold | check | call | raise <总额>",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardroom_core::{Rank, Suit};
    use uuid::Uuid;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("start".parse::<Command>().unwrap(), Command::Start);
        assert_eq!("dealer 2".parse::<Command>().unwrap(), Command::Dealer(2));
        assert_eq!("".parse::<Command>().unwrap(), Command::Show);
        assert_eq!(
            "1 play 3S 3h".parse::<Command>().unwrap(),
            Command::Act { seat: 1, action: "play".to_string(), args: args(&["3S", "3h"]) }
        );
        assert!(matches!("x bet 10".parse::<Command>(), Err(CommandError::Number(_))));
        assert!(matches!("dealer".parse::<Command>(), Err(CommandError::Usage(_))));
        assert!(matches!("1".parse::<Command>(), Err(CommandError::Usage(_))));
    }

    #[test]
    fn test_parse_intents() {
        let id = Uuid::new_v4();
        assert_eq!(
            parse_intent(GameKind::Slave, id, "play", &args(&["3S", "10h"])).unwrap(),
            GameIntent::Slave(SlaveIntent::Play {
                player_id: id,
                cards: vec![Card::new(Rank::Three, Suit::Spade), Card::new(Rank::Ten, Suit::Heart)],
            })
        );
        assert_eq!(
            parse_intent(GameKind::Kang, id, "draw", &args(&["0", "4"])).unwrap(),
            GameIntent::Kang(KangIntent::Draw { player_id: id, card_indices: vec![0, 4] })
        );
        assert_eq!(
            parse_intent(GameKind::Blackjack, id, "hit", &[]).unwrap(),
            GameIntent::Blackjack(BlackjackIntent::Hit { player_id: id, hand_index: 0 })
        );
        assert!(matches!(parse_intent(GameKind::Holdem, id, "raise", &[]), Err(CommandError::Usage(_))));
        assert!(matches!(parse_intent(GameKind::Dummy, id, "discard", &args(&["1X"])), Err(CommandError::Card(_))));
        assert!(matches!(parse_intent(GameKind::PokDeng, id, "split", &[]), Err(CommandError::UnknownAction(..))));
    }
}
