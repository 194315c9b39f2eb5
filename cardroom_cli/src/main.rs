mod command;
mod render;

use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cardroom_core::{GameKind, PlayerProfile};
use cardroom_mesh::{LocalMesh, Session, SessionConfig, SessionHandle};
use command::{Command, actions_help, parse_intent};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GameArg {
    Blackjack,
    Kang,
    Dummy,
    PokDeng,
    Slave,
    Holdem,
}

impl From<GameArg> for GameKind {
    fn from(arg: GameArg) -> GameKind {
        match arg {
            GameArg::Blackjack => GameKind::Blackjack,
            GameArg::Kang => GameKind::Kang,
            GameArg::Dummy => GameKind::Dummy,
            GameArg::PokDeng => GameKind::PokDeng,
            GameArg::Slave => GameKind::Slave,
            GameArg::Holdem => GameKind::Holdem,
        }
    }
}

/// 在一个进程里模拟一张牌桌：0 号座位是主机，其余座位是通过本地网络加入的对端
#[derive(Parser, Debug)]
#[command(name = "cardroom", version)]
struct Args {
    /// 要玩的游戏
    #[arg(short, long, value_enum, default_value = "holdem")]
    game: GameArg,

    /// JSON 配置文件，给出时忽略 --game
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 除主机外的玩家数
    #[arg(short, long, default_value_t = 2)]
    peers: usize,
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn print_help(kind: GameKind) {
    println!("--- {} ---", kind);
    println!("可用命令:");
    println!("  start                     - 开始新的一局 (主机)");
    println!("  dealer <座位>             - 指定庄家 (主机, 仅 Kang/博登)");
    println!("  <座位> <操作> [参数...]   - 以该座位的玩家身份操作");
    println!("      {}", actions_help(kind));
    println!("  show                      - 显示当前桌面");
    println!("  save <文件> / load <文件> - 保存或恢复完整状态 (主机)");
    println!("  leave <座位>              - 让该玩家离开");
    println!("  exit                      - 退出");
    println!("牌的写法: 点数在前花色在后，例如 AS 10H TD 3c");
}

/// 找到仍在桌上的座位
fn seat(seats: &[Option<SessionHandle>], index: usize) -> Option<&SessionHandle> {
    seats.get(index).and_then(|s| s.as_ref())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::for_game(args.game.into()),
    };
    let kind = config.game.kind();

    // --- 搭建牌桌 ---
    let mesh = LocalMesh::new();
    let host_profile = PlayerProfile::new(Uuid::new_v4(), "玩家0");
    let host = Session::host(mesh.connect(host_profile.id), host_profile.clone(), &config)?;
    let mut seats = vec![Some(host)];
    for i in 1..=args.peers {
        let profile = PlayerProfile::new(Uuid::new_v4(), format!("玩家{}", i));
        let peer = Session::join(mesh.connect(profile.id), profile, host_profile.id)?;
        seats.push(Some(peer));
    }
    let expected = seats.len();
    if let Some(host) = seat(&seats, 0) {
        host.wait_for(|v| v.snapshot.player_ids().len() == expected).await?;
    }
    info!("{} 桌已就绪，共 {} 名玩家", kind, expected);

    // 以主机的视图为准，状态一变就重新画
    if let Some(host) = seat(&seats, 0) {
        let mut view = host.view();
        tokio::spawn(async move {
            while view.changed().await.is_ok() {
                let latest = view.borrow_and_update().clone();
                if let Some(latest) = latest {
                    println!("\n{}", render::view(&latest));
                    prompt();
                }
            }
        });
    }

    print_help(kind);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt();
        let Some(line) = stdin.next_line().await? else {
            break;
        };
        let command = match line.trim().parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        let Some(host) = seat(&seats, 0) else {
            break;
        };

        let result = match command {
            Command::Start => host.start_round().await,
            Command::Dealer(index) => match seat(&seats, index) {
                Some(dealer) => host.set_dealer(dealer.player_id()).await,
                None => {
                    println!("没有 {} 号座位", index);
                    continue;
                }
            },
            Command::Show => {
                if let Some(latest) = host.latest() {
                    println!("{}", render::view(&latest));
                }
                continue;
            }
            Command::Save(path) => match host.save().await {
                Ok(payload) => {
                    std::fs::write(&path, payload)?;
                    println!("已保存到 {}", path);
                    continue;
                }
                Err(e) => Err(e),
            },
            Command::Load(path) => {
                let payload = std::fs::read_to_string(&path)?;
                host.restore(payload).await
            }
            Command::Leave(index) => match seats.get_mut(index).and_then(Option::take) {
                Some(handle) => handle.leave().await,
                None => {
                    println!("没有 {} 号座位", index);
                    continue;
                }
            },
            Command::Help => {
                print_help(kind);
                continue;
            }
            Command::Exit => {
                println!("正在关闭牌桌...");
                break;
            }
            Command::Act { seat: index, action, args } => {
                let Some(player) = seat(&seats, index) else {
                    println!("没有 {} 号座位", index);
                    continue;
                };
                match parse_intent(kind, player.player_id(), &action, &args) {
                    Ok(intent) => player.submit(intent).await,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                }
            }
        };
        if let Err(e) = result {
            println!("失败: {}", e);
        }
    }

    // 先让对端离开，最后关闭主机
    for handle in seats.into_iter().skip(1).flatten() {
        let _ = handle.leave().await;
    }
    Ok(())
}
