// Snake draft console client.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open database
// 4. Dispatch the subcommand: create a session, list sessions, or join one
// 5. For `join`: spawn the client loop and a stdin reader, print updates
//    until the loop ends

use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::sync::mpsc;
use tracing::{error, info};

use snakedraft_core::app::{self, LoopSettings};
use snakedraft_core::client::DraftClient;
use snakedraft_core::config::{self, Config};
use snakedraft_core::db::Database;
use snakedraft_core::draft::sequence::TOTAL_TURNS;
use snakedraft_core::draft::{Role, SessionRecord, Team, TurnStatus};
use snakedraft_core::protocol::{DraftSnapshot, UiUpdate, UserCommand};
use snakedraft_core::store::{create_session, SessionFilter, SessionStore};
use snakedraft_core::sync::SyncClient;

/// Key under which the most recently created or joined lobby is remembered.
const LAST_SESSION_KEY: &str = "last_session";

const USAGE: &str = "usage:
  snakedraft create [team1] [team2]
  snakedraft list
  snakedraft join [lobby_id] <captain1|captain2|spectator>

in a joined session:
  select <god>   stage a god for your turn
  confirm        lock in the staged god
  cancel         drop the staged god
  refresh        poll now
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Create { team1: String, team2: String },
    List,
    Join { lobby_id: Option<String>, role: Role },
    Help,
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let arg = |i: usize| args.get(i).map(String::as_str);
    match arg(0) {
        Some("create") => Ok(Command::Create {
            team1: arg(1).unwrap_or_default().to_string(),
            team2: arg(2).unwrap_or_default().to_string(),
        }),
        Some("list") => Ok(Command::List),
        Some("join") => match (arg(1), arg(2)) {
            (Some(lobby_id), Some(role)) => Ok(Command::Join {
                lobby_id: Some(lobby_id.to_string()),
                role: Role::from_tag(role),
            }),
            (Some(role), None) => match Role::parse_tag(role) {
                Some(role) => Ok(Command::Join {
                    lobby_id: None,
                    role,
                }),
                None => bail!("`{role}` is not a role; use `join <lobby_id> <role>`\n{USAGE}"),
            },
            _ => bail!("join needs a role\n{USAGE}"),
        },
        None | Some("help") | Some("-h") | Some("--help") => Ok(Command::Help),
        Some(other) => bail!("unknown command `{other}`\n{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("snakedraft starting up");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    if command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: {}s turns, poll every {}ms",
        config.draft.turn_seconds, config.draft.poll_interval_ms
    );

    // 3. Open database
    let db = Arc::new(Database::open(&config.db_path).context("failed to open database")?);
    info!("Database opened at {}", config.db_path);

    // 4. Dispatch
    match command {
        Command::Create { team1, team2 } => create(&db, &config, &team1, &team2).await,
        Command::List => list(&db).await,
        Command::Join { lobby_id, role } => join(db, &config, lobby_id, role).await,
        Command::Help => Ok(()),
    }
}

async fn create(db: &Database, config: &Config, team1: &str, team2: &str) -> anyhow::Result<()> {
    let (team1, team2) = config.teams.resolve(team1, team2);
    let record = create_session(db, &team1, &team2)
        .await
        .context("failed to create session")?;
    remember_session(db, &record.id);

    println!("Created {} ({} vs {})", record.id, record.team1_name, record.team2_name);
    println!("Share these to join:");
    for line in join_hints(&record.id) {
        println!("{line}");
    }
    Ok(())
}

/// One join command per role, to hand out to captains and spectators.
fn join_hints(lobby_id: &str) -> Vec<String> {
    [Role::Captain1, Role::Captain2, Role::Spectator]
        .iter()
        .map(|role| format!("  snakedraft join {lobby_id} {role}"))
        .collect()
}

async fn list(db: &Database) -> anyhow::Result<()> {
    let sessions = db
        .query(&SessionFilter::default())
        .await
        .context("failed to list sessions")?;
    if sessions.is_empty() {
        println!("No sessions. Start one with `snakedraft create`.");
    }
    for record in &sessions {
        let status = if record.draft_complete {
            "complete".to_string()
        } else {
            format!("turn {}/{}", record.turn_cursor + 1, TOTAL_TURNS)
        };
        println!(
            "{}  {} vs {}  [{}]",
            record.id, record.team1_name, record.team2_name, status
        );
    }
    Ok(())
}

async fn join(
    db: Arc<Database>,
    config: &Config,
    lobby_id: Option<String>,
    role: Role,
) -> anyhow::Result<()> {
    let lobby_id = match lobby_id {
        Some(id) => id,
        None => last_session(&db)?,
    };
    db.read_by_id(&lobby_id)
        .await
        .with_context(|| format!("cannot join {lobby_id}"))?;
    remember_session(&db, &lobby_id);

    let client = DraftClient::new(
        SyncClient::new(db.clone(), &lobby_id),
        role,
        config.god_pool(),
        config.turn_timer(),
    );

    // 5. Channels, client loop, stdin reader
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, mut ui_rx) = mpsc::channel(256);

    let settings = LoopSettings::from(config);
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(cmd_rx, ui_tx, client, settings).await {
            error!("Client loop error: {}", e);
        }
    });

    // A plain thread so a pending stdin read never holds up runtime shutdown.
    std::thread::spawn(move || read_commands(cmd_tx));

    println!("Joined {lobby_id} as {role}. Type `help` for commands.");
    while let Some(update) = ui_rx.recv().await {
        if let Some(text) = render_update(&update) {
            println!("{text}");
        }
    }

    let _ = app_handle.await;
    info!("snakedraft shut down cleanly");
    Ok(())
}

fn read_commands(cmd_tx: mpsc::Sender<UserCommand>) {
    for line in std::io::stdin().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        match UserCommand::parse(&line) {
            Some(cmd) => {
                let quit = cmd == UserCommand::Quit;
                if cmd_tx.blocking_send(cmd).is_err() || quit {
                    return;
                }
            }
            None => println!("{USAGE}"),
        }
    }
    // EOF ends the session.
    let _ = cmd_tx.blocking_send(UserCommand::Quit);
}

fn remember_session(db: &Database, lobby_id: &str) {
    if let Err(e) = db.save_state(LAST_SESSION_KEY, &serde_json::json!(lobby_id)) {
        error!("Failed to remember session {}: {:#}", lobby_id, e);
    }
}

fn last_session(db: &Database) -> anyhow::Result<String> {
    let saved = db.load_state(LAST_SESSION_KEY)?;
    match saved.as_ref().and_then(|v| v.as_str()) {
        Some(id) => Ok(id.to_string()),
        None => bail!("no previous session; pass a lobby id\n{USAGE}"),
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_update(update: &UiUpdate) -> Option<String> {
    match update {
        UiUpdate::Snapshot(snapshot) => Some(render_snapshot(snapshot)),
        UiUpdate::Timer { remaining_secs } => {
            let secs = *remaining_secs;
            (secs % 15 == 0 || secs <= 5).then(|| format!("  [{}]", format_clock(secs)))
        }
        UiUpdate::Rejected {
            message,
            needs_refresh,
        } => Some(if *needs_refresh {
            format!("! {message} (state refreshed, check the board and try again)")
        } else {
            format!("! {message}")
        }),
        UiUpdate::SessionMissing { lobby_id } => {
            Some(format!("! session {lobby_id} no longer exists"))
        }
    }
}

fn render_snapshot(snapshot: &DraftSnapshot) -> String {
    let record = &snapshot.record;
    let mut lines = vec![format!(
        "== {} vs {} ({}) | {} ==",
        record.team1_name, record.team2_name, record.id, snapshot.role_label
    )];

    lines.push(format!(
        "   {}",
        turn_banner(
            record,
            &snapshot.turn,
            snapshot.remaining_secs,
            snapshot.turn_expired
        )
    ));
    for team in [Team::One, Team::Two] {
        lines.push(format!(
            "   {:<16} bans: {:<40} picks: {}",
            record.team_name(team),
            join_or_dash(record.bans(team)),
            join_or_dash(record.picks(team)),
        ));
    }

    if snapshot.can_interact {
        match &snapshot.staged {
            Some(god) => lines.push(format!("   Staged: {god} (confirm / cancel)")),
            None => {
                lines.push(format!("   Taken: {}", join_or_dash(&snapshot.unavailable)));
                lines.push(format!("   Available: {}", snapshot.available.join(", ")));
            }
        }
    }
    lines.join("\n")
}

fn turn_banner(
    record: &SessionRecord,
    turn: &TurnStatus,
    remaining_secs: u32,
    expired: bool,
) -> String {
    match turn {
        TurnStatus::Active(turn) => {
            let clock = if expired {
                "time up".to_string()
            } else {
                format_clock(remaining_secs)
            };
            format!(
                "Turn {}/{}: {} to {} [{}]",
                record.turn_cursor + 1,
                TOTAL_TURNS,
                record.team_name(turn.team),
                turn.action.as_str(),
                clock
            )
        }
        TurnStatus::Complete => "Draft complete".to_string(),
    }
}

fn join_or_dash(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

/// `m:ss`, e.g. `0:42`.
fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("snakedraft.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("snakedraft=info,snakedraft_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
