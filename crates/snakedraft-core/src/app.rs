// Per-client event loop.
//
// Polls the store on an interval, recomputes the countdown on a faster tick,
// and applies user commands against the local `DraftClient`. Every change is
// pushed to the presentation layer as a `UiUpdate`.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::DraftClient;
use crate::config::Config;
use crate::error::DraftError;
use crate::protocol::{UiUpdate, UserCommand};

/// Tick rates for the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub poll_interval: Duration,
    pub timer_tick: Duration,
}

impl From<&Config> for LoopSettings {
    fn from(config: &Config) -> Self {
        LoopSettings {
            poll_interval: config.poll_interval(),
            timer_tick: config.timer_tick(),
        }
    }
}

/// Whether the loop keeps running after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Run the client event loop until `Quit`, the command channel closes, or
/// the session disappears from the store.
///
/// Listens on three sources using `tokio::select!`:
/// 1. The poll interval (re-reads the session)
/// 2. The timer tick (recomputes remaining seconds)
/// 3. User commands from the presentation layer
pub async fn run(
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut client: DraftClient,
    settings: LoopSettings,
) -> anyhow::Result<()> {
    info!(
        "Client loop started for session {} as {}",
        client.session_id(),
        client.role()
    );

    if poll(&mut client, &ui_tx).await == Flow::Stop {
        return Ok(());
    }

    let mut poll_interval = tokio::time::interval(settings.poll_interval);
    let mut timer_tick = tokio::time::interval(settings.timer_tick);
    // The first tick completes immediately; the initial poll above covers it.
    poll_interval.tick().await;
    timer_tick.tick().await;

    let mut last_remaining: Option<u32> = None;

    loop {
        tokio::select! {
            // --- Store polling ---
            _ = poll_interval.tick() => {
                if poll(&mut client, &ui_tx).await == Flow::Stop {
                    break;
                }
            }

            // --- Countdown ---
            _ = timer_tick.tick() => {
                if client.record().is_some() {
                    let remaining_secs = client.remaining_secs(Utc::now());
                    if last_remaining != Some(remaining_secs) {
                        last_remaining = Some(remaining_secs);
                        let _ = ui_tx.send(UiUpdate::Timer { remaining_secs }).await;
                    }
                }
            }

            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        if handle_command(&mut client, cmd, &ui_tx).await == Flow::Stop {
                            break;
                        }
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    info!("Client loop for session {} stopped", client.session_id());
    Ok(())
}

async fn handle_command(
    client: &mut DraftClient,
    cmd: UserCommand,
    ui_tx: &mpsc::Sender<UiUpdate>,
) -> Flow {
    debug!("Handling command {:?}", cmd);
    match cmd {
        UserCommand::Select(god) => match client.select_god(&god) {
            Ok(()) => send_snapshot(client, ui_tx).await,
            Err(err) => return report(client, err, ui_tx).await,
        },
        UserCommand::Confirm => match client.confirm_selection(Utc::now()).await {
            Ok(Some(_)) => send_snapshot(client, ui_tx).await,
            Ok(None) => {
                let _ = ui_tx
                    .send(UiUpdate::Rejected {
                        message: "no god selected".into(),
                        needs_refresh: false,
                    })
                    .await;
            }
            Err(err) => return report(client, err, ui_tx).await,
        },
        UserCommand::Cancel => {
            client.cancel_selection();
            send_snapshot(client, ui_tx).await;
        }
        UserCommand::Refresh => return poll(client, ui_tx).await,
        // Handled by the loop itself.
        UserCommand::Quit => return Flow::Stop,
    }
    Flow::Continue
}

async fn poll(client: &mut DraftClient, ui_tx: &mpsc::Sender<UiUpdate>) -> Flow {
    match client.refresh(Utc::now()).await {
        Ok(_) => {
            send_snapshot(client, ui_tx).await;
            Flow::Continue
        }
        Err(err) if err.is_fatal() => report(client, err, ui_tx).await,
        Err(err) => {
            // Transient backend trouble; the next tick retries.
            warn!("Poll of session {} failed: {}", client.session_id(), err);
            Flow::Continue
        }
    }
}

/// Push an error to the presentation layer. A missing session ends the loop.
async fn report(client: &DraftClient, err: DraftError, ui_tx: &mpsc::Sender<UiUpdate>) -> Flow {
    if err.is_fatal() {
        warn!("{}", err);
        let _ = ui_tx
            .send(UiUpdate::SessionMissing {
                lobby_id: client.session_id().to_string(),
            })
            .await;
        return Flow::Stop;
    }

    let _ = ui_tx
        .send(UiUpdate::Rejected {
            message: err.to_string(),
            needs_refresh: err.needs_refresh(),
        })
        .await;
    // A stale write already re-read the record and a validation failure may
    // have dropped the staged god; either way the view has changed.
    send_snapshot(client, ui_tx).await;
    Flow::Continue
}

async fn send_snapshot(client: &DraftClient, ui_tx: &mpsc::Sender<UiUpdate>) {
    if let Some(snapshot) = client.snapshot(Utc::now()) {
        let _ = ui_tx.send(UiUpdate::Snapshot(Box::new(snapshot))).await;
    }
}
