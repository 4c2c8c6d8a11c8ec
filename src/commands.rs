//! CLI command handlers.
//!
//! All commands follow the same shape:
//! - Zero unwraps, zero panics
//! - `anyhow::Result` with context at every fallible boundary

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use tracing::info;
use voxsync_core::{Phase, UserId};
use voxsync_reconciler::{
    GuildSession, InMemoryVoiceState, MemberProfile, PhaseDelays, PlayerData, PlayerStatus,
    Reconciler, ReconcilerConfig, TrackedChannel, VoiceRules,
};

use crate::cli::Commands;

const COLORS: [&str; 12] = [
    "red", "blue", "green", "pink", "orange", "yellow", "black", "white", "purple", "brown",
    "cyan", "lime",
];
const GAME_CHANNEL: &str = "game-voice";

/// Execute a CLI command.
///
/// This is the main command dispatcher that routes to the appropriate handler.
///
/// # Errors
///
/// Returns the handler's error, with context.
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Delays { config, json } => cmd_delays(config.as_deref(), json),

        Commands::Rules { config, json } => cmd_rules(config.as_deref(), json),

        Commands::Simulate {
            config,
            players,
            skip_delays,
            latency_ms,
        } => cmd_simulate(config, players, skip_delays, Duration::from_millis(latency_ms)).await,
    }
}

/// Load the configuration file, or the defaults without one.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<ReconcilerConfig> {
    path.map_or_else(
        || Ok(ReconcilerConfig::default()),
        |path| {
            ReconcilerConfig::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        },
    )
}

/// Print the delay table.
fn cmd_delays(config: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&config.delays).context("Failed to encode delays")?
        );
    } else {
        print!("{}", render_delays(&config.delays));
    }
    Ok(())
}

/// Print the voice policy.
fn cmd_rules(config: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&config.voice_rules).context("Failed to encode rules")?
        );
    } else {
        print!("{}", render_rules(&config.voice_rules));
    }
    Ok(())
}

fn render_delays(delays: &PhaseDelays) -> String {
    let mut out = format!("{:<10}", "from\\to");
    for dest in Phase::ALL {
        out.push_str(&format!("{:>9}", dest.name()));
    }
    out.push('\n');
    for origin in Phase::ALL {
        out.push_str(&format!("{:<10}", origin.name()));
        for dest in Phase::ALL {
            out.push_str(&format!("{:>8}s", delays.get_delay(origin, dest)));
        }
        out.push('\n');
    }
    out
}

fn render_rules(rules: &VoiceRules) -> String {
    let mut out = format!(
        "{:<9}{:<10}{:<7}{:<6}{}\n",
        "phase", "tracked", "alive", "mute", "deaf"
    );
    for phase in Phase::ALL {
        for tracked in [true, false] {
            for alive in [true, false] {
                let status = PlayerStatus {
                    alive,
                    tracked,
                    linked: true,
                };
                let flags = rules.evaluate(status, phase);
                out.push_str(&format!(
                    "{:<9}{:<10}{:<7}{:<6}{}\n",
                    phase.name(),
                    tracked,
                    alive,
                    flags.mute,
                    flags.deaf
                ));
            }
        }
    }
    out
}

/// Play a scripted game: link, tasks, a kill, a meeting, tasks again, end.
async fn cmd_simulate(
    config: Option<PathBuf>,
    players: usize,
    skip_delays: bool,
    latency: Duration,
) -> Result<()> {
    ensure!(
        (1..=COLORS.len()).contains(&players),
        "players must be between 1 and {}",
        COLORS.len()
    );

    let mut config = load_config(config.as_deref())?;
    if skip_delays {
        config.delays = PhaseDelays::empty();
    }

    let remote = Arc::new(InMemoryVoiceState::new().with_latency(latency));
    let reconciler = Reconciler::builder("simulated-guild")
        .with_remote(Arc::clone(&remote))
        .with_config(config)
        .build()
        .context("Failed to build reconciler")?;
    let session = GuildSession::new(reconciler);

    session
        .start_game(Some(TrackedChannel::new(GAME_CHANNEL, "Among Us")))
        .await;
    remote
        .join_member(MemberProfile::new("music-bot", "Groovy"), GAME_CHANNEL)
        .await;

    let roster: Vec<(UserId, &str)> = COLORS
        .iter()
        .take(players)
        .enumerate()
        .map(|(i, color)| (UserId::new(format!("user-{i}")), *color))
        .collect();

    for (user_id, color) in &roster {
        remote
            .join_member(
                MemberProfile::new(user_id.clone(), format!("member-{color}")),
                GAME_CHANNEL,
            )
            .await;
        session
            .ingest_player(PlayerData::new(*color, format!("{color}-crewmate")))
            .await;
        session
            .link_player(user_id, color)
            .await
            .with_context(|| format!("Failed to link {user_id}"))?;
    }
    report(&session, &remote, &roster, "players linked").await;

    session.transition_phase(Phase::Tasks).await?;
    report(&session, &remote, &roster, "tasks").await;

    if let Some((_, color)) = roster.first() {
        session
            .ingest_player(PlayerData::new(*color, format!("{color}-crewmate")).with_alive(false))
            .await;
        info!(color, "Player killed");
    }

    session.transition_phase(Phase::Discuss).await?;
    report(&session, &remote, &roster, "meeting").await;

    session.transition_phase(Phase::Tasks).await?;
    report(&session, &remote, &roster, "tasks resumed").await;

    session.end_game().await?;
    report(&session, &remote, &roster, "game over").await;

    println!("{} member updates issued", remote.applied_patches().await.len());
    Ok(())
}

async fn report(
    session: &GuildSession,
    remote: &InMemoryVoiceState,
    roster: &[(UserId, &str)],
    label: &str,
) {
    println!("== {label} ({})", session.phase().await);
    for (user_id, color) in roster {
        if let Some(participant) = remote.participant(user_id).await {
            println!(
                "  {user_id:<8} {color:<7} mute={:<5} deaf={}",
                participant.mute, participant.deaf
            );
        }
    }
}
