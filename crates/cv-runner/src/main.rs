//! # cv-runner
//!
//! Command-line entry point for the CryptoVault realtime and onboarding core.
//!
//! Loads a JSON configuration file, initializes logging, and runs one of:
//!
//! - `feed`: stream live prices for a set of coins until Ctrl+C
//! - `onboard`: walk a scripted onboarding session and commit the selection
//!
//! # Usage
//!
//! ```bash
//! cv-runner config.json feed --coins bitcoin,ethereum
//! cv-runner config.json --log-level debug onboard --select BTC,ETH --notifications
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cv_core::config::AppConfig;
use cv_onboarding::{
    JsonFileOnboardingStore, MemoryOnboardingStore, MemoryWatchlist, OnboardingEvent, OnboardingFlowController,
    OnboardingStep, OnboardingStore, OnboardingTimings,
};
use cv_realtime::ws_transport::WsTransport;
use cv_realtime::{ExponentialBackoff, FeedEvent, SubscriptionCoordinator};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// CryptoVault realtime feed & onboarding runner.
#[derive(Parser)]
#[command(name = "cv-runner", about = "CryptoVault realtime feed & onboarding runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long)]
    log_level: Option<String>,

    /// Optional log directory for file output. Overrides the config file.
    #[arg(long)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream live prices until Ctrl+C.
    Feed {
        /// Comma-separated coin ids (e.g. bitcoin,ethereum).
        #[arg(long, value_delimiter = ',', required = true)]
        coins: Vec<String>,

        /// Screen id to register the interest under.
        #[arg(long, default_value = "cli")]
        screen: String,
    },
    /// Run a scripted onboarding session.
    Onboard {
        /// Comma-separated coin symbols to select (e.g. BTC,ETH).
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,

        /// Enable notifications.
        #[arg(long)]
        notifications: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = cv_core::config::load_config(&cli.config)?;

    // 2. Initialize logging; the guard lives until exit
    let settings = config.log_settings(cli.log_level.as_deref(), cli.log_dir.as_deref(), "cv-runner");
    let _log_guard = cv_core::logging::init_logging(&settings)?;
    info!("cv-runner starting, config={} level={}", cli.config.display(), settings.level);

    // 3. Run the selected command
    match cli.command {
        Command::Feed { coins, screen } => run_feed(&config, &screen, coins).await,
        Command::Onboard { select, notifications } => run_onboarding(&config, select, notifications).await,
    }
}

async fn run_feed(config: &AppConfig, screen: &str, coins: Vec<String>) -> Result<()> {
    let transport = Arc::new(WsTransport::from_config(&config.realtime));
    let strategy = Box::new(ExponentialBackoff::from_config(&config.realtime.backoff));
    let mut coordinator = SubscriptionCoordinator::spawn(transport, strategy);
    let mut events = coordinator.events();

    coordinator.subscribe(screen, coins);
    info!("screen '{screen}' watching {:?}, press Ctrl+C to stop", coordinator.active_subscriptions());

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for Ctrl+C")?;
                info!("shutdown signal received");
                break;
            }
            event = events.recv() => match event {
                Ok(FeedEvent::Price(update)) => {
                    info!("{} = {:.4} USD", update.coin_id, update.price_usd);
                }
                Ok(FeedEvent::StateChanged { from, to, attempt }) => {
                    let indicator = if to.shows_indicator() { " [indicator]" } else { "" };
                    info!("connection {from} -> {to} (attempt {attempt}){indicator}");
                }
                Ok(FeedEvent::FallbackRequested { attempts }) => {
                    warn!("realtime feed gave up after {attempts} attempts; requesting reconnect");
                    coordinator.reconnect();
                }
                Ok(FeedEvent::TransportError { message }) => warn!("transport error: {message}"),
                Err(RecvError::Lagged(n)) => warn!("event receiver lagged, skipped {n}"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    coordinator.unsubscribe(screen);
    coordinator.stop().await;
    info!("feed stopped");
    Ok(())
}

async fn run_onboarding(config: &AppConfig, symbols: Vec<String>, notifications: bool) -> Result<()> {
    let store: Arc<dyn OnboardingStore> = match &config.onboarding.state_path {
        Some(path) => Arc::new(JsonFileOnboardingStore::new(path)),
        None => Arc::new(MemoryOnboardingStore::new()),
    };
    let watchlist = Arc::new(MemoryWatchlist::new());
    let controller = OnboardingFlowController::new(
        store,
        watchlist.clone(),
        OnboardingTimings::from_config(&config.onboarding),
    );

    controller.restore().await;
    if controller.is_completed().await {
        info!("onboarding already completed, nothing to do");
        return Ok(());
    }

    walk_onboarding(&controller, symbols, notifications).await?;

    let state = controller.snapshot();
    info!(
        "onboarding complete: coins={:?} notifications={} watchlist={:?}",
        state.selected_coins,
        state.notifications_enabled,
        watchlist.ids()
    );
    Ok(())
}

/// Script the flow to the last step and finish it.
///
/// Every choice is applied before the first event that can complete the
/// flow, so a session restored on the last step still records them.
async fn walk_onboarding(controller: &OnboardingFlowController, symbols: Vec<String>, notifications: bool) -> Result<()> {
    let (nav_tx, nav_rx) = tokio::sync::oneshot::channel();
    controller.set_navigation_callback(move || {
        let _ = nav_tx.send(());
    });

    while controller.snapshot().current_step < OnboardingStep::CoinSelection.index() {
        controller.handle(OnboardingEvent::NextStep).await;
    }
    let state = controller.snapshot();
    info!("{} ({}): {}", state.step_text(), state.step(), state.button_text());

    for symbol in symbols {
        let symbol = symbol.trim().to_uppercase();
        if !symbol.is_empty() && !controller.snapshot().selected_coins.contains(&symbol) {
            controller.handle(OnboardingEvent::ToggleCoin(symbol)).await;
        }
    }
    info!("{}", controller.snapshot().selection_badge_text());

    if controller.snapshot().notifications_enabled != notifications {
        controller.handle(OnboardingEvent::ToggleNotifications).await;
    }

    if !controller.snapshot().is_last_step() {
        controller.handle(OnboardingEvent::NextStep).await;
        if !controller.snapshot().is_last_step() {
            warn!("no coins selected, skipping to the end");
            controller.handle(OnboardingEvent::SkipToEnd).await;
            controller.handle(OnboardingEvent::ConfirmSkip).await;
        }
    }

    // "Get Started" on the last step completes the flow.
    controller.dispatch(OnboardingEvent::NextStep);
    nav_rx.await.context("onboarding finished without navigating")?;
    controller.settle().await;
    Ok(())
}
