use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{HttpTransport, ReviewSession, SessionEvent, UpdateTransport};
use shared::domain::{Sample, Verdict};
use tokio::io::{AsyncBufReadExt, BufReader};

mod keys;
use keys::{parse_command, ReviewCommand};

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the sample service, e.g. http://127.0.0.1:8081
    #[arg(long)]
    server_url: String,
    /// After each verdict, jump to the next unrated sample instead of
    /// the next one in order.
    #[arg(long)]
    auto_advance: bool,
    /// Stable index of the sample to open first.
    #[arg(long)]
    start_index: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    let args = Args::parse();

    let transport: Arc<dyn UpdateTransport> = Arc::new(HttpTransport::new(args.server_url));
    let session = ReviewSession::new(transport, args.auto_advance);
    if let Some(index) = args.start_index {
        session.set_start_fragment(index.to_string()).await;
    }
    session.load().await?;

    spawn_event_reporter(&session);
    print_help();
    render_current(&session).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_command(&line) else {
            if !line.trim().is_empty() {
                println!("unrecognized input {:?} (? for help)", line.trim());
            }
            continue;
        };
        match command {
            ReviewCommand::Record(verdict) => session.record(verdict).await,
            ReviewCommand::Reset => session.reset_verdict().await,
            ReviewCommand::Next => session.next().await,
            ReviewCommand::Previous => session.previous().await,
            ReviewCommand::Jump(index) => session.handle_fragment_change(&index.to_string()).await,
            ReviewCommand::ToggleAutoAdvance => {
                let enabled = !session.auto_advance().await;
                session.set_auto_advance(enabled).await;
                println!("auto-advance {}", if enabled { "on" } else { "off" });
            }
            ReviewCommand::Status => render_status(&session).await,
            ReviewCommand::Help => print_help(),
            ReviewCommand::Quit => break,
        }
        render_current(&session).await;
    }
    Ok(())
}

/// Mirrors remote activity into the terminal: patches arriving from
/// other raters, snapshot reloads, and submit failures.
fn spawn_event_reporter(session: &Arc<ReviewSession>) {
    let mut events = session.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::SnapshotReplaced => println!("<< corpus reloaded from server >>"),
                SessionEvent::SampleChanged { position } => {
                    println!("<< sample at position {} changed >>", position + 1)
                }
                SessionEvent::Error(message) => println!("!! {message}"),
                SessionEvent::CountsChanged(_) | SessionEvent::PositionChanged { .. } => {}
            }
        }
    });
}

async fn render_current(session: &Arc<ReviewSession>) {
    match session.current().await {
        Some((position, sample)) => {
            let total = session.len().await;
            println!(
                "[{}/{}] #{} {} verdict={}",
                position + 1,
                total,
                sample.index.0,
                sample.url,
                verdict_label(&sample)
            );
        }
        None => println!("no samples loaded"),
    }
}

async fn render_status(session: &Arc<ReviewSession>) {
    let counts = session.counts().await;
    println!(
        "good={} bad={} poor={} error={} unrated={} (auto-advance {})",
        counts.good,
        counts.bad,
        counts.poor,
        counts.error,
        counts.unrated,
        if session.auto_advance().await { "on" } else { "off" }
    );
}

fn verdict_label(sample: &Sample) -> &'static str {
    match sample.verdict {
        Some(Verdict::Good) => "good",
        Some(Verdict::Bad) => "bad",
        Some(Verdict::Poor) => "poor",
        Some(Verdict::Error) => "error",
        None => "unrated",
    }
}

fn print_help() {
    println!("bindings: + good, - bad, / poor, 0 error, r reset");
    println!("          n next, p previous, g <index> jump, a auto-advance");
    println!("          s status, ? help, q quit");
}
