mod alarm;
mod bus;
mod config;
mod host;
mod protocol;
mod schedule;
mod server;
mod snooze;

use crate::alarm::AlarmService;
use crate::bus::{Event, EventBus};
use crate::config::AppConfig;
use crate::host::{Session, SystemHost};
use crate::protocol::{Request, Response, TabRef};
use crate::schedule::SnoozeChoice;
use crate::snooze::types::SnoozedTab;
use crate::snooze::SnoozeManager;
use anyhow::{anyhow, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabnap", version, about = "snooze tabs now, wake them later")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduling daemon
    Run,
    /// Snooze one or more URLs
    Snooze {
        #[arg(long, required = true)]
        url: Vec<String>,
        /// Display title (defaults to the URL)
        #[arg(long)]
        title: Option<String>,
        /// When to wake up, e.g. in_one_hour, this_evening, every_monday
        #[arg(long, default_value = "in_one_hour")]
        when: String,
        #[arg(long)]
        repeat: bool,
    },
    /// List snoozed tabs
    List,
    /// Reopen a snoozed tab now
    Restore {
        #[arg(long)]
        id: String,
    },
    /// Drop a snoozed tab without reopening it
    Remove {
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run().await,
        Commands::Snooze {
            url,
            title,
            when,
            repeat,
        } => {
            let value = parse_choice(&when);
            let tabs = url
                .iter()
                .map(|u| TabRef {
                    id: None,
                    url: u.clone(),
                    title: title.clone().unwrap_or_else(|| u.clone()),
                    fav_icon_url: None,
                })
                .collect();
            client(Request::SnoozeTabs { value, repeat, tabs }).await
        }
        Commands::List => client(Request::GetSnoozedTabs).await,
        Commands::Restore { id } => client(Request::RestoreTab { tab_id: id }).await,
        Commands::Remove { id } => client(Request::DeleteTab { tab_id: id }).await,
    }
}

async fn run() -> Result<()> {
    let cfg = AppConfig::load()?;

    let (bus, mut events) = EventBus::new();
    let alarms = AlarmService::new();
    alarms.start(bus.clone());

    let mut manager = SnoozeManager::new(
        cfg.store_path(),
        Arc::new(alarms),
        Arc::new(SystemHost),
        Session::new(),
    );
    manager.reconcile(Local::now().timestamp_millis())?;

    tokio::spawn({
        let bus = bus.clone();
        let socket = cfg.socket_path();
        async move {
            if let Err(e) = server::serve(socket, bus).await {
                error!("Control socket failed: {}", e);
            }
        }
    });

    // The periodic resync re-arms wake-ups defensively and picks up store
    // edits made by direct-mode CLI invocations.
    let mut resync = tokio::time::interval(std::time::Duration::from_secs(60));
    resync.tick().await; // the first tick completes immediately

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    Event::Request { request, reply } => {
                        let _ = reply.send(manager.handle_request(request));
                    }
                    Event::AlarmFired { name } => {
                        if let Err(e) = manager.on_alarm(&name, Local::now().timestamp_millis()) {
                            error!("Failed to handle wake-up {}: {}", name, e);
                        }
                    }
                }
            }
            _ = resync.tick() => {
                if let Err(e) = manager.reconcile(Local::now().timestamp_millis()) {
                    error!("Resync failed: {}", e);
                }
            }
        }
    }
    Ok(())
}

async fn client(request: Request) -> Result<()> {
    let cfg = AppConfig::load()?;
    let response = match send_request(&cfg.socket_path(), &request).await {
        Ok(response) => response,
        Err(_) => {
            // No daemon: act on the store directly. An un-started alarm
            // service is inert; the daemon re-arms wake-ups on its next
            // resync pass.
            let mut manager = SnoozeManager::new(
                cfg.store_path(),
                Arc::new(AlarmService::new()),
                Arc::new(SystemHost),
                Session::new(),
            );
            manager.load()?;
            manager.handle_request(request)
        }
    };
    print_response(&response);
    Ok(())
}

async fn send_request(socket: &Path, request: &Request) -> Result<Response> {
    let stream = UnixStream::connect(socket).await?;
    let (reader, mut writer) = stream.into_split();
    let mut payload = serde_json::to_vec(request)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;

    let mut lines = BufReader::new(reader).lines();
    let line = lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow!("daemon closed the connection"))?;
    Ok(serde_json::from_str(&line)?)
}

fn parse_choice(raw: &str) -> SnoozeChoice {
    SnoozeChoice::from_wire(raw)
}

fn print_response(response: &Response) {
    if let Some(items) = &response.items {
        if items.is_empty() {
            println!("No snoozed tabs.");
            return;
        }
        println!("{:<24} {:<30} {:<28} {}", "ID", "Title", "When", "URL");
        println!("{:-<100}", "");
        for tab in items {
            println!(
                "{:<24} {:<30} {:<28} {}",
                tab.id,
                tab.title,
                describe(tab),
                tab.url
            );
        }
    } else if response.success {
        println!("OK.");
    } else {
        println!(
            "Error: {}",
            response.error.as_deref().unwrap_or("unknown failure")
        );
    }
}

fn describe(tab: &SnoozedTab) -> String {
    if let Some(rule) = &tab.repeat {
        match tab.wake_up_time_ms {
            Some(at) => format!("{} (next {})", rule, format_ms(at)),
            None => rule.to_string(),
        }
    } else if tab.at_startup {
        "next startup".to_string()
    } else if let Some(at) = tab.wake_up_time_ms {
        format_ms(at)
    } else {
        "N/A".to_string()
    }
}

fn format_ms(ms: i64) -> String {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
