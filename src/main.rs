use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secure_camera::account::FileAccountService;
use secure_camera::app::App;
use secure_camera::commands;
use secure_camera::config::ClientConfig;
use secure_camera::tier::Tier;
use secure_camera::utils::{AppResult, ErrorResponse};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Record a camera into a remote vault and get sessions back")]
struct Args {
    /// Path to config file (TOML format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to credentials file
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record segments from the camera until Ctrl-C
    Record {
        /// Subscription tier, selects capture and compression presets.
        /// Defaults to the tier the server reports for the account.
        #[arg(short, long, value_enum)]
        tier: Option<Tier>,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Download a session and reassemble it into one file
    Download {
        session_id: String,
    },
    /// Show storage usage
    Quota,
    /// List sessions stored on the server
    List,
    /// Delete a session on the server
    Delete {
        session_id: String,

        /// Also delete the local deliverable
        #[arg(long)]
        local: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    secure_camera::init_tracing();
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(ClientConfig::default_path);
    let config = ClientConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    let credentials_path = args
        .credentials
        .unwrap_or_else(FileAccountService::default_path);
    let account = FileAccountService::load(&credentials_path)
        .with_context(|| format!("Failed to load credentials from {:?}", credentials_path))?;

    let app = App::new(config, Arc::new(account))?;
    tracing::info!("Secure Camera v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&app, args.command).await {
        let response = ErrorResponse::from(e);
        eprintln!("error [{}]: {}", response.code, response.message);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(app: &App, command: Command) -> AppResult<()> {
    match command {
        Command::Record { tier, duration } => {
            let report =
                commands::recording::record(app, tier, duration.map(Duration::from_secs)).await?;
            println!("Session {}", report.session.session_id);
            for segment in report.segments {
                println!("  segment {:>3}: {}", segment.sequence_number, segment.status);
            }
        }
        Command::Download { session_id } => {
            let deliverable = commands::retrieval::download(app, &session_id).await?;
            match deliverable.duration_secs {
                Some(secs) => println!("{} ({:.1}s)", deliverable.path.display(), secs),
                None => println!("{}", deliverable.path.display()),
            }
        }
        Command::Quota => {
            let snapshot = commands::account::quota(app).await?;
            println!(
                "{} tier: {:.0}s of {:.0}s used ({:.1}%), {:.0}s left, {} videos",
                app.quota.tier(),
                snapshot.used_seconds,
                snapshot.limit_seconds,
                snapshot.percentage(),
                snapshot.remaining_seconds(),
                snapshot.video_count
            );
        }
        Command::List => {
            for session in commands::retrieval::list(app).await? {
                println!(
                    "{}  {}  {} chunks  {}",
                    session.session_id, session.date, session.chunk_count, session.session_name
                );
            }
        }
        Command::Delete { session_id, local } => {
            commands::retrieval::delete(app, &session_id, local).await?;
            println!("Deleted {}", session_id);
        }
    }

    Ok(())
}
