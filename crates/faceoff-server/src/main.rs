mod config;
mod scheduler;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use faceoff_db::Database;
use faceoff_engine::{BroadcastFeed, Engine};
use faceoff_types::models::Window;

use crate::config::ServerConfig;

#[derive(Parser)]
#[command(name = "faceoff", version, about = "Photo matchmaking, judging and leaderboards")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Serve HTTP and run the score and trim loops (default)
    Serve,
    /// Drain the score log once and exit
    ScoreTick,
    /// Trim one leaderboard window once and exit
    Trim {
        /// hour, day, week, month or year
        window: Window,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "faceoff=debug,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_env()?;
    let db = Arc::new(Database::open(&config.db_path)?);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, db).await,
        Commands::ScoreTick => {
            let engine = Engine::new(db, config.engine);
            let report = tokio::task::spawn_blocking(move || {
                let report = engine.run_score_tick()?;
                let pruned = engine.prune_events()?;
                Ok::<_, faceoff_engine::FaceoffError>((report, pruned))
            })
            .await??;
            info!(
                seen = report.0.events_seen,
                applied = report.0.events_applied,
                skipped = report.0.events_skipped,
                photos = report.0.photos_updated,
                pruned = report.1,
                "score tick complete"
            );
            Ok(())
        }
        Commands::Trim { window } => {
            let engine = Engine::new(db, config.engine);
            let report = tokio::task::spawn_blocking(move || engine.run_trim(window)).await??;
            info!(window = %window, deleted = report.rows_deleted, "trim complete");
            Ok(())
        }
    }
}

async fn serve(config: ServerConfig, db: Arc<Database>) -> anyhow::Result<()> {
    let feed = BroadcastFeed::default();
    tokio::spawn(scheduler::run_feed_log(feed.subscribe()));

    let engine = Arc::new(Engine::new(db, config.engine).with_feed(Arc::new(feed)));

    tokio::spawn(scheduler::run_score_loop(engine.clone(), config.score_interval));
    for window in Window::ALL {
        tokio::spawn(scheduler::run_trim_loop(engine.clone(), window));
    }

    let app = faceoff_api::router(engine)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Faceoff server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
