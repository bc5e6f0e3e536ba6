use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use faceoff_engine::Engine;
use faceoff_engine::trim::trim_interval;
use faceoff_types::feed::FeedEvent;
use faceoff_types::models::Window;

/// Drains the score log on a fixed interval, then prunes consumed events.
pub async fn run_score_loop(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let worker = engine.clone();
        let result = tokio::task::spawn_blocking(move || {
            let report = worker.run_score_tick()?;
            let pruned = worker.prune_events()?;
            Ok::<_, faceoff_engine::FaceoffError>((report, pruned))
        })
        .await;

        match result {
            Ok(Ok((report, pruned))) => {
                if report.events_seen > 0 || pruned > 0 {
                    info!(
                        applied = report.events_applied,
                        skipped = report.events_skipped,
                        pruned,
                        "Score tick done"
                    );
                }
            }
            Ok(Err(e)) => warn!("Score tick error: {}", e),
            Err(e) => error!("spawn_blocking join error: {}", e),
        }
    }
}

/// Trims one window's leaderboard on that window's cadence.
pub async fn run_trim_loop(engine: Arc<Engine>, window: Window) {
    let mut interval = tokio::time::interval(trim_interval(window));

    loop {
        interval.tick().await;

        let worker = engine.clone();
        match tokio::task::spawn_blocking(move || worker.run_trim(window)).await {
            Ok(Ok(report)) => {
                if report.rows_deleted > 0 {
                    info!(window = %window, deleted = report.rows_deleted, "Trim done");
                }
            }
            Ok(Err(e)) => warn!(window = %window, "Trim error: {}", e),
            Err(e) => error!("spawn_blocking join error: {}", e),
        }
    }
}

/// Stand-in consumer for the notification collaborator.
pub async fn run_feed_log(mut rx: broadcast::Receiver<FeedEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => debug!(recipient = %event.recipient(), ?event, "feed event"),
            Err(broadcast::error::RecvError::Lagged(n)) => warn!("Feed consumer lagged by {} events", n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
