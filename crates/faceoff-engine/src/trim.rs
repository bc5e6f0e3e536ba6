use std::time::Duration;

use tracing::{debug, info};

use faceoff_types::api::TrimReport;
use faceoff_types::models::Window;

use crate::{Engine, Result};

/// How often each window is trimmed.
pub fn trim_interval(window: Window) -> Duration {
    match window {
        Window::Hour => Duration::from_secs(60 * 60),
        Window::Day | Window::Week | Window::Month | Window::Year => {
            Duration::from_secs(24 * 60 * 60)
        }
    }
}

impl Engine {
    /// Deletes every row of `window`, in every segment, whose photo was posted
    /// before the window's start.
    pub fn run_trim(&self, window: Window) -> Result<TrimReport> {
        let retry = &self.config.retry;
        let cutoff = self.now() - window.span();
        let segments = retry.run("leaderboard_segments", || self.db.leaderboard_segments(window))?;

        let mut report = TrimReport {
            window,
            segments_scanned: 0,
            rows_deleted: 0,
        };
        for segment in &segments {
            report.segments_scanned += 1;
            loop {
                let expired = retry.run("leaderboard_expired", || {
                    self.db
                        .leaderboard_expired(window, segment, cutoff, self.config.trim_batch)
                })?;
                for photo_id in &expired {
                    if retry.run("delete_leaderboard", || {
                        self.db.delete_leaderboard(window, segment, photo_id)
                    })? {
                        report.rows_deleted += 1;
                    }
                }
                if expired.is_empty() || (expired.len() as u64) < u64::from(self.config.trim_batch) {
                    break;
                }
            }
            debug!(window = %window, segment = %segment, "segment trimmed");
        }

        info!(
            window = %window,
            segments = report.segments_scanned,
            deleted = report.rows_deleted,
            "leaderboard trim finished"
        );
        Ok(report)
    }
}
