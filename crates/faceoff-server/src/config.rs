use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};

use faceoff_engine::EngineConfig;
use faceoff_types::models::Gender;

pub struct ServerConfig {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub score_interval: Duration,
    pub engine: EngineConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut engine = EngineConfig::default();
        engine.score_budget = Duration::from_secs(env_or("FACEOFF_SCORE_BUDGET_SECS", 180)?);
        engine.score_batch = env_or("FACEOFF_SCORE_BATCH", engine.score_batch)?;
        engine.shards = env_or("FACEOFF_SHARDS", engine.shards)?;
        engine.segments.forced_gender = match std::env::var("FACEOFF_FORCED_GENDER") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<Gender>()
                    .map_err(|e| anyhow!("FACEOFF_FORCED_GENDER: {e}"))?,
            ),
            _ => None,
        };
        if engine.shards == 0 {
            anyhow::bail!("FACEOFF_SHARDS must be at least 1");
        }

        Ok(Self {
            db_path: PathBuf::from(env_or("FACEOFF_DB_PATH", "faceoff.db".to_string())?),
            host: env_or("FACEOFF_HOST", "0.0.0.0".to_string())?,
            port: env_or("FACEOFF_PORT", 3000)?,
            score_interval: Duration::from_secs(env_or("FACEOFF_SCORE_INTERVAL_SECS", 60)?.max(1)),
            engine,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("invalid {key}={raw}")),
        Err(_) => Ok(default),
    }
}
