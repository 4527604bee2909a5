//! Configuration management

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::services::matrix::MatrixConfig;
use crate::services::notify::TelegramConfig;
use crate::services::optimizer::OptimizeOptions;
use crate::services::solver::SolverConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Travel matrix API endpoint (optional, falls back to straight-line
    /// geometry when unset or unreachable)
    pub matrix_endpoint: Option<String>,
    pub matrix_timeout_seconds: u64,

    /// Planning defaults applied when a request does not override them
    pub average_speed_kmh: f64,

    /// External VRP solver binary (optional)
    pub solver_enabled: bool,
    pub solver_bin: Option<PathBuf>,
    pub solver_time_limit_seconds: u64,

    /// Telegram notifications (optional; disabled when either is unset)
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let matrix_endpoint = std::env::var("MATRIX_API_URL").ok();
        let matrix_timeout_seconds =
            parse_or("MATRIX_TIMEOUT_SECONDS", std::env::var("MATRIX_TIMEOUT_SECONDS").ok(), 10)?;

        let average_speed_kmh =
            parse_or("AVERAGE_SPEED_KMH", std::env::var("AVERAGE_SPEED_KMH").ok(), 35.0)?;

        let solver_bin = std::env::var("VRP_SOLVER_BIN").ok().map(PathBuf::from);
        let solver_enabled = parse_flag(std::env::var("VRP_SOLVER_ENABLED").ok())
            && solver_bin.is_some();
        let solver_time_limit_seconds =
            parse_or("VRP_TIME_LIMIT_SECONDS", std::env::var("VRP_TIME_LIMIT_SECONDS").ok(), 10)?;

        let telegram_bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok();
        let telegram_chat_id = std::env::var("TELEGRAM_CHAT_ID").ok();

        Ok(Self {
            database_url,
            matrix_endpoint,
            matrix_timeout_seconds,
            average_speed_kmh,
            solver_enabled,
            solver_bin,
            solver_time_limit_seconds,
            telegram_bot_token,
            telegram_chat_id,
        })
    }

    pub fn matrix(&self) -> MatrixConfig {
        MatrixConfig {
            endpoint: self.matrix_endpoint.clone(),
            timeout_seconds: self.matrix_timeout_seconds,
            ..MatrixConfig::default()
        }
    }

    pub fn solver(&self) -> SolverConfig {
        SolverConfig {
            enabled: self.solver_enabled,
            bin: self.solver_bin.clone(),
            args: vec![],
            time_limit_seconds: self.solver_time_limit_seconds,
        }
    }

    pub fn optimize_defaults(&self) -> OptimizeOptions {
        OptimizeOptions {
            average_speed_kmh: self.average_speed_kmh,
            time_limit_seconds: self.solver_time_limit_seconds,
            ..OptimizeOptions::default()
        }
    }

    pub fn telegram(&self) -> Option<TelegramConfig> {
        match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig {
                bot_token: token.clone(),
                chat_id: chat_id.clone(),
                timeout_seconds: 10,
            }),
            _ => None,
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} has invalid value: {value}")),
        None => Ok(default),
    }
}

fn parse_flag(raw: Option<String>) -> bool {
    matches!(raw.as_deref(), Some("1") | Some("true") | Some("yes"))
}
