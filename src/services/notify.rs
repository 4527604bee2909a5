//! Notification sink
//!
//! One formatted text message per plan approval, sent to the configured
//! Telegram destination. Best-effort from the lifecycle's perspective:
//! failures are logged by the caller and never fail a transition.

use async_trait::async_trait;
use anyhow::Result;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::types::RoutePlan;

/// Text message sink abstraction
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;
}

/// Telegram sink configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub timeout_seconds: u64,
}

/// Telegram bot API client
pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn send_text(&self, text: &str) -> Result<()> {
        use anyhow::Context;

        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.config.bot_token
        );

        debug!("Sending notification to chat {}", self.config.chat_id);

        let response = self
            .client
            .post(&url)
            .json(&SendMessageRequest {
                chat_id: &self.config.chat_id,
                text,
            })
            .send()
            .await
            .context("Failed to send Telegram message")?;

        if !response.status().is_success() {
            anyhow::bail!("Telegram returned status {}", response.status());
        }

        Ok(())
    }
}

/// Build the route-by-route approval summary for a plan
pub fn format_approval_message(plan: &RoutePlan) -> String {
    let mut lines = vec![format!("Route plan approved: {}", plan.title)];

    for route in &plan.routes {
        let label = route
            .vehicle_name
            .as_deref()
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("Route {}", route.order + 1));

        let distance = route
            .metrics
            .distance_km
            .map(|km| format!(", {km:.1} km"))
            .unwrap_or_default();

        lines.push(format!(
            "\n{label}: {} tasks{distance}",
            route.metrics.total_tasks
        ));

        for entry in &route.tasks {
            lines.push(format!("  {}. {}", entry.order + 1, entry.title));
        }

        if let Some(url) = &route.map_url {
            lines.push(format!("  Map: {url}"));
        }
    }

    if let Some(total) = plan.metrics.total_distance_km {
        lines.push(format!("\nTotal distance: {total:.1} km"));
    }

    lines.join("\n")
}
