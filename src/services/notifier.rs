use std::sync::Arc;

use reqwest::Client as HttpClient;
use serde_json::json;

use crate::{
    config::Config,
    error::{AppError, AppResult},
};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Chat notification sender
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Send `message`; `Ok(false)` when the backend declined it
    async fn send(&self, message: &str) -> AppResult<bool>;
}

/// Builds the configured notifier, or `None` when notifications are off
pub fn build_notifier(config: &Config) -> AppResult<Option<Arc<dyn Notifier>>> {
    if !config.has_telegram() {
        tracing::info!("Telegram disabled, notifications will be skipped");
        return Ok(None);
    }

    Ok(Some(Arc::new(TelegramNotifier::new(config)?)))
}

pub struct TelegramNotifier {
    http_client: HttpClient,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &Config) -> AppResult<Self> {
        let (bot_token, chat_id) = match (&config.telegram_bot_token, &config.telegram_chat_id) {
            (Some(token), Some(chat)) => (token.clone(), chat.clone()),
            _ => {
                return Err(AppError::InvalidInput(
                    "TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID are required".to_string(),
                ))
            }
        };

        let http_client = HttpClient::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_url: TELEGRAM_API_URL.to_string(),
            bot_token,
            chat_id,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> AppResult<bool> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);

        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "chat_id": self.chat_id, "text": message }))
            .send()
            .await
            .map_err(|e| AppError::NotificationFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Telegram rejected message");
            return Ok(false);
        }

        tracing::info!("Telegram message sent");
        Ok(true)
    }
}

/// Numbered recommendation list for chat delivery
pub fn recommendations_message(titles: &[String], playlist: Option<&str>) -> String {
    let mut message = String::from("🎥 Here are your AI recommendations:\n");
    let lines: Vec<String> = titles
        .iter()
        .enumerate()
        .map(|(idx, title)| format!("{}. {}", idx + 1, title))
        .collect();
    message.push_str(&lines.join("\n"));

    if let Some(name) = playlist {
        message.push_str(&format!("\n\n📺 Playlist '{}' updated in Plex.", name));
    }

    message
}

pub fn sync_message(item_count: usize) -> String {
    format!("📚 Library synced: {} movies indexed.", item_count)
}
