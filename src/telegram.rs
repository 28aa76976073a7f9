use anyhow::{Context, Result};
use dotabuff_scraper::PageFetcher;
use prediction_engine::{EngineError, Prediction, PredictionEngine, ROSTER_SIZE};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::heatmap::{self, HeatmapRenderer};
use crate::http_api::PicklineRequest;

const API_ROOT: &str = "https://api.telegram.org";
const MATCH_LINK_PREFIX: &str = "https://www.dotabuff.com/matches/";

const HELP_TEXT: &str = "Hello! I can help you with Dota 2 hero counters. \
Send 10 hero names, 5 radiant then 5 dire, separated by commas or spaces, \
and I'll tell you the win rate for each team. For example: \
muerta, es, beastmaster, tiny, sd, gyro, snapfire, underlord, hoodwink, cm. \
You can also send a Dotabuff match link.";

const UNKNOWN_TEXT: &str = "I'm sorry, I didn't understand that. Please type /start or /help for instructions.";

#[derive(Debug, Deserialize)]
struct TgUpdatesResponse {
    ok: bool,
    result: Vec<TgUpdate>,
}

#[derive(Debug, Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    chat: TgChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, PartialEq)]
pub enum BotCommand {
    Help,
    Draft(Vec<String>),
    MatchLink(String),
    Unknown,
}

/// Commas win over whitespace so multi-word names can be typed in full.
pub fn parse_command(text: &str) -> BotCommand {
    let text = text.trim();
    if text == "/start" || text == "/help" {
        return BotCommand::Help;
    }
    if text.starts_with(MATCH_LINK_PREFIX) {
        return BotCommand::MatchLink(text.to_string());
    }

    let names: Vec<String> = if text.contains(',') {
        text.split(',').map(|s| s.trim().to_string()).collect()
    } else {
        text.split_whitespace().map(str::to_string).collect()
    };
    if names.len() == 2 * ROSTER_SIZE && names.iter().all(|n| !n.is_empty()) {
        BotCommand::Draft(names)
    } else {
        BotCommand::Unknown
    }
}

pub fn format_scores(p: &Prediction) -> String {
    format!("Radiant winrate: {:.2}%\nDire winrate: {:.2}%", p.radiant, p.dire)
}

fn error_reply(what: &str, e: &EngineError) -> String {
    match e {
        EngineError::NotReady => e.to_string(),
        _ => format!("Error {what}: {e}"),
    }
}

pub struct TelegramBot {
    client: reqwest::Client,
    token: String,
    engine: Arc<PredictionEngine>,
    fetcher: Arc<PageFetcher>,
    renderer: Option<HeatmapRenderer>,
}

impl TelegramBot {
    pub fn new(
        token: String,
        engine: Arc<PredictionEngine>,
        fetcher: Arc<PageFetcher>,
        renderer: Option<HeatmapRenderer>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(70))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, token, engine, fetcher, renderer }
    }

    /// Long-polls forever; transport errors back off and retry.
    pub async fn run(&self) {
        info!("telegram bot polling");
        let mut update_offset: i64 = 0;

        loop {
            match self.get_updates(update_offset).await {
                Ok(resp) if resp.ok => {
                    for u in resp.result {
                        update_offset = u.update_id + 1;
                        let Some(msg) = u.message else { continue };
                        let Some(text) = msg.text.as_deref() else { continue };
                        info!(chat_id = msg.chat.id, text, "message received");
                        if let Err(e) = self.handle(msg.chat.id, Some(msg.message_id), text).await {
                            warn!("telegram reply failed: {e:#}");
                        }
                    }
                }
                Ok(_) => {
                    warn!("getUpdates returned ok=false");
                    sleep(Duration::from_secs(5)).await;
                }
                Err(e) => {
                    warn!("getUpdates failed: {e:#}");
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    /// Drafts pushed from the browser plugin through the HTTP API.
    pub async fn serve_pickline(&self, mut rx: mpsc::Receiver<PicklineRequest>) {
        while let Some(req) = rx.recv().await {
            info!(chat_id = req.chat_id, "pickline draft received");
            if let Err(e) = self.send_draft(req.chat_id, None, &req.names).await {
                warn!(chat_id = req.chat_id, "pickline reply failed: {e:#}");
            }
        }
    }

    async fn handle(&self, chat_id: i64, reply_to: Option<i64>, text: &str) -> Result<()> {
        match parse_command(text) {
            BotCommand::Help => self.send_message(chat_id, reply_to, HELP_TEXT).await,
            BotCommand::Unknown => self.send_message(chat_id, reply_to, UNKNOWN_TEXT).await,
            BotCommand::Draft(names) => self.send_draft(chat_id, reply_to, &names).await,
            BotCommand::MatchLink(url) => {
                let reply = match self.engine.predict_from_match_url(&self.fetcher, &url).await {
                    Ok((_, p)) => format_scores(&p),
                    Err(e) => error_reply("fetching pick winrate", &e),
                };
                self.send_message(chat_id, reply_to, &reply).await
            }
        }
    }

    /// Scores for ten names, followed by the heat map when a renderer is set.
    pub async fn send_draft(&self, chat_id: i64, reply_to: Option<i64>, names: &[String]) -> Result<()> {
        let prediction = match self.engine.predict_from_names(names) {
            Ok(p) => p,
            Err(e) => {
                let reply = error_reply("fetching pick winrate", &e);
                return self.send_message(chat_id, reply_to, &reply).await;
            }
        };
        self.send_message(chat_id, reply_to, &format_scores(&prediction)).await?;
        if let Some(renderer) = &self.renderer {
            self.send_heatmap(renderer, chat_id, reply_to, names).await?;
        }
        Ok(())
    }

    async fn send_heatmap(
        &self,
        renderer: &HeatmapRenderer,
        chat_id: i64,
        reply_to: Option<i64>,
        names: &[String],
    ) -> Result<()> {
        let matrix = match self.engine.heatmap_matrix(names) {
            Ok(m) => m,
            Err(e) => {
                let reply = error_reply("generating heatmap", &e);
                return self.send_message(chat_id, reply_to, &reply).await;
            }
        };

        let image = match renderer.render(&matrix).await {
            Ok(path) => path,
            Err(e) => {
                warn!("heatmap render failed: {e:#}");
                let reply = format!("Error generating heatmap: {e}");
                return self.send_message(chat_id, reply_to, &reply).await;
            }
        };

        let sent = self
            .send_photo(
                chat_id,
                reply_to,
                &image,
                "Here is the counter heatmap of the winrate of the heroes you selected.",
            )
            .await;
        heatmap::discard(&image).await;
        sent
    }

    async fn send_message(&self, chat_id: i64, reply_to: Option<i64>, text: &str) -> Result<()> {
        let url = format!("{API_ROOT}/bot{}/sendMessage", self.token);
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if let Some(id) = reply_to {
            body["reply_to_message_id"] = id.into();
        }
        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("sendMessage failed: {} {}", status, body);
        }
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, reply_to: Option<i64>, image: &Path, caption: &str) -> Result<()> {
        let url = format!("{API_ROOT}/bot{}/sendPhoto", self.token);
        let bytes = tokio::fs::read(image)
            .await
            .with_context(|| format!("read {}", image.display()))?;
        let photo = reqwest::multipart::Part::bytes(bytes)
            .file_name("heatmap.png")
            .mime_str("image/png")?;
        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", photo);
        if let Some(id) = reply_to {
            form = form.text("reply_to_message_id", id.to_string());
        }

        let resp = self.client.post(&url).multipart(form).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("sendPhoto failed: {} {}", status, body);
        }
        Ok(())
    }

    async fn get_updates(&self, offset: i64) -> Result<TgUpdatesResponse> {
        let url = format!(
            "{API_ROOT}/bot{}/getUpdates?offset={}&timeout=60&allowed_updates=[\"message\"]",
            self.token, offset
        );
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("getUpdates HTTP {}: {}", status, body);
        }
        let parsed: TgUpdatesResponse = serde_json::from_str(&body)
            .with_context(|| format!("parse getUpdates: {}", preview(&body)))?;
        Ok(parsed)
    }
}

/// First 200 characters, cut on a char boundary.
fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
