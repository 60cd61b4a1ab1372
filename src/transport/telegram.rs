// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Telegram Bot API over long polling.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use reqwest::blocking::{Client, multipart};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::bot::keyboard::Keyboard;
use crate::bot::{Bot, Inbound, Reply};
use crate::models::Alert;
use crate::services::alerts::{self, AlertSink};
use crate::services::users::Identity;

const API_BASE: &str = "https://api.telegram.org";
const UA: &str = concat!("finbot/", env!("CARGO_PKG_VERSION"));
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<TgUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl From<&TgUser> for Identity {
    fn from(u: &TgUser) -> Self {
        Identity {
            external_id: u.id,
            username: u.username.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TgUser,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// One event for the bot, plus the callback query to acknowledge.
#[derive(Debug)]
pub struct Work {
    pub inbound: Inbound,
    pub callback_id: Option<String>,
}

/// `None` for updates the bot does not react to (stickers, edits, ...).
pub fn to_work(update: &Update) -> Option<Work> {
    if let Some(q) = &update.callback_query {
        let chat_id = q.message.as_ref().map(|m| m.chat.id).unwrap_or(q.from.id);
        return Some(Work {
            inbound: Inbound::callback(chat_id, Identity::from(&q.from), q.data.clone().unwrap_or_default()),
            callback_id: Some(q.id.clone()),
        });
    }
    let message = update.message.as_ref()?;
    let from = message.from.as_ref()?;
    let text = message.text.as_ref()?;
    Some(Work {
        inbound: Inbound::text(message.chat.id, Identity::from(from), text.clone()),
        callback_id: None,
    })
}

/// Split a poll batch by user, keeping each user's events in arrival order.
pub fn group_by_user(updates: &[Update]) -> Vec<Vec<Work>> {
    let mut groups: BTreeMap<i64, Vec<Work>> = BTreeMap::new();
    for work in updates.iter().filter_map(to_work) {
        groups.entry(work.inbound.user.external_id).or_default().push(work);
    }
    groups.into_values().collect()
}

pub fn reply_markup(keyboard: &Keyboard) -> Value {
    match keyboard {
        Keyboard::Reply(rows) => json!({
            "keyboard": rows
                .iter()
                .map(|row| row.iter().map(|text| json!({ "text": text })).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            "resize_keyboard": true,
        }),
        Keyboard::Inline(rows) => json!({
            "inline_keyboard": rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| json!({ "text": b.text, "callback_data": b.data }))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>(),
        }),
    }
}

pub struct TelegramClient {
    client: Client,
    base: String,
}

impl TelegramClient {
    pub fn new(token: &str, poll_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(poll_timeout + Duration::from_secs(15))
            .user_agent(UA)
            .build()?;
        Ok(Self {
            client,
            base: format!("{}/bot{}", API_BASE, token),
        })
    }

    fn unwrap_response<T: DeserializeOwned>(method: &str, resp: reqwest::blocking::Response) -> Result<T> {
        let status = resp.status();
        let body: ApiResponse<T> = resp
            .json()
            .with_context(|| format!("Telegram {} returned an unreadable body ({})", method, status))?;
        if !body.ok {
            bail!(
                "Telegram {} failed: {}",
                method,
                body.description.unwrap_or_else(|| status.to_string())
            );
        }
        body.result
            .with_context(|| format!("Telegram {} returned no result", method))
    }

    fn call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> Result<T> {
        let resp = self
            .client
            .post(format!("{}/{}", self.base, method))
            .json(payload)
            .send()
            .with_context(|| format!("Telegram {} request failed", method))?;
        Self::unwrap_response(method, resp)
    }

    pub fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout.as_secs(),
                "allowed_updates": ["message", "callback_query"],
            }),
        )
    }

    pub fn send_message(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<()> {
        let mut payload = json!({ "chat_id": chat_id, "text": text });
        if let Some(kb) = keyboard {
            payload["reply_markup"] = reply_markup(kb);
        }
        let _: Value = self.call("sendMessage", &payload)?;
        Ok(())
    }

    pub fn answer_callback(&self, callback_id: &str) -> Result<()> {
        let _: Value = self.call("answerCallbackQuery", &json!({ "callback_query_id": callback_id }))?;
        Ok(())
    }

    pub fn send_document(
        &self,
        chat_id: i64,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let mut form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", part);
        if let Some(kb) = keyboard {
            form = form.text("reply_markup", reply_markup(kb).to_string());
        }
        let resp = self
            .client
            .post(format!("{}/sendDocument", self.base))
            .multipart(form)
            .send()
            .context("Telegram sendDocument request failed")?;
        let _: Value = Self::unwrap_response("sendDocument", resp)?;
        Ok(())
    }

    pub fn send_replies(&self, chat_id: i64, replies: &[Reply]) -> Result<()> {
        for reply in replies {
            match &reply.document {
                Some(doc) => self.send_document(
                    chat_id,
                    &doc.filename,
                    doc.bytes.clone(),
                    &reply.text,
                    reply.keyboard.as_ref(),
                )?,
                None => self.send_message(chat_id, &reply.text, reply.keyboard.as_ref())?,
            }
        }
        Ok(())
    }
}

impl AlertSink for TelegramClient {
    fn deliver(&self, recipient: i64, alert: &Alert) -> Result<()> {
        self.send_message(recipient, &alerts::render(alert), None)
    }
}

/// Poll forever. Each batch is handled one thread per user; between batches
/// idle sessions are swept and due alerts are pushed.
pub fn run(bot: &Bot, client: &TelegramClient, poll_timeout: Duration) -> Result<()> {
    let mut offset = 0;
    info!(timeout_secs = poll_timeout.as_secs(), "telegram polling started");
    loop {
        let updates = match client.get_updates(offset, poll_timeout) {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed");
                thread::sleep(ERROR_BACKOFF);
                continue;
            }
        };
        if let Some(last) = updates.last() {
            offset = last.update_id + 1;
        }

        let groups = group_by_user(&updates);
        if !groups.is_empty() {
            debug!(updates = updates.len(), users = groups.len(), "batch received");
        }
        thread::scope(|s| {
            for group in &groups {
                s.spawn(move || {
                    for work in group {
                        if let Some(id) = &work.callback_id {
                            if let Err(e) = client.answer_callback(id) {
                                debug!(error = %e, "answerCallbackQuery failed");
                            }
                        }
                        let replies = bot.handle(&work.inbound);
                        if let Err(e) = client.send_replies(work.inbound.chat_id, &replies) {
                            warn!(chat_id = work.inbound.chat_id, error = %e, "could not send reply");
                        }
                    }
                });
            }
        });

        let now = Utc::now();
        let swept = bot.sweep_sessions(now);
        if swept > 0 {
            debug!(swept, "idle sessions dropped");
        }
        if let Err(e) = alerts::deliver_due(bot.storage(), client, now) {
            error!(error = %e, "alert run failed");
        }
    }
}
