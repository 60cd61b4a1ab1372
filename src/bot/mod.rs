// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The conversation engine: one inbound event in, a list of replies out.
//!
//! [`Bot`] is `Sync`; transports may call [`Bot::handle`] from many threads
//! at once. Events of the same user should be delivered in order.

pub mod callback;
pub mod handlers;
pub mod keyboard;
pub mod messages;
pub mod render;
pub mod session;
pub mod state;

use chrono::{DateTime, Utc};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{error, warn};

use crate::config::Settings;
use crate::db::Storage;
use crate::services::investments::PriceSource;
use crate::services::users::{self, Identity};

use handlers::Ctx;
use keyboard::Keyboard;
use session::{SessionKey, SessionStore};
use state::Menu;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Text(String),
    /// Raw payload of a pressed inline button.
    Callback(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub chat_id: i64,
    pub user: Identity,
    pub input: Input,
}

impl Inbound {
    pub fn text(chat_id: i64, user: Identity, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            user,
            input: Input::Text(text.into()),
        }
    }

    pub fn callback(chat_id: i64, user: Identity, data: impl Into<String>) -> Self {
        Self {
            chat_id,
            user,
            input: Input::Callback(data.into()),
        }
    }

    fn session_key(&self) -> SessionKey {
        (self.chat_id, self.user.external_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub document: Option<Document>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            document: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }
}

pub struct Bot {
    storage: Storage,
    settings: Settings,
    sessions: SessionStore,
    prices: Option<Box<dyn PriceSource>>,
}

impl Bot {
    pub fn new(storage: Storage, settings: Settings) -> Self {
        let sessions = SessionStore::new(settings.session_timeout);
        Self {
            storage,
            settings,
            sessions,
            prices: None,
        }
    }

    pub fn with_prices(mut self, prices: impl PriceSource + 'static) -> Self {
        self.prices = Some(Box::new(prices));
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn handle(&self, inbound: &Inbound) -> Vec<Reply> {
        self.handle_at(inbound, Utc::now())
    }

    /// Same as [`Bot::handle`] with an explicit clock.
    pub fn handle_at(&self, inbound: &Inbound, now: DateTime<Utc>) -> Vec<Reply> {
        match catch_unwind(AssertUnwindSafe(|| self.dispatch(inbound, now))) {
            Ok(replies) => replies,
            Err(_) => {
                error!(
                    chat_id = inbound.chat_id,
                    external_id = inbound.user.external_id,
                    "handler panicked, session reset"
                );
                self.sessions.clear(inbound.session_key());
                vec![handlers::menu_reply_with(messages::GENERIC_FAILURE, Menu::Main)]
            }
        }
    }

    /// Drop idle sessions; returns how many were removed.
    pub fn sweep_sessions(&self, now: DateTime<Utc>) -> usize {
        self.sessions.sweep(now)
    }

    fn dispatch(&self, inbound: &Inbound, now: DateTime<Utc>) -> Vec<Reply> {
        let external_id = inbound.user.external_id;
        if !self.settings.is_allowed(external_id) {
            warn!(external_id, "message from user outside the allow list");
            return vec![Reply::text(messages::NOT_AUTHORIZED)];
        }
        let user = match users::get_or_create_user(&self.storage, &self.settings, &inbound.user) {
            Ok(user) => user,
            Err(e) => {
                error!(external_id, error = %e, "could not load user");
                return vec![Reply::text(messages::TRY_AGAIN_LATER)];
            }
        };

        let key = inbound.session_key();
        let (mut session, expired) = self.sessions.load(key, now);
        session.last_seen = now;

        let starting = matches!(&inbound.input, Input::Text(t) if handlers::command(t) == Some("start"));
        if expired && !starting {
            self.sessions.store(key, session);
            return vec![handlers::menu_reply_with(messages::SESSION_EXPIRED, Menu::Main)];
        }

        let tz = users::timezone_of(&user, &self.settings);
        let ctx = Ctx {
            storage: &self.storage,
            settings: &self.settings,
            prices: self.prices.as_deref(),
            today: now.with_timezone(&tz).date_naive(),
            now,
            user,
        };
        let replies = handlers::route(&ctx, &mut session, &inbound.input);
        self.sessions.store(key, session);
        replies
    }
}
