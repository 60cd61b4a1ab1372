// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};

use crate::bot::Bot;
use crate::transport::telegram::{self, TelegramClient};

pub fn handle(bot: &Bot) -> Result<()> {
    let settings = bot.settings();
    let token = settings
        .bot_token
        .as_deref()
        .context("BOT_TOKEN is not set")?;
    let client = TelegramClient::new(token, settings.poll_timeout)?;
    telegram::run(bot, &client, settings.poll_timeout)
}
