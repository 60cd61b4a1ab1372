// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::bot::Reply;
use crate::bot::messages as msg;
use crate::bot::session::Session;
use crate::bot::state::{Menu, State};
use crate::error::Result;

use super::{Ctx, finance, go_to, menu_reply_with, unknown_option};

pub(super) fn start(ctx: &Ctx<'_>, session: &mut Session) -> Vec<Reply> {
    session.reset(State::MainMenu);
    let welcome = msg::WELCOME.replace("{name}", &ctx.user.display_name());
    vec![menu_reply_with(&welcome, Menu::Main)]
}

pub(super) fn on_text(ctx: &Ctx<'_>, session: &mut Session, text: &str) -> Result<Vec<Reply>> {
    Ok(match text {
        msg::BTN_FINANCE => go_to(session, Menu::Finance),
        msg::BTN_INVESTMENTS => go_to(session, Menu::Investment),
        msg::BTN_SETTINGS => go_to(session, Menu::Settings),
        msg::BTN_REPORTS => vec![finance::month_summary(ctx)?, finance::analysis(ctx)?],
        msg::BTN_HELP => vec![Reply::text(msg::HELP)],
        _ => unknown_option(session),
    })
}
