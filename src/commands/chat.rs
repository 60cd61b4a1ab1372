// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use std::io;
use std::path::PathBuf;

use crate::bot::Bot;
use crate::services::users::Identity;
use crate::transport::console;

pub fn handle(bot: &Bot, sub: &clap::ArgMatches) -> Result<()> {
    let user = sub.get_one::<i64>("user").copied().unwrap_or(1);
    let out = sub
        .get_one::<PathBuf>("out")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let who = Identity {
        first_name: sub.get_one::<String>("name").cloned(),
        ..Identity::new(user)
    };
    let stdin = io::stdin();
    console::run(bot, who, stdin.lock(), io::stdout(), &out)
}
