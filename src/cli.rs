// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, crate_version, value_parser};
use std::path::PathBuf;

fn user_arg() -> Arg {
    Arg::new("user")
        .long("user")
        .short('u')
        .help("Chat user id (Telegram id for real users)")
        .value_parser(value_parser!(i64))
        .required(true)
}

fn json_args() -> [Arg; 2] {
    [
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print JSON instead of a table"),
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print one JSON object per line"),
    ]
}

pub fn build_cli() -> Command {
    Command::new("finbot")
        .version(crate_version!())
        .about("Personal finance chat bot: transactions, monthly reports and investments")
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("SQLite database file (overrides FINBOT_DB)"),
        )
        .subcommand(Command::new("init").about("Create the database schema"))
        .subcommand(
            Command::new("chat")
                .about("Talk to the bot on this terminal")
                .arg(
                    Arg::new("user")
                        .long("user")
                        .short('u')
                        .value_parser(value_parser!(i64))
                        .default_value("1")
                        .help("Chat user id"),
                )
                .arg(Arg::new("name").long("name").help("First name shown in greetings"))
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .default_value(".")
                        .help("Directory for exported files"),
                ),
        )
        .subcommand(Command::new("telegram").about("Serve the bot over Telegram (needs BOT_TOKEN)"))
        .subcommand(
            Command::new("report")
                .about("Monthly summary, health score and portfolio for one user")
                .arg(user_arg())
                .arg(Arg::new("month").long("month").help("YYYY-MM (default: current month)"))
                .args(json_args()),
        )
        .subcommand(
            Command::new("export")
                .about("Export a user's data")
                .arg(user_arg())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_parser(["csv", "json"])
                        .default_value("csv"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Output file or directory (default: current directory)"),
                ),
        )
        .subcommand(
            Command::new("alerts")
                .about("Scheduled alerts")
                .subcommand(
                    Command::new("pending")
                        .about("Alerts due now for users with notifications on")
                        .args(json_args()),
                )
                .subcommand(
                    Command::new("add")
                        .about("Schedule an alert")
                        .arg(user_arg())
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .value_parser(["dividend", "market", "opportunity", "reminder"])
                                .default_value("reminder"),
                        )
                        .arg(Arg::new("title").long("title").required(true))
                        .arg(Arg::new("message").long("message").required(true))
                        .arg(
                            Arg::new("at")
                                .long("at")
                                .help("RFC 3339 timestamp (default: now)"),
                        )
                        .arg(
                            Arg::new("priority")
                                .long("priority")
                                .value_parser(value_parser!(u8).range(0..=10))
                                .default_value("0"),
                        ),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn global_db_reaches_subcommands() {
        let m = build_cli()
            .try_get_matches_from(["finbot", "report", "--user", "7", "--db", "/tmp/x.sqlite"])
            .unwrap();
        let (name, sub) = m.subcommand().unwrap();
        assert_eq!(name, "report");
        assert_eq!(sub.get_one::<i64>("user"), Some(&7));
        assert_eq!(
            m.get_one::<PathBuf>("db").or_else(|| sub.get_one::<PathBuf>("db")),
            Some(&PathBuf::from("/tmp/x.sqlite"))
        );
    }
}
