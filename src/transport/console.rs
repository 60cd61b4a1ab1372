// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::bot::keyboard::{InlineButton, Keyboard};
use crate::bot::{Bot, Inbound, Reply};
use crate::services::users::Identity;

/// Line-oriented chat on any reader/writer pair. Inline buttons of the last
/// message that had them are pressed by typing `#n`; exported documents are
/// written to `out_dir`.
pub fn run<R: BufRead, W: Write>(
    bot: &Bot,
    who: Identity,
    mut input: R,
    mut output: W,
    out_dir: &Path,
) -> Result<()> {
    let chat_id = who.external_id;
    let mut buttons: Vec<InlineButton> = Vec::new();

    let greeting = bot.handle(&Inbound::text(chat_id, who.clone(), "/start"));
    write_replies(&mut output, &greeting, &mut buttons, out_dir)?;

    let mut line = String::new();
    loop {
        write!(output, "> ")?;
        output.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text, "/quit" | "/exit" | "/sair") {
            break;
        }

        let inbound = match text.strip_prefix('#').and_then(|n| n.parse::<usize>().ok()) {
            Some(n) => match n.checked_sub(1).and_then(|i| buttons.get(i)) {
                Some(button) => Inbound::callback(chat_id, who.clone(), button.data.clone()),
                None => {
                    writeln!(output, "(não há botão #{})", n)?;
                    continue;
                }
            },
            None => Inbound::text(chat_id, who.clone(), text),
        };
        let replies = bot.handle(&inbound);
        write_replies(&mut output, &replies, &mut buttons, out_dir)?;
    }
    Ok(())
}

fn write_replies<W: Write>(
    out: &mut W,
    replies: &[Reply],
    buttons: &mut Vec<InlineButton>,
    out_dir: &Path,
) -> Result<()> {
    for reply in replies {
        writeln!(out, "\n{}", reply.text)?;
        if let Some(doc) = &reply.document {
            fs::create_dir_all(out_dir)
                .with_context(|| format!("Create export dir {}", out_dir.display()))?;
            let path = out_dir.join(&doc.filename);
            fs::write(&path, &doc.bytes).with_context(|| format!("Write {}", path.display()))?;
            writeln!(out, "📎 {}", path.display())?;
        }
        match &reply.keyboard {
            Some(Keyboard::Reply(rows)) => {
                for row in rows {
                    writeln!(out, "  [ {} ]", row.join(" | "))?;
                }
            }
            Some(Keyboard::Inline(rows)) => {
                buttons.clear();
                for row in rows {
                    let cells: Vec<String> = row
                        .iter()
                        .map(|b| {
                            buttons.push(b.clone());
                            format!("#{} {}", buttons.len(), b.text)
                        })
                        .collect();
                    writeln!(out, "  {}", cells.join("   "))?;
                }
            }
            None => {}
        }
    }
    Ok(())
}
