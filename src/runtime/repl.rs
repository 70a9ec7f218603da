use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::constants::QUIT_COMMANDS;
use crate::session::{ChatSession, Message, Role, SendOutcome};

const PENDING_TICK: Duration = Duration::from_millis(400);

/// Print one transcript message
pub fn render_message(out: &mut impl Write, message: &Message) -> Result<()> {
    match message.role() {
        Role::User => writeln!(out, "{} {}", "You:".bold().blue(), message.content())?,
        Role::Assistant => {
            writeln!(out, "{}", "BetaHealth AI:".bold().cyan())?;
            writeln!(out, "{}", message.content())?;
        }
    }
    writeln!(out)?;
    Ok(())
}

/// Line-oriented chat loop. Reads questions from `input` until EOF or a quit
/// command and writes replies to `out`.
pub async fn run_repl<R, W>(session: &ChatSession, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    for message in session.transcript().iter() {
        render_message(out, message)?;
    }
    writeln!(
        out,
        "{}",
        format!("Type your question, or {} to leave.", QUIT_COMMANDS[0]).dimmed()
    )?;

    let mut lines = input.lines();
    loop {
        write!(out, "{} ", ">".green().bold())?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        if QUIT_COMMANDS.iter().any(|quit| *quit == line.trim()) {
            break;
        }

        let before = session.len();
        let outcome = send_with_indicator(session, &line, out).await?;

        match outcome {
            SendOutcome::Ignored => continue,
            SendOutcome::Busy => {
                writeln!(out, "{}", "Still waiting for the previous answer...".yellow())?;
                continue;
            }
            SendOutcome::Answered | SendOutcome::Fallback => {
                // The user's own line is already on screen
                for message in session
                    .transcript()
                    .since(before)
                    .iter()
                    .filter(|m| m.role() == Role::Assistant)
                {
                    render_message(out, message)?;
                }
            }
        }
    }

    Ok(())
}

/// Drive one `send`, printing a typing indicator while the session is busy
async fn send_with_indicator<W: Write>(
    session: &ChatSession,
    line: &str,
    out: &mut W,
) -> Result<SendOutcome> {
    let turn = session.send(line);
    tokio::pin!(turn);

    let mut ticker = tokio::time::interval(PENDING_TICK);
    ticker.tick().await;

    let mut shown = false;
    let outcome = loop {
        tokio::select! {
            outcome = &mut turn => break outcome,
            _ = ticker.tick() => {
                if session.is_busy() {
                    if !shown {
                        write!(out, "{}", "BetaHealth AI is typing".dimmed())?;
                        shown = true;
                    }
                    write!(out, "{}", ".".dimmed())?;
                    out.flush()?;
                }
            }
        }
    };

    if shown {
        writeln!(out)?;
    }
    Ok(outcome)
}
