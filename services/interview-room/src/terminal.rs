//! Line-oriented terminal surface of the interview room.
//!
//! Output is append-only: finished turns are printed once, the reply being
//! streamed is extended in place as chunks arrive, and status, notices and
//! fatal errors are printed when they change.

use crate::config::DISPLAY_UTC_OFFSET_HOURS;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use interview_core::room::{RoomView, UserAction};
use interview_core::session_state::ConnectionStatus;
use interview_core::templates;
use interview_core::turn::{Speaker, Turn, TurnKind};
use interview_realtime::types::Language;
use std::io::{self, BufRead, Write};
use tokio::sync::mpsc;

pub fn format_time(timestamp: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(DISPLAY_UTC_OFFSET_HOURS * 3600).unwrap_or_else(|| Utc.fix());
    timestamp.with_timezone(&offset).format("%H:%M").to_string()
}

fn speaker_label(speaker: Speaker, language: Language) -> &'static str {
    match (speaker, language) {
        (Speaker::User, Language::Vi) => "Bạn",
        (Speaker::User, Language::En) => "You",
        (Speaker::Assistant, _) => "AI",
    }
}

pub struct TerminalRenderer<W: Write> {
    out: W,
    header_done: bool,
    printed: usize,
    // Index and text already written of the reply being streamed.
    partial: Option<(usize, String)>,
    // An open reply that other turns were printed after. It is printed
    // again in full once it closes.
    detached: Option<(usize, String)>,
    status: Option<String>,
    notice: Option<String>,
    fatal_shown: bool,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_done: false,
            printed: 0,
            partial: None,
            detached: None,
            status: None,
            notice: None,
            fatal_shown: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(&mut self, view: &RoomView<'_>) -> io::Result<()> {
        let language = view.descriptor.language();
        if !self.header_done {
            self.write_header(view)?;
            self.header_done = true;
        }

        if let Some((at, written)) = self.detached.take() {
            match view.turns.get(at) {
                Some(turn) if view.open_turn != Some(at) => {
                    if turn.content() != written {
                        self.write_turn(turn, language)?;
                    }
                }
                _ => self.detached = Some((at, written)),
            }
        }

        let mut index = self.printed;
        while index < view.turns.len() {
            let turn = &view.turns[index];
            if view.open_turn == Some(index) {
                if index + 1 == view.turns.len() {
                    self.stream(index, turn, language)?;
                    break;
                }
                self.detach(index, turn, language)?;
                index += 1;
                self.printed = index;
                continue;
            }
            self.finish(index, turn, language)?;
            index += 1;
            self.printed = index;
        }

        // Status lines would cut a streamed reply in half.
        if self.partial.is_none() {
            self.write_status(view)?;
        }
        self.out.flush()
    }

    fn write_header(&mut self, view: &RoomView<'_>) -> io::Result<()> {
        let descriptor = view.descriptor;
        let language = descriptor.language();
        let mut parts = vec![format!("#{}", descriptor.id())];
        if let Some(position) = descriptor.position() {
            parts.push(position.to_string());
        }
        if let Some(industry) = descriptor.industry() {
            parts.push(industry.to_string());
        }
        parts.push(descriptor.style().label(language).to_string());
        writeln!(self.out, "== {} ==", parts.join(" | "))?;
        writeln!(
            self.out,
            "Commands: /end /evaluate /retry /dismiss /quit (anything else is sent as a message)"
        )
    }

    fn stream(&mut self, index: usize, turn: &Turn, language: Language) -> io::Result<()> {
        match self.partial.as_mut() {
            Some((at, written)) if *at == index => {
                match turn.content().strip_prefix(written.as_str()) {
                    Some(rest) => {
                        write!(self.out, "{}", rest)?;
                        written.push_str(rest);
                    }
                    None => {
                        // The reply restarted; print it again from the top.
                        write!(self.out, "\n    {}", turn.content())?;
                        *written = turn.content().to_string();
                    }
                }
            }
            _ => {
                write!(
                    self.out,
                    "[{}] {}: {}",
                    format_time(turn.timestamp()),
                    speaker_label(turn.speaker(), language),
                    turn.content()
                )?;
                self.partial = Some((index, turn.content().to_string()));
            }
        }
        Ok(())
    }

    // Ends the line of a reply that is still open so later turns can follow it.
    fn detach(&mut self, index: usize, turn: &Turn, language: Language) -> io::Result<()> {
        self.finish(index, turn, language)?;
        self.detached = Some((index, turn.content().to_string()));
        Ok(())
    }

    fn finish(&mut self, index: usize, turn: &Turn, language: Language) -> io::Result<()> {
        if let Some((at, written)) = self.partial.take() {
            if at == index {
                match turn.content().strip_prefix(written.as_str()) {
                    Some(rest) => writeln!(self.out, "{}", rest)?,
                    None => writeln!(self.out, "\n    {}", turn.content())?,
                }
                return Ok(());
            }
            writeln!(self.out)?;
        }
        self.write_turn(turn, language)
    }

    fn write_turn(&mut self, turn: &Turn, language: Language) -> io::Result<()> {
        let time = format_time(turn.timestamp());
        match turn.kind() {
            TurnKind::Normal if turn.is_synthetic() => {
                writeln!(self.out, "  ... {}", turn.content())
            }
            TurnKind::Normal => writeln!(
                self.out,
                "[{}] {}: {}",
                time,
                speaker_label(turn.speaker(), language),
                turn.content()
            ),
            TurnKind::Error => match turn.retry() {
                Some(_) => writeln!(self.out, "[{}] (!) {}  (/retry to resend)", time, turn.content()),
                None => writeln!(self.out, "[{}] (!) {}", time, turn.content()),
            },
            TurnKind::Evaluation => writeln!(self.out, "\n{}\n", turn.content()),
        }
    }

    fn write_status(&mut self, view: &RoomView<'_>) -> io::Result<()> {
        if let Some(fatal) = view.fatal {
            if !self.fatal_shown {
                writeln!(self.out, "(x) {}. Type /quit to leave the room.", fatal)?;
                self.fatal_shown = true;
            }
            return Ok(());
        }

        let status = status_line(view);
        if self.status.as_deref() != Some(status.as_str()) {
            writeln!(self.out, "-- {} --", status)?;
            self.status = Some(status);
        }

        let notice = view.notice.map(str::to_string);
        if notice != self.notice {
            if let Some(message) = &notice {
                writeln!(self.out, "(!) {}  (/dismiss, /retry)", message)?;
            }
            self.notice = notice;
        }
        Ok(())
    }
}

fn status_line(view: &RoomView<'_>) -> String {
    let connection = match view.connection {
        ConnectionStatus::Connected => "connected",
        ConnectionStatus::Disconnected => "disconnected",
    };
    let mut actions = Vec::new();
    if view.can_send {
        actions.push("send");
    }
    if view.can_evaluate {
        actions.push("/evaluate");
    }
    if view.can_end {
        actions.push("/end");
    }
    let mut line = format!("{} | {}", connection, view.phase.label());
    if view.is_ai_responding {
        line.push_str(" | AI is answering");
    }
    if !actions.is_empty() {
        line.push_str(&format!(" | {}", actions.join(" ")));
    }
    line
}

/// What a typed line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Action(UserAction),
    ConfirmEnd,
    Help,
}

pub fn parse_line(line: &str) -> Option<Input> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let input = match trimmed {
        "/end" => Input::ConfirmEnd,
        "/evaluate" => Input::Action(UserAction::Evaluate),
        "/dismiss" => Input::Action(UserAction::DismissNotice),
        "/retry" => Input::Action(UserAction::RetryFailed),
        "/quit" | "/leave" => Input::Action(UserAction::Leave),
        command if command.starts_with('/') => Input::Help,
        _ => Input::Action(UserAction::Submit(line.trim_end_matches(['\r', '\n']).to_string())),
    };
    Some(input)
}

fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "c" | "có" | "co"
    )
}

/// Reads stdin on its own thread and forwards user actions. The channel
/// closes when stdin does, which the room treats as leaving.
pub fn spawn_input(language: Language) -> mpsc::Receiver<UserAction> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        while let Some(line) = lines.next() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("failed to read stdin: {}", e);
                    break;
                }
            };
            let action = match parse_line(&line) {
                None => continue,
                Some(Input::Help) => {
                    println!("Commands: /end /evaluate /retry /dismiss /quit");
                    continue;
                }
                Some(Input::ConfirmEnd) => {
                    println!("{} [y/N]", templates::confirm_end(language));
                    match lines.next() {
                        Some(Ok(answer)) if is_yes(&answer) => UserAction::End,
                        Some(Ok(_)) => continue,
                        _ => break,
                    }
                }
                Some(Input::Action(action)) => action,
            };
            let leaving = action == UserAction::Leave;
            if tx.blocking_send(action).is_err() || leaving {
                break;
            }
        }
        tracing::debug!("input reader finished");
    });
    rx
}
