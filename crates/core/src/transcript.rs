use crate::templates;
use crate::turn::{Speaker, Turn};
use chrono::{DateTime, Utc};
use interview_types::Language;

/// Ordered turns of one session plus the streaming state of the single
/// assistant turn that may still be growing.
///
/// The accumulation buffer is the source of truth for the open turn: every
/// chunk rewrites the turn's content with the whole buffer, so reading the
/// transcript between chunks can never duplicate text.
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    open: Option<usize>,
    buffer: String,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn open_turn(&self) -> Option<&Turn> {
        self.open.and_then(|i| self.turns.get(i))
    }

    /// Position of the open turn in [`Transcript::turns`].
    pub fn open_index(&self) -> Option<usize> {
        self.open
    }

    pub fn is_streaming(&self) -> bool {
        self.open.is_some()
    }

    /// Replaces everything with the server's history, trusted verbatim.
    pub fn load(&mut self, history: Vec<Turn>) {
        self.turns = history;
        self.open = None;
        self.buffer.clear();
    }

    /// A user send: the literal text, then an empty assistant placeholder
    /// that becomes the open turn.
    pub fn begin_exchange(&mut self, text: &str, now: DateTime<Utc>) {
        if self.open.is_some() {
            tracing::warn!("new message while a reply is still open, sealing it");
            self.seal();
        }
        self.turns.push(Turn::user(text, now));
        self.open_placeholder(now);
    }

    pub fn typing_started(&mut self) {
        self.buffer.clear();
    }

    pub fn apply_chunk(&mut self, text: &str, now: DateTime<Utc>) {
        let index = match self.open {
            Some(index) => index,
            None => {
                tracing::warn!("chunk without an open reply, adding a placeholder");
                self.open_placeholder(now)
            }
        };
        self.buffer.push_str(text);
        if let Some(turn) = self.turns.get_mut(index) {
            turn.set_content(&self.buffer);
        }
    }

    /// Closes the open turn. Returns false for a completion nothing was waiting for.
    pub fn complete(&mut self, timestamp: DateTime<Utc>) -> bool {
        let Some(index) = self.open.take() else {
            tracing::warn!("completion without an open reply, ignoring");
            return false;
        };
        if let Some(turn) = self.turns.get_mut(index) {
            turn.set_timestamp(timestamp);
        }
        self.buffer.clear();
        true
    }

    pub fn append_evaluation(&mut self, text: &str, language: Language, now: DateTime<Utc>) {
        self.turns
            .push(Turn::evaluation(&templates::evaluation(language, text), now));
    }

    pub fn append_evaluating(&mut self, language: Language, now: DateTime<Utc>) {
        self.turns.push(Turn::notice(templates::evaluating(language), now));
    }

    pub fn append_error(&mut self, message: &str, retry: Option<String>, now: DateTime<Utc>) {
        self.turns.push(Turn::error(message, retry, now));
    }

    /// Reconciles with the history replayed after a reconnect. A reply that
    /// finished while we were away is adopted from the server's copy.
    /// Returns true when that closed the open turn.
    pub fn recover(&mut self, history: &[Turn]) -> bool {
        let Some(index) = self.open else {
            return false;
        };
        let Some(last) = history.iter().rev().find(|t| t.is_conversational()) else {
            return false;
        };
        if last.speaker() != Speaker::Assistant {
            tracing::debug!("reply still pending after rejoin");
            return false;
        }
        if let Some(turn) = self.turns.get_mut(index) {
            tracing::info!("adopting reply completed while disconnected");
            turn.set_content(last.content());
            turn.set_timestamp(last.timestamp());
        }
        self.open = None;
        self.buffer.clear();
        true
    }

    fn open_placeholder(&mut self, now: DateTime<Utc>) -> usize {
        self.turns.push(Turn::assistant("", now));
        self.buffer.clear();
        let index = self.turns.len() - 1;
        self.open = Some(index);
        index
    }

    // Keeps whatever partial content the open turn has.
    fn seal(&mut self) {
        self.open = None;
        self.buffer.clear();
    }
}
