use crate::events::Envelope;
use crate::realtime_api::SessionTransport;
use crate::session_state::{ConnectionStatus, InterviewSession, SessionPhase};
use crate::turn::Turn;
use interview_types::SessionDescriptor;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Delay before the opening greeting is sent on a fresh session.
pub const DEFAULT_GREETING_DELAY: Duration = Duration::from_millis(5000);

/// What the user can do from the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    Submit(String),
    /// Already confirmed by the user.
    End,
    Evaluate,
    DismissNotice,
    RetryFailed,
    Leave,
}

/// Why the room loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomExit {
    Terminated,
    Failed(String),
    Left,
}

/// Read model handed to the renderer after every processed input.
#[derive(Debug)]
pub struct RoomView<'a> {
    pub descriptor: &'a SessionDescriptor,
    pub turns: &'a [Turn],
    pub open_turn: Option<usize>,
    pub phase: SessionPhase,
    pub connection: ConnectionStatus,
    pub can_send: bool,
    pub can_end: bool,
    pub can_evaluate: bool,
    pub is_ai_responding: bool,
    pub notice: Option<&'a str>,
    pub fatal: Option<&'a str>,
}

pub struct InterviewRoom<T: SessionTransport> {
    descriptor: SessionDescriptor,
    session: InterviewSession<T>,
    greeting_delay: Duration,
}

impl<T: SessionTransport> InterviewRoom<T> {
    pub fn new(descriptor: SessionDescriptor, transport: T) -> Self {
        let session = InterviewSession::new(transport, descriptor.id(), descriptor.language());
        Self {
            descriptor,
            session,
            greeting_delay: DEFAULT_GREETING_DELAY,
        }
    }

    pub fn with_greeting_delay(mut self, delay: Duration) -> Self {
        self.greeting_delay = delay;
        self
    }

    pub fn session(&self) -> &InterviewSession<T> {
        &self.session
    }

    pub fn view(&self) -> RoomView<'_> {
        let transcript = self.session.transcript();
        RoomView {
            descriptor: &self.descriptor,
            turns: transcript.turns(),
            open_turn: transcript.open_index(),
            phase: self.session.phase(),
            connection: self.session.connection(),
            can_send: self.session.can_send(),
            can_end: self.session.can_end(),
            can_evaluate: self.session.can_evaluate(),
            is_ai_responding: self.session.is_ai_responding(),
            notice: self.session.notice(),
            fatal: self.session.fatal(),
        }
    }

    async fn apply(&mut self, action: UserAction) {
        match action {
            UserAction::Submit(text) => {
                self.session.submit_message(&text).await;
            }
            UserAction::End => {
                self.session.request_end().await;
            }
            UserAction::Evaluate => {
                self.session.request_evaluate().await;
            }
            UserAction::DismissNotice => self.session.dismiss_notice(),
            UserAction::RetryFailed => {
                self.session.retry_failed().await;
            }
            UserAction::Leave => {}
        }
    }

    /// Drives the room until it terminates or the user leaves, rendering after
    /// every step. The transport is torn down on every way out.
    pub async fn run<F>(
        mut self,
        mut events: mpsc::Receiver<Envelope>,
        mut actions: mpsc::Receiver<UserAction>,
        mut render: F,
    ) -> RoomExit
    where
        F: FnMut(&RoomView<'_>),
    {
        render(&self.view());

        let mut events_open = true;
        let mut greeting_at: Option<Instant> = None;

        let exit = loop {
            if self.session.greeting_pending() {
                if greeting_at.is_none() {
                    tracing::debug!("greeting scheduled in {:?}", self.greeting_delay);
                    greeting_at = Some(Instant::now() + self.greeting_delay);
                }
            } else {
                greeting_at = None;
            }

            let deadline = greeting_at;
            let greeting = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                envelope = events.recv(), if events_open => match envelope {
                    Some(envelope) => self.session.handle(envelope).await,
                    None => {
                        tracing::debug!("transport event stream closed");
                        events_open = false;
                    }
                },
                action = actions.recv() => match action {
                    None | Some(UserAction::Leave) => {
                        break match self.session.fatal() {
                            Some(message) => RoomExit::Failed(message.to_string()),
                            None => RoomExit::Left,
                        };
                    }
                    Some(action) => self.apply(action).await,
                },
                _ = greeting => {
                    greeting_at = None;
                    self.session.fire_greeting().await;
                }
            }

            render(&self.view());

            if self.session.phase() == SessionPhase::Terminated {
                break RoomExit::Terminated;
            }
        };

        self.session.teardown();
        exit
    }
}
