use crate::events::{Envelope, TransportEvent};
use crate::realtime_api::SessionTransport;
use crate::templates;
use crate::transcript::Transcript;
use chrono::Utc;
use interview_types::{Language, SessionId};

/// Join refusals in a row before the room gives up.
pub const MAX_JOIN_FAILURES: u32 = 3;

// Server messages that make a join refusal final.
const FATAL_JOIN_ERRORS: &[&str] = &[
    "not found",
    "unauthorized",
    "invalid token",
    "không tìm thấy",
    "không có quyền",
];

/// Where the session goes back to when an end request is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    Idle,
    AwaitingResponse,
    Evaluating,
    Evaluated,
}

impl From<Resume> for SessionPhase {
    fn from(resume: Resume) -> Self {
        match resume {
            Resume::Idle => SessionPhase::Idle,
            Resume::AwaitingResponse => SessionPhase::AwaitingResponse,
            Resume::Evaluating => SessionPhase::Evaluating,
            Resume::Evaluated => SessionPhase::Evaluated,
        }
    }
}

/// Where one interview session stands. Only [`SessionPhase::next`] moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Joining,
    Idle,
    AwaitingResponse,
    Evaluating,
    Evaluated,
    Ending { resume: Resume },
    Terminated,
    Failed,
}

/// Everything that can move the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Connected,
    Joined,
    JoinRefused,
    Send,
    ResponseStarted,
    Complete,
    End,
    Ended,
    Evaluate,
    Evaluated,
    Error,
}

impl SessionPhase {
    /// The transition table. `None` means the trigger leaves the phase as is.
    pub fn next(self, trigger: Trigger) -> Option<SessionPhase> {
        use SessionPhase::*;
        match (self, trigger) {
            (Terminated | Failed, _) => None,
            (_, Trigger::Ended) => Some(Terminated),
            (Connecting, Trigger::Connected) => Some(Joining),
            (Joining, Trigger::Joined) => Some(Idle),
            (Joining, Trigger::JoinRefused) => Some(Failed),
            (Idle, Trigger::Send | Trigger::ResponseStarted) => Some(AwaitingResponse),
            (AwaitingResponse, Trigger::Complete) => Some(Idle),
            (
                Ending {
                    resume: Resume::AwaitingResponse,
                },
                Trigger::Complete,
            ) => Some(Ending { resume: Resume::Idle }),
            (AwaitingResponse | Evaluating, Trigger::Error) => Some(Idle),
            (Idle, Trigger::End) => Some(Ending { resume: Resume::Idle }),
            (AwaitingResponse, Trigger::End) => Some(Ending {
                resume: Resume::AwaitingResponse,
            }),
            (Evaluating, Trigger::End) => Some(Ending {
                resume: Resume::Evaluating,
            }),
            (Evaluated, Trigger::End) => Some(Ending {
                resume: Resume::Evaluated,
            }),
            (Ending { resume }, Trigger::Error) => Some(resume.into()),
            (Idle | AwaitingResponse, Trigger::Evaluate) => Some(Evaluating),
            (Idle | AwaitingResponse | Evaluating, Trigger::Evaluated) => Some(Evaluated),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Terminated | SessionPhase::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Connecting => "connecting",
            SessionPhase::Joining => "joining",
            SessionPhase::Idle => "idle",
            SessionPhase::AwaitingResponse => "awaiting response",
            SessionPhase::Evaluating => "evaluating",
            SessionPhase::Evaluated => "evaluated",
            SessionPhase::Ending { .. } => "ending",
            SessionPhase::Terminated => "terminated",
            SessionPhase::Failed => "failed",
        }
    }
}

/// Socket state as last reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Greeting {
    Unscheduled,
    Pending,
    Done,
}

/// A user action sent to the server whose outcome is still unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Message(String),
    Evaluate,
    End,
}

impl Action {
    fn retry_text(&self) -> Option<String> {
        match self {
            Action::Message(text) => Some(text.clone()),
            _ => None,
        }
    }
}

/// Owns the transcript and the phase of one interview session and applies
/// transport events and user actions to them, one at a time.
pub struct InterviewSession<T: SessionTransport> {
    transport: T,
    session_id: SessionId,
    language: Language,
    transcript: Transcript,
    phase: SessionPhase,
    connection: ConnectionStatus,
    epoch: u64,
    torn_down: bool,
    greeting: Greeting,
    rejoining: bool,
    join_failures: u32,
    // The user text whose reply has not completed yet.
    awaiting_reply: Option<String>,
    // An end or evaluate request the server has not answered yet.
    in_flight: Option<Action>,
    failed: Option<Action>,
    notice: Option<String>,
    fatal: Option<String>,
}

impl<T: SessionTransport> InterviewSession<T> {
    pub fn new(transport: T, session_id: SessionId, language: Language) -> Self {
        let epoch = transport.epoch();
        Self {
            transport,
            session_id,
            language,
            transcript: Transcript::new(),
            phase: SessionPhase::Connecting,
            connection: ConnectionStatus::Disconnected,
            epoch,
            torn_down: false,
            greeting: Greeting::Unscheduled,
            rejoining: false,
            join_failures: 0,
            awaiting_reply: None,
            in_flight: None,
            failed: None,
            notice: None,
            fatal: None,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn fatal(&self) -> Option<&str> {
        self.fatal.as_deref()
    }

    pub fn failed_action(&self) -> Option<&Action> {
        self.failed.as_ref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn is_connected(&self) -> bool {
        !self.torn_down && self.connection == ConnectionStatus::Connected
    }

    pub fn can_send(&self) -> bool {
        self.is_connected() && self.phase == SessionPhase::Idle
    }

    pub fn can_end(&self) -> bool {
        self.is_connected()
            && matches!(
                self.phase,
                SessionPhase::Idle
                    | SessionPhase::AwaitingResponse
                    | SessionPhase::Evaluating
                    | SessionPhase::Evaluated
            )
    }

    pub fn can_evaluate(&self) -> bool {
        self.is_connected()
            && matches!(
                self.phase,
                SessionPhase::Idle | SessionPhase::AwaitingResponse
            )
    }

    pub fn is_ai_responding(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::AwaitingResponse
                | SessionPhase::Evaluating
                | SessionPhase::Ending {
                    resume: Resume::AwaitingResponse | Resume::Evaluating
                }
        )
    }

    /// True while the opening greeting waits for its delay to elapse.
    pub fn greeting_pending(&self) -> bool {
        self.greeting == Greeting::Pending
    }

    fn transition(&mut self, trigger: Trigger) -> bool {
        match self.phase.next(trigger) {
            Some(next) => {
                tracing::debug!("phase {:?} -> {:?} on {:?}", self.phase, next, trigger);
                self.phase = next;
                true
            }
            None => false,
        }
    }

    /// Applies one inbound event. Events from an older connection, or arriving
    /// after teardown, change nothing.
    pub async fn handle(&mut self, envelope: Envelope) {
        if self.torn_down {
            tracing::debug!("session torn down, dropping {:?}", envelope.event());
            return;
        }
        if envelope.epoch() != self.epoch {
            tracing::debug!(
                "dropping event from epoch {} (current {})",
                envelope.epoch(),
                self.epoch
            );
            return;
        }

        match envelope.into_event() {
            TransportEvent::Connected => self.on_connected().await,
            TransportEvent::Disconnected => {
                tracing::warn!("session {} disconnected", self.session_id);
                self.connection = ConnectionStatus::Disconnected;
            }
            TransportEvent::Joined(history) => {
                if self.rejoining {
                    tracing::info!("rejoined session {}", self.session_id);
                    self.rejoining = false;
                    if self.transcript.recover(&history) {
                        // The completion for this reply went out while we were away.
                        self.awaiting_reply = None;
                        self.transition(Trigger::Complete);
                    }
                } else if self.transition(Trigger::Joined) {
                    tracing::info!(
                        "joined session {} with {} prior turns",
                        self.session_id,
                        history.len()
                    );
                    self.join_failures = 0;
                    if history.is_empty() && self.greeting == Greeting::Unscheduled {
                        self.greeting = Greeting::Pending;
                    }
                    self.transcript.load(history);
                } else {
                    tracing::debug!("unexpected joined_session in {:?}", self.phase);
                }
            }
            TransportEvent::Typing(true) => {
                self.transcript.typing_started();
                self.transition(Trigger::ResponseStarted);
            }
            TransportEvent::Typing(false) => {}
            TransportEvent::Chunk(text) => {
                self.transcript.apply_chunk(&text, Utc::now());
                self.transition(Trigger::ResponseStarted);
            }
            TransportEvent::Complete(timestamp) => {
                // The turn is closed before the phase lets the user send again.
                self.transcript.complete(timestamp);
                self.awaiting_reply = None;
                self.transition(Trigger::Complete);
            }
            TransportEvent::Ended => {
                tracing::info!("session {} ended", self.session_id);
                self.transition(Trigger::Ended);
                self.awaiting_reply = None;
                self.in_flight = None;
                self.teardown();
            }
            TransportEvent::Evaluated(text) => {
                if self.phase == SessionPhase::Evaluated {
                    tracing::warn!("duplicate session_evaluated ignored");
                    return;
                }
                self.transcript
                    .append_evaluation(&text, self.language, Utc::now());
                if self.in_flight == Some(Action::Evaluate) {
                    self.in_flight = None;
                }
                self.transition(Trigger::Evaluated);
            }
            TransportEvent::Error(message) => {
                let joining = self.phase == SessionPhase::Joining;
                self.on_error(message);
                if joining && self.phase == SessionPhase::Joining && self.is_connected() {
                    tracing::info!(
                        "retrying join of session {} ({} of {})",
                        self.session_id,
                        self.join_failures + 1,
                        MAX_JOIN_FAILURES
                    );
                    if let Err(e) = self.transport.join_session(self.session_id).await {
                        tracing::error!("failed to send join_session: {}", e);
                    }
                }
            }
        }
    }

    async fn on_connected(&mut self) {
        self.connection = ConnectionStatus::Connected;
        match self.phase {
            SessionPhase::Connecting => {
                self.transition(Trigger::Connected);
            }
            SessionPhase::Joining => {}
            _ => {
                // Rooms do not survive a reconnect on the server side.
                tracing::info!("reconnected, rejoining session {}", self.session_id);
                self.rejoining = true;
            }
        }
        if let Err(e) = self.transport.join_session(self.session_id).await {
            tracing::error!("failed to send join_session: {}", e);
            self.on_error(e.to_string());
        }
    }

    fn on_error(&mut self, message: String) {
        self.record_error(message, None);
    }

    // A request that could not even be queued is blamed for its own failure.
    fn on_send_failed(&mut self, action: Action, message: String) {
        self.record_error(message, Some(action));
    }

    // Picks the outstanding request a server error is about. While ending,
    // the end request; otherwise the user's message before an evaluation.
    fn blame(&mut self) -> Option<Action> {
        let message = self.awaiting_reply.take().map(Action::Message);
        let request = self.in_flight.take();
        match self.phase {
            SessionPhase::Ending { .. } => match request {
                Some(request) => {
                    self.awaiting_reply = message.and_then(|m| m.retry_text());
                    Some(request)
                }
                None => message,
            },
            _ => message.or(request),
        }
    }

    fn record_error(&mut self, message: String, blamed: Option<Action>) {
        tracing::warn!("session {} error: {}", self.session_id, message);

        if self.phase == SessionPhase::Joining {
            self.join_failures += 1;
            let lowered = message.to_lowercase();
            let refused = FATAL_JOIN_ERRORS.iter().any(|m| lowered.contains(m));
            if refused || self.join_failures >= MAX_JOIN_FAILURES {
                tracing::error!(
                    "giving up on session {} after {} join failures",
                    self.session_id,
                    self.join_failures
                );
                self.transition(Trigger::JoinRefused);
                self.fatal = Some(message);
                self.teardown();
            } else {
                self.notice = Some(message);
            }
            return;
        }

        let awaiting = matches!(
            self.phase,
            SessionPhase::AwaitingResponse | SessionPhase::Evaluating | SessionPhase::Ending { .. }
        );
        if awaiting {
            let blamed = match blamed {
                Some(Action::Message(text)) => {
                    self.awaiting_reply = None;
                    Some(Action::Message(text))
                }
                Some(action) => {
                    self.in_flight = None;
                    Some(action)
                }
                None => self.blame(),
            };
            if let Some(action) = blamed {
                self.transcript
                    .append_error(&message, action.retry_text(), Utc::now());
                self.failed = Some(action);
            }
        }
        self.notice = Some(message);
        self.transition(Trigger::Error);
    }

    /// Sends the user's text. A no-op unless connected, idle and non-blank.
    pub async fn submit_message(&mut self, text: &str) -> bool {
        if !self.can_send() || text.trim().is_empty() {
            tracing::debug!("message rejected in {:?}", self.phase);
            return false;
        }
        if self.greeting == Greeting::Pending {
            tracing::debug!("user spoke first, greeting cancelled");
        }
        self.greeting = Greeting::Done;
        self.send_text(text).await;
        true
    }

    /// Fires the delayed opening greeting, at most once per session.
    pub async fn fire_greeting(&mut self) -> bool {
        if self.greeting != Greeting::Pending {
            return false;
        }
        self.greeting = Greeting::Done;
        if !self.can_send() {
            tracing::warn!("greeting dropped in {:?}", self.phase);
            return false;
        }
        self.send_text(templates::GREETING).await;
        true
    }

    async fn send_text(&mut self, text: &str) {
        self.transcript.begin_exchange(text, Utc::now());
        self.transition(Trigger::Send);
        self.awaiting_reply = Some(text.to_string());
        if let Err(e) = self
            .transport
            .send_message(self.session_id, text.to_string())
            .await
        {
            tracing::error!("failed to send message: {}", e);
            self.on_send_failed(Action::Message(text.to_string()), e.to_string());
        }
    }

    /// Asks the server to end the session. Confirmation is up to the caller.
    pub async fn request_end(&mut self) -> bool {
        if !self.can_end() {
            tracing::debug!("end rejected in {:?}", self.phase);
            return false;
        }
        self.transition(Trigger::End);
        self.in_flight = Some(Action::End);
        if let Err(e) = self.transport.end_session(self.session_id).await {
            tracing::error!("failed to send end_session: {}", e);
            self.on_send_failed(Action::End, e.to_string());
        }
        true
    }

    pub async fn request_evaluate(&mut self) -> bool {
        if !self.can_evaluate() {
            tracing::debug!("evaluate rejected in {:?}", self.phase);
            return false;
        }
        self.transcript.append_evaluating(self.language, Utc::now());
        self.transition(Trigger::Evaluate);
        self.in_flight = Some(Action::Evaluate);
        if let Err(e) = self.transport.evaluate_session(self.session_id).await {
            tracing::error!("failed to send evaluate_session: {}", e);
            self.on_send_failed(Action::Evaluate, e.to_string());
        }
        true
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Repeats the action the last error was about, through the normal gates.
    pub async fn retry_failed(&mut self) -> bool {
        let Some(action) = self.failed.take() else {
            return false;
        };
        let retried = match &action {
            Action::Message(text) => self.submit_message(text).await,
            Action::Evaluate => self.request_evaluate().await,
            Action::End => self.request_end().await,
        };
        if retried {
            self.notice = None;
        } else {
            self.failed = Some(action);
        }
        retried
    }

    /// Cancels the greeting and closes the connection. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        tracing::info!("tearing down session {}", self.session_id);
        self.torn_down = true;
        if self.greeting == Greeting::Pending {
            self.greeting = Greeting::Done;
        }
        self.transport.disconnect();
    }
}

impl<T: SessionTransport> Drop for InterviewSession<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime_api::MockSessionTransport;
    use crate::turn::{Speaker, Turn, TurnKind};
    use chrono::TimeZone;
    use mockall::predicate::*;

    fn transport() -> MockSessionTransport {
        let mut transport = MockSessionTransport::new();
        transport.expect_epoch().return_const(0u64);
        transport.expect_disconnect().return_const(());
        transport
    }

    fn event(event: TransportEvent) -> Envelope {
        Envelope::new(0, event)
    }

    async fn joined_session(transport: MockSessionTransport) -> InterviewSession<MockSessionTransport> {
        joined_session_expecting(transport, 1).await
    }

    async fn joined_session_expecting(
        mut transport: MockSessionTransport,
        joins: usize,
    ) -> InterviewSession<MockSessionTransport> {
        transport
            .expect_join_session()
            .with(eq(SessionId::new(7)))
            .times(joins)
            .returning(|_| Ok(()));
        let mut session = InterviewSession::new(transport, SessionId::new(7), Language::Vi);
        session.handle(event(TransportEvent::Connected)).await;
        session
            .handle(event(TransportEvent::Joined(vec![
                Turn::user("Xin chào!", Utc::now()),
                Turn::assistant("Chào bạn", Utc::now()),
            ])))
            .await;
        session
    }

    #[test]
    fn test_transition_table() {
        use SessionPhase::*;
        assert_eq!(Connecting.next(Trigger::Connected), Some(Joining));
        assert_eq!(Connecting.next(Trigger::Send), None);
        assert_eq!(Idle.next(Trigger::Send), Some(AwaitingResponse));
        assert_eq!(AwaitingResponse.next(Trigger::Send), None);
        assert_eq!(Evaluated.next(Trigger::Evaluate), None);
        assert_eq!(Evaluated.next(Trigger::Send), None);
        assert_eq!(
            Evaluated.next(Trigger::End),
            Some(Ending {
                resume: Resume::Evaluated
            })
        );
        assert_eq!(
            Ending {
                resume: Resume::AwaitingResponse
            }
            .next(Trigger::Error),
            Some(AwaitingResponse)
        );
        assert_eq!(
            Ending {
                resume: Resume::AwaitingResponse
            }
            .next(Trigger::Complete),
            Some(Ending {
                resume: Resume::Idle
            })
        );
        assert_eq!(Joining.next(Trigger::Ended), Some(Terminated));
        assert_eq!(Terminated.next(Trigger::Connected), None);
        assert_eq!(Failed.next(Trigger::Ended), None);
    }

    #[tokio::test]
    async fn test_send_while_idle_opens_exchange() {
        // --- Arrange ---
        let mut transport = transport();
        transport
            .expect_send_message()
            .with(eq(SessionId::new(7)), eq("Tôi có 3 năm kinh nghiệm".to_string()))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut session = joined_session(transport).await;

        // --- Act ---
        let sent = session.submit_message("Tôi có 3 năm kinh nghiệm").await;

        // --- Assert ---
        assert!(sent);
        assert_eq!(session.phase(), SessionPhase::AwaitingResponse);
        let turns = session.transcript().turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[2].speaker(), Speaker::User);
        assert_eq!(turns[2].content(), "Tôi có 3 năm kinh nghiệm");
        assert_eq!(turns[3].speaker(), Speaker::Assistant);
        assert_eq!(turns[3].content(), "");
        assert!(!session.can_send());
        assert!(session.is_ai_responding());
    }

    #[tokio::test]
    async fn test_streamed_reply_returns_to_idle() {
        // --- Arrange ---
        let mut transport = transport();
        transport.expect_send_message().times(1).returning(|_, _| Ok(()));
        let mut session = joined_session(transport).await;
        session.submit_message("hello").await;
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();

        // --- Act ---
        session.handle(event(TransportEvent::Typing(true))).await;
        session.handle(event(TransportEvent::Chunk("Xin ".to_string()))).await;
        session.handle(event(TransportEvent::Chunk("chào".to_string()))).await;
        session.handle(event(TransportEvent::Complete(t))).await;

        // --- Assert ---
        let last = session.transcript().turns().last().unwrap();
        assert_eq!(last.content(), "Xin chào");
        assert_eq!(last.timestamp(), t);
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.can_send());
        assert!(!session.is_ai_responding());
    }

    #[tokio::test]
    async fn test_submit_is_gated() {
        // --- Arrange ---
        let mut transport = transport();
        transport.expect_send_message().times(1).returning(|_, _| Ok(()));
        let mut session = joined_session(transport).await;

        // --- Act / Assert ---
        assert!(!session.submit_message("   ").await);
        assert!(!session.submit_message("").await);
        assert!(session.submit_message("first").await);
        // Awaiting a reply.
        assert!(!session.submit_message("second").await);
        session.handle(event(TransportEvent::Complete(Utc::now()))).await;
        session.handle(event(TransportEvent::Disconnected)).await;
        let before = session.transcript().turns().len();
        assert!(!session.submit_message("third").await);
        assert_eq!(session.transcript().turns().len(), before);
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_end_while_disconnected_does_nothing() {
        let mut transport = transport();
        transport.expect_end_session().never();
        let mut session = joined_session(transport).await;
        session.handle(event(TransportEvent::Disconnected)).await;

        assert!(!session.request_end().await);
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(!session.can_end());
    }

    #[tokio::test]
    async fn test_end_then_ended_terminates() {
        let mut transport = transport();
        transport.expect_end_session().times(1).returning(|_| Ok(()));
        let mut session = joined_session(transport).await;

        assert!(session.request_end().await);
        assert!(matches!(session.phase(), SessionPhase::Ending { .. }));
        session.handle(event(TransportEvent::Ended)).await;

        assert_eq!(session.phase(), SessionPhase::Terminated);
        assert!(session.is_torn_down());
    }

    #[tokio::test]
    async fn test_refused_end_restores_previous_phase() {
        let mut transport = transport();
        transport.expect_send_message().times(1).returning(|_, _| Ok(()));
        transport.expect_end_session().times(1).returning(|_| Ok(()));
        let mut session = joined_session(transport).await;
        session.submit_message("hello").await;

        session.request_end().await;
        session
            .handle(event(TransportEvent::Error("Không thể kết thúc".to_string())))
            .await;

        assert_eq!(session.phase(), SessionPhase::AwaitingResponse);
        assert_eq!(session.notice(), Some("Không thể kết thúc"));
        assert_eq!(session.failed_action(), Some(&Action::End));
    }

    #[tokio::test]
    async fn test_evaluation_disables_send_and_evaluate() {
        // --- Arrange ---
        let mut transport = transport();
        transport.expect_evaluate_session().times(1).returning(|_| Ok(()));
        let mut session = joined_session(transport).await;

        // --- Act ---
        assert!(session.request_evaluate().await);
        let placeholder = session.transcript().turns().last().unwrap().clone();
        session
            .handle(event(TransportEvent::Evaluated("Điểm: 8/10".to_string())))
            .await;
        let turns_after = session.transcript().turns().len();
        let again = session.request_evaluate().await;

        // --- Assert ---
        assert!(placeholder.is_synthetic());
        assert_eq!(placeholder.kind(), TurnKind::Normal);
        let last = session.transcript().turns().last().unwrap();
        assert_eq!(last.kind(), TurnKind::Evaluation);
        assert!(last.content().contains("Điểm: 8/10"));
        assert!(last.content().starts_with("## 📊 ĐÁNH GIÁ TỔNG KẾT"));
        assert_eq!(session.phase(), SessionPhase::Evaluated);
        assert!(!session.can_send());
        assert!(!session.can_evaluate());
        assert!(session.can_end());
        assert!(!again);
        assert_eq!(session.transcript().turns().len(), turns_after);
    }

    #[tokio::test]
    async fn test_error_while_awaiting_keeps_partial_reply() {
        // --- Arrange ---
        let mut transport = transport();
        transport.expect_send_message().times(2).returning(|_, _| Ok(()));
        let mut session = joined_session(transport).await;
        session.submit_message("hello").await;
        session.handle(event(TransportEvent::Chunk("par".to_string()))).await;

        // --- Act ---
        session
            .handle(event(TransportEvent::Error("AI service unavailable".to_string())))
            .await;

        // --- Assert ---
        assert_eq!(session.phase(), SessionPhase::Idle);
        let turns = session.transcript().turns();
        assert_eq!(turns[3].content(), "par");
        let error = turns.last().unwrap();
        assert_eq!(error.kind(), TurnKind::Error);
        assert_eq!(error.retry(), Some("hello"));
        assert_eq!(session.notice(), Some("AI service unavailable"));

        session.dismiss_notice();
        assert!(session.notice().is_none());
        assert!(session.retry_failed().await);
        assert_eq!(session.phase(), SessionPhase::AwaitingResponse);
        assert_eq!(session.transcript().turns().last().unwrap().content(), "");
    }

    #[tokio::test]
    async fn test_error_while_idle_only_raises_notice() {
        let mut session = joined_session(transport()).await;
        let before = session.transcript().turns().len();

        session
            .handle(event(TransportEvent::Error("Rate limited".to_string())))
            .await;

        assert_eq!(session.transcript().turns().len(), before);
        assert_eq!(session.notice(), Some("Rate limited"));
        assert!(session.failed_action().is_none());
    }

    #[tokio::test]
    async fn test_failed_send_is_reported_like_an_error() {
        let mut transport = transport();
        transport
            .expect_send_message()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("channel closed")));
        let mut session = joined_session(transport).await;

        session.submit_message("hello").await;

        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.notice(), Some("channel closed"));
        assert_eq!(
            session.failed_action(),
            Some(&Action::Message("hello".to_string()))
        );
    }

    #[tokio::test]
    async fn test_error_after_evaluating_mid_reply_blames_the_message() {
        // --- Arrange ---
        let mut transport = transport();
        transport
            .expect_send_message()
            .with(always(), eq("Tôi thích Rust".to_string()))
            .times(2)
            .returning(|_, _| Ok(()));
        transport.expect_evaluate_session().times(1).returning(|_| Ok(()));
        let mut session = joined_session(transport).await;
        session.submit_message("Tôi thích Rust").await;
        session.handle(event(TransportEvent::Chunk("Tốt".to_string()))).await;
        assert!(session.request_evaluate().await);

        // --- Act ---
        session
            .handle(event(TransportEvent::Error("AI service unavailable".to_string())))
            .await;

        // --- Assert ---
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(
            session.failed_action(),
            Some(&Action::Message("Tôi thích Rust".to_string()))
        );
        let error = session.transcript().turns().last().unwrap();
        assert_eq!(error.kind(), TurnKind::Error);
        assert_eq!(error.retry(), Some("Tôi thích Rust"));
        assert!(session.retry_failed().await);
        assert_eq!(session.phase(), SessionPhase::AwaitingResponse);
    }

    #[tokio::test]
    async fn test_error_while_evaluating_blames_the_evaluation() {
        let mut transport = transport();
        transport.expect_evaluate_session().times(1).returning(|_| Ok(()));
        let mut session = joined_session(transport).await;
        session.request_evaluate().await;

        session
            .handle(event(TransportEvent::Error("Evaluation failed".to_string())))
            .await;

        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.failed_action(), Some(&Action::Evaluate));
        assert!(session.transcript().turns().last().unwrap().retry().is_none());
    }

    #[tokio::test]
    async fn test_not_responding_after_error_leaves_reply_open() {
        let mut transport = transport();
        transport.expect_send_message().times(1).returning(|_, _| Ok(()));
        let mut session = joined_session(transport).await;
        session.submit_message("hello").await;
        session.handle(event(TransportEvent::Chunk("par".to_string()))).await;

        session
            .handle(event(TransportEvent::Error("AI service unavailable".to_string())))
            .await;

        assert!(session.transcript().is_streaming());
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(!session.is_ai_responding());
        assert!(session.can_send());
    }

    #[tokio::test]
    async fn test_join_refusal_is_fatal() {
        let mut transport = transport();
        transport.expect_join_session().times(1).returning(|_| Ok(()));
        let mut session = InterviewSession::new(transport, SessionId::new(9), Language::Vi);
        session.handle(event(TransportEvent::Connected)).await;

        session
            .handle(event(TransportEvent::Error("Session not found".to_string())))
            .await;

        assert_eq!(session.phase(), SessionPhase::Failed);
        assert_eq!(session.fatal(), Some("Session not found"));
        assert!(session.is_torn_down());
    }

    #[tokio::test]
    async fn test_third_join_failure_is_fatal() {
        let mut transport = transport();
        transport.expect_join_session().times(3).returning(|_| Ok(()));
        let mut session = InterviewSession::new(transport, SessionId::new(9), Language::Vi);
        session.handle(event(TransportEvent::Connected)).await;

        for _ in 0..2 {
            session
                .handle(event(TransportEvent::Error("Database busy".to_string())))
                .await;
            assert_eq!(session.phase(), SessionPhase::Joining);
        }
        session
            .handle(event(TransportEvent::Error("Database busy".to_string())))
            .await;

        assert_eq!(session.phase(), SessionPhase::Failed);
    }

    #[tokio::test]
    async fn test_reconnect_rejoins_without_resetting() {
        // --- Arrange ---
        let mut transport = transport();
        transport.expect_send_message().times(2).returning(|_, _| Ok(()));
        let mut session = joined_session_expecting(transport, 2).await;
        session.submit_message("hello").await;
        session.handle(event(TransportEvent::Chunk("Ch".to_string()))).await;

        // --- Act ---
        session.handle(event(TransportEvent::Disconnected)).await;
        assert_eq!(session.connection(), ConnectionStatus::Disconnected);
        assert_eq!(session.phase(), SessionPhase::AwaitingResponse);
        session.handle(event(TransportEvent::Connected)).await;
        session
            .handle(event(TransportEvent::Joined(vec![
                Turn::user("Xin chào!", Utc::now()),
                Turn::assistant("Chào bạn", Utc::now()),
                Turn::user("hello", Utc::now()),
                Turn::assistant("Chào lại", Utc::now()),
            ])))
            .await;

        // --- Assert ---
        let turns = session.transcript().turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[3].content(), "Chào lại");
        assert!(!session.transcript().is_streaming());
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.connection(), ConnectionStatus::Connected);
        assert!(session.can_send());
        assert!(!session.is_ai_responding());
        assert!(session.submit_message("next question").await);
    }

    #[tokio::test]
    async fn test_events_after_teardown_change_nothing() {
        // --- Arrange ---
        let mut transport = transport();
        transport.expect_send_message().times(1).returning(|_, _| Ok(()));
        let mut session = joined_session(transport).await;
        session.submit_message("hello").await;
        session.handle(event(TransportEvent::Chunk("a".to_string()))).await;

        // --- Act ---
        session.teardown();
        session.teardown();
        let snapshot: Vec<Turn> = session.transcript().turns().to_vec();
        session.handle(event(TransportEvent::Chunk("b".to_string()))).await;
        session.handle(event(TransportEvent::Complete(Utc::now()))).await;
        session
            .handle(event(TransportEvent::Evaluated("8/10".to_string())))
            .await;

        // --- Assert ---
        assert_eq!(session.transcript().turns(), snapshot.as_slice());
        assert_eq!(session.phase(), SessionPhase::AwaitingResponse);
        assert!(!session.can_send());
        assert!(!session.can_end());
    }

    #[tokio::test]
    async fn test_stale_epoch_is_ignored() {
        let mut session = joined_session(transport()).await;
        let before = session.transcript().turns().len();

        session
            .handle(Envelope::new(1, TransportEvent::Chunk("ghost".to_string())))
            .await;

        assert_eq!(session.transcript().turns().len(), before);
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_greeting_scheduled_once_for_empty_history() {
        // --- Arrange ---
        let mut transport = transport();
        transport.expect_join_session().times(1).returning(|_| Ok(()));
        transport
            .expect_send_message()
            .with(always(), eq(templates::GREETING.to_string()))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut session = InterviewSession::new(transport, SessionId::new(1), Language::Vi);
        session.handle(event(TransportEvent::Connected)).await;
        session.handle(event(TransportEvent::Joined(vec![]))).await;
        assert!(session.greeting_pending());

        // --- Act ---
        assert!(session.fire_greeting().await);
        assert!(!session.fire_greeting().await);

        // --- Assert ---
        let turns = session.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content(), "Xin chào!");
        assert_eq!(turns[1].content(), "");
    }

    #[tokio::test]
    async fn test_user_send_cancels_greeting() {
        let mut transport = transport();
        transport.expect_join_session().times(1).returning(|_| Ok(()));
        transport
            .expect_send_message()
            .with(always(), eq("Chào".to_string()))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut session = InterviewSession::new(transport, SessionId::new(1), Language::Vi);
        session.handle(event(TransportEvent::Connected)).await;
        session.handle(event(TransportEvent::Joined(vec![]))).await;

        session.submit_message("Chào").await;

        assert!(!session.greeting_pending());
        assert!(!session.fire_greeting().await);
    }

    #[tokio::test]
    async fn test_conversational_turns_alternate() {
        let mut transport = transport();
        transport.expect_send_message().returning(|_, _| Ok(()));
        transport.expect_evaluate_session().returning(|_| Ok(()));
        let mut session = joined_session(transport).await;

        for text in ["one", "two", "three"] {
            session.submit_message(text).await;
            session.handle(event(TransportEvent::Chunk("ok".to_string()))).await;
            if text == "two" {
                session
                    .handle(event(TransportEvent::Error("hiccup".to_string())))
                    .await;
                continue;
            }
            session.handle(event(TransportEvent::Complete(Utc::now()))).await;
        }
        session.request_evaluate().await;

        let speakers: Vec<Speaker> = session
            .transcript()
            .turns()
            .iter()
            .filter(|t| t.is_conversational())
            .map(|t| t.speaker())
            .collect();
        for (i, speaker) in speakers.iter().enumerate() {
            let expected = if i % 2 == 0 { Speaker::User } else { Speaker::Assistant };
            assert_eq!(*speaker, expected);
        }
    }
}
