use crate::config::EVENT_CAPACITY;
use anyhow::{Context, Result};
use async_trait::async_trait;
use interview_core::events::{Envelope, decode_server_event};
use interview_core::realtime_api::SessionTransport;
use interview_realtime::RealtimeClient;
use interview_realtime::types::events::client::{
    EndSessionEvent, EvaluateSessionEvent, JoinSessionEvent, SendMessageEvent,
};
use interview_realtime::types::{ClientEvent, SessionId};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast::error::RecvError;

/// An adapter that implements the `SessionTransport` trait on top of the
/// realtime socket client. It is generic over `RealtimeClient` so the
/// underlying client can be mocked in tests.
pub struct SocketAdapter<C: RealtimeClient> {
    client: C,
    credential: SecretString,
    epoch: Arc<AtomicU64>,
    pump: Option<tokio::task::JoinHandle<()>>,
    closed: bool,
}

impl SocketAdapter<interview_realtime::Client> {
    pub async fn connect(config: interview_realtime::Config) -> Result<Self> {
        let credential = SecretString::from(config.token().expose_secret().to_string());
        let client = interview_realtime::connect_with_config(EVENT_CAPACITY, config)
            .await
            .context("Failed to start the interview socket")?;
        Ok(Self::new(client, credential))
    }
}

impl<C: RealtimeClient> SocketAdapter<C> {
    pub fn new(client: C, credential: SecretString) -> Self {
        Self {
            client,
            credential,
            epoch: Arc::new(AtomicU64::new(0)),
            pump: None,
            closed: false,
        }
    }

    /// Starts forwarding decoded events, stamped with the current epoch. The
    /// stream ends when the adapter disconnects.
    pub async fn events(&mut self, capacity: usize) -> Result<tokio::sync::mpsc::Receiver<Envelope>> {
        if self.pump.is_some() {
            return Err(anyhow::anyhow!("event stream has already been taken"));
        }
        if self.closed {
            return Err(anyhow::anyhow!("adapter is disconnected"));
        }

        let mut server_rx = self.client.server_events().await?;
        let (tx, rx) = tokio::sync::mpsc::channel(capacity);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let current = self.epoch.clone();

        self.pump = Some(tokio::spawn(async move {
            loop {
                let event = match server_rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::error!("event pump lagged, {} events lost", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("realtime client closed, stopping event pump");
                        break;
                    }
                };
                if current.load(Ordering::SeqCst) != epoch {
                    tracing::debug!("epoch {} is over, stopping event pump", epoch);
                    break;
                }
                let Some(event) = decode_server_event(event) else {
                    continue;
                };
                if tx.send(Envelope::new(epoch, event)).await.is_err() {
                    tracing::warn!("Envelope receiver dropped, stopping event pump.");
                    break;
                }
            }
        }));

        Ok(rx)
    }

    async fn send(&mut self, event: ClientEvent) -> Result<()> {
        if self.closed {
            return Err(anyhow::anyhow!("adapter is disconnected"));
        }
        let name = event.name();
        self.client
            .send_event(event)
            .await
            .with_context(|| format!("Adapter failed to queue {}", name))
    }

    fn token(&self) -> &str {
        self.credential.expose_secret()
    }
}

#[async_trait]
impl<C: RealtimeClient> SessionTransport for SocketAdapter<C> {
    async fn join_session(&mut self, session_id: SessionId) -> Result<()> {
        let event = JoinSessionEvent::new(session_id, self.token());
        self.send(ClientEvent::JoinSession(event)).await
    }

    async fn send_message(&mut self, session_id: SessionId, message: String) -> Result<()> {
        let event = SendMessageEvent::new(session_id, &message, self.token());
        self.send(ClientEvent::SendMessage(event)).await
    }

    async fn end_session(&mut self, session_id: SessionId) -> Result<()> {
        let event = EndSessionEvent::new(session_id, self.token());
        self.send(ClientEvent::EndSession(event)).await
    }

    async fn evaluate_session(&mut self, session_id: SessionId) -> Result<()> {
        let event = EvaluateSessionEvent::new(session_id, self.token());
        self.send(ClientEvent::EvaluateSession(event)).await
    }

    fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.client.close();
        tracing::info!("session transport disconnected");
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

impl<C: RealtimeClient> Drop for SocketAdapter<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::events::TransportEvent;
    use interview_realtime::types::events::server::AiChunkEvent;
    use interview_realtime::types::{HistoryEntry, Role, ServerEvent};
    use mockall::mock;

    mock! {
        pub RealtimeClient {}
        #[async_trait]
        impl RealtimeClient for RealtimeClient {
            async fn send_event(&mut self, event: ClientEvent) -> Result<()>;
            async fn server_events(&mut self) -> Result<interview_realtime::ServerRx>;
            fn close(&mut self);
        }
    }

    fn adapter(client: MockRealtimeClient) -> SocketAdapter<MockRealtimeClient> {
        SocketAdapter::new(client, SecretString::from("jwt".to_string()))
    }

    #[tokio::test]
    async fn test_join_attaches_credential() {
        // --- Arrange ---
        let mut mock_client = MockRealtimeClient::new();
        mock_client
            .expect_send_event()
            .withf(|event| {
                if let ClientEvent::JoinSession(join) = event {
                    return join.session_id() == SessionId::new(3) && join.token().expose() == "jwt";
                }
                false
            })
            .times(1)
            .returning(|_| Ok(()));
        mock_client.expect_close().times(1).return_const(());

        let mut adapter = adapter(mock_client);

        // --- Act ---
        let result = adapter.join_session(SessionId::new(3)).await;

        // --- Assert ---
        assert!(result.is_ok());
        // The mock's expectations are verified when `adapter` is dropped.
    }

    #[tokio::test]
    async fn test_events_are_decoded_and_stamped() {
        // --- Arrange ---
        let (server_tx, server_rx) = tokio::sync::broadcast::channel(8);
        let mut mock_client = MockRealtimeClient::new();
        mock_client
            .expect_server_events()
            .times(1)
            .return_once(move || Ok(server_rx));
        mock_client.expect_close().times(1).return_const(());
        let mut adapter = adapter(mock_client);
        let mut events = adapter.events(8).await.unwrap();

        // --- Act ---
        let echo = HistoryEntry::new(Role::User, "hi", chrono::Utc::now());
        server_tx.send(ServerEvent::UserMessage(echo)).unwrap();
        server_tx
            .send(ServerEvent::AiChunk(AiChunkEvent::new("Xin ")))
            .unwrap();

        // --- Assert ---
        let envelope = events.recv().await.unwrap();
        assert_eq!(envelope.epoch(), 0);
        assert_eq!(envelope.event(), &TransportEvent::Chunk("Xin ".to_string()));
        assert!(adapter.events(8).await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_and_ends_stream() {
        // --- Arrange ---
        let (server_tx, server_rx) = tokio::sync::broadcast::channel(8);
        let mut mock_client = MockRealtimeClient::new();
        mock_client
            .expect_server_events()
            .return_once(move || Ok(server_rx));
        mock_client.expect_send_event().never();
        mock_client.expect_close().times(1).return_const(());
        let mut adapter = adapter(mock_client);
        let mut events = adapter.events(8).await.unwrap();

        // --- Act ---
        adapter.disconnect();
        adapter.disconnect();
        let _ = server_tx.send(ServerEvent::AiChunk(AiChunkEvent::new("late")));

        // --- Assert ---
        assert_eq!(adapter.epoch(), 1);
        assert!(events.recv().await.is_none());
        assert!(
            adapter
                .send_message(SessionId::new(3), "hello".to_string())
                .await
                .is_err()
        );
    }
}
