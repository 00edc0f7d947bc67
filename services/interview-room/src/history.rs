//! Read-only views of past sessions and of the overall assessment.

use crate::terminal::format_time;
use anyhow::{Context, Result};
use interview_core::session_api::SessionDirectory;
use interview_core::turn::{Speaker, Turn};
use interview_realtime::types::api::{AssessmentBody, SessionRecord};
use interview_realtime::types::session::SessionStatus;
use interview_realtime::types::{Language, SessionId};
use std::io::Write;

fn status_label(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Pending => "pending",
        SessionStatus::InProgress => "in progress",
        SessionStatus::Completed => "completed",
    }
}

fn write_summary<W: Write>(out: &mut W, record: &SessionRecord) -> Result<()> {
    let session = record.session();
    let language = session.language();
    let created = session
        .created_at()
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    let title = match (session.position(), session.industry()) {
        (Some(position), Some(industry)) => format!("{} / {}", position, industry),
        (Some(position), None) => position.to_string(),
        _ => "personalized".to_string(),
    };
    let evaluated = if session.evaluation().is_some() {
        " | evaluated"
    } else {
        ""
    };
    writeln!(
        out,
        "#{:<5} {}  {} | {} | {}{}",
        session.id(),
        created,
        title,
        session.style().label(language),
        status_label(session.status()),
        evaluated
    )?;
    Ok(())
}

fn write_conversation<W: Write>(out: &mut W, record: &SessionRecord) -> Result<()> {
    write_summary(out, record)?;
    let language = record.session().language();
    let turns: Vec<Turn> = record
        .conversation()
        .iter()
        .filter_map(Turn::from_history)
        .collect();
    if turns.is_empty() {
        writeln!(out, "  (no messages)")?;
    }
    for turn in &turns {
        let who = match (turn.speaker(), language) {
            (Speaker::User, Language::Vi) => "Bạn",
            (Speaker::User, Language::En) => "You",
            (Speaker::Assistant, _) => "AI",
        };
        writeln!(
            out,
            "  [{}] {}: {}",
            format_time(turn.timestamp()),
            who,
            turn.content()
        )?;
    }
    if let Some(evaluation) = record.session().evaluation() {
        writeln!(out, "\n{}", evaluation)?;
    }
    Ok(())
}

/// Lists every past session, or prints one session's full conversation.
pub async fn print_history<D, W>(directory: &D, session: Option<SessionId>, out: &mut W) -> Result<()>
where
    D: SessionDirectory + ?Sized,
    W: Write,
{
    match session {
        Some(id) => {
            let record = directory
                .session_detail(id)
                .await
                .with_context(|| format!("Failed to load session {}", id))?;
            write_conversation(out, &record)?;
        }
        None => {
            let records = directory
                .history()
                .await
                .context("Failed to load interview history")?;
            if records.is_empty() {
                writeln!(out, "No interview sessions yet.")?;
            }
            for record in &records {
                write_summary(out, record)?;
            }
        }
    }
    Ok(())
}

/// Prints the stored overall assessment, asking the backend to build a fresh
/// one first when `generate` is set.
pub async fn print_assessment<D, W>(directory: &D, generate: bool, out: &mut W) -> Result<()>
where
    D: SessionDirectory + ?Sized,
    W: Write,
{
    let body = if generate {
        let response = directory
            .generate_assessment()
            .await
            .context("Failed to generate the assessment")?;
        if let Some(total) = response.total_sessions() {
            writeln!(out, "Assessment built from {} evaluated sessions.", total)?;
        }
        response.into_assessment()
    } else {
        directory
            .assessment()
            .await
            .context("Failed to load the assessment")?
    };

    match body {
        Some(AssessmentBody::Stored(assessment)) => {
            if let Some(updated) = assessment.updated_at() {
                writeln!(out, "Updated {}", updated.format("%Y-%m-%d %H:%M UTC"))?;
            }
            writeln!(out, "{}", assessment.content())?;
        }
        Some(AssessmentBody::Notice(message)) => writeln!(out, "{}", message)?,
        None => writeln!(
            out,
            "No assessment yet. Run with --generate once a session has been evaluated."
        )?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use interview_core::session_api::ApiError;
    use interview_realtime::types::SessionDescriptor;
    use interview_realtime::types::api::AssessmentResponse;
    use mockall::mock;
    use mockall::predicate::*;

    mock! {
        pub Directory {}
        #[async_trait]
        impl SessionDirectory for Directory {
            async fn get_session(&self, id: SessionId) -> Result<SessionDescriptor, ApiError>;
            async fn history(&self) -> Result<Vec<SessionRecord>, ApiError>;
            async fn session_detail(&self, id: SessionId) -> Result<SessionRecord, ApiError>;
            async fn assessment(&self) -> Result<Option<AssessmentBody>, ApiError>;
            async fn generate_assessment(&self) -> Result<AssessmentResponse, ApiError>;
        }
    }

    fn record(json: &str) -> SessionRecord {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_session_detail_hides_system_prompts() {
        // --- Arrange ---
        let mut directory = MockDirectory::new();
        directory
            .expect_session_detail()
            .with(eq(SessionId::new(4)))
            .times(1)
            .returning(|_| {
                Ok(record(
                    r#"{"id": 4, "position": "Junior", "industry": "IT", "style": "Nghiêm túc",
                        "language": "vi", "status": "completed", "created_at": "2025-03-01T08:30:00Z",
                        "conversation": [
                            {"role": "system", "content": "You are an interviewer", "timestamp": "2025-03-01T08:30:00Z"},
                            {"role": "assistant", "content": "Xin chào!", "timestamp": "2025-03-01T08:30:05Z"},
                            {"role": "user", "content": "Chào anh", "timestamp": "2025-03-01T08:31:00Z"}
                        ]}"#,
                ))
            });
        let mut out = Vec::new();

        // --- Act ---
        print_history(&directory, Some(SessionId::new(4)), &mut out)
            .await
            .unwrap();

        // --- Assert ---
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("#4"));
        assert!(output.contains("Junior / IT"));
        assert!(output.contains("[15:30] AI: Xin chào!"));
        assert!(output.contains("[15:31] Bạn: Chào anh"));
        assert!(!output.contains("You are an interviewer"));
    }

    #[tokio::test]
    async fn test_empty_history() {
        let mut directory = MockDirectory::new();
        directory.expect_history().times(1).returning(|| Ok(vec![]));
        let mut out = Vec::new();

        print_history(&directory, None, &mut out).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "No interview sessions yet.\n");
    }

    #[tokio::test]
    async fn test_generate_assessment_notice() {
        // --- Arrange ---
        let mut directory = MockDirectory::new();
        directory.expect_assessment().never();
        directory.expect_generate_assessment().times(1).returning(|| {
            Ok(serde_json::from_str(
                r#"{"assessment": "Chưa có buổi phỏng vấn nào được đánh giá.", "total_sessions": 0}"#,
            )
            .unwrap())
        });
        let mut out = Vec::new();

        // --- Act ---
        print_assessment(&directory, true, &mut out).await.unwrap();

        // --- Assert ---
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("0 evaluated sessions"));
        assert!(output.contains("Chưa có buổi phỏng vấn nào được đánh giá."));
    }

    #[tokio::test]
    async fn test_missing_session_is_reported() {
        let mut directory = MockDirectory::new();
        directory
            .expect_session_detail()
            .returning(|_| Err(ApiError::NotFound("Session not found".to_string())));
        let mut out = Vec::new();

        let err = print_history(&directory, Some(SessionId::new(9)), &mut out)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to load session 9"));
    }
}
