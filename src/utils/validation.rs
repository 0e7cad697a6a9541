use crate::error::{EngineError, Result};
use crate::models::*;

pub const MAX_TITLE_LEN: usize = 500;

pub fn validate_candidate(candidate: &Candidate) -> Result<()> {
    if candidate.id.is_nil() {
        return Err(EngineError::InvalidCandidate("candidate ID cannot be nil".to_string()));
    }

    if candidate.creator_id.is_nil() {
        return Err(EngineError::InvalidCandidate(format!(
            "candidate {} has no creator",
            candidate.id
        )));
    }

    if candidate.title.trim().is_empty() {
        return Err(EngineError::InvalidCandidate(format!(
            "candidate {} has an empty title",
            candidate.id
        )));
    }

    if candidate.title.len() > MAX_TITLE_LEN {
        return Err(EngineError::InvalidCandidate(format!(
            "candidate {} title too long (max {} characters)",
            candidate.id, MAX_TITLE_LEN
        )));
    }

    Ok(())
}

pub fn validate_interaction(event: &InteractionEvent) -> Result<()> {
    if event.user_id.is_nil() {
        return Err(EngineError::InvalidInteraction("user ID cannot be nil".to_string()));
    }

    if event.video_id.is_nil() {
        return Err(EngineError::InvalidInteraction("video ID cannot be nil".to_string()));
    }

    if let Some(seconds) = event.watch_time_seconds {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(EngineError::InvalidInteraction(format!(
                "watch time must be a non-negative number, got {seconds}"
            )));
        }
    }

    // Events may not be stamped more than an hour ahead
    let max_future = chrono::Utc::now() + chrono::Duration::hours(1);
    if event.timestamp > max_future {
        return Err(EngineError::InvalidInteraction(
            "timestamp cannot be more than 1 hour in the future".to_string(),
        ));
    }

    Ok(())
}
