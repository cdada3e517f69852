//! Reply composition state and client-side draft validation.
//!
//! Composition follows `Idle -> Composing(target) -> Submitting -> Idle`. A
//! failed submission drops back to `Composing` with the same target so the
//! user can correct and resend. Drafts are checked here before anything
//! touches the network.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{IMAGE_EXTENSIONS, MAX_CONTENT_CHARS, VIDEO_EXTENSIONS};
use crate::error::AppError;

use super::Id;

/// What a reply is being written against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyTarget {
    /// Root-level reply to the message itself
    Message { id: Id },
    /// Answer to another reply
    Reply { id: Id, author: String },
}

impl ReplyTarget {
    /// Parent reply id to send with the submission
    pub fn parent_id(&self) -> Option<&Id> {
        match self {
            ReplyTarget::Message { .. } => None,
            ReplyTarget::Reply { id, .. } => Some(id),
        }
    }

    pub fn prompt(&self) -> Option<String> {
        match self {
            ReplyTarget::Message { .. } => None,
            ReplyTarget::Reply { author, .. } => Some(format!("Replying to @{}", author)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ComposeState {
    #[default]
    Idle,
    Composing(ReplyTarget),
    Submitting(ReplyTarget),
}

impl ComposeState {
    /// Start (or retarget) a reply.
    pub fn begin(&mut self, target: ReplyTarget) -> Result<(), AppError> {
        if self.is_submitting() {
            return Err(AppError::SubmissionInFlight);
        }
        *self = ComposeState::Composing(target);
        Ok(())
    }

    /// Drop the draft target and return to idle.
    pub fn clear(&mut self) -> Result<(), AppError> {
        if self.is_submitting() {
            return Err(AppError::SubmissionInFlight);
        }
        *self = ComposeState::Idle;
        Ok(())
    }

    /// Enter `Submitting`. Sending straight from idle replies to the message.
    pub fn start_submit(&mut self, message_id: &Id) -> Result<ReplyTarget, AppError> {
        let target = match self {
            ComposeState::Submitting(_) => return Err(AppError::SubmissionInFlight),
            ComposeState::Composing(target) => target.clone(),
            ComposeState::Idle => ReplyTarget::Message {
                id: message_id.clone(),
            },
        };
        *self = ComposeState::Submitting(target.clone());
        Ok(target)
    }

    /// Leave `Submitting`: back to idle on success, back to composing on failure.
    pub fn finish(&mut self, succeeded: bool) {
        if let ComposeState::Submitting(target) = self {
            *self = if succeeded {
                ComposeState::Idle
            } else {
                ComposeState::Composing(target.clone())
            };
        }
    }

    pub fn target(&self) -> Option<&ReplyTarget> {
        match self {
            ComposeState::Idle => None,
            ComposeState::Composing(t) | ComposeState::Submitting(t) => Some(t),
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, ComposeState::Submitting(_))
    }

    pub fn prompt(&self) -> Option<String> {
        self.target().and_then(ReplyTarget::prompt)
    }
}

/// A new top-level message as entered by the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDraft {
    pub content: String,
    pub images: Vec<PathBuf>,
    pub video: Option<PathBuf>,
    /// Generic attachments, any extension
    pub files: Vec<PathBuf>,
}

impl MessageDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_content(&self.content)?;
        for image in &self.images {
            check_extension(image, IMAGE_EXTENSIONS, "image")?;
        }
        if let Some(video) = &self.video {
            check_extension(video, VIDEO_EXTENSIONS, "video")?;
        }
        Ok(())
    }
}

/// A reply as entered by the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyDraft {
    pub content: String,
    pub image: Option<PathBuf>,
    pub video: Option<PathBuf>,
}

impl ReplyDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_content(&self.content)?;
        if let Some(image) = &self.image {
            check_extension(image, IMAGE_EXTENSIONS, "image")?;
        }
        if let Some(video) = &self.video {
            check_extension(video, VIDEO_EXTENSIONS, "video")?;
        }
        Ok(())
    }
}

fn validate_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("Content is required".into()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation(format!(
            "Content too long (max {} characters)",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(())
}

fn check_extension(path: &Path, allowed: &[&str], kind: &str) -> Result<(), AppError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if allowed.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Unsupported {} type: {} (allowed: {})",
            kind,
            path.display(),
            allowed.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_target() -> ReplyTarget {
        ReplyTarget::Reply {
            id: Id::from(5),
            author: "Anna".to_string(),
        }
    }

    #[test]
    fn test_begin_sets_prompt() {
        let mut state = ComposeState::default();
        state.begin(reply_target()).unwrap();
        assert_eq!(state.prompt().as_deref(), Some("Replying to @Anna"));
        assert_eq!(state.target().and_then(|t| t.parent_id()), Some(&Id::from(5)));
    }

    #[test]
    fn test_message_target_has_no_parent_or_prompt() {
        let target = ReplyTarget::Message { id: Id::from(1) };
        assert_eq!(target.parent_id(), None);
        assert_eq!(target.prompt(), None);
    }

    #[test]
    fn test_submit_from_idle_targets_message() {
        let mut state = ComposeState::Idle;
        let target = state.start_submit(&Id::from(1)).unwrap();
        assert_eq!(target, ReplyTarget::Message { id: Id::from(1) });
        assert!(state.is_submitting());
    }

    #[test]
    fn test_second_submit_is_rejected() {
        let mut state = ComposeState::Idle;
        state.begin(reply_target()).unwrap();
        state.start_submit(&Id::from(1)).unwrap();
        assert!(matches!(state.start_submit(&Id::from(1)), Err(AppError::SubmissionInFlight)));
        assert!(matches!(state.begin(reply_target()), Err(AppError::SubmissionInFlight)));
        assert!(matches!(state.clear(), Err(AppError::SubmissionInFlight)));
    }

    #[test]
    fn test_finish_success_returns_to_idle() {
        let mut state = ComposeState::Composing(reply_target());
        state.start_submit(&Id::from(1)).unwrap();
        state.finish(true);
        assert_eq!(state, ComposeState::Idle);
    }

    #[test]
    fn test_finish_failure_keeps_target() {
        let mut state = ComposeState::Composing(reply_target());
        state.start_submit(&Id::from(1)).unwrap();
        state.finish(false);
        assert_eq!(state, ComposeState::Composing(reply_target()));
    }

    #[test]
    fn test_clear_returns_to_idle() {
        let mut state = ComposeState::Composing(reply_target());
        state.clear().unwrap();
        assert_eq!(state, ComposeState::Idle);
        assert_eq!(state.prompt(), None);
    }

    #[test]
    fn test_empty_content_rejected() {
        let draft = MessageDraft {
            content: "  \n ".to_string(),
            ..Default::default()
        };
        assert!(matches!(draft.validate(), Err(AppError::Validation(_))));
        let reply = ReplyDraft::default();
        assert!(matches!(reply.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_overlong_content_rejected() {
        let draft = ReplyDraft {
            content: "x".repeat(MAX_CONTENT_CHARS + 1),
            ..Default::default()
        };
        assert!(matches!(draft.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_attachment_extensions() {
        let ok = MessageDraft {
            content: "hello".to_string(),
            images: vec![PathBuf::from("a.PNG"), PathBuf::from("b.jpeg")],
            video: Some(PathBuf::from("clip.webm")),
            files: vec![PathBuf::from("notes.pdf"), PathBuf::from("README")],
        };
        assert!(ok.validate().is_ok());

        let bad_image = ReplyDraft {
            content: "hello".to_string(),
            image: Some(PathBuf::from("a.bmp")),
            video: None,
        };
        assert!(matches!(bad_image.validate(), Err(AppError::Validation(_))));

        let bad_video = MessageDraft {
            content: "hello".to_string(),
            video: Some(PathBuf::from("clip.mkv")),
            ..Default::default()
        };
        assert!(matches!(bad_video.validate(), Err(AppError::Validation(_))));
    }
}
