//! Guestbook REST API access.
//!
//! [`GuestbookApi`] is the contract the rest of the client talks to; [`HttpApi`]
//! implements it over HTTP. Submissions are assembled here from a validated
//! draft plus the user's profile, with attachments read from disk up front so
//! size and type problems surface before any request is made.

mod client;

pub use client::HttpApi;

use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::board::{timestamp, Id, Message, MessageDraft, Reply, ReplyDraft, ReplyTarget};
use crate::config::MAX_ATTACHMENT_BYTES;
use crate::error::{AppError, Result};
use crate::profile::UserProfile;

/// Operations offered by the guestbook server.
#[async_trait]
pub trait GuestbookApi: Send + Sync {
    /// `GET /api/messages`
    async fn list_messages(&self) -> Result<Vec<Message>>;

    /// `POST /api/messages`; returns the server's confirmation text
    async fn post_message(&self, message: NewMessage) -> Result<String>;

    /// `GET /api/messages/{id}/replies`, flattened to parent pointers
    async fn list_replies(&self, message_id: &Id) -> Result<Vec<Reply>>;

    /// `POST /api/messages/{id}/replies`; returns the server's confirmation text
    async fn post_reply(&self, message_id: &Id, reply: NewReply) -> Result<String>;
}

/// A file read into memory for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub async fn load(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(AppError::Validation(format!("{} is not a file", path.display())));
        }
        if metadata.len() > MAX_ATTACHMENT_BYTES {
            return Err(AppError::Validation(format!(
                "{} is too large (max {} MiB)",
                path.display(),
                MAX_ATTACHMENT_BYTES / (1024 * 1024)
            )));
        }

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            mime: mime_for(path),
            file_name,
            bytes,
        })
    }
}

fn mime_for(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}

async fn load_optional(path: Option<&Path>) -> Result<Option<Attachment>> {
    match path {
        Some(path) => Ok(Some(Attachment::load(path).await?)),
        None => Ok(None),
    }
}

/// Multipart body for `POST /api/messages`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub name: String,
    pub email: String,
    pub content: String,
    pub images: Vec<Attachment>,
    pub video: Option<Attachment>,
    pub files: Vec<Attachment>,
}

impl NewMessage {
    /// Validate the draft and read its attachments.
    pub async fn prepare(profile: Option<&UserProfile>, draft: &MessageDraft) -> Result<Self> {
        draft.validate()?;
        let profile = profile.ok_or(AppError::ProfileUnset)?;

        let mut images = Vec::with_capacity(draft.images.len());
        for path in &draft.images {
            images.push(Attachment::load(path).await?);
        }
        let mut files = Vec::with_capacity(draft.files.len());
        for path in &draft.files {
            files.push(Attachment::load(path).await?);
        }

        Ok(Self {
            name: profile.name.clone(),
            email: profile.email.clone(),
            content: draft.content.trim().to_string(),
            images,
            video: load_optional(draft.video.as_deref()).await?,
            files,
        })
    }
}

/// Multipart body for `POST /api/messages/{id}/replies`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReply {
    pub name: String,
    pub email: String,
    pub content: String,
    pub parent_id: Option<Id>,
    pub image: Option<Attachment>,
    pub video: Option<Attachment>,
}

impl NewReply {
    pub async fn prepare(
        profile: Option<&UserProfile>,
        draft: &ReplyDraft,
        target: &ReplyTarget,
    ) -> Result<Self> {
        draft.validate()?;
        let profile = profile.ok_or(AppError::ProfileUnset)?;

        Ok(Self {
            name: profile.name.clone(),
            email: profile.email.clone(),
            content: draft.content.trim().to_string(),
            parent_id: target.parent_id().cloned(),
            image: load_optional(draft.image.as_deref()).await?,
            video: load_optional(draft.video.as_deref()).await?,
        })
    }
}

/// Wire shape of a reply. Servers may nest answers under `children`
/// instead of (or as well as) setting `parent_id`.
#[derive(Debug, Deserialize)]
pub struct ReplyPayload {
    id: Id,
    #[serde(default)]
    parent_id: Option<Id>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    content: String,
    #[serde(with = "timestamp")]
    created_at: NaiveDateTime,
    #[serde(default)]
    image_path: Option<String>,
    #[serde(default)]
    video_path: Option<String>,
    #[serde(default)]
    children: Vec<ReplyPayload>,
}

/// Flatten a possibly nested reply payload into parent-pointer form, pre-order.
/// Nested entries without an explicit `parent_id` inherit their container's id.
pub fn flatten_replies(payload: Vec<ReplyPayload>) -> Vec<Reply> {
    let mut result = Vec::new();
    let mut stack: Vec<(ReplyPayload, Option<Id>)> =
        payload.into_iter().rev().map(|p| (p, None)).collect();

    while let Some((mut entry, inherited)) = stack.pop() {
        let children = std::mem::take(&mut entry.children);
        for child in children.into_iter().rev() {
            stack.push((child, Some(entry.id.clone())));
        }

        result.push(Reply {
            parent_id: entry.parent_id.or(inherited),
            id: entry.id,
            name: entry.name,
            email: entry.email,
            content: entry.content,
            created_at: entry.created_at,
            image: entry.image_path.filter(|p| !p.trim().is_empty()),
            video: entry.video_path.filter(|p| !p.trim().is_empty()),
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn profile() -> UserProfile {
        UserProfile {
            name: "Anna".to_string(),
            email: "anna@example.com".to_string(),
        }
    }

    #[test]
    fn test_flatten_flat_payload_keeps_order() {
        let json = r#"[
            {"id": 1, "parent_id": null, "name": "a", "email": "a@x", "content": "one", "created_at": "2024-01-01 10:00:00"},
            {"id": 2, "parent_id": 1, "name": "b", "email": "b@x", "content": "two", "created_at": "2024-01-01 10:01:00"}
        ]"#;
        let payload: Vec<ReplyPayload> = serde_json::from_str(json).unwrap();
        let replies = flatten_replies(payload);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].parent_id, None);
        assert_eq!(replies[1].parent_id, Some(Id::from(1)));
    }

    #[test]
    fn test_flatten_nested_payload_inherits_parent() {
        let json = r#"[
            {"id": 1, "name": "a", "email": "a@x", "content": "one", "created_at": "2024-01-01 10:00:00",
             "image_path": "", "children": [
                {"id": 2, "name": "b", "email": "b@x", "content": "two", "created_at": "2024-01-01 10:01:00",
                 "children": [
                    {"id": 4, "name": "d", "email": "d@x", "content": "four", "created_at": "2024-01-01 10:03:00"}
                 ]},
                {"id": 3, "name": "c", "email": "c@x", "content": "three", "created_at": "2024-01-01 10:02:00"}
             ]},
            {"id": 5, "name": "e", "email": "e@x", "content": "five", "created_at": "2024-01-01 10:04:00"}
        ]"#;
        let payload: Vec<ReplyPayload> = serde_json::from_str(json).unwrap();
        let replies = flatten_replies(payload);
        let ids: Vec<String> = replies.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "2", "4", "3", "5"]);
        assert_eq!(replies[1].parent_id, Some(Id::from(1)));
        assert_eq!(replies[2].parent_id, Some(Id::from(2)));
        assert_eq!(replies[3].parent_id, Some(Id::from(1)));
        assert_eq!(replies[4].parent_id, None);
        assert_eq!(replies[0].image, None);
    }

    #[test]
    fn test_mime_for_known_extensions() {
        assert_eq!(mime_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_for(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(mime_for(Path::new("clip.webm")), "video/webm");
        assert_eq!(mime_for(Path::new("noext")), "application/octet-stream");
        assert_eq!(mime_for(Path::new("blob.qqzz")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_attachment_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"\x89PNG fake").unwrap();

        let attachment = Attachment::load(&path).await.unwrap();
        assert_eq!(attachment.file_name, "photo.png");
        assert_eq!(attachment.mime, "image/png");
        assert_eq!(attachment.bytes, b"\x89PNG fake".to_vec());
    }

    #[tokio::test]
    async fn test_attachment_load_missing_file() {
        let err = Attachment::load(Path::new("/definitely/not/here.png")).await.unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[tokio::test]
    async fn test_prepare_message_requires_profile() {
        let draft = MessageDraft {
            content: "hello".to_string(),
            ..Default::default()
        };
        let err = NewMessage::prepare(None, &draft).await.unwrap_err();
        assert!(matches!(err, AppError::ProfileUnset));
    }

    #[tokio::test]
    async fn test_prepare_message_rejects_empty_content_first() {
        let draft = MessageDraft::default();
        let err = NewMessage::prepare(None, &draft).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_prepare_reply_carries_parent() {
        let draft = ReplyDraft {
            content: "  thanks!  ".to_string(),
            ..Default::default()
        };
        let target = ReplyTarget::Reply {
            id: Id::from(7),
            author: "Bob".to_string(),
        };
        let reply = NewReply::prepare(Some(&profile()), &draft, &target).await.unwrap();
        assert_eq!(reply.parent_id, Some(Id::from(7)));
        assert_eq!(reply.content, "thanks!");
        assert_eq!(reply.name, "Anna");
    }

    #[tokio::test]
    async fn test_prepare_reply_bad_video_type() {
        let draft = ReplyDraft {
            content: "see clip".to_string(),
            image: None,
            video: Some(PathBuf::from("clip.flv")),
        };
        let target = ReplyTarget::Message { id: Id::from(1) };
        let err = NewReply::prepare(Some(&profile()), &draft, &target).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
