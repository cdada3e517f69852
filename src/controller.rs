//! Intent dispatch for the interactive client.
//!
//! The terminal and the poller emit [`Intent`]s; the [`Controller`] maps each one
//! onto view-model operations and API calls and reports back [`Notice`]s for
//! the user. Intents are applied one at a time, so the state always reflects
//! the most recently applied response.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{GuestbookApi, NewMessage, NewReply};
use crate::board::{
    ComposeState, Id, Message, MessageDraft, MessageListModel, ReplyDraft, ReplyTarget, ReplyTree,
    SortMode,
};
use crate::error::{AppError, Result};
use crate::profile::{ProfileStore, UserProfile};
use crate::session::SessionStore;
use crate::state::AppState;
use crate::templates::{render_detail, render_list};

/// Where a refresh request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOrigin {
    Poll,
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Refresh { origin: RefreshOrigin },
    Search(String),
    ClearSearch,
    SetSort(SortMode),
    GoToPage(usize),
    NextPage,
    PrevPage,
    OpenMessage(Id),
    BackToList,
    /// Start a root-level reply to the open message
    ReplyToMessage,
    /// Start a reply to one of the open message's replies
    ReplyRequested(Id),
    CancelReply,
    SubmitReply(ReplyDraft),
    PostMessage(MessageDraft),
    EditProfile { name: String, email: String },
    Quit,
}

/// User-visible feedback for a dispatched intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Info(text) => write!(f, "{}", text),
            Notice::Error(text) => write!(f, "Error: {}", text),
        }
    }
}

/// The open message with its reply tree and reply form state.
#[derive(Debug)]
pub struct DetailView {
    pub message: Message,
    pub replies: ReplyTree,
    pub compose: ComposeState,
}

pub struct Controller {
    state: AppState,
    list: MessageListModel,
    detail: Option<DetailView>,
    profiles: ProfileStore,
    profile: Option<UserProfile>,
    session: SessionStore,
}

impl Controller {
    /// Create a controller, reading the stored profile if there is one.
    pub fn new(state: AppState, profiles: ProfileStore) -> Result<Self> {
        let profile = profiles.load()?;
        match &profile {
            Some(p) => tracing::info!(name = %p.name, "Loaded user profile"),
            None => tracing::info!("No user profile stored yet"),
        }

        Ok(Self {
            state,
            list: MessageListModel::new(),
            detail: None,
            profiles,
            profile,
            session: SessionStore::new(),
        })
    }

    pub fn list(&self) -> &MessageListModel {
        &self.list
    }

    pub fn detail(&self) -> Option<&DetailView> {
        self.detail.as_ref()
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Apply one intent. Errors never escape: they become notices, and a
    /// failed background refresh is only logged.
    pub async fn dispatch(&mut self, intent: Intent) -> Vec<Notice> {
        let silent = matches!(intent, Intent::Refresh { origin: RefreshOrigin::Poll });
        tracing::debug!(?intent, "Dispatching intent");

        match self.apply(intent).await {
            Ok(notices) => notices,
            Err(e) if silent => {
                tracing::warn!(error = %e, "Background refresh failed, keeping last known messages");
                Vec::new()
            }
            Err(e) => {
                if e.is_transport() {
                    tracing::warn!(error = %e, "Request failed");
                }
                vec![Notice::Error(e.user_message())]
            }
        }
    }

    async fn apply(&mut self, intent: Intent) -> Result<Vec<Notice>> {
        match intent {
            Intent::Refresh { origin } => self.refresh(origin).await,
            Intent::Search(query) => {
                let count = self.list.search(&query);
                Ok(vec![Notice::Info(format!("{} message(s) match", count))])
            }
            Intent::ClearSearch => {
                let count = self.list.clear_search();
                Ok(vec![Notice::Info(format!("Showing all {} message(s)", count))])
            }
            Intent::SetSort(mode) => {
                self.list.set_sort(mode);
                Ok(vec![Notice::Info(format!("Sorted {}", mode))])
            }
            Intent::GoToPage(n) => {
                if self.list.goto_page(n) {
                    Ok(Vec::new())
                } else {
                    Err(AppError::Validation(format!(
                        "Page {} is out of range (1-{})",
                        n,
                        self.list.total_pages()
                    )))
                }
            }
            Intent::NextPage => {
                if self.list.next_page() {
                    Ok(Vec::new())
                } else {
                    Err(AppError::Validation("Already on the last page".into()))
                }
            }
            Intent::PrevPage => {
                if self.list.prev_page() {
                    Ok(Vec::new())
                } else {
                    Err(AppError::Validation("Already on the first page".into()))
                }
            }
            Intent::OpenMessage(id) => {
                self.session.select(id);
                self.open_selected().await
            }
            Intent::BackToList => {
                self.detail = None;
                Ok(Vec::new())
            }
            Intent::ReplyToMessage => {
                let detail = self.open_detail()?;
                let target = ReplyTarget::Message {
                    id: detail.message.id.clone(),
                };
                Self::begin_reply(detail, target)
            }
            Intent::ReplyRequested(id) => self.request_reply(&id),
            Intent::CancelReply => {
                self.open_detail()?.compose.clear()?;
                Ok(vec![Notice::Info("Reply cancelled".into())])
            }
            Intent::SubmitReply(draft) => self.submit_reply(draft).await,
            Intent::PostMessage(draft) => self.post_message(draft).await,
            Intent::EditProfile { name, email } => {
                let profile = self.profiles.save(&name, &email)?;
                let notice = format!("Profile saved: {} <{}>", profile.name, profile.email);
                self.profile = Some(profile);
                Ok(vec![Notice::Info(notice)])
            }
            Intent::Quit => Ok(Vec::new()),
        }
    }

    /// Render whichever view is active.
    pub fn render(&self) -> Result<String> {
        let ui = &self.state.config.ui;
        match &self.detail {
            Some(detail) => render_detail(
                &self.state.tera,
                ui,
                &detail.message,
                &detail.replies,
                &detail.compose,
            ),
            None => render_list(&self.state.tera, ui, &self.list),
        }
    }

    fn api(&self) -> Arc<dyn GuestbookApi> {
        Arc::clone(&self.state.api)
    }

    fn open_detail(&mut self) -> Result<&mut DetailView> {
        self.detail
            .as_mut()
            .ok_or_else(|| AppError::Validation("Open a message first".into()))
    }

    /// Fetch the message list. On failure the previous list stays in place.
    async fn reload_messages(&mut self) -> Result<()> {
        let messages = self.api().list_messages().await?;
        self.list.set_messages(messages);
        Ok(())
    }

    async fn refresh(&mut self, origin: RefreshOrigin) -> Result<Vec<Notice>> {
        self.reload_messages().await?;

        let api = self.api();
        if let Some(detail) = self.detail.as_mut() {
            // A submission in progress owns the tree until it finishes
            if !detail.compose.is_submitting() {
                detail.replies = ReplyTree::build(api.list_replies(&detail.message.id).await?);
            }
        }

        match origin {
            RefreshOrigin::Poll => Ok(Vec::new()),
            RefreshOrigin::User => Ok(vec![Notice::Info(format!(
                "Refreshed: {} message(s)",
                self.list.total_count()
            ))]),
        }
    }

    /// Consume the selected id and load its detail view.
    async fn open_selected(&mut self) -> Result<Vec<Notice>> {
        let id = self
            .session
            .take()
            .ok_or_else(|| AppError::Internal("no message selected".into()))?;

        self.reload_messages().await?;
        let message = self
            .list
            .find(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Message {}", id)))?;

        let replies = ReplyTree::build(self.api().list_replies(&id).await?);
        tracing::info!(message_id = %id, replies = replies.len(), "Opened message");

        self.detail = Some(DetailView {
            message,
            replies,
            compose: ComposeState::default(),
        });
        Ok(Vec::new())
    }

    /// Target a reply by id. Message and reply ids come from separate
    /// sequences, so the id is only ever looked up among the replies.
    fn request_reply(&mut self, id: &Id) -> Result<Vec<Notice>> {
        let detail = self.open_detail()?;
        let node = detail
            .replies
            .find(id)
            .ok_or_else(|| AppError::NotFound(format!("Reply {}", id)))?;
        let target = ReplyTarget::Reply {
            id: id.clone(),
            author: node.reply.name.clone(),
        };
        Self::begin_reply(detail, target)
    }

    fn begin_reply(detail: &mut DetailView, target: ReplyTarget) -> Result<Vec<Notice>> {
        let notice = target
            .prompt()
            .unwrap_or_else(|| format!("Replying to message {}", detail.message.id));
        detail.compose.begin(target)?;
        Ok(vec![Notice::Info(notice)])
    }

    async fn submit_reply(&mut self, draft: ReplyDraft) -> Result<Vec<Notice>> {
        draft.validate()?;
        let profile = self.profile.clone().ok_or(AppError::ProfileUnset)?;
        let api = self.api();

        let detail = self.open_detail()?;
        let message_id = detail.message.id.clone();
        let target = detail.compose.start_submit(&message_id)?;

        let sent = async {
            let reply = NewReply::prepare(Some(&profile), &draft, &target).await?;
            api.post_reply(&message_id, reply).await
        }
        .await;

        match sent {
            Ok(confirmation) => {
                detail.compose.finish(true);
                tracing::info!(message_id = %message_id, parent = ?target.parent_id(), "Reply posted");

                let mut notices = vec![Notice::Info(confirmation)];
                match api.list_replies(&message_id).await {
                    Ok(replies) => detail.replies = ReplyTree::build(replies),
                    Err(e) => notices.push(Notice::Error(e.user_message())),
                }
                Ok(notices)
            }
            Err(e) => {
                detail.compose.finish(false);
                Err(e)
            }
        }
    }

    async fn post_message(&mut self, draft: MessageDraft) -> Result<Vec<Notice>> {
        let message = NewMessage::prepare(self.profile.as_ref(), &draft).await?;
        let confirmation = self.api().post_message(message).await?;
        tracing::info!("Message posted");

        let mut notices = vec![Notice::Info(confirmation)];
        if let Err(e) = self.reload_messages().await {
            notices.push(Notice::Error(e.user_message()));
        }
        Ok(notices)
    }
}

/// Commands accepted by [`parse_command`]
pub const COMMAND_HELP: &str = "commands: search TEXT | clear | sort newest|oldest | page N | next | prev | \
open ID | back | reply [REPLY_ID] | cancel | send TEXT [--image PATH] [--video PATH] | \
post TEXT [--image PATH]... [--video PATH] [--file PATH]... | profile NAME EMAIL | refresh | quit";

/// Attachment flags pulled out of a command's arguments
#[derive(Default)]
struct CommandArgs {
    text: String,
    images: Vec<PathBuf>,
    videos: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

fn split_args(rest: &str) -> Result<CommandArgs> {
    let mut args = CommandArgs::default();
    let mut words = Vec::new();
    let mut tokens = rest.split_whitespace();

    while let Some(token) = tokens.next() {
        let slot = match token {
            "--image" => &mut args.images,
            "--video" => &mut args.videos,
            "--file" => &mut args.files,
            _ => {
                words.push(token);
                continue;
            }
        };
        let path = tokens
            .next()
            .ok_or_else(|| AppError::Validation(format!("{} needs a path", token)))?;
        slot.push(PathBuf::from(path));
    }

    if args.videos.len() > 1 {
        return Err(AppError::Validation("Only one video can be attached".into()));
    }
    args.text = words.join(" ");
    Ok(args)
}

fn parse_id(rest: &str, command: &str) -> Result<Id> {
    rest.parse::<Id>()
        .map_err(|_| AppError::Validation(format!("usage: {} ID", command)))
}

/// Map one line of terminal input to an intent. Blank lines map to nothing.
pub fn parse_command(line: &str) -> Result<Option<Intent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let intent = match command.to_ascii_lowercase().as_str() {
        "search" | "find" => Intent::Search(rest.to_string()),
        "clear" => Intent::ClearSearch,
        "sort" => Intent::SetSort(rest.parse::<SortMode>().map_err(AppError::Validation)?),
        "page" => {
            let n = rest
                .parse::<usize>()
                .map_err(|_| AppError::Validation("usage: page N".into()))?;
            Intent::GoToPage(n)
        }
        "next" => Intent::NextPage,
        "prev" | "previous" => Intent::PrevPage,
        "open" | "show" => Intent::OpenMessage(parse_id(rest, "open")?),
        "back" => Intent::BackToList,
        "reply" if rest.is_empty() => Intent::ReplyToMessage,
        "reply" => Intent::ReplyRequested(parse_id(rest, "reply")?),
        "cancel" => Intent::CancelReply,
        "send" => {
            let mut args = split_args(rest)?;
            if !args.files.is_empty() || args.images.len() > 1 {
                return Err(AppError::Validation(
                    "Replies take at most one image and one video".into(),
                ));
            }
            Intent::SubmitReply(ReplyDraft {
                content: args.text,
                image: args.images.pop(),
                video: args.videos.pop(),
            })
        }
        "post" => {
            let mut args = split_args(rest)?;
            Intent::PostMessage(MessageDraft {
                content: args.text,
                images: args.images,
                video: args.videos.pop(),
                files: args.files,
            })
        }
        "profile" => {
            let (name, email) = rest
                .rsplit_once(char::is_whitespace)
                .ok_or_else(|| AppError::Validation("usage: profile NAME EMAIL".into()))?;
            Intent::EditProfile {
                name: name.trim().to_string(),
                email: email.trim().to_string(),
            }
        }
        "refresh" => Intent::Refresh {
            origin: RefreshOrigin::User,
        },
        "quit" | "exit" => Intent::Quit,
        other => {
            return Err(AppError::Validation(format!(
                "unknown command {:?}; {}",
                other, COMMAND_HELP
            )))
        }
    };

    Ok(Some(intent))
}
