//! Conversation turn domain types.
//!
//! A turn is one stored exchange unit between an end user and the desk:
//! User writes → caller stores the turn → orchestrator replies → reply is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the end user who owns a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a stored file (document, photo, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who a stored turn is from, in the desk's own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The desk (automated reply or human operator)
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// A single stored conversation turn. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Owner of the conversation
    pub user_id: UserId,

    /// Direction of the turn
    pub role: Role,

    /// Text content; `None` when the turn only carries an attachment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Attached file, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<FileId>,

    /// Written by a human operator rather than the automated desk
    #[serde(default)]
    pub by_operator: bool,

    /// Exchanged while automated replies were suspended for this user
    #[serde(default)]
    pub off_policy: bool,

    pub created_at: DateTime<Utc>,
}

/// The data needed to append a turn. Stores assign id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTurn {
    pub user_id: UserId,
    pub role: Role,
    pub content: Option<String>,
    pub attachment: Option<FileId>,
    pub by_operator: bool,
    pub off_policy: bool,
}

impl NewTurn {
    /// An inbound message from the end user.
    pub fn user(user_id: UserId, content: impl Into<String>) -> Self {
        Self {
            user_id,
            role: Role::User,
            content: Some(content.into()),
            attachment: None,
            by_operator: false,
            off_policy: false,
        }
    }

    /// An automated reply from the desk.
    pub fn assistant(user_id: UserId, content: impl Into<String>) -> Self {
        Self {
            user_id,
            role: Role::Assistant,
            content: Some(content.into()),
            attachment: None,
            by_operator: false,
            off_policy: false,
        }
    }

    /// A reply typed by a human operator.
    pub fn operator(user_id: UserId, content: impl Into<String>) -> Self {
        Self {
            by_operator: true,
            ..Self::assistant(user_id, content)
        }
    }

    pub fn with_attachment(mut self, file: FileId) -> Self {
        self.attachment = Some(file);
        self
    }

    pub fn off_policy(mut self) -> Self {
        self.off_policy = true;
        self
    }

    /// Materialize into a stored turn with a fresh id and timestamp.
    pub fn into_turn(self) -> Turn {
        Turn {
            id: Uuid::new_v4().to_string(),
            user_id: self.user_id,
            role: self.role,
            content: self.content,
            attachment: self.attachment,
            by_operator: self.by_operator,
            off_policy: self.off_policy,
            created_at: Utc::now(),
        }
    }
}

impl Turn {
    /// Whether this turn may be shown to the model at all.
    ///
    /// Operator-authored and off-policy turns are never replayed.
    pub fn is_replayable(&self) -> bool {
        !self.by_operator && !self.off_policy
    }
}
