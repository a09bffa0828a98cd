//! History formatting: stored turns into model-shaped turns.
//!
//! Operator-authored and off-policy turns are never replayed. Attachments
//! are read best-effort and inlined as base64; a file that cannot be read
//! is skipped and logged, the rest of the turn survives.

use std::sync::Arc;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use offerdesk_core::error::StoreError;
use offerdesk_core::message::{FileId, Turn, UserId};
use offerdesk_core::provider::{ModelTurn, Part};
use offerdesk_core::store::{ConversationStore, FileStore};
use tracing::{debug, warn};

pub struct HistoryFormatter {
    conversations: Arc<dyn ConversationStore>,
    files: Arc<dyn FileStore>,
}

impl HistoryFormatter {
    pub fn new(conversations: Arc<dyn ConversationStore>, files: Arc<dyn FileStore>) -> Self {
        Self { conversations, files }
    }

    /// The last `limit` replayable turns of `user_id`, oldest first.
    pub async fn format(&self, user_id: &UserId, limit: usize) -> Result<Vec<ModelTurn>, StoreError> {
        let turns = self.conversations.load_recent_turns(user_id, limit).await?;
        let loaded = turns.len();

        let mut history = Vec::with_capacity(loaded);
        for turn in turns.iter().filter(|t| t.is_replayable()) {
            if let Some(model_turn) = self.to_model_turn(turn).await {
                history.push(model_turn);
            }
        }

        debug!(user_id = %user_id, loaded, replayed = history.len(), "Formatted history");
        Ok(history)
    }

    async fn to_model_turn(&self, turn: &Turn) -> Option<ModelTurn> {
        let text = turn
            .content
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let inline = match &turn.attachment {
            Some(file_id) => self.inline_attachment(turn, file_id).await,
            None => None,
        };

        let mut parts = Vec::with_capacity(2);
        match (text, inline) {
            (Some(text), Some((label, data))) => {
                parts.push(Part::Text(format!("{text}\n{label}")));
                parts.push(data);
            }
            (None, Some((label, data))) => {
                parts.push(Part::Text(label));
                parts.push(data);
            }
            (Some(text), None) => parts.push(Part::Text(text.to_string())),
            (None, None) => return None,
        }

        Some(ModelTurn {
            role: turn.role.into(),
            parts,
        })
    }

    /// The label text and inline-data part for an attachment, if readable.
    async fn inline_attachment(&self, turn: &Turn, file_id: &FileId) -> Option<(String, Part)> {
        let loaded = async {
            let meta = self.files.resolve_file(file_id).await?;
            let bytes = self.files.read_file(file_id).await?;
            Ok::<_, StoreError>((meta, bytes))
        }
        .await;

        match loaded {
            Ok((meta, bytes)) => Some((
                format!("[attachment {}: {}]", meta.id, meta.filename),
                Part::InlineData {
                    mime_type: meta.mime_type,
                    data: STANDARD.encode(bytes),
                },
            )),
            Err(e) => {
                warn!(turn_id = %turn.id, file_id = %file_id, error = %e, "Skipping unreadable attachment");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use offerdesk_core::message::NewTurn;
    use offerdesk_core::provider::ModelRole;
    use offerdesk_core::store::FileMeta;
    use offerdesk_store::InMemoryStore;

    fn alice() -> UserId {
        UserId::new("alice")
    }

    fn formatter(store: &InMemoryStore) -> HistoryFormatter {
        HistoryFormatter::new(Arc::new(store.clone()), Arc::new(store.clone()))
    }

    async fn add_photo(store: &InMemoryStore) {
        store
            .put_file(
                FileMeta {
                    id: FileId::new("img-1"),
                    filename: "fridge.jpg".into(),
                    mime_type: "image/jpeg".into(),
                    size: 3,
                    owner: Some(alice()),
                    created_at: Utc::now(),
                },
                vec![0xff, 0xd8, 0xff],
            )
            .await;
    }

    #[tokio::test]
    async fn drops_operator_and_off_policy_turns() {
        let store = InMemoryStore::new();
        store.append_turn(NewTurn::user(alice(), "hello")).await.unwrap();
        store.append_turn(NewTurn::operator(alice(), "Hi, Anna here")).await.unwrap();
        store.append_turn(NewTurn::user(alice(), "thanks Anna").off_policy()).await.unwrap();
        store.append_turn(NewTurn::assistant(alice(), "How can I help?")).await.unwrap();

        let history = formatter(&store).format(&alice(), 10).await.unwrap();
        assert_eq!(
            history,
            vec![ModelTurn::user_text("hello"), ModelTurn::model_text("How can I help?")]
        );
    }

    #[tokio::test]
    async fn maps_roles() {
        let store = InMemoryStore::new();
        store.append_turn(NewTurn::assistant(alice(), "a")).await.unwrap();
        store.append_turn(NewTurn::user(alice(), "b")).await.unwrap();

        let roles: Vec<_> = formatter(&store)
            .format(&alice(), 10)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.role)
            .collect();
        assert_eq!(roles, vec![ModelRole::Model, ModelRole::User]);
    }

    #[tokio::test]
    async fn limit_applies_before_filtering() {
        let store = InMemoryStore::new();
        store.append_turn(NewTurn::user(alice(), "old")).await.unwrap();
        store.append_turn(NewTurn::operator(alice(), "operator")).await.unwrap();
        store.append_turn(NewTurn::user(alice(), "new")).await.unwrap();

        let history = formatter(&store).format(&alice(), 2).await.unwrap();
        assert_eq!(history, vec![ModelTurn::user_text("new")]);
    }

    #[tokio::test]
    async fn attachment_is_inlined_with_merged_label() {
        let store = InMemoryStore::new();
        add_photo(&store).await;
        store
            .append_turn(NewTurn::user(alice(), "this one").with_attachment(FileId::new("img-1")))
            .await
            .unwrap();

        let history = formatter(&store).format(&alice(), 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].parts,
            vec![
                Part::Text("this one\n[attachment img-1: fridge.jpg]".into()),
                Part::InlineData {
                    mime_type: "image/jpeg".into(),
                    data: "/9j/".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn attachment_only_turn_gets_label() {
        let store = InMemoryStore::new();
        add_photo(&store).await;
        let mut turn = NewTurn::user(alice(), "").with_attachment(FileId::new("img-1"));
        turn.content = None;
        store.append_turn(turn).await.unwrap();

        let history = formatter(&store).format(&alice(), 10).await.unwrap();
        assert_eq!(history[0].parts.len(), 2);
        assert_eq!(history[0].parts[0], Part::Text("[attachment img-1: fridge.jpg]".into()));
    }

    #[tokio::test]
    async fn unreadable_attachment_keeps_text() {
        let store = InMemoryStore::new();
        store
            .append_turn(NewTurn::user(alice(), "see photo").with_attachment(FileId::new("gone")))
            .await
            .unwrap();

        let history = formatter(&store).format(&alice(), 10).await.unwrap();
        assert_eq!(history, vec![ModelTurn::user_text("see photo")]);
    }

    #[tokio::test]
    async fn empty_turn_is_omitted() {
        let store = InMemoryStore::new();
        let mut turn = NewTurn::user(alice(), "").with_attachment(FileId::new("gone"));
        turn.content = None;
        store.append_turn(turn).await.unwrap();
        store.append_turn(NewTurn::assistant(alice(), "   ")).await.unwrap();

        assert!(formatter(&store).format(&alice(), 10).await.unwrap().is_empty());
    }
}
