//! In-memory backend: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use offerdesk_core::error::StoreError;
use offerdesk_core::message::{FileId, NewTurn, Turn, UserId};
use offerdesk_core::offer::{Offer, OfferField, OfferFields, OfferId};
use offerdesk_core::store::{ensure_owner, ConversationStore, FileMeta, FileStore, OfferStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    turns: Vec<Turn>,
    files: HashMap<FileId, (FileMeta, Vec<u8>)>,
    offers: Vec<Offer>,
    next_offer_id: OfferId,
}

/// An in-memory store for turns, files and offers.
/// Useful for testing and sessions where persistence isn't needed.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file with its content.
    pub async fn put_file(&self, meta: FileMeta, bytes: Vec<u8>) {
        self.inner
            .write()
            .await
            .files
            .insert(meta.id.clone(), (meta, bytes));
    }

    /// All turns of a user, oldest first.
    pub async fn turns_for(&self, user_id: &UserId) -> Vec<Turn> {
        self.inner
            .read()
            .await
            .turns
            .iter()
            .filter(|t| &t.user_id == user_id)
            .cloned()
            .collect()
    }

    async fn with_offer<F>(&self, user_id: &UserId, id: OfferId, f: F) -> Result<Offer, StoreError>
    where
        F: FnOnce(&mut Offer) + Send,
    {
        let mut inner = self.inner.write().await;
        let offer = inner
            .offers
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "offer",
                id: id.to_string(),
            })?;
        ensure_owner(offer, user_id)?;
        f(offer);
        Ok(offer.clone())
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn load_recent_turns(&self, user_id: &UserId, limit: usize) -> Result<Vec<Turn>, StoreError> {
        let inner = self.inner.read().await;
        let mine: Vec<&Turn> = inner.turns.iter().filter(|t| &t.user_id == user_id).collect();
        let skip = mine.len().saturating_sub(limit);
        Ok(mine.into_iter().skip(skip).cloned().collect())
    }

    async fn append_turn(&self, turn: NewTurn) -> Result<Turn, StoreError> {
        let turn = turn.into_turn();
        self.inner.write().await.turns.push(turn.clone());
        Ok(turn)
    }
}

#[async_trait]
impl FileStore for InMemoryStore {
    async fn resolve_file(&self, id: &FileId) -> Result<FileMeta, StoreError> {
        self.inner
            .read()
            .await
            .files
            .get(id)
            .map(|(meta, _)| meta.clone())
            .ok_or_else(|| StoreError::NotFound {
                kind: "file",
                id: id.to_string(),
            })
    }

    async fn read_file(&self, id: &FileId) -> Result<Vec<u8>, StoreError> {
        self.inner
            .read()
            .await
            .files
            .get(id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StoreError::NotFound {
                kind: "file",
                id: id.to_string(),
            })
    }
}

#[async_trait]
impl OfferStore for InMemoryStore {
    async fn create_offer(&self, user_id: &UserId, fields: OfferFields) -> Result<Offer, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_offer_id += 1;
        let offer = Offer::new(inner.next_offer_id, user_id.clone(), fields);
        inner.offers.push(offer.clone());
        Ok(offer)
    }

    async fn update_offer(&self, user_id: &UserId, id: OfferId, patch: OfferFields) -> Result<Offer, StoreError> {
        self.with_offer(user_id, id, |offer| offer.apply(patch)).await
    }

    async fn get_offer(&self, user_id: &UserId, id: OfferId) -> Result<Offer, StoreError> {
        self.with_offer(user_id, id, |_| {}).await
    }

    async fn list_offers(&self, user_id: &UserId) -> Result<Vec<Offer>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .offers
            .iter()
            .filter(|o| &o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn record_question(&self, user_id: &UserId, id: OfferId, field: OfferField) -> Result<Offer, StoreError> {
        self.with_offer(user_id, id, |offer| {
            offer.pending_field = Some(field);
            offer.updated_at = Utc::now();
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        UserId::new("alice")
    }

    #[tokio::test]
    async fn recent_turns_are_oldest_first_and_limited() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store.append_turn(NewTurn::user(alice(), format!("msg {i}"))).await.unwrap();
        }
        store.append_turn(NewTurn::user(UserId::new("bob"), "other")).await.unwrap();

        let turns = store.load_recent_turns(&alice(), 3).await.unwrap();
        let contents: Vec<_> = turns.iter().map(|t| t.content.clone().unwrap()).collect();
        assert_eq!(contents, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[tokio::test]
    async fn offers_get_sequential_ids_and_are_scoped() {
        let store = InMemoryStore::new();
        let first = store.create_offer(&alice(), OfferFields::default()).await.unwrap();
        let second = store.create_offer(&UserId::new("bob"), OfferFields::default()).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        assert_eq!(store.list_offers(&alice()).await.unwrap().len(), 1);
        let err = store.get_offer(&alice(), second.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn update_and_record_question() {
        let store = InMemoryStore::new();
        let offer = store.create_offer(&alice(), OfferFields::default()).await.unwrap();

        let asked = store.record_question(&alice(), offer.id, OfferField::Brand).await.unwrap();
        assert_eq!(asked.pending_field, Some(OfferField::Brand));

        let updated = store
            .update_offer(
                &alice(),
                offer.id,
                OfferFields {
                    brand: Some("Bosch".into()),
                    ..OfferFields::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.fields.brand.as_deref(), Some("Bosch"));
        assert_eq!(updated.pending_field, None);
    }

    #[tokio::test]
    async fn missing_offer_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get_offer(&alice(), 99).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "offer", .. }));
    }

    #[tokio::test]
    async fn files_resolve_and_read() {
        let store = InMemoryStore::new();
        store
            .put_file(
                FileMeta {
                    id: FileId::new("f1"),
                    filename: "price-list.pdf".into(),
                    mime_type: "application/pdf".into(),
                    size: 3,
                    owner: None,
                    created_at: Utc::now(),
                },
                vec![1, 2, 3],
            )
            .await;

        assert_eq!(store.resolve_file(&FileId::new("f1")).await.unwrap().filename, "price-list.pdf");
        assert_eq!(store.read_file(&FileId::new("f1")).await.unwrap(), vec![1, 2, 3]);
        assert!(store.read_file(&FileId::new("nope")).await.is_err());
    }
}
