//! Persistence collaborator traits.
//!
//! The orchestrator only needs narrow read/write contracts:
//! - conversation turns (load recent, append)
//! - stored files (resolve metadata, read bytes)
//! - offers (the business records the tools touch)
//!
//! Implementations: in-memory (for tests and ephemeral runs) and SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::StoreError;
use crate::message::{FileId, NewTurn, Turn, UserId};
use crate::offer::{Offer, OfferField, OfferFields, OfferId};

/// Metadata of a stored file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: FileId,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    /// Owning user; `None` for shared documents (brochures, price lists)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The most recent `limit` turns of a user, oldest first.
    async fn load_recent_turns(&self, user_id: &UserId, limit: usize) -> Result<Vec<Turn>, StoreError>;

    /// Append a turn and return it as stored.
    async fn append_turn(&self, turn: NewTurn) -> Result<Turn, StoreError>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn resolve_file(&self, id: &FileId) -> Result<FileMeta, StoreError>;

    async fn read_file(&self, id: &FileId) -> Result<Vec<u8>, StoreError>;
}

#[async_trait]
pub trait OfferStore: Send + Sync {
    async fn create_offer(&self, user_id: &UserId, fields: OfferFields) -> Result<Offer, StoreError>;

    /// Overlay `patch` on an offer owned by `user_id`.
    async fn update_offer(&self, user_id: &UserId, id: OfferId, patch: OfferFields) -> Result<Offer, StoreError>;

    async fn get_offer(&self, user_id: &UserId, id: OfferId) -> Result<Offer, StoreError>;

    async fn list_offers(&self, user_id: &UserId) -> Result<Vec<Offer>, StoreError>;

    /// Remember which field the user was just asked about.
    async fn record_question(&self, user_id: &UserId, id: OfferId, field: OfferField) -> Result<Offer, StoreError>;
}

/// Check that `offer` belongs to `user_id`.
pub fn ensure_owner(offer: &Offer, user_id: &UserId) -> Result<(), StoreError> {
    if &offer.user_id == user_id {
        Ok(())
    } else {
        Err(StoreError::Forbidden {
            kind: "offer",
            id: offer.id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_offer_is_forbidden() {
        let offer = Offer::new(7, UserId::new("alice"), OfferFields::default());
        assert!(ensure_owner(&offer, &UserId::new("alice")).is_ok());
        let err = ensure_owner(&offer, &UserId::new("bob")).unwrap_err();
        assert!(matches!(err, StoreError::Forbidden { .. }));
    }

    #[test]
    fn file_meta_serialization() {
        let meta = FileMeta {
            id: FileId::new("f1"),
            filename: "brochure.pdf".into(),
            mime_type: "application/pdf".into(),
            size: 2048,
            owner: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["id"], "f1");
        assert!(json.get("owner").is_none());
    }
}
