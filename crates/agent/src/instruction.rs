//! System instruction sources.

use std::sync::Arc;
use async_trait::async_trait;
use offerdesk_core::error::StoreError;
use offerdesk_core::message::UserId;
use offerdesk_core::offer::OfferStatus;
use offerdesk_core::store::OfferStore;

/// Builds the system instruction sent with every round of a turn.
#[async_trait]
pub trait SystemInstruction: Send + Sync {
    async fn build(&self, user_id: &UserId) -> Result<String, StoreError>;
}

/// The same instruction for every user.
pub struct StaticInstruction {
    text: String,
}

impl StaticInstruction {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl SystemInstruction for StaticInstruction {
    async fn build(&self, _user_id: &UserId) -> Result<String, StoreError> {
        Ok(self.text.clone())
    }
}

/// A base instruction followed by a summary of the user's draft offers,
/// including the field each one was last asked about.
pub struct OfferContextInstruction {
    base: String,
    offers: Arc<dyn OfferStore>,
}

impl OfferContextInstruction {
    pub fn new(base: impl Into<String>, offers: Arc<dyn OfferStore>) -> Self {
        Self {
            base: base.into(),
            offers,
        }
    }
}

#[async_trait]
impl SystemInstruction for OfferContextInstruction {
    async fn build(&self, user_id: &UserId) -> Result<String, StoreError> {
        let open: Vec<_> = self
            .offers
            .list_offers(user_id)
            .await?
            .into_iter()
            .filter(|o| o.status == OfferStatus::Draft)
            .collect();

        if open.is_empty() {
            return Ok(format!("{}\n\nThe user has no open offers.", self.base));
        }

        let mut text = format!("{}\n\n## Open offers\n", self.base);
        for offer in &open {
            let missing: Vec<_> = offer.missing_fields().iter().map(|f| f.as_str()).collect();
            text.push_str(&format!(
                "- offer {}: product={}, missing: {}",
                offer.id,
                offer.fields.product.as_deref().unwrap_or("?"),
                missing.join(", "),
            ));
            if let Some(field) = offer.pending_field {
                text.push_str(&format!(" (last asked: {field})"));
            }
            text.push('\n');
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offerdesk_core::offer::{OfferField, OfferFields};
    use offerdesk_store::InMemoryStore;

    #[tokio::test]
    async fn static_instruction_ignores_user() {
        let instruction = StaticInstruction::new("Be brief.");
        assert_eq!(instruction.build(&UserId::new("x")).await.unwrap(), "Be brief.");
    }

    #[tokio::test]
    async fn lists_open_offers_with_missing_fields() {
        let store = InMemoryStore::new();
        let alice = UserId::new("alice");
        let offer = store
            .create_offer(
                &alice,
                OfferFields {
                    product: Some("laptop".into()),
                    quantity: Some(1),
                    ..OfferFields::default()
                },
            )
            .await
            .unwrap();
        store.record_question(&alice, offer.id, OfferField::Brand).await.unwrap();

        let text = OfferContextInstruction::new("Base.", Arc::new(store))
            .build(&alice)
            .await
            .unwrap();
        assert!(text.starts_with("Base."));
        assert!(text.contains("- offer 1: product=laptop, missing: brand, budget (last asked: brand)"));
    }

    #[tokio::test]
    async fn no_offers_is_stated() {
        let text = OfferContextInstruction::new("Base.", Arc::new(InMemoryStore::new()))
            .build(&UserId::new("nobody"))
            .await
            .unwrap();
        assert!(text.ends_with("The user has no open offers."));
    }
}
