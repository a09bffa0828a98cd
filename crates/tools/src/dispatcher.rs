//! Function dispatcher: runs one call request against the offer desk.
//!
//! Only an unknown tool name escapes as an error. Bad arguments and failed
//! store operations come back as `{"success": false, "error": ...}` so the
//! model can read the cause and correct itself.

use std::sync::Arc;
use offerdesk_core::error::{StoreError, ToolError};
use offerdesk_core::message::UserId;
use offerdesk_core::offer::{Offer, OfferFields};
use offerdesk_core::store::{FileStore, OfferStore};
use offerdesk_core::tool::{CallRequest, CallResult};
use serde_json::json;
use tracing::{debug, info, warn};
use crate::args::{AskQuestionArgs, OfferRef, OfferValues, SendDocumentArgs, ToolInvocation, UpdateOfferArgs};

/// Executes call requests on behalf of one user at a time.
#[derive(Clone)]
pub struct Dispatcher {
    offers: Arc<dyn OfferStore>,
    files: Arc<dyn FileStore>,
}

impl Dispatcher {
    pub fn new(offers: Arc<dyn OfferStore>, files: Arc<dyn FileStore>) -> Self {
        Self { offers, files }
    }

    /// Run a single call request for `user_id`.
    pub async fn dispatch(&self, user_id: &UserId, call: &CallRequest) -> Result<CallResult, ToolError> {
        let invocation = match ToolInvocation::parse(call) {
            Ok(invocation) => invocation,
            Err(ToolError::InvalidArguments { tool_name, reason }) => {
                warn!(user_id = %user_id, tool = %tool_name, %reason, "Rejected tool arguments");
                return Ok(CallResult::failed(tool_name, format!("invalid arguments: {reason}")));
            }
            Err(e) => return Err(e),
        };

        let name = invocation.tool().as_str();
        debug!(user_id = %user_id, tool = name, "Dispatching tool call");

        let result = match invocation {
            ToolInvocation::CreateOffer(values) => self.create_offer(user_id, values).await,
            ToolInvocation::UpdateOffer(args) => self.update_offer(user_id, args).await,
            ToolInvocation::GetOffer(OfferRef { offer_id }) => self
                .offers
                .get_offer(user_id, offer_id)
                .await
                .map(|offer| CallResult::ok(name, offer_summary(&offer))),
            ToolInvocation::ListOffers => self.list_offers(user_id).await,
            ToolInvocation::AskQuestion(args) => self.ask_question(user_id, args).await,
            ToolInvocation::SendDocument(args) => self.send_document(user_id, args).await,
        };

        Ok(match result {
            Ok(result) => {
                info!(user_id = %user_id, tool = name, "Tool call succeeded");
                result
            }
            Err(e) => {
                warn!(user_id = %user_id, tool = name, error = %e, "Tool call failed");
                CallResult::failed(name, e)
            }
        })
    }

    async fn create_offer(&self, user_id: &UserId, values: OfferValues) -> Result<CallResult, StoreError> {
        let offer = self.offers.create_offer(user_id, values.into()).await?;
        Ok(CallResult::ok("create_offer", offer_summary(&offer)))
    }

    async fn update_offer(&self, user_id: &UserId, args: UpdateOfferArgs) -> Result<CallResult, StoreError> {
        let patch: OfferFields = args.values.into();
        if patch.is_empty() {
            return Err(StoreError::InvalidValue("no values to update".into()));
        }
        let offer = self.offers.update_offer(user_id, args.offer_id, patch).await?;
        Ok(CallResult::ok("update_offer", offer_summary(&offer)))
    }

    async fn list_offers(&self, user_id: &UserId) -> Result<CallResult, StoreError> {
        let offers = self.offers.list_offers(user_id).await?;
        let listed: Vec<_> = offers.iter().map(offer_summary).collect();
        Ok(CallResult::ok(
            "list_offers",
            json!({ "success": true, "count": listed.len(), "offers": listed }),
        ))
    }

    async fn ask_question(&self, user_id: &UserId, args: AskQuestionArgs) -> Result<CallResult, StoreError> {
        let question = args.question.trim();
        if question.is_empty() {
            return Err(StoreError::InvalidValue("question must not be empty".into()));
        }
        let offer = self.offers.record_question(user_id, args.offer_id, args.field).await?;
        Ok(CallResult::reply(
            "ask_question",
            json!({
                "success": true,
                "offer_id": offer.id,
                "field": args.field,
                "question": question,
            }),
            question,
            None,
        ))
    }

    async fn send_document(&self, user_id: &UserId, args: SendDocumentArgs) -> Result<CallResult, StoreError> {
        let meta = self.files.resolve_file(&args.file_id).await?;
        if meta.owner.as_ref().is_some_and(|owner| owner != user_id) {
            return Err(StoreError::Forbidden {
                kind: "file",
                id: args.file_id.to_string(),
            });
        }
        let text = args
            .caption
            .unwrap_or_else(|| format!("Here is {}.", meta.filename));
        Ok(CallResult::reply(
            "send_document",
            json!({
                "success": true,
                "file_id": meta.id,
                "filename": meta.filename,
            }),
            text,
            Some(meta.id),
        ))
    }
}

/// The result bag describing an offer.
fn offer_summary(offer: &Offer) -> serde_json::Value {
    json!({
        "success": true,
        "offer_id": offer.id,
        "status": offer.status.as_str(),
        "values": offer.fields,
        "missing_fields": offer.missing_fields(),
        "pending_field": offer.pending_field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use offerdesk_core::message::FileId;
    use offerdesk_core::offer::{OfferField, OfferId};
    use offerdesk_core::store::FileMeta;
    use offerdesk_core::tool::CallOutcome;
    use offerdesk_store::InMemoryStore;

    fn alice() -> UserId {
        UserId::new("alice")
    }

    fn dispatcher(store: &InMemoryStore) -> Dispatcher {
        Dispatcher::new(Arc::new(store.clone()), Arc::new(store.clone()))
    }

    fn call(name: &str, args: serde_json::Value) -> CallRequest {
        CallRequest::new(name, args)
    }

    /// An offer store whose every operation fails.
    struct BrokenOffers;

    #[async_trait]
    impl OfferStore for BrokenOffers {
        async fn create_offer(&self, _: &UserId, _: OfferFields) -> Result<Offer, StoreError> {
            Err(StoreError::Storage("disk on fire".into()))
        }
        async fn update_offer(&self, _: &UserId, _: OfferId, _: OfferFields) -> Result<Offer, StoreError> {
            Err(StoreError::Storage("disk on fire".into()))
        }
        async fn get_offer(&self, _: &UserId, _: OfferId) -> Result<Offer, StoreError> {
            Err(StoreError::Storage("disk on fire".into()))
        }
        async fn list_offers(&self, _: &UserId) -> Result<Vec<Offer>, StoreError> {
            Err(StoreError::Storage("disk on fire".into()))
        }
        async fn record_question(&self, _: &UserId, _: OfferId, _: OfferField) -> Result<Offer, StoreError> {
            Err(StoreError::Storage("disk on fire".into()))
        }
    }

    #[tokio::test]
    async fn create_offer_reports_missing_fields() {
        let store = InMemoryStore::new();
        let result = dispatcher(&store)
            .dispatch(&alice(), &call("create_offer", json!({"product": "laptop", "quantity": 1})))
            .await
            .unwrap();

        assert_eq!(result.name, "create_offer");
        assert_eq!(result.outcome, CallOutcome::Continue);
        assert_eq!(result.response["success"], true);
        assert_eq!(result.response["offer_id"], 1);
        assert_eq!(result.response["status"], "draft");
        assert_eq!(result.response["missing_fields"], json!(["brand", "budget"]));
    }

    #[tokio::test]
    async fn update_offer_completes_the_offer() {
        let store = InMemoryStore::new();
        let d = dispatcher(&store);
        d.dispatch(&alice(), &call("create_offer", json!({"product": "laptop", "quantity": 1})))
            .await
            .unwrap();

        let result = d
            .dispatch(
                &alice(),
                &call("update_offer", json!({"offer_id": 1, "brand": "Lenovo", "budget": "900"})),
            )
            .await
            .unwrap();
        assert_eq!(result.response["status"], "complete");
        assert_eq!(result.response["missing_fields"], json!([]));
    }

    #[tokio::test]
    async fn empty_update_is_a_failure_bag() {
        let store = InMemoryStore::new();
        let d = dispatcher(&store);
        d.dispatch(&alice(), &call("create_offer", json!({}))).await.unwrap();

        let result = d
            .dispatch(&alice(), &call("update_offer", json!({"offer_id": 1})))
            .await
            .unwrap();
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn ask_question_exits_with_question_text() {
        let store = InMemoryStore::new();
        let d = dispatcher(&store);
        d.dispatch(&alice(), &call("create_offer", json!({"product": "laptop"})))
            .await
            .unwrap();

        let result = d
            .dispatch(
                &alice(),
                &call(
                    "ask_question",
                    json!({"offer_id": 1, "field": "brand", "question": " Which brand? "}),
                ),
            )
            .await
            .unwrap();
        assert_eq!(
            result.outcome,
            CallOutcome::Reply {
                text: "Which brand?".into(),
                attachment: None,
            }
        );
        let offer = store.get_offer(&alice(), 1).await.unwrap();
        assert_eq!(offer.pending_field, Some(OfferField::Brand));
    }

    #[tokio::test]
    async fn blank_question_does_not_exit() {
        let store = InMemoryStore::new();
        let d = dispatcher(&store);
        d.dispatch(&alice(), &call("create_offer", json!({}))).await.unwrap();

        let result = d
            .dispatch(
                &alice(),
                &call("ask_question", json!({"offer_id": 1, "field": "brand", "question": "  "})),
            )
            .await
            .unwrap();
        assert!(!result.is_success());
        assert_eq!(result.outcome, CallOutcome::Continue);
    }

    #[tokio::test]
    async fn send_document_defaults_caption_and_attaches() {
        let store = InMemoryStore::new();
        store
            .put_file(
                FileMeta {
                    id: FileId::new("f-1"),
                    filename: "price-list.pdf".into(),
                    mime_type: "application/pdf".into(),
                    size: 4,
                    owner: None,
                    created_at: Utc::now(),
                },
                b"%PDF".to_vec(),
            )
            .await;

        let result = dispatcher(&store)
            .dispatch(&alice(), &call("send_document", json!({"file_id": "f-1"})))
            .await
            .unwrap();
        assert_eq!(
            result.outcome,
            CallOutcome::Reply {
                text: "Here is price-list.pdf.".into(),
                attachment: Some(FileId::new("f-1")),
            }
        );
    }

    #[tokio::test]
    async fn foreign_document_is_refused() {
        let store = InMemoryStore::new();
        store
            .put_file(
                FileMeta {
                    id: FileId::new("f-2"),
                    filename: "bob-offer.pdf".into(),
                    mime_type: "application/pdf".into(),
                    size: 0,
                    owner: Some(UserId::new("bob")),
                    created_at: Utc::now(),
                },
                vec![],
            )
            .await;

        let result = dispatcher(&store)
            .dispatch(&alice(), &call("send_document", json!({"file_id": "f-2", "caption": "here"})))
            .await
            .unwrap();
        assert!(!result.is_success());
        assert_eq!(result.outcome, CallOutcome::Continue);
    }

    #[tokio::test]
    async fn store_failure_becomes_failure_bag() {
        let store = InMemoryStore::new();
        let d = Dispatcher::new(Arc::new(BrokenOffers), Arc::new(store));

        let result = d
            .dispatch(&alice(), &call("create_offer", json!({"product": "x"})))
            .await
            .unwrap();
        assert_eq!(result.name, "create_offer");
        assert_eq!(result.response["success"], false);
        assert!(result.response["error"].as_str().unwrap().contains("disk on fire"));
    }

    #[tokio::test]
    async fn bad_arguments_become_failure_bag() {
        let store = InMemoryStore::new();
        let result = dispatcher(&store)
            .dispatch(&alice(), &call("get_offer", json!({"offer_id": "first"})))
            .await
            .unwrap();
        assert_eq!(result.name, "get_offer");
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn other_users_offer_is_a_failure_bag() {
        let store = InMemoryStore::new();
        let d = dispatcher(&store);
        d.dispatch(&UserId::new("bob"), &call("create_offer", json!({}))).await.unwrap();

        let result = d
            .dispatch(&alice(), &call("get_offer", json!({"offer_id": 1})))
            .await
            .unwrap();
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn unknown_tool_is_fatal() {
        let store = InMemoryStore::new();
        let err = dispatcher(&store)
            .dispatch(&alice(), &call("delete_everything", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "delete_everything"));
    }

    #[tokio::test]
    async fn list_offers_only_shows_own() {
        let store = InMemoryStore::new();
        let d = dispatcher(&store);
        d.dispatch(&alice(), &call("create_offer", json!({}))).await.unwrap();
        d.dispatch(&UserId::new("bob"), &call("create_offer", json!({}))).await.unwrap();

        let result = d.dispatch(&alice(), &call("list_offers", json!({}))).await.unwrap();
        assert_eq!(result.response["count"], 1);
    }
}
