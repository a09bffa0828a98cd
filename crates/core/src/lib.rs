//! # OfferDesk Core
//!
//! Domain types, collaborator traits, and error definitions for the OfferDesk
//! assistant. This crate has **no framework dependencies**: it defines the
//! model that the store, provider, tool and agent crates implement against.
//!
//! Every external collaborator (model, conversation store, file store, offer
//! store) is a trait here, so the orchestrator can be driven by real backends
//! or by in-memory stubs in tests.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod offer;
pub mod store;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{FileId, NewTurn, Role, Turn, UserId};
pub use provider::{GenerateRequest, GenerateResponse, ModelRole, ModelTurn, Part, Provider};
pub use tool::{CallOutcome, CallRequest, CallResult, ToolDeclaration};
pub use offer::{Offer, OfferField, OfferFields, OfferId, OfferStatus};
pub use store::{ConversationStore, FileMeta, FileStore, OfferStore};
pub use event::{DomainEvent, EventBus};
