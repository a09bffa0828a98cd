//! The conversation orchestrator: the heart of OfferDesk.
//!
//! For each inbound user message the orchestrator follows a bounded
//! **Request → Dispatch → Append** cycle:
//!
//! 1. **Format** the user's recent history for the model
//! 2. **Request** the model with that history, the system instruction and
//!    the tool catalog
//! 3. **If calls**: dispatch them; a tool reply ends the turn immediately,
//!    otherwise the results are appended and the model is asked again
//! 4. **If text**: persist it and return it to the caller
//!
//! The loop gives up after `max_rounds` model calls.

pub mod history;
pub mod instruction;
pub mod orchestrator;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use history::HistoryFormatter;
pub use instruction::{OfferContextInstruction, StaticInstruction, SystemInstruction};
pub use orchestrator::{FailureKind, Orchestrator, Reply, RoundState, TurnError, TurnOutcome};
