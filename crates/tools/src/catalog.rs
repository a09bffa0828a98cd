//! The tool catalog advertised to the model.
//!
//! Descriptions double as instructions: they are what makes the model call
//! `create_offer` before asking anything, or ask one question at a time.

use offerdesk_core::tool::{ParamType, Parameter, ToolDeclaration};
use std::sync::LazyLock;

/// Closed set of tools the dispatcher knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    CreateOffer,
    UpdateOffer,
    GetOffer,
    ListOffers,
    AskQuestion,
    SendDocument,
}

impl ToolName {
    pub const ALL: [ToolName; 6] = [
        ToolName::CreateOffer,
        ToolName::UpdateOffer,
        ToolName::GetOffer,
        ToolName::ListOffers,
        ToolName::AskQuestion,
        ToolName::SendDocument,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::CreateOffer => "create_offer",
            ToolName::UpdateOffer => "update_offer",
            ToolName::GetOffer => "get_offer",
            ToolName::ListOffers => "list_offers",
            ToolName::AskQuestion => "ask_question",
            ToolName::SendDocument => "send_document",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const OFFER_FIELDS: [&str; 5] = ["product", "brand", "budget", "quantity", "notes"];

fn offer_value_params() -> Vec<Parameter> {
    vec![
        Parameter::optional("product", ParamType::String, "What the user wants a quote for, e.g. \"dishwasher\""),
        Parameter::optional("brand", ParamType::String, "Preferred brand, exactly as the user wrote it"),
        Parameter::optional("budget", ParamType::Number, "Maximum budget in EUR"),
        Parameter::optional("quantity", ParamType::Integer, "Number of units"),
        Parameter::optional("notes", ParamType::String, "Anything else the user mentioned about the request"),
    ]
}

fn declaration(name: ToolName) -> ToolDeclaration {
    match name {
        ToolName::CreateOffer => ToolDeclaration::new(
            name.as_str(),
            "Create a new quote request. ALWAYS call this as soon as the user asks for a quote or price \
             and no open offer exists. Fill in every value the user already gave. The result lists \
             the missing fields you still need to ask for.",
            offer_value_params(),
        ),
        ToolName::UpdateOffer => {
            let mut params = vec![Parameter::required("offer_id", ParamType::Integer, "Offer to update")];
            params.extend(offer_value_params());
            ToolDeclaration::new(
                name.as_str(),
                "Store values the user just provided for an existing offer. Call this BEFORE answering \
                 whenever the user's message contains a value for a missing field.",
                params,
            )
        }
        ToolName::GetOffer => ToolDeclaration::new(
            name.as_str(),
            "Read an offer with its current values and missing fields.",
            vec![Parameter::required("offer_id", ParamType::Integer, "Offer to read")],
        ),
        ToolName::ListOffers => ToolDeclaration::new(
            name.as_str(),
            "List the user's offers. Call this before create_offer when you are unsure whether the \
             user already has an open offer.",
            vec![],
        ),
        ToolName::AskQuestion => ToolDeclaration::new(
            name.as_str(),
            "Ask the user for ONE missing field of an offer. The question text is sent to the user \
             verbatim, so write it in the user's language. Never ask for more than one field at a time.",
            vec![
                Parameter::required("offer_id", ParamType::Integer, "Offer being completed"),
                Parameter::required("field", ParamType::String, "The missing field being asked for")
                    .one_of(&OFFER_FIELDS),
                Parameter::required("question", ParamType::String, "The exact question to send"),
            ],
        ),
        ToolName::SendDocument => ToolDeclaration::new(
            name.as_str(),
            "Send a stored document (brochure, price list, offer PDF) to the user. The caption is shown \
             with the file.",
            vec![
                Parameter::required("file_id", ParamType::String, "Identifier of the stored file"),
                Parameter::optional("caption", ParamType::String, "Short text to send with the file"),
            ],
        ),
    }
}

static CATALOG: LazyLock<Vec<ToolDeclaration>> =
    LazyLock::new(|| ToolName::ALL.into_iter().map(declaration).collect());

/// Every tool declaration, in a stable order.
pub fn catalog() -> &'static [ToolDeclaration] {
    &CATALOG
}
