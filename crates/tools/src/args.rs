//! Typed arguments for each tool.
//!
//! The model's argument bag is coerced here exactly once. Models routinely
//! send `"3"` for 3 or `2.0` for an integer id, so numeric fields accept
//! either form; anything else is rejected with `InvalidArguments`.

use offerdesk_core::error::ToolError;
use offerdesk_core::message::FileId;
use offerdesk_core::offer::{OfferField, OfferFields, OfferId};
use offerdesk_core::tool::CallRequest;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use crate::catalog::ToolName;

/// One call request, resolved to its tool and typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    CreateOffer(OfferValues),
    UpdateOffer(UpdateOfferArgs),
    GetOffer(OfferRef),
    ListOffers,
    AskQuestion(AskQuestionArgs),
    SendDocument(SendDocumentArgs),
}

impl ToolInvocation {
    /// Resolve a call request. Unknown tool names are `ToolError::UnknownTool`.
    pub fn parse(call: &CallRequest) -> Result<Self, ToolError> {
        let tool = ToolName::parse(&call.name).ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        Ok(match tool {
            ToolName::CreateOffer => Self::CreateOffer(decode(tool, &call.args)?),
            ToolName::UpdateOffer => Self::UpdateOffer(decode(tool, &call.args)?),
            ToolName::GetOffer => Self::GetOffer(decode(tool, &call.args)?),
            ToolName::ListOffers => Self::ListOffers,
            ToolName::AskQuestion => Self::AskQuestion(decode(tool, &call.args)?),
            ToolName::SendDocument => Self::SendDocument(decode(tool, &call.args)?),
        })
    }

    pub fn tool(&self) -> ToolName {
        match self {
            Self::CreateOffer(_) => ToolName::CreateOffer,
            Self::UpdateOffer(_) => ToolName::UpdateOffer,
            Self::GetOffer(_) => ToolName::GetOffer,
            Self::ListOffers => ToolName::ListOffers,
            Self::AskQuestion(_) => ToolName::AskQuestion,
            Self::SendDocument(_) => ToolName::SendDocument,
        }
    }
}

fn decode<T: DeserializeOwned>(tool: ToolName, args: &serde_json::Value) -> Result<T, ToolError> {
    // A missing argument bag is an empty one.
    let args = if args.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        args.clone()
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool_name: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Offer values as sent by the model.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OfferValues {
    #[serde(default, deserialize_with = "lenient_string")]
    pub product: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub budget: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub quantity: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub notes: Option<String>,
}

impl From<OfferValues> for OfferFields {
    fn from(v: OfferValues) -> Self {
        OfferFields {
            product: v.product,
            brand: v.brand,
            budget: v.budget,
            quantity: v.quantity,
            notes: v.notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateOfferArgs {
    #[serde(deserialize_with = "required_id")]
    pub offer_id: OfferId,
    #[serde(flatten)]
    pub values: OfferValues,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OfferRef {
    #[serde(deserialize_with = "required_id")]
    pub offer_id: OfferId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AskQuestionArgs {
    #[serde(deserialize_with = "required_id")]
    pub offer_id: OfferId,
    pub field: OfferField,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SendDocumentArgs {
    #[serde(deserialize_with = "file_id")]
    pub file_id: FileId,
    #[serde(default, deserialize_with = "lenient_string")]
    pub caption: Option<String>,
}

// --- Lenient scalar coercion ---

fn number_from(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

fn integer_from(value: &serde_json::Value) -> Option<i64> {
    let n = number_from(value)?;
    (n.fract() == 0.0 && n.is_finite()).then_some(n as i64)
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s.trim().to_string())),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!("expected a string, got {other}"))),
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    if value.is_null() {
        return Ok(None);
    }
    number_from(&value)
        .filter(|n| *n >= 0.0)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("expected a non-negative number, got {value}")))
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    if value.is_null() {
        return Ok(None);
    }
    integer_from(&value)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n > 0)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("expected a whole positive number, got {value}")))
}

fn required_id<'de, D: Deserializer<'de>>(d: D) -> Result<OfferId, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    integer_from(&value)
        .filter(|n| *n > 0)
        .ok_or_else(|| D::Error::custom(format!("expected an offer id, got {value}")))
}

fn file_id<'de, D: Deserializer<'de>>(d: D) -> Result<FileId, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Ok(FileId(s.trim().to_string())),
        serde_json::Value::Number(n) => Ok(FileId(n.to_string())),
        other => Err(D::Error::custom(format!("expected a file id, got {other}"))),
    }
}
