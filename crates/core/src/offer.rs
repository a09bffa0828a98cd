//! Offer records: the business object the desk's tools operate on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::message::UserId;

pub type OfferId = i64;

/// The fields of an offer the assistant can ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferField {
    Product,
    Brand,
    Budget,
    Quantity,
    Notes,
}

impl OfferField {
    /// Fields that must be set before an offer is complete, in asking order.
    pub const REQUIRED: [OfferField; 4] = [
        OfferField::Product,
        OfferField::Brand,
        OfferField::Budget,
        OfferField::Quantity,
    ];

    pub const ALL: [OfferField; 5] = [
        OfferField::Product,
        OfferField::Brand,
        OfferField::Budget,
        OfferField::Quantity,
        OfferField::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferField::Product => "product",
            OfferField::Brand => "brand",
            OfferField::Budget => "budget",
            OfferField::Quantity => "quantity",
            OfferField::Notes => "notes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

impl std::fmt::Display for OfferField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Draft,
    Complete,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Draft => "draft",
            OfferStatus::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(OfferStatus::Draft),
            "complete" => Some(OfferStatus::Complete),
            _ => None,
        }
    }
}

/// A partial set of offer values. Used both to create and to patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl OfferFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A quote request being assembled with the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub fields: OfferFields,
    pub status: OfferStatus,
    /// The field the assistant most recently asked the user about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_field: Option<OfferField>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    pub fn new(id: OfferId, user_id: UserId, fields: OfferFields) -> Self {
        let now = Utc::now();
        let mut offer = Self {
            id,
            user_id,
            fields,
            status: OfferStatus::Draft,
            pending_field: None,
            created_at: now,
            updated_at: now,
        };
        offer.refresh_status();
        offer
    }

    /// Required fields that are still unset, in asking order.
    pub fn missing_fields(&self) -> Vec<OfferField> {
        OfferField::REQUIRED
            .into_iter()
            .filter(|f| !self.has(*f))
            .collect()
    }

    fn has(&self, field: OfferField) -> bool {
        let f = &self.fields;
        match field {
            OfferField::Product => f.product.as_deref().is_some_and(|s| !s.trim().is_empty()),
            OfferField::Brand => f.brand.as_deref().is_some_and(|s| !s.trim().is_empty()),
            OfferField::Budget => f.budget.is_some(),
            OfferField::Quantity => f.quantity.is_some(),
            OfferField::Notes => f.notes.as_deref().is_some_and(|s| !s.trim().is_empty()),
        }
    }

    /// Overlay the set values of `patch`; unset values are left untouched.
    pub fn apply(&mut self, patch: OfferFields) {
        let f = &mut self.fields;
        if patch.product.is_some() {
            f.product = patch.product;
        }
        if patch.brand.is_some() {
            f.brand = patch.brand;
        }
        if patch.budget.is_some() {
            f.budget = patch.budget;
        }
        if patch.quantity.is_some() {
            f.quantity = patch.quantity;
        }
        if patch.notes.is_some() {
            f.notes = patch.notes;
        }
        // A pending question is settled once its field is filled.
        if self.pending_field.is_some_and(|p| self.has(p)) {
            self.pending_field = None;
        }
        self.updated_at = Utc::now();
        self.refresh_status();
    }

    fn refresh_status(&mut self) {
        self.status = if self.missing_fields().is_empty() {
            OfferStatus::Complete
        } else {
            OfferStatus::Draft
        };
    }
}
