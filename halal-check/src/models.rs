use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CheckerError, Result};

/// Placeholder used for dates and certificate ids the service does not know.
pub const NOT_AVAILABLE: &str = "N/A";
/// Supplier reported for ingredients without a certificate record.
pub const UNKNOWN_SUPPLIER: &str = "Unknown";

/// Certification status as reported by the classification service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IngredientStatus {
    Certified,
    Expired,
    #[serde(rename = "Not Found", alias = "NotFound")]
    NotFound,
}

impl fmt::Display for IngredientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IngredientStatus::Certified => "Certified",
            IngredientStatus::Expired => "Expired",
            IngredientStatus::NotFound => "Not Found",
        };
        f.write_str(label)
    }
}

impl IngredientStatus {
    /// Lenient parse of a wire label: case, spaces, `_` and `-` are ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        let folded: String = label
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "certified" => Some(IngredientStatus::Certified),
            "expired" => Some(IngredientStatus::Expired),
            "notfound" => Some(IngredientStatus::NotFound),
            _ => None,
        }
    }
}

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

fn unknown_supplier() -> String {
    UNKNOWN_SUPPLIER.to_string()
}

/// Certification record for a single ingredient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientResult {
    pub ingredient: String,
    pub status: IngredientStatus,
    #[serde(default = "not_available")]
    pub expiry_date: String,
    #[serde(default = "unknown_supplier")]
    pub supplier: String,
    #[serde(default = "not_available")]
    pub certificate_id: String,
}

impl IngredientResult {
    pub fn not_found(ingredient: impl Into<String>) -> Self {
        Self {
            ingredient: ingredient.into(),
            status: IngredientStatus::NotFound,
            expiry_date: not_available(),
            supplier: unknown_supplier(),
            certificate_id: not_available(),
        }
    }

    /// Enforce the record invariants on data that came over the wire.
    pub fn normalized(mut self) -> Self {
        if self.status == IngredientStatus::NotFound || self.expiry_date.trim().is_empty() {
            self.expiry_date = not_available();
        }
        if self.certificate_id.trim().is_empty() {
            self.certificate_id = not_available();
        }
        self
    }
}

/// Ordered, normalized ingredient names from one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientQuery {
    ingredients: Vec<String>,
}

impl IngredientQuery {
    /// Split on newlines, trim, lower-case and drop empty lines.
    pub fn parse(raw: &str) -> Result<Self> {
        let ingredients: Vec<String> = raw
            .split('\n')
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty())
            .collect();

        if ingredients.is_empty() {
            return Err(CheckerError::EmptyInput);
        }

        Ok(Self { ingredients })
    }

    pub fn ingredients(&self) -> &[String] {
        &self.ingredients
    }

    pub fn len(&self) -> usize {
        self.ingredients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ingredients.iter().map(String::as_str)
    }
}

/// One entry of the persisted chat transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub content: String,
    pub is_user: bool,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, true)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(content, false)
    }

    fn new(content: impl Into<String>, is_user: bool) -> Self {
        Self {
            content: content.into(),
            is_user,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
