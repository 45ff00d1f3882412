use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored product. `id` is assigned by the store and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: f64,
    pub inventory: f64,
    pub created_at: DateTime<Utc>,
}

// ── Request payloads ─────────────────────────────────────────────────────────

/// Create payload as it arrives on the wire. Required fields are optional here
/// so that presence is checked by [`CreateProduct::validate`] rather than by
/// the JSON decoder.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub inventory: Option<f64>,
    /// Defaults to the time of validation
    pub created_at: Option<DateTime<Utc>>,
}

/// A create payload with every field present, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    pub inventory: f64,
    pub created_at: DateTime<Utc>,
}

impl CreateProduct {
    /// Checks every required field and reports all failures at once.
    pub fn validate(self) -> Result<NewProduct, String> {
        let mut problems = Vec::new();

        let name = match self.name {
            Some(name) if !name.is_empty() => Some(name),
            _ => {
                problems.push("name: name is required");
                None
            }
        };
        if self.price.is_none() {
            problems.push("price: price is required");
        }
        if self.inventory.is_none() {
            problems.push("inventory: inventory is required");
        }

        match (name, self.price, self.inventory) {
            (Some(name), Some(price), Some(inventory)) => Ok(NewProduct {
                name,
                price,
                inventory,
                created_at: self.created_at.unwrap_or_else(Utc::now),
            }),
            _ => Err(format!("Product validation failed: {}", problems.join(", "))),
        }
    }
}
