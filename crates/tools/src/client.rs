//! The payment API as seen by the commerce tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A price attached to a product. `unit_amount` is in the currency's
/// smallest unit (cents for USD).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub id: String,
    pub product: String,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    pub currency: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub id: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum CommerceError {
    #[error("Payment API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Payment API authentication failed")]
    Unauthorized,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected payment API response: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Payment API not configured: {0}")]
    NotConfigured(String),
}

/// Operations the agent may perform against the payment API.
#[async_trait]
pub trait CommerceClient: Send + Sync {
    async fn list_products(&self, limit: u32) -> Result<Vec<Product>, CommerceError>;

    /// Prices, optionally restricted to one product.
    async fn list_prices(
        &self,
        product_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Price>, CommerceError>;

    async fn create_product(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Product, CommerceError>;

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
    ) -> Result<Price, CommerceError>;

    async fn create_payment_link(
        &self,
        price_id: &str,
        quantity: u32,
    ) -> Result<PaymentLink, CommerceError>;
}
