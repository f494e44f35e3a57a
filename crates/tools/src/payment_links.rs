//! Checkout tools: `create_payment_link`, `get_price_and_create_payment_link`.
//!
//! Both answer with a JSON object carrying the link under `"url"`.

use crate::args;
use crate::catalog::CachedCatalog;
use crate::client::CommerceError;
use async_trait::async_trait;
use cartloop_core::error::ToolError;
use cartloop_core::tool::{Tool, ToolResult};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct CreatePaymentLinkTool {
    catalog: Arc<CachedCatalog>,
}

impl CreatePaymentLinkTool {
    pub fn new(catalog: Arc<CachedCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for CreatePaymentLinkTool {
    fn name(&self) -> &str {
        "create_payment_link"
    }

    fn description(&self) -> &str {
        "Create a checkout link for a price id. Returns the URL the customer pays at."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "price_id": { "type": "string", "description": "Price to sell" },
                "quantity": { "type": "integer", "description": "Units to buy (default 1)" }
            },
            "required": ["price_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let price_id = args::required_str(&arguments, "price_id")?;
        let quantity = args::quantity(&arguments)?;
        match self.catalog.create_payment_link(price_id, quantity).await {
            Ok(link) => {
                info!(price_id, quantity, link_id = %link.id, "Payment link created");
                Ok(ToolResult::json(json!({
                    "id": link.id,
                    "url": link.url,
                    "price_id": price_id,
                    "quantity": quantity,
                })))
            }
            Err(e) => Ok(ToolResult::failure(e.to_string())),
        }
    }
}

/// Product name in, payment link out. Saves the oracle the
/// list-then-pick round trips for the common "I want to buy X" request.
pub struct GetPriceAndCreatePaymentLinkTool {
    catalog: Arc<CachedCatalog>,
}

impl GetPriceAndCreatePaymentLinkTool {
    pub fn new(catalog: Arc<CachedCatalog>) -> Self {
        Self { catalog }
    }

    async fn run(&self, product_name: &str, quantity: u32) -> Result<serde_json::Value, CommerceError> {
        let product = self.catalog.find_product(product_name).await?;
        let price = self
            .catalog
            .list_prices(Some(&product.id), args::DEFAULT_LIST_LIMIT)
            .await?
            .into_iter()
            .find(|p| p.active)
            .ok_or_else(|| CommerceError::NotFound(format!("no active price for '{}'", product.name)))?;
        let link = self.catalog.create_payment_link(&price.id, quantity).await?;
        info!(product = %product.name, price_id = %price.id, quantity, "Payment link created");

        Ok(json!({
            "id": link.id,
            "url": link.url,
            "product": product.name,
            "price_id": price.id,
            "unit_amount": price.unit_amount,
            "currency": price.currency,
            "quantity": quantity,
        }))
    }
}

#[async_trait]
impl Tool for GetPriceAndCreatePaymentLinkTool {
    fn name(&self) -> &str {
        "get_price_and_create_payment_link"
    }

    fn description(&self) -> &str {
        "Look up a product by name, take its active price and create a checkout link. \
         Use this when the customer wants to buy a product."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "product_name": { "type": "string", "description": "Name of the product to buy" },
                "quantity": { "type": "integer", "description": "Units to buy (default 1)" }
            },
            "required": ["product_name"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let product_name = args::required_str(&arguments, "product_name")?;
        let quantity = args::quantity(&arguments)?;
        match self.run(product_name, quantity).await {
            Ok(data) => Ok(ToolResult::json(data)),
            Err(e) => Ok(ToolResult::failure(e.to_string())),
        }
    }
}
