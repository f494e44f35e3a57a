//! Price tools: `list_prices`, `create_price`.

use crate::args;
use crate::catalog::CachedCatalog;
use async_trait::async_trait;
use cartloop_core::error::ToolError;
use cartloop_core::tool::{Tool, ToolResult};
use serde_json::json;
use std::sync::Arc;

pub struct ListPricesTool {
    catalog: Arc<CachedCatalog>,
}

impl ListPricesTool {
    pub fn new(catalog: Arc<CachedCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for ListPricesTool {
    fn name(&self) -> &str {
        "list_prices"
    }

    fn description(&self) -> &str {
        "List active prices, optionally for a single product. Amounts are in the \
         currency's smallest unit (cents for USD)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "product_id": { "type": "string", "description": "Only prices of this product" },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of prices to return (default 10, max 100)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let product_id = args::optional_str(&arguments, "product_id");
        let limit = args::limit(&arguments)?;
        match self.catalog.list_prices(product_id, limit).await {
            Ok(prices) => Ok(ToolResult::json(json!(prices))),
            Err(e) => Ok(ToolResult::failure(e.to_string())),
        }
    }
}

pub struct CreatePriceTool {
    catalog: Arc<CachedCatalog>,
}

impl CreatePriceTool {
    pub fn new(catalog: Arc<CachedCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for CreatePriceTool {
    fn name(&self) -> &str {
        "create_price"
    }

    fn description(&self) -> &str {
        "Create a one-time price for an existing product."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "product_id": { "type": "string", "description": "Product to price" },
                "unit_amount": {
                    "type": "integer",
                    "description": "Amount in the currency's smallest unit, e.g. 4999 for $49.99"
                },
                "currency": { "type": "string", "description": "Three-letter ISO code (default from config)" }
            },
            "required": ["product_id", "unit_amount"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let product_id = args::required_str(&arguments, "product_id")?;
        let unit_amount = arguments
            .get("unit_amount")
            .and_then(serde_json::Value::as_i64)
            .filter(|amount| *amount > 0)
            .ok_or_else(|| {
                ToolError::InvalidArguments("'unit_amount' must be a positive integer".into())
            })?;
        let currency = args::optional_str(&arguments, "currency");
        if let Some(c) = currency
            && (c.len() != 3 || !c.chars().all(|ch| ch.is_ascii_alphabetic()))
        {
            return Err(ToolError::InvalidArguments(format!(
                "'{c}' is not a three-letter currency code"
            )));
        }

        match self
            .catalog
            .create_price(product_id, unit_amount, currency)
            .await
        {
            Ok(price) => Ok(ToolResult::json(json!(price))),
            Err(e) => Ok(ToolResult::failure(e.to_string())),
        }
    }
}
