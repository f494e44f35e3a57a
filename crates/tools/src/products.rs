//! Product tools: `list_products`, `create_product`.

use crate::args;
use crate::catalog::CachedCatalog;
use async_trait::async_trait;
use cartloop_core::error::ToolError;
use cartloop_core::tool::{Tool, ToolResult};
use serde_json::json;
use std::sync::Arc;

pub struct ListProductsTool {
    catalog: Arc<CachedCatalog>,
}

impl ListProductsTool {
    pub fn new(catalog: Arc<CachedCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for ListProductsTool {
    fn name(&self) -> &str {
        "list_products"
    }

    fn description(&self) -> &str {
        "List active products in the catalog with their ids, names and descriptions."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of products to return (default 10, max 100)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let limit = args::limit(&arguments)?;
        match self.catalog.list_products(limit).await {
            Ok(products) => Ok(ToolResult::json(json!(products))),
            Err(e) => Ok(ToolResult::failure(e.to_string())),
        }
    }
}

pub struct CreateProductTool {
    catalog: Arc<CachedCatalog>,
}

impl CreateProductTool {
    pub fn new(catalog: Arc<CachedCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for CreateProductTool {
    fn name(&self) -> &str {
        "create_product"
    }

    fn description(&self) -> &str {
        "Create a new product in the catalog. A price must be created separately."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Product name" },
                "description": { "type": "string", "description": "Optional product description" }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let name = args::required_str(&arguments, "name")?;
        let description = args::optional_str(&arguments, "description");
        match self.catalog.create_product(name, description).await {
            Ok(product) => Ok(ToolResult::json(json!(product))),
            Err(e) => Ok(ToolResult::failure(e.to_string())),
        }
    }
}
