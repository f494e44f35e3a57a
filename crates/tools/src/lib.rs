//! Commerce tools for the Cartloop agent.
//!
//! The tools reach the payment API through the [`CommerceClient`] trait.
//! [`HttpCommerceClient`] talks to a Stripe-style REST API;
//! [`InMemoryCatalog`] is a deterministic stand-in for tests and offline
//! chat. Catalog reads go through a per-registry [`CachedCatalog`] whose
//! entries expire by time only.

pub mod args;
pub mod catalog;
pub mod client;
pub mod http_client;
pub mod in_memory;
pub mod payment_links;
pub mod prices;
pub mod products;

pub use catalog::CachedCatalog;
pub use client::{CommerceClient, CommerceError, PaymentLink, Price, Product};
pub use http_client::HttpCommerceClient;
pub use in_memory::InMemoryCatalog;

use cartloop_config::CommerceConfig;
use cartloop_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Tools whose output carries a payment link under `"url"`.
pub const PAYMENT_LINK_TOOLS: [&str; 2] =
    ["create_payment_link", "get_price_and_create_payment_link"];

/// Register every commerce tool against one shared, cached catalog.
pub fn commerce_registry(client: Arc<dyn CommerceClient>, config: &CommerceConfig) -> ToolRegistry {
    let catalog = Arc::new(CachedCatalog::new(
        client,
        Duration::from_secs(config.cache_ttl_secs),
        config.currency.clone(),
    ));

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(products::ListProductsTool::new(catalog.clone())));
    registry.register(Box::new(products::CreateProductTool::new(catalog.clone())));
    registry.register(Box::new(prices::ListPricesTool::new(catalog.clone())));
    registry.register(Box::new(prices::CreatePriceTool::new(catalog.clone())));
    registry.register(Box::new(payment_links::CreatePaymentLinkTool::new(
        catalog.clone(),
    )));
    registry.register(Box::new(
        payment_links::GetPriceAndCreatePaymentLinkTool::new(catalog),
    ));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartloop_core::tool::ToolCall;
    use serde_json::json;

    fn registry() -> (Arc<InMemoryCatalog>, ToolRegistry) {
        let inner = Arc::new(InMemoryCatalog::demo());
        let registry = commerce_registry(inner.clone(), &CommerceConfig::default());
        (inner, registry)
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn registers_all_commerce_tools() {
        let (_, registry) = registry();
        assert_eq!(
            registry.names(),
            vec![
                "create_payment_link",
                "create_price",
                "create_product",
                "get_price_and_create_payment_link",
                "list_prices",
                "list_products",
            ]
        );
    }

    #[tokio::test]
    async fn buy_by_name_returns_link_url() {
        let (inner, registry) = registry();
        let result = registry
            .execute(&call(
                "get_price_and_create_payment_link",
                json!({"product_name": "telescope", "quantity": 2}),
            ))
            .await
            .unwrap();

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["url"], "https://pay.example.com/plink_001");
        assert_eq!(data["quantity"], 2);
        assert_eq!(inner.payment_links().len(), 1);
    }

    #[tokio::test]
    async fn unknown_product_is_a_failed_observation() {
        let (_, registry) = registry();
        let result = registry
            .execute(&call(
                "get_price_and_create_payment_link",
                json!({"product_name": "Binoculars"}),
            ))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.starts_with("Error: "));
        assert!(result.output.contains("Binoculars"));
    }

    #[tokio::test]
    async fn missing_arguments_are_rejected() {
        let (_, registry) = registry();
        let err = registry
            .execute(&call("create_payment_link", json!({})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("price_id"));
    }

    #[tokio::test]
    async fn remote_outage_is_a_failed_observation() {
        let (inner, registry) = registry();
        inner.set_unavailable(true);
        let result = registry
            .execute(&call("list_products", json!({})))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("unreachable"));
    }

    #[tokio::test]
    async fn create_product_then_price() {
        let (_, registry) = registry();
        let product = registry
            .execute(&call("create_product", json!({"name": "Tripod"})))
            .await
            .unwrap();
        let product_id = product.data.unwrap()["id"].as_str().unwrap().to_string();

        let price = registry
            .execute(&call(
                "create_price",
                json!({"product_id": product_id, "unit_amount": 2599}),
            ))
            .await
            .unwrap();
        let data = price.data.unwrap();
        assert_eq!(data["currency"], "usd");
        assert_eq!(data["unit_amount"], 2599);

        let bad = registry
            .execute(&call(
                "create_price",
                json!({"product_id": "prod_001", "unit_amount": 100, "currency": "dollars"}),
            ))
            .await;
        assert!(bad.is_err());
    }
}
