//! Cached view of the payment API shared by the commerce tools.
//!
//! Product and price listings are cached per query and expire purely by
//! age. Writes do not invalidate them; a product created through the tools
//! shows up in listings once the cached entry has expired.

use crate::client::{CommerceClient, CommerceError, PaymentLink, Price, Product};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How many products a name lookup scans.
const LOOKUP_LIMIT: u32 = 100;

pub struct CachedCatalog {
    client: Arc<dyn CommerceClient>,
    /// Keyed by the list query, e.g. `limit=10`.
    products: Cache<String, Vec<Product>>,
    prices: Cache<String, Vec<Price>>,
    default_currency: String,
}

impl CachedCatalog {
    pub fn new(
        client: Arc<dyn CommerceClient>,
        ttl: Duration,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            client,
            products: Cache::builder().time_to_live(ttl).build(),
            prices: Cache::builder().time_to_live(ttl).build(),
            default_currency: default_currency.into(),
        }
    }

    pub fn default_currency(&self) -> &str {
        &self.default_currency
    }

    pub async fn list_products(&self, limit: u32) -> Result<Vec<Product>, CommerceError> {
        let key = format!("limit={limit}");
        if let Some(hit) = self.products.get(&key).await {
            debug!(key = %key, "Product list served from cache");
            return Ok(hit);
        }
        let products = self.client.list_products(limit).await?;
        self.products.insert(key, products.clone()).await;
        Ok(products)
    }

    pub async fn list_prices(
        &self,
        product_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Price>, CommerceError> {
        let key = format!("product={}&limit={limit}", product_id.unwrap_or("*"));
        if let Some(hit) = self.prices.get(&key).await {
            debug!(key = %key, "Price list served from cache");
            return Ok(hit);
        }
        let prices = self.client.list_prices(product_id, limit).await?;
        self.prices.insert(key, prices.clone()).await;
        Ok(prices)
    }

    pub async fn create_product(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Product, CommerceError> {
        self.client.create_product(name, description).await
    }

    pub async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: Option<&str>,
    ) -> Result<Price, CommerceError> {
        let currency = currency.unwrap_or(&self.default_currency);
        self.client
            .create_price(product_id, unit_amount, currency)
            .await
    }

    pub async fn create_payment_link(
        &self,
        price_id: &str,
        quantity: u32,
    ) -> Result<PaymentLink, CommerceError> {
        self.client.create_payment_link(price_id, quantity).await
    }

    /// Find a product by name: exact (case-insensitive) match first, then
    /// the first product whose name contains the query.
    pub async fn find_product(&self, name: &str) -> Result<Product, CommerceError> {
        let wanted = name.trim().to_lowercase();
        let products = self.list_products(LOOKUP_LIMIT).await?;
        products
            .iter()
            .find(|p| p.name.to_lowercase() == wanted)
            .or_else(|| {
                products
                    .iter()
                    .find(|p| p.name.to_lowercase().contains(&wanted))
            })
            .cloned()
            .ok_or_else(|| CommerceError::NotFound(format!("no product named '{}'", name.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryCatalog;

    // The cache keeps its own clock, so TTL tests use short real durations.
    const SHORT_TTL: Duration = Duration::from_millis(150);
    const PAST_TTL: Duration = Duration::from_millis(400);

    fn catalog(inner: Arc<InMemoryCatalog>) -> CachedCatalog {
        CachedCatalog::new(inner, Duration::from_secs(300), "usd")
    }

    #[tokio::test]
    async fn list_reads_are_cached_until_ttl() {
        let inner = Arc::new(InMemoryCatalog::demo());
        let cached = CachedCatalog::new(inner.clone(), SHORT_TTL, "usd");

        cached.list_products(10).await.unwrap();
        cached.list_products(10).await.unwrap();
        cached.list_prices(None, 10).await.unwrap();
        cached.list_prices(None, 10).await.unwrap();
        assert_eq!(inner.list_calls(), 2);

        tokio::time::sleep(PAST_TTL).await;
        cached.list_products(10).await.unwrap();
        cached.list_prices(None, 10).await.unwrap();
        assert_eq!(inner.list_calls(), 4);
    }

    #[tokio::test]
    async fn queries_are_cached_separately() {
        let inner = Arc::new(InMemoryCatalog::demo());
        let cached = catalog(inner.clone());

        cached.list_products(10).await.unwrap();
        cached.list_products(5).await.unwrap();
        cached.list_prices(Some("prod_001"), 10).await.unwrap();
        cached.list_prices(None, 10).await.unwrap();
        assert_eq!(inner.list_calls(), 4);
    }

    #[tokio::test]
    async fn cached_list_survives_writes_until_ttl() {
        let inner = Arc::new(InMemoryCatalog::new());
        let cached = CachedCatalog::new(inner.clone(), SHORT_TTL, "usd");

        assert!(cached.list_products(10).await.unwrap().is_empty());
        let product = cached.create_product("Eyepiece", None).await.unwrap();
        cached.create_price(&product.id, 1500, None).await.unwrap();
        assert!(cached.list_products(10).await.unwrap().is_empty());
        assert_eq!(inner.list_calls(), 1);

        tokio::time::sleep(PAST_TTL).await;
        let products = cached.list_products(10).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Eyepiece");
    }

    #[tokio::test]
    async fn find_product_prefers_exact_match() {
        let inner = Arc::new(
            InMemoryCatalog::new()
                .with_product("Telescope Bag", None, 1500, "usd")
                .with_product("Telescope", None, 4999, "usd"),
        );
        let cached = catalog(inner);

        assert_eq!(cached.find_product("telescope").await.unwrap().id, "prod_002");
        assert_eq!(cached.find_product("bag").await.unwrap().id, "prod_001");
        assert!(matches!(
            cached.find_product("binoculars").await,
            Err(CommerceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn price_uses_default_currency() {
        let inner = Arc::new(InMemoryCatalog::new().with_product("Tripod", None, 2000, "eur"));
        let cached = catalog(inner);
        let price = cached.create_price("prod_001", 2500, None).await.unwrap();
        assert_eq!(price.currency, "usd");
    }
}
