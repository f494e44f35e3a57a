//! Deterministic in-process catalog.
//!
//! Ids and payment-link URLs are sequential so tests can assert on them.

use crate::client::{CommerceClient, CommerceError, PaymentLink, Price, Product};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
struct CatalogState {
    products: Vec<Product>,
    prices: Vec<Price>,
    links: Vec<PaymentLink>,
}

#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
    list_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small sample storefront for offline chat.
    pub fn demo() -> Self {
        Self::new()
            .with_product("Telescope", Some("80mm refractor for beginners"), 4999, "usd")
            .with_product("Star Map", Some("Glow-in-the-dark sky chart"), 1299, "usd")
            .with_product("Red Flashlight", Some("Night-vision friendly light"), 899, "usd")
    }

    /// Seed a product with one active price.
    pub fn with_product(
        self,
        name: &str,
        description: Option<&str>,
        unit_amount: i64,
        currency: &str,
    ) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let product = push_product(&mut state, name, description);
            push_price(&mut state, &product.id, unit_amount, currency);
        }
        self
    }

    /// Make every call fail with a network error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of list calls served (products and prices).
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn payment_links(&self) -> Vec<PaymentLink> {
        self.state.lock().unwrap().links.clone()
    }

    fn check_available(&self) -> Result<(), CommerceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CommerceError::Network("payment API unreachable".into()))
        } else {
            Ok(())
        }
    }
}

fn push_product(state: &mut CatalogState, name: &str, description: Option<&str>) -> Product {
    let product = Product {
        id: format!("prod_{:03}", state.products.len() + 1),
        name: name.to_string(),
        description: description.map(str::to_string),
        active: true,
    };
    state.products.push(product.clone());
    product
}

fn push_price(state: &mut CatalogState, product_id: &str, unit_amount: i64, currency: &str) -> Price {
    let price = Price {
        id: format!("price_{:03}", state.prices.len() + 1),
        product: product_id.to_string(),
        unit_amount: Some(unit_amount),
        currency: currency.to_lowercase(),
        active: true,
    };
    state.prices.push(price.clone());
    price
}

#[async_trait]
impl CommerceClient for InMemoryCatalog {
    async fn list_products(&self, limit: u32) -> Result<Vec<Product>, CommerceError> {
        self.check_available()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .iter()
            .filter(|p| p.active)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_prices(
        &self,
        product_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Price>, CommerceError> {
        self.check_available()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        Ok(state
            .prices
            .iter()
            .filter(|p| p.active && product_id.is_none_or(|id| p.product == id))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn create_product(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Product, CommerceError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        Ok(push_product(&mut state, name, description))
    }

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
    ) -> Result<Price, CommerceError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        if !state.products.iter().any(|p| p.id == product_id) {
            return Err(CommerceError::NotFound(format!("product '{product_id}'")));
        }
        Ok(push_price(&mut state, product_id, unit_amount, currency))
    }

    async fn create_payment_link(
        &self,
        price_id: &str,
        quantity: u32,
    ) -> Result<PaymentLink, CommerceError> {
        self.check_available()?;
        if quantity == 0 {
            return Err(CommerceError::InvalidRequest("quantity must be at least 1".into()));
        }
        let mut state = self.state.lock().unwrap();
        if !state.prices.iter().any(|p| p.id == price_id) {
            return Err(CommerceError::NotFound(format!("price '{price_id}'")));
        }
        let n = state.links.len() + 1;
        let link = PaymentLink {
            id: format!("plink_{n:03}"),
            url: format!("https://pay.example.com/plink_{n:03}"),
            active: true,
        };
        state.links.push(link.clone());
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_catalog_lists_products_and_prices() {
        let catalog = InMemoryCatalog::demo();
        let products = catalog.list_products(10).await.unwrap();
        assert_eq!(products.len(), 3);
        assert_eq!(products[0].id, "prod_001");

        let prices = catalog.list_prices(Some("prod_002"), 10).await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].unit_amount, Some(1299));
        assert_eq!(catalog.list_calls(), 2);
    }

    #[tokio::test]
    async fn payment_link_requires_known_price() {
        let catalog = InMemoryCatalog::demo();
        let err = catalog.create_payment_link("price_999", 1).await.unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));

        let link = catalog.create_payment_link("price_001", 2).await.unwrap();
        assert_eq!(link.url, "https://pay.example.com/plink_001");
    }

    #[tokio::test]
    async fn unavailable_catalog_fails_every_call() {
        let catalog = InMemoryCatalog::demo();
        catalog.set_unavailable(true);
        assert!(matches!(
            catalog.list_products(10).await,
            Err(CommerceError::Network(_))
        ));
    }
}
