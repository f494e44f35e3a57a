//! REST client for a Stripe-style payment API.
//!
//! Requests are form-encoded, authenticated with a bearer secret key, and
//! list endpoints answer with `{ "data": [...] }`.

use crate::client::{CommerceClient, CommerceError, PaymentLink, Price, Product};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpCommerceClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpCommerceClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CommerceError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CommerceError::NotConfigured(
                "no secret key (commerce.api_key or STRIPE_SECRET_KEY)".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CommerceError::NotConfigured(format!("HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Build from the `[commerce]` config section.
    pub fn from_config(config: &cartloop_config::CommerceConfig) -> Result<Self, CommerceError> {
        Self::new(
            &config.api_url,
            config.api_key.clone().unwrap_or_default(),
            Duration::from_secs(30),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, CommerceError> {
        debug!(path, "Payment API list request");
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| CommerceError::Network(e.to_string()))?;
        let list: ListResponse<T> = Self::decode(response).await?;
        Ok(list.data)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, CommerceError> {
        debug!(path, "Payment API create request");
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .form(form)
            .send()
            .await
            .map_err(|e| CommerceError::Network(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CommerceError> {
        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(CommerceError::Unauthorized);
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!(status, message = %message, "Payment API returned error");
            return Err(CommerceError::Api { status, message });
        }
        response
            .json()
            .await
            .map_err(|e| CommerceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CommerceClient for HttpCommerceClient {
    async fn list_products(&self, limit: u32) -> Result<Vec<Product>, CommerceError> {
        self.get_list(
            "products",
            &[("limit", limit.to_string()), ("active", "true".into())],
        )
        .await
    }

    async fn list_prices(
        &self,
        product_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Price>, CommerceError> {
        let mut query = vec![("limit", limit.to_string()), ("active", "true".into())];
        if let Some(product) = product_id {
            query.push(("product", product.to_string()));
        }
        self.get_list("prices", &query).await
    }

    async fn create_product(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Product, CommerceError> {
        let mut form = vec![("name", name.to_string())];
        if let Some(description) = description {
            form.push(("description", description.to_string()));
        }
        self.post_form("products", &form).await
    }

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
    ) -> Result<Price, CommerceError> {
        self.post_form(
            "prices",
            &[
                ("product", product_id.to_string()),
                ("unit_amount", unit_amount.to_string()),
                ("currency", currency.to_lowercase()),
            ],
        )
        .await
    }

    async fn create_payment_link(
        &self,
        price_id: &str,
        quantity: u32,
    ) -> Result<PaymentLink, CommerceError> {
        self.post_form(
            "payment_links",
            &[
                ("line_items[0][price]", price_id.to_string()),
                ("line_items[0][quantity]", quantity.to_string()),
            ],
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        let err = HttpCommerceClient::new("https://api.stripe.com/v1", " ", Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(err, CommerceError::NotConfigured(_)));
    }

    #[test]
    fn url_joins_path() {
        let client =
            HttpCommerceClient::new("https://api.stripe.com/v1/", "sk_test", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.url("prices"), "https://api.stripe.com/v1/prices");
    }

    #[test]
    fn decodes_list_envelope() {
        let raw = r#"{"object":"list","data":[
            {"id":"price_1","product":"prod_1","unit_amount":4999,"currency":"usd","active":true}
        ],"has_more":false}"#;
        let list: ListResponse<Price> = serde_json::from_str(raw).unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].unit_amount, Some(4999));
    }

    #[test]
    fn decodes_error_envelope() {
        let raw = r#"{"error":{"type":"invalid_request_error","message":"No such price"}}"#;
        let env: ErrorEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.error.message, "No such price");
    }
}
