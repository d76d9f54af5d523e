use crate::billing::config::BillingConfig;
use crate::error::AppError;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: Price,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub id: String,
}

impl Subscription {
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }

    /// Statuses that keep the paid tier
    pub fn is_active(&self) -> bool {
        matches!(self.status.as_deref(), Some("active" | "trialing") | None)
    }
}

/// Parameters for a subscription checkout
pub struct CheckoutParams<'a> {
    pub user_id: &'a str,
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    pub customer_id: Option<&'a str>,
    pub customer_email: Option<&'a str>,
}

/// Minimal form-encoded client for the Stripe REST API
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(config: &BillingConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, AppError> {
        debug!(path, "Stripe POST");
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe request failed: {}", e)))?;
        parse(path, response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        debug!(path, "Stripe GET");
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe request failed: {}", e)))?;
        parse(path, response).await
    }

    pub async fn create_checkout_session(
        &self,
        params: &CheckoutParams<'_>,
    ) -> Result<CheckoutSession, AppError> {
        let mut form = vec![
            ("mode", "subscription"),
            ("line_items[0][price]", params.price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", params.success_url),
            ("cancel_url", params.cancel_url),
            ("client_reference_id", params.user_id),
        ];
        match (params.customer_id, params.customer_email) {
            (Some(customer), _) => form.push(("customer", customer)),
            (None, Some(email)) => form.push(("customer_email", email)),
            (None, None) => {}
        }

        self.post_form("checkout/sessions", &form).await
    }

    pub async fn create_customer(&self, email: &str, user_id: &str) -> Result<Customer, AppError> {
        self.post_form(
            "customers",
            &[("email", email), ("metadata[user_id]", user_id)],
        )
        .await
    }

    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError> {
        self.post_form(
            "billing_portal/sessions",
            &[("customer", customer_id), ("return_url", return_url)],
        )
        .await
    }

    pub async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, AppError> {
        self.get(&format!("subscriptions/{}", subscription_id)).await
    }
}

async fn parse<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(path, status = status.as_u16(), body = %body, "Stripe request rejected");
        return Err(AppError::Internal(format!(
            "Stripe API error: {}",
            status.as_u16()
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| AppError::Internal(format!("Invalid Stripe response: {}", e)))
}
