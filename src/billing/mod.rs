//! Subscription billing through Stripe: checkout, customer portal and webhooks.
//!
//! Webhooks move a profile between tiers. The Stripe customer id is stored on the
//! profile so subscription updates and cancellations can be traced back to a user.

pub mod config;
pub mod stripe;
pub mod webhook;

use crate::auth::AuthUser;
use crate::billing::config::BillingConfig;
use crate::billing::stripe::{CheckoutParams, StripeClient};
use crate::billing::webhook::WebhookEvent;
use crate::database::{DatabaseError, DatabaseManager};
use crate::error::AppError;
use crate::metrics::track_billing_event;
use crate::usage::tier::Tier;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub price_id: String,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalRequest {
    #[serde(default)]
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalResponse {
    pub url: String,
}

#[derive(Clone)]
pub struct BillingService {
    config: BillingConfig,
    stripe: StripeClient,
    database: Arc<dyn DatabaseManager>,
}

impl BillingService {
    pub fn new(config: BillingConfig, database: Arc<dyn DatabaseManager>) -> Result<Self, AppError> {
        let stripe = StripeClient::new(&config)?;
        Ok(Self {
            config,
            stripe,
            database,
        })
    }

    /// Paid tier sold under `price_id`, if any
    pub fn tier_for_price(&self, price_id: &str) -> Option<Tier> {
        if price_id == self.config.student_pro_price_id {
            Some(Tier::StudentPro)
        } else if price_id == self.config.premium_price_id {
            Some(Tier::Premium)
        } else {
            None
        }
    }

    pub async fn checkout(
        &self,
        user: &AuthUser,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, AppError> {
        if self.tier_for_price(&request.price_id).is_none() {
            return Err(AppError::BadRequest(format!(
                "Unknown price id: {}",
                request.price_id
            )));
        }

        let profile = self.database.profiles().find_by_id(&user.user_id).await?;
        let customer_id = profile.as_ref().and_then(|p| p.billing_customer_id.as_deref());
        let customer_email = user
            .email
            .as_deref()
            .or_else(|| profile.as_ref().map(|p| p.email.as_str()));

        let session = self
            .stripe
            .create_checkout_session(&CheckoutParams {
                user_id: &user.user_id,
                price_id: &request.price_id,
                success_url: request.success_url.as_deref().unwrap_or(&self.config.success_url),
                cancel_url: request.cancel_url.as_deref().unwrap_or(&self.config.cancel_url),
                customer_id,
                customer_email,
            })
            .await?;

        info!(user_id = %user.user_id, session_id = %session.id, "Created checkout session");

        Ok(CheckoutResponse {
            session_id: session.id,
            url: session.url,
        })
    }

    pub async fn portal(
        &self,
        user: &AuthUser,
        request: &PortalRequest,
    ) -> Result<PortalResponse, AppError> {
        let profiles = self.database.profiles();
        let profile = profiles
            .find_by_id(&user.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("profile not found".to_string()))?;

        let customer_id = match profile.billing_customer_id {
            Some(id) => id,
            None => {
                let customer = self
                    .stripe
                    .create_customer(&profile.email, &profile.id)
                    .await?;
                profiles.set_billing_customer(&profile.id, &customer.id).await?;
                info!(user_id = %profile.id, customer_id = %customer.id, "Created billing customer");
                customer.id
            }
        };

        let session = self
            .stripe
            .create_portal_session(
                &customer_id,
                request
                    .return_url
                    .as_deref()
                    .unwrap_or(&self.config.portal_return_url),
            )
            .await?;

        Ok(PortalResponse { url: session.url })
    }

    /// Verify (when a secret is configured) and apply one webhook delivery
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<(), AppError> {
        if !self.config.webhook_secret.is_empty() {
            let header = signature.ok_or_else(|| {
                AppError::BadRequest("Missing Stripe-Signature header".to_string())
            })?;
            webhook::verify_signature(
                payload,
                header,
                &self.config.webhook_secret,
                self.config.signature_tolerance_seconds,
                Utc::now().timestamp(),
            )?;
        }

        let event = WebhookEvent::parse(payload)?;
        let handled = match event.event_type.as_str() {
            "checkout.session.completed" => self.on_checkout_completed(&event).await?,
            "customer.subscription.updated" => self.on_subscription_updated(&event).await?,
            "customer.subscription.deleted" => self.on_subscription_deleted(&event).await?,
            other => {
                info!(event_type = %other, event_id = ?event.id, "Unhandled billing event");
                false
            }
        };

        track_billing_event(event.event_type.clone(), handled);
        Ok(())
    }

    async fn on_checkout_completed(&self, event: &WebhookEvent) -> Result<bool, AppError> {
        let Some(user_id) = event.object_str("client_reference_id") else {
            warn!(event_id = ?event.id, "Checkout completed without client_reference_id");
            return Ok(false);
        };

        let tier = match event.object_str("subscription") {
            Some(subscription_id) => {
                let subscription = self.stripe.get_subscription(subscription_id).await?;
                self.tier_for_subscription_price(subscription.price_id())
            }
            None => Tier::Free,
        };

        let profiles = self.database.profiles();
        match profiles.update_tier(user_id, tier).await {
            Ok(_) => {}
            Err(DatabaseError::NotFound) => {
                warn!(user_id = %user_id, "Checkout completed for unknown profile");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(customer_id) = event.object_str("customer") {
            profiles.set_billing_customer(user_id, customer_id).await?;
        }

        info!(user_id = %user_id, tier = %tier, "Subscription checkout applied");
        Ok(true)
    }

    async fn on_subscription_updated(&self, event: &WebhookEvent) -> Result<bool, AppError> {
        let subscription: stripe::Subscription =
            serde_json::from_value(event.data.object.clone())
                .map_err(|e| AppError::BadRequest(format!("Invalid subscription object: {}", e)))?;

        let tier = if subscription.is_active() {
            self.tier_for_subscription_price(subscription.price_id())
        } else {
            Tier::Free
        };

        self.set_customer_tier(subscription.customer.as_deref(), tier)
            .await
    }

    async fn on_subscription_deleted(&self, event: &WebhookEvent) -> Result<bool, AppError> {
        self.set_customer_tier(event.object_str("customer"), Tier::Free)
            .await
    }

    fn tier_for_subscription_price(&self, price_id: Option<&str>) -> Tier {
        match price_id.and_then(|id| self.tier_for_price(id)) {
            Some(tier) => tier,
            None => {
                warn!(price_id = ?price_id, "Subscription price does not map to a tier");
                Tier::Free
            }
        }
    }

    async fn set_customer_tier(&self, customer_id: Option<&str>, tier: Tier) -> Result<bool, AppError> {
        let Some(customer_id) = customer_id else {
            warn!("Subscription event without customer id");
            return Ok(false);
        };

        let profiles = self.database.profiles();
        let Some(profile) = profiles.find_by_billing_customer(customer_id).await? else {
            warn!(customer_id = %customer_id, "No profile for billing customer");
            return Ok(false);
        };

        profiles.update_tier(&profile.id, tier).await?;
        info!(user_id = %profile.id, customer_id = %customer_id, tier = %tier, "Subscription tier updated");
        Ok(true)
    }
}
