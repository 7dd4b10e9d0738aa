//! Stripe payment intents over the REST API.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::StripeConfig;

use super::PaymentError;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Minimal Stripe client: create and retrieve payment intents.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    id: String,
    client_secret: Option<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    /// Create a client from configuration.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
        }
    }

    /// Create a payment intent and return `(id, client_secret)`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` when Stripe rejects the request.
    pub async fn create_payment_intent(
        &self,
        amount_minor: i64,
        order_number: &str,
    ) -> Result<(String, String), PaymentError> {
        let params = [
            ("amount", amount_minor.to_string()),
            ("currency", "usd".to_owned()),
            ("metadata[order_number]", order_number.to_owned()),
        ];

        let response = self
            .http
            .post(format!("{API_BASE}/payment_intents"))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&params)
            .send()
            .await?;

        let intent = Self::parse(response).await?;
        let client_secret = intent
            .client_secret
            .ok_or_else(|| PaymentError::Gateway("payment intent without client secret".into()))?;

        Ok((intent.id, client_secret))
    }

    /// Whether a payment intent has reached `succeeded`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` when Stripe rejects the lookup.
    pub async fn payment_succeeded(&self, payment_intent_id: &str) -> Result<bool, PaymentError> {
        let response = self
            .http
            .get(format!("{API_BASE}/payment_intents/{payment_intent_id}"))
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        let intent = Self::parse(response).await?;
        Ok(intent.status == "succeeded")
    }

    async fn parse(response: reqwest::Response) -> Result<PaymentIntentResponse, PaymentError> {
        if response.status().is_success() {
            return Ok(response.json::<PaymentIntentResponse>().await?);
        }

        let status = response.status();
        let message = response
            .json::<StripeErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error.message)
            .unwrap_or_else(|| format!("http {status}"));

        Err(PaymentError::Gateway(message))
    }
}
