//! Payment gateway integration.
//!
//! Two external processors sit behind one dispatcher keyed by the order's
//! payment method. Gateway request/response shapes stay inside their
//! modules; the order service only sees [`PaymentIntent`] and a verified
//! yes/no.

mod razorpay;
mod stripe;

pub use razorpay::RazorpayClient;
pub use stripe::StripeClient;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use clementine_core::PaymentMethod;

use crate::config::ServerConfig;
use crate::models::Order;

/// Errors from payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The requested gateway has no credentials configured.
    #[error("{0} is not configured")]
    NotConfigured(PaymentMethod),

    /// The gateway rejected the request or returned an unusable response.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Transport-level failure talking to the gateway.
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The order total cannot be expressed in minor units.
    #[error("order total out of range for gateway")]
    AmountOutOfRange,
}

/// What the client needs to start paying for an order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentIntent {
    Stripe {
        client_secret: String,
        payment_intent_id: String,
    },
    Razorpay {
        gateway_order_id: String,
        amount: i64,
        currency: String,
        key_id: String,
    },
    /// Nothing to collect up front.
    Cod,
}

/// Gateway callback data presented to confirm a payment.
///
/// Which fields matter depends on the order's payment method; the rest are
/// ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    /// Stripe payment intent id.
    pub payment_intent_id: Option<String>,
    /// Razorpay order id.
    pub gateway_order_id: Option<String>,
    /// Razorpay payment id.
    pub payment_id: Option<String>,
    /// Razorpay HMAC signature over `order_id|payment_id`.
    pub signature: Option<String>,
}

impl PaymentConfirmation {
    /// The gateway-side reference worth persisting on the order.
    #[must_use]
    pub fn reference(&self) -> String {
        self.payment_intent_id
            .clone()
            .or_else(|| self.payment_id.clone())
            .unwrap_or_else(|| "cod".to_owned())
    }
}

/// Dispatcher over the configured gateways.
pub struct PaymentService {
    stripe: Option<StripeClient>,
    razorpay: Option<RazorpayClient>,
}

impl PaymentService {
    /// Build the service from configuration; unconfigured gateways stay
    /// disabled.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            stripe: config.stripe.as_ref().map(StripeClient::new),
            razorpay: config.razorpay.as_ref().map(RazorpayClient::new),
        }
    }

    /// Create a payment intent for an order with its declared method.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` for a disabled gateway, or a
    /// gateway/transport error.
    pub async fn create_intent(&self, order: &Order) -> Result<PaymentIntent, PaymentError> {
        match order.payment_method {
            PaymentMethod::Stripe => {
                let stripe = self
                    .stripe
                    .as_ref()
                    .ok_or(PaymentError::NotConfigured(PaymentMethod::Stripe))?;
                let (payment_intent_id, client_secret) = stripe
                    .create_payment_intent(
                        minor_units(order.total)?,
                        &order.order_number,
                    )
                    .await?;
                Ok(PaymentIntent::Stripe {
                    client_secret,
                    payment_intent_id,
                })
            }
            PaymentMethod::Razorpay => {
                let razorpay = self
                    .razorpay
                    .as_ref()
                    .ok_or(PaymentError::NotConfigured(PaymentMethod::Razorpay))?;
                let amount = minor_units(order.total)?;
                let gateway_order_id = razorpay
                    .create_order(amount, &order.order_number)
                    .await?;
                Ok(PaymentIntent::Razorpay {
                    gateway_order_id,
                    amount,
                    currency: razorpay::CURRENCY.to_owned(),
                    key_id: razorpay.key_id().to_owned(),
                })
            }
            PaymentMethod::Cod => Ok(PaymentIntent::Cod),
        }
    }

    /// Verify a payment confirmation against the order's gateway.
    ///
    /// Returns `Ok(false)` when the gateway says the payment did not
    /// succeed; transport failures surface as errors.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured`, `PaymentError::Gateway` for
    /// missing confirmation fields, or a transport error.
    pub async fn verify(
        &self,
        order: &Order,
        confirmation: &PaymentConfirmation,
    ) -> Result<bool, PaymentError> {
        match order.payment_method {
            PaymentMethod::Stripe => {
                let stripe = self
                    .stripe
                    .as_ref()
                    .ok_or(PaymentError::NotConfigured(PaymentMethod::Stripe))?;
                let intent_id = confirmation
                    .payment_intent_id
                    .as_deref()
                    .ok_or_else(|| PaymentError::Gateway("missing payment_intent_id".into()))?;
                stripe.payment_succeeded(intent_id).await
            }
            PaymentMethod::Razorpay => {
                let razorpay = self
                    .razorpay
                    .as_ref()
                    .ok_or(PaymentError::NotConfigured(PaymentMethod::Razorpay))?;
                let (order_id, payment_id, signature) = match (
                    confirmation.gateway_order_id.as_deref(),
                    confirmation.payment_id.as_deref(),
                    confirmation.signature.as_deref(),
                ) {
                    (Some(o), Some(p), Some(s)) => (o, p, s),
                    _ => {
                        return Err(PaymentError::Gateway(
                            "missing razorpay confirmation fields".into(),
                        ));
                    }
                };
                Ok(razorpay.verify_signature(order_id, payment_id, signature))
            }
            // Cash on delivery settles at the door.
            PaymentMethod::Cod => Ok(true),
        }
    }
}

/// Convert a decimal currency amount into integer minor units (cents).
fn minor_units(amount: Decimal) -> Result<i64, PaymentError> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or(PaymentError::AmountOutOfRange)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units() {
        assert_eq!(minor_units("19.99".parse().unwrap()).unwrap(), 1999);
        assert_eq!(minor_units("0.01".parse().unwrap()).unwrap(), 1);
        assert_eq!(minor_units("40".parse().unwrap()).unwrap(), 4000);
    }

    #[test]
    fn test_confirmation_reference_prefers_intent_id() {
        let confirmation = PaymentConfirmation {
            payment_intent_id: Some("pi_123".into()),
            gateway_order_id: None,
            payment_id: Some("pay_456".into()),
            signature: None,
        };
        assert_eq!(confirmation.reference(), "pi_123");

        let cod = PaymentConfirmation {
            payment_intent_id: None,
            gateway_order_id: None,
            payment_id: None,
            signature: None,
        };
        assert_eq!(cod.reference(), "cod");
    }
}
