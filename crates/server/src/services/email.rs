//! Email service for transactional mail.
//!
//! Uses SMTP via lettre. Message bodies are plain text + minimal HTML;
//! template design is explicitly out of scope here, the contract is the
//! event → message mapping.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::SmtpConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
}

/// Email service for transactional messages.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    alerts_address: Option<String>,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            alerts_address: config.alerts_address.clone(),
        })
    }

    /// Order confirmation to the customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the message fails to build or send.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        name: &str,
        order_number: &str,
        total: Decimal,
    ) -> Result<(), EmailError> {
        let subject = format!("Order {order_number} confirmed");
        let text = format!(
            "Hi {name},\n\nThanks for your order!\n\n\
             Order number: {order_number}\nTotal: ${total}\n\n\
             We'll let you know as soon as it ships.\n\n- Clementine"
        );
        self.send(to, &subject, &text).await
    }

    /// Shipment notice with tracking number.
    ///
    /// # Errors
    ///
    /// Returns an error if the message fails to build or send.
    pub async fn send_order_shipped(
        &self,
        to: &str,
        name: &str,
        order_number: &str,
        tracking_number: &str,
    ) -> Result<(), EmailError> {
        let subject = format!("Order {order_number} is on its way");
        let text = format!(
            "Hi {name},\n\nYour order {order_number} has shipped.\n\n\
             Tracking number: {tracking_number}\n\n- Clementine"
        );
        self.send(to, &subject, &text).await
    }

    /// Payment receipt.
    ///
    /// # Errors
    ///
    /// Returns an error if the message fails to build or send.
    pub async fn send_payment_received(
        &self,
        to: &str,
        name: &str,
        order_number: &str,
        total: Decimal,
    ) -> Result<(), EmailError> {
        let subject = format!("Payment received for order {order_number}");
        let text = format!(
            "Hi {name},\n\nWe received your payment of ${total} for order \
             {order_number}.\n\n- Clementine"
        );
        self.send(to, &subject, &text).await
    }

    /// Password reset OTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the message fails to build or send.
    pub async fn send_password_reset_otp(
        &self,
        to: &str,
        name: &str,
        otp: &str,
    ) -> Result<(), EmailError> {
        let text = format!(
            "Hi {name},\n\nYour password reset code is: {otp}\n\n\
             It expires in 10 minutes. If you didn't request this, you can \
             ignore this email.\n\n- Clementine"
        );
        self.send(to, "Your Clementine password reset code", &text)
            .await
    }

    /// Confirmation after a completed password reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the message fails to build or send.
    pub async fn send_password_changed(&self, to: &str, name: &str) -> Result<(), EmailError> {
        let text = format!(
            "Hi {name},\n\nYour password was just changed and all devices \
             were signed out. If this wasn't you, reset your password \
             immediately.\n\n- Clementine"
        );
        self.send(to, "Your Clementine password was changed", &text)
            .await
    }

    /// New-order alert to the back office, if an alerts address is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the message fails to build or send.
    pub async fn send_new_order_alert(
        &self,
        order_number: &str,
        total: Decimal,
    ) -> Result<(), EmailError> {
        let Some(alerts) = self.alerts_address.clone() else {
            return Ok(());
        };
        let subject = format!("New order {order_number}");
        let text = format!("Order {order_number} was just placed. Total: ${total}.");
        self.send(&alerts, &subject, &text).await
    }

    /// Low-stock alert to the back office, if an alerts address is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the message fails to build or send.
    pub async fn send_low_stock_alert(
        &self,
        product_name: &str,
        stock: i32,
    ) -> Result<(), EmailError> {
        let Some(alerts) = self.alerts_address.clone() else {
            return Ok(());
        };
        let subject = format!("Low stock: {product_name}");
        let text = format!("{product_name} is down to {stock} units.");
        self.send(&alerts, &subject, &text).await
    }

    /// Send a multipart message with a text body and a minimal HTML twin.
    async fn send(&self, to: &str, subject: &str, text_body: &str) -> Result<(), EmailError> {
        let html_body = format!(
            "<html><body><pre style=\"font-family: inherit\">{}</pre></body></html>",
            text_body.replace('<', "&lt;").replace('>', "&gt;")
        );

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "email sent");
        Ok(())
    }
}
