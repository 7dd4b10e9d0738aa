//! Outbox worker: drains pending side-effect events in the background.
//!
//! Each event is dispatched to the email service and the in-app
//! notification store. A failed dispatch records the error on the row and
//! is retried on a later sweep, up to the repository's attempt cap; a
//! dispatch failure never fails the request that produced the event.

use std::time::Duration;

use crate::db::users::UserRepository;
use crate::db::{OutboxRepository, RepositoryError};
use crate::models::OutboxEvent;
use crate::services::notifications::NotificationService;
use crate::state::AppState;

/// How often the worker sweeps for pending events.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Events claimed per sweep.
const BATCH_SIZE: i64 = 50;

/// Spawn the background drain loop.
pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match drain(&state).await {
                Ok(0) => {}
                Ok(count) => tracing::debug!(count, "outbox events dispatched"),
                Err(e) => tracing::warn!(error = %e, "outbox sweep failed"),
            }
        }
    })
}

/// Drain one batch of pending events. Returns how many were attempted.
///
/// # Errors
///
/// Returns `RepositoryError` only for failures reading/updating the outbox
/// itself; per-event dispatch failures are recorded on their rows.
pub async fn drain(state: &AppState) -> Result<usize, RepositoryError> {
    let outbox = OutboxRepository::new(state.pool());
    let batch = outbox.claim_batch(BATCH_SIZE).await?;
    let attempted = batch.len();

    for pending in batch {
        match dispatch(state, &pending.event).await {
            Ok(()) => outbox.mark_processed(pending.id).await?,
            Err(error) => {
                tracing::warn!(
                    event = pending.event.kind(),
                    attempts = pending.attempts + 1,
                    %error,
                    "outbox dispatch failed"
                );
                outbox.mark_failed(pending.id, &error).await?;
            }
        }
    }

    Ok(attempted)
}

/// Deliver one event to email + in-app notifications.
async fn dispatch(state: &AppState, event: &OutboxEvent) -> Result<(), String> {
    let notifications = NotificationService::new(state.pool());
    let users = UserRepository::new(state.pool());

    match event {
        OutboxEvent::OrderPlaced {
            order_id,
            order_number,
            user_id,
            total,
        } => {
            notifications
                .order_placed(*user_id, order_number, *order_id)
                .await
                .map_err(|e| e.to_string())?;

            if let Some(mailer) = state.mailer() {
                let user = users
                    .get_by_id(*user_id)
                    .await
                    .map_err(|e| e.to_string())?
                    .ok_or("order owner no longer exists")?;
                mailer
                    .send_order_confirmation(user.email.as_str(), &user.name, order_number, *total)
                    .await
                    .map_err(|e| e.to_string())?;
                mailer
                    .send_new_order_alert(order_number, *total)
                    .await
                    .map_err(|e| e.to_string())?;
            }
        }
        OutboxEvent::OrderPaid {
            order_id,
            order_number,
            user_id,
            total,
        } => {
            notifications
                .payment_success(*user_id, *total, *order_id)
                .await
                .map_err(|e| e.to_string())?;

            if let Some(mailer) = state.mailer() {
                let user = users
                    .get_by_id(*user_id)
                    .await
                    .map_err(|e| e.to_string())?
                    .ok_or("order owner no longer exists")?;
                mailer
                    .send_payment_received(user.email.as_str(), &user.name, order_number, *total)
                    .await
                    .map_err(|e| e.to_string())?;
            }
        }
        OutboxEvent::OrderShipped {
            order_id,
            order_number,
            user_id,
            tracking_number,
        } => {
            notifications
                .order_shipped(*user_id, order_number, *order_id, tracking_number)
                .await
                .map_err(|e| e.to_string())?;

            if let Some(mailer) = state.mailer() {
                let user = users
                    .get_by_id(*user_id)
                    .await
                    .map_err(|e| e.to_string())?
                    .ok_or("order owner no longer exists")?;
                mailer
                    .send_order_shipped(
                        user.email.as_str(),
                        &user.name,
                        order_number,
                        tracking_number,
                    )
                    .await
                    .map_err(|e| e.to_string())?;
            }
        }
        OutboxEvent::LowStock {
            product_id,
            name,
            stock,
        } => {
            notifications
                .low_stock(*product_id, name, *stock)
                .await
                .map_err(|e| e.to_string())?;

            if let Some(mailer) = state.mailer() {
                mailer
                    .send_low_stock_alert(name, *stock)
                    .await
                    .map_err(|e| e.to_string())?;
            }
        }
    }

    Ok(())
}
