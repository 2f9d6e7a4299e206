pub mod resend;
pub mod templates;

use async_trait::async_trait;
use sea_orm::EntityTrait;

use crate::entities::{booking, car, user};
use crate::services::messaging;
use crate::AppState;
use templates::{BookingEmail, BookingEmailContext, RenderedEmail};

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

/// Used when no provider key is configured: bookings must keep progressing
/// with notifications entirely disabled.
pub struct DisabledEmailProvider;

#[async_trait]
impl EmailProvider for DisabledEmailProvider {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> anyhow::Result<()> {
        tracing::debug!(to, subject, "email disabled, dropping notification");
        Ok(())
    }
}

/// Best-effort dispatch: a notification failure is logged and never fails the
/// transition that triggered it.
pub async fn dispatch(provider: &dyn EmailProvider, to: &str, email: &RenderedEmail) {
    if let Err(e) = provider.send(to, &email.subject, &email.html).await {
        tracing::warn!(error = %e, to, subject = %email.subject, "failed to send notification email");
    }
}

/// Enrich a booking with its car and customer and send the given lifecycle
/// emails, best-effort. Admin notices go to the configured admin address; the
/// deposit notice additionally sends the admin an SMS approval prompt.
pub async fn notify_booking(state: &AppState, kinds: &[BookingEmail], booking: &booking::Model) {
    let car = car::Entity::find_by_id(booking.car_id).one(&state.db).await;
    let customer = user::Entity::find_by_id(booking.user_id).one(&state.db).await;

    let (Ok(Some(car)), Ok(Some(customer))) = (car, customer) else {
        tracing::warn!(
            booking_id = %booking.id,
            "skipping notifications: car or customer lookup failed"
        );
        return;
    };

    let ctx = BookingEmailContext {
        booking,
        car: &car,
        customer: &customer,
    };

    for kind in kinds {
        let to = match kind {
            BookingEmail::AdminDepositNotice | BookingEmail::AdminFinalNotice => {
                state.config.admin_email.as_str()
            }
            _ => customer.email.as_str(),
        };
        dispatch(state.email.as_ref(), to, &templates::render(*kind, &ctx)).await;

        if *kind == BookingEmail::AdminDepositNotice {
            messaging::dispatch(
                state.sms.as_ref(),
                &state.config.admin_phone,
                &templates::admin_sms_prompt(&ctx),
            )
            .await;
        }
    }
}
