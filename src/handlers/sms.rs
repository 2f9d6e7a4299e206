use axum::extract::{RawForm, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use hmac::{Hmac, Mac};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;
use sha1::Sha1;

use crate::entities::booking;
use crate::error::{AppError, AppResult};
use crate::handlers::admin::{apply_decision, Decision, DecisionOutcome};
use crate::utils::booking_key::SUFFIX_LEN;
use crate::AppState;

#[derive(Deserialize)]
#[allow(dead_code)]
pub struct TwilioInboundForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

/// Parse an approval command: YES/NO (case-insensitive), optional whitespace,
/// then exactly four alphanumerics naming a booking-key suffix.
pub fn parse_command(body: &str) -> Option<(Decision, String)> {
    let text = body.trim().to_ascii_uppercase();

    let (decision, rest) = if let Some(rest) = text.strip_prefix("YES") {
        (Decision::Approve, rest)
    } else if let Some(rest) = text.strip_prefix("NO") {
        (Decision::Reject, rest)
    } else {
        return None;
    };

    let suffix = rest.trim();
    if suffix.len() != SUFFIX_LEN || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    Some((decision, suffix.to_string()))
}

fn validate_twilio_signature(
    auth_token: &str,
    signature: &str,
    url: &str,
    params: &[(String, String)],
) -> bool {
    // Twilio signs URL + params concatenated in sorted key order
    let mut data = url.to_string();
    let mut sorted_params: Vec<&(String, String)> = params.iter().collect();
    sorted_params.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, value) in sorted_params {
        data.push_str(key);
        data.push_str(value);
    }

    let mut mac = match Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(data.as_bytes());
    let result = mac.finalize().into_bytes();
    let expected = base64::engine::general_purpose::STANDARD.encode(result);

    expected == signature
}

/// Inbound SMS: an alternate admin approval channel.
pub async fn twilio_inbound(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawForm(raw): RawForm,
) -> AppResult<Response> {
    // Twilio signs over every POST parameter it sends (AccountSid, NumMedia
    // and the rest), so the full decoded set is kept for validation rather
    // than just the fields this handler reads.
    let params: Vec<(String, String)> = serde_urlencoded::from_bytes(&raw)
        .map_err(|_| AppError::BadRequest("Malformed form body".to_string()))?;
    let form: TwilioInboundForm = serde_urlencoded::from_bytes(&raw)
        .map_err(|e| AppError::BadRequest(format!("Invalid form body: {}", e)))?;

    let body = form.body.trim().to_string();
    tracing::info!(from = %form.from, body = %body, "incoming SMS");

    // Validate Twilio signature (skip if auth token is empty, dev mode)
    if !state.config.twilio_auth_token.is_empty() {
        let signature = headers
            .get("x-twilio-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("https");
        let host = headers
            .get("x-forwarded-host")
            .or_else(|| headers.get("host"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        let url = format!("{proto}://{host}/api/twilio/inbound");

        if !validate_twilio_signature(&state.config.twilio_auth_token, signature, &url, &params) {
            tracing::warn!("invalid Twilio signature");
            return Err(AppError::Forbidden("Invalid signature".to_string()));
        }
    }

    let Some((decision, suffix)) = parse_command(&body) else {
        return Ok(twiml_message(
            "Sorry, I didn't understand that. Reply YES XXXX to approve or NO XXXX to reject, \
             where XXXX is the last 4 characters of the booking key.",
        ));
    };

    // Keys are stored uppercase and the suffix was uppercased, so the match
    // is case-insensitive. Ambiguous suffixes resolve to the newest booking.
    let booking = booking::Entity::find()
        .filter(booking::Column::BookingKey.ends_with(&suffix))
        .order_by_desc(booking::Column::CreatedAt)
        .one(&state.db)
        .await?;

    let Some(booking) = booking else {
        return Ok(twiml_message(&format!(
            "No booking found matching {suffix}."
        )));
    };

    let key = booking.booking_key.clone();
    let reply = match apply_decision(&state, booking, decision).await {
        Ok(DecisionOutcome::Applied) => match decision {
            Decision::Approve => format!("Booking {key} approved."),
            Decision::Reject => format!("Booking {key} rejected."),
        },
        Ok(DecisionOutcome::AlreadyDecided) => {
            format!("Booking {key} was already processed.")
        }
        // A replayed command after the booking moved on is a no-op, not an
        // error, for the texter.
        Err(AppError::Conflict(msg)) => msg,
        Err(e) => return Err(e),
    };

    Ok(twiml_message(&reply))
}

fn twiml_message(text: &str) -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        format!("<Response><Message>{text}</Message></Response>"),
    )
        .into_response()
}
