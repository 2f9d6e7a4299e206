use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::services::notifications::{dispatch, templates};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
}

/// Contact form: forwarded to the admin address, best-effort.
pub async fn contact(
    State(state): State<AppState>,
    Json(payload): Json<ContactRequest>,
) -> AppResult<Json<ContactResponse>> {
    let (Some(name), Some(email), Some(message)) =
        (payload.name, payload.email, payload.message)
    else {
        return Err(AppError::BadRequest(
            "name, email and message are required".to_string(),
        ));
    };

    let rendered = templates::render_contact(
        &name,
        &email,
        payload.phone.as_deref().unwrap_or(""),
        payload.subject.as_deref().unwrap_or("(no subject)"),
        &message,
    );

    dispatch(state.email.as_ref(), &state.config.admin_email, &rendered).await;

    Ok(Json(ContactResponse { success: true }))
}
