//! Delivery proof images
//!
//! `GET /api/proofs/{reference}` - admins and riders only.

use axum::{
    Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
};
use http::header;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::AppResult;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/proofs/{reference}", get(serve_proof))
}

async fn serve_proof(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(reference): Path<String>,
) -> AppResult<Response> {
    let content = state.manager().read_proof(&user, &reference).await?;
    let mime = mime_guess::from_path(&reference).first_or(mime_guess::mime::IMAGE_JPEG);

    tracing::debug!(reference = %reference, size = content.len(), "Serving proof");

    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CACHE_CONTROL, "private, max-age=86400".to_string()),
        ],
        content,
    )
        .into_response())
}
