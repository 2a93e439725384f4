//! Offers: pros bid on references, clients accept or decline.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use metrics::counter;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    CreateOfferRequest, Offer, OfferResponse, OfferStatus, ReferenceStatus, Role,
    UpdateStatusRequest, User,
};
use crate::AppState;

use super::auth::require_role;
use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::OFFERS_TOTAL;
use super::references::{ensure_reference_owner, find_reference};
use super::validation::{validate_price, validate_text};

async fn find_offer(state: &AppState, id: &str) -> Result<Offer, ApiError> {
    sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Offer not found"))
}

/// POST /api/pro/references/:id/offers
pub async fn create_offer(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(ref_id): Path<String>,
    Json(req): Json<CreateOfferRequest>,
) -> Result<(StatusCode, Json<OfferResponse>), ApiError> {
    require_role(&user, &[Role::Pro])?;

    let message = req.message.trim().to_string();
    let mut errors = ValidationErrorBuilder::new();
    if message.is_empty() {
        errors.add("message", "Message is required");
    }
    errors
        .check("message", validate_text(&Some(message.clone()), "Message", 1000))
        .check("pricePln", validate_price(req.price_pln));
    errors.finish()?;

    let reference = find_reference(&state, &ref_id).await?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO offers (id, ref_id, pro_id, message, price_pln, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&reference.id)
    .bind(&user.id)
    .bind(&message)
    .bind(req.price_pln)
    .bind(OfferStatus::Offer.as_str())
    .bind(&now)
    .execute(&state.db)
    .await?;

    counter!(OFFERS_TOTAL, "status" => OfferStatus::Offer.as_str()).increment(1);
    tracing::info!(offer_id = %id, reference_id = %reference.id, pro_id = %user.id, "Offer submitted");

    let offer = find_offer(&state, &id).await?;
    Ok((StatusCode::CREATED, Json(OfferResponse::from(offer))))
}

/// GET /api/pro/offers
pub async fn list_my_offers(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<OfferResponse>>, ApiError> {
    let offers = sqlx::query_as::<_, Offer>(
        "SELECT * FROM offers WHERE pro_id = ? ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(offers.into_iter().map(OfferResponse::from).collect()))
}

/// GET /api/client/references/:id/offers
pub async fn list_reference_offers(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(ref_id): Path<String>,
) -> Result<Json<Vec<OfferResponse>>, ApiError> {
    let reference = find_reference(&state, &ref_id).await?;
    ensure_reference_owner(&reference, &user)?;

    let offers = sqlx::query_as::<_, Offer>(
        "SELECT * FROM offers WHERE ref_id = ? ORDER BY created_at ASC",
    )
    .bind(&reference.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(offers.into_iter().map(OfferResponse::from).collect()))
}

/// PATCH /api/client/offers/:id
///
/// Status must be in the whitelist; any value may follow any other.
/// Accepting stamps `accepted_at` and marks the reference as matched.
pub async fn update_offer_status(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OfferResponse>, ApiError> {
    let status: OfferStatus = req
        .status
        .parse()
        .map_err(|e: String| ApiError::validation_field("status", e))?;

    let offer = find_offer(&state, &id).await?;
    let reference = find_reference(&state, &offer.ref_id).await?;
    ensure_reference_owner(&reference, &user)?;

    let mut tx = state.db.begin().await?;

    if status == OfferStatus::Accepted {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("UPDATE offers SET status = ?, accepted_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&now)
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE client_references SET status = ? WHERE id = ?")
            .bind(ReferenceStatus::Matched.as_str())
            .bind(&reference.id)
            .execute(&mut *tx)
            .await?;
    } else {
        sqlx::query("UPDATE offers SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    counter!(OFFERS_TOTAL, "status" => status.as_str()).increment(1);
    tracing::info!(
        offer_id = %id,
        reference_id = %reference.id,
        from = %offer.status,
        to = %status,
        "Offer status updated"
    );

    let offer = find_offer(&state, &id).await?;
    Ok(Json(OfferResponse::from(offer)))
}
