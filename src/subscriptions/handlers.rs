use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{
    CreateSubscriptionRequest, CreatedResponse, MessageResponse, SpendingSummary,
    SubscriptionListResponse, UpdateSubscriptionRequest,
};
use super::repo::{self, NewSubscription, SubscriptionChanges};
use crate::auth::repo::User;
use crate::auth::AuthSession;
use crate::catalog;
use crate::error::AppError;
use crate::extract::types::BillingCycle;
use crate::state::AppState;

const STATUSES: [&str; 3] = ["active", "paused", "cancelled"];
const SOURCES: [&str; 3] = ["manual", "gmail", "card_statement"];

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route(
            "/subscriptions/:id",
            delete(delete_subscription).patch(update_subscription),
        )
}

#[instrument(skip(state, session), fields(email = %session.email))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<SubscriptionListResponse>, AppError> {
    let user = User::find_or_create(&state.db, &session).await?;
    let subscriptions = repo::list_by_user(&state.db, user.id).await?;
    let summary = SpendingSummary::compute(&subscriptions);
    Ok(Json(SubscriptionListResponse {
        subscriptions,
        summary,
    }))
}

#[instrument(skip(state, session, payload), fields(email = %session.email))]
pub async fn create_subscription(
    State(state): State<AppState>,
    session: AuthSession,
    Json(payload): Json<CreateSubscriptionRequest>,
) -> Result<Json<CreatedResponse>, AppError> {
    let user = User::find_or_create(&state.db, &session).await?;

    let custom_name = payload
        .custom_name
        .or(payload.service_name)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::Validation("custom_name is required".into()))?;

    let amount = payload.amount.unwrap_or(0);
    if amount < 0 {
        return Err(AppError::Validation("amount must not be negative".into()));
    }
    let billing_cycle = validate_cycle(payload.billing_cycle)?.unwrap_or_else(|| "monthly".into());
    let billing_day = validate_billing_day(payload.billing_day)?;
    let status = validate_one_of(payload.status, &STATUSES, "status")?
        .unwrap_or_else(|| "active".into());
    let source = validate_one_of(payload.source, &SOURCES, "source")?
        .unwrap_or_else(|| "manual".into());

    // When the caller didn't pin a catalog service, try to match one by name.
    let service_id = match payload.service_id {
        Some(id) => Some(id),
        None => catalog::repo::find_by_name(&state.db, &custom_name)
            .await?
            .map(|entry| entry.id),
    };

    let new = NewSubscription {
        service_id,
        custom_name,
        amount,
        currency: payload.currency.unwrap_or_else(|| "KRW".into()),
        billing_cycle,
        billing_day,
        next_billing_date: payload.next_billing_date,
        status,
        source,
        confidence: payload.confidence.unwrap_or(1.0).clamp(0.0, 1.0),
        category: payload.category.unwrap_or_else(|| "other".into()),
        notes: payload.notes,
    };

    let subscription = repo::insert(&state.db, user.id, &new).await?;
    info!(user_id = %user.id, subscription_id = %subscription.id, "subscription created");
    Ok(Json(CreatedResponse {
        id: subscription.id,
        message: "Subscription added.".into(),
    }))
}

#[instrument(skip(state, session, payload), fields(email = %session.email))]
pub async fn update_subscription(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSubscriptionRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = User::find_by_email(&state.db, &session.email)
        .await?
        .ok_or(AppError::NotFound("subscription"))?;

    if let Some(amount) = payload.amount {
        if amount < 0 {
            return Err(AppError::Validation("amount must not be negative".into()));
        }
    }
    let changes = SubscriptionChanges {
        custom_name: payload.custom_name,
        amount: payload.amount,
        billing_cycle: validate_cycle(payload.billing_cycle)?,
        billing_day: validate_billing_day(payload.billing_day)?,
        next_billing_date: payload.next_billing_date,
        status: validate_one_of(payload.status, &STATUSES, "status")?,
        category: payload.category,
        notes: payload.notes,
    };

    repo::update_partial(&state.db, user.id, id, &changes)
        .await?
        .ok_or(AppError::NotFound("subscription"))?;

    info!(user_id = %user.id, subscription_id = %id, "subscription updated");
    Ok(Json(MessageResponse {
        message: "Subscription updated.".into(),
    }))
}

#[instrument(skip(state, session), fields(email = %session.email))]
pub async fn delete_subscription(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = User::find_by_email(&state.db, &session.email)
        .await?
        .ok_or(AppError::NotFound("subscription"))?;

    if !repo::delete(&state.db, user.id, id).await? {
        return Err(AppError::NotFound("subscription"));
    }
    info!(user_id = %user.id, subscription_id = %id, "subscription deleted");
    Ok(Json(MessageResponse {
        message: "Subscription deleted.".into(),
    }))
}

fn validate_cycle(cycle: Option<String>) -> Result<Option<String>, AppError> {
    match cycle {
        None => Ok(None),
        Some(raw) => BillingCycle::parse(&raw)
            .map(|c| Some(c.as_str().to_string()))
            .ok_or_else(|| {
                AppError::Validation(format!("invalid billing_cycle: {raw}"))
            }),
    }
}

fn validate_billing_day(day: Option<i16>) -> Result<Option<i16>, AppError> {
    match day {
        None => Ok(None),
        Some(d) if (1..=31).contains(&d) => Ok(Some(d)),
        Some(d) => Err(AppError::Validation(format!(
            "billing_day must be between 1 and 31, got {d}"
        ))),
    }
}

fn validate_one_of(
    value: Option<String>,
    allowed: &[&str],
    field: &str,
) -> Result<Option<String>, AppError> {
    match value {
        None => Ok(None),
        Some(v) if allowed.contains(&v.as_str()) => Ok(Some(v)),
        Some(v) => Err(AppError::Validation(format!("invalid {field}: {v}"))),
    }
}
