//! Payment handlers

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use core_kernel::{PaymentId, UserId};

use crate::auth::{AuthUser, Role, STAFF};
use crate::dto::payment::*;
use crate::error::ApiError;
use crate::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::AppState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Creates a payment; tenants always pay for themselves
pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentResponse>>), ApiError> {
    let mut input = request.into_input()?;
    if user.is_tenant_only() {
        input.payer_id = Some(user.id);
    }

    let payment = state.service.create(input, user.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            "Payment created successfully",
            PaymentResponse::from(payment),
        )),
    ))
}

/// Lists payments; tenants only see their own
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(params): ApiQuery<ListPaymentsQuery>,
) -> ApiResult<PaymentListResponse> {
    if params.include_deleted {
        user.require_any(&[Role::Admin, Role::Agent])?;
    }
    let mut query = params.into_query()?;
    if user.is_tenant_only() {
        query.filter.payer_id = Some(user.id);
    }

    let page = state.service.find_many(&query).await?;
    Ok(Json(ApiResponse::new(
        "Payments retrieved successfully",
        PaymentListResponse::from(page),
    )))
}

pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<DashboardResponse> {
    user.require_any(STAFF)?;
    let stats = state.service.dashboard_stats(Utc::now()).await?;
    Ok(Json(ApiResponse::new(
        "Dashboard statistics retrieved successfully",
        DashboardResponse::from(stats),
    )))
}

/// Creates a gateway intent not yet tied to a stored payment
pub async fn create_payment_intent(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<PaymentIntentRequest>,
) -> ApiResult<PaymentIntentResponse> {
    let intent = state
        .service
        .create_gateway_intent(request.into_input()?, user.id)
        .await?;
    Ok(Json(ApiResponse::new(
        "Payment intent created successfully",
        PaymentIntentResponse::from(intent),
    )))
}

/// Runs the recurring batch now instead of waiting for the scheduler
pub async fn run_recurring(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<RecurringRunResponse> {
    user.require_any(&[Role::Admin])?;
    let report = state.service.process_recurring_payments(Utc::now()).await?;
    info!(
        actor = %user.id,
        created = report.created.len(),
        failed = report.failed.len(),
        "Recurring run triggered manually"
    );
    Ok(Json(ApiResponse::new(
        "Recurring payments processed",
        RecurringRunResponse::from(report),
    )))
}

pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<PaymentDetailsResponse> {
    let details = state.service.find_by_id(PaymentId::from_uuid(id)).await?;
    ensure_owner(&user, details.payment.payer_id)?;
    Ok(Json(ApiResponse::new(
        "Payment retrieved successfully",
        PaymentDetailsResponse::from(details),
    )))
}

pub async fn update_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdatePaymentRequest>,
) -> ApiResult<PaymentResponse> {
    user.require_any(STAFF)?;
    let payment = state
        .service
        .update(PaymentId::from_uuid(id), request.into(), user.id)
        .await?;
    Ok(Json(ApiResponse::new(
        "Payment updated successfully",
        PaymentResponse::from(payment),
    )))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<PaymentResponse> {
    user.require_any(&[Role::Admin, Role::Agent])?;
    let payment = state.service.delete(PaymentId::from_uuid(id), user.id).await?;
    Ok(Json(ApiResponse::new(
        "Payment deleted successfully",
        PaymentResponse::from(payment),
    )))
}

/// Settles a payment; tenants may only settle their own
pub async fn process_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<ProcessPaymentRequest>,
) -> ApiResult<PaymentResponse> {
    let id = PaymentId::from_uuid(id);
    if user.is_tenant_only() {
        let payment = state.service.get(id).await?;
        ensure_owner(&user, payment.payer_id)?;
    }

    let payment = state.service.process(id, request.into(), user.id).await?;
    Ok(Json(ApiResponse::new(
        "Payment processed successfully",
        PaymentResponse::from(payment),
    )))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<RefundPaymentRequest>,
) -> ApiResult<PaymentResponse> {
    user.require_any(STAFF)?;
    let payment = state
        .service
        .refund(PaymentId::from_uuid(id), request.into(), user.id)
        .await?;
    Ok(Json(ApiResponse::new(
        "Payment refunded successfully",
        PaymentResponse::from(payment),
    )))
}

fn ensure_owner(user: &AuthUser, payer_id: UserId) -> Result<(), ApiError> {
    if user.is_tenant_only() && user.id != payer_id {
        return Err(ApiError::Forbidden(
            "You can only access your own payments".to_string(),
        ));
    }
    Ok(())
}
