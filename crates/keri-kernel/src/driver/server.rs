//! HTTP surface of a driver process.
//!
//! Exposes any [`Controller`] over loopback. Failures are answered with an
//! [`ErrorBody`] and the status of the error's code.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use keri_kernel_core::{Ed25519PublicKey, GroupEventRequest, Prefix};
use tracing::{error, warn};

use super::types::*;
use crate::controller::Controller;
use crate::error::KernelError;

/// Shared application state.
struct AppState {
    controller: Arc<dyn Controller>,
    started: Instant,
}

type Shared = State<Arc<AppState>>;

/// Build the driver router.
pub fn router(controller: Arc<dyn Controller>) -> Router {
    let state = Arc::new(AppState {
        controller,
        started: Instant::now(),
    });

    Router::new()
        .route("/status", get(status))
        .route("/inception", post(inception))
        .route("/rotation", post(rotation))
        .route("/sign", post(sign))
        .route("/verify", post(verify))
        .route("/kel", get(kel))
        .route("/state", get(state_of))
        .route("/generate-multisig-event", post(multisig))
        .route("/identities", post(create_identity))
        .route("/identities/rotate", post(rotate_identity))
        .with_state(state)
}

// ==================== Error Handling ====================

pub struct ApiError(pub KernelError);

impl From<KernelError> for ApiError {
    fn from(e: KernelError) -> Self {
        ApiError(e)
    }
}

impl From<keri_kernel_core::CoreError> for ApiError {
    fn from(e: keri_kernel_core::CoreError) -> Self {
        ApiError(e.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError(KernelError::InvalidRequest(e.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError(KernelError::InvalidRequest(e.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(?code, error = %self.0, "driver request failed");
        } else {
            warn!(?code, error = %self.0, "driver request rejected");
        }
        (status, Json(ErrorBody::from_error(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn prefix(value: &str) -> Result<Prefix, ApiError> {
    Ok(Prefix::parse(value)?)
}

fn public_key(value: &str) -> Result<Ed25519PublicKey, ApiError> {
    Ok(Ed25519PublicKey::parse(value)?)
}

// ==================== Handlers ====================

/// GET /status
async fn status(State(app): Shared) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: STATUS_ACTIVE.to_string(),
        driver: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: app.started.elapsed().as_secs(),
    })
}

/// POST /inception
async fn inception(
    State(app): Shared,
    payload: Result<Json<InceptionRequest>, JsonRejection>,
) -> ApiResult<InceptionResponse> {
    let Json(req) = payload?;
    let signing = public_key(&req.public_key)?;
    let next = public_key(&req.next_public_key)?;

    let inception = app.controller.incept(&signing, &next).await?;
    Ok(Json(InceptionResponse {
        identifier: inception.identifier.to_string(),
        public_key: signing.to_encoded().to_string(),
        next_key_digest: inception.event.next_digest().map(ToString::to_string),
        event: inception.event,
    }))
}

/// POST /rotation
async fn rotation(
    State(app): Shared,
    payload: Result<Json<RotationRequest>, JsonRejection>,
) -> ApiResult<RotationResponse> {
    let Json(req) = payload?;
    let identifier = prefix(&req.identifier)?;
    let signing = public_key(&req.new_public_key)?;
    let next = public_key(&req.new_next_public_key)?;

    let rotation = app.controller.rotate(&identifier, &signing, &next).await?;
    Ok(Json(RotationResponse {
        identifier: identifier.to_string(),
        event: rotation.event,
        sequence_number: rotation.sn,
    }))
}

/// POST /sign
async fn sign(
    State(app): Shared,
    payload: Result<Json<SignRequest>, JsonRejection>,
) -> ApiResult<SignResponse> {
    let Json(req) = payload?;
    let identifier = prefix(&req.identifier)?;
    let data = decode_b64("data", &req.data)?;

    let signature = app.controller.sign(&identifier, &data).await?;
    let state = app.controller.state(&identifier).await?;
    Ok(Json(SignResponse {
        signature: encode_b64(&signature.0),
        public_key: state.current_public_key.to_string(),
    }))
}

/// POST /verify
async fn verify(
    State(app): Shared,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<VerifyResponse> {
    let Json(req) = payload?;
    let data = decode_b64("data", &req.data)?;
    // An undecodable signature is just an invalid one.
    let signature = decode_b64("signature", &req.signature).unwrap_or_default();

    let valid = app
        .controller
        .verify(&data, &signature, &req.public_key)
        .await?;
    Ok(Json(VerifyResponse {
        valid,
        public_key: req.public_key,
    }))
}

/// GET /kel?identifier=
async fn kel(
    State(app): Shared,
    query: Result<Query<IdentifierQuery>, QueryRejection>,
) -> ApiResult<KelResponse> {
    let Query(q) = query?;
    let identifier = prefix(&q.identifier)?;

    let kel = app.controller.kel(&identifier).await?;
    let event_count = kel.len() as u64;
    Ok(Json(KelResponse {
        identifier: identifier.to_string(),
        sequence_number: event_count.saturating_sub(1),
        event_count,
        kel,
    }))
}

/// GET /state?identifier=
async fn state_of(
    State(app): Shared,
    query: Result<Query<IdentifierQuery>, QueryRejection>,
) -> ApiResult<StateResponse> {
    let Query(q) = query?;
    let identifier = prefix(&q.identifier)?;
    Ok(Json(app.controller.state(&identifier).await?))
}

/// POST /generate-multisig-event
async fn multisig(
    State(app): Shared,
    payload: Result<Json<GroupEventRequest>, JsonRejection>,
) -> ApiResult<MultisigResponse> {
    let Json(req) = payload?;
    let event = app.controller.multisig(&req).await?;
    let raw = event.to_bytes()?;
    Ok(Json(MultisigResponse {
        raw_bytes_b64: encode_b64(&raw),
        said: event.said().to_string(),
        pre: event.prefix().to_string(),
        event_type: event.event_type().to_string(),
        size: raw.len(),
        members: event.members,
    }))
}

/// POST /identities
async fn create_identity(State(app): Shared) -> ApiResult<StateResponse> {
    Ok(Json(app.controller.create_identity().await?))
}

/// POST /identities/rotate
async fn rotate_identity(
    State(app): Shared,
    payload: Result<Json<IdentityRotateRequest>, JsonRejection>,
) -> ApiResult<StateResponse> {
    let Json(req) = payload?;
    let identifier = prefix(&req.identifier)?;
    Ok(Json(app.controller.rotate_identity(&identifier).await?))
}
