use axum::extract::{Extension, Json, Path};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::User;
use crate::entities::{GpsTracking, LocationSample};
use crate::error::Error;

pub async fn record(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(request_id): Path<Uuid>,
    Json(params): Json<LocationSample>,
) -> Result<(StatusCode, Json<GpsTracking>), Error> {
    let tracking = api.record_location(user, request_id, params).await?;

    Ok((StatusCode::CREATED, tracking.into()))
}

pub async fn latest(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(request_id): Path<Uuid>,
) -> Result<Json<GpsTracking>, Error> {
    let tracking = api.latest_location(user, request_id).await?;

    Ok(tracking.into())
}

pub async fn history(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Vec<GpsTracking>>, Error> {
    let history = api.location_history(user, request_id).await?;

    Ok(history.into())
}
