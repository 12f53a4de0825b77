use axum::extract::{Extension, Json, Path};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::{RequestView, User};
use crate::entities::{NewTransportRequest, StatusUpdate};
use crate::error::Error;

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<NewTransportRequest>,
) -> Result<(StatusCode, Json<RequestView>), Error> {
    let request = api.create_request(user, params).await?;

    Ok((StatusCode::CREATED, request.into()))
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<RequestView>>, Error> {
    let requests = api.list_requests(user).await?;

    Ok(requests.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestView>, Error> {
    let request = api.find_request(user, id).await?;

    Ok(request.into())
}

pub async fn update_status(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<StatusUpdate>,
) -> Result<Json<RequestView>, Error> {
    let request = api.update_status(user, id, params).await?;

    Ok(request.into())
}

pub async fn reassign(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestView>, Error> {
    let request = api.reassign(user, id).await?;

    Ok(request.into())
}
