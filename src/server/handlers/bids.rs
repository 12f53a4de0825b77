use axum::extract::{Extension, Json, Path};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::{RequestView, User};
use crate::entities::{Bid, NewBid};
use crate::error::Error;

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(request_id): Path<Uuid>,
    Json(params): Json<NewBid>,
) -> Result<(StatusCode, Json<Bid>), Error> {
    let bid = api.submit_bid(user, request_id, params).await?;

    Ok((StatusCode::CREATED, bid.into()))
}

pub async fn list_for_request(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Vec<Bid>>, Error> {
    let bids = api.list_bids_for_request(user, request_id).await?;

    Ok(bids.into())
}

pub async fn list_for_driver(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(driver_id): Path<Uuid>,
) -> Result<Json<Vec<Bid>>, Error> {
    let bids = api.list_bids_for_driver(user, driver_id).await?;

    Ok(bids.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path((request_id, driver_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RequestView>, Error> {
    let request = api.accept_bid(user, request_id, driver_id).await?;

    Ok(request.into())
}
