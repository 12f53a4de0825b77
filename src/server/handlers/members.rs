use axum::extract::{Extension, Json, Path};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::User;
use crate::entities::{NewMember, Profile};
use crate::error::Error;

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<NewMember>,
) -> Result<(StatusCode, Json<Profile>), Error> {
    let profile = api.create_member(params).await?;

    Ok((StatusCode::CREATED, profile.into()))
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Profile>, Error> {
    let profile = api.find_member(user, id).await?;

    Ok(profile.into())
}
