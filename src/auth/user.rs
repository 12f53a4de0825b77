use std::str::FromStr;

use async_trait::async_trait;
use axum::extract::{FromRequest, RequestParts};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{unauthenticated_error, Error};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated principal an operation runs on behalf of. The upstream
/// auth layer is trusted to have verified it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Driver,
    Admin,
}

impl Role {
    pub fn name(&self) -> String {
        match self {
            Self::Client => "client".into(),
            Self::Driver => "driver".into(),
            Self::Admin => "admin".into(),
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Self::Client),
            "driver" => Ok(Self::Driver),
            "admin" => Ok(Self::Admin),
            _ => Err(unauthenticated_error()),
        }
    }
}

impl User {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }
}

impl PolarClass for User {
    fn get_polar_class_builder() -> oso::ClassBuilder<User> {
        oso::Class::builder()
            .name("User")
            .add_attribute_getter("id", |recv: &User| recv.id.to_string())
            .add_attribute_getter("role", |recv: &User| recv.role.name())
    }

    fn get_polar_class() -> oso::Class {
        let builder = User::get_polar_class_builder();
        builder.build()
    }
}

#[async_trait]
impl<B> FromRequest<B> for User
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let headers = req.headers();

        let id = headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| unauthenticated_error())?;

        let role = headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| unauthenticated_error())?
            .parse::<Role>()?;

        Ok(User { id, role })
    }
}

#[test]
fn role_round_trips_through_its_name() {
    for role in [Role::Client, Role::Driver, Role::Admin] {
        assert_eq!(role.name().parse::<Role>().unwrap(), role);
    }

    assert!("dispatcher".parse::<Role>().is_err());
}

#[test]
fn principal_is_read_from_headers() {
    use axum::http::Request;
    use tokio_test::block_on;

    let id = Uuid::new_v4();
    let request = Request::builder()
        .header(USER_ID_HEADER, id.to_string())
        .header(USER_ROLE_HEADER, "driver")
        .body(())
        .unwrap();

    let mut parts = RequestParts::new(request);
    let user = block_on(User::from_request(&mut parts)).unwrap();

    assert_eq!(user, User::new(id, Role::Driver));

    let request = Request::builder()
        .header(USER_ROLE_HEADER, "driver")
        .body(())
        .unwrap();

    let mut parts = RequestParts::new(request);
    let err = block_on(User::from_request(&mut parts)).unwrap_err();

    assert_eq!(err, unauthenticated_error());
}
