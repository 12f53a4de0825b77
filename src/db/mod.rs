mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    auth::{Role, User},
    entities::{Bid, GpsTracking, Ledger, Member, TransportRequest},
    error::Error,
};

/// Which slice of the request table a listing reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestScope {
    All,
    OwnedBy(Uuid),
    Open,
}

impl From<&User> for RequestScope {
    fn from(user: &User) -> Self {
        match user.role {
            Role::Admin => Self::All,
            Role::Client => Self::OwnedBy(user.id),
            Role::Driver => Self::Open,
        }
    }
}

/// Durable state behind the engine. Every multi-row change goes through
/// `modify_request`, which must apply the closure's edits to the request and
/// its bids all-or-nothing and serialize concurrent callers on the same request.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Fails with a validation error when the email is already registered.
    async fn insert_member(&self, member: &Member) -> Result<(), Error>;
    async fn find_member(&self, id: Uuid) -> Result<Option<Member>, Error>;

    async fn insert_request(&self, request: &TransportRequest) -> Result<(), Error>;
    async fn find_request(&self, id: Uuid) -> Result<Option<TransportRequest>, Error>;
    /// Newest first.
    async fn list_requests(&self, scope: RequestScope) -> Result<Vec<TransportRequest>, Error>;

    /// Locks the request and its bids, runs `f`, and persists the ledger only if
    /// `f` succeeds. Fails with not found for an unknown request.
    async fn modify_request<T, F>(&self, id: Uuid, f: F) -> Result<T, Error>
    where
        T: Send,
        F: FnOnce(&mut Ledger) -> Result<T, Error> + Send;

    /// Newest first, ties by ascending id.
    async fn list_bids_for_request(&self, request_id: Uuid) -> Result<Vec<Bid>, Error>;
    async fn list_bids_for_driver(&self, driver_id: Uuid) -> Result<Vec<Bid>, Error>;

    async fn append_tracking(&self, sample: &GpsTracking) -> Result<(), Error>;
    async fn latest_tracking(&self, request_id: Uuid) -> Result<Option<GpsTracking>, Error>;
    /// Newest first by timestamp; equal timestamps keep the later append first.
    async fn tracking_history(&self, request_id: Uuid) -> Result<Vec<GpsTracking>, Error>;
}
