//! Response shaping applied before requests and bids leave the engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{Role, User};
use crate::entities::{Bid, StatusName, TransportRequest};
use crate::error::{forbidden_error, Error};

/// Boundary representation of a transport request. `budget` is absent (not
/// null) for driver viewers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RequestView {
    pub id: Uuid,
    pub client_id: Uuid,
    pub pickup_location: String,
    pub delivery_location: String,
    pub pickup_date: DateTime<Utc>,
    pub delivery_date: DateTime<Utc>,
    pub item_description: String,
    pub weight: Decimal,
    pub dimensions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Decimal>,
    pub status: StatusName,
    pub assigned_driver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn shape_request(request: TransportRequest, viewer: &User) -> RequestView {
    let budget = match viewer.role {
        Role::Driver => None,
        Role::Client | Role::Admin => Some(request.budget),
    };

    RequestView {
        id: request.id,
        client_id: request.client_id,
        assigned_driver_id: request.assigned_driver_id(),
        status: request.status.kind(),
        pickup_location: request.pickup_location,
        delivery_location: request.delivery_location,
        pickup_date: request.pickup_date,
        delivery_date: request.delivery_date,
        item_description: request.item_description,
        weight: request.weight,
        dimensions: request.dimensions,
        budget,
        created_at: request.created_at,
        updated_at: request.updated_at,
    }
}

/// Whether a request belongs in `viewer`'s listing.
pub fn is_listed_for(request: &TransportRequest, viewer: &User) -> bool {
    match viewer.role {
        Role::Admin => true,
        Role::Client => request.client_id == viewer.id,
        Role::Driver => request.is_pending(),
    }
}

pub fn shape_requests(requests: Vec<TransportRequest>, viewer: &User) -> Vec<RequestView> {
    requests
        .into_iter()
        .filter(|request| is_listed_for(request, viewer))
        .map(|request| shape_request(request, viewer))
        .collect()
}

/// Bid collections of a request are never shown to drivers; they only see
/// their own bids through the driver listing.
pub fn shape_request_bids(bids: Vec<Bid>, viewer: &User) -> Result<Vec<Bid>, Error> {
    match viewer.role {
        Role::Driver => Err(forbidden_error()),
        Role::Client | Role::Admin => Ok(bids),
    }
}
