use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{RequestView, User};
use crate::entities::{
    Bid, GpsTracking, LocationSample, NewBid, NewMember, NewTransportRequest, Profile,
    StatusUpdate,
};
use crate::error::Error;
use crate::hub::{ConnectionId, TrackingHub};

#[async_trait]
pub trait MemberAPI {
    async fn create_member(&self, input: NewMember) -> Result<Profile, Error>;
    async fn find_member(&self, user: User, id: Uuid) -> Result<Profile, Error>;
}

#[async_trait]
pub trait RequestAPI {
    async fn create_request(
        &self,
        user: User,
        input: NewTransportRequest,
    ) -> Result<RequestView, Error>;
    async fn find_request(&self, user: User, id: Uuid) -> Result<RequestView, Error>;
    async fn list_requests(&self, user: User) -> Result<Vec<RequestView>, Error>;
    async fn update_status(
        &self,
        user: User,
        id: Uuid,
        update: StatusUpdate,
    ) -> Result<RequestView, Error>;
    async fn reassign(&self, user: User, id: Uuid) -> Result<RequestView, Error>;
}

#[async_trait]
pub trait BidAPI {
    async fn submit_bid(&self, user: User, request_id: Uuid, input: NewBid) -> Result<Bid, Error>;
    async fn list_bids_for_request(&self, user: User, request_id: Uuid)
        -> Result<Vec<Bid>, Error>;
    async fn list_bids_for_driver(&self, user: User, driver_id: Uuid) -> Result<Vec<Bid>, Error>;
    async fn accept_bid(
        &self,
        user: User,
        request_id: Uuid,
        driver_id: Uuid,
    ) -> Result<RequestView, Error>;
}

#[async_trait]
pub trait TrackingAPI {
    async fn record_location(
        &self,
        user: User,
        request_id: Uuid,
        sample: LocationSample,
    ) -> Result<GpsTracking, Error>;
    async fn latest_location(&self, user: User, request_id: Uuid) -> Result<GpsTracking, Error>;
    async fn location_history(
        &self,
        user: User,
        request_id: Uuid,
    ) -> Result<Vec<GpsTracking>, Error>;
    async fn watch_request(
        &self,
        user: User,
        connection_id: ConnectionId,
        request_id: Uuid,
    ) -> Result<(), Error>;

    fn hub(&self) -> &TrackingHub;
}

pub trait API: MemberAPI + RequestAPI + BidAPI + TrackingAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
