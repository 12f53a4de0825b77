use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::BidAPI,
    auth::{
        policy::{shape_request, shape_request_bids},
        RequestView, Role, User,
    },
    db::Store,
    entities::{Bid, NewBid},
    error::{forbidden_error, Error},
};

#[async_trait]
impl<S: Store> BidAPI for Engine<S> {
    #[tracing::instrument(skip(self, input))]
    async fn submit_bid(&self, user: User, request_id: Uuid, input: NewBid) -> Result<Bid, Error> {
        if !user.is_driver() {
            return Err(forbidden_error());
        }

        input.validate()?;

        let bid = self
            .store
            .modify_request(request_id, |ledger| {
                self.authorize(user.clone(), "submit_bid", ledger.request.clone())?;
                ledger.place_bid(user.id, input)
            })
            .await?;

        tracing::info!(bid_id = %bid.id, "bid submitted");

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn list_bids_for_request(
        &self,
        user: User,
        request_id: Uuid,
    ) -> Result<Vec<Bid>, Error> {
        let request = self.fetch_request(request_id).await?;

        self.authorize(user.clone(), "list_bids", request)?;

        let bids = self.store.list_bids_for_request(request_id).await?;

        shape_request_bids(bids, &user)
    }

    #[tracing::instrument(skip(self))]
    async fn list_bids_for_driver(&self, user: User, driver_id: Uuid) -> Result<Vec<Bid>, Error> {
        self.authorize(user, "list_bids", User::new(driver_id, Role::Driver))?;

        self.store.list_bids_for_driver(driver_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn accept_bid(
        &self,
        user: User,
        request_id: Uuid,
        driver_id: Uuid,
    ) -> Result<RequestView, Error> {
        let request = self
            .store
            .modify_request(request_id, |ledger| {
                self.authorize(user.clone(), "assign", ledger.request.clone())?;
                ledger.accept_bid(driver_id)?;
                Ok(ledger.request.clone())
            })
            .await?;

        Ok(shape_request(request, &user))
    }
}
