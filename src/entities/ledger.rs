use uuid::Uuid;

use crate::entities::{Bid, BidStatus, NewBid, TransportRequest};
use crate::error::{
    forbidden_error, invalid_transition_error, not_found_error, validation_error, Error,
};

/// A transport request together with every bid placed against it. Stores hand
/// one out under a lock and persist it back as a single unit, so the methods
/// here are free to touch the request and any number of bids.
#[derive(Clone, Debug)]
pub struct Ledger {
    pub request: TransportRequest,
    pub bids: Vec<Bid>,
}

impl Ledger {
    pub fn new(request: TransportRequest, bids: Vec<Bid>) -> Self {
        Self { request, bids }
    }

    #[tracing::instrument(skip(self, input), fields(request_id = %self.request.id))]
    pub fn place_bid(&mut self, driver_id: Uuid, input: NewBid) -> Result<Bid, Error> {
        if !self.request.is_pending() {
            tracing::info!("request is no longer open for bidding");
            return Err(forbidden_error());
        }

        if input.estimated_delivery <= self.request.pickup_date {
            return Err(validation_error(
                "estimated_delivery must be after the request's pickup date",
            ));
        }

        if self
            .bids
            .iter()
            .any(|bid| bid.driver_id == driver_id && bid.is_pending())
        {
            return Err(validation_error("driver already has a pending bid on this request"));
        }

        let bid = Bid::new(self.request.id, driver_id, input);
        self.bids.push(bid.clone());

        Ok(bid)
    }

    /// Accepts the driver's live bid, rejects every other bid and assigns the
    /// request to the driver.
    #[tracing::instrument(skip(self), fields(request_id = %self.request.id))]
    pub fn accept_bid(&mut self, driver_id: Uuid) -> Result<(), Error> {
        if !self.request.is_pending() {
            return Err(invalid_transition_error());
        }

        let winner = self
            .bids
            .iter()
            .position(|bid| bid.driver_id == driver_id && bid.is_pending())
            .ok_or_else(|| not_found_error("bid"))?;

        self.request.assign(driver_id)?;

        for (index, bid) in self.bids.iter_mut().enumerate() {
            if index == winner {
                bid.accept()?;
            } else {
                bid.reject();
            }
        }

        tracing::info!(%driver_id, rejected = self.bids.len() - 1, "bid accepted");

        Ok(())
    }

    /// Puts the request back on the market. Every prior bid is stale, including
    /// the accepted one.
    #[tracing::instrument(skip(self), fields(request_id = %self.request.id))]
    pub fn reopen(&mut self) -> Result<Uuid, Error> {
        let released = self.request.reopen()?;

        for bid in self.bids.iter_mut() {
            bid.reject();
        }

        Ok(released)
    }

    pub fn accepted_bid(&self) -> Option<&Bid> {
        self.bids
            .iter()
            .find(|bid| bid.status == BidStatus::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{request::sample_input, RequestStatus};
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn ledger() -> Ledger {
        Ledger::new(TransportRequest::new(Uuid::new_v4(), sample_input()), vec![])
    }

    fn offer(ledger: &Ledger, amount: i64) -> NewBid {
        NewBid {
            amount: Decimal::new(amount, 0),
            message: Some("can load on the morning".into()),
            estimated_delivery: ledger.request.pickup_date + Duration::days(1),
        }
    }

    #[test]
    fn accepting_one_bid_rejects_the_rest() {
        let (d1, d2) = (Uuid::new_v4(), Uuid::new_v4());
        let mut ledger = ledger();

        let b1 = ledger.place_bid(d1, offer(&ledger, 450)).unwrap();
        let b2 = ledger.place_bid(d2, offer(&ledger, 480)).unwrap();

        ledger.accept_bid(d1).unwrap();

        assert_eq!(ledger.request.status, RequestStatus::Assigned { driver_id: d1 });
        let status_of = |id: Uuid| ledger.bids.iter().find(|bid| bid.id == id).unwrap().status;
        assert_eq!(status_of(b1.id), BidStatus::Accepted);
        assert_eq!(status_of(b2.id), BidStatus::Rejected);
        assert_eq!(ledger.accepted_bid().unwrap().driver_id, d1);
    }

    #[test]
    fn accepting_without_a_bid_is_not_found() {
        let mut ledger = ledger();
        ledger.place_bid(Uuid::new_v4(), offer(&ledger, 450)).unwrap();

        let err = ledger.accept_bid(Uuid::new_v4()).unwrap_err();
        assert!(err.is_not_found_error());
        assert!(ledger.request.is_pending());
        assert!(ledger.bids.iter().all(|bid| bid.is_pending()));
    }

    #[test]
    fn bids_are_refused_once_assigned() {
        let driver = Uuid::new_v4();
        let mut ledger = ledger();
        ledger.place_bid(driver, offer(&ledger, 450)).unwrap();
        ledger.accept_bid(driver).unwrap();

        let err = ledger.place_bid(Uuid::new_v4(), offer(&ledger, 400)).unwrap_err();
        assert!(err.is_forbidden_error());

        let err = ledger.accept_bid(driver).unwrap_err();
        assert!(err.is_invalid_transition_error());
    }

    #[test]
    fn reopen_rejects_every_bid_and_allows_rebidding() {
        let (d1, d2) = (Uuid::new_v4(), Uuid::new_v4());
        let mut ledger = ledger();
        ledger.place_bid(d1, offer(&ledger, 450)).unwrap();
        ledger.place_bid(d2, offer(&ledger, 480)).unwrap();
        ledger.accept_bid(d1).unwrap();

        assert_eq!(ledger.reopen().unwrap(), d1);
        assert!(ledger.request.is_pending());
        assert!(ledger.request.assigned_driver_id().is_none());
        assert!(ledger.bids.iter().all(|bid| bid.status == BidStatus::Rejected));

        let rebid = ledger.place_bid(d1, offer(&ledger, 440)).unwrap();
        assert!(rebid.is_pending());
        assert!(ledger.reopen().unwrap_err().is_invalid_transition_error());
    }

    #[test]
    fn bid_validation_against_request() {
        let driver = Uuid::new_v4();
        let mut ledger = ledger();

        let mut early = offer(&ledger, 450);
        early.estimated_delivery = ledger.request.pickup_date;
        assert!(ledger.place_bid(driver, early).unwrap_err().is_validation_error());

        ledger.place_bid(driver, offer(&ledger, 450)).unwrap();
        let err = ledger.place_bid(driver, offer(&ledger, 430)).unwrap_err();
        assert!(err.is_validation_error());
    }
}
