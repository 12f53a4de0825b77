use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::RequestAPI,
    auth::{
        policy::{shape_request, shape_requests},
        RequestView, User,
    },
    db::{RequestScope, Store},
    entities::{Ledger, NewTransportRequest, StatusName, StatusUpdate, TransportRequest},
    error::{forbidden_error, validation_error, Error},
};

impl<S: Store> Engine<S> {
    fn apply_status_update(
        &self,
        user: &User,
        ledger: &mut Ledger,
        update: &StatusUpdate,
    ) -> Result<(), Error> {
        let request = ledger.request.clone();

        match update.status {
            StatusName::Pending => {
                self.authorize(user.clone(), "reassign", request)?;
                ledger.reopen()?;
            }
            StatusName::Assigned => {
                self.authorize(user.clone(), "assign", request)?;
                let driver_id = update.assigned_driver_id.ok_or_else(|| {
                    validation_error("assigned_driver_id is required when assigning")
                })?;
                ledger.accept_bid(driver_id)?;
            }
            StatusName::InProgress => {
                self.authorize(user.clone(), "start", request)?;
                ledger.request.start()?;
            }
            StatusName::Completed => {
                self.authorize(user.clone(), "complete", request)?;
                ledger.request.complete()?;
            }
            StatusName::Cancelled => {
                self.authorize(user.clone(), "cancel", request)?;
                ledger.request.cancel()?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<S: Store> RequestAPI for Engine<S> {
    #[tracing::instrument(skip(self, input))]
    async fn create_request(
        &self,
        user: User,
        input: NewTransportRequest,
    ) -> Result<RequestView, Error> {
        if !user.is_client() {
            return Err(forbidden_error());
        }

        input.validate()?;
        input.validate_schedule()?;

        let request = TransportRequest::new(user.id, input);
        self.store.insert_request(&request).await?;

        tracing::info!(request_id = %request.id, "transport request created");

        Ok(shape_request(request, &user))
    }

    #[tracing::instrument(skip(self))]
    async fn find_request(&self, user: User, id: Uuid) -> Result<RequestView, Error> {
        let request = self.fetch_request(id).await?;

        self.authorize(user.clone(), "read", request.clone())?;

        Ok(shape_request(request, &user))
    }

    #[tracing::instrument(skip(self))]
    async fn list_requests(&self, user: User) -> Result<Vec<RequestView>, Error> {
        let requests = self.store.list_requests(RequestScope::from(&user)).await?;

        Ok(shape_requests(requests, &user))
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(
        &self,
        user: User,
        id: Uuid,
        update: StatusUpdate,
    ) -> Result<RequestView, Error> {
        let request = self
            .store
            .modify_request(id, |ledger| {
                self.apply_status_update(&user, ledger, &update)?;
                Ok(ledger.request.clone())
            })
            .await?;

        tracing::info!(status = %request.status.name(), "request status updated");

        self.revoke_lapsed_watchers(&request).await;

        Ok(shape_request(request, &user))
    }

    #[tracing::instrument(skip(self))]
    async fn reassign(&self, user: User, id: Uuid) -> Result<RequestView, Error> {
        let (request, released) = self
            .store
            .modify_request(id, |ledger| {
                self.authorize(user.clone(), "reassign", ledger.request.clone())?;
                let released = ledger.reopen()?;
                Ok((ledger.request.clone(), released))
            })
            .await?;

        tracing::info!(driver_id = %released, "request returned to the market");

        self.revoke_lapsed_watchers(&request).await;

        Ok(shape_request(request, &user))
    }
}
