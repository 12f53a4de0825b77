use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::TrackingAPI,
    auth::User,
    db::Store,
    entities::{GpsTracking, LocationSample},
    error::{not_found_error, Error},
    hub::{ConnectionId, TrackingHub},
};

#[async_trait]
impl<S: Store> TrackingAPI for Engine<S> {
    #[tracing::instrument(skip(self, sample))]
    async fn record_location(
        &self,
        user: User,
        request_id: Uuid,
        sample: LocationSample,
    ) -> Result<GpsTracking, Error> {
        sample.validate()?;

        let request = self.fetch_request(request_id).await?;
        self.authorize(user.clone(), "publish_location", request)?;

        let tracking = GpsTracking::new(request_id, user.id, sample);

        // persisted before anyone hears about it
        self.store.append_tracking(&tracking).await?;
        let delivered = self.hub.publish(&tracking).await;

        tracing::debug!(tracking_id = %tracking.id, delivered, "location recorded");

        Ok(tracking)
    }

    #[tracing::instrument(skip(self))]
    async fn latest_location(&self, user: User, request_id: Uuid) -> Result<GpsTracking, Error> {
        let request = self.fetch_request(request_id).await?;
        self.authorize(user, "track", request)?;

        self.store
            .latest_tracking(request_id)
            .await?
            .ok_or_else(|| not_found_error("location"))
    }

    #[tracing::instrument(skip(self))]
    async fn location_history(
        &self,
        user: User,
        request_id: Uuid,
    ) -> Result<Vec<GpsTracking>, Error> {
        let request = self.fetch_request(request_id).await?;
        self.authorize(user, "track", request)?;

        self.store.tracking_history(request_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn watch_request(
        &self,
        user: User,
        connection_id: ConnectionId,
        request_id: Uuid,
    ) -> Result<(), Error> {
        let request = self.fetch_request(request_id).await?;
        self.authorize(user, "track", request)?;

        if !self.hub.subscribe(connection_id, request_id).await {
            return Err(not_found_error("connection"));
        }

        Ok(())
    }

    fn hub(&self) -> &TrackingHub {
        &self.hub
    }
}
