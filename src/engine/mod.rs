mod bid_api;
mod member_api;
mod request_api;
mod tracking_api;


use oso::Oso;
use uuid::Uuid;

use crate::{
    api::API,
    auth::{authorizor, User},
    db::Store,
    entities::TransportRequest,
    error::{forbidden_error, not_found_error, Error},
    hub::{ServerMessage, TrackingHub},
};

pub struct Engine<S> {
    store: S,
    authorizor: Oso,
    hub: TrackingHub,
    password_cost: u32,
}

impl<S: Store> Engine<S> {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(store: S) -> Result<Self, Error> {
        Ok(Self {
            store,
            authorizor: authorizor::new()?,
            hub: TrackingHub::new(),
            password_cost: bcrypt::DEFAULT_COST,
        })
    }

    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    async fn fetch_request(&self, id: Uuid) -> Result<TransportRequest, Error> {
        self.store
            .find_request(id)
            .await?
            .ok_or_else(|| not_found_error("transport request"))
    }

    /// Drops live subscriptions whose owner may no longer track `request`,
    /// e.g. a driver released by a reassignment.
    async fn revoke_lapsed_watchers(&self, request: &TransportRequest) {
        for (connection_id, viewer) in self.hub.watchers(request.id).await {
            if self.authorize(viewer, "track", request.clone()).is_ok() {
                continue;
            }

            self.hub.unsubscribe(connection_id, request.id).await;
            self.hub
                .notify(
                    connection_id,
                    ServerMessage::Error {
                        message: "tracking access revoked".into(),
                    },
                )
                .await;

            tracing::info!(%connection_id, request_id = %request.id, "tracking subscription revoked");
        }
    }
}

impl<S> Engine<S> {
    pub fn authorize<Action, Resource>(
        &self,
        actor: User,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(forbidden_error())
    }
}

impl<S: Store> API for Engine<S> {}
