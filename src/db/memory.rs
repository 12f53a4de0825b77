use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{RequestScope, Store};

use crate::{
    entities::{sort_newest_first, Bid, GpsTracking, Ledger, Member, TransportRequest},
    error::{not_found_error, validation_error, Error},
};

#[derive(Default)]
struct Tables {
    members: HashMap<Uuid, Member>,
    requests: HashMap<Uuid, TransportRequest>,
    bids: HashMap<Uuid, Bid>,
    tracking: Vec<GpsTracking>,
}

/// Process-local store. One lock guards every table, which makes each call,
/// `modify_request` included, a serialized all-or-nothing unit.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_member(&self, member: &Member) -> Result<(), Error> {
        let mut tables = self.tables.lock().await;

        if tables.members.values().any(|m| m.email == member.email) {
            return Err(validation_error("email is already registered"));
        }

        tables.members.insert(member.id, member.clone());

        Ok(())
    }

    async fn find_member(&self, id: Uuid) -> Result<Option<Member>, Error> {
        Ok(self.tables.lock().await.members.get(&id).cloned())
    }

    async fn insert_request(&self, request: &TransportRequest) -> Result<(), Error> {
        self.tables
            .lock()
            .await
            .requests
            .insert(request.id, request.clone());

        Ok(())
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<TransportRequest>, Error> {
        Ok(self.tables.lock().await.requests.get(&id).cloned())
    }

    async fn list_requests(&self, scope: RequestScope) -> Result<Vec<TransportRequest>, Error> {
        let tables = self.tables.lock().await;

        let mut requests: Vec<TransportRequest> = tables
            .requests
            .values()
            .filter(|request| match scope {
                RequestScope::All => true,
                RequestScope::OwnedBy(client_id) => request.client_id == client_id,
                RequestScope::Open => request.is_pending(),
            })
            .cloned()
            .collect();

        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        Ok(requests)
    }

    async fn modify_request<T, F>(&self, id: Uuid, f: F) -> Result<T, Error>
    where
        T: Send,
        F: FnOnce(&mut Ledger) -> Result<T, Error> + Send,
    {
        let mut tables = self.tables.lock().await;

        let request = tables
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error("transport request"))?;

        let bids = tables
            .bids
            .values()
            .filter(|bid| bid.request_id == id)
            .cloned()
            .collect();

        let mut ledger = Ledger::new(request, bids);
        let result = f(&mut ledger)?;

        let Ledger { request, bids } = ledger;
        tables.requests.insert(request.id, request);
        for bid in bids {
            tables.bids.insert(bid.id, bid);
        }

        Ok(result)
    }

    async fn list_bids_for_request(&self, request_id: Uuid) -> Result<Vec<Bid>, Error> {
        let tables = self.tables.lock().await;

        let mut bids: Vec<Bid> = tables
            .bids
            .values()
            .filter(|bid| bid.request_id == request_id)
            .cloned()
            .collect();
        sort_newest_first(&mut bids);

        Ok(bids)
    }

    async fn list_bids_for_driver(&self, driver_id: Uuid) -> Result<Vec<Bid>, Error> {
        let tables = self.tables.lock().await;

        let mut bids: Vec<Bid> = tables
            .bids
            .values()
            .filter(|bid| bid.driver_id == driver_id)
            .cloned()
            .collect();
        sort_newest_first(&mut bids);

        Ok(bids)
    }

    async fn append_tracking(&self, sample: &GpsTracking) -> Result<(), Error> {
        self.tables.lock().await.tracking.push(sample.clone());

        Ok(())
    }

    async fn latest_tracking(&self, request_id: Uuid) -> Result<Option<GpsTracking>, Error> {
        Ok(self.tracking_history(request_id).await?.into_iter().next())
    }

    async fn tracking_history(&self, request_id: Uuid) -> Result<Vec<GpsTracking>, Error> {
        let tables = self.tables.lock().await;

        // walk appends newest first so the stable sort keeps later appends ahead on ties
        let mut history: Vec<GpsTracking> = tables
            .tracking
            .iter()
            .rev()
            .filter(|sample| sample.request_id == request_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(history)
    }
}
