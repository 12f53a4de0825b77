use async_trait::async_trait;
use geo_types::Geometry;
use geozero::wkb;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    types::Json,
    Acquire, Executor, Pool, Postgres, Row, Transaction,
};
use uuid::Uuid;

use super::{RequestScope, Store};

use crate::{
    entities::{Bid, GpsTracking, Ledger, Member, TransportRequest},
    error::{not_found_error, validation_error, Error},
};

type Database = Postgres;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Postgres-backed store. Rows keep their entity as a JSONB document next to
/// the key columns that are filtered, ordered or constrained on.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Pool<Database>,
}

impl PgStore {
    #[tracing::instrument(name = "PgStore::new", skip(db_uri))]
    pub async fn new(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        pool.execute("CREATE EXTENSION IF NOT EXISTS postgis")
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS users (id UUID PRIMARY KEY, email VARCHAR NOT NULL UNIQUE, role VARCHAR NOT NULL, data JSONB NOT NULL)")
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS transport_requests (id UUID PRIMARY KEY, client_id UUID NOT NULL, status VARCHAR NOT NULL, created_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL, CONSTRAINT fk_request_client FOREIGN KEY(client_id) REFERENCES users(id))")
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS bids (id UUID PRIMARY KEY, request_id UUID NOT NULL, driver_id UUID NOT NULL, status VARCHAR NOT NULL, created_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL, CONSTRAINT fk_bid_request FOREIGN KEY(request_id) REFERENCES transport_requests(id), CONSTRAINT fk_bid_driver FOREIGN KEY(driver_id) REFERENCES users(id))")
            .await?;

        pool.execute("CREATE INDEX IF NOT EXISTS bids_request_idx ON bids (request_id)")
            .await?;

        pool.execute("CREATE INDEX IF NOT EXISTS bids_driver_idx ON bids (driver_id)")
            .await?;

        // seq orders appends that share a timestamp
        pool.execute("CREATE TABLE IF NOT EXISTS gps_tracking (seq BIGSERIAL PRIMARY KEY, id UUID NOT NULL UNIQUE, request_id UUID NOT NULL, driver_id UUID NOT NULL, recorded_at TIMESTAMPTZ NOT NULL, location geometry(Point, 4326) NOT NULL, data JSONB NOT NULL, CONSTRAINT fk_tracking_request FOREIGN KEY(request_id) REFERENCES transport_requests(id), CONSTRAINT fk_tracking_driver FOREIGN KEY(driver_id) REFERENCES users(id))")
            .await?;

        pool.execute("CREATE INDEX IF NOT EXISTS gps_tracking_request_idx ON gps_tracking (request_id, recorded_at DESC, seq DESC)")
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    #[tracing::instrument(skip(self, member), fields(member_id = %member.id))]
    async fn insert_member(&self, member: &Member) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query("INSERT INTO users (id, email, role, data) VALUES ($1, $2, $3, $4)")
                .bind(&member.id)
                .bind(&member.email)
                .bind(member.role.name())
                .bind(Json(member)),
        )
        .await
        .map_err(write_error)?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_member(&self, id: Uuid) -> Result<Option<Member>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(sqlx::query("SELECT data FROM users WHERE id = $1").bind(&id))
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(member): Json<Member> = result.try_get("data")?;
                Ok(Some(member))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, request), fields(request_id = %request.id))]
    async fn insert_request(&self, request: &TransportRequest) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query(
                "INSERT INTO transport_requests (id, client_id, status, created_at, data) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&request.id)
            .bind(&request.client_id)
            .bind(request.status.name())
            .bind(&request.created_at)
            .bind(Json(request)),
        )
        .await
        .map_err(write_error)?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_request(&self, id: Uuid) -> Result<Option<TransportRequest>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(
                sqlx::query("SELECT data FROM transport_requests WHERE id = $1").bind(&id),
            )
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(request): Json<TransportRequest> = result.try_get("data")?;
                Ok(Some(request))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list_requests(&self, scope: RequestScope) -> Result<Vec<TransportRequest>, Error> {
        let mut conn = self.pool.acquire().await?;

        let results = match scope {
            RequestScope::All => {
                conn.fetch_all(sqlx::query(
                    "SELECT data FROM transport_requests ORDER BY created_at DESC, id ASC",
                ))
                .await?
            }
            RequestScope::OwnedBy(client_id) => {
                conn.fetch_all(
                    sqlx::query(
                        "SELECT data FROM transport_requests WHERE client_id = $1 ORDER BY created_at DESC, id ASC",
                    )
                    .bind(client_id),
                )
                .await?
            }
            RequestScope::Open => {
                conn.fetch_all(sqlx::query(
                    "SELECT data FROM transport_requests WHERE status = 'pending' ORDER BY created_at DESC, id ASC",
                ))
                .await?
            }
        };

        decode_all(results)
    }

    #[tracing::instrument(skip(self, f))]
    async fn modify_request<T, F>(&self, id: Uuid, f: F) -> Result<T, Error>
    where
        T: Send,
        F: FnOnce(&mut Ledger) -> Result<T, Error> + Send,
    {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        // the request row lock serializes every writer touching this request
        let request = fetch_request_for_update(&mut tx, &id).await?;
        let bids = fetch_bids_for_update(&mut tx, &id).await?;

        let mut ledger = Ledger::new(request, bids);

        // dropping tx on error rolls back
        let result = f(&mut ledger)?;

        update_request(&mut tx, &ledger.request).await?;

        for bid in ledger.bids.iter() {
            upsert_bid(&mut tx, bid).await?;
        }

        tx.commit().await?;

        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    async fn list_bids_for_request(&self, request_id: Uuid) -> Result<Vec<Bid>, Error> {
        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(
                sqlx::query(
                    "SELECT data FROM bids WHERE request_id = $1 ORDER BY created_at DESC, id ASC",
                )
                .bind(&request_id),
            )
            .await?;

        decode_all(results)
    }

    #[tracing::instrument(skip(self))]
    async fn list_bids_for_driver(&self, driver_id: Uuid) -> Result<Vec<Bid>, Error> {
        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(
                sqlx::query(
                    "SELECT data FROM bids WHERE driver_id = $1 ORDER BY created_at DESC, id ASC",
                )
                .bind(&driver_id),
            )
            .await?;

        decode_all(results)
    }

    #[tracing::instrument(skip(self, sample), fields(request_id = %sample.request_id))]
    async fn append_tracking(&self, sample: &GpsTracking) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        let location: Geometry<f64> = sample.into();

        conn.execute(
            sqlx::query(
                "INSERT INTO gps_tracking (id, request_id, driver_id, recorded_at, location, data) VALUES ($1, $2, $3, $4, ST_SetSRID($5, 4326), $6)",
            )
            .bind(&sample.id)
            .bind(&sample.request_id)
            .bind(&sample.driver_id)
            .bind(&sample.timestamp)
            .bind(wkb::Encode(location))
            .bind(Json(sample)),
        )
        .await
        .map_err(write_error)?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn latest_tracking(&self, request_id: Uuid) -> Result<Option<GpsTracking>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(
                sqlx::query(
                    "SELECT data FROM gps_tracking WHERE request_id = $1 ORDER BY recorded_at DESC, seq DESC LIMIT 1",
                )
                .bind(&request_id),
            )
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(sample): Json<GpsTracking> = result.try_get("data")?;
                Ok(Some(sample))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn tracking_history(&self, request_id: Uuid) -> Result<Vec<GpsTracking>, Error> {
        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(
                sqlx::query(
                    "SELECT data FROM gps_tracking WHERE request_id = $1 ORDER BY recorded_at DESC, seq DESC",
                )
                .bind(&request_id),
            )
            .await?;

        decode_all(results)
    }
}

/// Constraint violations the caller can act on. `users.email` is the only
/// unique column besides keys, and request references are resolved before
/// any write, so a foreign key failure means an unregistered member.
fn constraint_error(code: Option<&str>) -> Option<Error> {
    match code {
        Some(UNIQUE_VIOLATION) => Some(validation_error("email is already registered")),
        Some(FOREIGN_KEY_VIOLATION) => Some(not_found_error("member")),
        _ => None,
    }
}

fn write_error(err: sqlx::Error) -> Error {
    let mapped = match &err {
        sqlx::Error::Database(db_err) => constraint_error(db_err.code().as_deref()),
        _ => None,
    };

    mapped.unwrap_or_else(|| err.into())
}

fn decode_all<T>(results: Vec<PgRow>) -> Result<Vec<T>, Error>
where
    T: serde::de::DeserializeOwned,
{
    let mut entities = Vec::with_capacity(results.len());

    for result in results.iter() {
        let Json(entity): Json<T> = result.try_get("data")?;
        entities.push(entity);
    }

    Ok(entities)
}

#[tracing::instrument(skip(tx))]
async fn fetch_request_for_update(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<TransportRequest, Error> {
    let Json(request): Json<TransportRequest> = tx
        .fetch_optional(
            sqlx::query("SELECT data FROM transport_requests WHERE id = $1 FOR UPDATE").bind(id),
        )
        .await?
        .ok_or_else(|| not_found_error("transport request"))?
        .try_get("data")?;

    Ok(request)
}

#[tracing::instrument(skip(tx))]
async fn fetch_bids_for_update(
    tx: &mut Transaction<'_, Database>,
    request_id: &Uuid,
) -> Result<Vec<Bid>, Error> {
    let results = tx
        .fetch_all(
            sqlx::query(
                "SELECT data FROM bids WHERE request_id = $1 ORDER BY created_at DESC, id ASC FOR UPDATE",
            )
            .bind(request_id),
        )
        .await?;

    decode_all(results)
}

#[tracing::instrument(skip(tx, request), fields(request_id = %request.id))]
async fn update_request(
    tx: &mut Transaction<'_, Database>,
    request: &TransportRequest,
) -> Result<(), Error> {
    tx.execute(
        sqlx::query("UPDATE transport_requests SET status = $2, data = $3 WHERE id = $1")
            .bind(&request.id)
            .bind(request.status.name())
            .bind(Json(request)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx, bid), fields(bid_id = %bid.id))]
async fn upsert_bid(tx: &mut Transaction<'_, Database>, bid: &Bid) -> Result<(), Error> {
    tx.execute(
        sqlx::query(
            "INSERT INTO bids (id, request_id, driver_id, status, created_at, data) VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, data = EXCLUDED.data",
        )
        .bind(&bid.id)
        .bind(&bid.request_id)
        .bind(&bid.driver_id)
        .bind(bid.status.name())
        .bind(&bid.created_at)
        .bind(Json(bid)),
    )
    .await
    .map_err(write_error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::entities::{request::sample_input, NewBid, NewMember};
    use chrono::Duration;
    use rust_decimal::Decimal;

    #[test]
    fn unknown_members_are_not_found() {
        assert!(constraint_error(Some(FOREIGN_KEY_VIOLATION))
            .unwrap()
            .is_not_found_error());
        assert!(constraint_error(Some(UNIQUE_VIOLATION))
            .unwrap()
            .is_validation_error());
        assert!(constraint_error(Some("40001")).is_none());
        assert!(constraint_error(None).is_none());
    }

    async fn register(store: &PgStore, role: Role) -> Uuid {
        let member = Member::new(
            NewMember {
                email: format!("{}@example.com", Uuid::new_v4()),
                password: "not checked here".into(),
                first_name: "Test".into(),
                last_name: role.name(),
                role,
            },
            "$2b$04$hash".into(),
        );
        store.insert_member(&member).await.unwrap();

        member.id
    }

    // needs a PostGIS database: DATABASE_URL=... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn concurrent_accepts_serialize_on_the_request_row() {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => return,
        };
        let store = PgStore::new(&database_url, 4).await.unwrap();

        let client_id = register(&store, Role::Client).await;
        let d1 = register(&store, Role::Driver).await;
        let d2 = register(&store, Role::Driver).await;

        let request = TransportRequest::new(client_id, sample_input());
        store.insert_request(&request).await.unwrap();

        let err = store
            .insert_request(&TransportRequest::new(Uuid::new_v4(), sample_input()))
            .await
            .unwrap_err();
        assert!(err.is_not_found_error());

        let estimated_delivery = request.pickup_date + Duration::days(1);
        for (driver_id, amount) in [(d1, 450), (d2, 480)] {
            store
                .modify_request(request.id, |ledger| {
                    ledger.place_bid(
                        driver_id,
                        NewBid {
                            amount: Decimal::new(amount, 0),
                            message: None,
                            estimated_delivery,
                        },
                    )
                })
                .await
                .unwrap();
        }

        let (first, second) = tokio::join!(
            store.modify_request(request.id, |ledger| ledger.accept_bid(d1)),
            store.modify_request(request.id, |ledger| ledger.accept_bid(d2)),
        );

        let loser = match (first, second) {
            (Ok(()), Err(err)) | (Err(err), Ok(())) => err,
            other => panic!("expected exactly one winner, got {:?}", other),
        };
        assert!(loser.is_invalid_transition_error());

        let bids = store.list_bids_for_request(request.id).await.unwrap();
        let accepted = bids
            .iter()
            .filter(|bid| bid.status == crate::entities::BidStatus::Accepted)
            .count();
        assert_eq!(accepted, 1);

        let stored = store.find_request(request.id).await.unwrap().unwrap();
        assert!(stored.assigned_driver_id().is_some());
    }
}
