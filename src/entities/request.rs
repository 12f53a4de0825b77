use chrono::{DateTime, Utc};
use oso::PolarClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{invalid_transition_error, validation_error, Error};

use super::{not_blank, positive_decimal};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransportRequest {
    pub id: Uuid,
    pub client_id: Uuid,
    pub pickup_location: String,
    pub delivery_location: String,
    pub pickup_date: DateTime<Utc>,
    pub delivery_date: DateTime<Utc>,
    pub item_description: String,
    pub weight: Decimal,
    pub dimensions: String,
    pub budget: Decimal,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request status. The assigned driver travels with the states that require
/// one, so a pending or cancelled request can never carry a driver.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    Pending,
    Assigned { driver_id: Uuid },
    InProgress { driver_id: Uuid },
    Completed { driver_id: Uuid },
    Cancelled,
}

/// Flat status name used on the wire and in status update payloads.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusName {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl StatusName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Status {
    pub fn kind(&self) -> StatusName {
        match self {
            Self::Pending => StatusName::Pending,
            Self::Assigned { .. } => StatusName::Assigned,
            Self::InProgress { .. } => StatusName::InProgress,
            Self::Completed { .. } => StatusName::Completed,
            Self::Cancelled => StatusName::Cancelled,
        }
    }

    pub fn name(&self) -> String {
        self.kind().as_str().into()
    }

    pub fn driver_id(&self) -> Option<Uuid> {
        match self {
            Self::Assigned { driver_id }
            | Self::InProgress { driver_id }
            | Self::Completed { driver_id } => Some(*driver_id),
            Self::Pending | Self::Cancelled => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct NewTransportRequest {
    #[validate(custom(function = "not_blank"))]
    pub pickup_location: String,
    #[validate(custom(function = "not_blank"))]
    pub delivery_location: String,
    pub pickup_date: DateTime<Utc>,
    pub delivery_date: DateTime<Utc>,
    #[validate(custom(function = "not_blank"))]
    pub item_description: String,
    #[validate(custom(function = "positive_decimal"))]
    pub weight: Decimal,
    #[validate(custom(function = "not_blank"))]
    pub dimensions: String,
    #[validate(custom(function = "positive_decimal"))]
    pub budget: Decimal,
}

impl NewTransportRequest {
    pub fn validate_schedule(&self) -> Result<(), Error> {
        if self.delivery_date < self.pickup_date {
            return Err(validation_error("delivery_date must not precede pickup_date"));
        }

        Ok(())
    }
}

/// Explicit status change payload; `assigned_driver_id` is only consulted when
/// moving to `assigned`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: StatusName,
    #[serde(default)]
    pub assigned_driver_id: Option<Uuid>,
}

impl TransportRequest {
    pub fn new(client_id: Uuid, input: NewTransportRequest) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            client_id,
            pickup_location: input.pickup_location,
            delivery_location: input.delivery_location,
            pickup_date: input.pickup_date,
            delivery_date: input.delivery_date,
            item_description: input.item_description,
            weight: input.weight,
            dimensions: input.dimensions,
            budget: input.budget,
            status: Status::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, Status::Pending)
    }

    pub fn assigned_driver_id(&self) -> Option<Uuid> {
        self.status.driver_id()
    }

    pub fn is_assigned_to(&self, driver_id: Uuid) -> bool {
        self.assigned_driver_id() == Some(driver_id)
    }

    #[tracing::instrument(skip(self), fields(request_id = %self.id))]
    pub fn assign(&mut self, driver_id: Uuid) -> Result<(), Error> {
        match self.status {
            Status::Pending => self.transition(Status::Assigned { driver_id }),
            _ => Err(invalid_transition_error()),
        }
    }

    #[tracing::instrument(skip(self), fields(request_id = %self.id))]
    pub fn start(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Assigned { driver_id } => self.transition(Status::InProgress { driver_id }),
            _ => Err(invalid_transition_error()),
        }
    }

    #[tracing::instrument(skip(self), fields(request_id = %self.id))]
    pub fn complete(&mut self) -> Result<(), Error> {
        match self.status {
            Status::InProgress { driver_id } => self.transition(Status::Completed { driver_id }),
            _ => Err(invalid_transition_error()),
        }
    }

    #[tracing::instrument(skip(self), fields(request_id = %self.id))]
    pub fn cancel(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Assigned { .. } | Status::InProgress { .. } => {
                self.transition(Status::Cancelled)
            }
            _ => Err(invalid_transition_error()),
        }
    }

    /// Reopens the request to the market, returning the driver that was
    /// released.
    #[tracing::instrument(skip(self), fields(request_id = %self.id))]
    pub fn reopen(&mut self) -> Result<Uuid, Error> {
        match self.status {
            Status::Assigned { driver_id } | Status::InProgress { driver_id } => {
                self.transition(Status::Pending)?;
                Ok(driver_id)
            }
            _ => Err(invalid_transition_error()),
        }
    }

    fn transition(&mut self, status: Status) -> Result<(), Error> {
        self.status = status;
        self.updated_at = Utc::now();

        Ok(())
    }
}

impl PolarClass for TransportRequest {
    fn get_polar_class_builder() -> oso::ClassBuilder<TransportRequest> {
        oso::Class::builder()
            .name("TransportRequest")
            .add_attribute_getter("id", |recv: &TransportRequest| recv.id.to_string())
            .add_attribute_getter("client_id", |recv: &TransportRequest| {
                recv.client_id.to_string()
            })
            .add_attribute_getter("status", |recv: &TransportRequest| recv.status.name())
            .add_method("is_assigned_to", |recv: &TransportRequest, id: String| {
                recv.assigned_driver_id()
                    .map(|driver_id| driver_id.to_string() == id)
                    .unwrap_or(false)
            })
    }

    fn get_polar_class() -> oso::Class {
        let builder = TransportRequest::get_polar_class_builder();
        builder.build()
    }
}

#[cfg(test)]
pub(crate) fn sample_input() -> NewTransportRequest {
    use chrono::Duration;

    let pickup_date = Utc::now() + Duration::days(1);

    NewTransportRequest {
        pickup_location: "Rotterdam, Maasvlakte 2".into(),
        delivery_location: "Duisburg, Logport I".into(),
        pickup_date,
        delivery_date: pickup_date + Duration::days(2),
        item_description: "pallets of ceramic tiles".into(),
        weight: Decimal::new(10, 0),
        dimensions: "120x80x150".into(),
        budget: Decimal::new(500, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_driver_invariant(request: &TransportRequest) {
        let needs_driver = matches!(
            request.status.kind(),
            StatusName::Assigned | StatusName::InProgress | StatusName::Completed
        );
        assert_eq!(request.assigned_driver_id().is_some(), needs_driver);
    }

    #[test]
    fn happy_path_lifecycle() {
        let driver_id = Uuid::new_v4();
        let mut request = TransportRequest::new(Uuid::new_v4(), sample_input());
        assert!(request.is_pending());
        assert_driver_invariant(&request);

        request.assign(driver_id).unwrap();
        assert_eq!(request.status, Status::Assigned { driver_id });
        assert_driver_invariant(&request);

        request.start().unwrap();
        assert_eq!(request.status.name(), "in_progress");
        assert_driver_invariant(&request);

        request.complete().unwrap();
        assert!(request.is_assigned_to(driver_id));
        assert_driver_invariant(&request);

        assert!(request.cancel().unwrap_err().is_invalid_transition_error());
        assert!(request.reopen().unwrap_err().is_invalid_transition_error());
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut request = TransportRequest::new(Uuid::new_v4(), sample_input());

        assert!(request.start().unwrap_err().is_invalid_transition_error());
        assert!(request.complete().unwrap_err().is_invalid_transition_error());
        assert!(request.cancel().unwrap_err().is_invalid_transition_error());
        assert!(request.reopen().unwrap_err().is_invalid_transition_error());

        request.assign(Uuid::new_v4()).unwrap();
        assert!(request.assign(Uuid::new_v4()).unwrap_err().is_invalid_transition_error());
        assert!(request.complete().unwrap_err().is_invalid_transition_error());
    }

    #[test]
    fn cancel_and_reopen_clear_the_driver() {
        let driver_id = Uuid::new_v4();
        let mut request = TransportRequest::new(Uuid::new_v4(), sample_input());
        request.assign(driver_id).unwrap();
        request.start().unwrap();

        assert_eq!(request.reopen().unwrap(), driver_id);
        assert!(request.is_pending());
        assert_driver_invariant(&request);

        request.assign(driver_id).unwrap();
        request.cancel().unwrap();
        assert_eq!(request.status, Status::Cancelled);
        assert_driver_invariant(&request);
    }

    #[test]
    fn input_validation() {
        let mut input = sample_input();
        assert!(input.validate().is_ok());
        assert!(input.validate_schedule().is_ok());

        input.weight = Decimal::ZERO;
        input.budget = Decimal::new(-1, 0);
        input.pickup_location = "  ".into();
        assert!(input.validate().is_err());

        let mut input = sample_input();
        input.delivery_date = input.pickup_date - chrono::Duration::hours(1);
        assert!(input.validate_schedule().unwrap_err().is_validation_error());
    }

    #[test]
    fn status_serializes_with_driver() {
        let driver_id = Uuid::new_v4();
        let value = serde_json::to_value(Status::Assigned { driver_id }).unwrap();

        assert_eq!(value["name"], "assigned");
        assert_eq!(value["driver_id"], driver_id.to_string());

        let update: StatusUpdate = serde_json::from_str(r#"{"status":"in_progress"}"#).unwrap();
        assert_eq!(update.status, StatusName::InProgress);
        assert!(update.assigned_driver_id.is_none());
    }
}
