use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{invalid_transition_error, Error};

use super::positive_decimal;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bid {
    pub id: Uuid,
    pub request_id: Uuid,
    pub driver_id: Uuid,
    pub amount: Decimal,
    pub message: Option<String>,
    pub estimated_delivery: DateTime<Utc>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Accepted,
    Rejected,
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Pending => "pending".into(),
            Self::Accepted => "accepted".into(),
            Self::Rejected => "rejected".into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct NewBid {
    #[validate(custom(function = "positive_decimal"))]
    pub amount: Decimal,
    #[validate(length(max = 2000, message = "message is too long"))]
    pub message: Option<String>,
    pub estimated_delivery: DateTime<Utc>,
}

impl Bid {
    pub fn new(request_id: Uuid, driver_id: Uuid, input: NewBid) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            request_id,
            driver_id,
            amount: input.amount,
            message: input.message.filter(|message| !message.trim().is_empty()),
            estimated_delivery: input.estimated_delivery,
            status: Status::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    pub fn accept(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Pending => {
                self.set_status(Status::Accepted);
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }

    /// Rejecting an already rejected bid is a no-op.
    pub fn reject(&mut self) {
        if self.status != Status::Rejected {
            self.set_status(Status::Rejected);
        }
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Newest first; identical timestamps fall back to ascending id.
pub fn sort_newest_first(bids: &mut [Bid]) {
    bids.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}
