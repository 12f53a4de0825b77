mod bid;
mod ledger;
mod member;
pub(crate) mod request;
pub(crate) mod tracking;

use rust_decimal::Decimal;
use validator::ValidationError;

pub use bid::{sort_newest_first, Bid, NewBid, Status as BidStatus};
pub use ledger::Ledger;
pub use member::{Member, NewMember, Profile};
pub use request::{
    NewTransportRequest, Status as RequestStatus, StatusName, StatusUpdate, TransportRequest,
};
pub use tracking::{GpsTracking, LegStatus, LocationSample};

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }

    Ok(())
}

fn positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("not_positive"));
    }

    Ok(())
}
