pub mod bids;
pub mod members;
pub mod requests;
pub mod tracking;
pub mod ws;
