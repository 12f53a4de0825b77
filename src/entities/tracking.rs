use chrono::{DateTime, Utc};
use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// One GPS fix reported by a driver. Rows are append-only.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GpsTracking {
    pub id: Uuid,
    pub request_id: Uuid,
    pub driver_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    pub battery_level: Option<f64>,
    pub status: LegStatus,
    pub timestamp: DateTime<Utc>,
}

/// Which leg of the delivery the driver reports being on.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LegStatus {
    EnRoute,
    ArrivedPickup,
    PickedUp,
    EnRouteDelivery,
    Delivered,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct LocationSample {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 0.0))]
    pub speed: Option<f64>,
    #[validate(range(min = 0.0, max = 360.0))]
    pub heading: Option<f64>,
    #[validate(range(min = 0.0))]
    pub accuracy: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub battery_level: Option<f64>,
    pub status: LegStatus,
    /// When the fix was taken on the device; defaults to arrival time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl GpsTracking {
    pub fn new(request_id: Uuid, driver_id: Uuid, sample: LocationSample) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            driver_id,
            latitude: sample.latitude,
            longitude: sample.longitude,
            speed: sample.speed,
            heading: sample.heading,
            accuracy: sample.accuracy,
            battery_level: sample.battery_level,
            status: sample.status,
            timestamp: sample.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

impl From<&GpsTracking> for Geometry<f64> {
    fn from(sample: &GpsTracking) -> Self {
        Geometry::Point(Point::new(sample.longitude, sample.latitude))
    }
}

#[cfg(test)]
pub(crate) fn sample_at(
    latitude: f64,
    longitude: f64,
    status: LegStatus,
    timestamp: DateTime<Utc>,
) -> LocationSample {
    LocationSample {
        latitude,
        longitude,
        speed: Some(42.5),
        heading: Some(90.0),
        accuracy: Some(5.0),
        battery_level: Some(80.0),
        status,
        timestamp: Some(timestamp),
    }
}
