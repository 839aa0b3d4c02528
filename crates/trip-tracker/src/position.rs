use std::fmt;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use fleet_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const LABEL_FORMAT: &str = "%H:%M:%S";

/// Identifier of the trip a subscription is scoped to.
///
/// Always non-empty; surrounding whitespace is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripId(String);

impl TripId {
    /// Parse a trip identifier, returning `None` for empty or absent input.
    ///
    /// Views can render before routing parameters are available, so an empty
    /// identifier is not an error.
    #[must_use]
    pub fn parse<'a>(raw: impl Into<Option<&'a str>>) -> Option<Self> {
        let trimmed = raw.into()?.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One reported location sample for the subscribed trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    /// WGS84 latitude in degrees.
    pub latitude: f64,

    /// WGS84 longitude in degrees.
    pub longitude: f64,

    /// Instant the sample was taken, as supplied by the source.
    pub timestamp: String,
}

impl PositionUpdate {
    /// Decode an update from a transport payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] when the payload is missing a field or
    /// carries a field of the wrong type.
    pub fn from_payload(payload: Value) -> Result<Self> {
        serde_json::from_value(payload)
            .map_err(|e| Error::InvalidFormat(format!("position update: {e}")))
    }

    /// The source timestamp, when it is a valid RFC 3339 instant.
    #[must_use]
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok().map(|dt| dt.with_timezone(&Utc))
    }

    /// Wall-clock label for the timestamp readout, e.g. `10:00:00`.
    ///
    /// Timestamps that do not parse are shown as received.
    #[must_use]
    pub fn time_label(&self, timezone: Tz) -> String {
        self.observed_at().map_or_else(
            || self.timestamp.clone(),
            |dt| dt.with_timezone(&timezone).format(LABEL_FORMAT).to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_trip_ids() {
        assert_eq!(TripId::parse(""), None);
        assert_eq!(TripId::parse("   "), None);
        assert_eq!(TripId::parse(None), None);
        assert_eq!(TripId::parse(" T1 ").map(|id| id.to_string()), Some("T1".to_string()));
    }

    #[test]
    fn decode_payload() {
        let payload = json!({
            "latitude": -8.1,
            "longitude": -79.0,
            "timestamp": "2024-01-01T10:00:00Z"
        });
        let update = PositionUpdate::from_payload(payload).expect("should decode");

        assert_eq!(update.latitude, -8.1);
        assert_eq!(update.longitude, -79.0);
        assert_eq!(update.time_label(Tz::UTC), "10:00:00");
    }

    #[test]
    fn missing_field() {
        let payload = json!({ "latitude": -8.1, "timestamp": "2024-01-01T10:00:00Z" });
        let Err(err) = PositionUpdate::from_payload(payload) else {
            panic!("should not decode");
        };
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn local_label() {
        let update = PositionUpdate {
            latitude: -8.1,
            longitude: -79.0,
            timestamp: "2024-01-01T10:00:00Z".to_string(),
        };
        assert_eq!(update.time_label(chrono_tz::America::Lima), "05:00:00");
    }

    #[test]
    fn unparsed_label() {
        let update =
            PositionUpdate { latitude: 0.0, longitude: 0.0, timestamp: "just now".to_string() };
        assert_eq!(update.observed_at(), None);
        assert_eq!(update.time_label(Tz::UTC), "just now");
    }
}
