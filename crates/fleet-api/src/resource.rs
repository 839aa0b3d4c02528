use std::fmt;
use std::str::FromStr;

use fleet_core::{Error, bad_request};
use serde::{Deserialize, Serialize};

/// Record collections exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Drivers,
    Buses,
    Trackers,
    Routes,
    Trips,
    Administrators,
    Incidents,
}

impl Resource {
    /// Path segment under `/api`.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Drivers => "drivers",
            Self::Buses => "buses",
            Self::Trackers => "trackers",
            Self::Routes => "routes",
            Self::Trips => "trips",
            Self::Administrators => "administrators",
            Self::Incidents => "incidents",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drivers" | "driver" => Ok(Self::Drivers),
            "buses" | "bus" => Ok(Self::Buses),
            "trackers" | "tracker" => Ok(Self::Trackers),
            "routes" | "route" => Ok(Self::Routes),
            "trips" | "trip" => Ok(Self::Trips),
            "administrators" | "administrator" | "admins" => Ok(Self::Administrators),
            "incidents" | "incident" => Ok(Self::Incidents),
            other => Err(bad_request!("unknown resource: {other}")),
        }
    }
}

/// Incident lifecycle states the backend accepts in a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Reported,
    InProgress,
    Resolved,
}

impl IncidentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reported => "reported",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }
}

impl FromStr for IncidentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reported" => Ok(Self::Reported),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            other => Err(bad_request!("unknown incident status: {other}")),
        }
    }
}
