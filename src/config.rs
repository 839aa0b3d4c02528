//! Host settings read from the environment.

use std::path::PathBuf;

pub fn get_fleet_api_url() -> String {
    std::env::var("FLEET_API_URL").unwrap_or_else(|_| {
        let default = "http://localhost:3000".to_string();
        tracing::trace!("FLEET_API_URL not set, using default: {default}");
        default
    })
}

pub fn get_session_token() -> Option<String> {
    const CANDIDATES: [&str; 2] = ["FLEET_SESSION_TOKEN", "FLEET_ACCESS_TOKEN"];

    for key in CANDIDATES {
        if let Ok(value) = std::env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                tracing::trace!("{key} loaded from environment");
                return Some(trimmed.to_string());
            }
        }
    }

    None
}

pub fn get_session_file() -> Option<PathBuf> {
    std::env::var_os("FLEET_SESSION_FILE").map(PathBuf::from)
}
