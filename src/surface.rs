use std::io::{self, Write};
use std::sync::Mutex;

use trip_tracker::view::{MapSurface, Signal};

/// Renders the trip view as a single status line on a terminal.
#[derive(Debug, Default)]
pub struct ConsoleSurface {
    line: Mutex<Line>,
}

#[derive(Debug, Default)]
struct Line {
    position: Option<(f64, f64)>,
    label: String,
    signal: Option<Signal>,
}

impl ConsoleSurface {
    fn update(&self, f: impl FnOnce(&mut Line)) {
        let mut line = self.line.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut line);
        let text = line.render();
        drop(line);

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{text}") {
            tracing::warn!("failed to write readout: {e}");
        }
    }
}

impl Line {
    fn render(&self) -> String {
        let signal = match self.signal {
            Some(Signal::Live) => "live",
            Some(Signal::NoSignal) => "no signal",
            None => "connecting",
        };
        self.position.map_or_else(
            || format!("[{signal}] waiting for first position"),
            |(lat, lon)| format!("[{signal}] {lat:.5}, {lon:.5} at {}", self.label),
        )
    }
}

impl MapSurface for ConsoleSurface {
    fn move_marker(&self, latitude: f64, longitude: f64) {
        tracing::debug!(latitude, longitude, "marker moved");
        self.line.lock().unwrap_or_else(std::sync::PoisonError::into_inner).position =
            Some((latitude, longitude));
    }

    // the label arrives after the marker, so redraw once both are set
    fn set_timestamp_label(&self, label: &str) {
        self.update(|line| label.clone_into(&mut line.label));
    }

    fn set_signal(&self, signal: Signal) {
        self.update(|line| line.signal = Some(signal));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_readout() {
        let mut line = Line::default();
        assert_eq!(line.render(), "[connecting] waiting for first position");

        line.position = Some((-8.1, -79.0));
        line.label = "10:00:00".to_string();
        line.signal = Some(Signal::Live);
        assert_eq!(line.render(), "[live] -8.10000, -79.00000 at 10:00:00");
    }
}
