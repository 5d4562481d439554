//! Gesture recognizers driving the camera
//!
//! Captors work in two steps. `handle` turns a raw input into
//! [`CaptorEvent`]s and updates the gesture state; listeners may then call
//! [`CaptorEvent::prevent_default`]. `apply_default` runs the camera
//! behavior of every event that was not prevented. `process` chains both
//! for hosts without listeners of their own.
//!
//! Inputs carry the timestamp they happened at, so timeouts (double click,
//! drag end, wheel coalescing) are decided by comparing instants.

mod mouse;
mod touch;

use std::time::Duration;

use crate::events::{DefaultPrevented, Emitter, ListenerId};
use crate::settings::Settings;
use crate::transform::Coordinates;

pub use mouse::{MouseButton, MouseCaptor, MouseInput, wheel_delta_from_pixels};
pub use touch::{TouchCaptor, TouchInput};

/// Timing and ratio constants shared by both captors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptorSettings {
    pub double_click_timeout: Duration,
    pub double_click_zooming_duration: Duration,
    pub double_click_zooming_ratio: f64,
    pub dragged_events_tolerance: u32,
    pub drag_timeout: Duration,
    pub inertia_duration: Duration,
    pub inertia_ratio: f64,
    pub zoom_duration: Duration,
    pub zooming_ratio: f64,
    pub tap_move_tolerance: f64,
}

impl Default for CaptorSettings {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for CaptorSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            double_click_timeout: Settings::millis(settings.double_click_timeout),
            double_click_zooming_duration: Settings::millis(settings.double_click_zooming_duration),
            double_click_zooming_ratio: settings.double_click_zooming_ratio,
            dragged_events_tolerance: settings.dragged_events_tolerance,
            drag_timeout: Settings::millis(settings.drag_timeout),
            inertia_duration: Settings::millis(settings.inertia_duration),
            inertia_ratio: settings.inertia_ratio,
            zoom_duration: Settings::millis(settings.zoom_duration),
            zooming_ratio: settings.zooming_ratio,
            tap_move_tolerance: settings.tap_move_tolerance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptorEventKind {
    Click,
    RightClick,
    DoubleClick,
    MouseDown,
    MouseUp,
    MouseMove,
    /// Pointer moved anywhere, inside the stage or not
    MouseMoveBody,
    MouseLeave,
    MouseEnter,
    Wheel,
    TouchDown,
    TouchUp,
    TouchMove,
    Tap,
    DoubleTap,
}

/// A recognized gesture step
#[derive(Debug, Clone, PartialEq)]
pub struct CaptorEvent {
    pub kind: CaptorEventKind,
    /// Viewport position in pixels. For touch events, the first touch.
    pub position: Coordinates,
    /// Normalised wheel delta, positive when zooming in
    pub delta: Option<f64>,
    /// Every active touch, for touch events
    pub touches: Vec<Coordinates>,
    pub prevented: DefaultPrevented,
}

impl CaptorEvent {
    pub fn new(kind: CaptorEventKind, position: Coordinates) -> Self {
        Self {
            kind,
            position,
            delta: None,
            touches: Vec::new(),
            prevented: DefaultPrevented::default(),
        }
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = Some(delta);
        self
    }

    pub fn with_touches(mut self, touches: &[Coordinates]) -> Self {
        self.touches = touches.to_vec();
        self
    }

    /// Skip the camera behavior normally attached to this event
    pub fn prevent_default(&self) {
        self.prevented.prevent();
    }

    pub fn is_default_prevented(&self) -> bool {
        self.prevented.is_prevented()
    }
}

/// Listener plumbing shared by both captors
#[derive(Debug, Default)]
struct CaptorListeners {
    emitter: Emitter<CaptorEvent>,
}

impl CaptorListeners {
    fn on(&mut self, listener: impl FnMut(&CaptorEvent) + 'static) -> ListenerId {
        self.emitter.on(listener)
    }

    fn off(&mut self, id: ListenerId) -> bool {
        self.emitter.off(id)
    }

    /// Deliver events in order and hand them back
    fn deliver(&mut self, events: Vec<CaptorEvent>) -> Vec<CaptorEvent> {
        for event in &events {
            self.emitter.emit(event);
        }
        events
    }
}

fn distance(a: Coordinates, b: Coordinates) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_convert_to_durations() {
        let settings = Settings {
            zoom_duration: 400,
            ..Settings::default()
        };
        let captor = CaptorSettings::from(&settings);
        assert_eq!(captor.zoom_duration, Duration::from_millis(400));
        assert_eq!(captor.double_click_timeout, Duration::from_millis(300));
        assert_eq!(captor.dragged_events_tolerance, 3);
    }

    #[test]
    fn prevention_is_visible_on_clones() {
        let event = CaptorEvent::new(CaptorEventKind::Click, Coordinates::new(1.0, 1.0));
        let delivered = event.clone();
        delivered.prevent_default();
        assert!(event.is_default_prevented());
    }
}
