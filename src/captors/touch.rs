//! Touch gestures: one finger pans, two fingers pinch and rotate
//!
//! Every move is solved from the state at touch start rather than from the
//! previous move, so the gesture never drifts: the graph point first
//! touched stays under the first finger.

use std::time::Instant;

use tracing::trace;

use super::{CaptorEvent, CaptorEventKind, CaptorListeners, CaptorSettings, distance};
use crate::camera::{AnimateOptions, Camera, CameraState, Easing, PartialCameraState};
use crate::events::ListenerId;
use crate::transform::{Coordinates, ViewContext};

/// Raw touch input. Every variant lists the touches still on the surface.
#[derive(Debug, Clone, PartialEq)]
pub enum TouchInput {
    Start { touches: Vec<Coordinates> },
    Move { touches: Vec<Coordinates> },
    End { touches: Vec<Coordinates> },
}

#[derive(Debug)]
pub struct TouchCaptor {
    enabled: bool,
    settings: CaptorSettings,
    listeners: CaptorListeners,

    touch_mode: usize,
    start_touches: Vec<Coordinates>,
    start_angle: f64,
    start_distance: f64,
    start_camera: Option<CameraState>,
    /// The next camera-aware step records the start state
    capture_pending: bool,

    last_touches: Vec<Coordinates>,
    has_moved: bool,
    moving_until: Option<Instant>,
    inertia_pending: bool,
    /// Cleared once a second finger joins the gesture
    tap_candidate: bool,
    last_tap: Option<(Instant, Coordinates)>,
}

impl Default for TouchCaptor {
    fn default() -> Self {
        Self::new(CaptorSettings::default())
    }
}

impl TouchCaptor {
    pub fn new(settings: CaptorSettings) -> Self {
        Self {
            enabled: true,
            settings,
            listeners: CaptorListeners::default(),
            touch_mode: 0,
            start_touches: Vec::new(),
            start_angle: 0.0,
            start_distance: 0.0,
            start_camera: None,
            capture_pending: false,
            last_touches: Vec::new(),
            has_moved: false,
            moving_until: None,
            inertia_pending: false,
            tap_candidate: false,
            last_tap: None,
        }
    }

    pub fn set_settings(&mut self, settings: CaptorSettings) {
        self.settings = settings;
    }

    pub fn settings(&self) -> &CaptorSettings {
        &self.settings
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        self.touch_mode = 0;
        self.start_touches.clear();
    }

    pub fn on(&mut self, listener: impl FnMut(&CaptorEvent) + 'static) -> ListenerId {
        self.listeners.on(listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.off(id)
    }

    /// Number of touches driving the current gesture
    pub fn touch_mode(&self) -> usize {
        self.touch_mode
    }

    pub fn is_moving(&self, now: Instant) -> bool {
        self.moving_until.is_some_and(|until| now < until)
    }

    fn start(&mut self, touches: &[Coordinates]) {
        self.touch_mode = touches.len();
        if touches.len() > 1 {
            self.tap_candidate = false;
        }
        self.start_touches = touches.to_vec();
        if let [first, second, ..] = touches {
            self.start_angle = (second.y - first.y).atan2(second.x - first.x);
            self.start_distance = distance(*first, *second);
        }
        self.last_touches = touches.to_vec();
        self.capture_pending = true;
    }

    /// Recognize an input and notify listeners
    pub fn handle(&mut self, input: TouchInput, now: Instant) -> Vec<CaptorEvent> {
        if !self.enabled {
            return Vec::new();
        }
        let events = match input {
            TouchInput::Start { touches } => match touches.first() {
                Some(first) => {
                    if self.start_touches.is_empty() {
                        self.tap_candidate = true;
                    }
                    let event = CaptorEvent::new(CaptorEventKind::TouchDown, *first);
                    self.start(&touches);
                    vec![event.with_touches(&touches)]
                }
                None => Vec::new(),
            },
            TouchInput::Move { touches } => match touches.first() {
                Some(first) if !self.start_touches.is_empty() => {
                    let event = CaptorEvent::new(CaptorEventKind::TouchMove, *first);
                    self.last_touches = touches.clone();
                    vec![event.with_touches(&touches)]
                }
                _ => Vec::new(),
            },
            TouchInput::End { touches } => self.end(&touches, now),
        };
        self.listeners.deliver(events)
    }

    fn end(&mut self, remaining: &[Coordinates], now: Instant) -> Vec<CaptorEvent> {
        let Some(&down_position) = self.start_touches.first() else {
            return Vec::new();
        };
        let position = self.last_touches.first().copied().unwrap_or(down_position);
        let moving = self.is_moving(now);
        self.moving_until = None;

        if self.touch_mode == 2 && remaining.len() == 1 {
            // Back to one finger: restart a pan from here
            self.start(remaining);
        } else {
            self.inertia_pending = moving;
            self.has_moved = false;
            self.touch_mode = 0;
        }

        let up = CaptorEvent::new(CaptorEventKind::TouchUp, position);
        let mut events = vec![up.with_touches(remaining)];
        if remaining.is_empty() {
            let tapped = std::mem::take(&mut self.tap_candidate);
            if tapped && distance(position, down_position) < self.settings.tap_move_tolerance {
                events.push(self.tap(position, now));
            }
            self.start_touches.clear();
        }
        self.last_touches = remaining.to_vec();
        events
    }

    /// A tap, or a double tap when it closely follows a previous tap
    fn tap(&mut self, position: Coordinates, now: Instant) -> CaptorEvent {
        let double = self.last_tap.is_some_and(|(at, last_position)| {
            now.saturating_duration_since(at) < self.settings.double_click_timeout
                && distance(position, last_position) < self.settings.tap_move_tolerance
        });
        if double {
            self.last_tap = None;
            CaptorEvent::new(CaptorEventKind::DoubleTap, position)
        } else {
            self.last_tap = Some((now, position));
            CaptorEvent::new(CaptorEventKind::Tap, position)
        }
    }

    /// Run the camera behavior of an event, unless it was prevented
    pub fn apply_default(
        &mut self,
        event: &CaptorEvent,
        camera: &mut Camera,
        context: &ViewContext,
        now: Instant,
    ) {
        let boundary = matches!(
            event.kind,
            CaptorEventKind::TouchDown | CaptorEventKind::TouchUp
        );
        if self.capture_pending && boundary {
            self.start_camera = Some(camera.state());
            self.capture_pending = false;
        }
        if !self.enabled || event.is_default_prevented() {
            return;
        }
        match event.kind {
            CaptorEventKind::TouchMove => self.gesture(&event.touches, camera, context, now),
            CaptorEventKind::TouchUp => {
                if std::mem::take(&mut self.inertia_pending) {
                    let state = camera.state();
                    let previous = camera.previous_state().unwrap_or(state);
                    let ratio = self.settings.inertia_ratio;
                    camera.animate(
                        PartialCameraState::position(
                            state.x + ratio * (state.x - previous.x),
                            state.y + ratio * (state.y - previous.y),
                        ),
                        AnimateOptions::new(self.settings.inertia_duration, Easing::QuadraticOut),
                        now,
                        None,
                    );
                }
            }
            CaptorEventKind::DoubleTap => {
                let zoomed = camera.state().ratio / self.settings.double_click_zooming_ratio;
                let ratio = camera.bounded_ratio(zoomed);
                let transform = context.transform(camera.state());
                let target = transform.zoomed_state(event.position, ratio);
                let duration = self.settings.double_click_zooming_duration;
                camera.animate(
                    target.into(),
                    AnimateOptions::new(duration, Easing::QuadraticInOut),
                    now,
                    None,
                );
            }
            _ => {}
        }
    }

    /// `handle` then `apply_default` for every event
    pub fn process(
        &mut self,
        input: TouchInput,
        camera: &mut Camera,
        context: &ViewContext,
        now: Instant,
    ) -> Vec<CaptorEvent> {
        let events = self.handle(input, now);
        for event in &events {
            self.apply_default(event, camera, context, now);
        }
        events
    }

    fn gesture(
        &mut self,
        touches: &[Coordinates],
        camera: &mut Camera,
        context: &ViewContext,
        now: Instant,
    ) {
        let Some(start) = self.start_camera else {
            return;
        };
        // Coming back to the start point still counts as a move
        let mut pairs = touches.iter().zip(&self.start_touches);
        self.has_moved = self.has_moved || pairs.any(|(position, start)| position != start);
        if !self.has_moved {
            return;
        }
        self.moving_until = Some(now + self.settings.drag_timeout);

        match (self.touch_mode, touches, self.start_touches.as_slice()) {
            (1, [current, ..], [first, ..]) => {
                let transform = context.transform(start);
                let from = transform.viewport_to_framed_graph(*first);
                let to = transform.viewport_to_framed_graph(*current);
                camera.set_state(PartialCameraState::position(
                    start.x + from.x - to.x,
                    start.y + from.y - to.y,
                ));
            }
            (2, [t0, t1, ..], [first, ..]) => {
                if self.start_distance <= 0.0 {
                    return;
                }
                let ratio_diff = distance(*t0, *t1) / self.start_distance;
                if ratio_diff.is_nan() || ratio_diff <= 0.0 {
                    return;
                }
                let angle = if camera.enabled_rotation() {
                    start.angle + (t1.y - t0.y).atan2(t1.x - t0.x) - self.start_angle
                } else {
                    start.angle
                };
                let ratio = if camera.enabled_zooming() {
                    camera.bounded_ratio(start.ratio / ratio_diff)
                } else {
                    start.ratio
                };

                // The framed point first touched must end up under the first
                // finger. Framed coordinates shift one to one with the camera
                // position, so solve from a camera placed at the origin.
                let anchor = context.transform(start).viewport_to_framed_graph(*first);
                let origin = CameraState {
                    x: 0.0,
                    y: 0.0,
                    angle,
                    ratio,
                };
                let offset = context.transform(origin).viewport_to_framed_graph(*t0);
                trace!(ratio, angle, "pinch");
                camera.set_state(PartialCameraState {
                    x: Some(anchor.x - offset.x),
                    y: Some(anchor.y - offset.y),
                    angle: Some(angle),
                    ratio: Some(ratio),
                });
            }
            _ => {}
        }
    }
}
