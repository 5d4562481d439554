//! Mouse gestures: drag to pan, wheel and double click to zoom

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use tracing::trace;

use super::{CaptorEvent, CaptorEventKind, CaptorListeners, CaptorSettings};
use crate::camera::{AnimateOptions, Camera, Easing, PartialCameraState};
use crate::events::ListenerId;
use crate::transform::{Coordinates, ViewContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Raw mouse input, in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseInput {
    Down {
        position: Coordinates,
        button: MouseButton,
    },
    Up {
        position: Coordinates,
        button: MouseButton,
    },
    Move { position: Coordinates },
    /// `delta` is normalised, positive when zooming in
    Wheel { position: Coordinates, delta: f64 },
    Leave { position: Coordinates },
    Enter { position: Coordinates },
}

/// Normalise a pixel wheel delta (positive when scrolling down)
pub fn wheel_delta_from_pixels(delta_y: f64) -> f64 {
    delta_y * -3.0 / 360.0
}

#[derive(Debug)]
pub struct MouseCaptor {
    enabled: bool,
    settings: CaptorSettings,
    listeners: CaptorListeners,

    is_mouse_down: bool,
    last_mouse: Option<Coordinates>,
    dragged_events: u32,
    /// The pointer counts as moving until then
    moving_until: Option<Instant>,

    clicks: u32,
    last_click: Option<Instant>,

    /// Direction of the wheel zoom in flight, reset when it completes
    wheel_direction: Rc<Cell<i8>>,
    last_wheel_trigger: Option<Instant>,
}

impl Default for MouseCaptor {
    fn default() -> Self {
        Self::new(CaptorSettings::default())
    }
}

impl MouseCaptor {
    pub fn new(settings: CaptorSettings) -> Self {
        Self {
            enabled: true,
            settings,
            listeners: CaptorListeners::default(),
            is_mouse_down: false,
            last_mouse: None,
            dragged_events: 0,
            moving_until: None,
            clicks: 0,
            last_click: None,
            wheel_direction: Rc::new(Cell::new(0)),
            last_wheel_trigger: None,
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
        self.is_mouse_down = false;
    }

    pub fn on(&mut self, listener: impl FnMut(&CaptorEvent) + 'static) -> ListenerId {
        self.listeners.on(listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.off(id)
    }

    pub fn is_mouse_down(&self) -> bool {
        self.is_mouse_down
    }

    /// Whether a drag moved recently enough to carry inertia
    pub fn is_moving(&self, now: Instant) -> bool {
        self.moving_until.is_some_and(|until| now < until)
    }

    pub fn dragged_events(&self) -> u32 {
        self.dragged_events
    }

    /// Direction of the wheel zoom in flight: 1 in, -1 out, 0 none
    pub fn wheel_direction(&self) -> i8 {
        self.wheel_direction.get()
    }

    /// Recognize an input and notify listeners
    pub fn handle(&mut self, input: MouseInput, now: Instant) -> Vec<CaptorEvent> {
        if !self.enabled {
            return Vec::new();
        }
        let events = match input {
            MouseInput::Down { position, button } => {
                if button == MouseButton::Left {
                    self.is_mouse_down = true;
                    self.last_mouse = Some(position);
                    self.dragged_events = 0;
                }
                vec![CaptorEvent::new(CaptorEventKind::MouseDown, position)]
            }
            MouseInput::Up { position, button } => self.handle_up(position, button, now),
            MouseInput::Move { position } => vec![
                CaptorEvent::new(CaptorEventKind::MouseMoveBody, position),
                CaptorEvent::new(CaptorEventKind::MouseMove, position),
            ],
            MouseInput::Wheel { position, delta } => {
                if delta == 0.0 || !delta.is_finite() {
                    Vec::new()
                } else {
                    vec![CaptorEvent::new(CaptorEventKind::Wheel, position).with_delta(delta)]
                }
            }
            MouseInput::Leave { position } => {
                vec![CaptorEvent::new(CaptorEventKind::MouseLeave, position)]
            }
            MouseInput::Enter { position } => {
                vec![CaptorEvent::new(CaptorEventKind::MouseEnter, position)]
            }
        };
        self.listeners.deliver(events)
    }

    fn handle_up(
        &mut self,
        position: Coordinates,
        button: MouseButton,
        now: Instant,
    ) -> Vec<CaptorEvent> {
        let mut events = Vec::new();
        match button {
            MouseButton::Left => {
                if self.is_mouse_down {
                    events.push(CaptorEvent::new(CaptorEventKind::MouseUp, position));
                }
                let timeout = self.settings.double_click_timeout;
                let within_timeout = self
                    .last_click
                    .is_some_and(|last| now.saturating_duration_since(last) < timeout);
                if self.clicks == 1 && within_timeout {
                    self.clicks = 0;
                    self.last_click = None;
                    events.push(CaptorEvent::new(CaptorEventKind::DoubleClick, position));
                } else {
                    self.clicks = 1;
                    self.last_click = Some(now);
                    // drags are not clicks
                    if self.dragged_events < self.settings.dragged_events_tolerance {
                        events.push(CaptorEvent::new(CaptorEventKind::Click, position));
                    }
                }
            }
            MouseButton::Right => {
                events.push(CaptorEvent::new(CaptorEventKind::RightClick, position));
            }
            MouseButton::Middle => {}
        }
        events
    }

    /// Run the camera behavior of an event, unless it was prevented
    pub fn apply_default(
        &mut self,
        event: &CaptorEvent,
        camera: &mut Camera,
        context: &ViewContext,
        now: Instant,
    ) {
        if !self.enabled || event.is_default_prevented() {
            return;
        }
        match event.kind {
            CaptorEventKind::MouseMove => self.drag(event.position, camera, context, now),
            CaptorEventKind::MouseUp => self.release(camera, now),
            CaptorEventKind::Wheel => {
                if let Some(delta) = event.delta {
                    self.wheel(event.position, delta, camera, context, now);
                }
            }
            CaptorEventKind::DoubleClick => {
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
        input: MouseInput,
        camera: &mut Camera,
        context: &ViewContext,
        now: Instant,
    ) -> Vec<CaptorEvent> {
        let events = self.handle(input, now);
        for event in &events {
            self.apply_default(event, camera, context, now);
        }
        self.finish(&events);
        events
    }

    /// Close the gesture once every event of an input has been applied
    pub fn finish(&mut self, events: &[CaptorEvent]) {
        let released = |event: &CaptorEvent| event.kind == CaptorEventKind::MouseUp;
        if events.iter().any(released) {
            self.dragged_events = 0;
        }
    }

    fn drag(
        &mut self,
        position: Coordinates,
        camera: &mut Camera,
        context: &ViewContext,
        now: Instant,
    ) {
        if !self.is_mouse_down {
            return;
        }
        let Some(last) = self.last_mouse else {
            self.last_mouse = Some(position);
            return;
        };
        self.dragged_events += 1;
        self.moving_until = Some(now + self.settings.drag_timeout);

        // Convert both positions, so the pan follows the pointer under any
        // rotation or zoom
        let transform = context.transform(camera.state());
        let from = transform.viewport_to_framed_graph(last);
        let to = transform.viewport_to_framed_graph(position);
        let state = camera.state();
        camera.set_state(PartialCameraState::position(
            state.x + from.x - to.x,
            state.y + from.y - to.y,
        ));
        self.last_mouse = Some(position);
    }

    fn release(&mut self, camera: &mut Camera, now: Instant) {
        self.is_mouse_down = false;
        if self.is_moving(now) {
            let state = camera.state();
            let previous = camera.previous_state().unwrap_or(state);
            let ratio = self.settings.inertia_ratio;
            trace!(ratio, "drag released while moving, applying inertia");
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
        self.moving_until = None;
    }

    fn wheel(
        &mut self,
        position: Coordinates,
        delta: f64,
        camera: &mut Camera,
        context: &ViewContext,
        now: Instant,
    ) {
        if !camera.enabled_zooming() {
            return;
        }
        let current = camera.state().ratio;
        let factor = if delta > 0.0 {
            1.0 / self.settings.zooming_ratio
        } else {
            self.settings.zooming_ratio
        };
        let ratio = camera.bounded_ratio(current * factor);
        if ratio == current {
            return;
        }

        // Coalesce bursts of same-direction wheel events
        let direction: i8 = if delta > 0.0 { 1 } else { -1 };
        let cooldown = self.settings.zoom_duration / 5;
        let too_close = self
            .last_wheel_trigger
            .is_some_and(|last| now.saturating_duration_since(last) < cooldown);
        if self.wheel_direction.get() == direction && too_close {
            return;
        }

        let transform = context.transform(camera.state());
        let target = transform.zoomed_state(position, ratio);
        let wheel_direction = Rc::clone(&self.wheel_direction);
        camera.animate(
            target.into(),
            AnimateOptions::new(self.settings.zoom_duration, Easing::QuadraticOut),
            now,
            Some(Box::new(move || wheel_direction.set(0))),
        );
        self.wheel_direction.set(direction);
        self.last_wheel_trigger = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::captors::CaptorEventKind::{Click, DoubleClick, MouseUp, RightClick, Wheel};
    use crate::transform::Dimensions;

    fn context() -> ViewContext {
        ViewContext {
            dimensions: Dimensions::new(800.0, 600.0),
            graph_dimensions: Dimensions::new(1.0, 1.0),
            padding: 0.0,
        }
    }

    fn kinds(events: &[CaptorEvent]) -> Vec<CaptorEventKind> {
        events.iter().map(|event| event.kind).collect()
    }

    fn down(x: f64, y: f64) -> MouseInput {
        MouseInput::Down {
            position: Coordinates::new(x, y),
            button: MouseButton::Left,
        }
    }

    fn up(x: f64, y: f64) -> MouseInput {
        MouseInput::Up {
            position: Coordinates::new(x, y),
            button: MouseButton::Left,
        }
    }

    #[test]
    fn press_and_release_is_a_click() {
        let mut captor = MouseCaptor::default();
        let mut camera = Camera::new();
        let now = Instant::now();

        captor.process(down(10.0, 10.0), &mut camera, &context(), now);
        let events = captor.process(up(10.0, 10.0), &mut camera, &context(), now);
        assert_eq!(kinds(&events), vec![MouseUp, Click]);
    }

    #[test]
    fn second_click_within_timeout_is_a_double_click() {
        let mut captor = MouseCaptor::default();
        let mut camera = Camera::new();
        let start = Instant::now();

        captor.process(down(10.0, 10.0), &mut camera, &context(), start);
        captor.process(up(10.0, 10.0), &mut camera, &context(), start);
        let later = start + Duration::from_millis(100);
        captor.process(down(10.0, 10.0), &mut camera, &context(), later);
        let events = captor.process(up(10.0, 10.0), &mut camera, &context(), later);
        assert_eq!(kinds(&events), vec![MouseUp, DoubleClick]);
        assert!(camera.is_animated());

        camera.tick(later + Duration::from_secs(1));
        assert!((camera.state().ratio - 1.0 / 2.2).abs() < 1e-9);
    }

    #[test]
    fn slow_second_click_is_a_click() {
        let mut captor = MouseCaptor::default();
        let mut camera = Camera::new();
        let start = Instant::now();

        captor.process(down(10.0, 10.0), &mut camera, &context(), start);
        captor.process(up(10.0, 10.0), &mut camera, &context(), start);
        let later = start + Duration::from_millis(400);
        captor.process(down(10.0, 10.0), &mut camera, &context(), later);
        let events = captor.process(up(10.0, 10.0), &mut camera, &context(), later);
        assert_eq!(kinds(&events), vec![MouseUp, Click]);
    }

    #[test]
    fn drag_pans_and_suppresses_click() {
        let mut captor = MouseCaptor::default();
        let mut camera = Camera::new();
        let context = context();
        let now = Instant::now();

        let framed_at = |camera: &Camera, x: f64, y: f64| {
            let transform = context.transform(camera.state());
            transform.viewport_to_framed_graph(Coordinates::new(x, y))
        };

        captor.process(down(400.0, 300.0), &mut camera, &context, now);
        let anchor = framed_at(&camera, 400.0, 300.0);
        for step in 1..=5 {
            let position = Coordinates::new(400.0 + 10.0 * f64::from(step), 300.0);
            captor.process(MouseInput::Move { position }, &mut camera, &context, now);
        }
        assert_eq!(captor.dragged_events(), 5);

        // The grabbed point stays under the pointer
        let under = framed_at(&camera, 450.0, 300.0);
        assert!((under.x - anchor.x).abs() < 1e-9);
        assert!((under.y - anchor.y).abs() < 1e-9);

        let release = now + Duration::from_millis(500);
        let events = captor.process(up(450.0, 300.0), &mut camera, &context, release);
        assert_eq!(kinds(&events), vec![MouseUp]);
        assert!(!camera.is_animated(), "no inertia once the pointer stopped");
        assert_eq!(captor.dragged_events(), 0);
    }

    #[test]
    fn release_while_moving_applies_inertia() {
        let mut captor = MouseCaptor::default();
        let mut camera = Camera::new();
        let context = context();
        let now = Instant::now();

        captor.process(down(400.0, 300.0), &mut camera, &context, now);
        captor.process(
            MouseInput::Move {
                position: Coordinates::new(420.0, 300.0),
            },
            &mut camera,
            &context,
            now,
        );
        let state = camera.state();
        let previous = camera.previous_state().unwrap();
        let later = now + Duration::from_millis(10);
        captor.process(up(420.0, 300.0), &mut camera, &context, later);
        assert!(camera.is_animated());

        camera.tick(now + Duration::from_secs(1));
        let expected = state.x + 3.0 * (state.x - previous.x);
        assert!((camera.state().x - expected).abs() < 1e-9);
    }

    #[test]
    fn wheel_zooms_around_the_pointer() {
        let mut captor = MouseCaptor::default();
        let mut camera = Camera::new();
        let context = context();
        let now = Instant::now();
        let pointer = Coordinates::new(100.0, 100.0);
        let before = context
            .transform(camera.state())
            .viewport_to_framed_graph(pointer);

        captor.process(
            MouseInput::Wheel {
                position: pointer,
                delta: wheel_delta_from_pixels(-100.0),
            },
            &mut camera,
            &context,
            now,
        );
        assert_eq!(captor.wheel_direction(), 1);
        camera.tick(now + Duration::from_secs(1));
        assert_eq!(captor.wheel_direction(), 0);

        assert!((camera.state().ratio - 1.0 / 1.7).abs() < 1e-9);
        let after = context
            .transform(camera.state())
            .viewport_to_framed_graph(pointer);
        assert!((after.x - before.x).abs() < 1e-9);
        assert!((after.y - before.y).abs() < 1e-9);
    }

    #[test]
    fn wheel_bursts_are_coalesced() {
        let mut captor = MouseCaptor::default();
        let mut camera = Camera::new();
        let context = context();
        let now = Instant::now();
        let wheel = MouseInput::Wheel {
            position: Coordinates::new(400.0, 300.0),
            delta: 1.0,
        };

        captor.process(wheel, &mut camera, &context, now);
        let later = now + Duration::from_millis(10);
        captor.process(wheel, &mut camera, &context, later);
        camera.tick(now + Duration::from_secs(1));
        assert!((camera.state().ratio - 1.0 / 1.7).abs() < 1e-9);
    }

    #[test]
    fn wheel_at_ratio_bound_does_nothing() {
        let mut captor = MouseCaptor::default();
        let mut camera = Camera::new();
        camera.set_ratio_bounds(Some(1.0), None);
        let events = captor.process(
            MouseInput::Wheel {
                position: Coordinates::new(1.0, 1.0),
                delta: 1.0,
            },
            &mut camera,
            &context(),
            Instant::now(),
        );
        assert_eq!(kinds(&events), vec![Wheel]);
        assert!(!camera.is_animated());
    }

    #[test]
    fn prevented_double_click_does_not_zoom() {
        let mut captor = MouseCaptor::default();
        captor.on(|event| {
            if event.kind == CaptorEventKind::DoubleClick {
                event.prevent_default();
            }
        });
        let mut camera = Camera::new();
        let now = Instant::now();
        for input in [down(1.0, 1.0), up(1.0, 1.0), down(1.0, 1.0), up(1.0, 1.0)] {
            captor.process(input, &mut camera, &context(), now);
        }
        assert!(!camera.is_animated());
    }

    #[test]
    fn right_button_only_reports_right_click() {
        let mut captor = MouseCaptor::default();
        let mut camera = Camera::new();
        let events = captor.process(
            MouseInput::Up {
                position: Coordinates::new(5.0, 5.0),
                button: MouseButton::Right,
            },
            &mut camera,
            &context(),
            Instant::now(),
        );
        assert_eq!(kinds(&events), vec![RightClick]);
    }

    #[test]
    fn disabled_captor_is_silent() {
        let mut captor = MouseCaptor::default();
        captor.disable();
        assert!(captor.handle(down(1.0, 1.0), Instant::now()).is_empty());
    }
}
