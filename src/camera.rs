//! Camera state, validation and animation
//!
//! The camera looks at framed graph space: `(x, y)` is the framed point shown
//! at the viewport center, `ratio` is the zoom (smaller is closer) and
//! `angle` the rotation in radians.
//!
//! Animations are driven by the host clock. [`Camera::animate`] records a
//! target and [`Camera::tick`] advances it from an [`Instant`]; nothing here
//! owns a timer.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::events::{Emitter, ListenerId};
use crate::transform::{Coordinates, Dimensions, Extent, ViewContext};

/// Zoom factor used by [`Camera::animated_zoom`] and [`Camera::animated_unzoom`]
pub const DEFAULT_ZOOMING_FACTOR: f64 = 1.5;

/// Default animation length
pub const DEFAULT_ANIMATION_DURATION: Duration = Duration::from_millis(150);

/// Position, zoom and rotation of the camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub ratio: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            angle: 0.0,
            ratio: 1.0,
        }
    }
}

impl CameraState {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.angle.is_finite() && self.ratio.is_finite()
    }

    fn merge(self, partial: PartialCameraState) -> Self {
        Self {
            x: partial.x.unwrap_or(self.x),
            y: partial.y.unwrap_or(self.y),
            angle: partial.angle.unwrap_or(self.angle),
            ratio: partial.ratio.unwrap_or(self.ratio),
        }
    }
}

/// Camera update where absent fields are left unchanged
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PartialCameraState {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub angle: Option<f64>,
    pub ratio: Option<f64>,
}

impl PartialCameraState {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn ratio(ratio: f64) -> Self {
        Self {
            ratio: Some(ratio),
            ..Self::default()
        }
    }

    pub fn angle(angle: f64) -> Self {
        Self {
            angle: Some(angle),
            ..Self::default()
        }
    }
}

impl From<CameraState> for PartialCameraState {
    fn from(state: CameraState) -> Self {
        Self {
            x: Some(state.x),
            y: Some(state.y),
            angle: Some(state.angle),
            ratio: Some(state.ratio),
        }
    }
}

// ===== Easings =====

/// Easing curves mapping elapsed fraction `t` to progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    Linear,
    QuadraticIn,
    QuadraticOut,
    #[default]
    QuadraticInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::QuadraticIn => t * t,
            Easing::QuadraticOut => t * (2.0 - t),
            Easing::QuadraticInOut => {
                let t = t * 2.0;
                if t < 1.0 {
                    0.5 * t * t
                } else {
                    let t = t - 1.0;
                    -0.5 * (t * (t - 2.0) - 1.0)
                }
            }
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => {
                let t = t - 1.0;
                t * t * t + 1.0
            }
            Easing::CubicInOut => {
                let t = t * 2.0;
                if t < 1.0 {
                    0.5 * t * t * t
                } else {
                    let t = t - 2.0;
                    0.5 * (t * t * t + 2.0)
                }
            }
        }
    }
}

/// Duration and curve of a camera animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimateOptions {
    pub duration: Duration,
    pub easing: Easing,
}

impl Default for AnimateOptions {
    fn default() -> Self {
        Self {
            duration: DEFAULT_ANIMATION_DURATION,
            easing: Easing::QuadraticInOut,
        }
    }
}

impl AnimateOptions {
    pub fn new(duration: Duration, easing: Easing) -> Self {
        Self { duration, easing }
    }
}

/// Called exactly once when an animation completes, is superseded or is
/// cancelled
pub type AnimationCallback = Box<dyn FnOnce()>;

struct Animation {
    start: Instant,
    initial: CameraState,
    target: PartialCameraState,
    options: AnimateOptions,
    callback: Option<AnimationCallback>,
}

impl fmt::Debug for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("start", &self.start)
            .field("initial", &self.initial)
            .field("target", &self.target)
            .field("options", &self.options)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

// ===== Pan boundaries =====

/// Keeps a framed-space box reachable: after every update the camera is
/// nudged so the box does not drift out of the viewport by more than
/// `tolerance` pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanBoundaries {
    pub extent: Extent,
    pub context: ViewContext,
    pub tolerance: f64,
}

impl PanBoundaries {
    pub fn clean(&self, state: CameraState) -> CameraState {
        let transform = self.context.transform(state);
        let Dimensions { width, height } = self.context.dimensions;
        let [x0, x1] = self.extent.x;
        let [y0, y1] = self.extent.y;
        let corners = [(x0, y0), (x1, y0), (x0, y1), (x1, y1)]
            .map(|(x, y)| transform.framed_graph_to_viewport(Coordinates::new(x, y)));

        let fold = |f: fn(f64, f64) -> f64, init: f64, axis: fn(&Coordinates) -> f64| {
            corners.iter().map(axis).fold(init, f)
        };
        let x_min = fold(f64::min, f64::INFINITY, |c| c.x);
        let x_max = fold(f64::max, f64::NEG_INFINITY, |c| c.x);
        let y_min = fold(f64::min, f64::INFINITY, |c| c.y);
        let y_max = fold(f64::max, f64::NEG_INFINITY, |c| c.y);

        let dx = axis_shift(x_min, x_max, width, self.tolerance);
        let dy = axis_shift(y_min, y_max, height, self.tolerance);
        if dx == 0.0 && dy == 0.0 {
            return state;
        }

        let origin = transform.viewport_to_framed_graph(Coordinates::new(0.0, 0.0));
        let shifted = transform.viewport_to_framed_graph(Coordinates::new(dx, dy));
        CameraState {
            x: state.x + shifted.x - origin.x,
            y: state.y + shifted.y - origin.y,
            ..state
        }
    }
}

/// Pixel shift along one axis bringing `[min, max]` back within bounds
fn axis_shift(min: f64, max: f64, size: f64, tolerance: f64) -> f64 {
    if max - min >= size {
        // larger than the viewport: no gap may open on either side
        if max < size - tolerance {
            max - (size - tolerance)
        } else if min > tolerance {
            min - tolerance
        } else {
            0.0
        }
    } else if max > size + tolerance {
        max - (size + tolerance)
    } else if min < -tolerance {
        min + tolerance
    } else {
        0.0
    }
}

// ===== Camera =====

/// Camera with validation, change notification and timed animations
#[derive(Debug)]
pub struct Camera {
    state: CameraState,
    previous_state: Option<CameraState>,
    min_ratio: Option<f64>,
    max_ratio: Option<f64>,
    enabled: bool,
    enabled_zooming: bool,
    enabled_panning: bool,
    enabled_rotation: bool,
    boundaries: Option<PanBoundaries>,
    animation: Option<Animation>,
    listeners: Emitter<CameraState>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::from_state(CameraState::default())
    }

    pub fn from_state(state: CameraState) -> Self {
        Self {
            state,
            previous_state: None,
            min_ratio: None,
            max_ratio: None,
            enabled: true,
            enabled_zooming: true,
            enabled_panning: true,
            enabled_rotation: true,
            boundaries: None,
            animation: None,
            listeners: Emitter::new(),
        }
    }

    /// Detached copy with the same state and configuration, but no listeners
    /// and no running animation
    pub fn copy(&self) -> Self {
        Self {
            state: self.state,
            previous_state: self.previous_state,
            min_ratio: self.min_ratio,
            max_ratio: self.max_ratio,
            enabled: self.enabled,
            enabled_zooming: self.enabled_zooming,
            enabled_panning: self.enabled_panning,
            enabled_rotation: self.enabled_rotation,
            boundaries: self.boundaries,
            animation: None,
            listeners: Emitter::new(),
        }
    }

    // ===== Configuration =====

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// A disabled camera ignores every update and animation
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_ratio_bounds(&mut self, min: Option<f64>, max: Option<f64>) {
        self.min_ratio = min;
        self.max_ratio = max;
    }

    pub fn set_enabled_zooming(&mut self, enabled: bool) {
        self.enabled_zooming = enabled;
    }

    pub fn set_enabled_panning(&mut self, enabled: bool) {
        self.enabled_panning = enabled;
    }

    pub fn set_enabled_rotation(&mut self, enabled: bool) {
        self.enabled_rotation = enabled;
    }

    pub fn enabled_zooming(&self) -> bool {
        self.enabled_zooming
    }

    pub fn enabled_panning(&self) -> bool {
        self.enabled_panning
    }

    pub fn enabled_rotation(&self) -> bool {
        self.enabled_rotation
    }

    pub fn set_pan_boundaries(&mut self, boundaries: Option<PanBoundaries>) {
        self.boundaries = boundaries;
    }

    pub fn pan_boundaries(&self) -> Option<&PanBoundaries> {
        self.boundaries.as_ref()
    }

    // ===== Events =====

    /// Listen to state changes. Only fires when the state actually changed.
    pub fn on_update(&mut self, listener: impl FnMut(&CameraState) + 'static) -> ListenerId {
        self.listeners.on(listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.off(id)
    }

    // ===== State =====

    pub fn state(&self) -> CameraState {
        self.state
    }

    /// State before the last update
    pub fn previous_state(&self) -> Option<CameraState> {
        self.previous_state
    }

    pub fn has_state(&self, state: &CameraState) -> bool {
        self.state == *state
    }

    /// Clamp a ratio to the configured bounds
    pub fn bounded_ratio(&self, ratio: f64) -> f64 {
        let mut bounded = ratio;
        if let Some(min) = self.min_ratio {
            bounded = bounded.max(min);
        }
        if let Some(max) = self.max_ratio {
            bounded = bounded.min(max);
        }
        bounded
    }

    /// Drop disabled or non-finite fields, clamp the ratio and apply pan
    /// boundaries
    pub fn validate_state(&self, state: PartialCameraState) -> PartialCameraState {
        let finite = |value: Option<f64>| value.filter(|v| v.is_finite());
        let mut valid = PartialCameraState::default();
        if self.enabled_panning {
            valid.x = finite(state.x);
            valid.y = finite(state.y);
        }
        if self.enabled_zooming {
            valid.ratio = finite(state.ratio)
                .map(|ratio| self.bounded_ratio(ratio))
                .filter(|ratio| ratio.is_finite() && *ratio > 0.0);
        }
        if self.enabled_rotation {
            valid.angle = finite(state.angle);
        }
        match &self.boundaries {
            Some(boundaries) => boundaries.clean(self.state.merge(valid)).into(),
            None => valid,
        }
    }

    /// Apply an update. Listeners fire only if the state changed.
    pub fn set_state(&mut self, state: PartialCameraState) {
        if !self.enabled {
            return;
        }
        let previous = self.state;
        let next = self.state.merge(self.validate_state(state));
        self.previous_state = Some(previous);
        if !next.is_finite() {
            return;
        }
        self.state = next;
        if next != previous {
            self.listeners.emit(&next);
        }
    }

    /// Apply an update computed from the current state
    pub fn update_state(&mut self, update: impl FnOnce(CameraState) -> PartialCameraState) {
        let state = update(self.state);
        self.set_state(state);
    }

    // ===== Animation =====

    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }

    /// Start animating towards `target`. An animation already in flight is
    /// superseded and its callback invoked.
    pub fn animate(
        &mut self,
        target: PartialCameraState,
        options: AnimateOptions,
        now: Instant,
        callback: Option<AnimationCallback>,
    ) {
        if !self.enabled {
            if let Some(callback) = callback {
                callback();
            }
            return;
        }
        self.cancel_animation();
        let target = self.validate_state(target);
        self.animation = Some(Animation {
            start: now,
            initial: self.state,
            target,
            options,
            callback,
        });
    }

    /// Advance the running animation. Returns true while it is still going.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(animation) = &self.animation else {
            return false;
        };
        let duration = animation.options.duration.as_secs_f64();
        let elapsed = now.saturating_duration_since(animation.start).as_secs_f64();
        let t = if duration > 0.0 { elapsed / duration } else { 1.0 };

        if t >= 1.0 {
            if let Some(animation) = self.animation.take() {
                self.set_state(animation.target);
                if let Some(callback) = animation.callback {
                    callback();
                }
            }
            return false;
        }

        let k = animation.options.easing.apply(t);
        let initial = animation.initial;
        let target = animation.target;
        let lerp = |from: f64, to: Option<f64>| to.map(|to| from + (to - from) * k);
        self.set_state(PartialCameraState {
            x: lerp(initial.x, target.x),
            y: lerp(initial.y, target.y),
            angle: lerp(initial.angle, target.angle),
            ratio: lerp(initial.ratio, target.ratio),
        });
        true
    }

    /// Stop the running animation where it is, invoking its callback
    pub fn cancel_animation(&mut self) {
        if let Some(animation) = self.animation.take() {
            if let Some(callback) = animation.callback {
                callback();
            }
        }
    }

    /// Zoom in by `factor` around the current center
    pub fn animated_zoom(&mut self, factor: f64, options: AnimateOptions, now: Instant) {
        let ratio = self.state.ratio / factor;
        self.animate(PartialCameraState::ratio(ratio), options, now, None);
    }

    /// Zoom out by `factor` around the current center
    pub fn animated_unzoom(&mut self, factor: f64, options: AnimateOptions, now: Instant) {
        let ratio = self.state.ratio * factor;
        self.animate(PartialCameraState::ratio(ratio), options, now, None);
    }

    /// Animate back to the default state
    pub fn animated_reset(&mut self, options: AnimateOptions, now: Instant) {
        self.animate(CameraState::default().into(), options, now, None);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn camera_default_values() {
        let camera = Camera::new();
        let state = camera.state();
        assert_eq!((state.x, state.y), (0.5, 0.5));
        assert_eq!((state.angle, state.ratio), (0.0, 1.0));
        assert!(camera.previous_state().is_none());
        assert!(!camera.is_animated());
    }

    #[test]
    fn set_state_notifies_only_on_change() {
        let mut camera = Camera::new();
        let updates = Rc::new(Cell::new(0));
        let counter = Rc::clone(&updates);
        camera.on_update(move |_| counter.set(counter.get() + 1));

        camera.set_state(PartialCameraState::position(0.5, 0.5));
        assert_eq!(updates.get(), 0);
        camera.set_state(PartialCameraState::position(0.2, 0.3));
        assert_eq!(updates.get(), 1);
        assert_eq!(camera.previous_state().unwrap().x, 0.5);
    }

    #[test]
    fn bounded_ratio_clamps_and_is_monotonic() {
        let mut camera = Camera::new();
        camera.set_ratio_bounds(Some(0.1), Some(10.0));
        let inputs = [0.001, 0.05, 0.1, 0.5, 1.0, 7.0, 10.0, 50.0, 1e6];
        let outputs: Vec<f64> = inputs.iter().map(|r| camera.bounded_ratio(*r)).collect();
        for pair in outputs.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        for value in outputs {
            assert!((0.1..=10.0).contains(&value));
        }
        camera.set_state(PartialCameraState::ratio(100.0));
        assert_eq!(camera.state().ratio, 10.0);
    }

    #[test]
    fn disabled_axes_are_ignored() {
        let mut camera = Camera::new();
        camera.set_enabled_rotation(false);
        camera.set_enabled_panning(false);
        let moved = CameraState {
            x: 3.0,
            y: 3.0,
            angle: 1.0,
            ratio: 2.0,
        };
        camera.set_state(moved.into());
        let expected = CameraState {
            ratio: 2.0,
            ..CameraState::default()
        };
        assert_eq!(camera.state(), expected);

        camera.disable();
        camera.set_state(PartialCameraState::ratio(4.0));
        assert_eq!(camera.state().ratio, 2.0);
    }

    #[test]
    fn non_finite_values_are_dropped() {
        let mut camera = Camera::new();
        camera.set_state(PartialCameraState {
            x: Some(f64::NAN),
            ratio: Some(f64::INFINITY),
            ..Default::default()
        });
        assert_eq!(camera.state(), CameraState::default());
    }

    #[test]
    fn animation_reaches_target() {
        let mut camera = Camera::new();
        let start = Instant::now();
        camera.animate(
            PartialCameraState::position(1.5, -0.5),
            AnimateOptions::new(ms(100), Easing::Linear),
            start,
            None,
        );
        assert!(camera.is_animated());

        assert!(camera.tick(start + ms(50)));
        let halfway = camera.state();
        assert!((halfway.x - 1.0).abs() < 1e-9);
        assert!((halfway.y - 0.0).abs() < 1e-9);

        assert!(!camera.tick(start + ms(120)));
        assert_eq!(camera.state().x, 1.5);
        assert_eq!(camera.state().y, -0.5);
        assert!(!camera.is_animated());
    }

    #[test]
    fn superseded_animation_runs_its_callback() {
        let mut camera = Camera::new();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let start = Instant::now();

        let first = Rc::clone(&calls);
        camera.animate(
            PartialCameraState::ratio(2.0),
            AnimateOptions::default(),
            start,
            Some(Box::new(move || first.borrow_mut().push("first"))),
        );
        let second = Rc::clone(&calls);
        camera.animate(
            PartialCameraState::ratio(3.0),
            AnimateOptions::default(),
            start + ms(10),
            Some(Box::new(move || second.borrow_mut().push("second"))),
        );
        assert_eq!(*calls.borrow(), vec!["first"]);

        camera.tick(start + ms(500));
        assert_eq!(*calls.borrow(), vec!["first", "second"]);
        assert_eq!(camera.state().ratio, 3.0);
    }

    #[test]
    fn animated_zoom_and_reset() {
        let mut camera = Camera::new();
        let start = Instant::now();
        camera.animated_zoom(DEFAULT_ZOOMING_FACTOR, AnimateOptions::default(), start);
        camera.tick(start + ms(200));
        assert!((camera.state().ratio - 1.0 / 1.5).abs() < 1e-12);

        camera.animated_unzoom(2.0, AnimateOptions::default(), start + ms(200));
        camera.tick(start + ms(400));
        assert!((camera.state().ratio - 2.0 / 1.5).abs() < 1e-12);

        camera.set_state(PartialCameraState::angle(1.0));
        camera.animated_reset(AnimateOptions::default(), start + ms(400));
        camera.tick(start + ms(600));
        assert_eq!(camera.state(), CameraState::default());
    }

    #[test]
    fn easings_hit_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::QuadraticIn,
            Easing::QuadraticOut,
            Easing::QuadraticInOut,
            Easing::CubicIn,
            Easing::CubicOut,
            Easing::CubicInOut,
        ] {
            assert!(easing.apply(0.0).abs() < 1e-12, "{easing:?}");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-12, "{easing:?}");
        }
        assert!((Easing::QuadraticInOut.apply(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn pan_boundaries_pull_the_graph_back() {
        let context = ViewContext {
            dimensions: Dimensions::new(800.0, 600.0),
            graph_dimensions: Dimensions::new(1.0, 1.0),
            padding: 0.0,
        };
        let mut camera = Camera::new();
        camera.set_pan_boundaries(Some(PanBoundaries {
            extent: Extent::new([0.0, 1.0], [0.0, 1.0]),
            context,
            tolerance: 0.0,
        }));

        camera.set_state(PartialCameraState::position(50.0, 50.0));
        let state = camera.state();
        let transform = context.transform(state);
        let corner = transform.framed_graph_to_viewport(Coordinates::new(1.0, 1.0));
        assert!(corner.x >= -1e-6 && corner.x <= 800.0 + 1e-6);
        assert!(corner.y >= -1e-6 && corner.y <= 600.0 + 1e-6);

        // a centered camera is left alone
        camera.set_state(PartialCameraState::position(0.5, 0.5));
        assert_eq!(camera.state().x, 0.5);
    }
}
