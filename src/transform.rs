//! Coordinate transform pipeline
//!
//! Four spaces are involved:
//!
//! - **graph space**: raw `x`/`y` node attributes
//! - **framed graph space**: graph space normalized so the node extent fits
//!   in the unit square, centered on (0.5, 0.5)
//! - **clip space**: what the GPU programs consume, in [-1, 1]
//! - **viewport space**: pixels, origin top-left, y growing downward
//!
//! Matrices are 3x3, column-major, and act on `(x, y, 1)` for points and
//! `(x, y, 0)` for vectors.

use serde::{Deserialize, Serialize};

use crate::camera::CameraState;

/// A 2D point or vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

impl Coordinates {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Width and height of the viewport or of the graph extent
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned bounding box as `[min, max]` per axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

impl Default for Extent {
    fn default() -> Self {
        Self {
            x: [0.0, 1.0],
            y: [0.0, 1.0],
        }
    }
}

impl Extent {
    pub const fn new(x: [f64; 2], y: [f64; 2]) -> Self {
        Self { x, y }
    }

    /// Bounding box of a set of points. An empty set yields the unit box.
    pub fn from_points(points: impl IntoIterator<Item = Coordinates>) -> Self {
        let unbounded = [f64::INFINITY, f64::NEG_INFINITY];
        let mut extent = Extent::new(unbounded, unbounded);
        let mut empty = true;
        for point in points {
            empty = false;
            extent.x[0] = extent.x[0].min(point.x);
            extent.x[1] = extent.x[1].max(point.x);
            extent.y[0] = extent.y[0].min(point.y);
            extent.y[1] = extent.y[1].max(point.y);
        }
        if empty { Extent::default() } else { extent }
    }

    /// Extent sizes, with 1 substituted on degenerate axes
    pub fn dimensions(&self) -> Dimensions {
        let width = self.x[1] - self.x[0];
        let height = self.y[1] - self.y[0];
        Dimensions::new(
            if width == 0.0 { 1.0 } else { width },
            if height == 0.0 { 1.0 } else { height },
        )
    }
}

// ===== Matrix helpers =====

/// Column-major 3x3 matrix
pub type Matrix = [f64; 9];

pub fn identity() -> Matrix {
    [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
}

pub fn scale(x: f64, y: f64) -> Matrix {
    [x, 0.0, 0.0, 0.0, y, 0.0, 0.0, 0.0, 1.0]
}

pub fn rotate(angle: f64) -> Matrix {
    let (s, c) = angle.sin_cos();
    [c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0]
}

pub fn translate(x: f64, y: f64) -> Matrix {
    [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, x, y, 1.0]
}

/// `a * b`, so that `b` applies first
pub fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    let mut out = [0.0; 9];
    for column in 0..3 {
        for row in 0..3 {
            out[column * 3 + row] = (0..3).map(|k| a[k * 3 + row] * b[column * 3 + k]).sum();
        }
    }
    out
}

/// Apply a matrix to `(v.x, v.y, z)`: `z = 1` for points, `z = 0` for vectors
pub fn multiply_vec2(matrix: &Matrix, v: Coordinates, z: f64) -> Coordinates {
    let x = matrix[0] * v.x + matrix[3] * v.y + matrix[6] * z;
    let y = matrix[1] * v.x + matrix[4] * v.y + matrix[7] * z;
    let w = matrix[2] * v.x + matrix[5] * v.y + matrix[8] * z;
    if w != 0.0 && w != 1.0 && z != 0.0 {
        Coordinates::new(x / w, y / w)
    } else {
        Coordinates::new(x, y)
    }
}

fn product(matrices: &[Matrix]) -> Matrix {
    matrices
        .iter()
        .fold(identity(), |acc, matrix| multiply(&acc, matrix))
}

// ===== Camera matrices =====

/// Ratio compensating for aspect differences between the viewport and the
/// graph extent, so the graph fills the viewport along its limiting axis.
pub fn correction_ratio(viewport: Dimensions, graph: Dimensions) -> f64 {
    let viewport_ratio = viewport.height / viewport.width;
    let graph_ratio = graph.height / graph.width;

    // opposite orientations: the natural fit is already the right one
    if (viewport_ratio < 1.0 && graph_ratio > 1.0) || (viewport_ratio > 1.0 && graph_ratio < 1.0) {
        return 1.0;
    }
    let corrected = graph_ratio
        .max(1.0 / graph_ratio)
        .min(viewport_ratio.max(1.0 / viewport_ratio));
    if corrected.is_finite() { corrected } else { 1.0 }
}

/// Matrix mapping framed graph space to clip space for a camera state, or
/// clip space back to framed graph space when `inverse` is set.
pub fn matrix_from_camera(
    state: &CameraState,
    viewport: Dimensions,
    graph: Dimensions,
    padding: f64,
    inverse: bool,
) -> Matrix {
    let Dimensions { width, height } = viewport;
    let correction = correction_ratio(viewport, graph);
    let smallest = width.min(height) - 2.0 * padding;
    let adjust_x = smallest / width;
    let adjust_y = smallest / height;

    if inverse {
        product(&[
            translate(state.x, state.y),
            scale(state.ratio, state.ratio),
            rotate(state.angle),
            scale(
                width / smallest / 2.0 / correction,
                height / smallest / 2.0 / correction,
            ),
        ])
    } else {
        product(&[
            scale(2.0 * adjust_x * correction, 2.0 * adjust_y * correction),
            rotate(-state.angle),
            scale(1.0 / state.ratio, 1.0 / state.ratio),
            translate(-state.x, -state.y),
        ])
    }
}

/// Length of a unit framed-space vector once projected to clip space,
/// normalized by the viewport width. Sizes in pixels are divided by this
/// to get framed-space sizes.
pub fn matrix_impact(matrix: &Matrix, state: &CameraState, viewport: Dimensions) -> f64 {
    let (s, c) = state.angle.sin_cos();
    let v = multiply_vec2(matrix, Coordinates::new(c, s), 0.0);
    1.0 / v.x.hypot(v.y) / viewport.width
}

// ===== Normalization =====

/// Maps graph space into framed graph space and back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationFunction {
    ratio: f64,
    dx: f64,
    dy: f64,
}

impl Default for NormalizationFunction {
    fn default() -> Self {
        Self::from_extent(&Extent::default())
    }
}

impl NormalizationFunction {
    pub fn from_extent(extent: &Extent) -> Self {
        let dx = (extent.x[1] + extent.x[0]) / 2.0;
        let dy = (extent.y[1] + extent.y[0]) / 2.0;
        let ratio = (extent.x[1] - extent.x[0]).max(extent.y[1] - extent.y[0]);
        let ratio = if ratio == 0.0 || !ratio.is_finite() { 1.0 } else { ratio };
        Self { ratio, dx, dy }
    }

    /// Largest side of the extent this function normalizes
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn apply(&self, point: Coordinates) -> Coordinates {
        Coordinates::new(
            0.5 + (point.x - self.dx) / self.ratio,
            0.5 + (point.y - self.dy) / self.ratio,
        )
    }

    pub fn inverse(&self, point: Coordinates) -> Coordinates {
        Coordinates::new(
            self.dx + (point.x - 0.5) * self.ratio,
            self.dy + (point.y - 0.5) * self.ratio,
        )
    }

    pub fn apply_extent(&self, extent: &Extent) -> Extent {
        let min = self.apply(Coordinates::new(extent.x[0], extent.y[0]));
        let max = self.apply(Coordinates::new(extent.x[1], extent.y[1]));
        Extent::new([min.x, max.x], [min.y, max.y])
    }
}

// ===== View transforms =====

/// Everything besides the camera state that a view transform depends on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewContext {
    pub dimensions: Dimensions,
    pub graph_dimensions: Dimensions,
    pub padding: f64,
}

impl ViewContext {
    pub fn transform(&self, camera: CameraState) -> ViewTransform {
        ViewTransform::new(camera, *self)
    }
}

/// Forward and inverse matrices for one camera state and viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    camera: CameraState,
    context: ViewContext,
    matrix: Matrix,
    inverse: Matrix,
}

impl ViewTransform {
    pub fn new(camera: CameraState, context: ViewContext) -> Self {
        let matrix = matrix_from_camera(
            &camera,
            context.dimensions,
            context.graph_dimensions,
            context.padding,
            false,
        );
        let inverse = matrix_from_camera(
            &camera,
            context.dimensions,
            context.graph_dimensions,
            context.padding,
            true,
        );
        Self {
            camera,
            context,
            matrix,
            inverse,
        }
    }

    pub fn camera(&self) -> CameraState {
        self.camera
    }

    pub fn context(&self) -> ViewContext {
        self.context
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn inverse_matrix(&self) -> &Matrix {
        &self.inverse
    }

    /// Framed graph point to viewport pixels. Non-finite results become 0.
    pub fn framed_graph_to_viewport(&self, point: Coordinates) -> Coordinates {
        let Dimensions { width, height } = self.context.dimensions;
        let clip = multiply_vec2(&self.matrix, point, 1.0);
        Coordinates::new(
            finite_or_zero((1.0 + clip.x) * width / 2.0),
            finite_or_zero((1.0 - clip.y) * height / 2.0),
        )
    }

    /// Viewport pixels to framed graph point. Non-finite results become 0.
    pub fn viewport_to_framed_graph(&self, point: Coordinates) -> Coordinates {
        let Dimensions { width, height } = self.context.dimensions;
        let clip_x = (point.x / width) * 2.0 - 1.0;
        let clip_y = 1.0 - (point.y / height) * 2.0;
        let clip = Coordinates::new(clip_x, clip_y);
        let framed = multiply_vec2(&self.inverse, clip, 1.0);
        Coordinates::new(finite_or_zero(framed.x), finite_or_zero(framed.y))
    }

    /// Correction ratio of the forward matrix
    pub fn matrix_impact(&self) -> f64 {
        matrix_impact(&self.matrix, &self.camera, self.context.dimensions)
    }

    /// Camera state that zooms to `new_ratio` while keeping the framed point
    /// under `anchor` (viewport pixels) in place.
    pub fn zoomed_state(&self, anchor: Coordinates, new_ratio: f64) -> CameraState {
        let ratio_diff = new_ratio / self.camera.ratio;
        let center = self.viewport_to_framed_graph(Coordinates::new(
            self.context.dimensions.width / 2.0,
            self.context.dimensions.height / 2.0,
        ));
        let target = self.viewport_to_framed_graph(anchor);
        CameraState {
            x: (target.x - center.x) * (1.0 - ratio_diff) + self.camera.x,
            y: (target.y - center.y) * (1.0 - ratio_diff) + self.camera.y,
            angle: self.camera.angle,
            ratio: new_ratio,
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Caches the view transform until the camera or the viewport changes
#[derive(Debug, Default)]
pub struct TransformCache {
    current: Option<ViewTransform>,
    computations: u64,
}

impl TransformCache {
    pub fn get(&mut self, camera: CameraState, context: ViewContext) -> ViewTransform {
        match self.current {
            Some(transform) if transform.camera == camera && transform.context == context => {
                transform
            }
            _ => {
                let transform = ViewTransform::new(camera, context);
                self.current = Some(transform);
                self.computations += 1;
                transform
            }
        }
    }

    pub fn invalidate(&mut self) {
        self.current = None;
    }

    /// Number of times matrices were recomputed
    pub fn computations(&self) -> u64 {
        self.computations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn close(a: Coordinates, b: Coordinates) -> bool {
        (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
    }

    fn camera(x: f64, y: f64, angle: f64, ratio: f64) -> CameraState {
        CameraState { x, y, angle, ratio }
    }

    fn context(width: f64, height: f64) -> ViewContext {
        ViewContext {
            dimensions: Dimensions::new(width, height),
            graph_dimensions: Dimensions::new(1.0, 1.0),
            padding: 0.0,
        }
    }

    #[test]
    fn multiply_composes_right_to_left() {
        let m = multiply(&translate(1.0, 2.0), &scale(2.0, 3.0));
        let p = multiply_vec2(&m, Coordinates::new(1.0, 1.0), 1.0);
        assert!(close(p, Coordinates::new(3.0, 5.0)));
    }

    #[test]
    fn vectors_ignore_translation() {
        let m = translate(10.0, 10.0);
        let v = multiply_vec2(&m, Coordinates::new(1.0, 2.0), 0.0);
        assert!(close(v, Coordinates::new(1.0, 2.0)));
    }

    #[test]
    fn rotation_is_counter_clockwise() {
        let quarter = rotate(std::f64::consts::FRAC_PI_2);
        let v = multiply_vec2(&quarter, Coordinates::new(1.0, 0.0), 0.0);
        assert!(close(v, Coordinates::new(0.0, 1.0)));
    }

    #[test]
    fn correction_ratio_cases() {
        let ratio = |width, height, graph_width, graph_height| {
            let graph = Dimensions::new(graph_width, graph_height);
            correction_ratio(Dimensions::new(width, height), graph)
        };
        // landscape viewport, portrait graph
        assert_eq!(ratio(800.0, 600.0, 1.0, 2.0), 1.0);
        // both landscape: limited by the less elongated one
        assert!((ratio(800.0, 400.0, 4.0, 1.0) - 2.0).abs() < EPSILON);
        // square graph
        assert!((ratio(800.0, 600.0, 1.0, 1.0) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn default_camera_centers_the_unit_square() {
        let transform = context(800.0, 600.0).transform(CameraState::default());
        let center = transform.framed_graph_to_viewport(Coordinates::new(0.5, 0.5));
        assert!(close(center, Coordinates::new(400.0, 300.0)));
    }

    #[test]
    fn viewport_round_trip() {
        let states = [
            CameraState::default(),
            camera(0.2, 0.8, 0.7, 0.3),
            camera(-3.0, 4.0, -2.0, 12.0),
        ];
        let ctx = ViewContext {
            dimensions: Dimensions::new(640.0, 480.0),
            graph_dimensions: Dimensions::new(3.0, 2.0),
            padding: 30.0,
        };
        let points = [
            Coordinates::new(0.0, 0.0),
            Coordinates::new(0.3, 0.9),
            Coordinates::new(-5.0, 2.5),
        ];
        for state in states {
            let transform = ctx.transform(state);
            for point in points {
                let viewport = transform.framed_graph_to_viewport(point);
                let back = transform.viewport_to_framed_graph(viewport);
                assert!(close(back, point), "{point:?} became {back:?} at {state:?}");
            }
        }
    }

    #[test]
    fn degenerate_viewport_yields_zeros() {
        let transform = context(0.0, 0.0).transform(CameraState::default());
        let p = transform.framed_graph_to_viewport(Coordinates::new(0.5, 0.5));
        assert!(p.x.is_finite() && p.y.is_finite());
        let back = transform.viewport_to_framed_graph(Coordinates::new(10.0, 10.0));
        assert_eq!(back, Coordinates::new(0.0, 0.0));
    }

    #[test]
    fn normalization_maps_extent_into_unit_square() {
        let extent = Extent::new([0.0, 10.0], [0.0, 5.0]);
        let normalize = NormalizationFunction::from_extent(&extent);
        assert_eq!(normalize.ratio(), 10.0);
        let apply = |x, y| normalize.apply(Coordinates::new(x, y));
        assert!(close(apply(0.0, 0.0), Coordinates::new(0.0, 0.25)));
        assert!(close(apply(10.0, 5.0), Coordinates::new(1.0, 0.75)));
        let p = Coordinates::new(3.0, 4.0);
        assert!(close(normalize.inverse(normalize.apply(p)), p));
    }

    #[test]
    fn degenerate_extent_falls_back_to_unit_ratio() {
        let normalize = NormalizationFunction::from_extent(&Extent::new([5.0, 5.0], [5.0, 5.0]));
        assert_eq!(normalize.ratio(), 1.0);
        let center = normalize.apply(Coordinates::new(5.0, 5.0));
        assert!(close(center, Coordinates::new(0.5, 0.5)));
    }

    #[test]
    fn extent_from_points() {
        let extent = Extent::from_points([Coordinates::new(1.0, 2.0), Coordinates::new(-1.0, 5.0)]);
        assert_eq!(extent, Extent::new([-1.0, 1.0], [2.0, 5.0]));
        assert_eq!(Extent::from_points([]), Extent::default());
        let flat = Extent::from_points([Coordinates::new(3.0, 3.0)]);
        assert_eq!(flat.dimensions(), Dimensions::new(1.0, 1.0));
    }

    #[test]
    fn zoomed_state_keeps_anchor_fixed() {
        let ctx = context(800.0, 600.0);
        let before = ctx.transform(camera(0.4, 0.6, 0.3, 1.0));
        let anchor = Coordinates::new(100.0, 100.0);
        let target = before.viewport_to_framed_graph(anchor);
        let after = ctx.transform(before.zoomed_state(anchor, 1.0 / 1.7));
        assert!(close(after.viewport_to_framed_graph(anchor), target));
    }

    #[test]
    fn cache_recomputes_only_on_change() {
        let mut cache = TransformCache::default();
        let ctx = context(800.0, 600.0);
        cache.get(CameraState::default(), ctx);
        cache.get(CameraState::default(), ctx);
        assert_eq!(cache.computations(), 1);
        let zoomed = camera(0.5, 0.5, 0.0, 2.0);
        cache.get(zoomed, ctx);
        assert_eq!(cache.computations(), 2);
        cache.invalidate();
        cache.get(zoomed, ctx);
        assert_eq!(cache.computations(), 3);
    }
}
