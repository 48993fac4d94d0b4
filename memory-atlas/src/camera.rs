//! Screen-space hit-testing capabilities and a headless orbit camera.
//!
//! Selection never talks to a renderer directly. It sees two capabilities:
//! [`ScreenProjector`], which maps a world-space point to normalized device
//! coordinates, and [`PointPicker`], which resolves a cursor position to the
//! nearest rendered point. [`Camera`] and [`ProjectedPicker`] implement both
//! without any rendering backend.

use nalgebra::{Matrix4, Perspective3, Point3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Result of projecting a world-space point through the active camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projected {
    /// In front of the camera. `x` and `y` are in `[-1, 1]` when on screen,
    /// with `y` pointing up. `depth` is NDC z.
    Ndc { x: f32, y: f32, depth: f32 },
    /// Behind the camera or beyond the far plane.
    BehindCamera,
}

impl Projected {
    pub fn is_visible(&self) -> bool {
        matches!(self, Projected::Ndc { .. })
    }
}

/// Maps world-space points to normalized device coordinates.
pub trait ScreenProjector {
    fn project_to_ndc(&self, point: [f32; 3]) -> Projected;
}

/// Resolves a cursor to the nearest rendered point within a pixel tolerance.
pub trait PointPicker {
    fn pick_nearest(&self, cursor: [f32; 2], tolerance_px: f32) -> Option<usize>;
}

/// Pixel dimensions of the drawing surface. Pixel `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 && self.width > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// Pixel position to NDC, flipping `y` to point up.
    pub fn pixel_to_ndc(&self, px: f32, py: f32) -> [f32; 2] {
        let w = self.width.max(1.0);
        let h = self.height.max(1.0);
        [px / w * 2.0 - 1.0, -(py / h * 2.0 - 1.0)]
    }

    /// NDC to pixel position.
    pub fn ndc_to_pixel(&self, x: f32, y: f32) -> [f32; 2] {
        [
            (x + 1.0) / 2.0 * self.width,
            (1.0 - y) / 2.0 * self.height,
        ]
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

/// Orbit camera around a target point.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Point3<f32>,
    /// Point the camera is looking at
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Width over height
    pub aspect: f32,
    /// Orbit distance from target
    pub orbit_distance: f32,
    /// Horizontal orbit angle in radians
    pub azimuth: f32,
    /// Vertical orbit angle in radians
    pub elevation: f32,
}

impl Default for Camera {
    fn default() -> Self {
        let distance = 60.0;
        let azimuth = std::f32::consts::FRAC_PI_2;
        let elevation = 0.0;

        Self {
            position: Self::orbit_position(distance, azimuth, elevation, Point3::origin()),
            target: Point3::origin(),
            up: Vector3::new(0.0, 1.0, 0.0),
            fov: 60.0,
            near: 0.1,
            far: 1000.0,
            aspect: Viewport::default().aspect(),
            orbit_distance: distance,
            azimuth,
            elevation,
        }
    }
}

impl Camera {
    /// Camera at `position` looking at `target`.
    pub fn new(position: Point3<f32>, target: Point3<f32>) -> Self {
        let diff = position - target;
        let distance = diff.norm().max(1e-3);

        Self {
            position,
            target,
            orbit_distance: distance,
            azimuth: diff.z.atan2(diff.x),
            elevation: (diff.y / distance).clamp(-1.0, 1.0).asin(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.aspect = viewport.aspect();
        self
    }

    fn orbit_position(
        distance: f32,
        azimuth: f32,
        elevation: f32,
        target: Point3<f32>,
    ) -> Point3<f32> {
        let x = distance * elevation.cos() * azimuth.cos();
        let y = distance * elevation.sin();
        let z = distance * elevation.cos() * azimuth.sin();
        Point3::new(target.x + x, target.y + y, target.z + z)
    }

    fn update_position(&mut self) {
        self.position = Self::orbit_position(
            self.orbit_distance,
            self.azimuth,
            self.elevation,
            self.target,
        );
    }

    pub fn orbit_horizontal(&mut self, delta: f32) {
        self.azimuth += delta;
        self.update_position();
    }

    /// Elevation stays just short of the poles so `up` never aligns with the view.
    pub fn orbit_vertical(&mut self, delta: f32) {
        self.elevation = (self.elevation + delta).clamp(
            -std::f32::consts::FRAC_PI_2 + 0.01,
            std::f32::consts::FRAC_PI_2 - 0.01,
        );
        self.update_position();
    }

    pub fn zoom(&mut self, factor: f32) {
        self.orbit_distance = (self.orbit_distance * factor).max(self.near * 2.0);
        self.update_position();
    }

    /// Back to the default view, keeping the aspect ratio.
    pub fn reset(&mut self) {
        let aspect = self.aspect;
        *self = Self {
            aspect,
            ..Self::default()
        };
    }

    /// Aim at the origin from far enough away that a sphere of `radius`
    /// fits the vertical field of view.
    pub fn fit_to_radius(&mut self, radius: f32) {
        let half_fov = (self.fov.to_radians() / 2.0).max(1e-3);
        self.target = Point3::origin();
        self.orbit_distance = (radius.max(1e-3) / half_fov.sin()).max(self.near * 2.0);
        self.far = self.far.max(self.orbit_distance + radius * 2.0);
        self.update_position();
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        let aspect = self.aspect.max(1e-3);
        let far = self.far.max(self.near + 1e-3);
        Perspective3::new(aspect, self.fov.to_radians(), self.near, far).to_homogeneous()
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }
}

impl ScreenProjector for Camera {
    fn project_to_ndc(&self, point: [f32; 3]) -> Projected {
        project_with(&self.view_projection(), point)
    }
}

/// Project `point` with a precomputed view-projection matrix.
///
/// A point is in front of the camera when clip `w` is positive and NDC depth
/// does not exceed the far plane.
pub fn project_with(view_projection: &Matrix4<f32>, point: [f32; 3]) -> Projected {
    let clip = view_projection * Vector4::new(point[0], point[1], point[2], 1.0);
    if clip.w <= f32::EPSILON {
        return Projected::BehindCamera;
    }

    let depth = clip.z / clip.w;
    if depth > 1.0 {
        return Projected::BehindCamera;
    }
    Projected::Ndc {
        x: clip.x / clip.w,
        y: clip.y / clip.w,
        depth,
    }
}

/// Headless picker: nearest projected point to the cursor within the
/// tolerance, closer-to-camera winning ties.
pub struct ProjectedPicker<'a, P: ScreenProjector + ?Sized> {
    projector: &'a P,
    viewport: Viewport,
    positions: &'a [[f32; 3]],
}

impl<'a, P: ScreenProjector + ?Sized> ProjectedPicker<'a, P> {
    pub fn new(projector: &'a P, viewport: Viewport, positions: &'a [[f32; 3]]) -> Self {
        Self {
            projector,
            viewport,
            positions,
        }
    }
}

impl<P: ScreenProjector + ?Sized> PointPicker for ProjectedPicker<'_, P> {
    fn pick_nearest(&self, cursor: [f32; 2], tolerance_px: f32) -> Option<usize> {
        let tolerance_sq = tolerance_px * tolerance_px;
        let mut best: Option<(usize, f32, f32)> = None;

        for (index, &point) in self.positions.iter().enumerate() {
            let Projected::Ndc { x, y, depth } = self.projector.project_to_ndc(point) else {
                continue;
            };
            let [px, py] = self.viewport.ndc_to_pixel(x, y);
            let dist_sq = (px - cursor[0]).powi(2) + (py - cursor[1]).powi(2);
            if dist_sq > tolerance_sq {
                continue;
            }

            let better = match best {
                None => true,
                Some((_, best_dist, best_depth)) => {
                    dist_sq < best_dist || (dist_sq == best_dist && depth < best_depth)
                }
            };
            if better {
                best = Some((index, dist_sq, depth));
            }
        }

        best.map(|(index, _, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn front_camera() -> Camera {
        Camera::new(Point3::new(0.0, 0.0, 10.0), Point3::origin())
            .with_viewport(Viewport::new(100.0, 100.0))
    }

    #[test]
    fn test_target_projects_to_center() {
        let camera = front_camera();
        match camera.project_to_ndc([0.0, 0.0, 0.0]) {
            Projected::Ndc { x, y, depth } => {
                assert!(x.abs() < 1e-5 && y.abs() < 1e-5);
                assert!(depth > -1.0 && depth < 1.0);
            }
            Projected::BehindCamera => panic!("target should be visible"),
        }
    }

    #[test]
    fn test_point_behind_camera() {
        let camera = front_camera();
        assert_eq!(camera.project_to_ndc([0.0, 0.0, 20.0]), Projected::BehindCamera);
    }

    #[test]
    fn test_y_points_up() {
        let camera = front_camera();
        let Projected::Ndc { y, .. } = camera.project_to_ndc([0.0, 1.0, 0.0]) else {
            panic!("expected visible point");
        };
        assert!(y > 0.0);
    }

    #[test]
    fn test_viewport_conversions() {
        let viewport = Viewport::new(200.0, 100.0);
        assert_eq!(viewport.pixel_to_ndc(0.0, 0.0), [-1.0, 1.0]);
        assert_eq!(viewport.pixel_to_ndc(200.0, 100.0), [1.0, -1.0]);
        assert_eq!(viewport.ndc_to_pixel(0.0, 0.0), [100.0, 50.0]);
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut camera = Camera::default();
        camera.orbit_horizontal(0.7);
        camera.orbit_vertical(0.3);
        let distance = (camera.position - camera.target).norm();
        assert!((distance - camera.orbit_distance).abs() < 1e-3);
    }

    #[test]
    fn test_fit_to_radius_keeps_cloud_on_screen() {
        let mut camera = Camera::default();
        camera.fit_to_radius(20.0);
        for corner in [[20.0, 0.0, 0.0], [0.0, 20.0, 0.0], [0.0, -20.0, 0.0]] {
            match camera.project_to_ndc(corner) {
                Projected::Ndc { x, y, .. } => assert!(x.abs() <= 1.0 && y.abs() <= 1.0),
                Projected::BehindCamera => panic!("corner clipped"),
            }
        }
    }

    #[test]
    fn test_picker_prefers_nearest_then_closer() {
        let camera = front_camera();
        let viewport = Viewport::new(100.0, 100.0);
        // Two points on the view axis, one nearer the camera, plus an off-axis point.
        let positions = [[0.0, 0.0, -2.0], [0.0, 0.0, 2.0], [3.0, 0.0, 0.0]];
        let picker = ProjectedPicker::new(&camera, viewport, &positions);

        assert_eq!(picker.pick_nearest([50.0, 50.0], 5.0), Some(1));
        assert_eq!(picker.pick_nearest([0.0, 0.0], 5.0), None);
    }
}
