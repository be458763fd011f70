use glam::{Mat4, Quat, Vec2, Vec3};
use log::debug;

/// Shape of the viewing volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    Perspective,
    Orthographic,
}

/// Viewing volume parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub mode: ProjectionMode,
    /// Vertical field of view, used in perspective mode.
    pub fov_degrees: f32,
    /// Visible height in world units, used in orthographic mode.
    pub ortho_height: f32,
    pub near: f32,
    pub far: f32,
    pub width: f32,
    pub height: f32,
}

impl Frustum {
    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }
}

/// Tuning for interactive motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSettings {
    /// World units per movement step.
    pub move_step: f32,
    /// Radians per rotation step.
    pub rotation_step: f32,
    /// Degrees of field of view per zoom step.
    pub zoom_step: f32,
    pub min_fov_degrees: f32,
    pub max_fov_degrees: f32,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            move_step: 0.25,
            rotation_step: 0.005,
            zoom_step: 1.0,
            min_fov_degrees: 1.0,
            max_fov_degrees: 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pose {
    position: Vec3,
    orientation: Quat,
}

/// Positioned viewpoint with a projection.
///
/// The view and projection matrices are recomputed after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pose: Pose,
    frustum: Frustum,
    initial_pose: Pose,
    initial_frustum: Frustum,
    motion: MotionSettings,
    moving: bool,
    view: Mat4,
    projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(
            Vec3::new(70.0, 50.0, 90.0),
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::Y,
            45.0,
            1.0,
            500.0,
        )
    }
}

impl Camera {
    /// Perspective camera at `position` looking at `target`. The window defaults to 1920x1080.
    pub fn perspective(
        position: Vec3,
        target: Vec3,
        up: Vec3,
        fov_degrees: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self::build(
            position,
            target,
            up,
            Frustum {
                mode: ProjectionMode::Perspective,
                fov_degrees,
                ortho_height: 2.0 * near * (fov_degrees.to_radians() * 0.5).tan(),
                near,
                far,
                width: 1920.0,
                height: 1080.0,
            },
        )
    }

    /// Orthographic camera showing `ortho_height` world units vertically.
    pub fn orthographic(
        position: Vec3,
        target: Vec3,
        up: Vec3,
        ortho_height: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self::build(
            position,
            target,
            up,
            Frustum {
                mode: ProjectionMode::Orthographic,
                fov_degrees: 45.0,
                ortho_height,
                near,
                far,
                width: 1920.0,
                height: 1080.0,
            },
        )
    }

    fn build(position: Vec3, target: Vec3, up: Vec3, frustum: Frustum) -> Self {
        let pose = Pose {
            position,
            orientation: look_at_orientation(position, target, up),
        };
        let mut camera = Self {
            pose,
            frustum,
            initial_pose: pose,
            initial_frustum: frustum,
            motion: MotionSettings::default(),
            moving: false,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.update_view();
        camera.update_projection();
        camera
    }

    pub fn with_motion(mut self, motion: MotionSettings) -> Self {
        self.motion = motion;
        self
    }

    pub fn motion(&self) -> &MotionSettings {
        &self.motion
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    /// Camera-to-world rotation.
    pub fn orientation(&self) -> Quat {
        self.pose.orientation
    }

    pub fn forward(&self) -> Vec3 {
        self.pose.orientation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.pose.orientation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.pose.orientation * Vec3::Y
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    pub fn fov_degrees(&self) -> f32 {
        self.frustum.fov_degrees
    }

    pub fn near(&self) -> f32 {
        self.frustum.near
    }

    pub fn far(&self) -> f32 {
        self.frustum.far
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Camera-to-world transform, used to place objects attached to the camera.
    pub fn inverse_view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.pose.orientation, self.pose.position)
    }

    /// Half width and half height of the visible area on the near plane.
    pub fn near_plane_half_extent(&self) -> Vec2 {
        let half_height = match self.frustum.mode {
            ProjectionMode::Perspective => {
                self.frustum.near * (self.frustum.fov_degrees.to_radians() * 0.5).tan()
            }
            ProjectionMode::Orthographic => self.frustum.ortho_height * 0.5,
        };
        Vec2::new(half_height * self.frustum.aspect(), half_height)
    }

    /// Half width and half height of the visible area on the far plane.
    pub fn far_plane_half_extent(&self) -> Vec2 {
        match self.frustum.mode {
            ProjectionMode::Perspective => {
                self.near_plane_half_extent() * (self.frustum.far / self.frustum.near)
            }
            ProjectionMode::Orthographic => self.near_plane_half_extent(),
        }
    }

    pub fn move_forward(&mut self, steps: f32) {
        self.translate(self.forward() * steps);
    }

    pub fn move_backward(&mut self, steps: f32) {
        self.translate(-self.forward() * steps);
    }

    pub fn move_left(&mut self, steps: f32) {
        self.translate(-self.right() * steps);
    }

    pub fn move_right(&mut self, steps: f32) {
        self.translate(self.right() * steps);
    }

    pub fn move_up(&mut self, steps: f32) {
        self.translate(self.up() * steps);
    }

    pub fn move_down(&mut self, steps: f32) {
        self.translate(-self.up() * steps);
    }

    fn translate(&mut self, direction: Vec3) {
        self.pose.position += direction * self.motion.move_step;
        self.update_view();
    }

    /// Turns the camera around the world Y axis through its position.
    pub fn rotate_around_world_y(&mut self, steps: f32) {
        let turn = Quat::from_rotation_y(steps * self.motion.rotation_step);
        self.pose.orientation = (turn * self.pose.orientation).normalize();
        self.update_view();
    }

    /// Tilts the camera around its own right axis.
    pub fn pitch(&mut self, steps: f32) {
        let tilt = Quat::from_rotation_x(steps * self.motion.rotation_step);
        self.pose.orientation = (self.pose.orientation * tilt).normalize();
        self.update_view();
    }

    /// Narrows the view by one zoom step.
    pub fn zoom_in(&mut self) {
        self.zoom(-self.motion.zoom_step);
    }

    /// Widens the view by one zoom step.
    pub fn zoom_out(&mut self) {
        self.zoom(self.motion.zoom_step);
    }

    fn zoom(&mut self, delta: f32) {
        match self.frustum.mode {
            ProjectionMode::Perspective => {
                self.frustum.fov_degrees = (self.frustum.fov_degrees + delta)
                    .clamp(self.motion.min_fov_degrees, self.motion.max_fov_degrees);
            }
            ProjectionMode::Orthographic => {
                self.frustum.ortho_height = (self.frustum.ortho_height + delta).max(delta.abs());
            }
        }
        self.update_projection();
    }

    /// Restores the pose and projection parameters given at construction.
    ///
    /// The window size is kept.
    pub fn reset_camera(&mut self) {
        let (width, height) = (self.frustum.width, self.frustum.height);
        self.pose = self.initial_pose;
        self.frustum = Frustum {
            width,
            height,
            ..self.initial_frustum
        };
        self.moving = false;
        self.update_view();
        self.update_projection();
    }

    /// Changes the size the projection's aspect ratio is derived from.
    pub fn update_window_size(&mut self, width: f32, height: f32) {
        if width <= 0.0 || height <= 0.0 || !width.is_finite() || !height.is_finite() {
            debug!("ignoring window size {width}x{height}");
            return;
        }
        self.frustum.width = width;
        self.frustum.height = height;
        self.update_projection();
    }

    pub fn set_moving_state(&mut self, moving: bool) {
        self.moving = moving;
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    fn update_view(&mut self) {
        self.view = Mat4::from_quat(self.pose.orientation.conjugate())
            * Mat4::from_translation(-self.pose.position);
    }

    fn update_projection(&mut self) {
        let frustum = &self.frustum;
        self.projection = match frustum.mode {
            ProjectionMode::Perspective => Mat4::perspective_rh(
                frustum.fov_degrees.to_radians(),
                frustum.aspect(),
                frustum.near,
                frustum.far,
            ),
            ProjectionMode::Orthographic => {
                let half_height = frustum.ortho_height * 0.5;
                let half_width = half_height * frustum.aspect();
                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    frustum.near,
                    frustum.far,
                )
            }
        };
    }
}

fn look_at_orientation(position: Vec3, target: Vec3, up: Vec3) -> Quat {
    let forward = target - position;
    if forward.length_squared() <= f32::EPSILON || forward.cross(up).length_squared() <= f32::EPSILON
    {
        debug!("degenerate look-at from {position} to {target}; using identity orientation");
        return Quat::IDENTITY;
    }
    Quat::from_mat4(&Mat4::look_at_rh(position, target, up)).conjugate()
}
