//! First-person fly camera driven by cursor, scroll and movement keys.
//!
//! The camera owns no GPU resources. The view and projection matrices are
//! derived from position and orientation and cached; they are recomputed
//! only by the operations that change their inputs.

use glam::{Mat4, Vec3};

/// Degrees of rotation per pixel of cursor travel.
pub const MOUSE_SENSITIVITY: f32 = 0.1;
/// World units per second of held movement.
pub const MOVEMENT_SPEED: f32 = 2.5;
/// Pitch is kept inside `±PITCH_LIMIT` degrees so the view never flips.
pub const PITCH_LIMIT: f32 = 89.0;
/// Narrowest field of view, degrees.
pub const MIN_FOV: f32 = 1.0;
/// Widest (and initial) field of view, degrees.
pub const MAX_FOV: f32 = 45.0;
/// Near clip plane distance.
pub const Z_NEAR: f32 = 0.1;
/// Far clip plane distance.
pub const Z_FAR: f32 = 100.0;

/// A movement key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Along the view direction.
    Forward,
    /// Against the view direction.
    Backward,
    /// Strafe left.
    Left,
    /// Strafe right.
    Right,
}

impl Direction {
    const fn bit(self) -> u8 {
        match self {
            Self::Forward => 1,
            Self::Backward => 1 << 1,
            Self::Left => 1 << 2,
            Self::Right => 1 << 3,
        }
    }
}

/// The set of movement keys held during a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovementKeys(u8);

impl MovementKeys {
    /// No keys held.
    pub const NONE: Self = Self(0);

    /// Mark `direction` as held.
    pub fn insert(&mut self, direction: Direction) {
        self.0 |= direction.bit();
    }

    /// Mark `direction` as released.
    pub fn remove(&mut self, direction: Direction) {
        self.0 &= !direction.bit();
    }

    /// Whether `direction` is held.
    #[must_use]
    pub fn contains(self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    /// Whether no key is held.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Direction> for MovementKeys {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut keys = Self::NONE;
        for direction in iter {
            keys.insert(direction);
        }
        keys
    }
}

/// First-person camera.
#[derive(Clone, Debug)]
pub struct Camera {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    yaw: f32,
    pitch: f32,
    fov: f32,
    last_cursor: (f32, f32),
    seen_first_cursor: bool,
    view: Mat4,
    projection: Mat4,
}

impl Camera {
    /// Camera at `(0, 0, 3)` looking down `-Z`, with a 45° perspective
    /// projection for a `viewport_width` x `viewport_height` viewport.
    ///
    /// The aspect ratio is fixed here; resizing the window later does not
    /// change it.
    #[must_use]
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        let aspect = if viewport_height > 0.0 {
            viewport_width / viewport_height
        } else {
            1.0
        };
        let position = Vec3::new(0.0, 0.0, 3.0);
        let front = Vec3::NEG_Z;
        let up = Vec3::Y;
        let fov = MAX_FOV;

        Self {
            position,
            front,
            up,
            // -90° points the initial front down -Z rather than along +X.
            yaw: -90.0,
            pitch: 0.0,
            fov,
            last_cursor: (viewport_width / 2.0, viewport_height / 2.0),
            seen_first_cursor: false,
            view: Mat4::look_at_rh(position, position + front, up),
            projection: Mat4::perspective_rh_gl(fov.to_radians(), aspect, Z_NEAR, Z_FAR),
        }
    }

    /// Rotate from an absolute cursor position.
    ///
    /// The first call only records the position, so the initial cursor
    /// location never turns the camera.
    pub fn on_cursor_moved(&mut self, x: f32, y: f32) {
        if !self.seen_first_cursor {
            self.last_cursor = (x, y);
            self.seen_first_cursor = true;
            return;
        }

        let (last_x, last_y) = self.last_cursor;
        // Screen y grows downward, pitch grows upward.
        let dx = (x - last_x) * MOUSE_SENSITIVITY;
        let dy = (last_y - y) * MOUSE_SENSITIVITY;
        self.last_cursor = (x, y);

        self.yaw += dx;
        self.pitch = (self.pitch + dy).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.front = front_from_angles(self.yaw, self.pitch);
        self.recalculate_view();
    }

    /// Zoom by `delta_y` scroll steps, clamping the field of view to
    /// `[MIN_FOV, MAX_FOV]`.
    ///
    /// The projection matrix is not rebuilt, so this currently has no visible
    /// effect; [`fov`](Self::fov) reports the accumulated value.
    pub fn on_scroll(&mut self, delta_y: f32) {
        self.fov = (self.fov - delta_y).clamp(MIN_FOV, MAX_FOV);
    }

    /// Move for `delta_seconds` with `keys` held.
    pub fn on_movement_input(&mut self, keys: MovementKeys, delta_seconds: f32) {
        let speed = MOVEMENT_SPEED * delta_seconds;
        let right = self.front.cross(self.up).normalize();

        if keys.contains(Direction::Forward) {
            self.position += self.front * speed;
        }
        if keys.contains(Direction::Backward) {
            self.position -= self.front * speed;
        }
        if keys.contains(Direction::Left) {
            self.position -= right * speed;
        }
        if keys.contains(Direction::Right) {
            self.position += right * speed;
        }
        self.recalculate_view();
    }

    fn recalculate_view(&mut self) {
        self.view = Mat4::look_at_rh(self.position, self.position + self.front, self.up);
    }

    /// Projection matrix (GL clip space).
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// View matrix.
    #[must_use]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// Eye position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Unit view direction.
    #[must_use]
    pub fn front(&self) -> Vec3 {
        self.front
    }

    /// Fixed world up direction.
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Yaw in degrees.
    #[must_use]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Pitch in degrees, within `±PITCH_LIMIT`.
    #[must_use]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Field of view in degrees, within `[MIN_FOV, MAX_FOV]`.
    #[must_use]
    pub fn fov(&self) -> f32 {
        self.fov
    }
}

fn front_from_angles(yaw: f32, pitch: f32) -> Vec3 {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    Vec3::new(
        yaw.cos() * pitch.cos(),
        pitch.sin(),
        yaw.sin() * pitch.cos(),
    )
    .normalize()
}
