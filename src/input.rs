//! Per-frame input collection and its application to the camera.
//!
//! Window callbacks only record what happened into an [`InputState`]. The
//! frame loop, which owns the [`Camera`], applies the recorded input once per
//! frame with [`InputState::apply_to`].

use std::time::Instant;

use crate::camera::{Camera, Direction, MovementKeys};

/// Cursor samples kept between frames. Past this, new samples overwrite the
/// newest one, so total travel is kept and only intermediate points merge.
pub const MAX_CURSOR_SAMPLES: usize = 256;

/// Input recorded since the last frame, plus the keys currently held.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    held: MovementKeys,
    cursor_samples: Vec<(f32, f32)>,
    /// Unbounded cursor position built from relative mouse motion.
    virtual_cursor: Option<(f64, f64)>,
    scroll: f32,
    close_requested: bool,
}

impl InputState {
    /// Nothing held, nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a movement key press or release.
    pub fn set_direction(&mut self, direction: Direction, pressed: bool) {
        if pressed {
            self.held.insert(direction);
        } else {
            self.held.remove(direction);
        }
    }

    /// Record an absolute cursor position.
    ///
    /// Only meaningful while the cursor is free: a confined cursor stops at
    /// the window edge. Use [`mouse_motion`](Self::mouse_motion) when grabbed.
    pub fn cursor_moved(&mut self, x: f64, y: f64) {
        #[expect(clippy::cast_possible_truncation)]
        let sample = (x as f32, y as f32);
        if self.cursor_samples.len() < MAX_CURSOR_SAMPLES {
            self.cursor_samples.push(sample);
        } else if let Some(last) = self.cursor_samples.last_mut() {
            *last = sample;
        }
    }

    /// Record relative mouse motion, in device units.
    ///
    /// Motion moves a virtual cursor that has no edges. The first call also
    /// seeds the camera at the virtual origin, so no motion is lost to the
    /// camera's first-sample seeding.
    pub fn mouse_motion(&mut self, dx: f64, dy: f64) {
        let (x, y) = match self.virtual_cursor {
            Some(position) => position,
            None => {
                self.cursor_moved(0.0, 0.0);
                (0.0, 0.0)
            }
        };
        let position = (x + dx, y + dy);
        self.virtual_cursor = Some(position);
        self.cursor_moved(position.0, position.1);
    }

    /// Record vertical scroll, in lines.
    pub fn scrolled(&mut self, delta_y: f64) {
        #[expect(clippy::cast_possible_truncation)]
        let delta_y = delta_y as f32;
        self.scroll += delta_y;
    }

    /// Ask the frame loop to stop after the current iteration.
    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    /// Whether the loop should stop.
    #[must_use]
    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    /// Movement keys currently held.
    #[must_use]
    pub fn held(&self) -> MovementKeys {
        self.held
    }

    /// Feed the pending input to `camera`: cursor samples in arrival order,
    /// then accumulated scroll, then movement for `delta_seconds`.
    ///
    /// Pending cursor and scroll input is consumed; held keys stay held.
    pub fn apply_to(&mut self, camera: &mut Camera, delta_seconds: f32) {
        for (x, y) in self.cursor_samples.drain(..) {
            camera.on_cursor_moved(x, y);
        }
        camera.on_scroll(std::mem::take(&mut self.scroll));
        camera.on_movement_input(self.held, delta_seconds);
    }
}

/// Measures time between frames.
#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Start the clock now.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Start the clock at `start`.
    #[must_use]
    pub fn starting_at(start: Instant) -> Self {
        Self { start, last: start }
    }

    /// Seconds since the previous tick (or since start), advancing the clock.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// [`tick`](Self::tick) with an explicit `now`. Times earlier than the
    /// previous tick count as zero.
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = self.last.max(now);
        delta
    }

    /// Seconds from start to the most recent tick.
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.last.duration_since(self.start).as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use glam::Vec3;

    use super::*;

    #[test]
    fn cursor_samples_apply_in_order_and_are_consumed() {
        let mut camera = Camera::new(800.0, 600.0);
        let mut input = InputState::new();
        input.cursor_moved(400.0, 300.0);
        input.cursor_moved(410.0, 300.0);
        input.cursor_moved(420.0, 300.0);

        input.apply_to(&mut camera, 0.0);
        assert!((camera.yaw() - (-88.0)).abs() < 1e-4);

        input.apply_to(&mut camera, 0.0);
        assert!((camera.yaw() - (-88.0)).abs() < 1e-4);
    }

    #[test]
    fn scroll_accumulates_until_applied() {
        let mut camera = Camera::new(800.0, 600.0);
        let mut input = InputState::new();
        input.scrolled(3.0);
        input.scrolled(2.0);
        input.apply_to(&mut camera, 0.0);
        assert_eq!(camera.fov(), 40.0);

        input.apply_to(&mut camera, 0.0);
        assert_eq!(camera.fov(), 40.0);
    }

    #[test]
    fn held_keys_persist_across_frames() {
        let mut camera = Camera::new(800.0, 600.0);
        let mut input = InputState::new();
        input.set_direction(Direction::Forward, true);

        input.apply_to(&mut camera, 0.2);
        input.apply_to(&mut camera, 0.2);
        assert!(camera.position().abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-5));

        input.set_direction(Direction::Forward, false);
        input.apply_to(&mut camera, 0.2);
        assert!(camera.position().abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-5));
        assert!(input.held().is_empty());
    }

    #[test]
    fn mouse_motion_turns_past_any_window_edge() {
        let mut camera = Camera::new(800.0, 600.0);
        let mut input = InputState::new();
        input.mouse_motion(10.0, 0.0);
        input.apply_to(&mut camera, 0.0);
        assert!((camera.yaw() - (-89.0)).abs() < 1e-4);

        // Far more travel than an 800 pixel wide window allows.
        for _ in 0..20 {
            input.mouse_motion(100.0, 0.0);
        }
        input.apply_to(&mut camera, 0.0);
        assert!((camera.yaw() - 111.0).abs() < 1e-3);

        input.mouse_motion(0.0, -50.0);
        input.apply_to(&mut camera, 0.0);
        assert!((camera.pitch() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn cursor_samples_are_capped_without_losing_travel() {
        let mut camera = Camera::new(800.0, 600.0);
        let mut input = InputState::new();
        input.cursor_moved(0.0, 0.0);
        for x in 1..=1024_u32 {
            input.cursor_moved(f64::from(x), 0.0);
        }
        assert_eq!(input.cursor_samples.len(), MAX_CURSOR_SAMPLES);

        input.apply_to(&mut camera, 0.0);
        assert!((camera.yaw() - (-90.0 + 102.4)).abs() < 1e-3);
    }

    #[test]
    fn close_request_is_sticky() {
        let mut input = InputState::new();
        assert!(!input.should_close());
        input.request_close();
        input.apply_to(&mut Camera::new(1.0, 1.0), 0.0);
        assert!(input.should_close());
    }

    #[test]
    fn clock_reports_deltas_and_never_goes_backwards() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);

        let delta = clock.tick_at(start + Duration::from_millis(250));
        assert!((delta - 0.25).abs() < 1e-6);
        let delta = clock.tick_at(start + Duration::from_millis(100));
        assert_eq!(delta, 0.0);
        let delta = clock.tick_at(start + Duration::from_millis(500));
        assert!((delta - 0.25).abs() < 1e-6);
        assert!((clock.elapsed() - 0.5).abs() < 1e-6);
    }
}
