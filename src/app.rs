//! The demo window: winit event loop, glutin GL context and the frame loop.
//!
//! One frame is: apply recorded input to the camera, draw the quad, swap
//! buffers. Window events between frames only update the [`InputState`].
//! Escape or closing the window sets the should-close flag, which the loop
//! checks once per frame.

use std::num::NonZeroU32;
use std::rc::Rc;

use glutin::config::{Config, ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext, PossiblyCurrentContext,
    Version,
};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, Surface, SwapInterval, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow};
use raw_window_handle::HasWindowHandle;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowId},
};

use crate::camera::{Camera, Direction};
use crate::config::DemoConfig;
use crate::device::GlDevice;
use crate::error::{Error, Result};
use crate::input::{FrameClock, InputState};
use crate::quad::QuadRenderer;

/// Pixels per line for touchpads that report scroll in pixels.
const PIXELS_PER_SCROLL_LINE: f64 = 20.0;

/// Open the demo window and run until it is closed.
///
/// # Errors
///
/// [`Error::InputCollaborator`] if the event loop, window or GL context
/// cannot be created; [`Error::AssetLoad`] or [`Error::DeviceResource`] if
/// the quad cannot be built. All of these happen before the first frame.
pub fn run(config: DemoConfig) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|e| Error::InputCollaborator(format!("event loop: {e}")))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DemoApp {
        config,
        running: None,
        input: InputState::new(),
        clock: FrameClock::new(),
        error: None,
    };
    event_loop
        .run_app(&mut app)
        .map_err(|e| Error::InputCollaborator(format!("event loop: {e}")))?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Everything that exists only while the window is open.
///
/// Field order is drop order: GPU resources go before the context that owns
/// them.
struct Running {
    quad: QuadRenderer<GlDevice>,
    camera: Camera,
    gl_surface: Surface<WindowSurface>,
    gl_context: PossiblyCurrentContext,
    window: Window,
    /// Mouselook reads raw motion when grabbed, cursor positions otherwise.
    cursor_grabbed: bool,
    focused: bool,
}

struct DemoApp {
    config: DemoConfig,
    running: Option<Running>,
    input: InputState,
    clock: FrameClock,
    /// First fatal error; reported by [`run`] after the loop exits.
    error: Option<Error>,
}

impl DemoApp {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Error) {
        log::error!("{error}");
        if self.error.is_none() {
            self.error = Some(error);
        }
        event_loop.exit();
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let pressed = event.state == ElementState::Pressed;
        let direction = match code {
            KeyCode::Escape => {
                if pressed {
                    self.input.request_close();
                }
                return;
            }
            KeyCode::KeyW => Direction::Forward,
            KeyCode::KeyS => Direction::Backward,
            KeyCode::KeyA => Direction::Left,
            KeyCode::KeyD => Direction::Right,
            _ => return,
        };
        self.input.set_direction(direction, pressed);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if self.input.should_close() {
            event_loop.exit();
            return;
        }
        let Some(running) = self.running.as_mut() else {
            return;
        };

        let delta = self.clock.tick();
        self.input.apply_to(&mut running.camera, delta);
        running.quad.draw(&running.camera, self.clock.elapsed());

        if let Err(e) = running.gl_surface.swap_buffers(&running.gl_context) {
            log::warn!("swap_buffers failed: {e}");
        }
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match create_running(event_loop, &self.config) {
            Ok(running) => {
                running.window.request_redraw();
                self.running = Some(running);
                self.clock = FrameClock::new();
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.input.request_close(),
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&event),
            WindowEvent::CursorMoved { position, .. } => {
                if self.running.as_ref().is_some_and(|running| !running.cursor_grabbed) {
                    self.input.cursor_moved(position.x, position.y);
                }
            }
            WindowEvent::Focused(focused) => {
                if let Some(running) = &mut self.running {
                    running.focused = focused;
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => f64::from(y),
                    MouseScrollDelta::PixelDelta(position) => position.y / PIXELS_PER_SCROLL_LINE,
                };
                self.input.scrolled(lines);
            }
            WindowEvent::Resized(size) => {
                if let Some(running) = &self.running {
                    resize(running, size);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        let DeviceEvent::MouseMotion { delta: (dx, dy) } = event else {
            return;
        };
        if self
            .running
            .as_ref()
            .is_some_and(|running| running.cursor_grabbed && running.focused)
        {
            self.input.mouse_motion(dx, dy);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.input.should_close() {
            event_loop.exit();
        } else if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Release GPU resources while the context is still current.
        self.running = None;
    }
}

fn resize(running: &Running, size: PhysicalSize<u32>) {
    let (Some(width), Some(height)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
    else {
        return;
    };
    running.gl_surface.resize(&running.gl_context, width, height);
    running.quad.resize(size.width, size.height);
}

/// Pick the config with the most MSAA samples.
///
/// glutin only calls the picker with a non-empty set; it reports "no
/// matching config" as a build error instead.
fn pick_config(configs: Box<dyn Iterator<Item = Config> + '_>) -> Config {
    configs
        .reduce(|best, config| {
            if config.num_samples() > best.num_samples() {
                config
            } else {
                best
            }
        })
        // The picker signature has no error path, and the set is never
        // empty (see above), so this cannot fire.
        .expect("glutin offered no GL configs")
}

fn create_running(event_loop: &ActiveEventLoop, config: &DemoConfig) -> Result<Running> {
    let attributes = Window::default_attributes()
        .with_title(&config.title)
        .with_inner_size(LogicalSize::new(config.width, config.height));

    let (window, gl_config) = DisplayBuilder::new()
        .with_window_attributes(Some(attributes))
        .build(event_loop, ConfigTemplateBuilder::new(), pick_config)
        .map_err(|e| Error::InputCollaborator(format!("GL display: {e}")))?;
    let window = window.ok_or_else(|| Error::InputCollaborator("no window created".to_owned()))?;

    let raw_window_handle = window
        .window_handle()
        .map_err(|e| Error::InputCollaborator(format!("window handle: {e}")))?
        .as_raw();
    let context_attributes = ContextAttributesBuilder::new()
        .with_profile(GlProfile::Core)
        .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
        .build(Some(raw_window_handle));

    let display = gl_config.display();
    // SAFETY: the raw window handle belongs to `window`, which outlives the
    // context (both live in `Running`, window dropped last).
    let not_current = unsafe { display.create_context(&gl_config, &context_attributes) }
        .map_err(|e| Error::InputCollaborator(format!("GL context: {e}")))?;

    let surface_attributes = window
        .build_surface_attributes(Default::default())
        .map_err(|e| Error::InputCollaborator(format!("surface attributes: {e}")))?;
    // SAFETY: as above, the surface never outlives `window`.
    let gl_surface = unsafe { display.create_window_surface(&gl_config, &surface_attributes) }
        .map_err(|e| Error::InputCollaborator(format!("GL surface: {e}")))?;
    let gl_context = not_current
        .make_current(&gl_surface)
        .map_err(|e| Error::InputCollaborator(format!("make current: {e}")))?;

    let interval = if config.vsync {
        SwapInterval::Wait(NonZeroU32::MIN)
    } else {
        SwapInterval::DontWait
    };
    if let Err(e) = gl_surface.set_swap_interval(&gl_context, interval) {
        log::warn!("could not set swap interval: {e}");
    }

    // SAFETY: the loader comes from the display of the context we just made
    // current.
    let gl =
        unsafe { glow::Context::from_loader_function_cstr(|name| display.get_proc_address(name)) };
    // SAFETY: the context is current on this thread and `Running` keeps it
    // alive until after the quad (the only user of the device) is dropped.
    let device = Rc::new(unsafe { GlDevice::new(gl) });
    log::info!("OpenGL 3.3 core context ready");

    let quad = QuadRenderer::from_config(&device, config)?;
    let size = window.inner_size();
    quad.resize(size.width, size.height);

    // Either grab mode keeps the cursor in the window; mouselook then comes
    // from raw motion, so the window edge never stops rotation.
    let cursor_grabbed = match window
        .set_cursor_grab(CursorGrabMode::Locked)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
    {
        Ok(()) => true,
        Err(e) => {
            log::warn!("could not grab cursor, using absolute cursor positions: {e}");
            false
        }
    };
    window.set_cursor_visible(false);

    // The camera aspect ratio comes from the configured size, not the actual
    // framebuffer, and stays fixed.
    #[expect(clippy::cast_precision_loss)]
    let camera = Camera::new(config.width as f32, config.height as f32);

    Ok(Running {
        quad,
        camera,
        gl_surface,
        gl_context,
        window,
        cursor_grabbed,
        focused: true,
    })
}
