//! A textured-quad OpenGL demo built on [glow], with scoped GPU resource
//! wrappers and a first-person camera.
//!
//! The crate is split into small owning wrappers around GPU objects and the
//! demo that wires them together:
//!
//! - [`GpuBuffer`], [`VertexLayout`], [`ShaderProgram`] and [`Texture`] each
//!   own one GPU object, release it exactly once (explicitly or on drop) and
//!   act on the device's global binding slots when bound.
//! - [`Camera`] turns mouse, scroll and WASD input into view and projection
//!   matrices via [glam].
//! - [`QuadRenderer`] draws two blended textures on a quad every frame.
//! - The `viewer` feature adds [`app::run`], a winit + glutin window running
//!   the frame loop.
//!
//! # Features
//!
//! - **`glow`**: [`GlDevice`], the OpenGL implementation of [`Device`].
//! - **`viewer`**: the window, GL context and the `glow-quad-demo` binary.
//!
//! Without either feature the wrappers still build against
//! [`RecordingDevice`], a headless device that records calls and tracks
//! binding state. All unit tests run against it.
//!
//! # Safety
//!
//! Creating a [`GlDevice`] is `unsafe`: the caller promises an OpenGL
//! context is current on the calling thread for as long as the device and
//! every wrapper holding it live. Everything after that is safe code.
//!
//! [glow]: https://docs.rs/glow
//! [glam]: https://docs.rs/glam

#[cfg(feature = "viewer")]
pub mod app;
pub mod buffer;
pub mod camera;
pub mod config;
pub mod device;
pub mod error;
pub mod input;
pub mod quad;
pub mod shader;
pub mod shaders;
pub mod texture;
pub mod vertex_array;

pub use buffer::{BufferKind, GpuBuffer};
pub use camera::{Camera, Direction, MovementKeys};
pub use config::DemoConfig;
#[cfg(feature = "glow")]
pub use device::GlDevice;
pub use device::{Device, RecordingDevice};
pub use error::{Error, Result, ShaderDiagnostic, ShaderStage};
pub use input::{FrameClock, InputState};
pub use quad::{QuadRenderer, QuadSettings};
pub use shader::{ProgramState, ShaderProgram};
pub use texture::{DecodedImage, Texture};
pub use vertex_array::{AttributeDescriptor, VertexLayout};
