//! The graphics device seam.
//!
//! Every GPU-facing wrapper in this crate talks to a [`Device`] instead of a
//! concrete GL binding. The trait mirrors the subset of `glow::HasContext`
//! the demo needs, with typed targets instead of raw GL enums.
//!
//! Two implementations exist:
//!
//! - [`GlDevice`] (feature `glow`) forwards to a real OpenGL context.
//! - [`RecordingDevice`] is headless: it hands out integer handles, tracks
//!   the binding slots and records every call so tests can assert what the
//!   device ended up looking like.
//!
//! # Binding slots
//!
//! The active array buffer, element buffer, vertex array, program, texture
//! unit and per-unit texture are global state of the device value. A bind
//! from one wrapper overwrites whatever another wrapper bound to the same
//! slot. Nothing in this crate caches or restores bindings; callers order
//! their bind calls.

use std::fmt;

use glam::{Mat4, Vec3, Vec4};

#[cfg(feature = "glow")]
mod gl;
pub mod recording;

#[cfg(feature = "glow")]
pub use gl::GlDevice;
pub use recording::RecordingDevice;

/// Buffer binding points used by the demo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// `GL_ARRAY_BUFFER`: per-vertex attribute data.
    Array,
    /// `GL_ELEMENT_ARRAY_BUFFER`: index data, captured by the bound vertex
    /// array.
    ElementArray,
}

/// Programmable stage a shader object compiles for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
}

/// Pixel layout of uploaded 8-bit texture data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelFormat {
    /// One channel.
    Red,
    /// Two channels.
    Rg,
    /// Three channels.
    Rgb,
    /// Four channels.
    Rgba,
}

impl ChannelFormat {
    /// Pick the upload format for an image with `channels` 8-bit channels.
    #[must_use]
    pub fn from_channel_count(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(Self::Red),
            2 => Some(Self::Rg),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    /// Bytes per pixel.
    #[must_use]
    pub fn channels(self) -> u8 {
        match self {
            Self::Red => 1,
            Self::Rg => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// An opaque, handle-based graphics device.
///
/// Allocation methods return `Err(String)` with the driver's message, the same
/// way `glow` does. Everything else is fire-and-forget: like GL, the device
/// silently ignores calls that reference a missing object.
pub trait Device {
    /// Buffer object handle.
    type Buffer: Copy + Eq + fmt::Debug;
    /// Vertex array object handle.
    type VertexArray: Copy + Eq + fmt::Debug;
    /// Shader stage object handle.
    type Shader: Copy + Eq + fmt::Debug;
    /// Linked program handle.
    type Program: Copy + Eq + fmt::Debug;
    /// 2D texture handle.
    type Texture: Copy + Eq + fmt::Debug;
    /// Resolved uniform location inside a program.
    type UniformLocation: Clone + fmt::Debug;

    /// Allocate a buffer object.
    ///
    /// # Errors
    ///
    /// The driver message if a buffer object cannot be allocated.
    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    /// Bind `buffer` to `target`, or clear the slot with `None`.
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>);
    /// Upload `data` with static usage into the buffer bound to `target`.
    fn buffer_data_static(&self, target: BufferTarget, data: &[u8]);
    /// Release a buffer object.
    fn delete_buffer(&self, buffer: Self::Buffer);

    /// Allocate a vertex array object.
    ///
    /// # Errors
    ///
    /// The driver message if a vertex array object cannot be allocated.
    fn create_vertex_array(&self) -> Result<Self::VertexArray, String>;
    /// Make `vertex_array` the current vertex input source.
    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>);
    /// Release a vertex array object.
    fn delete_vertex_array(&self, vertex_array: Self::VertexArray);
    /// Describe float attribute `slot`, sourced from the bound array buffer.
    fn vertex_attrib_pointer_f32(&self, slot: u32, components: i32, stride: i32, offset: i32);
    /// Enable attribute `slot` on the bound vertex array.
    fn enable_vertex_attrib_array(&self, slot: u32);

    /// Allocate a shader stage object.
    ///
    /// # Errors
    ///
    /// The driver message if a shader object cannot be allocated.
    fn create_shader(&self, kind: ShaderKind) -> Result<Self::Shader, String>;
    /// Set the source of `shader` and compile it.
    fn compile_shader(&self, shader: Self::Shader, source: &str);
    /// Whether the last compile of `shader` succeeded.
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;
    /// Driver log for the last compile of `shader`.
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    /// Release a shader stage object.
    fn delete_shader(&self, shader: Self::Shader);

    /// Allocate a program object.
    ///
    /// # Errors
    ///
    /// The driver message if a program object cannot be allocated.
    fn create_program(&self) -> Result<Self::Program, String>;
    /// Attach a stage to a program.
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    /// Detach a stage from a program.
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    /// Link the attached stages.
    fn link_program(&self, program: Self::Program);
    /// Whether the last link of `program` succeeded.
    fn program_link_status(&self, program: Self::Program) -> bool;
    /// Driver log for the last link of `program`.
    fn program_info_log(&self, program: Self::Program) -> String;
    /// Make `program` the active program.
    fn use_program(&self, program: Option<Self::Program>);
    /// Release a program object.
    fn delete_program(&self, program: Self::Program);

    /// Resolve a uniform by name. `None` when absent or optimized out.
    fn uniform_location(&self, program: Self::Program, name: &str)
        -> Option<Self::UniformLocation>;
    /// Write a `float` uniform of the active program.
    fn uniform_f32(&self, location: &Self::UniformLocation, value: f32);
    /// Write a `vec3` uniform of the active program.
    fn uniform_vec3(&self, location: &Self::UniformLocation, value: Vec3);
    /// Write a `vec4` uniform of the active program.
    fn uniform_vec4(&self, location: &Self::UniformLocation, value: Vec4);
    /// Write an `int` (or sampler) uniform of the active program.
    fn uniform_i32(&self, location: &Self::UniformLocation, value: i32);
    /// Write a column-major `mat4` uniform of the active program.
    fn uniform_mat4(&self, location: &Self::UniformLocation, value: &Mat4);

    /// Allocate a texture object.
    ///
    /// # Errors
    ///
    /// The driver message if a texture object cannot be allocated.
    fn create_texture(&self) -> Result<Self::Texture, String>;
    /// Select texture unit `unit` for subsequent texture binds.
    fn active_texture(&self, unit: u32);
    /// Bind a 2D texture to the active unit.
    fn bind_texture(&self, texture: Option<Self::Texture>);
    /// Upload level 0 of the 2D texture bound to the active unit.
    fn tex_image_2d(&self, width: u32, height: u32, format: ChannelFormat, pixels: &[u8]);
    /// Give the bound 2D texture repeat wrapping on both axes, trilinear
    /// minification across mip levels and bilinear magnification.
    fn set_texture_sampling(&self);
    /// Generate the mip chain of the bound 2D texture.
    fn generate_mipmap(&self);
    /// Release a texture object.
    fn delete_texture(&self, texture: Self::Texture);

    /// Set the viewport rectangle.
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    /// Enable depth testing.
    fn enable_depth_test(&self);
    /// Clear the color and depth buffers.
    fn clear(&self, color: [f32; 4]);
    /// Draw `count` `u32` indices from the bound vertex array as independent
    /// triangles, starting at byte `offset` into its element buffer.
    fn draw_triangles(&self, count: i32, offset: i32);
}
