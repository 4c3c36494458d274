//! [`Device`] implementation backed by a real OpenGL context through [glow].
//!
//! [glow]: https://docs.rs/glow

use glam::{Mat4, Vec3, Vec4};
use glow::{HasContext, PixelUnpackData};

use super::{BufferTarget, ChannelFormat, Device, ShaderKind};

/// Convert a `u32` to the `i32` that GL size parameters expect, saturating
/// at `i32::MAX`.
fn gl_size(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Convert a GL enum constant to the `i32` expected by `tex_parameter_i32`
/// and `tex_image_2d`.
///
/// GL constant values are small enough that the cast is always safe.
#[expect(clippy::cast_possible_wrap)]
const fn gl_enum(value: u32) -> i32 {
    value as i32
}

fn buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

/// `(internal format, pixel format)` for an 8-bit upload.
fn texture_formats(format: ChannelFormat) -> (u32, u32) {
    match format {
        ChannelFormat::Red => (glow::R8, glow::RED),
        ChannelFormat::Rg => (glow::RG8, glow::RG),
        ChannelFormat::Rgb => (glow::RGB8, glow::RGB),
        ChannelFormat::Rgba => (glow::RGBA8, glow::RGBA),
    }
}

/// An OpenGL device.
///
/// Owns the [`glow::Context`]. All methods are safe to call once the device
/// exists, because [`GlDevice::new`] moves the "context is current" obligation
/// onto its caller.
pub struct GlDevice {
    gl: glow::Context,
}

impl GlDevice {
    /// Wrap a loaded GL context.
    ///
    /// # Safety
    ///
    /// The context must be current on the calling thread, and must stay
    /// current and alive for as long as this device (and every resource
    /// created through it) exists. The device must only be used from that
    /// thread.
    pub unsafe fn new(gl: glow::Context) -> Self {
        Self { gl }
    }
}

impl Device for GlDevice {
    type Buffer = glow::Buffer;
    type VertexArray = glow::VertexArray;
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Texture = glow::Texture;
    type UniformLocation = glow::UniformLocation;

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { self.gl.create_buffer() }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>) {
        unsafe { self.gl.bind_buffer(buffer_target(target), buffer) };
    }

    fn buffer_data_static(&self, target: BufferTarget, data: &[u8]) {
        unsafe {
            self.gl
                .buffer_data_u8_slice(buffer_target(target), data, glow::STATIC_DRAW);
        }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) };
    }

    fn create_vertex_array(&self) -> Result<Self::VertexArray, String> {
        unsafe { self.gl.create_vertex_array() }
    }

    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>) {
        unsafe { self.gl.bind_vertex_array(vertex_array) };
    }

    fn delete_vertex_array(&self, vertex_array: Self::VertexArray) {
        unsafe { self.gl.delete_vertex_array(vertex_array) };
    }

    fn vertex_attrib_pointer_f32(&self, slot: u32, components: i32, stride: i32, offset: i32) {
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(slot, components, glow::FLOAT, false, stride, offset);
        }
    }

    fn enable_vertex_attrib_array(&self, slot: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(slot) };
    }

    fn create_shader(&self, kind: ShaderKind) -> Result<Self::Shader, String> {
        let shader_type = match kind {
            ShaderKind::Vertex => glow::VERTEX_SHADER,
            ShaderKind::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { self.gl.create_shader(shader_type) }
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) {
        unsafe {
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
        }
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        unsafe { self.gl.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.gl.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { self.gl.delete_shader(shader) };
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { self.gl.create_program() }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.attach_shader(program, shader) };
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.detach_shader(program, shader) };
    }

    fn link_program(&self, program: Self::Program) {
        unsafe { self.gl.link_program(program) };
    }

    fn program_link_status(&self, program: Self::Program) -> bool {
        unsafe { self.gl.get_program_link_status(program) }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.gl.get_program_info_log(program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { self.gl.use_program(program) };
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) };
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn uniform_f32(&self, location: &Self::UniformLocation, value: f32) {
        unsafe { self.gl.uniform_1_f32(Some(location), value) };
    }

    fn uniform_vec3(&self, location: &Self::UniformLocation, value: Vec3) {
        unsafe { self.gl.uniform_3_f32(Some(location), value.x, value.y, value.z) };
    }

    fn uniform_vec4(&self, location: &Self::UniformLocation, value: Vec4) {
        unsafe {
            self.gl
                .uniform_4_f32(Some(location), value.x, value.y, value.z, value.w);
        }
    }

    fn uniform_i32(&self, location: &Self::UniformLocation, value: i32) {
        unsafe { self.gl.uniform_1_i32(Some(location), value) };
    }

    fn uniform_mat4(&self, location: &Self::UniformLocation, value: &Mat4) {
        unsafe {
            self.gl
                .uniform_matrix_4_f32_slice(Some(location), false, &value.to_cols_array());
        }
    }

    fn create_texture(&self) -> Result<Self::Texture, String> {
        unsafe { self.gl.create_texture() }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) };
    }

    fn bind_texture(&self, texture: Option<Self::Texture>) {
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, texture) };
    }

    fn tex_image_2d(&self, width: u32, height: u32, format: ChannelFormat, pixels: &[u8]) {
        let (internal_format, pixel_format) = texture_formats(format);
        unsafe {
            // Rows of 1-3 channel images are not 4-byte aligned in general.
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                gl_enum(internal_format),
                gl_size(width),
                gl_size(height),
                0,
                pixel_format,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(pixels)),
            );
        }
    }

    fn set_texture_sampling(&self) {
        let gl = &self.gl;
        unsafe {
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, gl_enum(glow::REPEAT));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, gl_enum(glow::REPEAT));
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                gl_enum(glow::LINEAR_MIPMAP_LINEAR),
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, gl_enum(glow::LINEAR));
        }
    }

    fn generate_mipmap(&self) {
        unsafe { self.gl.generate_mipmap(glow::TEXTURE_2D) };
    }

    fn delete_texture(&self, texture: Self::Texture) {
        unsafe { self.gl.delete_texture(texture) };
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) };
    }

    fn enable_depth_test(&self) {
        unsafe { self.gl.enable(glow::DEPTH_TEST) };
    }

    fn clear(&self, [r, g, b, a]: [f32; 4]) {
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    fn draw_triangles(&self, count: i32, offset: i32) {
        unsafe {
            self.gl
                .draw_elements(glow::TRIANGLES, count, glow::UNSIGNED_INT, offset);
        }
    }
}
