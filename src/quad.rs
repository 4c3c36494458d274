//! The textured quad: geometry, GPU resources and the per-frame draw.

use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::buffer::GpuBuffer;
use crate::camera::Camera;
use crate::config::DemoConfig;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::shader::ShaderProgram;
use crate::shaders::{self, uniforms};
use crate::texture::Texture;
use crate::vertex_array::{AttributeDescriptor, VertexLayout};

/// A quad vertex, ready for the GPU.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct QuadVertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Texture coordinate.
    pub tex_coord: [f32; 2],
}

/// Floats per [`QuadVertex`].
const VERTEX_FLOATS: usize = std::mem::size_of::<QuadVertex>() / std::mem::size_of::<f32>();

/// Unit quad centred on the origin in the XY plane.
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    // top right
    QuadVertex { position: [0.5, 0.5, 0.0], tex_coord: [1.0, 1.0] },
    // bottom right
    QuadVertex { position: [0.5, -0.5, 0.0], tex_coord: [1.0, 0.0] },
    // bottom left
    QuadVertex { position: [-0.5, -0.5, 0.0], tex_coord: [0.0, 0.0] },
    // top left
    QuadVertex { position: [-0.5, 0.5, 0.0], tex_coord: [0.0, 1.0] },
];

/// Two triangles sharing the top-left/bottom-right diagonal.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 3, 1, 2, 3];

/// Draw settings that do not need a rebuild of GPU resources.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadSettings {
    /// Background color, RGBA.
    pub clear_color: [f32; 4],
    /// Weight of the overlay texture.
    pub mix_value: f32,
}

impl Default for QuadSettings {
    fn default() -> Self {
        Self::from(&DemoConfig::default())
    }
}

impl From<&DemoConfig> for QuadSettings {
    fn from(config: &DemoConfig) -> Self {
        Self {
            clear_color: config.clear_color,
            mix_value: config.mix_value,
        }
    }
}

/// Tint pulsed over time: green swings between 0 and 1.
#[must_use]
pub fn tint_at(time_seconds: f32) -> Vec4 {
    Vec4::new(0.0, time_seconds.sin() / 2.0 + 0.5, 0.0, 1.0)
}

/// Owns every GPU resource of the quad and draws it.
///
/// Fields drop in declaration order, so the program goes first and the
/// textures last; order does not matter to the device.
#[derive(Debug)]
pub struct QuadRenderer<D: Device> {
    device: Rc<D>,
    program: ShaderProgram<D>,
    layout: VertexLayout<D>,
    vertices: GpuBuffer<D>,
    indices: GpuBuffer<D>,
    textures: [Texture<D>; 2],
    index_count: i32,
    settings: QuadSettings,
}

impl<D: Device> QuadRenderer<D> {
    /// Load both textures named by `config` and build the quad.
    ///
    /// # Errors
    ///
    /// [`Error::AssetLoad`] if a texture cannot be decoded,
    /// [`Error::DeviceResource`] if a resource cannot be created.
    pub fn from_config(device: &Rc<D>, config: &DemoConfig) -> Result<Self> {
        let [base, overlay] = &config.textures;
        let textures = [Texture::from_path(device, base)?, Texture::from_path(device, overlay)?];
        Self::new(device, textures, QuadSettings::from(config))
    }

    /// Build the quad with the built-in shaders.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceResource`] if a resource cannot be created. Shader
    /// compile or link failures are only logged.
    pub fn new(device: &Rc<D>, textures: [Texture<D>; 2], settings: QuadSettings) -> Result<Self> {
        Self::with_sources(
            device,
            shaders::QUAD_VERTEX_SRC,
            shaders::QUAD_FRAGMENT_SRC,
            textures,
            settings,
        )
    }

    /// Build the quad with custom shader sources.
    ///
    /// The sources must use the attribute locations and uniform names of
    /// [`shaders`]; uniforms they leave out are skipped.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_sources(
        device: &Rc<D>,
        vertex_source: &str,
        fragment_source: &str,
        textures: [Texture<D>; 2],
        settings: QuadSettings,
    ) -> Result<Self> {
        let program = ShaderProgram::build(device, vertex_source, fragment_source)?;

        let mut layout = VertexLayout::new(device)?;
        layout.bind();
        let vertices = GpuBuffer::vertex(device, bytemuck::cast_slice(&QUAD_VERTICES))?;
        layout.declare_attribute(AttributeDescriptor::floats(0, 3, VERTEX_FLOATS, 0))?;
        layout.declare_attribute(AttributeDescriptor::floats(1, 2, VERTEX_FLOATS, 3))?;
        let indices = GpuBuffer::index(device, &QUAD_INDICES)?;
        // The layout keeps the vertex buffer association.
        vertices.unbind();
        layout.unbind();

        let index_count = i32::try_from(indices.element_count())
            .map_err(|_| Error::DeviceResource("index count exceeds i32::MAX".to_owned()))?;

        // Sampler units never change, so assign them once.
        program.use_program();
        program.set_uniform_int(uniforms::TEXTURE1, 0);
        program.set_uniform_int(uniforms::TEXTURE2, 1);
        device.enable_depth_test();

        log::info!("quad ready: {index_count} indices, linked = {}", program.is_linked());

        Ok(Self {
            device: Rc::clone(device),
            program,
            layout,
            vertices,
            indices,
            textures,
            index_count,
            settings,
        })
    }

    /// Clear the frame and draw the quad as seen by `camera`.
    ///
    /// Every slot the draw depends on (texture units 0 and 1, program,
    /// vertex array) is bound here, so whatever other code bound in between
    /// frames does not matter.
    pub fn draw(&self, camera: &Camera, time_seconds: f32) {
        self.device.clear(self.settings.clear_color);

        let [base, overlay] = &self.textures;
        base.bind(0);
        overlay.bind(1);

        let program = &self.program;
        program.use_program();
        program.set_uniform_float4(uniforms::TINT, tint_at(time_seconds));
        program.set_uniform_float(uniforms::MIX_VALUE, self.settings.mix_value);
        program.set_uniform_mat4(uniforms::MODEL, &Mat4::IDENTITY);
        program.set_uniform_mat4(uniforms::VIEW, &camera.view());
        program.set_uniform_mat4(uniforms::PROJECTION, &camera.projection());

        self.layout.bind();
        self.device.draw_triangles(self.index_count, 0);
    }

    /// Match the viewport to a new framebuffer size.
    ///
    /// The camera projection is left alone.
    pub fn resize(&self, width: u32, height: u32) {
        let width = i32::try_from(width).unwrap_or(i32::MAX);
        let height = i32::try_from(height).unwrap_or(i32::MAX);
        self.device.viewport(0, 0, width, height);
    }

    /// Current draw settings.
    #[must_use]
    pub fn settings(&self) -> QuadSettings {
        self.settings
    }

    /// Change draw settings for subsequent frames.
    pub fn set_settings(&mut self, settings: QuadSettings) {
        self.settings = settings;
    }

    /// The quad's shader program.
    #[must_use]
    pub fn program(&self) -> &ShaderProgram<D> {
        &self.program
    }

    /// The quad's vertex layout.
    #[must_use]
    pub fn layout(&self) -> &VertexLayout<D> {
        &self.layout
    }

    /// Vertex and index buffers.
    #[must_use]
    pub fn buffers(&self) -> (&GpuBuffer<D>, &GpuBuffer<D>) {
        (&self.vertices, &self.indices)
    }

    /// Base and overlay textures.
    #[must_use]
    pub fn textures(&self) -> &[Texture<D>; 2] {
        &self.textures
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::device::recording::{DrawCall, ObjectKind, UniformValue};
    use crate::device::{BufferTarget, RecordingDevice};
    use crate::texture::DecodedImage;

    fn textures(device: &Rc<RecordingDevice>) -> [Texture<RecordingDevice>; 2] {
        let image = DecodedImage {
            pixels: vec![255; 2 * 2 * 4],
            width: 2,
            height: 2,
            channels: 4,
        };
        [
            Texture::from_image(device, &image).unwrap(),
            Texture::from_image(device, &image).unwrap(),
        ]
    }

    fn renderer(device: &Rc<RecordingDevice>) -> QuadRenderer<RecordingDevice> {
        QuadRenderer::new(device, textures(device), QuadSettings::default()).unwrap()
    }

    #[test]
    fn geometry_is_five_floats_per_vertex() {
        assert_eq!(VERTEX_FLOATS, 5);
        let floats: &[f32] = bytemuck::cast_slice(&QUAD_VERTICES);
        assert_eq!(floats.len(), 20);
    }

    #[test]
    fn construction_leaves_slots_clear_and_layout_complete() {
        let device = Rc::new(RecordingDevice::new());
        let quad = renderer(&device);
        let (vertices, indices) = quad.buffers();

        assert_eq!(device.bound_vertex_array(), None);
        assert_eq!(device.bound_buffer(BufferTarget::Array), None);
        assert_eq!(vertices.byte_len(), 80);
        assert_eq!(indices.byte_len(), 24);

        let vao = quad.layout().handle();
        assert_eq!(device.vertex_array_element_buffer(vao), Some(indices.handle()));
        let attributes = device.vertex_array_attributes(vao);
        assert_eq!(attributes[&0].components, 3);
        assert_eq!(attributes[&1].components, 2);
        assert_eq!(attributes[&1].offset, 12);
        assert!(attributes.values().all(|a| a.enabled && a.buffer == Some(vertices.handle())));

        let program = quad.program().handle().unwrap();
        assert!(quad.program().is_linked());
        assert_eq!(device.uniform_value(program, "texture1"), Some(UniformValue::Int(0)));
        assert_eq!(device.uniform_value(program, "texture2"), Some(UniformValue::Int(1)));
        assert!(device.errors().is_empty(), "{:?}", device.errors());
    }

    #[test]
    fn draw_binds_everything_it_needs() {
        let device = Rc::new(RecordingDevice::new());
        let quad = renderer(&device);
        let camera = Camera::new(800.0, 600.0);

        quad.draw(&camera, 0.0);

        let [base, overlay] = quad.textures();
        let program = quad.program().handle();
        assert_eq!(
            device.draws(),
            vec![DrawCall {
                count: 6,
                offset: 0,
                vertex_array: Some(quad.layout().handle()),
                element_buffer: Some(quad.buffers().1.handle()),
                program,
                textures: vec![(0, base.handle()), (1, overlay.handle())],
            }]
        );

        let program = program.unwrap();
        assert_eq!(
            device.uniform_value(program, "view"),
            Some(UniformValue::Mat4(camera.view()))
        );
        assert_eq!(
            device.uniform_value(program, "projection"),
            Some(UniformValue::Mat4(camera.projection()))
        );
        assert_eq!(
            device.uniform_value(program, "tint"),
            Some(UniformValue::Vec4(Vec4::new(0.0, 0.5, 0.0, 1.0)))
        );
        assert_eq!(
            device.uniform_value(program, "mixValue"),
            Some(UniformValue::Float(0.2))
        );
        assert!(device.errors().is_empty(), "{:?}", device.errors());
    }

    #[test]
    fn draw_recovers_from_foreign_bindings() {
        let device = Rc::new(RecordingDevice::new());
        let quad = renderer(&device);
        let camera = Camera::new(800.0, 600.0);

        // Something else takes over unit 0, the program slot and the
        // vertex array slot between frames.
        let intruder = Texture::from_image(
            &device,
            &DecodedImage {
                pixels: vec![0; 3],
                width: 1,
                height: 1,
                channels: 3,
            },
        )
        .unwrap();
        intruder.bind(0);
        let other = ShaderProgram::build(&device, shaders::QUAD_VERTEX_SRC, shaders::QUAD_FRAGMENT_SRC)
            .unwrap();
        other.use_program();
        let other_layout = VertexLayout::new(&device).unwrap();
        other_layout.bind();

        quad.draw(&camera, 1.0);

        let draw = device.draws().pop().unwrap();
        assert_eq!(draw.program, quad.program().handle());
        assert_eq!(draw.vertex_array, Some(quad.layout().handle()));
        assert_eq!(draw.textures[0], (0, quad.textures()[0].handle()));
    }

    #[test]
    fn moving_the_camera_changes_the_view_uniform_only() {
        let device = Rc::new(RecordingDevice::new());
        let quad = renderer(&device);
        let mut camera = Camera::new(800.0, 600.0);
        let program = quad.program().handle().unwrap();

        quad.draw(&camera, 0.0);
        let first_view = device.uniform_value(program, "view");
        camera.on_cursor_moved(0.0, 0.0);
        camera.on_cursor_moved(50.0, 0.0);
        camera.on_scroll(30.0);
        quad.draw(&camera, 0.0);

        assert_ne!(device.uniform_value(program, "view"), first_view);
        assert_eq!(
            device.uniform_value(program, "projection"),
            Some(UniformValue::Mat4(Camera::new(800.0, 600.0).projection()))
        );
    }

    #[test]
    fn resize_only_touches_the_viewport() {
        let device = Rc::new(RecordingDevice::new());
        let quad = renderer(&device);
        device.clear_calls();
        quad.resize(1024, 768);
        assert_eq!(
            device.calls(),
            vec![crate::device::recording::Call::Viewport(0, 0, 1024, 768)]
        );
    }

    #[test]
    fn broken_shader_degrades_without_failing() {
        let device = Rc::new(RecordingDevice::new());
        let quad = QuadRenderer::with_sources(
            &device,
            shaders::QUAD_VERTEX_SRC,
            "#version 330 core\n#error broken\nvoid main() {}\n",
            textures(&device),
            QuadSettings::default(),
        )
        .unwrap();
        assert!(!quad.program().is_linked());

        quad.draw(&Camera::new(800.0, 600.0), 0.0);
        assert_eq!(device.draws().len(), 1);
    }

    #[test]
    fn dropping_the_renderer_releases_everything() {
        let device = Rc::new(RecordingDevice::new());
        drop(renderer(&device));
        for kind in [
            ObjectKind::Buffer,
            ObjectKind::VertexArray,
            ObjectKind::Shader,
            ObjectKind::Program,
            ObjectKind::Texture,
        ] {
            assert_eq!(device.live_count(kind), 0, "{kind:?} leaked");
        }
        assert!(device.errors().is_empty());
    }

    #[test]
    fn missing_texture_file_is_fatal_for_construction() {
        let device = Rc::new(RecordingDevice::new());
        let config = DemoConfig {
            textures: [
                std::env::temp_dir().join("glow-quad-demo-missing-a.png"),
                std::env::temp_dir().join("glow-quad-demo-missing-b.png"),
            ],
            ..DemoConfig::default()
        };
        assert!(matches!(
            QuadRenderer::from_config(&device, &config),
            Err(Error::AssetLoad { .. })
        ));
    }
}
