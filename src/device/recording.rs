//! A headless [`Device`] that records what it is asked to do.
//!
//! Handles are plain `u32`s starting at 1 (0 is never handed out, matching
//! GL's "no object" name). Binding slots, buffer contents, vertex array
//! state, texture storage and uniform writes are kept so callers can check
//! post-conditions after a sequence of wrapper calls.
//!
//! Shader compilation is simulated: a stage fails to compile when its source
//! has no `main` entry point or contains an `#error` directive. A program
//! fails to link when any attached stage failed, or when it does not have
//! exactly one vertex and one fragment stage attached. Uniform locations are
//! resolved from `uniform <type> <name>;` declarations of the linked stages.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use glam::{Mat4, Vec3, Vec4};

use super::{BufferTarget, ChannelFormat, Device, ShaderKind};

/// Object families, used to key release counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Buffer objects.
    Buffer,
    /// Vertex array objects.
    VertexArray,
    /// Shader stage objects.
    Shader,
    /// Program objects.
    Program,
    /// Texture objects.
    Texture,
}

/// A uniform value as last written.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    /// `float`
    Float(f32),
    /// `vec3`
    Vec3(Vec3),
    /// `vec4`
    Vec4(Vec4),
    /// `int` or sampler unit
    Int(i32),
    /// `mat4`
    Mat4(Mat4),
}

/// Recorded state of one vertex attribute slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeState {
    /// Array buffer bound when the pointer was declared.
    pub buffer: Option<u32>,
    /// Components per vertex.
    pub components: i32,
    /// Byte stride.
    pub stride: i32,
    /// Byte offset of the first component.
    pub offset: i32,
    /// Whether the slot was enabled.
    pub enabled: bool,
}

/// Recorded storage and sampling state of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureState {
    /// Width in pixels, 0 until uploaded.
    pub width: u32,
    /// Height in pixels, 0 until uploaded.
    pub height: u32,
    /// Upload format, `None` until uploaded.
    pub format: Option<ChannelFormat>,
    /// Whether repeat wrapping and trilinear filtering were set.
    pub sampling_set: bool,
    /// Whether mipmaps were generated.
    pub mipmapped: bool,
}

/// Snapshot of the relevant binding slots at draw time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    /// Index count.
    pub count: i32,
    /// Byte offset into the element buffer.
    pub offset: i32,
    /// Vertex array bound at draw time.
    pub vertex_array: Option<u32>,
    /// Element buffer captured by that vertex array.
    pub element_buffer: Option<u32>,
    /// Program active at draw time.
    pub program: Option<u32>,
    /// `(unit, texture)` pairs bound at draw time, sorted by unit.
    pub textures: Vec<(u32, u32)>,
}

/// One recorded device call.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    /// `bind_buffer`
    BindBuffer(BufferTarget, Option<u32>),
    /// `buffer_data_static`, with the byte length uploaded.
    BufferData(BufferTarget, usize),
    /// `bind_vertex_array`
    BindVertexArray(Option<u32>),
    /// `vertex_attrib_pointer_f32`
    AttribPointer {
        /// Attribute slot.
        slot: u32,
        /// Components per vertex.
        components: i32,
        /// Byte stride.
        stride: i32,
        /// Byte offset.
        offset: i32,
    },
    /// `enable_vertex_attrib_array`
    EnableAttrib(u32),
    /// `compile_shader`
    CompileShader(u32),
    /// `link_program`
    LinkProgram(u32),
    /// `use_program`
    UseProgram(Option<u32>),
    /// A uniform write: `(active program, uniform name, value)`.
    Uniform(Option<u32>, String, UniformValue),
    /// `active_texture`
    ActiveTexture(u32),
    /// `bind_texture` on the given unit.
    BindTexture(u32, Option<u32>),
    /// `tex_image_2d`
    TexImage(u32, u32, ChannelFormat),
    /// `viewport`
    Viewport(i32, i32, i32, i32),
    /// `clear`
    Clear([f32; 4]),
    /// `draw_triangles`
    Draw(DrawCall),
    /// Any `delete_*` call.
    Delete(ObjectKind, u32),
}

#[derive(Debug)]
struct ShaderRecord {
    kind: ShaderKind,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    attached: Vec<u32>,
    linked: bool,
    log: String,
    uniforms: Vec<String>,
}

#[derive(Debug, Default)]
struct VertexArrayRecord {
    element_buffer: Option<u32>,
    attributes: BTreeMap<u32, AttributeState>,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    errors: Vec<String>,
    releases: HashMap<(ObjectKind, u32), usize>,

    buffers: HashMap<u32, Vec<u8>>,
    vertex_arrays: HashMap<u32, VertexArrayRecord>,
    shaders: HashMap<u32, ShaderRecord>,
    programs: HashMap<u32, ProgramRecord>,
    textures: HashMap<u32, TextureState>,

    /// `(program, name)` → location, and the reverse.
    locations: HashMap<(u32, String), u32>,
    location_names: HashMap<u32, (u32, String)>,
    uniforms: HashMap<(u32, String), UniformValue>,

    array_buffer: Option<u32>,
    /// Element buffer slot of the default (zero) vertex array.
    default_element_buffer: Option<u32>,
    vertex_array: Option<u32>,
    program: Option<u32>,
    active_unit: u32,
    unit_textures: BTreeMap<u32, u32>,
}

impl State {
    fn release(&mut self, kind: ObjectKind, handle: u32, live: bool) {
        *self.releases.entry((kind, handle)).or_default() += 1;
        self.calls.push(Call::Delete(kind, handle));
        if !live {
            self.errors
                .push(format!("delete of unknown or released {kind:?} {handle}"));
        }
    }

    fn element_buffer(&self) -> Option<u32> {
        match self.vertex_array {
            Some(vao) => self
                .vertex_arrays
                .get(&vao)
                .and_then(|record| record.element_buffer),
            None => self.default_element_buffer,
        }
    }

    fn write_uniform(&mut self, location: u32, value: UniformValue) {
        let Some((owner, name)) = self.location_names.get(&location).cloned() else {
            self.errors.push(format!("uniform write to unknown location {location}"));
            return;
        };
        let Some(active) = self.program else {
            self.errors.push(format!("uniform {name} written with no active program"));
            return;
        };
        if active != owner {
            // GL would raise INVALID_OPERATION and drop the write.
            self.errors.push(format!(
                "uniform {name} of program {owner} written while program {active} is active"
            ));
            return;
        }
        self.calls.push(Call::Uniform(Some(active), name.clone(), value));
        let _ = self.uniforms.insert((active, name), value);
    }
}

/// Headless recording device. See the [module docs](self).
#[derive(Debug)]
pub struct RecordingDevice {
    state: RefCell<State>,
    next_handle: Cell<u32>,
    fail_allocations: Cell<bool>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    /// Create an empty device.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::default()),
            next_handle: Cell::new(1),
            fail_allocations: Cell::new(false),
        }
    }

    /// Make every subsequent `create_*` call fail (or succeed again).
    pub fn set_fail_allocations(&self, fail: bool) {
        self.fail_allocations.set(fail);
    }

    fn allocate(&self, what: &str) -> Result<u32, String> {
        if self.fail_allocations.get() {
            return Err(format!("out of memory allocating {what}"));
        }
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        Ok(handle)
    }

    /// Every call recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Forget the recorded call list (state is kept).
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Draw calls recorded so far.
    #[must_use]
    pub fn draws(&self) -> Vec<DrawCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw(draw) => Some(draw.clone()),
                _ => None,
            })
            .collect()
    }

    /// Invalid operations the device noticed (the equivalent of GL errors).
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.state.borrow().errors.clone()
    }

    /// How many times `handle` of `kind` has been deleted.
    #[must_use]
    pub fn release_count(&self, kind: ObjectKind, handle: u32) -> usize {
        self.state
            .borrow()
            .releases
            .get(&(kind, handle))
            .copied()
            .unwrap_or(0)
    }

    /// Number of live (allocated, not deleted) objects of `kind`.
    #[must_use]
    pub fn live_count(&self, kind: ObjectKind) -> usize {
        let state = self.state.borrow();
        match kind {
            ObjectKind::Buffer => state.buffers.len(),
            ObjectKind::VertexArray => state.vertex_arrays.len(),
            ObjectKind::Shader => state.shaders.len(),
            ObjectKind::Program => state.programs.len(),
            ObjectKind::Texture => state.textures.len(),
        }
    }

    /// Buffer currently bound to `target`. For the element target this is
    /// the slot of the bound vertex array.
    #[must_use]
    pub fn bound_buffer(&self, target: BufferTarget) -> Option<u32> {
        let state = self.state.borrow();
        match target {
            BufferTarget::Array => state.array_buffer,
            BufferTarget::ElementArray => state.element_buffer(),
        }
    }

    /// Currently bound vertex array.
    #[must_use]
    pub fn bound_vertex_array(&self) -> Option<u32> {
        self.state.borrow().vertex_array
    }

    /// Currently active program.
    #[must_use]
    pub fn current_program(&self) -> Option<u32> {
        self.state.borrow().program
    }

    /// Currently selected texture unit.
    #[must_use]
    pub fn active_texture_unit(&self) -> u32 {
        self.state.borrow().active_unit
    }

    /// Texture bound to `unit`.
    #[must_use]
    pub fn texture_on_unit(&self, unit: u32) -> Option<u32> {
        self.state.borrow().unit_textures.get(&unit).copied()
    }

    /// Contents of a live buffer.
    #[must_use]
    pub fn buffer_contents(&self, buffer: u32) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).cloned()
    }

    /// Element buffer captured by a vertex array.
    #[must_use]
    pub fn vertex_array_element_buffer(&self, vertex_array: u32) -> Option<u32> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array)
            .and_then(|record| record.element_buffer)
    }

    /// Attribute state of a vertex array, keyed by slot.
    #[must_use]
    pub fn vertex_array_attributes(&self, vertex_array: u32) -> BTreeMap<u32, AttributeState> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array)
            .map(|record| record.attributes.clone())
            .unwrap_or_default()
    }

    /// Storage and sampling state of a live texture.
    #[must_use]
    pub fn texture_state(&self, texture: u32) -> Option<TextureState> {
        self.state.borrow().textures.get(&texture).copied()
    }

    /// Last value written to `name` while `program` was active.
    #[must_use]
    pub fn uniform_value(&self, program: u32, name: &str) -> Option<UniformValue> {
        self.state
            .borrow()
            .uniforms
            .get(&(program, name.to_owned()))
            .copied()
    }

    /// Whether the program linked successfully.
    #[must_use]
    pub fn program_linked(&self, program: u32) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .is_some_and(|record| record.linked)
    }
}

/// Simulated compiler: returns the error log, or `None` on success.
fn simulate_compile(kind: ShaderKind, source: &str) -> Option<String> {
    let stage = match kind {
        ShaderKind::Vertex => "vertex",
        ShaderKind::Fragment => "fragment",
    };
    if let Some((line, _)) = source
        .lines()
        .enumerate()
        .find(|(_, text)| text.trim_start().starts_with("#error"))
    {
        return Some(format!("0:{}(1): error: #error directive in {stage} shader", line + 1));
    }
    if !source.contains("void main") {
        return Some(format!("0:0(0): error: {stage} shader has no entry point main()"));
    }
    None
}

/// Names declared as `uniform <type> <name>;` in `source`.
fn declared_uniforms(source: &str) -> impl Iterator<Item = String> + '_ {
    source.lines().filter_map(|line| {
        let rest = line.trim().strip_prefix("uniform ")?;
        let declaration = rest.split(';').next()?;
        let name = declaration.split_whitespace().nth(1)?;
        Some(name.split('[').next().unwrap_or(name).to_owned())
    })
}

impl Device for RecordingDevice {
    type Buffer = u32;
    type VertexArray = u32;
    type Shader = u32;
    type Program = u32;
    type Texture = u32;
    type UniformLocation = u32;

    fn create_buffer(&self) -> Result<u32, String> {
        let handle = self.allocate("buffer")?;
        let _ = self.state.borrow_mut().buffers.insert(handle, Vec::new());
        Ok(handle)
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<u32>) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.calls.push(Call::BindBuffer(target, buffer));
        if let Some(handle) = buffer {
            if !state.buffers.contains_key(&handle) {
                state.errors.push(format!("bind of unknown buffer {handle}"));
                return;
            }
        }
        match target {
            BufferTarget::Array => state.array_buffer = buffer,
            BufferTarget::ElementArray => match state.vertex_array {
                Some(vao) => {
                    if let Some(record) = state.vertex_arrays.get_mut(&vao) {
                        record.element_buffer = buffer;
                    }
                }
                None => state.default_element_buffer = buffer,
            },
        }
    }

    fn buffer_data_static(&self, target: BufferTarget, data: &[u8]) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.calls.push(Call::BufferData(target, data.len()));
        let bound = match target {
            BufferTarget::Array => state.array_buffer,
            BufferTarget::ElementArray => state.element_buffer(),
        };
        match bound.and_then(|handle| state.buffers.get_mut(&handle)) {
            Some(contents) => *contents = data.to_vec(),
            None => state.errors.push(format!("buffer data with no {target:?} buffer bound")),
        }
    }

    fn delete_buffer(&self, buffer: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let live = state.buffers.remove(&buffer).is_some();
        if state.array_buffer == Some(buffer) {
            state.array_buffer = None;
        }
        if state.default_element_buffer == Some(buffer) {
            state.default_element_buffer = None;
        }
        state.release(ObjectKind::Buffer, buffer, live);
    }

    fn create_vertex_array(&self) -> Result<u32, String> {
        let handle = self.allocate("vertex array")?;
        let _ = self
            .state
            .borrow_mut()
            .vertex_arrays
            .insert(handle, VertexArrayRecord::default());
        Ok(handle)
    }

    fn bind_vertex_array(&self, vertex_array: Option<u32>) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.calls.push(Call::BindVertexArray(vertex_array));
        if let Some(handle) = vertex_array {
            if !state.vertex_arrays.contains_key(&handle) {
                state.errors.push(format!("bind of unknown vertex array {handle}"));
                return;
            }
        }
        state.vertex_array = vertex_array;
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let live = state.vertex_arrays.remove(&vertex_array).is_some();
        if state.vertex_array == Some(vertex_array) {
            state.vertex_array = None;
        }
        state.release(ObjectKind::VertexArray, vertex_array, live);
    }

    fn vertex_attrib_pointer_f32(&self, slot: u32, components: i32, stride: i32, offset: i32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.calls.push(Call::AttribPointer {
            slot,
            components,
            stride,
            offset,
        });
        let buffer = state.array_buffer;
        let Some(vao) = state.vertex_array else {
            state.errors.push(format!("attribute {slot} declared with no vertex array bound"));
            return;
        };
        if buffer.is_none() {
            state.errors.push(format!("attribute {slot} declared with no array buffer bound"));
        }
        if let Some(record) = state.vertex_arrays.get_mut(&vao) {
            let attribute = record.attributes.entry(slot).or_insert(AttributeState {
                buffer,
                components,
                stride,
                offset,
                enabled: false,
            });
            attribute.buffer = buffer;
            attribute.components = components;
            attribute.stride = stride;
            attribute.offset = offset;
        }
    }

    fn enable_vertex_attrib_array(&self, slot: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.calls.push(Call::EnableAttrib(slot));
        let Some(vao) = state.vertex_array else {
            state.errors.push(format!("attribute {slot} enabled with no vertex array bound"));
            return;
        };
        match state
            .vertex_arrays
            .get_mut(&vao)
            .and_then(|record| record.attributes.get_mut(&slot))
        {
            Some(attribute) => attribute.enabled = true,
            None => state.errors.push(format!("attribute {slot} enabled before it was declared")),
        }
    }

    fn create_shader(&self, kind: ShaderKind) -> Result<u32, String> {
        let handle = self.allocate("shader")?;
        let _ = self.state.borrow_mut().shaders.insert(
            handle,
            ShaderRecord {
                kind,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        Ok(handle)
    }

    fn compile_shader(&self, shader: u32, source: &str) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.calls.push(Call::CompileShader(shader));
        let Some(record) = state.shaders.get_mut(&shader) else {
            state.errors.push(format!("compile of unknown shader {shader}"));
            return;
        };
        record.source = source.to_owned();
        match simulate_compile(record.kind, source) {
            Some(log) => {
                record.compiled = false;
                record.log = log;
            }
            None => {
                record.compiled = true;
                record.log.clear();
            }
        }
    }

    fn shader_compile_status(&self, shader: u32) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .is_some_and(|record| record.compiled)
    }

    fn shader_info_log(&self, shader: u32) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|record| record.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let live = state.shaders.remove(&shader).is_some();
        state.release(ObjectKind::Shader, shader, live);
    }

    fn create_program(&self) -> Result<u32, String> {
        let handle = self.allocate("program")?;
        let _ = self
            .state
            .borrow_mut()
            .programs
            .insert(handle, ProgramRecord::default());
        Ok(handle)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if !state.shaders.contains_key(&shader) {
            state.errors.push(format!("attach of unknown shader {shader}"));
            return;
        }
        match state.programs.get_mut(&program) {
            Some(record) if !record.attached.contains(&shader) => record.attached.push(shader),
            Some(_) => {}
            None => state.errors.push(format!("attach to unknown program {program}")),
        }
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        if let Some(record) = self.state.borrow_mut().programs.get_mut(&program) {
            record.attached.retain(|&attached| attached != shader);
        }
    }

    fn link_program(&self, program: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.calls.push(Call::LinkProgram(program));
        let Some(attached) = state.programs.get(&program).map(|record| record.attached.clone())
        else {
            state.errors.push(format!("link of unknown program {program}"));
            return;
        };

        let stages: Vec<&ShaderRecord> = attached
            .iter()
            .filter_map(|shader| state.shaders.get(shader))
            .collect();
        let count = |kind: ShaderKind| stages.iter().filter(|stage| stage.kind == kind).count();

        let failure = if stages.iter().any(|stage| !stage.compiled) {
            Some("error: one or more attached shaders failed to compile".to_owned())
        } else if count(ShaderKind::Vertex) != 1 || count(ShaderKind::Fragment) != 1 {
            Some("error: program needs exactly one vertex and one fragment shader".to_owned())
        } else {
            None
        };
        let uniforms: Vec<String> = match failure {
            Some(_) => Vec::new(),
            None => stages
                .iter()
                .flat_map(|stage| declared_uniforms(&stage.source))
                .collect(),
        };

        if let Some(record) = state.programs.get_mut(&program) {
            record.linked = failure.is_none();
            record.log = failure.unwrap_or_default();
            record.uniforms = uniforms;
        }
    }

    fn program_link_status(&self, program: u32) -> bool {
        self.program_linked(program)
    }

    fn program_info_log(&self, program: u32) -> String {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|record| record.log.clone())
            .unwrap_or_default()
    }

    fn use_program(&self, program: Option<u32>) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.calls.push(Call::UseProgram(program));
        if let Some(handle) = program {
            if !state.programs.contains_key(&handle) {
                state.errors.push(format!("use of unknown program {handle}"));
                return;
            }
        }
        state.program = program;
    }

    fn delete_program(&self, program: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let live = state.programs.remove(&program).is_some();
        if state.program == Some(program) {
            state.program = None;
        }
        state.release(ObjectKind::Program, program, live);
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<u32> {
        let known = {
            let state = self.state.borrow();
            let record = state.programs.get(&program)?;
            record.linked && record.uniforms.iter().any(|uniform| uniform == name)
        };
        if !known {
            return None;
        }

        let key = (program, name.to_owned());
        if let Some(&location) = self.state.borrow().locations.get(&key) {
            return Some(location);
        }
        let location = self.next_handle.get();
        self.next_handle.set(location + 1);
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let _ = state.location_names.insert(location, key.clone());
        let _ = state.locations.insert(key, location);
        Some(location)
    }

    fn uniform_f32(&self, location: &u32, value: f32) {
        self.state
            .borrow_mut()
            .write_uniform(*location, UniformValue::Float(value));
    }

    fn uniform_vec3(&self, location: &u32, value: Vec3) {
        self.state
            .borrow_mut()
            .write_uniform(*location, UniformValue::Vec3(value));
    }

    fn uniform_vec4(&self, location: &u32, value: Vec4) {
        self.state
            .borrow_mut()
            .write_uniform(*location, UniformValue::Vec4(value));
    }

    fn uniform_i32(&self, location: &u32, value: i32) {
        self.state
            .borrow_mut()
            .write_uniform(*location, UniformValue::Int(value));
    }

    fn uniform_mat4(&self, location: &u32, value: &Mat4) {
        self.state
            .borrow_mut()
            .write_uniform(*location, UniformValue::Mat4(*value));
    }

    fn create_texture(&self) -> Result<u32, String> {
        let handle = self.allocate("texture")?;
        let _ = self.state.borrow_mut().textures.insert(
            handle,
            TextureState {
                width: 0,
                height: 0,
                format: None,
                sampling_set: false,
                mipmapped: false,
            },
        );
        Ok(handle)
    }

    fn active_texture(&self, unit: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.calls.push(Call::ActiveTexture(unit));
        state.active_unit = unit;
    }

    fn bind_texture(&self, texture: Option<u32>) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let unit = state.active_unit;
        state.calls.push(Call::BindTexture(unit, texture));
        match texture {
            Some(handle) if !state.textures.contains_key(&handle) => {
                state.errors.push(format!("bind of unknown texture {handle}"));
            }
            Some(handle) => {
                let _ = state.unit_textures.insert(unit, handle);
            }
            None => {
                let _ = state.unit_textures.remove(&unit);
            }
        }
    }

    fn tex_image_2d(&self, width: u32, height: u32, format: ChannelFormat, pixels: &[u8]) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.calls.push(Call::TexImage(width, height, format));
        let expected = width as usize * height as usize * usize::from(format.channels());
        if pixels.len() != expected {
            state.errors.push(format!(
                "texture upload of {} bytes, expected {expected}",
                pixels.len()
            ));
            return;
        }
        let unit = state.active_unit;
        let bound = state.unit_textures.get(&unit).copied();
        match bound.and_then(|handle| state.textures.get_mut(&handle)) {
            Some(texture) => {
                texture.width = width;
                texture.height = height;
                texture.format = Some(format);
                texture.mipmapped = false;
            }
            None => state.errors.push(format!("texture upload with nothing bound on unit {unit}")),
        }
    }

    fn set_texture_sampling(&self) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let unit = state.active_unit;
        let bound = state.unit_textures.get(&unit).copied();
        if let Some(texture) = bound.and_then(|handle| state.textures.get_mut(&handle)) {
            texture.sampling_set = true;
        }
    }

    fn generate_mipmap(&self) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let unit = state.active_unit;
        let bound = state.unit_textures.get(&unit).copied();
        if let Some(texture) = bound.and_then(|handle| state.textures.get_mut(&handle)) {
            texture.mipmapped = texture.format.is_some();
        }
    }

    fn delete_texture(&self, texture: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let live = state.textures.remove(&texture).is_some();
        state.unit_textures.retain(|_, bound| *bound != texture);
        state.release(ObjectKind::Texture, texture, live);
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.state
            .borrow_mut()
            .calls
            .push(Call::Viewport(x, y, width, height));
    }

    fn enable_depth_test(&self) {}

    fn clear(&self, color: [f32; 4]) {
        self.state.borrow_mut().calls.push(Call::Clear(color));
    }

    fn draw_triangles(&self, count: i32, offset: i32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if state.vertex_array.is_none() {
            state.errors.push("draw with no vertex array bound".to_owned());
        }
        let draw = DrawCall {
            count,
            offset,
            vertex_array: state.vertex_array,
            element_buffer: state.element_buffer(),
            program: state.program,
            textures: state
                .unit_textures
                .iter()
                .map(|(&unit, &texture)| (unit, texture))
                .collect(),
        };
        state.calls.push(Call::Draw(draw));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn element_binding_is_vertex_array_state() {
        let device = RecordingDevice::new();
        let vao = device.create_vertex_array().unwrap();
        let ebo = device.create_buffer().unwrap();

        device.bind_vertex_array(Some(vao));
        device.bind_buffer(BufferTarget::ElementArray, Some(ebo));
        device.bind_vertex_array(None);

        assert_eq!(device.bound_buffer(BufferTarget::ElementArray), None);
        assert_eq!(device.vertex_array_element_buffer(vao), Some(ebo));

        device.bind_vertex_array(Some(vao));
        assert_eq!(device.bound_buffer(BufferTarget::ElementArray), Some(ebo));
    }

    #[test]
    fn double_delete_is_reported() {
        let device = RecordingDevice::new();
        let buffer = device.create_buffer().unwrap();
        device.delete_buffer(buffer);
        device.delete_buffer(buffer);

        assert_eq!(device.release_count(ObjectKind::Buffer, buffer), 2);
        assert_eq!(device.errors().len(), 1);
    }

    #[test]
    fn uniforms_resolve_only_after_successful_link() {
        let device = RecordingDevice::new();
        let vs = device.create_shader(ShaderKind::Vertex).unwrap();
        let fs = device.create_shader(ShaderKind::Fragment).unwrap();
        device.compile_shader(vs, "uniform mat4 model;\nvoid main() {}");
        device.compile_shader(fs, "uniform sampler2D texture1;\nvoid main() {}");

        let program = device.create_program().unwrap();
        device.attach_shader(program, vs);
        device.attach_shader(program, fs);
        assert_eq!(device.uniform_location(program, "model"), None);

        device.link_program(program);
        assert!(device.program_link_status(program));
        assert!(device.uniform_location(program, "model").is_some());
        assert!(device.uniform_location(program, "texture1").is_some());
        assert_eq!(device.uniform_location(program, "missing"), None);
    }

    #[test]
    fn writes_to_an_inactive_program_are_dropped() {
        let device = RecordingDevice::new();
        let vs = device.create_shader(ShaderKind::Vertex).unwrap();
        let fs = device.create_shader(ShaderKind::Fragment).unwrap();
        device.compile_shader(vs, "uniform float t;\nvoid main() {}");
        device.compile_shader(fs, "void main() {}");
        let program = device.create_program().unwrap();
        device.attach_shader(program, vs);
        device.attach_shader(program, fs);
        device.link_program(program);

        let location = device.uniform_location(program, "t").unwrap();
        device.uniform_f32(&location, 1.0);
        assert_eq!(device.uniform_value(program, "t"), None);

        device.use_program(Some(program));
        device.uniform_f32(&location, 1.0);
        assert_eq!(device.uniform_value(program, "t"), Some(UniformValue::Float(1.0)));
    }

    #[test]
    fn failed_allocations_surface_the_driver_message() {
        let device = RecordingDevice::new();
        device.set_fail_allocations(true);
        assert!(device.create_buffer().is_err());
        device.set_fail_allocations(false);
        assert!(device.create_buffer().is_ok());
    }
}
