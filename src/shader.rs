//! Shader programs: two compiled stages linked into one program.
//!
//! Compile and link failures never abort anything. They are logged at error
//! level and handed back as [`ShaderDiagnostic`]s, and the program object is
//! still created, so a broken shader leaves the frame loop running with
//! undefined output instead of crashing it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};

use crate::device::{Device, ShaderKind};
use crate::error::{Error, Result, ShaderDiagnostic, ShaderStage};

/// Where a [`ShaderProgram`] is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramState {
    /// Sources stored, nothing compiled.
    Source,
    /// Both stages compiled (possibly with errors), not linked.
    Compiled,
    /// Linked successfully; usable.
    Linked,
    /// Link failed; the handle exists but renders nothing useful.
    LinkFailed,
    /// Released.
    Released,
}

/// A vertex + fragment shader program.
pub struct ShaderProgram<D: Device> {
    device: Rc<D>,
    vertex_source: String,
    fragment_source: String,
    vertex_stage: Option<D::Shader>,
    fragment_stage: Option<D::Shader>,
    program: Option<D::Program>,
    state: ProgramState,
    diagnostics: Vec<ShaderDiagnostic>,
    /// Resolved locations by name; `None` records a name the program lacks.
    uniform_cache: RefCell<HashMap<String, Option<D::UniformLocation>>>,
}

impl<D: Device> ShaderProgram<D> {
    /// Store the two sources. Nothing is compiled yet.
    #[must_use]
    pub fn new(device: &Rc<D>, vertex_source: &str, fragment_source: &str) -> Self {
        Self {
            device: Rc::clone(device),
            vertex_source: vertex_source.to_owned(),
            fragment_source: fragment_source.to_owned(),
            vertex_stage: None,
            fragment_stage: None,
            program: None,
            state: ProgramState::Source,
            diagnostics: Vec::new(),
            uniform_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Compile, link and log any diagnostics.
    ///
    /// A program whose sources fail to compile or link is still returned;
    /// check [`is_linked`](Self::is_linked) or
    /// [`diagnostics`](Self::diagnostics) to find out.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceResource`] only if a shader or program object cannot be
    /// allocated.
    pub fn build(device: &Rc<D>, vertex_source: &str, fragment_source: &str) -> Result<Self> {
        let mut program = Self::new(device, vertex_source, fragment_source);
        let _ = program.compile()?;
        if program.link()?.is_none() {
            log::info!("linked shader program {:?}", program.program);
        }
        Ok(program)
    }

    /// Compile both stages independently.
    ///
    /// A program linked earlier is released; call [`link`](Self::link)
    /// again to get a usable one. Returns one diagnostic per stage that
    /// failed. A failed stage keeps its
    /// (unusable) handle so linking still goes ahead.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceResource`] if a shader object cannot be allocated.
    pub fn compile(&mut self) -> Result<Vec<ShaderDiagnostic>> {
        if self.state == ProgramState::Released {
            log::warn!("compile of released shader program ignored");
            return Ok(Vec::new());
        }
        self.delete_stages();
        // New stages make any earlier program stale.
        if let Some(old) = self.program.take() {
            self.device.delete_program(old);
        }
        self.uniform_cache.borrow_mut().clear();

        let mut failures = Vec::new();
        let vertex = self.compile_stage(ShaderKind::Vertex, &mut failures)?;
        self.vertex_stage = Some(vertex);
        let fragment = self.compile_stage(ShaderKind::Fragment, &mut failures)?;
        self.fragment_stage = Some(fragment);

        self.state = ProgramState::Compiled;
        self.diagnostics.extend(failures.iter().cloned());
        Ok(failures)
    }

    fn compile_stage(
        &self,
        kind: ShaderKind,
        failures: &mut Vec<ShaderDiagnostic>,
    ) -> Result<D::Shader> {
        let (stage, source) = match kind {
            ShaderKind::Vertex => (ShaderStage::Vertex, &self.vertex_source),
            ShaderKind::Fragment => (ShaderStage::Fragment, &self.fragment_source),
        };
        let shader = self
            .device
            .create_shader(kind)
            .map_err(|e| Error::DeviceResource(format!("{stage} shader allocation failed: {e}")))?;
        self.device.compile_shader(shader, source);

        if !self.device.shader_compile_status(shader) {
            let diagnostic = ShaderDiagnostic::new(stage, &self.device.shader_info_log(shader));
            log::error!("{diagnostic}");
            failures.push(diagnostic);
        }
        Ok(shader)
    }

    /// Link the compiled stages into a program.
    ///
    /// Compiles first if needed. Both stage objects are detached and released
    /// afterwards whether or not linking succeeded. Returns the link
    /// diagnostic on failure; the program handle exists either way.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceResource`] if a shader or program object cannot be
    /// allocated.
    pub fn link(&mut self) -> Result<Option<ShaderDiagnostic>> {
        if self.state == ProgramState::Released {
            log::warn!("link of released shader program ignored");
            return Ok(None);
        }
        if self.vertex_stage.is_none() || self.fragment_stage.is_none() {
            let _ = self.compile()?;
        }
        if let Some(old) = self.program.take() {
            self.device.delete_program(old);
        }
        self.uniform_cache.borrow_mut().clear();

        let program = match self.device.create_program() {
            Ok(program) => program,
            Err(e) => {
                self.delete_stages();
                return Err(Error::DeviceResource(format!("program allocation failed: {e}")));
            }
        };
        let stages = [self.vertex_stage, self.fragment_stage];
        for &stage in stages.iter().flatten() {
            self.device.attach_shader(program, stage);
        }
        self.device.link_program(program);

        let failure = if self.device.program_link_status(program) {
            self.state = ProgramState::Linked;
            None
        } else {
            let diagnostic =
                ShaderDiagnostic::new(ShaderStage::Program, &self.device.program_info_log(program));
            log::error!("{diagnostic}");
            self.diagnostics.push(diagnostic.clone());
            self.state = ProgramState::LinkFailed;
            Some(diagnostic)
        };

        for &stage in stages.iter().flatten() {
            self.device.detach_shader(program, stage);
        }
        self.delete_stages();
        self.program = Some(program);
        Ok(failure)
    }

    fn delete_stages(&mut self) {
        for stage in [self.vertex_stage.take(), self.fragment_stage.take()]
            .into_iter()
            .flatten()
        {
            self.device.delete_shader(stage);
        }
    }

    /// Make this the active program.
    ///
    /// A program that failed to link is activated anyway (output is
    /// undefined); one that was never linked is skipped with a warning.
    pub fn use_program(&self) {
        match self.program {
            Some(program) => {
                if self.state == ProgramState::LinkFailed {
                    log::trace!("using program {program:?} that failed to link");
                }
                self.device.use_program(Some(program));
            }
            None => log::warn!("use of shader program with no linked handle ignored"),
        }
    }

    fn location(&self, name: &str) -> Option<D::UniformLocation> {
        let program = self.program?;
        if let Some(cached) = self.uniform_cache.borrow().get(name) {
            return cached.clone();
        }
        let location = self.device.uniform_location(program, name);
        if location.is_none() {
            log::trace!("uniform {name} not found in program {program:?}");
        }
        let _ = self
            .uniform_cache
            .borrow_mut()
            .insert(name.to_owned(), location.clone());
        location
    }

    /// Write a `float` uniform. Missing names are ignored.
    ///
    /// Like every setter here, this writes to whichever program is active;
    /// call [`use_program`](Self::use_program) first.
    pub fn set_uniform_float(&self, name: &str, value: f32) {
        if let Some(location) = self.location(name) {
            self.device.uniform_f32(&location, value);
        }
    }

    /// Write a `vec3` uniform. Missing names are ignored.
    pub fn set_uniform_float3(&self, name: &str, value: Vec3) {
        if let Some(location) = self.location(name) {
            self.device.uniform_vec3(&location, value);
        }
    }

    /// Write a `vec4` uniform. Missing names are ignored.
    pub fn set_uniform_float4(&self, name: &str, value: Vec4) {
        if let Some(location) = self.location(name) {
            self.device.uniform_vec4(&location, value);
        }
    }

    /// Write an `int` or sampler uniform. Missing names are ignored.
    pub fn set_uniform_int(&self, name: &str, value: i32) {
        if let Some(location) = self.location(name) {
            self.device.uniform_i32(&location, value);
        }
    }

    /// Write a `mat4` uniform. Missing names are ignored.
    pub fn set_uniform_mat4(&self, name: &str, value: &Mat4) {
        if let Some(location) = self.location(name) {
            self.device.uniform_mat4(&location, value);
        }
    }

    /// Release the program (and any stage objects still alive). Further
    /// calls do nothing.
    pub fn release(&mut self) {
        if self.state == ProgramState::Released {
            return;
        }
        self.delete_stages();
        if let Some(program) = self.program.take() {
            self.device.delete_program(program);
        }
        self.uniform_cache.borrow_mut().clear();
        self.state = ProgramState::Released;
    }

    /// Whether the last link succeeded.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.state == ProgramState::Linked
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProgramState {
        self.state
    }

    /// Every compile and link diagnostic reported so far.
    #[must_use]
    pub fn diagnostics(&self) -> &[ShaderDiagnostic] {
        &self.diagnostics
    }

    /// The program handle, once [`link`](Self::link) has run.
    #[must_use]
    pub fn handle(&self) -> Option<D::Program> {
        self.program
    }
}

impl<D: Device> Drop for ShaderProgram<D> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<D: Device> fmt::Debug for ShaderProgram<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("program", &self.program)
            .field("state", &self.state)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::device::recording::{ObjectKind, UniformValue};
    use crate::device::RecordingDevice;

    const VS: &str = "#version 330 core
layout (location = 0) in vec3 aPos;
uniform mat4 model;
void main() { gl_Position = model * vec4(aPos, 1.0); }
";
    const FS: &str = "#version 330 core
out vec4 color;
uniform vec4 ourColor;
uniform float mixValue;
void main() { color = ourColor * mixValue; }
";
    const BROKEN: &str = "#version 330 core
#error this stage does not compile
void main() {}
";

    fn device() -> Rc<RecordingDevice> {
        Rc::new(RecordingDevice::new())
    }

    #[test]
    fn valid_sources_link_and_free_their_stages() {
        let device = device();
        let mut program = ShaderProgram::new(&device, VS, FS);
        assert_eq!(program.state(), ProgramState::Source);

        assert!(program.compile().unwrap().is_empty());
        assert_eq!(program.state(), ProgramState::Compiled);
        assert_eq!(device.live_count(ObjectKind::Shader), 2);

        assert_eq!(program.link().unwrap(), None);
        assert!(program.is_linked());
        assert!(program.handle().is_some());
        assert_eq!(device.live_count(ObjectKind::Shader), 0);
        assert!(device.errors().is_empty());
    }

    #[test]
    fn recompiling_a_linked_program_retires_the_old_handle() {
        let device = device();
        let mut program = ShaderProgram::build(&device, VS, FS).unwrap();
        let old = program.handle().unwrap();

        assert!(program.compile().unwrap().is_empty());
        assert_eq!(program.state(), ProgramState::Compiled);
        assert_eq!(program.handle(), None);
        assert_eq!(device.release_count(ObjectKind::Program, old), 1);

        assert_eq!(program.link().unwrap(), None);
        assert!(program.is_linked());
        assert_ne!(program.handle(), Some(old));
        drop(program);
        assert_eq!(device.release_count(ObjectKind::Program, old), 1);
        assert!(device.errors().is_empty());
    }

    #[test]
    fn compile_failure_is_reported_and_link_still_yields_a_handle() {
        let device = device();
        let mut program = ShaderProgram::new(&device, BROKEN, FS);

        let failures = program.compile().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, ShaderStage::Vertex);
        assert!(!failures[0].log.is_empty());

        let link_failure = program.link().unwrap().expect("link should fail");
        assert_eq!(link_failure.stage, ShaderStage::Program);
        assert!(program.handle().is_some());
        assert!(!program.is_linked());
        assert_eq!(program.state(), ProgramState::LinkFailed);
        assert_eq!(program.diagnostics().len(), 2);

        // Stage objects are released even though linking failed.
        assert_eq!(device.live_count(ObjectKind::Shader), 0);

        // Using and feeding a broken program must not panic.
        program.use_program();
        program.set_uniform_float("mixValue", 0.5);
        assert_eq!(device.current_program(), program.handle());
    }

    #[test]
    fn both_stages_are_compiled_even_when_the_first_fails() {
        let device = device();
        let mut program = ShaderProgram::new(&device, BROKEN, "no entry point here");
        let failures = program.compile().unwrap();
        let stages: Vec<_> = failures.iter().map(|d| d.stage).collect();
        assert_eq!(stages, [ShaderStage::Vertex, ShaderStage::Fragment]);
    }

    #[test]
    fn build_never_fails_on_bad_source() {
        let device = device();
        let program = ShaderProgram::build(&device, VS, BROKEN).unwrap();
        assert!(!program.is_linked());
        assert!(!program.diagnostics().is_empty());
    }

    #[test]
    fn link_compiles_when_needed() {
        let device = device();
        let mut program = ShaderProgram::new(&device, VS, FS);
        assert_eq!(program.link().unwrap(), None);
        assert!(program.is_linked());
    }

    #[test]
    fn allocation_failure_is_a_device_resource_error() {
        let device = device();
        device.set_fail_allocations(true);
        let mut program = ShaderProgram::new(&device, VS, FS);
        assert!(matches!(program.compile(), Err(Error::DeviceResource(_))));
    }

    #[test]
    fn uniforms_reach_the_active_program() {
        let device = device();
        let program = ShaderProgram::build(&device, VS, FS).unwrap();
        let handle = program.handle().unwrap();

        program.use_program();
        program.set_uniform_float("mixValue", 0.2);
        program.set_uniform_float4("ourColor", Vec4::new(0.0, 1.0, 0.0, 1.0));
        program.set_uniform_mat4("model", &Mat4::IDENTITY);

        assert_eq!(
            device.uniform_value(handle, "mixValue"),
            Some(UniformValue::Float(0.2))
        );
        assert_eq!(
            device.uniform_value(handle, "ourColor"),
            Some(UniformValue::Vec4(Vec4::new(0.0, 1.0, 0.0, 1.0)))
        );
        assert_eq!(
            device.uniform_value(handle, "model"),
            Some(UniformValue::Mat4(Mat4::IDENTITY))
        );
    }

    #[test]
    fn missing_uniforms_are_silently_ignored() {
        let device = device();
        let program = ShaderProgram::build(&device, VS, FS).unwrap();
        program.use_program();
        device.clear_calls();

        program.set_uniform_int("not_declared", 3);
        program.set_uniform_float3("also_missing", Vec3::ONE);
        program.set_uniform_int("not_declared", 4);

        assert!(device.calls().is_empty());
        assert!(device.errors().is_empty());
    }

    #[test]
    fn setters_target_whichever_program_is_active() {
        let device = device();
        let first = ShaderProgram::build(&device, VS, FS).unwrap();
        let second = ShaderProgram::build(&device, VS, FS).unwrap();

        first.use_program();
        second.set_uniform_float("mixValue", 1.0);

        // The write was aimed at a program that is not active, so it is lost.
        assert_eq!(device.uniform_value(second.handle().unwrap(), "mixValue"), None);
        assert_eq!(device.errors().len(), 1);

        second.use_program();
        second.set_uniform_float("mixValue", 1.0);
        assert_eq!(
            device.uniform_value(second.handle().unwrap(), "mixValue"),
            Some(UniformValue::Float(1.0))
        );
    }

    #[test]
    fn release_is_guarded_and_drop_is_a_no_op_afterwards() {
        let device = device();
        let mut program = ShaderProgram::build(&device, VS, FS).unwrap();
        let handle = program.handle().unwrap();
        program.release();
        program.release();
        program.use_program();
        assert_eq!(program.state(), ProgramState::Released);
        drop(program);

        assert_eq!(device.release_count(ObjectKind::Program, handle), 1);
        assert_eq!(device.live_count(ObjectKind::Program), 0);
        assert!(device.errors().is_empty());
    }

    #[test]
    fn dropping_a_compiled_but_unlinked_program_frees_its_stages() {
        let device = device();
        let mut program = ShaderProgram::new(&device, VS, FS);
        let _ = program.compile().unwrap();
        drop(program);
        assert_eq!(device.live_count(ObjectKind::Shader), 0);
    }
}
