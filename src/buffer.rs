//! Vertex and index buffer objects.

use std::fmt;
use std::rc::Rc;

use crate::device::{BufferTarget, Device};
use crate::error::{Error, Result};

/// What a [`GpuBuffer`] holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    /// `f32` vertex attribute data, bound to the array slot.
    Vertex,
    /// `u32` indices, bound to the element slot.
    Index,
}

impl BufferKind {
    fn target(self) -> BufferTarget {
        match self {
            Self::Vertex => BufferTarget::Array,
            Self::Index => BufferTarget::ElementArray,
        }
    }
}

/// An immutable, uploaded-once buffer of vertex or index data.
///
/// The device handle is released exactly once: either by an explicit
/// [`release`](Self::release) or when the buffer is dropped.
pub struct GpuBuffer<D: Device> {
    device: Rc<D>,
    handle: D::Buffer,
    kind: BufferKind,
    byte_len: usize,
    element_count: usize,
    released: bool,
}

impl<D: Device> GpuBuffer<D> {
    /// Allocate a vertex buffer and upload `data` with static usage.
    ///
    /// The buffer is left bound to the array slot.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceResource`] if `data` is empty or the device cannot
    /// allocate a buffer.
    pub fn vertex(device: &Rc<D>, data: &[f32]) -> Result<Self> {
        Self::upload(device, BufferKind::Vertex, bytemuck::cast_slice(data), data.len())
    }

    /// Allocate an index buffer and upload `data` with static usage.
    ///
    /// The buffer is left bound to the element slot, so when a vertex array
    /// is bound it captures this buffer.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceResource`] if `data` is empty or the device cannot
    /// allocate a buffer.
    pub fn index(device: &Rc<D>, data: &[u32]) -> Result<Self> {
        Self::upload(device, BufferKind::Index, bytemuck::cast_slice(data), data.len())
    }

    fn upload(device: &Rc<D>, kind: BufferKind, bytes: &[u8], element_count: usize) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::DeviceResource(format!(
                "refusing to create an empty {kind:?} buffer"
            )));
        }
        let handle = device
            .create_buffer()
            .map_err(|e| Error::DeviceResource(format!("{kind:?} buffer allocation failed: {e}")))?;

        let buffer = Self {
            device: Rc::clone(device),
            handle,
            kind,
            byte_len: bytes.len(),
            element_count,
            released: false,
        };
        buffer.bind();
        device.buffer_data_static(kind.target(), bytes);
        log::debug!("uploaded {kind:?} buffer {handle:?}: {} bytes", bytes.len());

        Ok(buffer)
    }

    /// Bind this buffer to the slot of its kind.
    ///
    /// Any other buffer of the same kind bound earlier is displaced.
    pub fn bind(&self) {
        if self.released {
            log::warn!("bind of released {:?} buffer {:?} ignored", self.kind, self.handle);
            return;
        }
        self.device.bind_buffer(self.kind.target(), Some(self.handle));
    }

    /// Clear the slot of this buffer's kind.
    ///
    /// Clears the slot whatever is bound there. Unbinding the index slot while
    /// a vertex array is bound detaches the indices from that vertex array.
    pub fn unbind(&self) {
        self.device.bind_buffer(self.kind.target(), None);
    }

    /// Release the device handle. Further calls do nothing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.device.delete_buffer(self.handle);
    }

    /// Whether [`release`](Self::release) has run.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Vertex or index.
    #[must_use]
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Uploaded size in bytes (element count times four).
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Number of `f32` or `u32` elements uploaded.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// The device handle.
    #[must_use]
    pub fn handle(&self) -> D::Buffer {
        self.handle
    }
}

impl<D: Device> Drop for GpuBuffer<D> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<D: Device> fmt::Debug for GpuBuffer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("byte_len", &self.byte_len)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
