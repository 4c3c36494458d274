//! Vertex array objects: how buffer bytes map to shader inputs.
//!
//! Setting up a layout is order-sensitive and the order is the caller's job:
//!
//! 1. bind the layout
//! 2. bind the vertex buffer
//! 3. declare the attributes
//! 4. bind the index buffer
//! 5. unbind the vertex buffer (the layout keeps the association)
//! 6. unbind the layout
//!
//! Declaring an attribute while another buffer is bound attaches the
//! attribute to that buffer instead.

use std::fmt;
use std::rc::Rc;

use crate::device::Device;
use crate::error::{Error, Result};

const F32_SIZE: usize = std::mem::size_of::<f32>();

/// One float vertex attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeDescriptor {
    /// Shader input location.
    pub slot: u32,
    /// Number of `f32` components (1-4).
    pub component_count: u8,
    /// Distance in bytes between consecutive vertices.
    pub stride: usize,
    /// Byte offset of the first component inside a vertex.
    pub byte_offset: usize,
}

impl AttributeDescriptor {
    /// Describe an attribute of tightly packed `f32` vertices, with stride and
    /// offset counted in floats.
    #[must_use]
    pub fn floats(slot: u32, component_count: u8, stride_floats: usize, offset_floats: usize) -> Self {
        Self {
            slot,
            component_count,
            stride: stride_floats * F32_SIZE,
            byte_offset: offset_floats * F32_SIZE,
        }
    }
}

/// A vertex array object and the attributes declared on it.
pub struct VertexLayout<D: Device> {
    device: Rc<D>,
    handle: D::VertexArray,
    attributes: Vec<AttributeDescriptor>,
    released: bool,
}

impl<D: Device> VertexLayout<D> {
    /// Allocate an empty vertex array.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceResource`] if the device cannot allocate it.
    pub fn new(device: &Rc<D>) -> Result<Self> {
        let handle = device
            .create_vertex_array()
            .map_err(|e| Error::DeviceResource(format!("vertex array allocation failed: {e}")))?;
        Ok(Self {
            device: Rc::clone(device),
            handle,
            attributes: Vec::new(),
            released: false,
        })
    }

    /// Make this the current vertex input source.
    pub fn bind(&self) {
        if self.released {
            log::warn!("bind of released vertex array {:?} ignored", self.handle);
            return;
        }
        self.device.bind_vertex_array(Some(self.handle));
    }

    /// Clear the current vertex input source.
    pub fn unbind(&self) {
        self.device.bind_vertex_array(None);
    }

    /// Declare and enable an attribute against the currently bound layout and
    /// array buffer, and remember it.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceResource`] if the component count is outside 1-4 or the
    /// stride/offset do not fit the device's integer range.
    pub fn declare_attribute(&mut self, attribute: AttributeDescriptor) -> Result<()> {
        if !(1..=4).contains(&attribute.component_count) {
            return Err(Error::DeviceResource(format!(
                "attribute {} has {} components, expected 1-4",
                attribute.slot, attribute.component_count
            )));
        }
        let stride = i32::try_from(attribute.stride).map_err(|_| {
            Error::DeviceResource(format!("attribute {} stride out of range", attribute.slot))
        })?;
        let offset = i32::try_from(attribute.byte_offset).map_err(|_| {
            Error::DeviceResource(format!("attribute {} offset out of range", attribute.slot))
        })?;

        self.device.vertex_attrib_pointer_f32(
            attribute.slot,
            i32::from(attribute.component_count),
            stride,
            offset,
        );
        self.device.enable_vertex_attrib_array(attribute.slot);
        self.attributes.push(attribute);
        Ok(())
    }

    /// Attributes in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Release the device handle. Further calls do nothing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.device.delete_vertex_array(self.handle);
    }

    /// Whether [`release`](Self::release) has run.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// The device handle.
    #[must_use]
    pub fn handle(&self) -> D::VertexArray {
        self.handle
    }
}

impl<D: Device> Drop for VertexLayout<D> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<D: Device> fmt::Debug for VertexLayout<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexLayout")
            .field("handle", &self.handle)
            .field("attributes", &self.attributes)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
