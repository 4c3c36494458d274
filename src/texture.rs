//! 2D textures loaded from image files.
//!
//! Decoding is done by the [`image`] crate. Pixel rows are flipped on load so
//! that row 0 is the bottom of the picture, which is where GL texture
//! coordinates put `v = 0`.

use std::fmt;
use std::path::Path;
use std::rc::Rc;

use image::DynamicImage;

use crate::device::{ChannelFormat, Device};
use crate::error::{Error, Result};

/// Raw 8-bit pixels produced by the decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    /// Tightly packed rows, bottom row first.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channels per pixel (1-4).
    pub channels: u8,
}

/// Read and decode an image file.
///
/// Grey, grey+alpha, RGB and RGBA 8-bit images keep their channel count;
/// every other color type is converted to RGBA8.
///
/// # Errors
///
/// [`Error::AssetLoad`] if the file cannot be read or decoded.
pub fn decode_image(path: impl AsRef<Path>) -> Result<DecodedImage> {
    let path = path.as_ref();
    let image = image::open(path)
        .map_err(|source| Error::AssetLoad {
            path: path.to_path_buf(),
            source,
        })?
        .flipv();

    let (width, height) = (image.width(), image.height());
    let (pixels, channels) = match image {
        DynamicImage::ImageLuma8(buffer) => (buffer.into_raw(), 1),
        DynamicImage::ImageLumaA8(buffer) => (buffer.into_raw(), 2),
        DynamicImage::ImageRgb8(buffer) => (buffer.into_raw(), 3),
        DynamicImage::ImageRgba8(buffer) => (buffer.into_raw(), 4),
        other => (other.to_rgba8().into_raw(), 4),
    };
    log::debug!(
        "decoded {}: {width}x{height}, {channels} channels",
        path.display()
    );

    Ok(DecodedImage {
        pixels,
        width,
        height,
        channels,
    })
}

/// An uploaded, immutable 2D texture.
pub struct Texture<D: Device> {
    device: Rc<D>,
    handle: D::Texture,
    width: u32,
    height: u32,
    format: ChannelFormat,
    released: bool,
}

impl<D: Device> Texture<D> {
    /// Decode the image at `path` and upload it.
    ///
    /// # Errors
    ///
    /// [`Error::AssetLoad`] if decoding fails, [`Error::DeviceResource`] if
    /// the upload fails.
    pub fn from_path(device: &Rc<D>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = decode_image(path)?;
        let texture = Self::from_image(device, &image)?;
        log::info!(
            "loaded texture {} ({}x{} {:?})",
            path.display(),
            texture.width,
            texture.height,
            texture.format
        );
        Ok(texture)
    }

    /// Upload already-decoded pixels.
    ///
    /// The texture is bound to the active unit while uploading and unbound
    /// afterwards, so whatever that unit held before is gone. Sampling is set
    /// to repeat wrapping with trilinear minification, and mipmaps are
    /// generated.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceResource`] if the image is empty, has an unsupported
    /// channel count, a pixel buffer of the wrong size, or the device cannot
    /// allocate a texture.
    pub fn from_image(device: &Rc<D>, image: &DecodedImage) -> Result<Self> {
        let format = ChannelFormat::from_channel_count(image.channels).ok_or_else(|| {
            Error::DeviceResource(format!("unsupported channel count {}", image.channels))
        })?;
        if image.width == 0 || image.height == 0 {
            return Err(Error::DeviceResource(format!(
                "texture has zero extent ({}x{})",
                image.width, image.height
            )));
        }
        let expected = image.width as usize * image.height as usize * usize::from(image.channels);
        if image.pixels.len() != expected {
            return Err(Error::DeviceResource(format!(
                "texture pixel buffer holds {} bytes, expected {expected}",
                image.pixels.len()
            )));
        }

        let handle = device
            .create_texture()
            .map_err(|e| Error::DeviceResource(format!("texture allocation failed: {e}")))?;
        device.bind_texture(Some(handle));
        device.tex_image_2d(image.width, image.height, format, &image.pixels);
        device.set_texture_sampling();
        device.generate_mipmap();
        device.bind_texture(None);

        Ok(Self {
            device: Rc::clone(device),
            handle,
            width: image.width,
            height: image.height,
            format,
            released: false,
        })
    }

    /// Select texture unit `slot` and bind this texture to it.
    pub fn bind(&self, slot: u32) {
        if self.released {
            log::warn!("bind of released texture {:?} ignored", self.handle);
            return;
        }
        self.device.active_texture(slot);
        self.device.bind_texture(Some(self.handle));
    }

    /// Release the device handle. Further calls do nothing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.device.delete_texture(self.handle);
    }

    /// Whether [`release`](Self::release) has run.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Upload format.
    #[must_use]
    pub fn format(&self) -> ChannelFormat {
        self.format
    }

    /// The device handle.
    #[must_use]
    pub fn handle(&self) -> D::Texture {
        self.handle
    }
}

impl<D: Device> Drop for Texture<D> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<D: Device> fmt::Debug for Texture<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.handle)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    use super::*;
    use crate::device::recording::ObjectKind;
    use crate::device::RecordingDevice;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("glow-quad-demo-{}-{name}", std::process::id()))
    }

    fn rgb(width: u32, height: u32) -> DecodedImage {
        DecodedImage {
            pixels: vec![128; (width * height * 3) as usize],
            width,
            height,
            channels: 3,
        }
    }

    #[test]
    fn upload_records_size_format_and_mipmaps() {
        let device = Rc::new(RecordingDevice::new());
        let texture = Texture::from_image(&device, &rgb(4, 2)).unwrap();

        assert_eq!((texture.width(), texture.height()), (4, 2));
        assert_eq!(texture.format(), ChannelFormat::Rgb);
        let state = device.texture_state(texture.handle()).unwrap();
        assert_eq!((state.width, state.height), (4, 2));
        assert_eq!(state.format, Some(ChannelFormat::Rgb));
        assert!(state.sampling_set);
        assert!(state.mipmapped);
        assert!(device.errors().is_empty());
    }

    #[test]
    fn bad_images_are_device_resource_errors() {
        let device = Rc::new(RecordingDevice::new());

        let mut short = rgb(2, 2);
        let _ = short.pixels.pop();
        assert!(matches!(
            Texture::from_image(&device, &short),
            Err(Error::DeviceResource(_))
        ));

        assert!(matches!(
            Texture::from_image(&device, &rgb(0, 4)),
            Err(Error::DeviceResource(_))
        ));

        let mut five = rgb(1, 1);
        five.channels = 5;
        assert!(matches!(
            Texture::from_image(&device, &five),
            Err(Error::DeviceResource(_))
        ));
        assert_eq!(device.live_count(ObjectKind::Texture), 0);
    }

    #[test]
    fn bind_targets_the_requested_unit() {
        let device = Rc::new(RecordingDevice::new());
        let first = Texture::from_image(&device, &rgb(1, 1)).unwrap();
        let second = Texture::from_image(&device, &rgb(1, 1)).unwrap();

        first.bind(0);
        second.bind(1);

        assert_eq!(device.texture_on_unit(0), Some(first.handle()));
        assert_eq!(device.texture_on_unit(1), Some(second.handle()));
        assert_eq!(device.active_texture_unit(), 1);
    }

    #[test]
    fn uploading_displaces_the_active_unit_binding() {
        let device = Rc::new(RecordingDevice::new());
        let first = Texture::from_image(&device, &rgb(1, 1)).unwrap();
        first.bind(0);

        let _second = Texture::from_image(&device, &rgb(1, 1)).unwrap();
        assert_eq!(device.texture_on_unit(0), None);
    }

    #[test]
    fn from_path_decodes_and_flips_rows() {
        let path = temp_path("flip.png");
        let mut picture = RgbImage::new(1, 2);
        picture.put_pixel(0, 0, Rgb([255, 0, 0]));
        picture.put_pixel(0, 1, Rgb([0, 0, 255]));
        picture.save(&path).unwrap();

        let decoded = decode_image(&path).unwrap();
        assert_eq!(decoded.channels, 3);
        // Bottom (blue) row comes first after the flip.
        assert_eq!(decoded.pixels, vec![0, 0, 255, 255, 0, 0]);

        let device = Rc::new(RecordingDevice::new());
        let texture = Texture::from_path(&device, &path).unwrap();
        assert_eq!((texture.width(), texture.height()), (1, 2));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn rgba_files_keep_their_alpha() {
        let path = temp_path("alpha.png");
        RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4])).save(&path).unwrap();

        let device = Rc::new(RecordingDevice::new());
        let texture = Texture::from_path(&device, &path).unwrap();
        assert_eq!(texture.format(), ChannelFormat::Rgba);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_and_corrupt_files_are_asset_errors() {
        let device = Rc::new(RecordingDevice::new());
        let missing = temp_path("does-not-exist.png");
        assert!(matches!(
            Texture::from_path(&device, &missing),
            Err(Error::AssetLoad { .. })
        ));

        let corrupt = temp_path("corrupt.png");
        std::fs::write(&corrupt, b"definitely not a png").unwrap();
        let err = Texture::from_path(&device, &corrupt).unwrap_err();
        assert!(matches!(err, Error::AssetLoad { ref path, .. } if *path == corrupt));
        std::fs::remove_file(&corrupt).unwrap();
        assert_eq!(device.live_count(ObjectKind::Texture), 0);
    }

    #[test]
    fn release_is_guarded() {
        let device = Rc::new(RecordingDevice::new());
        let mut texture = Texture::from_image(&device, &rgb(1, 1)).unwrap();
        let handle = texture.handle();
        texture.release();
        texture.bind(0);
        drop(texture);

        assert_eq!(device.release_count(ObjectKind::Texture, handle), 1);
        assert_eq!(device.texture_on_unit(0), None);
    }
}
