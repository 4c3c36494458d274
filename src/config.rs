//! Demo configuration.
//!
//! Everything has a built-in default; an optional TOML file can override any
//! subset of fields:
//!
//! ```toml
//! title = "My quad"
//! width = 1280
//! height = 720
//! textures = ["assets/wall.jpg", "assets/face.png"]
//! mix_value = 0.5
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable the viewer reads a config file path from.
pub const CONFIG_ENV_VAR: &str = "GLOW_QUAD_DEMO_CONFIG";

/// Window, texture and draw settings for the demo.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    /// Window title.
    pub title: String,
    /// Initial window width in pixels; also fixes the camera aspect ratio.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Whether to wait for vertical sync when presenting.
    pub vsync: bool,
    /// Background color, RGBA.
    pub clear_color: [f32; 4],
    /// Base and overlay texture files.
    pub textures: [PathBuf; 2],
    /// Weight of the overlay texture, 0 to 1.
    pub mix_value: f32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "Basic Shape OpenGL".to_owned(),
            width: 800,
            height: 600,
            vsync: true,
            clear_color: [0.2, 0.1, 0.8, 1.0],
            textures: [
                PathBuf::from("assets/container.png"),
                PathBuf::from("assets/awesomeface.png"),
            ],
            mix_value: 0.2,
        }
    }
}

impl DemoConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] on malformed TOML, unknown keys, a zero window
    /// size, or a mix value outside `0..=1`.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                log::info!("loading configuration from {}", path.display());
                Self::from_toml_str(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} not found, using default configuration", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config(format!("{}: {e}", path.display()))),
        }
    }

    /// Load from the file named by [`CONFIG_ENV_VAR`], or use the defaults
    /// when the variable is unset.
    ///
    /// # Errors
    ///
    /// Same as [`load_or_default`](Self::load_or_default).
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load_or_default(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(0.0..=1.0).contains(&self.mix_value) {
            return Err(Error::Config(format!(
                "mix_value must be within 0..=1, got {}",
                self.mix_value
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(DemoConfig::from_toml_str("").unwrap(), DemoConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = DemoConfig::from_toml_str("width = 1024\nmix_value = 0.5\n").unwrap();
        assert_eq!(config.width, 1024);
        assert_eq!(config.height, 600);
        assert_eq!(config.mix_value, 0.5);
        assert_eq!(config.title, "Basic Shape OpenGL");
    }

    #[test]
    fn texture_paths_override() {
        let config = DemoConfig::from_toml_str(r#"textures = ["a.png", "b.jpg"]"#).unwrap();
        assert_eq!(config.textures, [PathBuf::from("a.png"), PathBuf::from("b.jpg")]);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for text in ["width = 0", "mix_value = 2.0", "unknown = 1", "width = \"wide\""] {
            assert!(
                matches!(DemoConfig::from_toml_str(text), Err(Error::Config(_))),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn default_textures_ship_with_the_crate() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let [base, overlay] = DemoConfig::default().textures;

        let base = crate::texture::decode_image(root.join(base)).unwrap();
        assert_eq!((base.width, base.height, base.channels), (256, 256, 3));
        let overlay = crate::texture::decode_image(root.join(overlay)).unwrap();
        assert_eq!((overlay.width, overlay.height, overlay.channels), (256, 256, 4));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("glow-quad-demo-no-such-config.toml");
        assert_eq!(DemoConfig::load_or_default(path).unwrap(), DemoConfig::default());
    }

    #[test]
    fn file_is_read_when_present() {
        let path = std::env::temp_dir().join(format!(
            "glow-quad-demo-{}-config.toml",
            std::process::id()
        ));
        std::fs::write(&path, "title = \"from file\"\nvsync = false\n").unwrap();
        let config = DemoConfig::load_or_default(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.title, "from file");
        assert!(!config.vsync);
    }
}
