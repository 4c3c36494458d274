//! GLSL sources for the textured quad.
//!
//! Both stages target GLSL 3.30 core (OpenGL 3.3), matching the context the
//! viewer requests.

/// Vertex shader for the quad.
///
/// # Attributes
///
/// | Location | Name        | Type   |
/// |----------|-------------|--------|
/// | 0        | `aPos`      | `vec3` |
/// | 1        | `aTexCoord` | `vec2` |
///
/// # Uniforms
///
/// | Name         | Type   | Description                |
/// |--------------|--------|----------------------------|
/// | `model`      | `mat4` | Object to world transform  |
/// | `view`       | `mat4` | Camera view matrix         |
/// | `projection` | `mat4` | Camera projection matrix   |
pub const QUAD_VERTEX_SRC: &str = r"#version 330 core
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec2 aTexCoord;

uniform mat4 model;
uniform mat4 view;
uniform mat4 projection;

out vec2 TexCoord;

void main()
{
    gl_Position = projection * view * model * vec4(aPos, 1.0);
    TexCoord = aTexCoord;
}
";

/// Fragment shader for the quad.
///
/// Blends two textures by `mixValue`, then modulates the result lightly by
/// the animated `tint`.
///
/// # Uniforms
///
/// | Name       | Type        | Description                             |
/// |------------|-------------|-----------------------------------------|
/// | `texture1` | `sampler2D` | Base texture (unit 0)                   |
/// | `texture2` | `sampler2D` | Overlay texture (unit 1)                |
/// | `mixValue` | `float`     | Weight of `texture2` (0 = base only)    |
/// | `tint`     | `vec4`      | Color pulsed over time by the frame loop |
pub const QUAD_FRAGMENT_SRC: &str = r"#version 330 core
in vec2 TexCoord;

uniform sampler2D texture1;
uniform sampler2D texture2;
uniform float mixValue;
uniform vec4 tint;

out vec4 FragColor;

void main()
{
    vec4 base = mix(texture(texture1, TexCoord), texture(texture2, TexCoord), mixValue);
    FragColor = mix(base, base * tint, 0.25);
}
";

/// Names of the uniforms the quad shaders declare.
pub mod uniforms {
    /// `mat4 model`
    pub const MODEL: &str = "model";
    /// `mat4 view`
    pub const VIEW: &str = "view";
    /// `mat4 projection`
    pub const PROJECTION: &str = "projection";
    /// `sampler2D texture1`
    pub const TEXTURE1: &str = "texture1";
    /// `sampler2D texture2`
    pub const TEXTURE2: &str = "texture2";
    /// `float mixValue`
    pub const MIX_VALUE: &str = "mixValue";
    /// `vec4 tint`
    pub const TINT: &str = "tint";
}
