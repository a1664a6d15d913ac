//! Shader program variant matrix
//!
//! Compiles and links the inspector's shading program for whichever GLSL
//! profile the device negotiated, and resolves every uniform/attribute
//! location exactly once. Four source variants exist (legacy, core 130,
//! ES, modern core); the shared bodies are specialized through a small
//! prelude of defines per profile.
//!
//! Compile and link failures surface the driver's info log and leave the
//! inspector inert; they never crash the host.

use egui_glow::glow::{self, HasContext};

use crate::error::InspectorError;

/// GLSL profile tier, selected once at initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlslProfile {
    /// GLSL 120 and below: attribute/varying, `texture2D`, `gl_FragColor`.
    Legacy,
    /// GLSL 130 up to (not including) 410.
    Core130,
    /// OpenGL ES: GLSL ES 300.
    Es300,
    /// GLSL 410 core and above.
    Core410,
}

impl GlslProfile {
    /// Pick the source variant for a requested GLSL version number.
    ///
    /// Thresholds are ordered: ES contexts always take the ES tier,
    /// anything below 130 takes the legacy tier, 410 and above the modern
    /// tier, everything between the fixed 130 tier.
    pub fn select(glsl_version: u32, is_es: bool) -> Self {
        if is_es {
            GlslProfile::Es300
        } else if glsl_version < 130 {
            GlslProfile::Legacy
        } else if glsl_version >= 410 {
            GlslProfile::Core410
        } else {
            GlslProfile::Core130
        }
    }

    /// Map a GL context version to its GLSL version number.
    pub fn glsl_version_for(major: u32, minor: u32, is_es: bool) -> u32 {
        if is_es {
            if major >= 3 { 300 } else { 100 }
        } else {
            match (major, minor) {
                (2, 0) => 110,
                (2, _) => 120,
                (3, 0) => 130,
                (3, 1) => 140,
                (3, 2) => 150,
                _ => major * 100 + minor * 10,
            }
        }
    }

    /// `#version` line plus the defines that specialize the shared shader
    /// bodies for this profile.
    fn prelude(&self) -> &'static str {
        match self {
            GlslProfile::Legacy => {
                "#version 120\n\
                 #define ATTRIBUTE attribute\n\
                 #define VARY_OUT varying\n\
                 #define VARY_IN varying\n\
                 #define SAMPLE texture2D\n\
                 #define FRAG_COLOR gl_FragColor\n"
            }
            GlslProfile::Core130 => {
                "#version 130\n\
                 #define ATTRIBUTE in\n\
                 #define VARY_OUT out\n\
                 #define VARY_IN in\n\
                 #define SAMPLE texture\n\
                 #define FRAG_COLOR fragColor\n"
            }
            GlslProfile::Es300 => {
                "#version 300 es\n\
                 precision mediump float;\n\
                 #define ATTRIBUTE in\n\
                 #define VARY_OUT out\n\
                 #define VARY_IN in\n\
                 #define SAMPLE texture\n\
                 #define FRAG_COLOR fragColor\n"
            }
            GlslProfile::Core410 => {
                "#version 410 core\n\
                 #define ATTRIBUTE in\n\
                 #define VARY_OUT out\n\
                 #define VARY_IN in\n\
                 #define SAMPLE texture\n\
                 #define FRAG_COLOR fragColor\n"
            }
        }
    }

    /// Whether the fragment shader must declare its own output variable.
    fn declares_frag_output(&self) -> bool {
        !matches!(self, GlslProfile::Legacy)
    }
}

const VERTEX_BODY: &str = r#"
uniform mat4 u_projection;

ATTRIBUTE vec2 a_position;
ATTRIBUTE vec2 a_uv;

VARY_OUT vec2 v_uv;

void main() {
    v_uv = a_uv;
    gl_Position = u_projection * vec4(a_position.xy, 0.0, 1.0);
}
"#;

const FRAGMENT_BODY: &str = r#"
uniform sampler2D u_texture;
uniform vec2 u_texture_size;
uniform mat4 u_color_matrix;
uniform vec4 u_color_offset;
uniform vec4 u_background_color;
uniform float u_premultiply_alpha;
uniform float u_disable_final_alpha;
uniform float u_force_nearest;
uniform float u_checkered_background;
uniform vec4 u_grid_color;
uniform float u_grid_width;
uniform vec2 u_grid_cell_size;

VARY_IN vec2 v_uv;

void main() {
    vec2 texel_size = vec2(1.0, 1.0) / u_texture_size;
    vec2 uv = v_uv;
    if (u_force_nearest > 0.5) {
        // Snap to texel centers so magnified samples never bleed.
        uv = (floor(uv * u_texture_size) + vec2(0.5, 0.5)) * texel_size;
    }

    vec4 color = SAMPLE(u_texture, uv);
    if (u_premultiply_alpha > 0.5) {
        color.rgb *= color.a;
    }
    color = u_color_matrix * color + u_color_offset;

    vec4 background = u_background_color;
    if (u_checkered_background > 0.5) {
        vec2 cell = floor(v_uv * u_texture_size / 8.0);
        float checker = mod(cell.x + cell.y, 2.0);
        background = mix(vec4(0.4, 0.4, 0.4, 1.0), vec4(0.6, 0.6, 0.6, 1.0), checker);
    }

    float coverage = clamp(color.a, 0.0, 1.0);
    color.rgb = mix(background.rgb, color.rgb, coverage);
    color.a = max(coverage, background.a);

    if (u_grid_color.a > 0.0) {
        vec2 texel = v_uv * u_texture_size;
        vec2 within = mod(texel, u_grid_cell_size);
        vec2 edge = min(within, u_grid_cell_size - within);
        float on_line = 1.0 - step(u_grid_width * 0.5, min(edge.x, edge.y));
        color.rgb = mix(color.rgb, u_grid_color.rgb, on_line * u_grid_color.a);
    }

    if (u_disable_final_alpha > 0.5) {
        color.a = 1.0;
    }

    FRAG_COLOR = color;
}
"#;

fn vertex_source(profile: GlslProfile) -> String {
    format!("{}{}", profile.prelude(), VERTEX_BODY)
}

fn fragment_source(profile: GlslProfile) -> String {
    let out_decl = if profile.declares_frag_output() {
        "out vec4 fragColor;\n"
    } else {
        ""
    };
    format!("{}{}{}", profile.prelude(), out_decl, FRAGMENT_BODY)
}

/// Resolved uniform and attribute locations, cached once after linking.
///
/// Repeated location lookups after initialization are forbidden; all
/// draw-time code goes through this table.
#[derive(Clone, Debug, Default)]
pub struct ShaderLocations {
    pub texture: Option<glow::UniformLocation>,
    pub projection: Option<glow::UniformLocation>,
    pub texture_size: Option<glow::UniformLocation>,
    pub color_matrix: Option<glow::UniformLocation>,
    pub color_offset: Option<glow::UniformLocation>,
    pub background_color: Option<glow::UniformLocation>,
    pub premultiply_alpha: Option<glow::UniformLocation>,
    pub disable_final_alpha: Option<glow::UniformLocation>,
    pub force_nearest: Option<glow::UniformLocation>,
    pub checkered_background: Option<glow::UniformLocation>,
    pub grid_color: Option<glow::UniformLocation>,
    pub grid_width: Option<glow::UniformLocation>,
    pub grid_cell_size: Option<glow::UniformLocation>,
    pub position_attrib: u32,
    pub uv_attrib: u32,
}

/// The compiled inspector program plus its cached locations and the quad
/// geometry drawn through it.
///
/// Built once at initialization, immutable thereafter. Render-state
/// interception borrows this; it never owns it.
pub struct InspectorShader {
    program: Option<glow::Program>,
    vertex_stage: Option<glow::Shader>,
    fragment_stage: Option<glow::Shader>,
    quad_vao: Option<glow::VertexArray>,
    quad_vbo: Option<glow::Buffer>,
    locations: ShaderLocations,
    profile: GlslProfile,
}

impl InspectorShader {
    /// Compile, link, and resolve locations for the given profile.
    pub fn new(gl: &glow::Context, profile: GlslProfile) -> Result<Self, InspectorError> {
        let vertex = compile_stage(gl, glow::VERTEX_SHADER, &vertex_source(profile))?;
        let fragment = match compile_stage(gl, glow::FRAGMENT_SHADER, &fragment_source(profile)) {
            Ok(shader) => shader,
            Err(err) => {
                unsafe { gl.delete_shader(vertex) };
                return Err(err);
            }
        };

        let program = unsafe {
            let program = match gl.create_program() {
                Ok(program) => program,
                Err(err) => {
                    gl.delete_shader(vertex);
                    gl.delete_shader(fragment);
                    return Err(InspectorError::Initialization(err));
                }
            };
            gl.attach_shader(program, vertex);
            gl.attach_shader(program, fragment);
            gl.link_program(program);

            if !gl.get_program_link_status(program) {
                let info = gl.get_program_info_log(program);
                gl.delete_program(program);
                gl.delete_shader(vertex);
                gl.delete_shader(fragment);
                log::error!("inspector shader link failed: {info}");
                return Err(InspectorError::Link(info));
            }
            program
        };

        let locations = unsafe { resolve_locations(gl, program) };
        let (quad_vao, quad_vbo) = unsafe { create_quad(gl) };

        log::debug!("inspector shader ready ({profile:?})");
        Ok(Self {
            program: Some(program),
            vertex_stage: Some(vertex),
            fragment_stage: Some(fragment),
            quad_vao,
            quad_vbo,
            locations,
            profile,
        })
    }

    /// The linked program handle. `None` only after `destroy`.
    pub fn program(&self) -> Option<glow::Program> {
        self.program
    }

    /// The cached uniform/attribute table.
    pub fn locations(&self) -> &ShaderLocations {
        &self.locations
    }

    /// The quad vertex array, when the profile supports one.
    pub fn quad_vao(&self) -> Option<glow::VertexArray> {
        self.quad_vao
    }

    /// The quad vertex buffer.
    pub fn quad_vbo(&self) -> Option<glow::Buffer> {
        self.quad_vbo
    }

    /// Negotiated profile, for diagnostics.
    pub fn profile(&self) -> GlslProfile {
        self.profile
    }

    /// Release both shader stages, the linked program, and the quad
    /// geometry. Safe to call repeatedly or when nothing was built.
    pub fn destroy(&mut self, gl: &glow::Context) {
        unsafe {
            if let Some(program) = self.program {
                if let Some(vertex) = self.vertex_stage.take() {
                    gl.detach_shader(program, vertex);
                    gl.delete_shader(vertex);
                }
                if let Some(fragment) = self.fragment_stage.take() {
                    gl.detach_shader(program, fragment);
                    gl.delete_shader(fragment);
                }
            }
            if let Some(program) = self.program.take() {
                gl.delete_program(program);
            }
            if let Some(vao) = self.quad_vao.take() {
                gl.delete_vertex_array(vao);
            }
            if let Some(vbo) = self.quad_vbo.take() {
                gl.delete_buffer(vbo);
            }
        }
    }
}

fn compile_stage(
    gl: &glow::Context,
    stage: u32,
    source: &str,
) -> Result<glow::Shader, InspectorError> {
    unsafe {
        let shader = gl
            .create_shader(stage)
            .map_err(InspectorError::Initialization)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let info = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            log::error!("inspector shader stage {stage:#x} failed to compile: {info}");
            return Err(InspectorError::Compile(info));
        }
        Ok(shader)
    }
}

unsafe fn resolve_locations(gl: &glow::Context, program: glow::Program) -> ShaderLocations {
    ShaderLocations {
        texture: gl.get_uniform_location(program, "u_texture"),
        projection: gl.get_uniform_location(program, "u_projection"),
        texture_size: gl.get_uniform_location(program, "u_texture_size"),
        color_matrix: gl.get_uniform_location(program, "u_color_matrix"),
        color_offset: gl.get_uniform_location(program, "u_color_offset"),
        background_color: gl.get_uniform_location(program, "u_background_color"),
        premultiply_alpha: gl.get_uniform_location(program, "u_premultiply_alpha"),
        disable_final_alpha: gl.get_uniform_location(program, "u_disable_final_alpha"),
        force_nearest: gl.get_uniform_location(program, "u_force_nearest"),
        checkered_background: gl.get_uniform_location(program, "u_checkered_background"),
        grid_color: gl.get_uniform_location(program, "u_grid_color"),
        grid_width: gl.get_uniform_location(program, "u_grid_width"),
        grid_cell_size: gl.get_uniform_location(program, "u_grid_cell_size"),
        position_attrib: gl.get_attrib_location(program, "a_position").unwrap_or(0),
        uv_attrib: gl.get_attrib_location(program, "a_uv").unwrap_or(1),
    }
}

unsafe fn create_quad(
    gl: &glow::Context,
) -> (Option<glow::VertexArray>, Option<glow::Buffer>) {
    // Legacy contexts may lack vertex array objects; the draw path falls
    // back to binding the buffer directly.
    let vao = gl.create_vertex_array().ok();
    let vbo = gl.create_buffer().ok();
    (vao, vbo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_thresholds() {
        assert_eq!(GlslProfile::select(110, false), GlslProfile::Legacy);
        assert_eq!(GlslProfile::select(120, false), GlslProfile::Legacy);
        assert_eq!(GlslProfile::select(130, false), GlslProfile::Core130);
        assert_eq!(GlslProfile::select(330, false), GlslProfile::Core130);
        assert_eq!(GlslProfile::select(400, false), GlslProfile::Core130);
        assert_eq!(GlslProfile::select(410, false), GlslProfile::Core410);
        assert_eq!(GlslProfile::select(460, false), GlslProfile::Core410);
    }

    #[test]
    fn test_es_overrides_version_number() {
        assert_eq!(GlslProfile::select(300, true), GlslProfile::Es300);
        assert_eq!(GlslProfile::select(460, true), GlslProfile::Es300);
    }

    #[test]
    fn test_glsl_version_mapping() {
        assert_eq!(GlslProfile::glsl_version_for(2, 1, false), 120);
        assert_eq!(GlslProfile::glsl_version_for(3, 0, false), 130);
        assert_eq!(GlslProfile::glsl_version_for(3, 2, false), 150);
        assert_eq!(GlslProfile::glsl_version_for(3, 3, false), 330);
        assert_eq!(GlslProfile::glsl_version_for(4, 1, false), 410);
        assert_eq!(GlslProfile::glsl_version_for(4, 6, false), 460);
        assert_eq!(GlslProfile::glsl_version_for(3, 0, true), 300);
        assert_eq!(GlslProfile::glsl_version_for(2, 0, true), 100);
    }

    #[test]
    fn test_sources_start_with_version_directive() {
        for profile in [
            GlslProfile::Legacy,
            GlslProfile::Core130,
            GlslProfile::Es300,
            GlslProfile::Core410,
        ] {
            assert!(vertex_source(profile).starts_with("#version "));
            assert!(fragment_source(profile).starts_with("#version "));
        }
    }

    #[test]
    fn test_modern_fragment_declares_output() {
        assert!(fragment_source(GlslProfile::Core410).contains("out vec4 fragColor;"));
        assert!(fragment_source(GlslProfile::Es300).contains("out vec4 fragColor;"));
        assert!(!fragment_source(GlslProfile::Legacy).contains("out vec4 fragColor;"));
    }

    #[test]
    fn test_es_prelude_sets_precision() {
        assert!(fragment_source(GlslProfile::Es300).contains("precision mediump float;"));
    }
}
