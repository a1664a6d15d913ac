//! Render-state interception
//!
//! Lets the inspector's shader draw one image inside the host's draw
//! stream without leaving the host's rendering state corrupted. The
//! begin/end pair is injected as opaque callback markers into the host's
//! per-draw command list; the host executor invokes them in list order
//! exactly once each, which is the only ordering guarantee this module
//! relies on.
//!
//! On begin, the currently bound host program is captured and the full
//! rasterization state for the intercepted draw is installed. On end,
//! only the captured program is rebound; the host restores the remainder
//! of its own state on its next draw.

use std::num::NonZeroU32;

use egui::Rect;
use egui_glow::glow::{self, HasContext};
use serde::{Deserialize, Serialize};

use crate::shader::InspectorShader;

/// Caller-supplied uniform snapshot for one intercepted draw.
///
/// Plain data; the inspector never persists it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InspectorOptions {
    /// Column-major 4x4 matrix applied to the sampled RGBA value.
    pub color_matrix: [f32; 16],
    /// Offset added after the matrix multiply.
    pub color_offset: [f32; 4],
    /// Solid background composited under transparent texels.
    pub background_color: [f32; 4],
    /// Multiply RGB by alpha before the color transform.
    pub premultiply_alpha: bool,
    /// Force the final fragment alpha to 1.
    pub disable_final_alpha: bool,
    /// Snap sampling to texel centers regardless of the texture's filter.
    pub force_nearest_sampling: bool,
    /// Replace the solid background with a checker pattern.
    pub checkered_background: bool,
    /// Grid line color; an alpha of 0 disables the grid.
    pub grid_color: [f32; 4],
    /// Grid line width, in texels.
    pub grid_width: f32,
    /// Grid cell size, in texels.
    pub grid_cell_size: [f32; 2],
}

impl Default for InspectorOptions {
    fn default() -> Self {
        Self {
            color_matrix: IDENTITY_MATRIX,
            color_offset: [0.0; 4],
            background_color: [0.0, 0.0, 0.0, 0.0],
            premultiply_alpha: false,
            disable_final_alpha: false,
            force_nearest_sampling: true,
            checkered_background: false,
            grid_color: [0.0, 0.0, 0.0, 0.0],
            grid_width: 0.1,
            grid_cell_size: [1.0, 1.0],
        }
    }
}

/// Column-major identity, the neutral color transform.
pub const IDENTITY_MATRIX: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Host state the intercepted draw needs, snapshotted by the caller at
/// callback-registration time.
#[derive(Clone, Copy, Debug)]
pub struct DrawContext {
    /// Host framebuffer size in physical pixels.
    pub framebuffer_size: [i32; 2],
    /// Display rectangle the orthographic projection derives from, in the
    /// same units as the vertex positions.
    pub display_rect: Rect,
    /// Byte stride of the host's vertex layout. egui meshes pack
    /// position (2xf32), uv (2xf32) and color (4xu8) into 20 bytes.
    pub vertex_stride: i32,
    /// Texture extent in texels, for the texel-size uniform.
    pub texture_size: [f32; 2],
}

/// Host-style vertex stride: pos2 f32 + uv2 f32 + rgba u8.
pub const HOST_VERTEX_STRIDE: i32 = 20;

impl DrawContext {
    /// A draw context with the standard host vertex layout.
    pub fn new(framebuffer_size: [i32; 2], display_rect: Rect, texture_size: [f32; 2]) -> Self {
        Self {
            framebuffer_size,
            display_rect,
            vertex_stride: HOST_VERTEX_STRIDE,
            texture_size,
        }
    }
}

/// Orthographic projection mapping `rect` onto normalized device
/// coordinates with a top-left origin, column-major.
pub fn ortho_projection(rect: Rect) -> [f32; 16] {
    let (l, r) = (rect.min.x, rect.max.x);
    let (t, b) = (rect.min.y, rect.max.y);
    [
        2.0 / (r - l),
        0.0,
        0.0,
        0.0,
        0.0,
        2.0 / (t - b),
        0.0,
        0.0,
        0.0,
        0.0,
        -1.0,
        0.0,
        (r + l) / (l - r),
        (t + b) / (b - t),
        0.0,
        1.0,
    ]
}

/// Map a raw `CURRENT_PROGRAM` query to a bindable handle. Zero means no
/// program was bound; restoring that is a no-op unbind.
fn program_from_raw(raw: i32) -> Option<glow::Program> {
    if raw <= 0 {
        None
    } else {
        NonZeroU32::new(raw as u32).map(glow::NativeProgram)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Active,
}

/// The interception state machine: Idle -> Active (begin) -> Idle (end).
///
/// Only one span may be open at a time; nesting is not supported and is
/// rejected with a warning rather than corrupting the saved host state.
pub struct StateInterceptor {
    phase: Phase,
    saved_program: Option<glow::Program>,
    warned_unbalanced: bool,
}

impl Default for StateInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl StateInterceptor {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            saved_program: None,
            warned_unbalanced: false,
        }
    }

    /// Whether an intercept span is currently open.
    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Pure transition into the active span. Returns false (and changes
    /// nothing) when a span is already open.
    fn enter(&mut self, captured: Option<glow::Program>) -> bool {
        if self.phase == Phase::Active {
            return false;
        }
        self.saved_program = captured;
        self.phase = Phase::Active;
        true
    }

    /// Pure transition out of the active span, yielding the program to
    /// restore. `None` when no span was open.
    fn exit(&mut self) -> Option<Option<glow::Program>> {
        if self.phase != Phase::Active {
            return None;
        }
        self.phase = Phase::Idle;
        Some(self.saved_program.take())
    }

    /// Begin-callback body: capture host state and install the inspector's.
    pub fn begin(
        &mut self,
        gl: &glow::Context,
        shader: &InspectorShader,
        ctx: &DrawContext,
        options: &InspectorOptions,
    ) {
        let Some(program) = shader.program() else {
            // Shader was torn down between registration and execution;
            // stay inert and let the end marker no-op as well.
            return;
        };

        let captured = unsafe { program_from_raw(gl.get_parameter_i32(glow::CURRENT_PROGRAM)) };
        if !self.enter(captured) {
            if !self.warned_unbalanced {
                log::warn!("nested texture-inspector intercept ignored");
                self.warned_unbalanced = true;
            }
            return;
        }

        let loc = shader.locations();
        unsafe {
            // Unpremultiplied-alpha-aware blending, everything else that
            // could reject or reorder fragments off.
            gl.enable(glow::BLEND);
            gl.blend_equation(glow::FUNC_ADD);
            gl.blend_func_separate(
                glow::SRC_ALPHA,
                glow::ONE_MINUS_SRC_ALPHA,
                glow::ONE,
                glow::ONE_MINUS_SRC_ALPHA,
            );
            gl.disable(glow::CULL_FACE);
            gl.disable(glow::DEPTH_TEST);
            gl.disable(glow::STENCIL_TEST);
            gl.enable(glow::SCISSOR_TEST);
            gl.viewport(0, 0, ctx.framebuffer_size[0], ctx.framebuffer_size[1]);

            gl.use_program(Some(program));

            if let Some(l) = &loc.projection {
                gl.uniform_matrix_4_f32_slice(Some(l), false, &ortho_projection(ctx.display_rect));
            }
            if let Some(l) = &loc.texture {
                gl.uniform_1_i32(Some(l), 0);
            }
            if let Some(l) = &loc.texture_size {
                gl.uniform_2_f32(Some(l), ctx.texture_size[0], ctx.texture_size[1]);
            }
            if let Some(l) = &loc.color_matrix {
                gl.uniform_matrix_4_f32_slice(Some(l), false, &options.color_matrix);
            }
            if let Some(l) = &loc.color_offset {
                let o = options.color_offset;
                gl.uniform_4_f32(Some(l), o[0], o[1], o[2], o[3]);
            }
            if let Some(l) = &loc.background_color {
                let c = options.background_color;
                gl.uniform_4_f32(Some(l), c[0], c[1], c[2], c[3]);
            }
            if let Some(l) = &loc.premultiply_alpha {
                gl.uniform_1_f32(Some(l), options.premultiply_alpha as i32 as f32);
            }
            if let Some(l) = &loc.disable_final_alpha {
                gl.uniform_1_f32(Some(l), options.disable_final_alpha as i32 as f32);
            }
            if let Some(l) = &loc.force_nearest {
                gl.uniform_1_f32(Some(l), options.force_nearest_sampling as i32 as f32);
            }
            if let Some(l) = &loc.checkered_background {
                gl.uniform_1_f32(Some(l), options.checkered_background as i32 as f32);
            }
            if let Some(l) = &loc.grid_color {
                let c = options.grid_color;
                gl.uniform_4_f32(Some(l), c[0], c[1], c[2], c[3]);
            }
            if let Some(l) = &loc.grid_width {
                gl.uniform_1_f32(Some(l), options.grid_width);
            }
            if let Some(l) = &loc.grid_cell_size {
                gl.uniform_2_f32(Some(l), options.grid_cell_size[0], options.grid_cell_size[1]);
            }

            // Quad geometry bound with the host-compatible vertex layout;
            // the draw between the markers streams vertices into this
            // buffer without touching program state.
            if let Some(vao) = shader.quad_vao() {
                gl.bind_vertex_array(Some(vao));
            }
            if let Some(vbo) = shader.quad_vbo() {
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            }
            gl.enable_vertex_attrib_array(loc.position_attrib);
            gl.enable_vertex_attrib_array(loc.uv_attrib);
            gl.vertex_attrib_pointer_f32(
                loc.position_attrib,
                2,
                glow::FLOAT,
                false,
                ctx.vertex_stride,
                0,
            );
            gl.vertex_attrib_pointer_f32(loc.uv_attrib, 2, glow::FLOAT, false, ctx.vertex_stride, 8);
        }
    }

    /// End-callback body: rebind the captured host program and nothing
    /// else. Runs even when begin's setup partially failed, so no device
    /// state leaks into host rendering.
    pub fn end(&mut self, gl: &glow::Context) {
        match self.exit() {
            Some(saved) => unsafe {
                gl.use_program(saved);
            },
            None => {
                if !self.warned_unbalanced {
                    log::warn!("texture-inspector end marker without matching begin");
                    self.warned_unbalanced = true;
                }
            }
        }
    }
}
