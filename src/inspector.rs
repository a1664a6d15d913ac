//! Inspector session
//!
//! `TextureInspector` is the explicit session object threading the device
//! context through every call: it owns the compiled shader, the readback
//! pipeline, the interception state machine, and the options snapshot.
//! There is no hidden global state; constructing a session and calling
//! [`destroy`](TextureInspector::destroy) at shutdown gives a clean
//! teardown.
//!
//! Per-frame flow: ask the readback pipeline to copy the inspected
//! texture into the session buffer, build a [`TexelTransform`] from the
//! current view, register the intercepted draw (begin marker, quad,
//! end marker) with the host painter, then walk visible texels and draw
//! annotations.

use std::sync::{Arc, Mutex};

use egui::{Painter, Rect, Vec2};
use egui_glow::glow::{self, HasContext};
use egui_glow::CallbackFn;

use crate::annotate::TexelAnnotation;
use crate::buffer::PixelBufferDescriptor;
use crate::error::InspectorError;
use crate::intercept::{DrawContext, InspectorOptions, StateInterceptor};
use crate::readback::ReadbackPipeline;
use crate::shader::{GlslProfile, InspectorShader};
use crate::transform::TexelTransform;

/// Build the four host-layout vertices of the image quad as raw bytes:
/// position (2xf32), uv (2xf32), color (4xu8), matching
/// [`crate::intercept::HOST_VERTEX_STRIDE`]. Triangle-strip order.
pub(crate) fn quad_vertices(rect: Rect, uv: Rect) -> Vec<u8> {
    let corners = [
        (rect.min.x, rect.min.y, uv.min.x, uv.min.y),
        (rect.max.x, rect.min.y, uv.max.x, uv.min.y),
        (rect.min.x, rect.max.y, uv.min.x, uv.max.y),
        (rect.max.x, rect.max.y, uv.max.x, uv.max.y),
    ];
    let mut bytes = Vec::with_capacity(corners.len() * 20);
    for (x, y, u, v) in corners {
        bytes.extend_from_slice(&x.to_ne_bytes());
        bytes.extend_from_slice(&y.to_ne_bytes());
        bytes.extend_from_slice(&u.to_ne_bytes());
        bytes.extend_from_slice(&v.to_ne_bytes());
        bytes.extend_from_slice(&[255, 255, 255, 255]);
    }
    bytes
}

/// One texture-inspection session.
///
/// Inert until [`initialize`](Self::initialize) succeeds; every operation
/// before that is a no-op that logs once and reports
/// [`InspectorError::NotInitialized`]. Failures never propagate beyond
/// this component: the worst case is no custom overlay this frame.
pub struct TextureInspector {
    shader: Option<Arc<InspectorShader>>,
    interceptor: Arc<Mutex<StateInterceptor>>,
    readback: ReadbackPipeline,
    /// Uniform snapshot uploaded at the next intercepted draw.
    pub options: InspectorOptions,
    annotation: Option<TexelAnnotation>,
    warned_not_ready: bool,
}

impl Default for TextureInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureInspector {
    /// An uninitialized session with default options.
    pub fn new() -> Self {
        Self {
            shader: None,
            interceptor: Arc::new(Mutex::new(StateInterceptor::new())),
            readback: ReadbackPipeline::new(),
            options: InspectorOptions::default(),
            annotation: None,
            warned_not_ready: false,
        }
    }

    /// Negotiate a shading profile from the live context, build the
    /// program, and create the offscreen readback target.
    ///
    /// On failure the session stays inert; the host keeps rendering
    /// without the overlay.
    pub fn initialize(&mut self, gl: &glow::Context) -> Result<(), InspectorError> {
        if self.is_initialized() {
            return Ok(());
        }

        let version = gl.version();
        let glsl = GlslProfile::glsl_version_for(
            version.major,
            version.minor,
            version.is_embedded,
        );
        let profile = GlslProfile::select(glsl, version.is_embedded);

        let shader = InspectorShader::new(gl, profile)?;
        self.readback.initialize(gl)?;
        self.shader = Some(Arc::new(shader));
        self.warned_not_ready = false;
        Ok(())
    }

    /// Whether initialization has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.shader.is_some() && self.readback.is_initialized()
    }

    /// The negotiated GLSL profile, once initialized.
    pub fn profile(&self) -> Option<GlslProfile> {
        self.shader.as_ref().map(|s| s.profile())
    }

    /// Per-texel decoration to draw when zoomed in far enough; `None`
    /// disables the overlay.
    pub fn set_annotation(&mut self, annotation: Option<TexelAnnotation>) {
        self.annotation = annotation;
    }

    /// Copy the texture's current contents into the session buffer.
    pub fn request_readback(
        &mut self,
        gl: &glow::Context,
        texture: glow::Texture,
        size: (u32, u32),
    ) -> Result<(), InspectorError> {
        if !self.is_initialized() {
            self.warn_not_ready("request_readback");
            return Err(InspectorError::NotInitialized);
        }
        self.readback.read_texture(gl, texture, size.0, size.1)
    }

    /// Descriptor over the last successful readback.
    pub fn descriptor(&self) -> Option<PixelBufferDescriptor<'_>> {
        self.readback.descriptor()
    }

    /// Register the intercepted image draw with the host painter: a begin
    /// marker, the image quad, and an end marker, in list order.
    ///
    /// `image_rect` is where the image lands on screen, `uv_rect` the
    /// visible part of the texture. The host executor invokes the three
    /// callbacks in order exactly once each; the end marker restores the
    /// host's program even if the begin marker's setup partially failed.
    pub fn paint_intercepted(
        &mut self,
        painter: &Painter,
        image_rect: Rect,
        uv_rect: Rect,
        texture: glow::Texture,
        draw_ctx: DrawContext,
    ) {
        let Some(shader) = self.shader.clone() else {
            self.warn_not_ready("paint_intercepted");
            return;
        };

        let options = self.options.clone();
        let interceptor = self.interceptor.clone();
        let begin_shader = shader.clone();
        painter.add(egui::PaintCallback {
            rect: image_rect,
            callback: Arc::new(CallbackFn::new(move |_info, p| {
                let mut interceptor = interceptor.lock().expect("interceptor mutex poisoned");
                interceptor.begin(p.gl(), &begin_shader, &draw_ctx, &options);
            })),
        });

        let quad_shader = shader.clone();
        let vertices = quad_vertices(image_rect, uv_rect);
        painter.add(egui::PaintCallback {
            rect: image_rect,
            callback: Arc::new(CallbackFn::new(move |_info, p| {
                let gl = p.gl();
                unsafe {
                    gl.active_texture(glow::TEXTURE0);
                    gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                    if let Some(vbo) = quad_shader.quad_vbo() {
                        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
                        gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, &vertices, glow::STREAM_DRAW);
                        gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
                    }
                }
            })),
        });

        let interceptor = self.interceptor.clone();
        painter.add(egui::PaintCallback {
            rect: image_rect,
            callback: Arc::new(CallbackFn::new(move |_info, p| {
                let mut interceptor = interceptor.lock().expect("interceptor mutex poisoned");
                interceptor.end(p.gl());
            })),
        });
    }

    /// Walk the texels visible inside `clip` and draw one annotation per
    /// texel. Skipped wholesale when the zoom is too low for the
    /// configured format, or before the first successful readback.
    pub fn draw_annotations(&self, painter: &Painter, transform: &TexelTransform, clip: Rect) {
        let Some(annotation) = &self.annotation else {
            return;
        };
        if !annotation.fits(transform.scale) {
            return;
        }
        let Some(descriptor) = self.readback.descriptor() else {
            return;
        };

        let extent = (descriptor.width(), descriptor.height());
        let (xs, ys) = transform.visible_texels(clip, extent);
        for y in ys {
            for x in xs.clone() {
                let rgba = descriptor.get_texel(x, y);
                annotation.draw(painter, transform, (x, y), rgba);
            }
        }
    }

    /// Build this frame's texel transform from the current view state.
    /// Thin wrapper so callers need only one import.
    pub fn transform_for(
        &self,
        image_rect: Rect,
        uv_rect: Rect,
        texture_size: Vec2,
    ) -> TexelTransform {
        TexelTransform::from_view(
            image_rect.min,
            image_rect.size(),
            uv_rect.min,
            uv_rect.size(),
            texture_size,
        )
    }

    /// Release every GL resource the session owns. Idempotent; safe to
    /// call when initialization never happened.
    pub fn destroy(&mut self, gl: &glow::Context) {
        if let Some(shader) = self.shader.take() {
            match Arc::try_unwrap(shader) {
                Ok(mut shader) => shader.destroy(gl),
                Err(_) => {
                    // A paint callback from the current frame still holds
                    // a reference; the program leaks rather than being
                    // deleted out from under it.
                    log::warn!("inspector shader still referenced at teardown");
                }
            }
        }
        self.readback.destroy(gl);
    }

    fn warn_not_ready(&mut self, operation: &str) {
        if !self.warned_not_ready {
            log::warn!("texture inspector not initialized; {operation} is a no-op");
            self.warned_not_ready = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Pos2;

    #[test]
    fn test_quad_vertices_match_host_layout() {
        let rect = Rect::from_min_max(Pos2::new(10.0, 20.0), Pos2::new(110.0, 220.0));
        let uv = Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0));
        let bytes = quad_vertices(rect, uv);

        // Four vertices at the 20-byte host stride.
        assert_eq!(bytes.len(), 4 * crate::intercept::HOST_VERTEX_STRIDE as usize);

        let x = f32::from_ne_bytes(bytes[0..4].try_into().unwrap());
        let y = f32::from_ne_bytes(bytes[4..8].try_into().unwrap());
        let u = f32::from_ne_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(x, 10.0);
        assert_eq!(y, 20.0);
        assert_eq!(u, 0.0);
        // Solid white vertex color.
        assert_eq!(&bytes[16..20], &[255, 255, 255, 255]);

        // Last vertex is the bottom-right corner.
        let x = f32::from_ne_bytes(bytes[60..64].try_into().unwrap());
        let v = f32::from_ne_bytes(bytes[72..76].try_into().unwrap());
        assert_eq!(x, 110.0);
        assert_eq!(v, 1.0);
    }

    #[test]
    fn test_uninitialized_session_is_inert() {
        let inspector = TextureInspector::new();
        assert!(!inspector.is_initialized());
        assert!(inspector.descriptor().is_none());
        assert!(inspector.profile().is_none());
    }

    #[test]
    fn test_transform_for_full_view() {
        let inspector = TextureInspector::new();
        let image_rect = Rect::from_min_size(Pos2::new(0.0, 0.0), Vec2::new(640.0, 640.0));
        let uv_rect = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
        let t = inspector.transform_for(image_rect, uv_rect, Vec2::new(64.0, 64.0));
        assert!((t.scale.x - 10.0).abs() < 1e-5);
        assert!((t.scale.y - 10.0).abs() < 1e-5);
    }
}
