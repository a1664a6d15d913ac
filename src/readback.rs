//! GPU readback pipeline
//!
//! Copies one device-resident texture into the session's CPU buffer
//! through an internally owned offscreen framebuffer. The previously
//! bound framebuffer is always restored, and a set device error flag
//! after the copy is reported as a failure with the old buffer contents
//! left stale.

use std::num::NonZeroU32;

use egui_glow::glow::{self, HasContext};

use crate::buffer::{PixelBufferDescriptor, ReadbackBuffer};
use crate::error::InspectorError;

/// Bytes required to hold a `width` x `height` readback. The copy is
/// always fixed-format RGBA at one byte per channel.
pub fn required_bytes(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Map a raw `FRAMEBUFFER_BINDING` query result back to a bind target.
/// Zero (or a driver returning a negative value) is the default
/// framebuffer.
fn framebuffer_binding_target(binding: i32) -> Option<glow::Framebuffer> {
    if binding <= 0 {
        None
    } else {
        NonZeroU32::new(binding as u32).map(glow::NativeFramebuffer)
    }
}

/// Owns the offscreen render target and the growable CPU-side buffer.
///
/// The buffer is written only here and read only by same-frame annotation
/// code through [`descriptor`](Self::descriptor).
#[derive(Default)]
pub struct ReadbackPipeline {
    framebuffer: Option<glow::Framebuffer>,
    buffer: ReadbackBuffer,
    /// Extent of the last successful readback; what `descriptor` exposes.
    extent: Option<(u32, u32)>,
}

impl ReadbackPipeline {
    /// An inert pipeline; call [`initialize`](Self::initialize) with a
    /// live context before reading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the offscreen framebuffer.
    pub fn initialize(&mut self, gl: &glow::Context) -> Result<(), InspectorError> {
        if self.framebuffer.is_some() {
            return Ok(());
        }
        let framebuffer = unsafe {
            gl.create_framebuffer()
                .map_err(InspectorError::Initialization)?
        };
        self.framebuffer = Some(framebuffer);
        Ok(())
    }

    /// Whether the offscreen target exists.
    pub fn is_initialized(&self) -> bool {
        self.framebuffer.is_some()
    }

    /// Copy `texture` into the session buffer.
    ///
    /// Blocks until the device has finished rendering to the source
    /// texture; that latency is accepted, not modeled as async. On error
    /// the previous buffer contents are retained but stale, and the
    /// caller must not display them as fresh values.
    ///
    /// Region-limited readback is an unimplemented extension point; the
    /// copy always covers the full texture.
    pub fn read_texture(
        &mut self,
        gl: &glow::Context,
        texture: glow::Texture,
        width: u32,
        height: u32,
    ) -> Result<(), InspectorError> {
        let Some(framebuffer) = self.framebuffer else {
            return Err(InspectorError::NotInitialized);
        };

        let required = required_bytes(width, height);
        if self.buffer.ensure(required) {
            log::debug!(
                "readback buffer reallocated: {} bytes usable, {} capacity",
                self.buffer.len(),
                self.buffer.capacity()
            );
        }

        unsafe {
            // Drop whatever error state earlier host rendering left behind
            // so the post-copy check reflects this operation only. Bounded:
            // a lost context reports errors indefinitely.
            for _ in 0..16 {
                if gl.get_error() == glow::NO_ERROR {
                    break;
                }
            }

            let previous = gl.get_parameter_i32(glow::FRAMEBUFFER_BINDING);

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            gl.read_pixels(
                0,
                0,
                width as i32,
                height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(Some(self.buffer.as_mut_slice())),
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer_binding_target(previous));

            let error = gl.get_error();
            if error != glow::NO_ERROR {
                log::warn!("texture readback failed with GL error {error:#06x}");
                return Err(InspectorError::Readback(error));
            }
        }

        self.extent = Some((width, height));
        Ok(())
    }

    /// Descriptor over the last successful readback, with channel offsets
    /// R=0, G=1, B=2, A=3, a row stride of `width * 4` elements, and the
    /// full texture as the addressable window.
    pub fn descriptor(&self) -> Option<PixelBufferDescriptor<'_>> {
        let (width, height) = self.extent?;
        Some(PixelBufferDescriptor::rgba8(
            self.buffer.as_slice(),
            width,
            height,
        ))
    }

    /// Usable bytes in the session buffer.
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Release the offscreen framebuffer. The CPU buffer lives until the
    /// pipeline is dropped. Idempotent.
    pub fn destroy(&mut self, gl: &glow::Context) {
        if let Some(framebuffer) = self.framebuffer.take() {
            unsafe { gl.delete_framebuffer(framebuffer) };
        }
        self.extent = None;
    }
}
