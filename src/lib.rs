//! texlens - a GPU texture inspector for egui applications on the glow
//! (OpenGL) backend
//!
//! This library lets a developer visually inspect GPU-resident texture
//! data from inside a live, immediate-mode rendered application: zoom
//! into a texture until single texels fill the screen, read their exact
//! values, and view those values through configurable color-transfer
//! curves.
//!
//! ## Architecture
//!
//! - [`TextureInspector`]: the session object owning every GL resource
//! - [`TexelTransform`]: texel-space to screen-space mapping
//! - [`PixelBufferDescriptor`]: format-agnostic CPU-side texel reader
//! - [`StateInterceptor`]: hijacks one image draw inside the host's
//!   command stream and restores host state afterward
//! - [`TexelAnnotation`]: per-texel value overlay, drawn only when the
//!   zoom makes it legible
//!
//! All GL work is frame-synchronous on the thread owning the context;
//! every failure degrades to "no overlay this frame", never to corrupted
//! host rendering.

pub mod annotate;
pub mod buffer;
pub mod curves;
pub mod error;
pub mod inspector;
pub mod intercept;
pub mod readback;
pub mod shader;
pub mod transform;

pub use annotate::{TexelAnnotation, ValueFormat};
pub use buffer::{PixelBufferDescriptor, PixelData, ReadbackBuffer};
pub use curves::TransferCurve;
pub use error::InspectorError;
pub use inspector::TextureInspector;
pub use intercept::{DrawContext, InspectorOptions, StateInterceptor};
pub use readback::ReadbackPipeline;
pub use shader::{GlslProfile, InspectorShader};
pub use transform::TexelTransform;
