//! CPU-side pixel storage: the readback buffer and its typed view
//!
//! `PixelBufferDescriptor` is the single sanctioned path for reading texel
//! values out of host memory. Nothing else in the crate indexes the raw
//! bytes directly, so the bounds and format rules live in exactly one
//! place.

/// The active data view of a descriptor.
///
/// Exactly one representation is ever live for a given buffer; using an
/// enum rather than a pair of nullable pointers makes that invariant
/// unrepresentable to violate.
#[derive(Clone, Copy, Debug)]
pub enum PixelData<'a> {
    /// 8-bit unsigned channels, normalized to [0, 1] on read.
    U8(&'a [u8]),
    /// 32-bit float channels, read through unchanged.
    F32(&'a [f32]),
}

/// Format-agnostic description of a CPU-resident texel array.
///
/// Strides and channel offsets are in elements (bytes for `U8`, floats for
/// `F32`), so the same descriptor logic serves both representations. The
/// sub-rectangle denotes the valid addressable window; reads outside it
/// are defined and return zero.
///
/// Read-only once published to annotation code; rebuilt whenever the
/// backing buffer reallocates.
#[derive(Clone, Copy, Debug)]
pub struct PixelBufferDescriptor<'a> {
    data: PixelData<'a>,
    /// Number of meaningful channels per texel (1–4).
    channel_count: u8,
    /// Element offset of each channel within a texel, in R, G, B, A order.
    /// The order is data-dependent, not assumed RGBA.
    channel_offsets: [usize; 4],
    /// Elements per row of texels.
    line_stride: usize,
    /// Elements per texel.
    stride: usize,
    start_x: i32,
    start_y: i32,
    width: u32,
    height: u32,
}

impl<'a> PixelBufferDescriptor<'a> {
    /// Describe a texel window over `data`.
    pub fn new(
        data: PixelData<'a>,
        channel_count: u8,
        channel_offsets: [usize; 4],
        line_stride: usize,
        stride: usize,
        start_x: i32,
        start_y: i32,
        width: u32,
        height: u32,
    ) -> Self {
        debug_assert!((1..=4).contains(&channel_count));
        Self {
            data,
            channel_count,
            channel_offsets,
            line_stride,
            stride,
            start_x,
            start_y,
            width,
            height,
        }
    }

    /// Describe a tightly packed full-window RGBA8 buffer, the layout the
    /// readback pipeline produces.
    pub fn rgba8(data: &'a [u8], width: u32, height: u32) -> Self {
        Self::new(
            PixelData::U8(data),
            4,
            [0, 1, 2, 3],
            width as usize * 4,
            4,
            0,
            0,
            width,
            height,
        )
    }

    /// Width of the addressable window, in texels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the addressable window, in texels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of meaningful channels per texel.
    pub fn channel_count(&self) -> u8 {
        self.channel_count
    }

    /// Read one texel as RGBA in [0, 1].
    ///
    /// Out-of-window coordinates return `[0.0; 4]`. Channels at or beyond
    /// `channel_count` (e.g. alpha on a 3-channel buffer) report 0, never
    /// whatever happens to sit in memory there.
    pub fn get_texel(&self, x: i32, y: i32) -> [f32; 4] {
        if x < self.start_x
            || y < self.start_y
            || x >= self.start_x + self.width as i32
            || y >= self.start_y + self.height as i32
        {
            return [0.0; 4];
        }

        let base = self.line_stride * (y - self.start_y) as usize
            + self.stride * (x - self.start_x) as usize;

        let mut rgba = [0.0f32; 4];
        for (channel, value) in rgba.iter_mut().enumerate() {
            if channel >= self.channel_count as usize {
                break;
            }
            let idx = base + self.channel_offsets[channel];
            *value = match self.data {
                PixelData::U8(bytes) => bytes.get(idx).map_or(0.0, |&b| b as f32 / 255.0),
                PixelData::F32(floats) => floats.get(idx).copied().unwrap_or(0.0),
            };
        }
        rgba
    }
}

/// Default headroom applied when the readback buffer grows: an extra 25%
/// over the requested size, amortizing future requests.
const GROWTH_HEADROOM_DIVISOR: usize = 4;

/// Growable host-memory block reused across readbacks.
///
/// Grows by reallocation (never in place) with ~25% headroom and never
/// shrinks; the arena lives as long as the inspection session that owns
/// it.
#[derive(Debug, Default)]
pub struct ReadbackBuffer {
    bytes: Vec<u8>,
    used: usize,
}

impl ReadbackBuffer {
    /// An empty buffer; the first `ensure` performs the initial
    /// allocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make at least `required` bytes addressable, growing if needed.
    ///
    /// Returns `true` when the backing allocation was replaced (any
    /// previously published descriptor is invalid and must be rebuilt).
    pub fn ensure(&mut self, required: usize) -> bool {
        self.used = required;
        if self.bytes.len() >= required {
            return false;
        }
        let capacity = required + required / GROWTH_HEADROOM_DIVISOR;
        // A fresh allocation supersedes the old block rather than growing
        // it in place; the old one is dropped here.
        self.bytes = vec![0u8; capacity];
        true
    }

    /// Currently usable byte length (the last `ensure` request).
    pub fn len(&self) -> usize {
        self.used
    }

    /// Whether any bytes are currently addressable.
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Total allocated capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// The usable window, immutable.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.used]
    }

    /// The usable window, writable. Only the readback pipeline writes
    /// through this.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.used]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_texel_rgba8() {
        // 2x2 RGBA8, row-major, distinct values per texel
        let data: Vec<u8> = vec![
            255, 0, 0, 255, /* */ 0, 255, 0, 128, //
            0, 0, 255, 64, /*  */ 255, 255, 255, 0,
        ];
        let d = PixelBufferDescriptor::rgba8(&data, 2, 2);

        let px = d.get_texel(0, 0);
        assert_eq!(px, [1.0, 0.0, 0.0, 1.0]);

        let px = d.get_texel(1, 0);
        assert!((px[1] - 1.0).abs() < 1e-6);
        assert!((px[3] - 128.0 / 255.0).abs() < 1e-6);

        let px = d.get_texel(1, 1);
        assert_eq!(px, [1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_get_texel_out_of_window_is_zero() {
        let data = vec![255u8; 4 * 4 * 4];
        let d = PixelBufferDescriptor::rgba8(&data, 4, 4);

        assert_eq!(d.get_texel(-1, 0), [0.0; 4]);
        assert_eq!(d.get_texel(0, -1), [0.0; 4]);
        assert_eq!(d.get_texel(4, 0), [0.0; 4]);
        assert_eq!(d.get_texel(0, 4), [0.0; 4]);
    }

    #[test]
    fn test_two_channel_float_missing_channels_are_zero() {
        // 3x2 two-channel float buffer; fill with sentinel values so any
        // stray read of channel 3/4 would be visible.
        let data: Vec<f32> = (0..12).map(|i| i as f32 * 0.05 + 0.1).collect();
        let d = PixelBufferDescriptor::new(
            PixelData::F32(&data),
            2,
            [0, 1, 0, 0],
            6,
            2,
            0,
            0,
            3,
            2,
        );

        let px = d.get_texel(1, 1);
        assert!((px[0] - data[6 + 2]).abs() < 1e-6);
        assert!((px[1] - data[6 + 3]).abs() < 1e-6);
        assert_eq!(px[2], 0.0);
        assert_eq!(px[3], 0.0);

        // Outside the window: all four channels exactly zero.
        assert_eq!(d.get_texel(3, 0), [0.0; 4]);
        assert_eq!(d.get_texel(0, 2), [0.0; 4]);
    }

    #[test]
    fn test_sub_rectangle_window() {
        // Window starting at (2, 1) inside a larger logical grid.
        let data = vec![0.5f32; 100];
        let d = PixelBufferDescriptor::new(
            PixelData::F32(&data),
            1,
            [0, 0, 0, 0],
            10,
            1,
            2,
            1,
            4,
            3,
        );

        assert_eq!(d.get_texel(1, 1), [0.0; 4]); // left of window
        assert_eq!(d.get_texel(2, 0), [0.0; 4]); // above window
        assert!((d.get_texel(2, 1)[0] - 0.5).abs() < 1e-6);
        assert!((d.get_texel(5, 3)[0] - 0.5).abs() < 1e-6);
        assert_eq!(d.get_texel(6, 1), [0.0; 4]); // right of window
    }

    #[test]
    fn test_channel_offsets_respected() {
        // BGRA byte order expressed through the offset table.
        let data: Vec<u8> = vec![10, 20, 30, 40]; // B G R A in memory
        let d = PixelBufferDescriptor::new(
            PixelData::U8(&data),
            4,
            [2, 1, 0, 3],
            4,
            4,
            0,
            0,
            1,
            1,
        );

        let px = d.get_texel(0, 0);
        assert!((px[0] - 30.0 / 255.0).abs() < 1e-6);
        assert!((px[1] - 20.0 / 255.0).abs() < 1e-6);
        assert!((px[2] - 10.0 / 255.0).abs() < 1e-6);
        assert!((px[3] - 40.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_readback_buffer_grows_with_headroom() {
        let mut buf = ReadbackBuffer::new();
        assert!(buf.is_empty());

        let reallocated = buf.ensure(1000);
        assert!(reallocated);
        assert_eq!(buf.len(), 1000);
        assert_eq!(buf.capacity(), 1250);

        // A smaller request fits in the existing allocation.
        let reallocated = buf.ensure(500);
        assert!(!reallocated);
        assert_eq!(buf.len(), 500);
        assert_eq!(buf.capacity(), 1250);

        // Within headroom: still no reallocation.
        let reallocated = buf.ensure(1200);
        assert!(!reallocated);
        assert_eq!(buf.capacity(), 1250);

        // Beyond capacity: a fresh, larger block.
        let reallocated = buf.ensure(2000);
        assert!(reallocated);
        assert_eq!(buf.len(), 2000);
        assert_eq!(buf.capacity(), 2500);
    }

    #[test]
    fn test_readback_buffer_never_shrinks() {
        let mut buf = ReadbackBuffer::new();
        buf.ensure(4096);
        let cap = buf.capacity();
        buf.ensure(16);
        assert_eq!(buf.capacity(), cap);
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn test_readback_buffer_slices_match_used_length() {
        let mut buf = ReadbackBuffer::new();
        buf.ensure(64 * 64 * 4);
        assert!(buf.as_slice().len() >= 64 * 64 * 4);
        assert_eq!(buf.as_mut_slice().len(), 64 * 64 * 4);
    }
}
