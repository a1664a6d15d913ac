//! Coordinate transformation between texel space and screen space
//!
//! This module contains the pure affine mapping used by the readback,
//! interception, and annotation code. It has no GL dependencies and can be
//! easily unit tested.

use egui::{Pos2, Rect, Vec2};

/// Affine texel-to-screen mapping for one frame.
///
/// Invariant: `screen = texel * scale + translate`, with the inverse
/// `texel = (screen - translate) / scale` derivable as long as the view
/// rectangle it was built from had non-zero size.
///
/// Built per frame from the current pan/zoom state and texture size;
/// immutable once built.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TexelTransform {
    /// On-screen size of one texel, in points. May be negative on a
    /// flipped axis.
    pub scale: Vec2,
    /// Screen position of texel (0, 0).
    pub translate: Vec2,
}

impl TexelTransform {
    /// Build the transform from the visible view state.
    ///
    /// `screen_top_left`/`screen_view_size` describe where the image is
    /// drawn on screen; `uv_top_left`/`uv_view_size` describe which part of
    /// the texture (in normalized UV) is visible there; `texture_size` is
    /// the texture extent in texels.
    ///
    /// The caller must not pass a zero `uv_view_size` or `texture_size`;
    /// the division is not guarded here.
    pub fn from_view(
        screen_top_left: Pos2,
        screen_view_size: Vec2,
        uv_top_left: Pos2,
        uv_view_size: Vec2,
        texture_size: Vec2,
    ) -> Self {
        let uv_to_screen = Vec2::new(
            screen_view_size.x / uv_view_size.x,
            screen_view_size.y / uv_view_size.y,
        );
        let scale = Vec2::new(
            uv_to_screen.x / texture_size.x,
            uv_to_screen.y / texture_size.y,
        );
        let translate = Vec2::new(
            screen_top_left.x - uv_top_left.x * uv_to_screen.x,
            screen_top_left.y - uv_top_left.y * uv_to_screen.y,
        );
        Self { scale, translate }
    }

    /// Map a (fractional) texel coordinate to screen space.
    pub fn texel_to_screen(&self, texel: Pos2) -> Pos2 {
        Pos2::new(
            texel.x * self.scale.x + self.translate.x,
            texel.y * self.scale.y + self.translate.y,
        )
    }

    /// Map a screen position back to (fractional) texel space.
    pub fn screen_to_texel(&self, screen: Pos2) -> Pos2 {
        Pos2::new(
            (screen.x - self.translate.x) / self.scale.x,
            (screen.y - self.translate.y) / self.scale.y,
        )
    }

    /// Screen position of the center of integer texel `(x, y)`.
    pub fn texel_center(&self, x: i32, y: i32) -> Pos2 {
        self.texel_to_screen(Pos2::new(x as f32 + 0.5, y as f32 + 0.5))
    }

    /// Integer texel whose footprint contains the given screen position.
    pub fn texel_at(&self, screen: Pos2) -> (i32, i32) {
        let t = self.screen_to_texel(screen);
        (t.x.floor() as i32, t.y.floor() as i32)
    }

    /// Half-open ranges of texels whose on-screen footprint intersects
    /// `clip`, clamped to a `texture_size` texel grid.
    ///
    /// Returns `(x_range, y_range)`; either range may be empty when the
    /// clip rect lies entirely outside the texture.
    pub fn visible_texels(
        &self,
        clip: Rect,
        texture_size: (u32, u32),
    ) -> (std::ops::Range<i32>, std::ops::Range<i32>) {
        let a = self.screen_to_texel(clip.min);
        let b = self.screen_to_texel(clip.max);
        // A negative scale flips which clip corner maps to the minimum texel.
        let (x0, x1) = if a.x <= b.x { (a.x, b.x) } else { (b.x, a.x) };
        let (y0, y1) = if a.y <= b.y { (a.y, b.y) } else { (b.y, a.y) };

        let x_start = (x0.floor() as i32).max(0);
        let y_start = (y0.floor() as i32).max(0);
        let x_end = (x1.ceil() as i32).min(texture_size.0 as i32);
        let y_end = (y1.ceil() as i32).min(texture_size.1 as i32);

        (x_start..x_end.max(x_start), y_start..y_end.max(y_start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_view(screen: Rect, texture_size: Vec2) -> TexelTransform {
        TexelTransform::from_view(
            screen.min,
            screen.size(),
            Pos2::ZERO,
            Vec2::new(1.0, 1.0),
            texture_size,
        )
    }

    #[test]
    fn test_scale_and_translate_from_full_view() {
        let screen = Rect::from_min_size(Pos2::new(100.0, 50.0), Vec2::new(512.0, 512.0));
        let t = full_view(screen, Vec2::new(64.0, 64.0));

        // 512 screen points over 64 texels = 8 points per texel
        assert!((t.scale.x - 8.0).abs() < 1e-5);
        assert!((t.scale.y - 8.0).abs() < 1e-5);
        assert!((t.translate.x - 100.0).abs() < 1e-5);
        assert!((t.translate.y - 50.0).abs() < 1e-5);
    }

    #[test]
    fn test_zoomed_view_offsets_translate() {
        // Viewing the UV window [0.25, 0.25]..[0.75, 0.75] of a 100x100
        // texture in a 400x400 screen rect at the origin.
        let t = TexelTransform::from_view(
            Pos2::ZERO,
            Vec2::new(400.0, 400.0),
            Pos2::new(0.25, 0.25),
            Vec2::new(0.5, 0.5),
            Vec2::new(100.0, 100.0),
        );

        // uv_to_screen = 800, so scale = 8 and translate = -0.25 * 800
        assert!((t.scale.x - 8.0).abs() < 1e-5);
        assert!((t.translate.x + 200.0).abs() < 1e-3);

        // Texel 25 (uv 0.25) lands at screen x = 0
        let p = t.texel_to_screen(Pos2::new(25.0, 25.0));
        assert!(p.x.abs() < 1e-3);
        assert!(p.y.abs() < 1e-3);
    }

    #[test]
    fn test_round_trip_recovers_texel() {
        let screen = Rect::from_min_size(Pos2::new(37.0, 91.0), Vec2::new(777.0, 333.0));
        let t = full_view(screen, Vec2::new(256.0, 240.0));

        for &(x, y) in &[(0.0, 0.0), (17.25, 3.5), (255.9, 239.1)] {
            let texel = Pos2::new(x, y);
            let back = t.screen_to_texel(t.texel_to_screen(texel));
            assert!((back.x - texel.x).abs() < 1e-3, "x: {} vs {}", back.x, texel.x);
            assert!((back.y - texel.y).abs() < 1e-3, "y: {} vs {}", back.y, texel.y);
        }
    }

    #[test]
    fn test_texel_center_is_half_texel_in() {
        let screen = Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 100.0));
        let t = full_view(screen, Vec2::new(10.0, 10.0));

        // Texel (0, 0) spans screen [0, 10), so its center is at 5.
        let c = t.texel_center(0, 0);
        assert!((c.x - 5.0).abs() < 1e-5);
        assert!((c.y - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_texel_at_floors_fractional_position() {
        let screen = Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 100.0));
        let t = full_view(screen, Vec2::new(10.0, 10.0));

        assert_eq!(t.texel_at(Pos2::new(0.0, 0.0)), (0, 0));
        assert_eq!(t.texel_at(Pos2::new(9.9, 9.9)), (0, 0));
        assert_eq!(t.texel_at(Pos2::new(10.1, 0.0)), (1, 0));
        assert_eq!(t.texel_at(Pos2::new(-0.1, 0.0)), (-1, 0));
    }

    #[test]
    fn test_visible_texels_clamped_to_texture() {
        let screen = Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 100.0));
        let t = full_view(screen, Vec2::new(10.0, 10.0));

        // A clip rect larger than the image clamps to the texel grid.
        let clip = Rect::from_min_size(Pos2::new(-50.0, -50.0), Vec2::new(300.0, 300.0));
        let (xs, ys) = t.visible_texels(clip, (10, 10));
        assert_eq!(xs, 0..10);
        assert_eq!(ys, 0..10);

        // A clip rect covering only the top-left quarter.
        let clip = Rect::from_min_size(Pos2::ZERO, Vec2::new(45.0, 45.0));
        let (xs, ys) = t.visible_texels(clip, (10, 10));
        assert_eq!(xs, 0..5);
        assert_eq!(ys, 0..5);
    }

    #[test]
    fn test_visible_texels_empty_outside_texture() {
        let screen = Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 100.0));
        let t = full_view(screen, Vec2::new(10.0, 10.0));

        let clip = Rect::from_min_size(Pos2::new(500.0, 500.0), Vec2::new(50.0, 50.0));
        let (xs, ys) = t.visible_texels(clip, (10, 10));
        assert!(xs.is_empty());
        assert!(ys.is_empty());
    }
}
