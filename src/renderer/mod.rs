//! CPU pixel generation
//!
//! The presentation layer treats pixel generation as a black box behind
//! [`PixelFill`]: given a mapped buffer and its layout, write one frame. The
//! stock implementation is [`GradientRenderer`], an animated BGRX gradient.
//!
//! Pixels are 32-bit little-endian XRGB, so in memory each one is the byte
//! sequence blue, green, red, padding.

use log::trace;

/// Running offset advance per frame.
pub const DEFAULT_STEP: i32 = 8;

/// Fills one frame.
pub trait PixelFill {
    /// Writes `height` rows of `width` pixels, `stride` bytes apart.
    fn fill(&mut self, pixels: &mut [u8], width: i32, height: i32, stride: i32, speed: i32);
}

/// Gradient that scrolls horizontally every frame and vertically with the
/// animation speed.
#[derive(Debug, Clone)]
pub struct GradientRenderer {
    offset: i32,
    step: i32,
}

impl Default for GradientRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_STEP)
    }
}

impl GradientRenderer {
    pub fn new(step: i32) -> Self {
        Self { offset: 0, step }
    }

    /// Offset the next frame is drawn with.
    pub fn offset(&self) -> i32 {
        self.offset
    }

    /// Colour of one pixel as (blue, green, red).
    pub fn pixel(row: i32, column: i32, offset: i32, speed: i32) -> (u8, u8, u8) {
        let blue = column.wrapping_add(offset) as u8;
        let green = row.wrapping_add(offset.wrapping_mul(speed)) as u8;
        (blue, green, 0)
    }
}

impl PixelFill for GradientRenderer {
    fn fill(&mut self, pixels: &mut [u8], width: i32, height: i32, stride: i32, speed: i32) {
        let (width, stride) = (width.max(0) as usize, stride.max(0) as usize);
        if stride > 0 {
            let rows = pixels.chunks_mut(stride).take(height.max(0) as usize);
            for (row, line) in rows.enumerate() {
                for (column, pixel) in line.chunks_exact_mut(4).take(width).enumerate() {
                    let (blue, green, red) =
                        Self::pixel(row as i32, column as i32, self.offset, speed);
                    pixel.copy_from_slice(&[blue, green, red, 0]);
                }
            }
        }
        trace!("Rendered gradient frame at offset {} (speed {})", self.offset, speed);
        self.offset = self.offset.wrapping_add(self.step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(renderer: &mut GradientRenderer, width: i32, height: i32, speed: i32) -> Vec<u8> {
        let stride = width * 4;
        let mut pixels = vec![0xFF; (stride * height) as usize];
        renderer.fill(&mut pixels, width, height, stride, speed);
        pixels
    }

    #[test]
    fn test_pixel_byte_order_is_bgrx() {
        let mut renderer = GradientRenderer::default();
        let pixels = frame(&mut renderer, 4, 2, 0);
        // row 1, column 3 at offset 0
        let start = (4 * 4) + 3 * 4;
        assert_eq!(&pixels[start..start + 4], &[3, 1, 0, 0]);
    }

    #[test]
    fn test_offset_advances_by_step_each_frame() {
        let mut renderer = GradientRenderer::default();
        assert_eq!(renderer.offset(), 0);
        frame(&mut renderer, 2, 2, 0);
        frame(&mut renderer, 2, 2, 0);
        assert_eq!(renderer.offset(), 2 * DEFAULT_STEP);

        let pixels = frame(&mut renderer, 2, 2, 0);
        assert_eq!(pixels[0], 16, "blue carries the running offset");
    }

    #[test]
    fn test_speed_moves_green_channel() {
        let mut still = GradientRenderer::default();
        let mut moving = GradientRenderer::default();
        frame(&mut still, 2, 2, 0);
        frame(&mut moving, 2, 2, 5);

        let still = frame(&mut still, 2, 2, 0);
        let moving = frame(&mut moving, 2, 2, 5);
        assert_eq!(still[1], 0);
        assert_eq!(moving[1], (DEFAULT_STEP * 5) as u8);
        assert_eq!(still[0], moving[0]);
    }

    #[test]
    fn test_fill_is_deterministic() {
        let a = frame(&mut GradientRenderer::default(), 16, 8, -5);
        let b = frame(&mut GradientRenderer::default(), 16, 8, -5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_row_padding_is_left_untouched() {
        let mut renderer = GradientRenderer::default();
        let (width, height, stride) = (2, 2, 12);
        let mut pixels = vec![0xAA; (stride * height) as usize];
        renderer.fill(&mut pixels, width, height, stride, 0);
        assert_eq!(&pixels[8..12], &[0xAA; 4]);
        assert_eq!(&pixels[20..24], &[0xAA; 4]);
    }
}
