use bitvec::{BitArr, array::BitArray};
use clap::ValueEnum;

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
const DISPLAY_SIZE: usize = DISPLAY_WIDTH * DISPLAY_HEIGHT;

/// How sprite pixels falling off the edge of the screen are placed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum WrapMode {
    /// Wrap on the flattened buffer index, so a sprite leaving the right edge
    /// continues on the next scanline.
    #[default]
    Flat,
    /// Wrap rows and columns independently.
    PerAxis,
}

/// Monochrome 64x32 pixel grid with a dirty flag for the renderer.
pub struct FrameBuffer {
    pixels: BitArr!(for DISPLAY_SIZE),
    dirty: bool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        FrameBuffer {
            pixels: BitArray::ZERO,
            dirty: false,
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[y * DISPLAY_WIDTH + x]
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.not_any()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the dirty flag and clears it.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
        self.dirty = true;
    }

    /// XORs `sprite` (one byte per row, MSB leftmost) onto the buffer with its
    /// top-left corner at `(x, y)`. Returns `true` if any lit pixel was turned
    /// off.
    pub fn draw_sprite(&mut self, x: usize, y: usize, sprite: &[u8], wrap: WrapMode) -> bool {
        let mut collision = false;

        for (row, &byte) in sprite.iter().enumerate() {
            for bit in 0..8 {
                if (byte >> (7 - bit)) & 1 == 0 {
                    continue;
                }

                let index = match wrap {
                    WrapMode::Flat => (x + bit + (y + row) * DISPLAY_WIDTH) % DISPLAY_SIZE,
                    WrapMode::PerAxis => {
                        ((y + row) % DISPLAY_HEIGHT) * DISPLAY_WIDTH + (x + bit) % DISPLAY_WIDTH
                    }
                };
                let current_pixel = self.pixels[index];
                if current_pixel {
                    collision = true;
                }
                self.pixels.set(index, !current_pixel);
            }
        }

        self.dirty = true;
        collision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_pixels(fb: &FrameBuffer) -> Vec<(usize, usize)> {
        let mut lit = Vec::new();
        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                if fb.pixel(x, y) {
                    lit.push((x, y));
                }
            }
        }
        lit
    }

    #[test]
    fn new_buffer_is_blank_and_clean() {
        let fb = FrameBuffer::new();
        assert!(fb.is_blank());
        assert!(!fb.is_dirty());
    }

    #[test]
    fn clear_blanks_and_marks_dirty() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(0, 0, &[0xFF], WrapMode::Flat);
        assert!(fb.take_dirty());
        assert!(!fb.is_dirty());

        fb.clear();
        assert!(fb.is_blank());
        assert!(fb.take_dirty());
    }

    #[test]
    fn drawing_twice_erases_with_collision() {
        let mut fb = FrameBuffer::new();
        let sprite = [0xF0, 0x90];
        assert!(!fb.draw_sprite(10, 5, &sprite, WrapMode::Flat));
        assert_eq!(
            lit_pixels(&fb),
            vec![(10, 5), (11, 5), (12, 5), (13, 5), (10, 6), (13, 6)]
        );

        assert!(fb.draw_sprite(10, 5, &sprite, WrapMode::Flat));
        assert!(fb.is_blank());
    }

    #[test]
    fn partial_overlap_reports_collision() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(0, 0, &[0x80], WrapMode::Flat);
        assert!(fb.draw_sprite(0, 0, &[0xC0], WrapMode::Flat));
        assert_eq!(lit_pixels(&fb), vec![(1, 0)]);
    }

    #[test]
    fn flat_wrap_spills_onto_next_scanline() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(62, 3, &[0xF0], WrapMode::Flat);
        assert_eq!(lit_pixels(&fb), vec![(62, 3), (63, 3), (0, 4), (1, 4)]);
    }

    #[test]
    fn flat_wrap_past_bottom_returns_to_top() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(63, 31, &[0xC0], WrapMode::Flat);
        assert_eq!(lit_pixels(&fb), vec![(0, 0), (63, 31)]);
    }

    #[test]
    fn per_axis_wrap_stays_on_the_same_row() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(62, 31, &[0xF0, 0x80], WrapMode::PerAxis);
        assert_eq!(
            lit_pixels(&fb),
            vec![(62, 0), (0, 31), (1, 31), (62, 31), (63, 31)]
        );
    }
}
