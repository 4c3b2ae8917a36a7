use image::{Rgba, RgbaImage};

use super::flood_fill::neighbours;
use super::raster::{PixelMask, is_transparent};
use crate::config::{BORDER_COLOR, BORDER_HALF_WIDTH, SUBDIVISION_COLOR, SUBDIVISION_HALF_WIDTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderStyle {
    pub color: Rgba<u8>,
    /// Pixels marked on each side of a boundary pixel, so strokes are
    /// `2 * half_width + 1` wide.
    pub half_width: u32,
    /// When false, a transparent neighbour is not a boundary and only edges
    /// between two filled regions are stroked.
    pub count_translucent_as_border: bool,
}

impl BorderStyle {
    /// Top-level boundaries, including the edge against the empty canvas.
    pub const OUTLINE: BorderStyle = BorderStyle {
        color: BORDER_COLOR,
        half_width: BORDER_HALF_WIDTH,
        count_translucent_as_border: true,
    };

    /// Lines between finer titles drawn inside a coarser composite.
    pub const SUBDIVISION: BorderStyle = BorderStyle {
        color: SUBDIVISION_COLOR,
        half_width: SUBDIVISION_HALF_WIDTH,
        count_translucent_as_border: false,
    };
}

/// Mark every pixel within `half_width` of a color discontinuity.
///
/// Pixels already in the stroke color are neither centers nor neighbours for
/// detection, which keeps repeated application from widening strokes.
pub fn detect_borders(image: &RgbaImage, style: &BorderStyle) -> PixelMask {
    scan(image, style, true)
}

/// Mark discontinuities on a canvas that carries no strokes yet.
///
/// Every filled color is territory here, the stroke color included, so a
/// region painted black still gets separated from its neighbours.
pub fn detect_seams(image: &RgbaImage, style: &BorderStyle) -> PixelMask {
    scan(image, style, false)
}

fn scan(image: &RgbaImage, style: &BorderStyle, skip_strokes: bool) -> PixelMask {
    let (width, height) = image.dimensions();
    let mut marked = PixelMask::new(width, height);
    let is_stroke = |pixel: &Rgba<u8>| skip_strokes && *pixel == style.color;

    for y in 0..height {
        for x in 0..width {
            let pixel = image.get_pixel(x, y);
            if is_transparent(pixel) || is_stroke(pixel) {
                continue;
            }
            let on_boundary = neighbours(x, y, width, height).any(|(nx, ny)| {
                let neighbour = image.get_pixel(nx, ny);
                neighbour != pixel
                    && !is_stroke(neighbour)
                    && (style.count_translucent_as_border || !is_transparent(neighbour))
            });
            if on_boundary {
                mark_square(&mut marked, x, y, style.half_width);
            }
        }
    }
    marked
}

/// Overwrite every marked pixel with `color`. Returns the number painted.
pub fn apply_mask(image: &mut RgbaImage, mask: &PixelMask, color: Rgba<u8>) -> usize {
    let mut painted = 0;
    for (x, y) in mask.iter() {
        image.put_pixel(x, y, color);
        painted += 1;
    }
    painted
}

/// Detect then stroke borders in place. A disabled outline leaves the image
/// untouched.
pub fn paint_borders(outline_enabled: bool, style: &BorderStyle, image: &mut RgbaImage) -> usize {
    if !outline_enabled {
        return 0;
    }
    let mask = detect_borders(image, style);
    apply_mask(image, &mask, style.color)
}

fn mark_square(mask: &mut PixelMask, x: u32, y: u32, half_width: u32) {
    let x0 = x.saturating_sub(half_width);
    let y0 = y.saturating_sub(half_width);
    let x1 = x.saturating_add(half_width).min(mask.width() - 1);
    let y1 = y.saturating_add(half_width).min(mask.height() - 1);
    for by in y0..=y1 {
        for bx in x0..=x1 {
            mask.insert(bx, by);
        }
    }
}
