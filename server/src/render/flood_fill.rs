use std::collections::{HashMap, VecDeque};

use image::RgbaImage;
use realmmap_shared::Rgb;

use super::raster::{PixelMask, opaque, rgb_of};

/// Fill the 4-connected component of `target` around `start`.
///
/// Connectivity is decided on `source` (alpha ignored); every reached pixel is
/// written to `dest` as opaque `replacement` and marked in `visited`. Pixels
/// already in `visited` are never reached again, so one mask shared across a
/// whole-image pass touches each pixel once. Returns the filled pixels.
pub fn flood_fill(
    start: (u32, u32),
    target: Rgb,
    replacement: Rgb,
    visited: &mut PixelMask,
    source: &RgbaImage,
    dest: &mut RgbaImage,
) -> Vec<(u32, u32)> {
    let (width, height) = source.dimensions();
    let (sx, sy) = start;
    if sx >= width || sy >= height || visited.contains(sx, sy) {
        return Vec::new();
    }
    if rgb_of(source.get_pixel(sx, sy)) != target {
        return Vec::new();
    }

    let fill = opaque(replacement);
    let mut filled = Vec::new();
    let mut queue = VecDeque::from([start]);
    visited.insert(sx, sy);

    while let Some((x, y)) = queue.pop_front() {
        dest.put_pixel(x, y, fill);
        filled.push((x, y));

        for (nx, ny) in neighbours(x, y, width, height) {
            if !visited.contains(nx, ny) && rgb_of(source.get_pixel(nx, ny)) == target {
                visited.insert(nx, ny);
                queue.push_back((nx, ny));
            }
        }
    }
    filled
}

/// Flood every pixel whose source color has a mapping, each connected
/// component once, into `dest`. Returns how many pixels were filled.
pub fn fill_mapped(
    source: &RgbaImage,
    mapping: &HashMap<Rgb, Rgb>,
    visited: &mut PixelMask,
    dest: &mut RgbaImage,
) -> usize {
    let (width, height) = source.dimensions();
    let mut filled = 0;
    for y in 0..height {
        for x in 0..width {
            if visited.contains(x, y) {
                continue;
            }
            let rgb = rgb_of(source.get_pixel(x, y));
            if let Some(&replacement) = mapping.get(&rgb) {
                filled += flood_fill((x, y), rgb, replacement, visited, source, dest).len();
            }
        }
    }
    filled
}

/// In-bounds N/E/S/W neighbours.
pub(crate) fn neighbours(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> impl Iterator<Item = (u32, u32)> {
    let left = x.checked_sub(1).map(|nx| (nx, y));
    let right = (x + 1 < width).then_some((x + 1, y));
    let up = y.checked_sub(1).map(|ny| (x, ny));
    let down = (y + 1 < height).then_some((x, y + 1));
    [up, right, down, left].into_iter().flatten()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use image::{Rgba, RgbaImage};

    use super::{fill_mapped, flood_fill};
    use crate::render::raster::{PixelMask, blank_canvas};

    const SEA: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const LAND: Rgba<u8> = Rgba([10, 200, 10, 255]);

    /// Two 2x2 islands of LAND separated by a column of SEA.
    fn islands() -> RgbaImage {
        RgbaImage::from_fn(5, 2, |x, _| if x == 2 { SEA } else { LAND })
    }

    #[test]
    fn fill_stops_at_other_colors() {
        let source = islands();
        let mut dest = blank_canvas(5, 2);
        let mut visited = PixelMask::for_image(&source);

        let filled = flood_fill((0, 0), (10, 200, 10), (1, 2, 3), &mut visited, &source, &mut dest);

        assert_eq!(filled.len(), 4);
        assert_eq!(dest.get_pixel(1, 1), &Rgba([1, 2, 3, 255]));
        assert_eq!(dest.get_pixel(3, 0), &Rgba([0, 0, 0, 0]));
        assert!(!visited.contains(2, 0));
    }

    #[test]
    fn whole_image_pass_fills_every_island_once() {
        let source = islands();
        let mut dest = blank_canvas(5, 2);
        let mut visited = PixelMask::for_image(&source);
        let mapping = HashMap::from([((10, 200, 10), (7, 7, 7))]);

        let filled = fill_mapped(&source, &mapping, &mut visited, &mut dest);

        assert_eq!(filled, 8);
        assert_eq!(visited.count(), 8);
        for (x, y) in [(0, 0), (1, 1), (3, 0), (4, 1)] {
            assert_eq!(dest.get_pixel(x, y), &Rgba([7, 7, 7, 255]));
            assert!(visited.contains(x, y));
        }
        assert_eq!(dest.get_pixel(2, 1), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn visited_pixels_are_not_refilled() {
        let source = islands();
        let mut dest = blank_canvas(5, 2);
        let mut visited = PixelMask::for_image(&source);
        flood_fill((0, 0), (10, 200, 10), (1, 1, 1), &mut visited, &source, &mut dest);

        let again = flood_fill((1, 0), (10, 200, 10), (9, 9, 9), &mut visited, &source, &mut dest);

        assert!(again.is_empty());
        assert_eq!(dest.get_pixel(1, 0), &Rgba([1, 1, 1, 255]));
    }

    #[test]
    fn alpha_is_ignored_when_matching_source() {
        let mut source = islands();
        source.put_pixel(1, 0, Rgba([10, 200, 10, 7]));
        let mut dest = blank_canvas(5, 2);
        let mut visited = PixelMask::for_image(&source);

        let filled = flood_fill((0, 0), (10, 200, 10), (5, 5, 5), &mut visited, &source, &mut dest);
        assert_eq!(filled.len(), 4);
    }

    #[test]
    fn repeated_runs_with_fresh_masks_are_identical() {
        let source = islands();
        let mapping = HashMap::from([((10, 200, 10), (7, 7, 7)), ((0, 0, 255), (1, 1, 1))]);
        let run = || {
            let mut dest = blank_canvas(5, 2);
            let mut visited = PixelMask::for_image(&source);
            fill_mapped(&source, &mapping, &mut visited, &mut dest);
            dest
        };
        assert_eq!(run().into_raw(), run().into_raw());
    }
}
