use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};
use realmmap_shared::Rgb;

use crate::error::Result;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// One bit of state per pixel, indexed row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl PixelMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    pub fn for_image(image: &RgbaImage) -> Self {
        Self::new(image.width(), image.height())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.bits[self.index(x, y)]
    }

    /// Returns `false` if the pixel was already set.
    pub fn insert(&mut self, x: u32, y: u32) -> bool {
        let index = self.index(x, y);
        !std::mem::replace(&mut self.bits[index], true)
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|bit| **bit).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width as usize;
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, bit)| **bit)
            .map(move |(index, _)| ((index % width) as u32, (index / width) as u32))
    }
}

pub fn blank_canvas(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, TRANSPARENT)
}

pub fn rgb_of(pixel: &Rgba<u8>) -> Rgb {
    (pixel[0], pixel[1], pixel[2])
}

pub fn opaque(rgb: Rgb) -> Rgba<u8> {
    Rgba([rgb.0, rgb.1, rgb.2, 255])
}

pub fn is_transparent(pixel: &Rgba<u8>) -> bool {
    pixel[3] == 0
}

pub fn load_rgba(path: &Path) -> Result<RgbaImage> {
    Ok(image::open(path)?.to_rgba8())
}

pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
