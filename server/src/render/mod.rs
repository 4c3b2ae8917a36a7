pub mod borders;
pub mod color_mapping;
pub mod compositor;
pub mod flood_fill;
pub mod raster;

use image::RgbaImage;

use crate::config::DataPaths;
use crate::error::{MapError, Result};
use crate::store::{EntityTable, ProvinceIndex, WorldData};

/// Inputs for one regeneration run, loaded fresh from disk so a run never
/// sees entity data from a previous one.
pub struct RenderContext {
    pub paths: DataPaths,
    pub world: WorldData,
    pub source: RgbaImage,
}

impl RenderContext {
    pub fn load(paths: &DataPaths, nations: EntityTable) -> Result<Self> {
        let world = WorldData::load(paths, nations)?;
        let source = raster::load_rgba(&paths.province_raster())?;
        Ok(Self {
            paths: paths.clone(),
            world,
            source,
        })
    }

    pub fn sample_province(&self, x: u32, y: u32) -> Result<u32> {
        sample_province(&self.source, &self.world.provinces, x, y)
    }
}

/// Province id under `(x, y)` on the source raster, or 0 when the color is
/// not a known province.
pub fn sample_province(
    source: &RgbaImage,
    provinces: &ProvinceIndex,
    x: u32,
    y: u32,
) -> Result<u32> {
    let (width, height) = source.dimensions();
    if x >= width || y >= height {
        return Err(MapError::OutOfBounds {
            x,
            y,
            width,
            height,
        });
    }
    let rgb = raster::rgb_of(source.get_pixel(x, y));
    Ok(provinces.id_of(rgb).unwrap_or(0))
}
