use std::path::{Path, PathBuf};

use image::Rgba;
use realmmap_shared::MapMode;

pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const DEFAULT_DATA_DIR: &str = "data";

// Border painting
pub const BORDER_HALF_WIDTH: u32 = 5;
pub const BORDER_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const SUBDIVISION_HALF_WIDTH: u32 = 2;
pub const SUBDIVISION_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

pub const HOVER_BRIGHTNESS: f32 = 1.4;

pub fn server_port() -> u16 {
    std::env::var("REALMMAP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

/// Shared secret guarding mutating routes. `None` disables them entirely.
pub fn shared_secret() -> Option<String> {
    std::env::var("REALMMAP_SECRET")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Every file location the engine reads or writes, resolved from one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub root: PathBuf,
    /// Optional mirror directory for externally served copies of outputs.
    pub publish_dir: Option<PathBuf>,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            publish_dir: None,
        }
    }

    pub fn with_publish_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.publish_dir = Some(dir.into());
        self
    }

    pub fn from_env() -> Self {
        let root = std::env::var("REALMMAP_DATA_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let paths = Self::new(root);
        match std::env::var("REALMMAP_PUBLISH_DIR") {
            Ok(dir) if !dir.trim().is_empty() => paths.with_publish_dir(dir),
            _ => paths,
        }
    }

    pub fn defines_dir(&self) -> PathBuf {
        self.root.join("defines")
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join("input")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn provinces_txt(&self) -> PathBuf {
        self.defines_dir().join("provinces.txt")
    }

    pub fn province_raster(&self) -> PathBuf {
        self.input_dir().join("provinces.png")
    }

    /// Editable nation ground truth; the compiled copy lives under `defines/`.
    pub fn nation_input(&self) -> PathBuf {
        self.input_dir().join("nation.json")
    }

    pub fn definitions(&self, mode: MapMode) -> PathBuf {
        match mode {
            MapMode::Nation => self.nation_input(),
            _ => self.defines_dir().join(format!("{mode}.json")),
        }
    }

    pub fn compiled_nations(&self) -> PathBuf {
        self.defines_dir().join("nation.json")
    }

    pub fn raw_queue(&self) -> PathBuf {
        self.input_dir().join("queue.json")
    }

    pub fn compiled_queue(&self) -> PathBuf {
        self.defines_dir().join("queue.json")
    }

    pub fn maps_dir(&self) -> PathBuf {
        self.output_dir().join("maps")
    }

    pub fn full_map(&self, mode: MapMode) -> PathBuf {
        self.maps_dir().join(format!("{mode}_map.png"))
    }

    pub fn regions_root(&self) -> PathBuf {
        self.output_dir().join("regions")
    }

    pub fn regions_dir(&self, mode: MapMode) -> PathBuf {
        self.regions_root().join(mode.as_str())
    }

    /// Where a published copy of `output` goes, mirroring its layout below
    /// the output directory.
    pub fn published(&self, output: &Path) -> Option<PathBuf> {
        let publish_dir = self.publish_dir.as_ref()?;
        let relative = output.strip_prefix(self.output_dir()).ok()?;
        Some(publish_dir.join(relative))
    }
}
