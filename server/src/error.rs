use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    UnknownMode(#[from] realmmap_shared::UnknownMode),

    #[error("coordinate ({x}, {y}) outside {width}x{height} raster")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("regeneration already in progress")]
    Busy,
}

pub type Result<T> = std::result::Result<T, MapError>;
