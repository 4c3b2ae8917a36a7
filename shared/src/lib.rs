pub mod colors;
pub mod entity;
pub mod mode;
pub mod regen;

pub use colors::{BLACK, Rgb, brighten, color_key, parse_color_key, parse_rgb, rgb_string};
pub use entity::*;
pub use mode::{MapMode, UnknownMode};
pub use regen::*;
