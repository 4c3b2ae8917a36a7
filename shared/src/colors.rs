/// Three-channel color key. Alpha is never part of a key.
pub type Rgb = (u8, u8, u8);

pub const BLACK: Rgb = (0, 0, 0);

/// Parse the `"r,g,b"` form used by entity definitions and the raw queue.
pub fn parse_rgb(raw: &str) -> Option<Rgb> {
    parse_channels(raw, ',')
}

/// Filename-safe key for a color: `(255, 0, 10)` -> `"255_0_10"`.
pub fn color_key(rgb: Rgb) -> String {
    format!("{}_{}_{}", rgb.0, rgb.1, rgb.2)
}

/// Inverse of [`color_key`]. Also accepts the comma form so callers can pass
/// either encoding they received at the boundary.
pub fn parse_color_key(key: &str) -> Option<Rgb> {
    let key = key.trim();
    let key = key.strip_suffix(".png").unwrap_or(key);
    if key.contains(',') {
        parse_rgb(key)
    } else {
        parse_channels(key, '_')
    }
}

/// `"r,g,b"` encoding, the inverse of [`parse_rgb`].
pub fn rgb_string(rgb: Rgb) -> String {
    format!("{},{},{}", rgb.0, rgb.1, rgb.2)
}

/// Scale every channel by `factor`, saturating at 255.
pub fn brighten(rgb: Rgb, factor: f32) -> Rgb {
    (
        scale_channel(rgb.0, factor),
        scale_channel(rgb.1, factor),
        scale_channel(rgb.2, factor),
    )
}

pub fn scale_channel(value: u8, factor: f32) -> u8 {
    (f32::from(value) * factor).round().clamp(0.0, 255.0) as u8
}

fn parse_channels(raw: &str, sep: char) -> Option<Rgb> {
    let mut parts = raw.split(sep).map(|part| part.trim().parse::<u8>());
    let r = parts.next()?.ok()?;
    let g = parts.next()?.ok()?;
    let b = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((r, g, b))
}
