//! Composite maps and per-entity cut-outs.
//!
//! Two products per mode: one full map with every entity painted on a shared
//! canvas, and one standalone image per entity color (plus hover and, for
//! overlords, nested variants) under `output/regions/<mode>/`.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::RgbaImage;
use realmmap_shared::{MapMode, Rgb, brighten, color_key, parse_color_key};
use tracing::{debug, info, warn};

use super::RenderContext;
use super::borders::{BorderStyle, apply_mask, detect_seams, paint_borders};
use super::color_mapping::{ColorOverrides, build_color_mapping, color_overrides, overlord_colors};
use super::flood_fill::{fill_mapped, flood_fill};
use super::raster::{PixelMask, blank_canvas, is_transparent, opaque, rgb_of, save_png};
use crate::config::HOVER_BRIGHTNESS;
use crate::error::Result;
use crate::queue::QueueStore;

/// Stroke and tint settings for one build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapStyle {
    pub outline: BorderStyle,
    /// Lines between titles one level finer than the mode, full map only.
    pub subdivision: Option<BorderStyle>,
    pub hover_brightness: f32,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            outline: BorderStyle::OUTLINE,
            subdivision: Some(BorderStyle::SUBDIVISION),
            hover_brightness: HOVER_BRIGHTNESS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionOptions {
    pub paint_borders: bool,
    pub publish_externally: bool,
    pub queued_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionReport {
    /// Color keys whose images were rewritten.
    pub updated: BTreeSet<String>,
    /// Output files that failed to save.
    pub failed: Vec<PathBuf>,
}

pub fn build_full_map(ctx: &RenderContext, mode: MapMode) -> RgbaImage {
    build_full_map_with(ctx, mode, &MapStyle::default())
}

/// Paint every mapped province onto one canvas, stroke borders on the mapped
/// colors, then repaint subject territory in overlord colors.
pub fn build_full_map_with(ctx: &RenderContext, mode: MapMode, style: &MapStyle) -> RgbaImage {
    let mapping = build_color_mapping(&ctx.world, mode);
    let overrides = color_overrides(&ctx.world, mode);
    let (width, height) = ctx.source.dimensions();

    let mut canvas = blank_canvas(width, height);
    let mut visited = PixelMask::for_image(&ctx.source);
    let filled = fill_mapped(&ctx.source, &mapping, &mut visited, &mut canvas);
    debug!(%mode, filled, "composited provinces");

    let subdivision = match (style.subdivision, mode.child()) {
        (Some(lines), Some(child)) => {
            let child_mapping = build_color_mapping(&ctx.world, child);
            let mut child_canvas = blank_canvas(width, height);
            let mut child_visited = PixelMask::for_image(&ctx.source);
            fill_mapped(&ctx.source, &child_mapping, &mut child_visited, &mut child_canvas);
            Some((detect_seams(&child_canvas, &lines), lines.color))
        }
        _ => None,
    };
    let outline = detect_seams(&canvas, &style.outline);
    debug!(%mode, outline = outline.count(), "detected outline pixels");
    if let Some((mask, color)) = subdivision {
        apply_mask(&mut canvas, &mask, color);
    }
    apply_mask(&mut canvas, &outline, style.outline.color);

    if !overrides.is_empty() {
        apply_overrides(&mut canvas, &overrides, style);
    }
    canvas
}

/// Second flood pass: every component whose color is a subject's becomes its
/// immediate overlord's color. Strokes are left alone.
fn apply_overrides(canvas: &mut RgbaImage, overrides: &ColorOverrides, style: &MapStyle) {
    let snapshot = canvas.clone();
    let (width, height) = snapshot.dimensions();
    let mut visited = PixelMask::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let pixel = snapshot.get_pixel(x, y);
            if visited.contains(x, y) || is_transparent(pixel) || *pixel == style.outline.color {
                continue;
            }
            let rgb = rgb_of(pixel);
            if let Some(&overlord) = overrides.get(&rgb) {
                flood_fill((x, y), rgb, overlord, &mut visited, &snapshot, canvas);
            }
        }
    }
}

/// Build the full map for `mode` and save it under `output/maps/`.
pub fn write_full_map(
    ctx: &RenderContext,
    mode: MapMode,
    publish_externally: bool,
) -> Result<PathBuf> {
    let started = Instant::now();
    let canvas = build_full_map(ctx, mode);
    let path = ctx.paths.full_map(mode);
    save_png(&canvas, &path)?;
    if publish_externally {
        publish(ctx, &path, &canvas);
    }
    info!(
        %mode,
        path = %path.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "full map written"
    );
    Ok(path)
}

/// Pixels an entity's images are built from, as row-major indices.
#[derive(Debug, Default)]
struct Coverage {
    own: Vec<u32>,
    /// Territory of transitive subjects, painted in this entity's color.
    rolled_up: Vec<u32>,
}

/// One pass over the source raster with a single visited mask, recording
/// each component under its entity and under every overlord above it.
fn collect_coverage(
    source: &RgbaImage,
    mapping: &HashMap<Rgb, Rgb>,
    overrides: &ColorOverrides,
) -> HashMap<Rgb, Coverage> {
    let (width, height) = source.dimensions();
    let mut visited = PixelMask::for_image(source);
    let mut scratch = blank_canvas(width, height);
    let mut coverage: HashMap<Rgb, Coverage> = HashMap::new();

    for y in 0..height {
        for x in 0..width {
            if visited.contains(x, y) {
                continue;
            }
            let province = rgb_of(source.get_pixel(x, y));
            let Some(&entity) = mapping.get(&province) else {
                continue;
            };
            let region: Vec<u32> =
                flood_fill((x, y), province, entity, &mut visited, source, &mut scratch)
                    .into_iter()
                    .map(|(px, py)| py * width + px)
                    .collect();

            for overlord in overlord_colors(overrides, entity) {
                coverage
                    .entry(overlord)
                    .or_default()
                    .rolled_up
                    .extend_from_slice(&region);
            }
            coverage.entry(entity).or_default().own.extend(region);
        }
    }
    coverage
}

fn paint_indices(canvas: &mut RgbaImage, indices: &[u32], rgb: Rgb) {
    let width = canvas.width();
    let fill = opaque(rgb);
    for &index in indices {
        canvas.put_pixel(index % width, index / width, fill);
    }
}

/// Multiply color channels of every non-transparent pixel.
pub fn brighten_image(image: &RgbaImage, factor: f32) -> RgbaImage {
    let mut bright = image.clone();
    for pixel in bright.pixels_mut() {
        if is_transparent(pixel) {
            continue;
        }
        let (r, g, b) = brighten(rgb_of(pixel), factor);
        pixel[0] = r;
        pixel[1] = g;
        pixel[2] = b;
    }
    bright
}

pub fn region_filename(rgb: Rgb, variant: Option<&str>) -> String {
    match variant {
        Some(suffix) => format!("{}.{suffix}.png", color_key(rgb)),
        None => format!("{}.png", color_key(rgb)),
    }
}

pub fn generate_regions(
    ctx: &RenderContext,
    mode: MapMode,
    options: RegionOptions,
) -> Result<RegionReport> {
    generate_regions_with(ctx, mode, options, &MapStyle::default())
}

/// Write one cut-out per entity color for `mode`.
///
/// The whole raster is always scanned so overlord roll-ups stay complete; in
/// queued mode only entities named by the compiled queue are written, and an
/// entity that no longer covers any pixel keeps whatever image it had. Only a
/// full run deletes, by clearing the mode directory first. Save failures are
/// logged and the run carries on.
pub fn generate_regions_with(
    ctx: &RenderContext,
    mode: MapMode,
    options: RegionOptions,
    style: &MapStyle,
) -> Result<RegionReport> {
    let started = Instant::now();
    let mapping = build_color_mapping(&ctx.world, mode);
    let overrides = color_overrides(&ctx.world, mode);
    let overlords: HashSet<Rgb> = overrides.values().copied().collect();
    let output_dir = ctx.paths.regions_dir(mode);

    let queued: Option<BTreeSet<Rgb>> = if options.queued_only {
        let keys = QueueStore::new(&ctx.paths).load_queue(mode)?;
        Some(
            keys.iter()
                .filter_map(|key| {
                    let rgb = parse_color_key(key);
                    if rgb.is_none() {
                        warn!(%mode, key = %key, "ignoring malformed compiled queue key");
                    }
                    rgb
                })
                .collect(),
        )
    } else {
        clear_directory(&output_dir)?;
        if options.publish_externally
            && let Some(published) = ctx.paths.published(&output_dir)
        {
            clear_directory(&published)?;
        }
        None
    };

    let coverage = collect_coverage(&ctx.source, &mapping, &overrides);
    let mut targets: Vec<Rgb> = match &queued {
        Some(queued) => queued
            .iter()
            .copied()
            .filter(|rgb| coverage.contains_key(rgb))
            .collect(),
        None => coverage.keys().copied().collect(),
    };
    targets.sort_unstable();

    let mut report = RegionReport::default();
    let (width, height) = ctx.source.dimensions();

    for rgb in targets {
        let Some(cover) = coverage.get(&rgb) else {
            continue;
        };
        let mut normal = blank_canvas(width, height);
        paint_indices(&mut normal, &cover.own, rgb);
        paint_indices(&mut normal, &cover.rolled_up, rgb);
        let mut hover = brighten_image(&normal, style.hover_brightness);

        let mut nested = (mode.has_overlords() && overlords.contains(&rgb)).then(|| {
            let mut nested = blank_canvas(width, height);
            paint_indices(&mut nested, &cover.own, rgb);
            nested
        });

        paint_borders(options.paint_borders, &style.outline, &mut normal);
        paint_borders(options.paint_borders, &style.outline, &mut hover);
        if let Some(nested) = nested.as_mut() {
            paint_borders(options.paint_borders, &style.outline, nested);
        }

        let mut outputs = vec![
            (region_filename(rgb, None), normal),
            (region_filename(rgb, Some("hover")), hover),
        ];
        if let Some(nested) = nested {
            outputs.push((region_filename(rgb, Some("nested")), nested));
        }

        let mut saved_any = false;
        for (filename, image) in outputs {
            let path = output_dir.join(filename);
            match save_png(&image, &path) {
                Ok(()) => {
                    saved_any = true;
                    if options.publish_externally {
                        publish(ctx, &path, &image);
                    }
                }
                Err(e) => {
                    warn!(%mode, path = %path.display(), error = %e, "failed to save region image");
                    report.failed.push(path);
                }
            }
        }
        if saved_any {
            report.updated.insert(color_key(rgb));
        }
    }

    info!(
        %mode,
        updated = report.updated.len(),
        failed = report.failed.len(),
        queued_only = options.queued_only,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "region images generated"
    );
    Ok(report)
}

fn publish(ctx: &RenderContext, path: &Path, image: &RgbaImage) {
    let Some(target) = ctx.paths.published(path) else {
        return;
    };
    if let Err(e) = save_png(image, &target) {
        warn!(path = %target.display(), error = %e, "failed to publish image");
    }
}

fn clear_directory(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}
