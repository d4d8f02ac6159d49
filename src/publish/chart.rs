use crate::error::PublishError;
use crate::voting::RankedGroup;
use ab_glyph::{FontArc, PxScale};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::Path;

/// Turns ranked groups into an image file.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, groups: &[RankedGroup], path: &Path) -> Result<(), PublishError>;
}

const WIDTH: u32 = 1400;
const LABEL_X: u32 = 24;
const MARGIN_LEFT: u32 = 460;
const MARGIN_RIGHT: u32 = 150;
const CAPTION_HEIGHT: u32 = 64;
const PANEL_PAD: u32 = 32;
const ROW_HEIGHT: u32 = 56;
const BAR_HEIGHT: u32 = 34;
const COUNT_GAP: u32 = 12;

const CAPTION_SCALE: f32 = 34.0;
const LABEL_SCALE: f32 = 26.0;
const LABEL_WIDTH: u32 = MARGIN_LEFT - LABEL_X - 16;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([200, 200, 200]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const TEXT: Rgb<u8> = Rgb([0, 0, 0]);

// Left-to-right bar fills: yellow→orange, then pink→purple
const GRADIENTS: [([u8; 3], [u8; 3]); 2] = [
    ([0xFF, 0xFF, 0x00], [0xFF, 0x8A, 0x00]),
    ([0xFE, 0x2E, 0x82], [0x4F, 0x28, 0x7D]),
];

pub fn load_font(path: &Path) -> Result<FontArc, PublishError> {
    let bytes = std::fs::read(path).map_err(|e| PublishError::io(path, e))?;
    FontArc::try_from_vec(bytes)
        .map_err(|e| PublishError::Render(format!("{}: {}", path.display(), e)))
}

/// Horizontal gradient bar chart, one stacked panel per group. Captions, rank
/// labels and counts are drawn when a font is present.
#[derive(Default)]
pub struct PngChartRenderer {
    font: Option<FontArc>,
}

impl PngChartRenderer {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }
}

impl ChartRenderer for PngChartRenderer {
    fn render(&self, groups: &[RankedGroup], path: &Path) -> Result<(), PublishError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PublishError::io(parent, e))?;
            }
        }
        let img = draw(groups, self.font.as_ref());
        img.save_with_format(path, ImageFormat::Png)
            .map_err(|e| PublishError::Render(format!("{}: {}", path.display(), e)))
    }
}

fn panel_height(group: &RankedGroup) -> u32 {
    let rows = group.entries.len().max(1) as u32;
    CAPTION_HEIGHT + PANEL_PAD * 2 + rows * ROW_HEIGHT
}

pub fn draw(groups: &[RankedGroup], font: Option<&FontArc>) -> RgbImage {
    let height = groups.iter().map(panel_height).sum::<u32>().max(1);
    let mut img = RgbImage::from_pixel(WIDTH, height, BACKGROUND);

    let mut top = 0;
    for (i, group) in groups.iter().enumerate() {
        draw_panel(&mut img, group, top, GRADIENTS[i % GRADIENTS.len()]);
        if let Some(font) = font {
            draw_labels(&mut img, group, top, font);
        }
        top += panel_height(group);
    }
    img
}

fn plot_width() -> u32 {
    WIDTH - MARGIN_LEFT - MARGIN_RIGHT
}

fn bar_top(top: u32, row: usize) -> u32 {
    top + CAPTION_HEIGHT + PANEL_PAD + row as u32 * ROW_HEIGHT + (ROW_HEIGHT - BAR_HEIGHT) / 2
}

fn bar_width(count: u32, axis_max: u32) -> u32 {
    scale(count.min(axis_max), axis_max, plot_width())
}

fn draw_panel(img: &mut RgbImage, group: &RankedGroup, top: u32, gradient: ([u8; 3], [u8; 3])) {
    let plot_top = top + CAPTION_HEIGHT + PANEL_PAD;
    let plot_bottom = top + panel_height(group) - PANEL_PAD;
    let axis_max = group.axis_max.max(1);

    // Dotted grid at each tick
    let mut tick = 0;
    while tick <= axis_max {
        let x = MARGIN_LEFT + scale(tick, axis_max, plot_width());
        for y in (plot_top..plot_bottom).step_by(4) {
            put(img, x, y, GRID);
        }
        tick += group.tick_step();
    }

    for y in plot_top..plot_bottom {
        put(img, MARGIN_LEFT, y, AXIS);
    }

    for (row, entry) in group.entries.iter().enumerate() {
        let width = bar_width(entry.count, axis_max);
        let y0 = bar_top(top, row);
        for dx in 0..width {
            let color = lerp(gradient.0, gradient.1, dx, width);
            for y in y0..y0 + BAR_HEIGHT {
                put(img, MARGIN_LEFT + 1 + dx, y, color);
            }
        }
    }
}

fn draw_labels(img: &mut RgbImage, group: &RankedGroup, top: u32, font: &FontArc) {
    let caption_scale = PxScale::from(CAPTION_SCALE);
    let (_, caption_height) = text_size(caption_scale, font, &group.caption);
    let caption_y = top + CAPTION_HEIGHT.saturating_sub(caption_height) / 2;
    draw_text_mut(
        img,
        TEXT,
        MARGIN_LEFT as i32,
        caption_y as i32,
        caption_scale,
        font,
        &group.caption,
    );

    let scale = PxScale::from(LABEL_SCALE);
    let axis_max = group.axis_max.max(1);
    for (row, entry) in group.entries.iter().enumerate() {
        let label = fit_width(&entry_label(row + 1, &entry.title), font, scale, LABEL_WIDTH);
        let (_, label_height) = text_size(scale, font, &label);
        let y = bar_top(top, row) + BAR_HEIGHT.saturating_sub(label_height) / 2;
        draw_text_mut(img, TEXT, LABEL_X as i32, y as i32, scale, font, &label);

        let count = count_label(entry.count);
        let (count_width, _) = text_size(scale, font, &count);
        let bar_end = MARGIN_LEFT + 1 + bar_width(entry.count, axis_max);
        draw_text_mut(
            img,
            TEXT,
            count_x(bar_end, count_width) as i32,
            y as i32,
            scale,
            font,
            &count,
        );
    }
}

pub fn entry_label(rank: usize, title: &str) -> String {
    format!("{}. {}", rank, title)
}

/// Vote count with thousands separators, e.g. `12,345`.
pub fn count_label(count: u32) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// Just past the bar end, pulled back so the text stays on the canvas
fn count_x(bar_end: u32, text_width: u32) -> u32 {
    (bar_end + COUNT_GAP).min(WIDTH.saturating_sub(text_width + 4))
}

// Long titles are cut and ellipsized to fit the label column
fn fit_width(text: &str, font: &FontArc, scale: PxScale, max_width: u32) -> String {
    if text_size(scale, font, text).0 <= max_width {
        return text.to_string();
    }
    let mut chars: Vec<char> = text.chars().collect();
    while chars.pop().is_some() {
        let candidate: String = chars.iter().chain(std::iter::once(&'…')).collect();
        if text_size(scale, font, &candidate).0 <= max_width {
            return candidate;
        }
    }
    String::new()
}

fn scale(value: u32, max: u32, width: u32) -> u32 {
    (u64::from(value) * u64::from(width) / u64::from(max)) as u32
}

fn lerp(from: [u8; 3], to: [u8; 3], step: u32, steps: u32) -> Rgb<u8> {
    let t = if steps <= 1 { 0.0 } else { step as f32 / (steps - 1) as f32 };
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Rgb([mix(from[0], to[0]), mix(from[1], to[1]), mix(from[2], to[2])])
}

fn put(img: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    if x < img.width() && y < img.height() {
        img.put_pixel(x, y, color);
    }
}
