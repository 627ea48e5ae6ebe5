//! PNG bar charts for the email body.
//!
//! Charts are rasterized directly onto an RGB canvas (8x8 bitmap glyphs for
//! labels) and PNG-encoded in memory, so rendering needs no display server,
//! system fonts, or temp files and is fully deterministic.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::collector::DatabaseTarget;
use crate::error::{Error, Result};
use crate::store::PeakStore;

use super::truncate_text;

type Rgb = [u8; 3];

const BACKGROUND: Rgb = [0xff, 0xff, 0xff];
const TEXT: Rgb = [0x33, 0x33, 0x33];
const AXIS: Rgb = [0xb0, 0xb0, 0xb0];
/// Per-database bar colors, cycled in target order.
const PALETTE: [Rgb; 3] = [[0x00, 0x50, 0x73], [0x17, 0xa2, 0xb8], [0x28, 0xa7, 0x45]];
/// Spike bars in the per-database detail chart.
const SPIKE: Rgb = [0xdc, 0x35, 0x45];

const WIDTH: usize = 800;
const HEIGHT: usize = 400;

/// Statement-text prefix length used for detail-chart labels.
const LABEL_CHARS: usize = 40;

/// Entries shown in the per-database detail chart.
const DETAIL_TOP_N: usize = 5;

/// Summary chart: one bar per configured database showing its single worst
/// peak (zero-height when the database captured nothing), labeled with the
/// numeric value.
pub fn render_overall_chart(store: &PeakStore, targets: &[DatabaseTarget]) -> Result<Vec<u8>> {
    let mut canvas = Canvas::new(WIDTH, HEIGHT);

    let title = "Highest latency spike per database";
    let tx = (WIDTH.saturating_sub(Canvas::text_width(title, 2))) / 2;
    canvas.draw_text(tx, 16, title, 2, TEXT);

    let left = 40;
    let right = 20;
    let top = 60;
    let baseline = HEIGHT - 50;
    let plot_h = baseline - top;
    let plot_w = WIDTH - left - right;

    canvas.fill_rect(left, baseline, plot_w, 2, AXIS);

    let values: Vec<u64> = targets.iter().map(|t| store.worst_latency(&t.name)).collect();
    let max = values.iter().copied().max().unwrap_or(0).max(1);

    let slot = plot_w / targets.len().max(1);
    let bar_w = slot * 6 / 10;

    for (i, (target, value)) in targets.iter().zip(&values).enumerate() {
        // widen: latency * pixel height overflows usize for extreme peaks
        let bar_h = ((*value as u128 * plot_h as u128) / max as u128) as usize;
        let x = left + i * slot + (slot - bar_w) / 2;
        let y = baseline - bar_h;
        canvas.fill_rect(x, y, bar_w, bar_h, PALETTE[i % PALETTE.len()]);

        let value_label = format!("{} ms", value);
        let lx = x + bar_w.saturating_sub(Canvas::text_width(&value_label, 1)) / 2;
        canvas.draw_text(lx, y.saturating_sub(14), &value_label, 1, TEXT);

        let name = truncate_text(&target.name, 18);
        let nx = x + bar_w.saturating_sub(Canvas::text_width(&name, 1)) / 2;
        canvas.draw_text(nx, baseline + 10, &name, 1, TEXT);
    }

    canvas.into_png()
}

/// Detail chart: horizontal bars for the top-5 peaks of one database, worst
/// first, labeled with the truncated statement text. `None` when the database
/// has no entries.
pub fn render_database_chart(store: &PeakStore, db_name: &str) -> Result<Option<Vec<u8>>> {
    let entries = store.sorted_entries(db_name);
    if entries.is_empty() {
        return Ok(None);
    }
    let top = &entries[..entries.len().min(DETAIL_TOP_N)];
    let max = top[0].max_avg_latency_ms.max(1);

    let mut canvas = Canvas::new(WIDTH, HEIGHT);

    let title = format!("{}: top {} slowest spikes", db_name, top.len());
    canvas.draw_text(20, 16, &truncate_text(&title, 48), 2, TEXT);

    let label_w = LABEL_CHARS * 8 + 24 + 16; // text, ellipsis, gap
    let bar_left = 20 + label_w;
    let bar_max_w = WIDTH - bar_left - 90; // room for the value label
    let top_margin = 60;
    let row_h = (HEIGHT - top_margin - 20) / DETAIL_TOP_N;
    let bar_h = row_h * 6 / 10;

    canvas.fill_rect(bar_left - 4, top_margin, 2, row_h * top.len(), AXIS);

    for (i, entry) in top.iter().enumerate() {
        let y = top_margin + i * row_h;
        let label = truncate_text(&entry.statement_text, LABEL_CHARS);
        canvas.draw_text(20, y + (bar_h.saturating_sub(8)) / 2, &label, 1, TEXT);

        let len = (((entry.max_avg_latency_ms as u128 * bar_max_w as u128) / max as u128) as usize)
            .max(2);
        canvas.fill_rect(bar_left, y, len, bar_h, SPIKE);

        let value_label = format!("{} ms", entry.max_avg_latency_ms);
        canvas.draw_text(
            bar_left + len + 6,
            y + (bar_h.saturating_sub(8)) / 2,
            &value_label,
            1,
            TEXT,
        );
    }

    canvas.into_png().map(Some)
}

/// Minimal RGB raster with bitmap text.
struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Canvas {
    fn new(width: usize, height: usize) -> Self {
        let mut pixels = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            pixels.extend_from_slice(&BACKGROUND);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    fn set(&mut self, x: usize, y: usize, color: Rgb) {
        if x < self.width && y < self.height {
            let i = (y * self.width + x) * 3;
            self.pixels[i..i + 3].copy_from_slice(&color);
        }
    }

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: Rgb) {
        for dy in 0..h {
            for dx in 0..w {
                self.set(x + dx, y + dy, color);
            }
        }
    }

    /// Draws text with the 8x8 bitmap font. Non-ASCII renders as '?'.
    fn draw_text(&mut self, x: usize, y: usize, text: &str, scale: usize, color: Rgb) {
        for (i, ch) in text.chars().enumerate() {
            let code = if ch.is_ascii() { ch as usize } else { b'?' as usize };
            let glyph = font8x8::legacy::BASIC_LEGACY[code];
            let gx = x + i * 8 * scale;
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..8 {
                    if bits & (1 << col) != 0 {
                        self.fill_rect(gx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
        }
    }

    fn text_width(text: &str, scale: usize) -> usize {
        text.chars().count() * 8 * scale
    }

    fn into_png(self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(
                &self.pixels,
                self.width as u32,
                self.height as u32,
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| Error::Report(format!("png encode: {}", e)))?;
        Ok(out)
    }
}
