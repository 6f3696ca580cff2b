//! PNG rendering of the accuracy bar chart.
//!
//! Text is drawn with a built-in 3x5 pixel font so no system fonts are needed.

use std::io::Write;
use std::path::Path;

use imgref::ImgVec;
use rgb::RGB8;

use crate::error::Result;
use crate::stats::chart::{BarChartConfig, MARGINS, y_axis_max};

const WHITE: RGB8 = RGB8::new(255, 255, 255);
const INK: RGB8 = RGB8::new(26, 26, 26);
const GRID: RGB8 = RGB8::new(224, 224, 224);
const AXIS: RGB8 = RGB8::new(51, 51, 51);

const GLYPH_W: usize = 3;
const GLYPH_H: usize = 5;
/// Horizontal advance per character, in font pixels.
const ADVANCE: usize = GLYPH_W + 1;

/// Rasterize a bar chart from `(name, value)` pairs.
#[must_use]
pub fn render_bar_png(bars: &[(String, f64)], config: &BarChartConfig) -> ImgVec<RGB8> {
    let width = config.width as usize;
    let height = config.height as usize;
    let mut canvas = Canvas(ImgVec::new(vec![WHITE; width * height], width, height));

    let (top, right, bottom, left) = MARGINS;
    let (top, right, bottom, left) = (top as usize, right as usize, bottom as usize, left as usize);
    let plot_w = width.saturating_sub(left + right);
    let plot_h = height.saturating_sub(top + bottom);
    let axis_y = top + plot_h;
    let y_max = y_axis_max(bars, config.y_max);
    let scale_y = |v: f64| axis_y - ((v.clamp(0.0, y_max) / y_max) * plot_h as f64).round() as usize;

    canvas.text_centered(&config.title, width / 2, 16, 3, INK);

    for i in 0..=5 {
        let value = y_max * i as f64 / 5.0;
        let y = scale_y(value);
        canvas.fill_rect(left, y, plot_w, 1, GRID);
        let label = format!("{value:.0}");
        let label_w = text_width(&label, 2);
        canvas.text(&label, left.saturating_sub(label_w + 6), y.saturating_sub(5), 2, INK);
    }

    if !bars.is_empty() {
        let slot = plot_w as f64 / bars.len() as f64;
        let bar_w = ((slot * 0.7) as usize).max(1);
        for (i, (name, value)) in bars.iter().enumerate() {
            let x = left + (slot * i as f64 + (slot - bar_w as f64) / 2.0) as usize;
            let bar_top = scale_y(*value);
            canvas.fill_rect(x, bar_top, bar_w, axis_y - bar_top, parse_color(config.color_for(name)));

            let center = x + bar_w / 2;
            let label = format!("{value:.2}");
            let scale = if text_width(&label, 2) <= slot as usize { 2 } else { 1 };
            canvas.text_centered(&label, center, bar_top.saturating_sub(GLYPH_H * scale + 3), scale, INK);

            // Names read bottom-to-top and end just under the axis.
            let scale = if ADVANCE * 2 * name.chars().count() + 8 <= bottom { 2 } else { 1 };
            let run = ADVANCE * scale * name.chars().count();
            canvas.text_rotated(name, center.saturating_sub(GLYPH_H * scale / 2), axis_y + 6 + run, scale, INK);
        }
    }

    canvas.fill_rect(left, axis_y, plot_w, 2, AXIS);
    canvas.fill_rect(left.saturating_sub(2), top, 2, plot_h + 2, AXIS);

    canvas.0
}

/// Encode an RGB image as PNG bytes.
pub fn encode_png(image: &ImgVec<RGB8>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_png(&mut out, image)?;
    Ok(out)
}

/// Encode an RGB image as PNG and write it to `path`.
pub fn save_png(path: &Path, image: &ImgVec<RGB8>) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_png(std::io::BufWriter::new(file), image)
}

fn write_png<W: Write>(sink: W, image: &ImgVec<RGB8>) -> Result<()> {
    let mut encoder = png::Encoder::new(sink, image.width() as u32, image.height() as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    let data: Vec<u8> = image.pixels().flat_map(|p| [p.r, p.g, p.b]).collect();
    writer.write_image_data(&data)?;
    writer.finish()?;
    Ok(())
}

/// Parse `#rrggbb`; anything else renders mid-gray.
fn parse_color(hex: &str) -> RGB8 {
    let channel = |i: usize| {
        hex.get(1 + 2 * i..3 + 2 * i)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
    };
    match (hex.starts_with('#') && hex.len() == 7, channel(0), channel(1), channel(2)) {
        (true, Some(r), Some(g), Some(b)) => RGB8::new(r, g, b),
        _ => RGB8::new(128, 128, 128),
    }
}

fn text_width(text: &str, scale: usize) -> usize {
    text.chars().count() * ADVANCE * scale
}

struct Canvas(ImgVec<RGB8>);

impl Canvas {
    fn put(&mut self, x: usize, y: usize, color: RGB8) {
        let (width, height, stride) = (self.0.width(), self.0.height(), self.0.stride());
        if x < width && y < height {
            self.0.buf_mut()[y * stride + x] = color;
        }
    }

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: RGB8) {
        for yy in y..y + h {
            for xx in x..x + w {
                self.put(xx, yy, color);
            }
        }
    }

    fn text(&mut self, text: &str, x: usize, y: usize, scale: usize, color: RGB8) {
        for (k, ch) in text.chars().enumerate() {
            let rows = glyph(ch);
            for (gy, bits) in rows.iter().enumerate() {
                for gx in 0..GLYPH_W {
                    if bits & (0b100 >> gx) != 0 {
                        let px = x + (k * ADVANCE + gx) * scale;
                        self.fill_rect(px, y + gy * scale, scale, scale, color);
                    }
                }
            }
        }
    }

    fn text_centered(&mut self, text: &str, center_x: usize, y: usize, scale: usize, color: RGB8) {
        let x = center_x.saturating_sub(text_width(text, scale) / 2);
        self.text(text, x, y, scale, color);
    }

    /// Text rotated 90 degrees counter-clockwise, starting at the bottom.
    fn text_rotated(&mut self, text: &str, x: usize, y_bottom: usize, scale: usize, color: RGB8) {
        for (k, ch) in text.chars().enumerate() {
            let rows = glyph(ch);
            for (gy, bits) in rows.iter().enumerate() {
                for gx in 0..GLYPH_W {
                    if bits & (0b100 >> gx) != 0 {
                        let along = (k * ADVANCE + gx + 1) * scale;
                        if let Some(py) = y_bottom.checked_sub(along) {
                            self.fill_rect(x + gy * scale, py, scale, scale, color);
                        }
                    }
                }
            }
        }
    }
}

/// Rows of a 3x5 glyph, most significant of the 3 bits on the left.
fn glyph(ch: char) -> [u8; GLYPH_H] {
    match ch.to_ascii_lowercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'b' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'd' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'f' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'g' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'h' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'k' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'n' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'o' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'p' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'r' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' => [0b011, 0b100, 0b010, 0b001, 0b110],
        't' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'w' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'x' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        ' ' => [0; GLYPH_H],
        // Unknown characters render as a hollow box.
        _ => [0b111, 0b101, 0b101, 0b101, 0b111],
    }
}
