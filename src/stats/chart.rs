//! SVG bar chart of per-corruption accuracy.
//!
//! One bar per entry, value printed above each bar, names rotated under the
//! axis. Supports light and dark mode via CSS media queries.

use std::fmt::Write as _;

/// Bar chart configuration, shared by the SVG and PNG renderers.
#[derive(Debug, Clone)]
pub struct BarChartConfig {
    /// Chart title.
    pub title: String,
    /// Y-axis label.
    pub y_label: String,
    /// Upper end of the value axis.
    pub y_max: f64,
    /// Chart width in pixels.
    pub width: u32,
    /// Chart height in pixels.
    pub height: u32,
    /// Bar fill color, `#rrggbb`.
    pub bar_color: String,
    /// Fill color for the bar named `avg`.
    pub avg_color: String,
}

impl Default for BarChartConfig {
    fn default() -> Self {
        Self {
            title: "Accuracy by corruption".to_string(),
            y_label: "Top-1 accuracy (%)".to_string(),
            y_max: 100.0,
            width: 900,
            height: 450,
            bar_color: colors::BLUE.to_string(),
            avg_color: colors::RED.to_string(),
        }
    }
}

impl BarChartConfig {
    /// Creates a new chart configuration with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Sets the Y-axis label.
    #[must_use]
    pub fn with_y_label(mut self, label: impl Into<String>) -> Self {
        self.y_label = label.into();
        self
    }

    /// Sets the chart dimensions.
    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub(crate) fn color_for(&self, name: &str) -> &str {
        if name == "avg" { &self.avg_color } else { &self.bar_color }
    }
}

/// Plot-area margins `(top, right, bottom, left)` in pixels.
pub(crate) const MARGINS: (u32, u32, u32, u32) = (50, 20, 110, 60);

/// Generates an SVG bar chart from `(name, value)` pairs.
///
/// Returns an empty string when there are no bars.
///
/// # Example
///
/// ```rust
/// use corruption_bench::stats::chart::{generate_bar_svg, BarChartConfig};
///
/// let bars = vec![("natural".to_string(), 93.2), ("fog".to_string(), 71.5)];
/// let svg = generate_bar_svg(&bars, &BarChartConfig::new("resnet / avg=82.35"));
/// assert!(svg.contains("fog"));
/// ```
#[must_use]
pub fn generate_bar_svg(bars: &[(String, f64)], config: &BarChartConfig) -> String {
    if bars.is_empty() {
        return String::new();
    }

    let mut svg = String::with_capacity(4096 + bars.len() * 256);
    let width = config.width;
    let height = config.height;
    let (margin_top, margin_right, margin_bottom, margin_left) = MARGINS;
    let plot_width = f64::from(width.saturating_sub(margin_left + margin_right));
    let plot_height = f64::from(height.saturating_sub(margin_top + margin_bottom));
    let right = width.saturating_sub(margin_right);
    let baseline = height.saturating_sub(margin_bottom);
    let y_max = y_axis_max(bars, config.y_max);

    let slot = plot_width / bars.len() as f64;
    let bar_width = slot * 0.7;
    let scale_y = |v: f64| -> f64 {
        f64::from(margin_top) + (1.0 - v.clamp(0.0, y_max) / y_max) * plot_height
    };

    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}">"#,
        width, height
    );

    svg.push_str(
        r#"<style>
  :root {
    --bg-color: #ffffff;
    --text-color: #1a1a1a;
    --grid-color: #e0e0e0;
    --axis-color: #333333;
  }
  @media (prefers-color-scheme: dark) {
    :root {
      --bg-color: #1a1a1a;
      --text-color: #e0e0e0;
      --grid-color: #404040;
      --axis-color: #b0b0b0;
    }
  }
  .background { fill: var(--bg-color); }
  .title { font: bold 18px system-ui, sans-serif; fill: var(--text-color); }
  .axis-label { font: 13px system-ui, sans-serif; fill: var(--text-color); }
  .tick-label { font: 11px system-ui, sans-serif; fill: var(--text-color); }
  .value { font: 10px system-ui, sans-serif; fill: var(--text-color); }
  .grid { stroke: var(--grid-color); stroke-width: 1; }
  .axis { stroke: var(--axis-color); stroke-width: 1.5; }
</style>
"#,
    );

    let _ = writeln!(
        svg,
        r#"<rect class="background" width="{}" height="{}"/>"#,
        width, height
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="30" text-anchor="middle" class="title">{}</text>"#,
        f64::from(width) / 2.0,
        escape(&config.title)
    );

    // Grid and value ticks
    for i in 0..=5 {
        let value = y_max * f64::from(i) / 5.0;
        let y = scale_y(value);
        let _ = writeln!(
            svg,
            r#"<line x1="{}" y1="{:.2}" x2="{}" y2="{:.2}" class="grid"/>"#,
            margin_left,
            y,
            right,
            y
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{:.2}" text-anchor="end" class="tick-label">{:.0}</text>"#,
            margin_left - 8,
            y + 4.0,
            value
        );
    }

    // Bars
    for (i, (name, value)) in bars.iter().enumerate() {
        let x = f64::from(margin_left) + slot * i as f64 + (slot - bar_width) / 2.0;
        let top = scale_y(*value);
        let bottom = scale_y(0.0);
        let center = x + bar_width / 2.0;
        let _ = writeln!(
            svg,
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"/>"#,
            x,
            top,
            bar_width,
            bottom - top,
            config.color_for(name)
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" class="value">{:.2}</text>"#,
            center,
            top - 4.0,
            value
        );
        let label_y = baseline + 12;
        let _ = writeln!(
            svg,
            r#"<text x="{:.2}" y="{}" text-anchor="end" class="tick-label" transform="rotate(-45 {:.2} {})">{}</text>"#,
            center,
            label_y,
            center,
            label_y,
            escape(name)
        );
    }

    // Axes
    let _ = writeln!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>"#,
        margin_left,
        baseline,
        right,
        baseline
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>"#,
        margin_left,
        margin_top,
        margin_left,
        baseline
    );

    // Y axis label (rotated)
    let _ = writeln!(
        svg,
        r#"<text x="18" y="{}" text-anchor="middle" class="axis-label" transform="rotate(-90 18 {})">{}</text>"#,
        f64::from(height) / 2.0,
        f64::from(height) / 2.0,
        escape(&config.y_label)
    );

    svg.push_str("</svg>\n");
    svg
}

/// Top of the value axis: `configured`, raised to fit any larger value.
pub(crate) fn y_axis_max(bars: &[(String, f64)], configured: f64) -> f64 {
    let largest = bars.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let max = configured.max(largest);
    if max > 0.0 { max } else { 1.0 }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Standard color palette.
pub mod colors {
    /// Red, used for the `avg` bar.
    pub const RED: &str = "#e74c3c";
    /// Blue, used for per-corruption bars.
    pub const BLUE: &str = "#3498db";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars() -> Vec<(String, f64)> {
        vec![
            ("natural".to_string(), 93.25),
            ("gaussian_noise".to_string(), 41.0),
            ("avg".to_string(), 67.125),
        ]
    }

    #[test]
    fn test_generate_bar_svg_basic() {
        let svg = generate_bar_svg(&bars(), &BarChartConfig::new("model / avg=67.13"));
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("</svg>"));
        assert!(svg.contains("model / avg=67.13"));
        assert!(svg.contains("gaussian_noise"));
        assert!(svg.contains("93.25"));
        assert!(svg.contains(colors::RED));
        assert_eq!(svg.matches("<rect x=").count(), 3);
    }

    #[test]
    fn test_tiny_dimensions() {
        let config = BarChartConfig::new("tiny").with_dimensions(40, 100);
        let svg = generate_bar_svg(&bars(), &config);
        assert!(svg.contains("</svg>"));
        assert!(svg.contains(r#"viewBox="0 0 40 100""#));
    }

    #[test]
    fn test_empty_bars() {
        assert!(generate_bar_svg(&[], &BarChartConfig::default()).is_empty());
    }

    #[test]
    fn test_title_is_escaped() {
        let svg = generate_bar_svg(&bars(), &BarChartConfig::new("a<b & c"));
        assert!(svg.contains("a&lt;b &amp; c"));
    }

    #[test]
    fn test_y_axis_grows_past_configured_max() {
        let bars = vec![("x".to_string(), 150.0)];
        assert_eq!(y_axis_max(&bars, 100.0), 150.0);
        assert_eq!(y_axis_max(&[], 0.0), 1.0);
    }
}
