use plotters::style::{FontDesc, FontFamily, FontStyle, RGBColor};

use crate::report::ReportError;

/// Presentation constants of the throughput chart
///
/// Sizes are in points and converted to pixels with the report DPI.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartTheme {
    pub base_size: f64,
    pub font_family: String,
    /// Added to `base_size` for tick labels
    pub axis_text_delta: f64,
    /// Legend text relative to `base_size`
    pub legend_text_scale: f64,
    pub title_color: RGBColor,
    pub text_color: RGBColor,
    pub panel_background: RGBColor,
    pub plot_background: RGBColor,
    pub grid_major_color: RGBColor,
    pub grid_major_width: f64,
    pub grid_minor: bool,
    pub axis_ticks: bool,
    pub panel_border: bool,
    /// `None` leaves the legend transparent
    pub legend_background: Option<RGBColor>,
    pub line_width: f64,
    pub point_radius: f64,
}

impl Default for ChartTheme {
    fn default() -> Self {
        Self::with_base_size(8.0)
    }
}

impl ChartTheme {
    pub fn with_base_size(base_size: f64) -> Self {
        let background = RGBColor(0xFF, 0xFF, 0xFF);
        Self {
            base_size,
            font_family: "DejaVu Sans".to_string(),
            axis_text_delta: 3.0,
            legend_text_scale: 0.8,
            title_color: RGBColor(0x3C, 0x3C, 0x3C),
            text_color: RGBColor(0x4D, 0x4D, 0x4D),
            panel_background: background,
            plot_background: background,
            grid_major_color: RGBColor(0xD5, 0xD5, 0xD5),
            grid_major_width: 1.0,
            grid_minor: false,
            axis_ticks: false,
            panel_border: false,
            legend_background: None,
            line_width: 1.0,
            point_radius: 2.0,
        }
    }

    pub fn axis_text_size(&self) -> f64 {
        self.base_size + self.axis_text_delta
    }

    pub fn legend_text_size(&self) -> f64 {
        self.base_size * self.legend_text_scale
    }

    /// Fails when `font_family` cannot be loaded for text layout
    pub fn check_font(&self) -> Result<(), ReportError> {
        FontDesc::new(
            FontFamily::Name(&self.font_family),
            self.base_size,
            FontStyle::Normal,
        )
        .box_size("0")
        .map(|_| ())
        .map_err(|e| ReportError::Render(format!("font '{}': {}", self.font_family, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_sizes() {
        let theme = ChartTheme::default();
        assert_eq!(theme.axis_text_size(), 11.0);
        assert!((theme.legend_text_size() - 6.4).abs() < 1e-12);
        assert_eq!(ChartTheme::with_base_size(10.0).axis_text_size(), 13.0);
    }
}
