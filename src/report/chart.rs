use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};
use log::debug;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::collections::BTreeMap;
use std::path::Path;

use crate::report::format::millions_tick;
use crate::report::throughput::{ThroughputRow, distinct_threads};
use crate::report::{ReportConfig, ReportError};

/// Encoded image files, not yet written
#[derive(Debug)]
pub struct RenderedReport {
    pub png: Vec<u8>,
    pub pdf: Vec<u8>,
}

/// Renders the chart and writes the PNG and PDF named by `config`.
///
/// Both images are produced in memory first; a failing render leaves the
/// output directory untouched.
pub fn render_report(rows: &[ThroughputRow], config: &ReportConfig) -> Result<(), ReportError> {
    let rendered = render_to_memory(rows, config)?;
    write_file(&config.png_path(), &rendered.png)?;
    write_file(&config.pdf_path(), &rendered.pdf)?;
    Ok(())
}

pub fn render_to_memory(
    rows: &[ThroughputRow],
    config: &ReportConfig,
) -> Result<RenderedReport, ReportError> {
    if rows.is_empty() {
        return Err(ReportError::EmptyTable);
    }
    config.theme.check_font()?;
    let png = render_png(rows, config)?;
    let pdf = render_pdf(rows, config)?;
    debug!("rendered png ({} bytes) and pdf ({} bytes)", png.len(), pdf.len());
    Ok(RenderedReport { png, pdf })
}

fn render_png(rows: &[ThroughputRow], config: &ReportConfig) -> Result<Vec<u8>, ReportError> {
    let (width, height) = config.pixel_size();
    let mut rgb = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut rgb, (width, height)).into_drawing_area();
        draw_chart(&root, rows, config).map_err(|e| ReportError::Render(e.to_string()))?;
        root.present()
            .map_err(|e| ReportError::Render(e.to_string()))?;
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| ReportError::Render(e.to_string()))?;
    Ok(png)
}

fn render_pdf(rows: &[ThroughputRow], config: &ReportConfig) -> Result<Vec<u8>, ReportError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, config.pixel_size()).into_drawing_area();
        draw_chart(&root, rows, config).map_err(|e| ReportError::Render(e.to_string()))?;
        root.present()
            .map_err(|e| ReportError::Render(e.to_string()))?;
    }

    let mut options = svg2pdf::usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = svg2pdf::usvg::Tree::from_str(&svg, &options)
        .map_err(|e| ReportError::Pdf(e.to_string()))?;

    // The SVG canvas is sized in device pixels; the page comes out at width_in x height_in
    let mut page = svg2pdf::PageOptions::default();
    page.dpi = config.dpi as f32;
    svg2pdf::to_pdf(&tree, svg2pdf::ConversionOptions::default(), page)
        .map_err(|e| ReportError::Pdf(format!("{:?}", e)))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ReportError> {
    std::fs::write(path, bytes).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Points of each configuration ordered by thread count, keyed by label
fn series_by_configuration(rows: &[ThroughputRow]) -> BTreeMap<&str, Vec<(i64, f64)>> {
    let mut series: BTreeMap<&str, Vec<(i64, f64)>> = BTreeMap::new();
    for row in rows {
        series
            .entry(row.configuration.as_str())
            .or_default()
            .push((row.threads, row.throughput));
    }
    for points in series.values_mut() {
        points.sort_by_key(|&(threads, _)| threads);
    }
    series
}

/// Groups legend entries into rows no wider than `max_width`; every row holds
/// at least one entry
fn legend_rows(widths: &[u32], gap: u32, max_width: u32) -> Vec<Vec<usize>> {
    let mut rows: Vec<Vec<usize>> = Vec::new();
    let mut row_width = 0;
    for (i, &width) in widths.iter().enumerate() {
        match rows.last_mut() {
            Some(row) if row_width + gap + width <= max_width => {
                row.push(i);
                row_width += gap + width;
            }
            _ => {
                rows.push(vec![i]);
                row_width = width;
            }
        }
    }
    rows
}

fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    rows: &[ThroughputRow],
    config: &ReportConfig,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let theme = &config.theme;
    let px = |points: f64| config.pt_to_px(points);

    root.fill(&theme.plot_background)?;

    let threads = distinct_threads(rows);
    let (x_min, x_max) = (threads[0], threads[threads.len() - 1]);
    let x_pad = ((x_max - x_min) / 20).max(1);
    let y_max = rows
        .iter()
        .map(|r| r.throughput)
        .fold(0.0_f64, f64::max)
        * 1.1;
    let y_max = if y_max > 0.0 { y_max } else { 1.0 };

    let tick_font = (theme.font_family.as_str(), px(theme.axis_text_size()))
        .into_font()
        .color(&theme.text_color);
    let title_font = (theme.font_family.as_str(), px(theme.base_size))
        .into_font()
        .color(&theme.title_color);
    let legend_font = (theme.font_family.as_str(), px(theme.legend_text_size()))
        .into_font()
        .color(&theme.title_color)
        .pos(Pos::new(HPos::Left, VPos::Center));

    let margin = px(theme.base_size);
    let line_width = px(theme.line_width);
    let radius = px(theme.point_radius);
    let swatch = radius * 6;

    let series = series_by_configuration(rows);
    let labels: Vec<&str> = series.keys().copied().collect();
    let colors: Vec<RGBAColor> = (0..series.len())
        .map(|i| Palette99::pick(i).to_rgba())
        .collect();

    // Legend strip above the panel
    let mut entry_widths = Vec::with_capacity(series.len());
    for label in &labels {
        let (text_width, _) = root.estimate_text_size(label, &legend_font)?;
        entry_widths.push(swatch + radius * 2 + text_width);
    }
    let (root_width, _) = root.dim_in_pixel();
    let entry_gap = margin * 2;
    let layout = legend_rows(&entry_widths, entry_gap, root_width.saturating_sub(margin * 2));
    let row_height = px(theme.legend_text_size() * 2.0);
    let (legend_area, plot_area) =
        root.split_vertically(margin + row_height * layout.len() as u32);

    if let Some(background) = theme.legend_background {
        legend_area.fill(&background)?;
    }
    for (r, row) in layout.iter().enumerate() {
        let row_width: u32 =
            row.iter().map(|&i| entry_widths[i]).sum::<u32>() + entry_gap * (row.len() as u32 - 1);
        let mut x = (root_width.saturating_sub(row_width) / 2) as i32;
        let y = (margin + row_height * r as u32 + row_height / 2) as i32;
        for &i in row {
            let color = colors[i];
            legend_area.draw(
                &(EmptyElement::at((x, y))
                    + PathElement::new(
                        vec![(0, 0), (swatch as i32, 0)],
                        color.stroke_width(line_width),
                    )
                    + Circle::new((swatch as i32 / 2, 0), radius, color.filled())
                    + Text::new(
                        labels[i].to_string(),
                        ((swatch + radius * 2) as i32, 0),
                        legend_font.clone(),
                    )),
            )?;
            x += (entry_widths[i] + entry_gap) as i32;
        }
    }

    let mut chart = ChartBuilder::on(&plot_area)
        .margin(margin)
        .margin_top(0)
        .x_label_area_size(px(theme.axis_text_size() * 3.0))
        .y_label_area_size(px(theme.axis_text_size() * 4.5))
        .build_cartesian_2d(
            ((x_min - x_pad)..(x_max + x_pad)).with_key_points(threads.clone()),
            0.0..y_max,
        )?;

    chart.plotting_area().fill(&theme.panel_background)?;

    let grid_color = theme.grid_major_color;
    let grid_width = px(theme.grid_major_width);
    let x_formatter = |t: &i64| t.to_string();
    let y_formatter = |y: &f64| millions_tick(*y);
    let mut mesh = chart.configure_mesh();
    mesh.x_labels(threads.len())
        .y_labels(8)
        .x_desc("# Threads")
        .y_desc("Throughput [Melems/s]")
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .label_style(tick_font)
        .axis_desc_style(title_font)
        .bold_line_style(grid_color.stroke_width(grid_width));
    if !theme.grid_minor {
        mesh.light_line_style(TRANSPARENT);
    }
    if !theme.axis_ticks {
        mesh.set_all_tick_mark_size(0);
    }
    if !theme.panel_border {
        mesh.axis_style(TRANSPARENT);
    }
    mesh.draw()?;

    for (points, color) in series.values().zip(&colors) {
        chart.draw_series(LineSeries::new(
            points.iter().copied(),
            color.stroke_width(line_width),
        ))?;
        chart.draw_series(
            points
                .iter()
                .map(|&(t, y)| Circle::new((t, y), radius, color.filled())),
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::throughput::configuration_label;

    fn row(rs: &str, threads: i64, throughput: f64) -> ThroughputRow {
        ThroughputRow {
            name: "X".into(),
            rs: rs.into(),
            tm: "Sequential".into(),
            batch_size: 1,
            threads,
            duration: 10.0,
            exp_time_in_sec: 1.0,
            iterations: throughput as i64,
            throughput,
            configuration: configuration_label("X", rs, "Sequential", 1),
        }
    }

    #[test]
    fn test_series_grouped_and_ordered_by_threads() {
        let rows = vec![
            row("Socket", 8, 3.0),
            row("One", 4, 2.0),
            row("One", 1, 1.0),
            row("Socket", 2, 4.0),
        ];
        let series = series_by_configuration(&rows);
        let labels: Vec<&str> = series.keys().copied().collect();
        assert_eq!(
            labels,
            vec![
                "Bench=X RS=One TM=Sequential BS=1",
                "Bench=X RS=Socket TM=Sequential BS=1"
            ]
        );
        assert_eq!(
            series["Bench=X RS=One TM=Sequential BS=1"],
            vec![(1, 1.0), (4, 2.0)]
        );
        assert_eq!(
            series["Bench=X RS=Socket TM=Sequential BS=1"],
            vec![(2, 4.0), (8, 3.0)]
        );
    }

    #[test]
    fn test_empty_table_is_not_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::default().with_output_dir(dir.path());
        let err = render_report(&[], &config).unwrap_err();
        assert!(matches!(err, ReportError::EmptyTable));
        assert!(!config.png_path().exists());
        assert!(!config.pdf_path().exists());
    }

    fn fonts_missing(config: &ReportConfig) -> bool {
        match config.theme.check_font() {
            Ok(()) => false,
            Err(e) => {
                eprintln!("skipping render test: {}", e);
                true
            }
        }
    }

    fn png_dimensions(png: &[u8]) -> (u32, u32) {
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(&png[12..16], b"IHDR");
        let be = |b: &[u8]| u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        (be(&png[16..20]), be(&png[20..24]))
    }

    fn pdf_media_box(pdf: &[u8]) -> Vec<f64> {
        let text = String::from_utf8_lossy(pdf);
        let start = text.find("/MediaBox").unwrap();
        let open = start + text[start..].find('[').unwrap();
        let close = open + text[open..].find(']').unwrap();
        text[open + 1..close]
            .split_whitespace()
            .map(|n| n.parse().unwrap())
            .collect()
    }

    #[test]
    fn test_legend_rows_wrap() {
        assert_eq!(legend_rows(&[40, 40, 40], 10, 100), vec![vec![0, 1], vec![2]]);
        assert_eq!(legend_rows(&[40, 40, 40], 10, 200), vec![vec![0, 1, 2]]);
        // an entry wider than the strip still gets its own row
        assert_eq!(legend_rows(&[300, 20], 10, 100), vec![vec![0], vec![1]]);
        assert!(legend_rows(&[], 10, 100).is_empty());
    }

    #[test]
    fn test_rendered_sizes() {
        let config = ReportConfig::default();
        if fonts_missing(&config) {
            return;
        }
        let rows = vec![
            row("One", 1, 1_000_000.0),
            row("One", 2, 1_900_000.0),
            row("Socket", 1, 1_200_000.0),
            row("Socket", 2, 2_500_000.0),
        ];

        let rendered = render_to_memory(&rows, &config).unwrap();
        assert_eq!(png_dimensions(&rendered.png), (3600, 1500));

        assert!(rendered.pdf.starts_with(b"%PDF"));
        let media_box = pdf_media_box(&rendered.pdf);
        assert_eq!(media_box.len(), 4);
        assert!((media_box[2] - media_box[0] - 864.0).abs() < 0.5);
        assert!((media_box[3] - media_box[1] - 360.0).abs() < 0.5);
    }

    #[test]
    fn test_degenerate_tables_render() {
        let config = ReportConfig::default();
        if fonts_missing(&config) {
            return;
        }
        let single = vec![row("One", 4, 4.0)];
        let flat = vec![row("One", 1, 0.0), row("One", 2, 0.0)];
        let wide = vec![row("One", 1, 10.0), row("L1", 1_000_000, 20.0)];
        for rows in [single, flat, wide] {
            let rendered = render_to_memory(&rows, &config).unwrap();
            assert_eq!(png_dimensions(&rendered.png), (3600, 1500));
        }
    }
}
