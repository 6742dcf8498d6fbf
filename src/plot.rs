use crate::DynError;
use plotters::prelude::PathElement;
use plotters::prelude::*;

pub use plotters::prelude::{RGBColor, BLACK, BLUE, CYAN, GREEN, MAGENTA, RED};

const PLOT_FONT_SCALE: f64 = 1.2;

pub const LEVEL_COLORS: [RGBColor; 6] = [BLUE, RED, GREEN, MAGENTA, CYAN, BLACK];

fn scaled_font_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

fn scaled_area_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

// Dark blue for the floor through green to bright red at the peak.
fn heat_color(value: f64) -> HSLColor {
    let v = value.clamp(0.0, 1.0);
    HSLColor(0.66 * (1.0 - v), 1.0, 0.1 + 0.45 * v.sqrt())
}

/// Render a row-major (height, width) map, row 0 on top.
pub fn plot_sky_image(
    data: &[f64],
    width: usize,
    height: usize,
    title: &str,
    filename: &str,
) -> Result<(), DynError> {
    if data.len() != width * height {
        return Err(format!(
            "Image has {} pixels, expected {}x{}",
            data.len(),
            height,
            width
        )
        .into());
    }
    if data.is_empty() {
        return Err("No pixels to plot".into());
    }

    let (min_val, max_val) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = if max_val > min_val { max_val - min_val } else { 1.0 };

    let root = BitMapBackend::new(filename, (900, 900)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", scaled_font_size(24)).into_font())
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(50))
        .build_cartesian_2d(0..width as i32, 0..height as i32)?;

    chart
        .configure_mesh()
        .x_desc("pixel (east)")
        .y_desc("pixel (north)")
        .label_style(("sans-serif", scaled_font_size(16)).into_font())
        .axis_desc_style(("sans-serif", scaled_font_size(20)).into_font())
        .disable_mesh()
        .draw()?;

    chart.draw_series((0..height).flat_map(|row| {
        (0..width).map(move |col| {
            let value = (data[row * width + col] - min_val) / span;
            let y = (height - 1 - row) as i32;
            let x = col as i32;
            Rectangle::new([(x, y), (x + 1, y + 1)], heat_color(value).filled())
        })
    }))?;

    root.present()?;
    Ok(())
}

pub fn plot_multi_series_f64_x(
    x_vals: &[f64],
    series: &[(&[f64], &RGBColor, &str)],
    title: &str,
    filename: &str,
    x_label: &str,
    y_label: &str,
) -> Result<(), DynError> {
    if series.is_empty() {
        return Err("No series provided to plot".into());
    }
    for (data_series, _, _) in series.iter() {
        if data_series.len() != x_vals.len() {
            return Err("X-value vector length does not match data length".into());
        }
    }
    if x_vals.is_empty() {
        return Err("No data points to plot".into());
    }

    let root = BitMapBackend::new(filename, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_min = x_vals.iter().cloned().fold(f64::INFINITY, f64::min);
    let mut x_max = x_vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if x_max <= x_min {
        x_max = x_min + 1.0;
    }

    let mut min_val = f64::INFINITY;
    let mut max_val = f64::NEG_INFINITY;
    for (data_series, _, _) in series.iter() {
        min_val = min_val.min(data_series.iter().cloned().fold(f64::INFINITY, f64::min));
        max_val = max_val.max(data_series.iter().cloned().fold(f64::NEG_INFINITY, f64::max));
    }
    if max_val <= min_val {
        max_val = min_val + 1.0;
    }

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", scaled_font_size(24)).into_font())
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(60))
        .build_cartesian_2d(x_min..x_max, min_val..max_val)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .label_style(("sans-serif", scaled_font_size(20)).into_font())
        .axis_desc_style(("sans-serif", scaled_font_size(24)).into_font())
        .light_line_style(WHITE.mix(0.0))
        .draw()?;

    for (data_series, color, label) in series.iter() {
        chart
            .draw_series(LineSeries::new(
                x_vals.iter().zip(data_series.iter()).map(|(x, y)| (*x, *y)),
                *color,
            ))?
            .label(*label)
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], *color));
    }

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", scaled_font_size(20)).into_font())
        .draw()?;

    root.present()?;
    Ok(())
}
