use ndarray::{Array1, Array2};
use plotters::prelude::*;
use std::error::Error;
use std::path::Path;

use crate::elliptic_envelope::EllipticEnvelope;
use crate::parse::FEATURE_DIMENSIONS;
use crate::stats::calc_percentile;

const GRID_RESOLUTION: usize = 15;
const CONTOUR_LEVELS: usize = 7;
const DISTANCE_PADDING: f64 = 100.0;
const RATE_PADDING: f64 = 1.0;

/// Render the fitted decision function as filled contour bands with the
/// data scattered on top and the predicted outliers circled.
pub fn render_contour_plot(
    features: &Array2<f64>,
    labels: &[f64],
    envelope: &EllipticEnvelope,
    output_path: &Path,
) -> Result<(), Box<dyn Error>> {
    assert_eq!(
        features.nrows(),
        labels.len(),
        "every feature row must have a label"
    );

    let decisions = envelope.decision_function(features);
    let threshold = calc_percentile(&decisions, 100.0 * envelope.contamination());
    log::info!("decision function threshold: {threshold:.6}");

    let (x_min, x_max) = padded_column_range(features, 0, DISTANCE_PADDING);
    let (y_min, y_max) = padded_column_range(features, 1, RATE_PADDING);

    let x_grid = Array1::linspace(x_min, x_max, GRID_RESOLUTION);
    let y_grid = Array1::linspace(y_min, y_max, GRID_RESOLUTION);

    // decision values over the full mesh
    let mut mesh = Array2::zeros((GRID_RESOLUTION * GRID_RESOLUTION, FEATURE_DIMENSIONS));
    for (i, &y) in y_grid.iter().enumerate() {
        for (j, &x) in x_grid.iter().enumerate() {
            mesh[(i * GRID_RESOLUTION + j, 0)] = x;
            mesh[(i * GRID_RESOLUTION + j, 1)] = y;
        }
    }
    let mesh_decisions = envelope.decision_function(&mesh);
    let mesh_minimum = mesh_decisions
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Outlier Decision Function Contours", ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("distance (km)")
        .y_desc("-ln(mean)")
        .draw()?;

    // fill every grid cell that sits below the threshold, darkest where
    // the decision function is lowest
    let band_width = (threshold - mesh_minimum) / (CONTOUR_LEVELS - 1) as f64;
    if band_width > 0.0 {
        for i in 0..GRID_RESOLUTION - 1 {
            for j in 0..GRID_RESOLUTION - 1 {
                let cell_decision = (mesh_decisions[i * GRID_RESOLUTION + j]
                    + mesh_decisions[i * GRID_RESOLUTION + j + 1]
                    + mesh_decisions[(i + 1) * GRID_RESOLUTION + j]
                    + mesh_decisions[(i + 1) * GRID_RESOLUTION + j + 1])
                    / 4.0;
                if cell_decision >= threshold {
                    continue;
                }

                #[allow(clippy::cast_possible_truncation)]
                #[allow(clippy::cast_sign_loss)]
                let band = (((cell_decision - mesh_minimum) / band_width).floor() as usize)
                    .min(CONTOUR_LEVELS - 2);
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(x_grid[j], y_grid[i]), (x_grid[j + 1], y_grid[i + 1])],
                    band_color(band).filled(),
                )))?;
            }
        }
    }

    let points: Vec<(f64, f64)> = (0..features.nrows())
        .map(|row| (features[(row, 0)], features[(row, 1)]))
        .collect();

    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 2, GREEN.filled())),
    )?;

    let outliers: Vec<(f64, f64)> = points
        .iter()
        .zip(labels)
        .filter(|(_, &label)| label < 0.0)
        .map(|(&point, _)| point)
        .collect();

    chart
        .draw_series(
            outliers
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 8, RED.stroke_width(2))),
        )?
        .label("predicted outliers")
        .legend(|(x, y)| Circle::new((x + 10, y), 5, RED.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn padded_column_range(features: &Array2<f64>, column: usize, padding: f64) -> (f64, f64) {
    let minimum = features
        .column(column)
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let maximum = features
        .column(column)
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    (minimum - padding, maximum + padding)
}

// reversed blues: the most anomalous band is the darkest
fn band_color(band: usize) -> RGBColor {
    const DARKEST: (f64, f64, f64) = (8.0, 48.0, 107.0);
    const LIGHTEST: (f64, f64, f64) = (222.0, 235.0, 247.0);

    let fraction = band as f64 / (CONTOUR_LEVELS - 2) as f64;

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    let channel = |dark: f64, light: f64| (dark + (light - dark) * fraction).round() as u8;

    RGBColor(
        channel(DARKEST.0, LIGHTEST.0),
        channel(DARKEST.1, LIGHTEST.1),
        channel(DARKEST.2, LIGHTEST.2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn renders_a_png() {
        let features = array![
            [5.0, -(0.5_f64.ln())],
            [5.0, -(0.5_f64.ln())],
            [500.0, -(0.001_f64.ln())],
        ];
        let mut envelope = EllipticEnvelope::new(0.025, 42);
        envelope.fit(&features).unwrap();
        let labels = envelope.predict(&features);

        let directory = tempfile::tempdir().unwrap();
        let output_path = directory.path().join("outliers.png");
        render_contour_plot(&features, &labels, &envelope, &output_path).unwrap();

        let metadata = std::fs::metadata(&output_path).unwrap();
        assert!(metadata.len() > 0);
    }

    #[test]
    fn pads_the_feature_ranges() {
        let features = array![[5.0, 0.5], [500.0, 7.0]];

        let (x_min, x_max) = padded_column_range(&features, 0, 100.0);
        let (y_min, y_max) = padded_column_range(&features, 1, 1.0);

        assert!((x_min + 95.0).abs() < 1e-12);
        assert!((x_max - 600.0).abs() < 1e-12);
        assert!((y_min + 0.5).abs() < 1e-12);
        assert!((y_max - 8.0).abs() < 1e-12);
    }
}
