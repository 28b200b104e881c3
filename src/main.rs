use envelope::{
    cli, elliptic_envelope::EllipticEnvelope, parse, plot::render_contour_plot, report,
};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Info)
        .parse_env(env_logger::Env::default().filter_or("ENVELOPE_LOG", "info"))
        .init();

    let input_path = cli::parse_args()?;

    let records = parse::parse(&input_path)?;
    let features = parse::to_feature_matrix(&records)?;
    log::info!(
        "loaded {} population pairs ({} features each)",
        features.nrows(),
        features.ncols()
    );

    const CONTAMINATION: f64 = 0.025;
    const SEED: u64 = 42;

    let mut envelope = EllipticEnvelope::new(CONTAMINATION, SEED);
    envelope.fit(&features)?;

    let labels = envelope.predict(&features);
    let outlier_count = labels.iter().filter(|&&label| label < 0.0).count();
    log::info!("flagged {outlier_count} of {} pairs as outliers", labels.len());

    report::write_labels(Path::new("outliers.txt"), &labels)?;
    report::write_outlier_pairs(Path::new("outlier_pop_list.txt"), &records, &labels)?;

    render_contour_plot(&features, &labels, &envelope, Path::new("outliers.png"))?;

    Ok(())
}
