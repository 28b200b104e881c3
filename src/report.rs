use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::parse::PairRecord;

/// Write one label per line, `1` for inliers and `-1` for outliers, in
/// input row order.
pub fn write_labels(file_path: &Path, labels: &[f64]) -> Result<(), Box<dyn Error>> {
    let mut writer = BufWriter::new(File::create(file_path)?);

    for &label in labels {
        #[allow(clippy::cast_possible_truncation)]
        writeln!(writer, "{}", label as i64)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the population identifiers of every pair labeled as an outlier,
/// after an `into from` header line.
pub fn write_outlier_pairs(
    file_path: &Path,
    records: &[PairRecord],
    labels: &[f64],
) -> Result<(), Box<dyn Error>> {
    assert_eq!(
        records.len(),
        labels.len(),
        "every record must have a label"
    );

    let mut writer = BufWriter::new(File::create(file_path)?);

    writeln!(writer, "into from")?;
    for (record, &label) in records.iter().zip(labels) {
        if label < 0.0 {
            writeln!(
                writer,
                "{} {}",
                record.into_population, record.from_population
            )?;
        }
    }

    writer.flush()?;
    Ok(())
}
