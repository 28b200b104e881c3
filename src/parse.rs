use csv::ReaderBuilder;
use ndarray::Array2;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const FEATURE_DIMENSIONS: usize = 2;

const FIELDS_PER_ROW: usize = 6;

#[derive(Debug, Clone)]
pub struct PairRecord {
    pub into_population: String,
    pub from_population: String,
    pub n: f64,
    pub mean: f64,
    pub stdev: f64,
    pub km: f64,
}

pub fn parse(file_path: &Path) -> Result<Vec<PairRecord>, Box<dyn Error>> {
    let file = File::open(file_path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut records = Vec::new();

    for (index, result) in reader.records().enumerate() {
        // the header occupies the first line of the file
        let line = index + 2;

        let row = result?;
        if row.len() < FIELDS_PER_ROW {
            return Err(format!(
                "line {line}: expected {FIELDS_PER_ROW} tab-separated fields, found {}",
                row.len()
            )
            .into());
        }

        records.push(PairRecord {
            into_population: row[0].to_string(),
            from_population: row[1].to_string(),
            n: parse_field(&row, 2, "n", line)?,
            mean: parse_field(&row, 3, "mean", line)?,
            stdev: parse_field(&row, 4, "stdev", line)?,
            km: parse_field(&row, 5, "km", line)?,
        });
    }

    Ok(records)
}

fn parse_field(
    row: &csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<f64, Box<dyn Error>> {
    let field = &row[index];
    field
        .parse()
        .map_err(|_| format!("line {line}: {name} value {field:?} is not numeric").into())
}

/// Stack the km column and the negated log of the mean column into the
/// matrix the envelope is fitted on, one row per population pair.
pub fn to_feature_matrix(records: &[PairRecord]) -> Result<Array2<f64>, Box<dyn Error>> {
    let mut features = Array2::zeros((records.len(), FEATURE_DIMENSIONS));

    for (i, record) in records.iter().enumerate() {
        if record.mean <= 0.0 {
            return Err(format!(
                "mean of pair {} -> {} is {} but must be positive to take its log",
                record.into_population, record.from_population, record.mean
            )
            .into());
        }

        features[(i, 0)] = record.km;
        features[(i, 1)] = -record.mean.ln();
    }

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_input(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn parses_rows_in_order() {
        let file = write_input(
            "into\tfrom\tn\tmean\tstdev\tkm\n\
             A\tB\t10\t0.5\t0.1\t5\n\
             A\tD\t10\t0.001\t0.1\t500\n",
        );

        let records = parse(file.path()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].into_population, "A");
        assert_eq!(records[0].from_population, "B");
        assert!((records[0].mean - 0.5).abs() < 1e-12);
        assert!((records[0].km - 5.0).abs() < 1e-12);
        assert_eq!(records[1].from_population, "D");
        assert!((records[1].km - 500.0).abs() < 1e-12);
    }

    #[test]
    fn ignores_extra_trailing_fields() {
        let file = write_input(
            "into\tfrom\tn\tmean\tstdev\tkm\textra\n\
             A\tB\t10\t0.5\t0.1\t5\tignored\n",
        );

        let records = parse(file.path()).unwrap();

        assert_eq!(records.len(), 1);
        assert!((records[0].km - 5.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_short_rows() {
        let file = write_input(
            "into\tfrom\tn\tmean\tstdev\tkm\n\
             A\tB\t10\t0.5\n",
        );

        let error = parse(file.path()).unwrap_err().to_string();

        assert!(error.contains("line 2"), "unexpected error: {error}");
    }

    #[test]
    fn rejects_non_numeric_fields() {
        let file = write_input(
            "into\tfrom\tn\tmean\tstdev\tkm\n\
             A\tB\t10\tnot-a-number\t0.1\t5\n",
        );

        let error = parse(file.path()).unwrap_err().to_string();

        assert!(error.contains("mean"), "unexpected error: {error}");
    }

    #[test]
    fn builds_feature_matrix() {
        let file = write_input(
            "into\tfrom\tn\tmean\tstdev\tkm\n\
             A\tB\t10\t0.5\t0.1\t5\n\
             A\tD\t10\t0.001\t0.1\t500\n",
        );
        let records = parse(file.path()).unwrap();

        let features = to_feature_matrix(&records).unwrap();

        assert_eq!(features.nrows(), 2);
        assert_eq!(features.ncols(), FEATURE_DIMENSIONS);
        assert!((features[(0, 0)] - 5.0).abs() < 1e-12);
        assert!((features[(0, 1)] - 0.5_f64.ln().abs()).abs() < 1e-12);
        assert!((features[(1, 1)] - 0.001_f64.ln().abs()).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_positive_means() {
        let records = vec![PairRecord {
            into_population: "A".to_string(),
            from_population: "B".to_string(),
            n: 10.0,
            mean: 0.0,
            stdev: 0.1,
            km: 5.0,
        }];

        assert!(to_feature_matrix(&records).is_err());
    }
}
