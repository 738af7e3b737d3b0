//! Training data sets.
//!
//! Data sets are dense `samples x features` matrices loaded from CSV or
//! ESOM `.lrn` files, optionally paired with an ESOM `.cls` class file.

use crate::error::{Result, SomError};
use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, info};
use ndarray::{Array2, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// `.lrn` column type of a data column.
const LRN_DATA_COLUMN: i64 = 1;

/// A training data set with optional per-sample class labels.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    data: Array2<f64>,
    classes: Option<Vec<i64>>,
}

impl DataSet {
    /// Wraps an existing matrix.
    pub fn new(data: Array2<f64>) -> Self {
        Self {
            data,
            classes: None,
        }
    }

    /// Loads a data set, inferring the format from the file extension
    /// (`.csv` or `.lrn`). `cls` optionally names a class file.
    pub fn load<P: AsRef<Path>>(path: P, cls: Option<&Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        info!("Loading data set {}", path.display());
        let data = match ext.as_str() {
            "csv" => load_csv(File::open(path)?)?,
            "lrn" => load_lrn(BufReader::new(File::open(path)?))?,
            other => {
                return Err(SomError::Dataset(format!(
                    "unsupported file type: '{}'",
                    other
                )))
            }
        };

        let mut ds = Self::new(data);
        if let Some(cls) = cls {
            let classes = load_cls(BufReader::new(File::open(cls)?))?;
            ds = ds.with_classes(classes)?;
        }
        debug!("Loaded {} samples with {} features", ds.rows(), ds.cols());
        Ok(ds)
    }

    /// Attaches one class label per sample.
    pub fn with_classes(mut self, classes: Vec<i64>) -> Result<Self> {
        if classes.len() != self.data.nrows() {
            return Err(SomError::Dataset(format!(
                "class count {} does not match sample count {}",
                classes.len(),
                self.data.nrows()
            )));
        }
        self.classes = Some(classes);
        Ok(self)
    }

    /// Generates clustered samples.
    ///
    /// Cluster centres are drawn uniformly from `[min, max]` in every
    /// dimension. Sample `i` belongs to cluster `i % clusters` and is
    /// displaced from its centre by at most `max_offset` per dimension.
    /// The cluster index is recorded as the class label.
    pub fn clustered(
        rows: usize,
        cols: usize,
        clusters: usize,
        min: f64,
        max: f64,
        max_offset: f64,
        seed: u64,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 || clusters == 0 {
            return Err(SomError::InvalidInput(format!(
                "invalid clustered data shape: {} rows, {} cols, {} clusters",
                rows, cols, clusters
            )));
        }
        if !(min <= max) || !(max_offset >= 0.0) {
            return Err(SomError::InvalidInput(format!(
                "invalid clustered data bounds: [{}, {}], offset {}",
                min, max, max_offset
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut uniform = |lo: f64, hi: f64| lo + rng.gen::<f64>() * (hi - lo);

        let centres = Array2::from_shape_simple_fn((clusters, cols), || uniform(min, max));
        let data = Array2::from_shape_fn((rows, cols), |(i, j)| {
            centres[[i % clusters, j]] + uniform(-max_offset, max_offset)
        });
        let classes = (0..rows).map(|i| (i % clusters) as i64).collect();

        Self::new(data).with_classes(classes)
    }

    /// The sample matrix.
    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Consumes the data set, returning the sample matrix.
    pub fn into_data(self) -> Array2<f64> {
        self.data
    }

    /// Class labels, if any.
    pub fn classes(&self) -> Option<&[i64]> {
        self.classes.as_deref()
    }

    /// Number of samples.
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of features.
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Scales every column to zero mean and unit standard deviation in place.
    ///
    /// Constant columns are only centred.
    pub fn scale(&mut self) {
        let rows = self.data.nrows();
        if rows == 0 {
            return;
        }
        for mut column in self.data.axis_iter_mut(Axis(1)) {
            let mean = column.sum() / rows as f64;
            let var = if rows > 1 {
                column.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (rows - 1) as f64
            } else {
                0.0
            };
            let std = var.sqrt();
            let divisor = if std > 0.0 { std } else { 1.0 };
            column.mapv_inplace(|v| (v - mean) / divisor);
        }
    }

    /// Writes the samples as headerless CSV.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
        for row in self.data.outer_iter() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn parse_field(field: &str, line: usize, col: usize) -> Result<f64> {
    field.trim().parse().map_err(|_| {
        SomError::Dataset(format!(
            "cannot parse '{}' at line {}, column {}",
            field, line, col
        ))
    })
}

/// Reads numeric CSV records. A first record that does not parse is taken
/// as a header and skipped.
pub fn load_csv<R: std::io::Read>(reader: R) -> Result<Array2<f64>> {
    let mut rdr = ReaderBuilder::new().has_headers(false).from_reader(reader);
    let mut values = Vec::new();
    let mut width = None;
    let mut rows = 0;

    for (n, record) in rdr.records().enumerate() {
        let record = record?;
        let parsed: Result<Vec<f64>> = record
            .iter()
            .enumerate()
            .map(|(col, field)| parse_field(field, n + 1, col + 1))
            .collect();
        let row = match parsed {
            Ok(row) => row,
            Err(_) if n == 0 => {
                debug!("Skipping CSV header");
                continue;
            }
            Err(e) => return Err(e),
        };

        match width {
            Some(expected) if expected != row.len() => {
                return Err(SomError::Dataset(format!(
                    "inconsistent row width at line {}: expected {}, got {}",
                    n + 1,
                    expected,
                    row.len()
                )));
            }
            Some(_) => {}
            None => width = Some(row.len()),
        }
        values.extend(row);
        rows += 1;
    }

    let cols = width.unwrap_or(0);
    if rows == 0 || cols == 0 {
        return Err(SomError::Dataset("no data rows found".to_string()));
    }
    Array2::from_shape_vec((rows, cols), values).map_err(|e| SomError::Dataset(e.to_string()))
}

/// Reads an ESOM `.lrn` file.
///
/// Header lines start with `%`: row count, column count, column types and
/// column names. Only columns of type 1 are kept. Lines starting with `#`
/// are comments.
pub fn load_lrn<R: BufRead>(reader: R) -> Result<Array2<f64>> {
    let mut header_row = 0;
    let mut rows = 0;
    let mut column_types: Vec<i64> = Vec::new();
    let mut cols = 0;
    let mut values: Vec<f64> = Vec::new();
    let mut value_row = 0;

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = n + 1;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('%') {
            let header = header.trim();
            match header_row {
                0 => {
                    rows = header.parse().map_err(|_| {
                        SomError::Dataset(format!("data set size missing at line {}", line_no))
                    })?;
                }
                2 => {
                    for field in header.split('\t').filter(|f| !f.is_empty()) {
                        let ct: i64 = field.trim().parse().map_err(|_| {
                            SomError::Dataset(format!("invalid column type '{}' at line {}", field, line_no))
                        })?;
                        column_types.push(ct);
                    }
                    cols = column_types.iter().filter(|&&ct| ct == LRN_DATA_COLUMN).count();
                    values.reserve(rows * cols);
                }
                // column count and names are implied by the type row
                _ => {}
            }
            header_row += 1;
            continue;
        }

        if header_row < 4 {
            return Err(SomError::Dataset(format!("invalid header before line {}", line_no)));
        }
        if value_row >= rows {
            return Err(SomError::Dataset(format!("too many data rows at line {}", line_no)));
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() > column_types.len() {
            return Err(SomError::Dataset(format!("too many columns at line {}", line_no)));
        }
        for (col, (field, &ct)) in fields.iter().zip(column_types.iter()).enumerate() {
            if ct == LRN_DATA_COLUMN {
                values.push(parse_field(field, line_no, col + 1)?);
            }
        }
        if values.len() != (value_row + 1) * cols {
            return Err(SomError::Dataset(format!("missing data columns at line {}", line_no)));
        }
        value_row += 1;
    }

    if value_row != rows {
        return Err(SomError::Dataset(format!(
            "wrong number of data rows: expected {}, found {}",
            rows, value_row
        )));
    }
    if cols == 0 {
        return Err(SomError::Dataset("no data columns declared".to_string()));
    }
    Array2::from_shape_vec((rows, cols), values).map_err(|e| SomError::Dataset(e.to_string()))
}

/// Reads an ESOM `.cls` file into class labels ordered by key.
///
/// Header lines start with `%`, comments with `#`. Data lines hold a key and
/// a class separated by a tab.
pub fn load_cls<R: BufRead>(reader: R) -> Result<Vec<i64>> {
    let mut labelled: Vec<(i64, i64)> = Vec::new();

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%') {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let (key, class) = match (fields.next(), fields.next()) {
            (Some(k), Some(c)) => (k, c),
            _ => {
                return Err(SomError::Dataset(format!(
                    "expected key and class at line {}",
                    n + 1
                )))
            }
        };
        let parse = |s: &str| {
            s.parse::<i64>().map_err(|_| {
                SomError::Dataset(format!("invalid integer '{}' at line {}", s, n + 1))
            })
        };
        labelled.push((parse(key)?, parse(class)?));
    }

    labelled.sort_by_key(|&(key, _)| key);
    Ok(labelled.into_iter().map(|(_, class)| class).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_load_csv() {
        let data = load_csv(Cursor::new("1.0,2.0\n3.5,4\n")).unwrap();
        assert_eq!(data, arr2(&[[1.0, 2.0], [3.5, 4.0]]));

        let with_header = load_csv(Cursor::new("a,b\n1,2\n")).unwrap();
        assert_eq!(with_header, arr2(&[[1.0, 2.0]]));
    }

    #[test]
    fn test_load_csv_errors() {
        assert!(load_csv(Cursor::new("1,2\n3,x\n")).is_err());
        assert!(load_csv(Cursor::new("")).is_err());
        assert!(load_csv(Cursor::new("a,b\n")).is_err());
    }

    #[test]
    fn test_load_lrn() {
        let lrn = "# comment\n% 2\n% 4\n% 9\t1\t0\t1\n% Key\tA\tSkip\tB\n1\t0.5\t99\t1.5\n2\t2.5\t99\t3.5\n";
        let data = load_lrn(Cursor::new(lrn)).unwrap();
        assert_eq!(data, arr2(&[[0.5, 1.5], [2.5, 3.5]]));
    }

    #[test]
    fn test_load_lrn_row_count_mismatch() {
        let lrn = "% 3\n% 2\n% 9\t1\n% Key\tA\n1\t0.5\n2\t2.5\n";
        assert!(load_lrn(Cursor::new(lrn)).is_err());

        let headless = "1\t0.5\n";
        assert!(load_lrn(Cursor::new(headless)).is_err());
    }

    #[test]
    fn test_load_cls() {
        let cls = "% 3\n3\t2\n1\t1\n2\t1\n";
        assert_eq!(load_cls(Cursor::new(cls)).unwrap(), vec![1, 1, 2]);
        assert!(load_cls(Cursor::new("1\n")).is_err());
    }

    #[test]
    fn test_scale() {
        let mut ds = DataSet::new(arr2(&[[1.0, 5.0], [3.0, 5.0], [5.0, 5.0]]));
        ds.scale();
        let data = ds.data();
        assert!((data[[0, 0]] + 1.0).abs() < 1e-10);
        assert!(data[[1, 0]].abs() < 1e-10);
        assert!((data[[2, 0]] - 1.0).abs() < 1e-10);
        assert!(data.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_clustered() {
        let ds = DataSet::clustered(30, 4, 3, -10.0, 10.0, 0.5, 7).unwrap();
        assert_eq!((ds.rows(), ds.cols()), (30, 4));
        assert_eq!(ds.classes().unwrap()[4], 1);

        // members of a cluster stay within 2 * max_offset of each other
        let data = ds.data();
        for j in 0..4 {
            assert!((data[[0, j]] - data[[3, j]]).abs() <= 1.0);
        }

        let again = DataSet::clustered(30, 4, 3, -10.0, 10.0, 0.5, 7).unwrap();
        assert_eq!(ds, again);
        assert!(DataSet::clustered(0, 4, 3, -10.0, 10.0, 0.5, 7).is_err());
    }

    #[test]
    fn test_load_dispatch_and_csv_roundtrip() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("data.csv");
        let ds = DataSet::new(arr2(&[[1.25, -2.0], [0.0, 3.5]]));
        ds.write_csv(&csv_path).unwrap();

        let cls_path = dir.path().join("data.cls");
        std::fs::write(&cls_path, "% 2\n1\t0\n2\t1\n").unwrap();

        let loaded = DataSet::load(&csv_path, Some(cls_path.as_path())).unwrap();
        assert_eq!(loaded.data(), ds.data());
        assert_eq!(loaded.classes(), Some(&[0, 1][..]));

        let txt = dir.path().join("data.txt");
        std::fs::write(&txt, "1,2\n").unwrap();
        assert!(DataSet::load(&txt, None).is_err());
    }
}
