use crate::domain::model::{
    ChainParameters, EulerZyx, Matrix4, ParsedTransform, RigidTransform, Translation, EULER_MARKER,
    SCALE_MARKER,
};
use crate::utils::error::{ChainError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

/// 一個 record 檔的所有列，保留原始順序（空白行也是一列）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    rows: Vec<Vec<String>>,
    source: Option<PathBuf>,
}

impl RecordTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ChainError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!("Reading record file: {}", path.display());
        let file = std::fs::File::open(path)?;
        let mut table = Self::from_reader(file)?;
        table.source = Some(path.to_path_buf());
        Ok(table)
    }

    /// One row per physical line, no header, fields kept untrimmed.
    ///
    /// The csv reader drops empty lines, so lines are split here and each non-empty
    /// line is handed to it separately; an empty line becomes an empty row.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;

        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(false).flexible(true);

        let mut rows = Vec::new();
        let mut record = csv::StringRecord::new();
        for line in content.lines() {
            if line.is_empty() {
                rows.push(Vec::new());
                continue;
            }

            let mut csv_reader = builder.from_reader(line.as_bytes());
            if csv_reader.read_record(&mut record)? {
                rows.push(record.iter().map(str::to_string).collect());
            } else {
                rows.push(Vec::new());
            }
        }

        Ok(Self { rows, source: None })
    }

    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows, source: None }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// 來源檔案路徑，記憶體中建立的表格為 None
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

fn first_field(row: &[String]) -> Option<&str> {
    row.first().map(String::as_str)
}

/// Parses the first `count` fields of `row` as floats.
fn parse_floats(row: &[String], count: usize, key: &str) -> Result<Vec<f64>> {
    if row.len() < count {
        return Err(ChainError::malformed(
            key,
            format!("expected at least {} values, found {}", count, row.len()),
        ));
    }

    row[..count]
        .iter()
        .map(|field| {
            field.trim().parse::<f64>().map_err(|_| {
                ChainError::malformed(key, format!("'{}' is not a number", field))
            })
        })
        .collect()
}

fn parse_matrix(rows: &[Vec<String>], key_index: usize, key: &str) -> Result<Matrix4> {
    let mut matrix = [[0.0; 4]; 4];
    for (offset, target) in matrix.iter_mut().enumerate() {
        let row = rows.get(key_index + 1 + offset).ok_or_else(|| {
            ChainError::malformed(key, format!("matrix row {} is missing", offset))
        })?;
        let values = parse_floats(row, 4, key)?;
        target.copy_from_slice(&values);
    }
    Ok(matrix)
}

fn parse_euler(rows: &[Vec<String>], marker_index: usize, key: &str) -> Result<EulerZyx> {
    let context = format!("{}/{}", key, EULER_MARKER);
    let row = rows
        .get(marker_index + 1)
        .ok_or_else(|| ChainError::malformed(&context, "angle row is missing"))?;
    let values = parse_floats(row, 3, &context)?;
    Ok(EulerZyx::new(values[0], values[1], values[2]))
}

/// Single forward pass over `rows`.
///
/// Marker fields are compared exactly; only numeric fields are trimmed before parsing.
///
/// The first row whose first field equals `key` starts a 4x4 matrix on the next four rows;
/// later rows with the same key are ignored. The first `euler_angles_zyx` marker supplies
/// the angle triple on its following row and ends the scan, so a key appearing after the
/// marker is never seen. Without a matrix the translation is zero.
pub fn parse_transform(rows: &[Vec<String>], key: &str) -> Result<ParsedTransform> {
    let mut matrix: Option<Matrix4> = None;
    let mut euler_zyx = None;

    for (index, row) in rows.iter().enumerate() {
        match first_field(row) {
            Some(field) if field == key && matrix.is_none() => {
                matrix = Some(parse_matrix(rows, index, key)?);
            }
            Some(EULER_MARKER) => {
                euler_zyx = Some(parse_euler(rows, index, key)?);
                break;
            }
            _ => {}
        }
    }

    let translation = matrix
        .as_ref()
        .map(Translation::from_matrix)
        .unwrap_or(Translation::ZERO);

    if matrix.is_none() {
        tracing::warn!("⚠️ Transform '{}' not found, using zero translation", key);
    }

    Ok(ParsedTransform {
        key: key.to_string(),
        matrix,
        translation,
        euler_zyx,
    })
}

/// 取 `scale` 標記列的下一列第一個欄位
pub fn extract_scale(rows: &[Vec<String>]) -> Result<f64> {
    let marker_index = rows
        .iter()
        .position(|row| first_field(row) == Some(SCALE_MARKER))
        .ok_or_else(|| ChainError::missing(SCALE_MARKER))?;

    rows.get(marker_index + 1)
        .and_then(|row| first_field(row))
        .and_then(|field| field.trim().parse::<f64>().ok())
        .ok_or_else(|| ChainError::missing(SCALE_MARKER))
}

/// Record keys and tables the chain parameters are read from.
#[derive(Debug, Clone, Copy)]
pub struct RecordSources<'a> {
    pub global: &'a RecordTable,
    pub global_key: &'a str,
    pub fine: &'a RecordTable,
    pub fine_key: &'a str,
    pub scale: &'a RecordTable,
}

fn resolve_rigid(table: &RecordTable, key: &str) -> Result<RigidTransform> {
    parse_transform(table.rows(), key)
        .and_then(ParsedTransform::into_rigid)
        .map_err(|e| e.in_file(table.source()))
}

impl ChainParameters {
    pub fn resolve(sources: RecordSources<'_>) -> Result<Self> {
        let scale_source = sources.scale.source();
        let scale = extract_scale(sources.scale.rows()).map_err(|e| e.in_file(scale_source))?;
        if !scale.is_finite() || scale < 0.0 {
            return Err(ChainError::malformed(
                SCALE_MARKER,
                format!("scale must be a non-negative number, got {}", scale),
            )
            .in_file(scale_source));
        }

        let global = resolve_rigid(sources.global, sources.global_key)?;
        let fine = resolve_rigid(sources.fine, sources.fine_key)?;

        tracing::debug!(
            "Resolved parameters: scale={}, global={:?}, fine={:?}",
            scale,
            global,
            fine
        );

        Ok(Self {
            scale,
            global,
            fine,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|row| row.iter().map(|field| field.to_string()).collect())
            .collect()
    }

    const GLOBAL_CSV: &str = "\
result_T_m2_m1
0.5,-0.8,0.1,1.0
0.8,0.5,0.2,2.0
-0.1,0.3,0.9,3.0
0,0,0,1
scale
2.5
euler_angles_zyx
10.0,20.0,30.0
";

    #[test]
    fn test_parse_transform_reads_translation_column() {
        let table = RecordTable::from_reader(GLOBAL_CSV.as_bytes()).unwrap();
        let parsed = parse_transform(table.rows(), "result_T_m2_m1").unwrap();

        assert_eq!(parsed.translation, Translation::new(1.0, 2.0, 3.0));
        assert_eq!(parsed.euler_zyx, Some(EulerZyx::new(10.0, 20.0, 30.0)));
        assert_eq!(parsed.matrix.unwrap()[3], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(parsed.rotation_block().unwrap()[0], [0.5, -0.8, 0.1]);
    }

    #[test]
    fn test_parse_transform_missing_key_defaults_to_zero() {
        let table = rows(&[&["scale"], &["1.0"], &["euler_angles_zyx"], &["1", "2", "3"]]);
        let parsed = parse_transform(&table, "icp_result.transformation").unwrap();

        assert_eq!(parsed.matrix, None);
        assert_eq!(parsed.translation, Translation::ZERO);
        assert_eq!(parsed.euler_zyx, Some(EulerZyx::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_parse_transform_without_euler_marker() {
        let table = rows(&[
            &["icp_result.transformation"],
            &["1", "0", "0", "0.1"],
            &["0", "1", "0", "0.2"],
            &["0", "0", "1", "0.3"],
            &["0", "0", "0", "1"],
        ]);
        let parsed = parse_transform(&table, "icp_result.transformation").unwrap();

        assert_eq!(parsed.translation, Translation::new(0.1, 0.2, 0.3));
        assert_eq!(parsed.euler_zyx, None);
    }

    #[test]
    fn test_parse_transform_first_match_wins() {
        let table = rows(&[
            &["key"],
            &["1", "0", "0", "7"],
            &["0", "1", "0", "8"],
            &["0", "0", "1", "9"],
            &["0", "0", "0", "1"],
            &["key"],
            &["1", "0", "0", "70"],
            &["0", "1", "0", "80"],
            &["0", "0", "1", "90"],
            &["0", "0", "0", "1"],
        ]);
        let parsed = parse_transform(&table, "key").unwrap();
        assert_eq!(parsed.translation, Translation::new(7.0, 8.0, 9.0));
    }

    #[test]
    fn test_parse_transform_stops_at_euler_marker() {
        let table = rows(&[
            &["euler_angles_zyx"],
            &["5", "6", "7"],
            &["euler_angles_zyx"],
            &["50", "60", "70"],
            &["key"],
            &["1", "0", "0", "7"],
            &["0", "1", "0", "8"],
            &["0", "0", "1", "9"],
            &["0", "0", "0", "1"],
        ]);
        let parsed = parse_transform(&table, "key").unwrap();

        assert_eq!(parsed.euler_zyx, Some(EulerZyx::new(5.0, 6.0, 7.0)));
        assert_eq!(parsed.translation, Translation::ZERO);
    }

    #[test]
    fn test_parse_transform_extra_fields_are_ignored() {
        let table = rows(&[
            &["key", "note"],
            &["1", "0", "0", "4", "extra"],
            &["0", "1", "0", "5"],
            &["0", "0", "1", "6"],
            &["0", "0", "0", "1"],
            &["euler_angles_zyx"],
            &["1", "2", "3", "4"],
        ]);
        let parsed = parse_transform(&table, "key").unwrap();

        assert_eq!(parsed.translation, Translation::new(4.0, 5.0, 6.0));
        assert_eq!(parsed.euler_zyx, Some(EulerZyx::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_parse_transform_truncated_matrix() {
        let table = rows(&[&["key"], &["1", "0", "0", "4"], &["0", "1", "0", "5"]]);
        let result = parse_transform(&table, "key");
        assert!(matches!(result, Err(ChainError::MalformedRecord { .. })));
    }

    #[test]
    fn test_parse_transform_short_or_non_numeric_matrix_row() {
        let short = rows(&[
            &["key"],
            &["1", "0", "0"],
            &["0", "1", "0", "5"],
            &["0", "0", "1", "6"],
            &["0", "0", "0", "1"],
        ]);
        assert!(matches!(
            parse_transform(&short, "key"),
            Err(ChainError::MalformedRecord { .. })
        ));

        let non_numeric = rows(&[
            &["key"],
            &["1", "0", "0", "x"],
            &["0", "1", "0", "5"],
            &["0", "0", "1", "6"],
            &["0", "0", "0", "1"],
        ]);
        match parse_transform(&non_numeric, "key") {
            Err(ChainError::MalformedRecord { key, reason, .. }) => {
                assert_eq!(key, "key");
                assert!(reason.contains("'x'"));
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_transform_bad_euler_row() {
        let short = rows(&[&["euler_angles_zyx"], &["1", "2"]]);
        assert!(matches!(
            parse_transform(&short, "key"),
            Err(ChainError::MalformedRecord { .. })
        ));

        let dangling = rows(&[&["euler_angles_zyx"]]);
        assert!(matches!(
            parse_transform(&dangling, "key"),
            Err(ChainError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_extract_scale() {
        let table = rows(&[&["scale"], &["2.5"]]);
        assert_eq!(extract_scale(&table).unwrap(), 2.5);

        let table = RecordTable::from_reader(GLOBAL_CSV.as_bytes()).unwrap();
        assert_eq!(extract_scale(table.rows()).unwrap(), 2.5);
    }

    #[test]
    fn test_extract_scale_missing_marker() {
        let table = rows(&[&["euler_angles_zyx"], &["1", "2", "3"]]);
        match extract_scale(&table) {
            Err(ChainError::MissingField { field, .. }) => assert_eq!(field, "scale"),
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_scale_missing_or_bad_value() {
        assert!(matches!(
            extract_scale(&rows(&[&["scale"]])),
            Err(ChainError::MissingField { .. })
        ));
        assert!(matches!(
            extract_scale(&rows(&[&["scale"], &["big"]])),
            Err(ChainError::MissingField { .. })
        ));
    }

    #[test]
    fn test_from_reader_keeps_raw_fields_and_order() {
        let table = RecordTable::from_reader(" scale \n 0.75 , ignored\n".as_bytes()).unwrap();
        assert_eq!(
            table.rows(),
            rows(&[&[" scale "], &[" 0.75 ", " ignored"]]).as_slice()
        );
    }

    #[test]
    fn test_from_reader_keeps_blank_lines() {
        let table = RecordTable::from_reader("scale\n\n2.5\n".as_bytes()).unwrap();
        assert_eq!(table.rows(), rows(&[&["scale"], &[], &["2.5"]]).as_slice());

        let table = RecordTable::from_reader("scale\r\n\r\n2.5\r\n".as_bytes()).unwrap();
        assert_eq!(table.rows(), rows(&[&["scale"], &[], &["2.5"]]).as_slice());
    }

    #[test]
    fn test_blank_line_after_scale_marker() {
        let table = RecordTable::from_reader("scale\n\n2.5\n".as_bytes()).unwrap();
        match extract_scale(table.rows()) {
            Err(ChainError::MissingField { field, .. }) => assert_eq!(field, "scale"),
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_line_inside_matrix() {
        let table =
            RecordTable::from_reader("key\n1,0,0,7\n\n0,1,0,8\n0,0,1,9\n0,0,0,1\n".as_bytes())
                .unwrap();
        assert!(matches!(
            parse_transform(table.rows(), "key"),
            Err(ChainError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_padded_marker_does_not_match() {
        let table = RecordTable::from_reader(
            " key \n1,0,0,7\n0,1,0,8\n0,0,1,9\n0,0,0,1\n".as_bytes(),
        )
        .unwrap();
        let parsed = parse_transform(table.rows(), "key").unwrap();

        assert_eq!(parsed.matrix, None);
        assert_eq!(parsed.translation, Translation::ZERO);
    }

    #[test]
    fn test_padded_numbers_still_parse() {
        let table = RecordTable::from_reader("scale\n 0.75 \n".as_bytes()).unwrap();
        assert_eq!(extract_scale(table.rows()).unwrap(), 0.75);

        let table = RecordTable::from_reader(
            "key\n1, 0, 0, 7 \n0,1,0,8\n0,0,1,9\n0,0,0,1\neuler_angles_zyx\n 1 , 2 , 3 \n"
                .as_bytes(),
        )
        .unwrap();
        let parsed = parse_transform(table.rows(), "key").unwrap();
        assert_eq!(parsed.translation, Translation::new(7.0, 8.0, 9.0));
        assert_eq!(parsed.euler_zyx, Some(EulerZyx::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_euler_error_names_transform_key() {
        let table = rows(&[&["euler_angles_zyx"], &["1", "x", "3"]]);
        match parse_transform(&table, "icp_result.transformation") {
            Err(ChainError::MalformedRecord { key, .. }) => {
                assert_eq!(key, "icp_result.transformation/euler_angles_zyx");
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_from_path_missing_file() {
        let result = RecordTable::from_path("/definitely/not/here/global_reg_result.csv");
        assert!(matches!(result, Err(ChainError::FileNotFound { .. })));
    }

    #[test]
    fn test_from_path_reads_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(GLOBAL_CSV.as_bytes()).unwrap();

        let table = RecordTable::from_path(temp_file.path()).unwrap();
        assert_eq!(table.rows().len(), 9);
    }

    #[test]
    fn test_resolve_parameters() {
        let global = RecordTable::from_reader(GLOBAL_CSV.as_bytes()).unwrap();
        let fine = RecordTable::from_rows(rows(&[
            &["icp_result.transformation"],
            &["1", "0", "0", "0.1"],
            &["0", "1", "0", "0.2"],
            &["0", "0", "1", "0.3"],
            &["0", "0", "0", "1"],
            &["euler_angles_zyx"],
            &["1", "2", "3"],
        ]));

        let params = ChainParameters::resolve(RecordSources {
            global: &global,
            global_key: "result_T_m2_m1",
            fine: &fine,
            fine_key: "icp_result.transformation",
            scale: &global,
        })
        .unwrap();

        assert_eq!(params.scale, 2.5);
        assert_eq!(params.global.translation, Translation::new(1.0, 2.0, 3.0));
        assert_eq!(params.global.rotation.rx, 30.0);
        assert_eq!(params.fine.rotation.rz, 1.0);
    }

    #[test]
    fn test_resolve_rejects_negative_scale() {
        let table = RecordTable::from_rows(rows(&[
            &["scale"],
            &["-1.0"],
            &["euler_angles_zyx"],
            &["0", "0", "0"],
        ]));

        let result = ChainParameters::resolve(RecordSources {
            global: &table,
            global_key: "result_T_m2_m1",
            fine: &table,
            fine_key: "icp_result.transformation",
            scale: &table,
        });
        assert!(matches!(result, Err(ChainError::MalformedRecord { .. })));
    }

    #[test]
    fn test_resolve_errors_name_the_record_file() {
        let mut scale_file = NamedTempFile::new().unwrap();
        scale_file
            .write_all(b"scale\n-1.0\neuler_angles_zyx\n0,0,0\n")
            .unwrap();
        let table = RecordTable::from_path(scale_file.path()).unwrap();

        let result = ChainParameters::resolve(RecordSources {
            global: &table,
            global_key: "result_T_m2_m1",
            fine: &table,
            fine_key: "icp_result.transformation",
            scale: &table,
        });
        match result {
            Err(ChainError::MalformedRecord { key, file, .. }) => {
                assert_eq!(key, "scale");
                assert_eq!(file.as_deref(), Some(scale_file.path()));
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }

        let mut fine_file = NamedTempFile::new().unwrap();
        fine_file
            .write_all(b"icp_result.transformation\n1,0,0,0\n0,1,0,0\n0,0,1,0\n0,0,0,1\n")
            .unwrap();
        let fine = RecordTable::from_path(fine_file.path()).unwrap();
        let global = RecordTable::from_reader(GLOBAL_CSV.as_bytes()).unwrap();

        let result = ChainParameters::resolve(RecordSources {
            global: &global,
            global_key: "result_T_m2_m1",
            fine: &fine,
            fine_key: "icp_result.transformation",
            scale: &global,
        });
        match result {
            Err(ChainError::MissingField { field, file }) => {
                assert!(field.contains("icp_result.transformation"));
                assert_eq!(file.as_deref(), Some(fine_file.path()));
            }
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_requires_euler_angles() {
        let table = RecordTable::from_rows(rows(&[&["scale"], &["1.0"]]));

        let result = ChainParameters::resolve(RecordSources {
            global: &table,
            global_key: "result_T_m2_m1",
            fine: &table,
            fine_key: "icp_result.transformation",
            scale: &table,
        });
        assert!(matches!(result, Err(ChainError::MissingField { .. })));
    }
}
