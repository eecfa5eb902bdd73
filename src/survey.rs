//! Surveyed reference points, keyed by full identifier and by numeric suffix.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::CoreError;

const ID_COLUMNS: [&str; 5] = ["FID", "点号", "点位", "ID", "Point_ID"];
const X_COLUMNS: [&str; 5] = ["X", "x", "X坐标", "East", "E"];
const Y_COLUMNS: [&str; 5] = ["Y", "y", "Y坐标", "North", "N"];
const Z_COLUMNS: [&str; 6] = ["Z", "z", "Z坐标", "Height", "H", "Elevation"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyPoint {
    pub id: String,
    pub numeric_suffix: Option<String>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A numeric suffix shared by several full identifiers. The last loaded point
/// owns the suffix key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuffixCollision {
    pub suffix: String,
    pub replaced_id: String,
    pub winning_id: String,
}

#[derive(Debug, Default)]
pub struct SurveyIndex {
    by_id: HashMap<String, SurveyPoint>,
    by_suffix: HashMap<String, SurveyPoint>,
    collisions: Vec<SuffixCollision>,
}

impl SurveyIndex {
    pub fn from_points(points: impl IntoIterator<Item = SurveyPoint>) -> Self {
        let mut index = Self::default();
        for point in points {
            index.insert(point);
        }
        index
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(CoreError::SurveyNotFound {
                path: path.to_path_buf(),
            });
        }

        let file = std::fs::File::open(path).map_err(|err| CoreError::InvalidSurveyData {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let index = Self::from_reader(file, path)?;
        info!(
            path = %path.display(),
            points = index.len(),
            suffix_collisions = index.collisions.len(),
            "loaded survey points"
        );
        Ok(index)
    }

    pub fn from_reader<R: Read>(reader: R, source: &Path) -> Result<Self, CoreError> {
        let invalid = |reason: String| CoreError::InvalidSurveyData {
            path: source.to_path_buf(),
            reason,
        };

        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|err| invalid(format!("unreadable header row: {err}")))?
            .iter()
            .map(|name| name.trim_start_matches('\u{feff}').to_string())
            .collect::<Vec<String>>();

        let columns = [
            ("FID", resolve_column(&headers, &ID_COLUMNS)),
            ("X", resolve_column(&headers, &X_COLUMNS)),
            ("Y", resolve_column(&headers, &Y_COLUMNS)),
            ("Z", resolve_column(&headers, &Z_COLUMNS)),
        ];
        let missing = columns
            .iter()
            .filter(|(_, index)| index.is_none())
            .map(|(name, _)| *name)
            .collect::<Vec<&str>>();
        if !missing.is_empty() {
            return Err(invalid(format!(
                "missing required columns {missing:?}; available columns {headers:?}"
            )));
        }
        let [id_col, x_col, y_col, z_col] = columns.map(|(_, index)| index.unwrap_or_default());

        let mut points = Vec::new();
        for (row_number, record) in csv_reader.records().enumerate() {
            let line = row_number + 2;
            let record = record.map_err(|err| invalid(format!("row {line}: {err}")))?;

            let id = record.get(id_col).unwrap_or_default().trim().to_string();
            if id.is_empty() {
                warn!(row = line, "skipping survey row without point id");
                continue;
            }

            let coordinate = |column: usize, axis: &str| -> Result<f64, CoreError> {
                let raw = record.get(column).unwrap_or_default();
                raw.parse::<f64>()
                    .map_err(|_| invalid(format!("row {line}: point {id} has non-numeric {axis} value {raw:?}")))
            };

            points.push(SurveyPoint {
                numeric_suffix: numeric_suffix(&id),
                x: coordinate(x_col, "X")?,
                y: coordinate(y_col, "Y")?,
                z: coordinate(z_col, "Z")?,
                id,
            });
        }

        Ok(Self::from_points(points))
    }

    fn insert(&mut self, point: SurveyPoint) {
        if let Some(suffix) = &point.numeric_suffix {
            if let Some(previous) = self.by_suffix.insert(suffix.clone(), point.clone()) {
                if previous.id != point.id {
                    warn!(
                        suffix = %suffix,
                        replaced = %previous.id,
                        winner = %point.id,
                        "numeric suffix shared by several survey points"
                    );
                    self.collisions.push(SuffixCollision {
                        suffix: suffix.clone(),
                        replaced_id: previous.id,
                        winning_id: point.id.clone(),
                    });
                }
            }
        }
        self.by_id.insert(point.id.clone(), point);
    }

    /// Full identifiers take precedence over numeric-suffix aliases.
    pub fn lookup(&self, id: &str) -> Option<&SurveyPoint> {
        self.by_id.get(id).or_else(|| self.by_suffix.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn collisions(&self) -> &[SuffixCollision] {
        &self.collisions
    }
}

fn resolve_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|candidate| headers.iter().position(|header| header == candidate))
}

fn numeric_suffix(id: &str) -> Option<String> {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"\d+").expect("static digit-run regex"));
    pattern.find(id).map(|found| found.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn index_from_csv(raw: &str) -> Result<SurveyIndex, CoreError> {
        SurveyIndex::from_reader(raw.as_bytes(), Path::new("points.csv"))
    }

    #[test]
    fn lookup_by_full_id_and_numeric_suffix() {
        let index = index_from_csv("FID,X,Y,Z\nXQ15,100.0,200.0,-350.5\nXQ16,110,210,-351\n")
            .expect("survey table should load");

        assert_eq!(index.len(), 2);
        let by_id = index.lookup("XQ15").expect("full id should resolve");
        assert_eq!((by_id.x, by_id.y, by_id.z), (100.0, 200.0, -350.5));
        let by_suffix = index.lookup("16").expect("numeric suffix should resolve");
        assert_eq!(by_suffix.id, "XQ16");
        assert!(index.lookup("XQ99").is_none());
    }

    #[test]
    fn accepts_chinese_and_english_column_synonyms() {
        let index = index_from_csv("点号,East,North,Elevation\nD7,1,2,3\n")
            .expect("synonym columns should resolve");
        let point = index.lookup("7").expect("suffix lookup");
        assert_eq!(point.id, "D7");
        assert_eq!((point.x, point.y, point.z), (1.0, 2.0, 3.0));
    }

    #[test]
    fn primary_column_wins_over_synonyms() {
        let index = index_from_csv("ID,FID,X,Y,Z\nalias-1,P1,1,2,3\n").expect("table loads");
        assert!(index.lookup("P1").is_some());
        assert!(index.lookup("alias-1").is_none());
    }

    #[test]
    fn missing_required_column_is_invalid() {
        let error = index_from_csv("FID,X,Y\nP1,1,2\n").expect_err("Z column is missing");
        match error {
            CoreError::InvalidSurveyData { reason, .. } => {
                assert!(reason.contains("\"Z\""), "unexpected reason: {reason}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_numeric_coordinate_is_invalid() {
        let error = index_from_csv("FID,X,Y,Z\nP1,1,north,3\n").expect_err("Y is not a number");
        assert!(matches!(error, CoreError::InvalidSurveyData { .. }));
    }

    #[test]
    fn suffix_collision_is_last_write_wins_and_recorded() {
        let index = index_from_csv("FID,X,Y,Z\nXQ15,1,1,1\nDX15,2,2,2\n").expect("table loads");
        assert_eq!(index.lookup("15").map(|point| point.id.as_str()), Some("DX15"));
        assert_eq!(
            index.collisions(),
            &[SuffixCollision {
                suffix: "15".to_string(),
                replaced_id: "XQ15".to_string(),
                winning_id: "DX15".to_string(),
            }]
        );
    }

    #[test]
    fn full_id_shadows_suffix_alias() {
        let index = index_from_csv("FID,X,Y,Z\n15,1,1,1\nXQ15,2,2,2\n").expect("table loads");
        assert_eq!(index.lookup("15").map(|point| point.x), Some(1.0));
    }

    #[test]
    fn numeric_suffix_takes_first_digit_run() {
        assert_eq!(numeric_suffix("XQ15-2"), Some("15".to_string()));
        assert_eq!(numeric_suffix("ABC"), None);
    }

    #[test]
    fn load_reports_missing_file_and_reads_bom_headers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.csv");
        assert!(matches!(
            SurveyIndex::load(&missing),
            Err(CoreError::SurveyNotFound { .. })
        ));

        let path = dir.path().join("points.csv");
        let mut file = std::fs::File::create(&path).expect("create csv");
        file.write_all("\u{feff}FID,X,Y,Z\nA1,0,0,100\n".as_bytes())
            .expect("write csv");
        drop(file);

        let index = SurveyIndex::load(&path).expect("bom-prefixed table loads");
        assert!(index.lookup("A1").is_some());
    }
}
