//! Human-annotated entity counts per document, and the optional manual
//! verification of placed coordinates per run.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const REQUIRED_COLUMNS: [&str; 3] = [
    "document_filename",
    "true_total_entities_count",
    "true_entities_with_location_count",
];

const VERIFICATION_COLUMNS: [&str; 4] = [
    "document_filename",
    "model_name",
    "repetition_round",
    "manually_verified_correct_coordinates_count",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub document_filename: String,
    pub true_total_entities_count: usize,
    pub true_entities_with_location_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundTruthStatistics {
    pub total_documents: usize,
    pub total_entities: usize,
    pub total_entities_with_location: usize,
    pub avg_entities_per_doc: f64,
    pub location_coverage_rate: f64,
}

#[derive(Debug, Default)]
pub struct GroundTruthTable {
    records: HashMap<String, GroundTruthRecord>,
}

impl GroundTruthTable {
    /// A missing file yields an empty table so extraction-only metrics can
    /// still be scored.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "ground-truth table not found; recall metrics will be empty");
            return Ok(Self::default());
        }

        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open ground-truth table {}", path.display()))?;
        let table = Self::from_reader(file)
            .with_context(|| format!("failed to load ground-truth table {}", path.display()))?;
        info!(path = %path.display(), documents = table.len(), "loaded ground-truth annotations");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = header_names(&mut csv_reader)?;
        let [document_col, total_col, location_col] = match column_positions(&headers, REQUIRED_COLUMNS) {
            Ok(columns) => columns,
            Err(missing) => bail!("missing required columns {missing:?}; available columns {headers:?}"),
        };

        let mut table = Self::default();
        for (row_number, record) in csv_reader.records().enumerate() {
            let line = row_number + 2;
            let record = record.with_context(|| format!("row {line} is unreadable"))?;

            let document = record.get(document_col).unwrap_or_default().to_string();
            let count = |column: usize, name: &str| -> Result<i64> {
                let raw = record.get(column).unwrap_or_default();
                raw.parse::<i64>()
                    .with_context(|| format!("row {line}: {name} is not an integer: {raw:?}"))
            };
            let total = count(total_col, REQUIRED_COLUMNS[1])?;
            let with_location = count(location_col, REQUIRED_COLUMNS[2])?;

            if total < 0 || with_location < 0 {
                warn!(document = %document, total, with_location, "skipping annotation with negative counts");
                continue;
            }
            let (total, mut with_location) = (total as usize, with_location as usize);
            if with_location > total {
                warn!(
                    document = %document,
                    total,
                    with_location,
                    "location-bearing count exceeds total; clamping"
                );
                with_location = total;
            }

            table.records.insert(
                document.clone(),
                GroundTruthRecord {
                    document_filename: document,
                    true_total_entities_count: total,
                    true_entities_with_location_count: with_location,
                },
            );
        }

        Ok(table)
    }

    pub fn get(&self, document_filename: &str) -> Option<&GroundTruthRecord> {
        self.records.get(document_filename)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn statistics(&self) -> GroundTruthStatistics {
        let total_documents = self.records.len();
        let total_entities = self
            .records
            .values()
            .map(|record| record.true_total_entities_count)
            .sum::<usize>();
        let total_entities_with_location = self
            .records
            .values()
            .map(|record| record.true_entities_with_location_count)
            .sum::<usize>();

        let ratio = |numerator: usize, denominator: usize| {
            if denominator == 0 {
                0.0
            } else {
                numerator as f64 / denominator as f64
            }
        };

        GroundTruthStatistics {
            total_documents,
            total_entities,
            total_entities_with_location,
            avg_entities_per_doc: ratio(total_entities, total_documents),
            location_coverage_rate: ratio(total_entities_with_location, total_entities),
        }
    }

    /// Annotation problems worth flagging before scoring. Location counts
    /// above the total never reach the table; they are clamped on load.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.records.is_empty() {
            problems.push("no ground-truth annotations loaded".to_string());
        }
        let mut documents = self.records.keys().collect::<Vec<_>>();
        documents.sort();
        for document in documents {
            if self.records[document].true_total_entities_count == 0 {
                problems.push(format!("document {document} is annotated with zero entities"));
            }
        }
        problems
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub document_filename: String,
    pub model_name: String,
    pub repetition_round: u32,
    pub manually_verified_correct_coordinates_count: usize,
}

/// Manually verified coordinate counts, keyed by document.
#[derive(Debug, Default)]
pub struct VerificationTable {
    records: HashMap<String, Vec<VerificationRecord>>,
}

impl VerificationTable {
    /// The table is optional: a missing file, missing columns or bad rows
    /// are logged and leave the table (or the row) out.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no coordinate verification table");
            return Ok(Self::default());
        }

        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open verification table {}", path.display()))?;
        let table = Self::from_reader(file)
            .with_context(|| format!("failed to load verification table {}", path.display()))?;
        info!(path = %path.display(), documents = table.len(), "loaded coordinate verifications");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = header_names(&mut csv_reader)?;
        let [document_col, model_col, round_col, verified_col] =
            match column_positions(&headers, VERIFICATION_COLUMNS) {
                Ok(columns) => columns,
                Err(missing) => {
                    warn!(?missing, "verification table lacks required columns; ignoring it");
                    return Ok(Self::default());
                }
            };

        let mut table = Self::default();
        for (row_number, record) in csv_reader.records().enumerate() {
            let line = row_number + 2;
            let record = record.with_context(|| format!("row {line} is unreadable"))?;
            let field = |column: usize| record.get(column).unwrap_or_default();

            let (Ok(repetition_round), Ok(verified)) =
                (field(round_col).parse::<u32>(), field(verified_col).parse::<usize>())
            else {
                warn!(line, "skipping verification row with non-integer counts");
                continue;
            };

            let document = field(document_col).to_string();
            table
                .records
                .entry(document.clone())
                .or_default()
                .push(VerificationRecord {
                    document_filename: document,
                    model_name: field(model_col).to_string(),
                    repetition_round,
                    manually_verified_correct_coordinates_count: verified,
                });
        }

        Ok(table)
    }

    /// Verifications of a document, narrowed to a model and round when given.
    pub fn get(
        &self,
        document_filename: &str,
        model_name: Option<&str>,
        repetition_round: Option<u32>,
    ) -> Vec<&VerificationRecord> {
        self.records
            .get(document_filename)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| model_name.is_none_or(|model| record.model_name == model))
                    .filter(|record| repetition_round.is_none_or(|round| record.repetition_round == round))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

fn header_names<R: Read>(csv_reader: &mut csv::Reader<R>) -> Result<Vec<String>> {
    Ok(csv_reader
        .headers()
        .context("unreadable header row")?
        .iter()
        .map(|name| name.trim_start_matches('\u{feff}').to_string())
        .collect())
}

fn column_positions<const N: usize>(
    headers: &[String],
    names: [&'static str; N],
) -> Result<[usize; N], Vec<&'static str>> {
    let mut columns = [0_usize; N];
    let mut missing = Vec::new();
    for (slot, name) in columns.iter_mut().zip(names) {
        match headers.iter().position(|header| header == name) {
            Some(position) => *slot = position,
            None => missing.push(name),
        }
    }
    if missing.is_empty() {
        Ok(columns)
    } else {
        Err(missing)
    }
}
