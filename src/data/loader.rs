//! Survey CSV loading and column normalization

use super::{SurveyDataset, MISSING_MARKERS};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::info;

const MALE_ANSWERS: &[&str] = &[
    "m",
    "male",
    "cis male",
    "cis man",
    "man",
    "male (cis)",
    "male-ish",
    "maile",
    "mal",
    "msle",
    "malr",
    "mail",
    "make",
    "guy (-ish) ^_^",
    "ostensibly male, unsure what that really means",
    "something kinda male?",
    "male leaning androgynous",
];

const FEMALE_ANSWERS: &[&str] = &[
    "f",
    "female",
    "woman",
    "cis female",
    "cis-female/femme",
    "femail",
    "femake",
    "female (cis)",
];

/// Collapse a free-text gender answer into the dashboard's four groups
pub fn simplify_gender(answer: Option<&str>) -> &'static str {
    let Some(answer) = answer else {
        return "Não-binário";
    };
    let answer = answer.trim().to_lowercase();

    if answer.contains("trans") {
        "Trans"
    } else if MALE_ANSWERS.contains(&answer.as_str()) {
        "Homem"
    } else if FEMALE_ANSWERS.contains(&answer.as_str()) {
        "Mulher"
    } else {
        "Não-binário"
    }
}

/// `" Work Interfere "` -> `"work_interfere"`
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn missing_markers() -> NullValues {
    NullValues::AllColumns(
        MISSING_MARKERS
            .iter()
            .copied()
            .filter(|marker| !marker.is_empty())
            .map(PlSmallStr::from_static)
            .collect(),
    )
}

/// Loader for the raw survey export
#[derive(Debug, Clone)]
pub struct SurveyLoader {
    infer_schema_length: usize,
}

impl Default for SurveyLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SurveyLoader {
    pub fn new() -> Self {
        Self { infer_schema_length: 100 }
    }

    /// Set how many rows polars inspects to infer column types
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Load a CSV file; cells holding a missing marker such as `NA` read as null
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let file = File::open(path.as_ref())
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.as_ref().display(), e)))?;

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .map_parse_options(|opts| opts.with_null_values(Some(missing_markers())))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PipelineError::DataError(e.to_string()))
    }

    /// Normalize column names and derive `gender_group` from `gender` when absent
    pub fn normalize(&self, df: &DataFrame) -> Result<DataFrame> {
        let columns: Vec<Column> = df
            .get_columns()
            .iter()
            .map(|col| {
                let mut series = col.as_materialized_series().clone();
                series.rename(normalize_column_name(col.name().as_str()).into());
                series.into()
            })
            .collect();
        let mut out = DataFrame::new(columns)?;

        let has_group = out.get_column_names().iter().any(|n| n.as_str() == "gender_group");
        if !has_group {
            if let Ok(gender) = out.column("gender") {
                let gender = gender.as_materialized_series().cast(&DataType::String)?;
                let groups: Vec<&str> = gender.str()?.into_iter().map(simplify_gender).collect();
                out.with_column(Series::new("gender_group".into(), groups))?;
            }
        }

        Ok(out)
    }

    /// Load, normalize and prepare the labelled dataset in one step
    pub fn load_dataset(&self, path: impl AsRef<Path>, config: &PipelineConfig) -> Result<SurveyDataset> {
        let start = Instant::now();
        let raw = self.load_csv(path.as_ref())?;
        let df = self.normalize(&raw)?;
        let dataset = SurveyDataset::from_frame(&df, config)?;

        info!(
            path = %path.as_ref().display(),
            source_rows = raw.height(),
            rows = dataset.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Survey loaded"
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_simplify_gender() {
        assert_eq!(simplify_gender(Some(" Male ")), "Homem");
        assert_eq!(simplify_gender(Some("cis-female/femme")), "Mulher");
        assert_eq!(simplify_gender(Some("Trans woman")), "Trans");
        assert_eq!(simplify_gender(Some("fluid")), "Não-binário");
        assert_eq!(simplify_gender(None), "Não-binário");
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name(" Work Interfere "), "work_interfere");
        assert_eq!(normalize_column_name("Age"), "age");
    }

    #[test]
    fn test_load_dataset_from_csv() {
        let mut file = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "Age,Gender,family_history,benefits,care_options,anonymity,leave,work_interfere,treatment").unwrap();
        writeln!(file, "37,Female,No,Yes,Not sure,Yes,Somewhat easy,Often,Yes").unwrap();
        writeln!(file, "44,M,No,Don't know,No,Don't know,Don't know,Rarely,No").unwrap();
        writeln!(file, "8,male,Yes,No,No,No,Very easy,,Yes").unwrap();
        writeln!(file, "31,Male,Yes,No,Yes,No,Somewhat difficult,,Yes").unwrap();
        file.flush().unwrap();

        let dataset = SurveyLoader::new()
            .load_dataset(file.path(), &PipelineConfig::default())
            .unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.labels(), &[1, 0, 1]);
        let first = &dataset.profiles()[0];
        assert_eq!(first.get("gender_group").and_then(|v| v.as_category()).as_deref(), Some("Mulher"));
        // blank work_interfere takes the configured default answer
        assert_eq!(
            dataset.profiles()[2].get("work_interfere").and_then(|v| v.as_category()).as_deref(),
            Some("Não sabe")
        );
    }

    #[test]
    fn test_na_cells_are_missing() {
        let mut file = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "Age,Gender,family_history,benefits,care_options,anonymity,leave,work_interfere,treatment").unwrap();
        for i in 0..12 {
            let interfere = if i % 4 == 0 { "NA" } else if i % 2 == 0 { "Often" } else { "Never" };
            let age = if i == 5 { "NA".to_string() } else { (25 + i).to_string() };
            let treatment = if i % 2 == 0 { "Yes" } else { "No" };
            writeln!(file, "{age},Male,No,NA,Yes,No,Very easy,{interfere},{treatment}").unwrap();
        }
        file.flush().unwrap();

        let config = PipelineConfig::default().without_answer_defaults();
        let loader = SurveyLoader::new();
        let frame = loader.load_csv(file.path()).unwrap();
        assert_eq!(frame.column("Age").unwrap().null_count(), 1);

        let dataset = loader.load_dataset(file.path(), &config).unwrap();
        // the NA age row fails the range filter
        assert_eq!(dataset.len(), 11);
        let first = &dataset.profiles()[0];
        assert_eq!(first.get("work_interfere"), Some(&crate::data::RawValue::Missing));
        assert_eq!(first.get("benefits"), Some(&crate::data::RawValue::Missing));

        let pipeline_config = config.with_fields(crate::preprocessing::FieldSpec::new(["age"], ["work_interfere"]));
        let mut imputer = crate::preprocessing::Imputer::default();
        imputer.fit(&pipeline_config.fields, dataset.profiles()).unwrap();
        let rows = imputer.apply_batch(dataset.profiles()).unwrap();
        let schema = crate::preprocessing::FeatureSchema::fit(&pipeline_config.fields, &rows).unwrap();
        assert_eq!(schema.vocabulary("work_interfere").unwrap(), ["Never", "Often"]);
    }
}
