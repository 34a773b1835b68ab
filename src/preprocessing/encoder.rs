//! Schema-locked one-hot encoding

use super::schema::FeatureSchema;
use crate::data::RawProfile;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayViewMut1};
use rayon::prelude::*;

/// Encodes raw profiles into the column layout of one fitted schema.
///
/// A categorical value outside the fitted vocabulary leaves every indicator
/// of its field at zero. Batch output row `i` is exactly `encode(&rows[i])`.
#[derive(Debug, Clone, Copy)]
pub struct Encoder<'s> {
    schema: &'s FeatureSchema,
}

impl<'s> Encoder<'s> {
    pub fn new(schema: &'s FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'s FeatureSchema {
        self.schema
    }

    /// Encode a single (imputed) profile
    pub fn encode(&self, profile: &RawProfile) -> Result<Array1<f64>> {
        let mut out = Array1::zeros(self.schema.width());
        self.encode_into(profile, out.view_mut())?;
        Ok(out)
    }

    /// Encode a batch of (imputed) profiles, one row per profile
    pub fn encode_batch(&self, rows: &[RawProfile]) -> Result<Array2<f64>> {
        let width = self.schema.width();
        let encoded: Vec<Array1<f64>> = rows
            .par_iter()
            .map(|profile| self.encode(profile))
            .collect::<Result<_>>()?;

        let flat: Vec<f64> = encoded.iter().flat_map(|row| row.iter().copied()).collect();
        Ok(Array2::from_shape_vec((rows.len(), width), flat)?)
    }

    /// Categorical `(field, value)` pairs of `profile` that the schema has never seen
    pub fn unseen_categories(&self, profile: &RawProfile) -> Vec<(String, String)> {
        self.schema
            .categorical_fields()
            .iter()
            .filter_map(|field| {
                let value = profile.get(&field.name)?.as_category()?;
                match field.index_of(&value) {
                    Some(_) => None,
                    None => Some((field.name.clone(), value.into_owned())),
                }
            })
            .collect()
    }

    fn encode_into(&self, profile: &RawProfile, mut out: ArrayViewMut1<f64>) -> Result<()> {
        for (col, name) in self.schema.numeric_fields().iter().enumerate() {
            let value = profile.get(name).ok_or_else(|| PipelineError::SchemaMismatch {
                missing: vec![name.clone()],
            })?;
            if value.is_missing() {
                return Err(PipelineError::InvalidInput(format!(
                    "numeric field '{}' has no value; impute before encoding",
                    name
                )));
            }
            out[col] = value.as_number().ok_or_else(|| {
                PipelineError::InvalidInput(format!(
                    "numeric field '{}' holds a non-numeric value {:?}",
                    name, value
                ))
            })?;
        }

        for field in self.schema.categorical_fields() {
            let value = profile.get(&field.name).ok_or_else(|| PipelineError::SchemaMismatch {
                missing: vec![field.name.clone()],
            })?;
            if let Some(idx) = value.as_category().and_then(|v| field.index_of(&v)) {
                out[field.offset + idx] = 1.0;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::FieldSpec;

    fn fitted() -> FeatureSchema {
        let spec = FieldSpec::new(["age"], ["benefits", "work_interfere"]);
        let rows = vec![
            RawProfile::new()
                .with_number("age", 30.0)
                .with_text("benefits", "Yes")
                .with_text("work_interfere", "Often"),
            RawProfile::new()
                .with_number("age", 45.0)
                .with_text("benefits", "No")
                .with_text("work_interfere", "Never"),
            RawProfile::new()
                .with_number("age", 22.0)
                .with_text("benefits", "Don't know")
                .with_text("work_interfere", "Sometimes"),
        ];
        FeatureSchema::fit(&spec, &rows).unwrap()
    }

    #[test]
    fn test_one_hot_layout() {
        let schema = fitted();
        let encoder = Encoder::new(&schema);
        let profile = RawProfile::new()
            .with_number("age", 30.0)
            .with_text("benefits", "No")
            .with_text("work_interfere", "Often");

        let v = encoder.encode(&profile).unwrap();
        // age | Don't know, No, Yes | Never, Often, Sometimes
        assert_eq!(v.to_vec(), vec![30.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unseen_category_encodes_to_zero() {
        let schema = fitted();
        let encoder = Encoder::new(&schema);
        let profile = RawProfile::new()
            .with_number("age", 30.0)
            .with_text("benefits", "Yes")
            .with_text("work_interfere", "Unicorn");

        let v = encoder.encode(&profile).unwrap();
        let cols = schema.columns_of("work_interfere").unwrap();
        assert!(v.slice(ndarray::s![cols]).iter().all(|&x| x == 0.0));
        assert_eq!(
            encoder.unseen_categories(&profile),
            vec![("work_interfere".to_string(), "Unicorn".to_string())]
        );
    }

    #[test]
    fn test_batch_matches_single() {
        let schema = fitted();
        let encoder = Encoder::new(&schema);
        let rows = vec![
            RawProfile::new()
                .with_number("age", 19.0)
                .with_text("benefits", "Yes")
                .with_text("work_interfere", "Rarely"),
            RawProfile::new()
                .with_number("age", 64.0)
                .with_text("benefits", "Don't know")
                .with_text("work_interfere", "Never"),
        ];

        let batch = encoder.encode_batch(&rows).unwrap();
        assert_eq!(batch.ncols(), schema.width());
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(batch.row(i).to_vec(), encoder.encode(row).unwrap().to_vec());
        }
    }

    #[test]
    fn test_missing_field_is_schema_mismatch() {
        let schema = fitted();
        let encoder = Encoder::new(&schema);
        let profile = RawProfile::new()
            .with_number("age", 30.0)
            .with_text("benefits", "Yes");
        assert!(matches!(
            encoder.encode(&profile),
            Err(PipelineError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_non_numeric_age_rejected() {
        let schema = fitted();
        let encoder = Encoder::new(&schema);
        let profile = RawProfile::new()
            .with_text("age", "thirty")
            .with_text("benefits", "Yes")
            .with_text("work_interfere", "Often");
        assert!(matches!(encoder.encode(&profile), Err(PipelineError::InvalidInput(_))));
    }
}
