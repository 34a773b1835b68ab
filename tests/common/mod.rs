//! Shared survey fixtures for integration tests

#![allow(dead_code)]

use polars::prelude::*;
use treatment_classifier::config::PipelineConfig;
use treatment_classifier::data::SurveyDataset;
use treatment_classifier::training::ForestConfig;

const GENDER: [&str; 4] = ["Homem", "Mulher", "Trans", "Não-binário"];
const YES_NO_DK: [&str; 3] = ["Yes", "No", "Don't know"];
const YES_NO_NS: [&str; 3] = ["Yes", "No", "Not sure"];
const LEAVE: [&str; 5] = ["Somewhat easy", "Very easy", "Don't know", "Somewhat difficult", "Very difficult"];

/// Survey frame with `n_yes` treated respondents followed by `n_no` untreated ones.
///
/// `family_history` and `work_interfere` carry most of the signal; every
/// eleventh `work_interfere` answer is missing.
pub fn create_survey_frame(n_yes: usize, n_no: usize) -> DataFrame {
    let n = n_yes + n_no;
    let mut age = Vec::with_capacity(n);
    let mut gender_group = Vec::with_capacity(n);
    let mut family_history = Vec::with_capacity(n);
    let mut benefits = Vec::with_capacity(n);
    let mut care_options = Vec::with_capacity(n);
    let mut anonymity = Vec::with_capacity(n);
    let mut leave = Vec::with_capacity(n);
    let mut work_interfere: Vec<Option<&str>> = Vec::with_capacity(n);
    let mut treatment = Vec::with_capacity(n);

    for i in 0..n {
        let treated = i < n_yes;
        age.push(18.0 + ((i * 7) % 50) as f64);
        gender_group.push(GENDER[i % 4]);
        family_history.push(if treated == (i % 5 != 0) { "Yes" } else { "No" });
        benefits.push(YES_NO_DK[i % 3]);
        care_options.push(YES_NO_NS[(i / 2) % 3]);
        anonymity.push(YES_NO_DK[(i / 3) % 3]);
        leave.push(LEAVE[i % 5]);
        work_interfere.push(if i % 11 == 0 {
            None
        } else if treated {
            Some(["Often", "Sometimes", "Rarely"][i % 3])
        } else {
            Some(["Never", "Rarely"][i % 2])
        });
        treatment.push(if treated { "Yes" } else { "No" });
    }

    df!(
        "age" => age,
        "gender_group" => gender_group,
        "family_history" => family_history,
        "benefits" => benefits,
        "care_options" => care_options,
        "anonymity" => anonymity,
        "leave" => leave,
        "work_interfere" => work_interfere,
        "treatment" => treatment
    )
    .unwrap()
}

pub fn create_survey_dataset(n_yes: usize, n_no: usize) -> SurveyDataset {
    SurveyDataset::from_frame(&create_survey_frame(n_yes, n_no), &PipelineConfig::default()).unwrap()
}

/// Default configuration with a smaller forest to keep tests quick
pub fn fast_config() -> PipelineConfig {
    PipelineConfig::default().with_forest(ForestConfig::new().with_n_estimators(25))
}
