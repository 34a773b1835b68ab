//! Answer lists offered by the prediction form.
//!
//! The survey stores English answers; the form may present Portuguese labels,
//! which [`to_dataset_answer`] maps back. Values outside these lists are still
//! accepted by the encoder, they just carry no signal.

use super::{RawProfile, RawValue};

const YES_NO: &[&str] = &["No", "Yes"];
const YES_NO_DONT_KNOW: &[&str] = &["No", "Yes", "Don't know"];
const YES_NO_NOT_SURE: &[&str] = &["No", "Yes", "Not sure"];
const LEAVE: &[&str] = &[
    "Somewhat easy",
    "Very easy",
    "Don't know",
    "Somewhat difficult",
    "Very difficult",
];
/// `Não sabe` is also what a blank answer becomes at ingestion, so it is kept verbatim
const WORK_INTERFERE: &[&str] = &["Never", "Rarely", "Sometimes", "Often", "Não sabe"];
const GENDER_GROUP: &[&str] = &["Homem", "Mulher", "Trans", "Não-binário"];

const PT_TO_EN: &[(&str, &str)] = &[
    ("Não", "No"),
    ("Sim", "Yes"),
    ("Não sei", "Don't know"),
    ("Não tenho certeza", "Not sure"),
    ("Um pouco fácil", "Somewhat easy"),
    ("Muito fácil", "Very easy"),
    ("Um pouco difícil", "Somewhat difficult"),
    ("Muito difícil", "Very difficult"),
    ("Nunca", "Never"),
    ("Raramente", "Rarely"),
    ("Às vezes", "Sometimes"),
    ("Frequentemente", "Often"),
];

/// Known answers for a categorical field, in form order
pub fn known_options(field: &str) -> Option<&'static [&'static str]> {
    match field {
        "gender_group" => Some(GENDER_GROUP),
        "family_history" => Some(YES_NO),
        "benefits" | "anonymity" => Some(YES_NO_DONT_KNOW),
        "care_options" => Some(YES_NO_NOT_SURE),
        "leave" => Some(LEAVE),
        "work_interfere" => Some(WORK_INTERFERE),
        _ => None,
    }
}

/// Map a Portuguese form label onto the survey's English answer.
/// Unknown labels pass through unchanged.
pub fn to_dataset_answer(answer: &str) -> &str {
    PT_TO_EN
        .iter()
        .find(|(pt, _)| pt.eq_ignore_ascii_case(answer.trim()))
        .map(|(_, en)| *en)
        .unwrap_or(answer)
}

/// Translate every text value of a form submission into survey answers
pub fn localize_profile(profile: &RawProfile) -> RawProfile {
    profile
        .iter()
        .map(|(name, value)| {
            let value = match value {
                RawValue::Text(s) => RawValue::text(to_dataset_answer(s)),
                other => other.clone(),
            };
            (name.to_string(), value)
        })
        .collect()
}
