use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::answers::AnswerSet;
use crate::date::{DateError, DatePolicy, parse_date};
use crate::spec::field::{FieldSpec, FieldType, ValidationRules};
use crate::spec::form::FormBundle;
use crate::sub_entity::normalize_external_input;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9()\-\s]{5,20}$").expect("phone pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field_id: String,
    pub path: String,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub missing_required: Vec<String>,
    pub unknown_fields: Vec<String>,
}

/// Validates the answers against the bundle as of now.
pub fn validate(bundle: &FormBundle, answers: &AnswerSet) -> ValidationResult {
    validate_at(bundle, answers, Utc::now())
}

/// Same as [`validate`] with an explicit "now" for date checks.
pub fn validate_at(
    bundle: &FormBundle,
    answers: &AnswerSet,
    now: DateTime<Utc>,
) -> ValidationResult {
    let mut errors = Vec::new();
    let mut missing_required = Vec::new();

    for field in bundle.fields.iter().filter(|field| field.is_visible(answers)) {
        if !field.has_answer(answers) {
            if field.is_required(answers) {
                missing_required.push(field.id.clone());
            }
            continue;
        }
        if let Some(value) = answers.get(&field.id)
            && let Some(error) = validate_value(field, value, now)
        {
            errors.push(error);
        }
    }

    let known: BTreeSet<&str> = bundle
        .fields
        .iter()
        .map(|field| field.id.as_str())
        .collect();
    let unknown_fields: Vec<String> = answers
        .keys()
        .filter(|key| !known.contains(key.as_str()))
        .cloned()
        .collect();

    ValidationResult {
        valid: errors.is_empty() && missing_required.is_empty() && unknown_fields.is_empty(),
        errors,
        missing_required,
        unknown_fields,
    }
}

/// Checks one answered value: its type first, then the field's rules.
pub fn validate_value(
    field: &FieldSpec,
    value: &Value,
    now: DateTime<Utc>,
) -> Option<ValidationError> {
    if let Some(error) = check_kind(field, value, now) {
        return Some(error);
    }
    field
        .validation
        .as_ref()
        .and_then(|rules| enforce_rules(field, value, rules))
}

fn check_kind(field: &FieldSpec, value: &Value, now: DateTime<Utc>) -> Option<ValidationError> {
    let matches = match field.kind {
        FieldType::Text | FieldType::Textarea => value.is_string(),
        FieldType::Email => match value.as_str() {
            Some(text) if EMAIL.is_match(text.trim()) => true,
            Some(_) => return Some(base_error(field, "invalid email address", "invalid_email")),
            None => false,
        },
        FieldType::Phone => match value.as_str() {
            Some(text) if PHONE.is_match(text.trim()) => true,
            Some(_) => return Some(base_error(field, "invalid phone number", "invalid_phone")),
            None => false,
        },
        FieldType::Number => numeric(value).is_some(),
        FieldType::Checkbox => value.is_boolean(),
        FieldType::Select | FieldType::Radio => match value.as_str() {
            Some(text) => {
                return (!field.option_values().any(|option| option == text))
                    .then(|| base_error(field, "invalid option", "invalid_option"));
            }
            None => false,
        },
        FieldType::Multiselect => match value.as_array() {
            Some(items) => {
                let all_known = items.iter().all(|item| {
                    item.as_str()
                        .is_some_and(|text| field.option_values().any(|option| option == text))
                });
                return (!all_known).then(|| base_error(field, "invalid option", "invalid_option"));
            }
            None => false,
        },
        FieldType::Date => match value.as_str() {
            Some(text) => {
                let policy = DatePolicy::new(field.disable_future_dates);
                return match parse_date(text).and_then(|instant| policy.check(instant, now)) {
                    Ok(()) => None,
                    Err(DateError::FutureDate(_)) => {
                        Some(base_error(field, "date cannot be in the future", "future_date"))
                    }
                    Err(DateError::Unparsable(_)) => {
                        Some(base_error(field, "invalid date", "invalid_date"))
                    }
                };
            }
            None => false,
        },
        FieldType::Composite => normalize_external_input(value).is_ok(),
        FieldType::Address | FieldType::File => value.is_string() || value.is_object(),
    };

    (!matches).then(|| base_error(field, "type mismatch", "type_mismatch"))
}

fn enforce_rules(
    field: &FieldSpec,
    value: &Value,
    rules: &ValidationRules,
) -> Option<ValidationError> {
    let fail = |default: &str, code: &str| {
        Some(base_error(
            field,
            rules.message.as_deref().unwrap_or(default),
            code,
        ))
    };

    if let Some(pattern) = &rules.pattern
        && let Some(text) = value.as_str()
        && let Ok(regex) = Regex::new(pattern)
        && !regex.is_match(text)
    {
        return fail("value does not match pattern", "pattern_mismatch");
    }

    if let Some(min_len) = rules.min_length
        && let Some(text) = value.as_str()
        && text.chars().count() < min_len
    {
        return fail("text shorter than min length", "min_length");
    }

    if let Some(max_len) = rules.max_length
        && let Some(text) = value.as_str()
        && text.chars().count() > max_len
    {
        return fail("text longer than max length", "max_length");
    }

    if let Some(min) = rules.min
        && let Some(number) = numeric(value)
        && number < min
    {
        return fail("value below minimum", "min");
    }

    if let Some(max) = rules.max
        && let Some(number) = numeric(value)
        && number > max
    {
        return fail("value above maximum", "max");
    }

    None
}

/// Numbers, or strings holding one (text inputs store digits as strings).
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn base_error(field: &FieldSpec, message: &str, code: &str) -> ValidationError {
    ValidationError {
        field_id: field.id.clone(),
        path: format!("/{}", field.id),
        message: message.into(),
        code: code.into(),
    }
}
