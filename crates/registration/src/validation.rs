//! Field rules shared by the form client and the registration endpoint.
//!
//! Single-field rules run first, then the cross-field pass that decides
//! whether the permanent address is required, then the document rules.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;

use crate::domain::{Address, RegistrationDetails};

pub const MIN_DOCUMENTS: usize = 2;
pub const MIN_AGE_YEARS: i32 = 18;
pub const MAX_AGE_YEARS: i32 = 120;

/// One failed rule, addressed by its JSON field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: &'static str,
}

/// Every rule that failed for a candidate registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(transparent)]
#[error("{} field(s) failed validation", .errors.len())]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: impl Into<String>, message: &'static str) {
        self.errors.push(FieldError {
            field: field.into(),
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// First message reported for `field`, if any.
    pub fn message_for(&self, field: &str) -> Option<&'static str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message)
    }
}

/// Validates `details` as of `today`.
///
/// `attachments[i]` states whether document `i` carries a file payload; missing
/// entries count as not attached.
pub fn validate(
    details: &RegistrationDetails,
    attachments: &[bool],
    today: NaiveDate,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    require(&mut errors, "firstName", &details.first_name, "First Name is required");
    require(&mut errors, "lastName", &details.last_name, "Last Name is required");

    if details.email.trim().is_empty() {
        errors.push("email", "Email is required");
    } else if !is_valid_email(&details.email) {
        errors.push("email", "Invalid email");
    }

    if let Err(message) = check_dob(&details.dob, today) {
        errors.push("dob", message);
    }

    require_address(&mut errors, "residential", &details.residential);
    if !details.same_as_residential {
        require_address(&mut errors, "permanent", &details.permanent);
    }

    for (index, document) in details.documents.iter().enumerate() {
        let prefix = format!("documents[{index}]");
        if document.file_name.trim().is_empty() {
            errors.push(format!("{prefix}.fileName"), "File Name is required");
        }
        if document.file_type.is_none() {
            errors.push(format!("{prefix}.fileType"), "File Type is required");
        }
        if !attachments.get(index).copied().unwrap_or(false) {
            errors.push(format!("{prefix}.file"), "File is required");
        }
    }
    if details.documents.len() < MIN_DOCUMENTS {
        errors.push("documents", "At least 2 documents are required");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn require(errors: &mut ValidationErrors, field: &str, value: &str, message: &'static str) {
    if value.trim().is_empty() {
        errors.push(field, message);
    }
}

fn require_address(errors: &mut ValidationErrors, prefix: &str, address: &Address) {
    require(
        errors,
        &format!("{prefix}.street1"),
        &address.street1,
        "Street 1 is required",
    );
    require(
        errors,
        &format!("{prefix}.street2"),
        &address.street2,
        "Street 2 is required",
    );
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email pattern compiles")
    })
}

pub fn is_valid_email(value: &str) -> bool {
    email_pattern().is_match(value.trim())
}

/// Accepts `YYYY-MM-DD`, or an RFC 3339 timestamp whose date part is used.
pub fn parse_dob(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|timestamp| timestamp.date_naive())
        })
}

/// Whole years between `birth` and `today`, counting a birthday only once it has passed.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

fn check_dob(raw: &str, today: NaiveDate) -> Result<(), &'static str> {
    if raw.trim().is_empty() {
        return Err("Date of Birth is required");
    }
    let birth = parse_dob(raw).ok_or("Please enter a valid date")?;
    if birth > today {
        return Err("Date of birth cannot be in the future");
    }
    let age = age_on(birth, today);
    if age > MAX_AGE_YEARS {
        return Err("Please enter a valid date of birth");
    }
    if age < MIN_AGE_YEARS {
        return Err("You must be at least 18 years old");
    }
    Ok(())
}
