use chrono::NaiveDate;

use super::common::*;
use crate::domain::{Address, DocumentMetadata};
use crate::validation::{age_on, is_valid_email, validate};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

#[test]
fn accepts_complete_registration() {
    assert!(validate(&details(), &[true, true], today()).is_ok());
}

#[test]
fn reports_each_missing_field() {
    let empty = crate::domain::RegistrationDetails::default();
    let errors = validate(&empty, &[], today()).expect_err("empty form rejected");

    assert_eq!(errors.message_for("firstName"), Some("First Name is required"));
    assert_eq!(errors.message_for("lastName"), Some("Last Name is required"));
    assert_eq!(errors.message_for("email"), Some("Email is required"));
    assert_eq!(errors.message_for("dob"), Some("Date of Birth is required"));
    assert_eq!(
        errors.message_for("residential.street1"),
        Some("Street 1 is required")
    );
    assert_eq!(
        errors.message_for("permanent.street2"),
        Some("Street 2 is required")
    );
    assert_eq!(
        errors.message_for("documents"),
        Some("At least 2 documents are required")
    );
}

#[test]
fn permanent_address_required_only_when_not_mirrored() {
    let mut candidate = details();
    candidate.same_as_residential = false;
    candidate.permanent = Address::default();

    let errors = validate(&candidate, &[true, true], today()).expect_err("permanent missing");
    assert!(errors.message_for("permanent.street1").is_some());
    assert!(errors.message_for("permanent.street2").is_some());

    candidate.permanent = Address {
        street1: "9 Elm".to_string(),
        street2: "Unit 4".to_string(),
    };
    assert!(validate(&candidate, &[true, true], today()).is_ok());

    candidate.same_as_residential = true;
    candidate.permanent = Address::default();
    assert!(validate(&candidate, &[true, true], today()).is_ok());
}

#[test]
fn rejects_malformed_email() {
    let mut candidate = details();
    for email in ["ann", "ann@", "ann@x", "ann @x.com", "@x.com"] {
        candidate.email = email.to_string();
        let errors = validate(&candidate, &[true, true], today()).expect_err("invalid email");
        assert_eq!(errors.message_for("email"), Some("Invalid email"), "{email}");
    }
    assert!(is_valid_email("ann.lee+reg@mail.example.org"));
}

#[test]
fn eighteenth_birthday_is_the_cutoff() {
    let mut candidate = details();

    candidate.dob = "2007-06-15".to_string();
    assert!(validate(&candidate, &[true, true], today()).is_ok());

    candidate.dob = "2007-06-16".to_string();
    let errors = validate(&candidate, &[true, true], today()).expect_err("17 years old");
    assert_eq!(
        errors.message_for("dob"),
        Some("You must be at least 18 years old")
    );
}

#[test]
fn rejects_unparseable_future_and_implausible_dates() {
    let mut candidate = details();

    candidate.dob = "not-a-date".to_string();
    let errors = validate(&candidate, &[true, true], today()).expect_err("garbage");
    assert_eq!(errors.message_for("dob"), Some("Please enter a valid date"));

    candidate.dob = "2025-06-16".to_string();
    let errors = validate(&candidate, &[true, true], today()).expect_err("tomorrow");
    assert_eq!(
        errors.message_for("dob"),
        Some("Date of birth cannot be in the future")
    );

    candidate.dob = "1900-01-01".to_string();
    let errors = validate(&candidate, &[true, true], today()).expect_err("125 years");
    assert_eq!(
        errors.message_for("dob"),
        Some("Please enter a valid date of birth")
    );
}

#[test]
fn age_uses_calendar_difference() {
    assert_eq!(age_on(date(2004, 2, 29), date(2022, 2, 28)), 17);
    assert_eq!(age_on(date(2004, 2, 29), date(2022, 3, 1)), 18);
    assert_eq!(age_on(date(2000, 12, 31), date(2025, 1, 1)), 24);
    assert_eq!(age_on(date(2000, 1, 1), date(2025, 1, 1)), 25);
}

#[test]
fn documents_need_label_type_and_file() {
    let mut candidate = details();
    candidate.documents.push(DocumentMetadata {
        file_name: "  ".to_string(),
        file_type: None,
    });

    let errors =
        validate(&candidate, &[true, false], today()).expect_err("incomplete documents");
    assert_eq!(errors.message_for("documents[1].file"), Some("File is required"));
    assert_eq!(
        errors.message_for("documents[2].fileName"),
        Some("File Name is required")
    );
    assert_eq!(
        errors.message_for("documents[2].fileType"),
        Some("File Type is required")
    );
    assert_eq!(errors.message_for("documents[2].file"), Some("File is required"));
    assert!(errors.message_for("documents").is_none());
}

#[test]
fn single_document_is_not_enough() {
    let mut candidate = details();
    candidate.documents.truncate(1);

    let errors = validate(&candidate, &[true], today()).expect_err("one document");
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.message_for("documents"),
        Some("At least 2 documents are required")
    );
}
