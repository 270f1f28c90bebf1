//! Field and uniqueness rules for event candidates.
//!
//! Every rule runs on every call, so a single result lists all problems at once.
//! Violations come out in field order, with the duplicate key last.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::models::{Event, EventCandidate, NewEvent, NumericInput, UniquenessKey};

pub const CATEGORY_MAX_LEN: usize = 100;
pub const NAME_MAX_LEN: usize = 100;
pub const VENUE_MAX_LEN: usize = 100;
pub const ADDRESS_MAX_LEN: usize = 200;
pub const LINK_MAX_LEN: usize = 1000;
pub const DESCRIPTION_MAX_LEN: usize = 500;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Category,
    Name,
    Venue,
    Address,
    Latitude,
    Longitude,
    Link,
    Price,
    Description,
    Datetime,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Category => "category",
            Field::Name => "name",
            Field::Venue => "venue",
            Field::Address => "address",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::Link => "link",
            Field::Price => "price",
            Field::Description => "description",
            Field::Datetime => "datetime",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    Required,
    TooLong { max: usize },
    NotNumeric,
    OutOfRange,
    DuplicateKey,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Violation {
    pub field: Field,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(field: Field, kind: ViolationKind) -> Self {
        Self { field, kind }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::Required => write!(f, "{} can't be blank", self.field),
            ViolationKind::TooLong { max } => {
                write!(f, "{} is too long (maximum is {max} characters)", self.field)
            }
            ViolationKind::NotNumeric => write!(f, "{} is not a number", self.field),
            ViolationKind::OutOfRange => {
                write!(f, "{} must be greater than or equal to 0", self.field)
            }
            ViolationKind::DuplicateKey => write!(
                f,
                "{} has already been taken at this location and time",
                self.field
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ValidationResult {
    Valid,
    Invalid(Vec<Violation>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid(violations) => violations,
        }
    }

    pub fn has(&self, field: Field, kind: ViolationKind) -> bool {
        self.violations()
            .iter()
            .any(|v| v.field == field && v.kind == kind)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid(violations) => Err(ValidationErrors(violations)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("validation failed: {}", join_messages(.0))]
pub struct ValidationErrors(pub Vec<Violation>);

impl ValidationErrors {
    pub fn violations(&self) -> &[Violation] {
        &self.0
    }

    pub fn is_duplicate(&self) -> bool {
        self.0.iter().any(|v| v.kind == ViolationKind::DuplicateKey)
    }
}

fn join_messages(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Checks `candidate` against the field rules and against `existing`, the
/// stored events it could collide with.
pub fn validate(candidate: &EventCandidate, existing: &[Event]) -> ValidationResult {
    match validate_new(candidate, existing) {
        Ok(_) => ValidationResult::Valid,
        Err(ValidationErrors(violations)) => ValidationResult::Invalid(violations),
    }
}

/// Same rules as [`validate`], handing back the typed values on success.
pub fn validate_new(
    candidate: &EventCandidate,
    existing: &[Event],
) -> Result<NewEvent, ValidationErrors> {
    let mut rules = Rules::default();

    let category = rules.required_text(Field::Category, &candidate.category, CATEGORY_MAX_LEN);
    let name = rules.required_text(Field::Name, &candidate.name, NAME_MAX_LEN);
    let venue = rules.optional_text(Field::Venue, &candidate.venue, VENUE_MAX_LEN);
    let address = rules.required_text(Field::Address, &candidate.address, ADDRESS_MAX_LEN);
    let latitude = rules.required_number(Field::Latitude, &candidate.latitude);
    let longitude = rules.required_number(Field::Longitude, &candidate.longitude);
    let link = rules.required_text(Field::Link, &candidate.link, LINK_MAX_LEN);
    let price = rules.optional_non_negative(Field::Price, &candidate.price);
    let description =
        rules.optional_text(Field::Description, &candidate.description, DESCRIPTION_MAX_LEN);
    let datetime = rules.required_datetime(Field::Datetime, candidate.datetime);

    let typed = match (category, name, address, latitude, longitude, link, datetime) {
        (
            Some(category),
            Some(name),
            Some(address),
            Some(latitude),
            Some(longitude),
            Some(link),
            Some(datetime),
        ) => Some(NewEvent {
            category: category.to_string(),
            name: name.to_string(),
            venue: venue.map(str::to_string),
            address: address.to_string(),
            latitude,
            longitude,
            link: link.to_string(),
            price,
            description: description.map(str::to_string),
            datetime,
        }),
        _ => None,
    };

    // Runs even when fields outside the key are broken.
    if let Some(key) = candidate.uniqueness_key() {
        rules.unique(&key, candidate.id, existing);
    }

    match (rules.violations.is_empty(), typed) {
        (true, Some(fields)) => Ok(fields),
        _ => {
            debug!(
                name = candidate.name.as_deref().unwrap_or_default(),
                violations = rules.violations.len(),
                "event candidate rejected"
            );
            Err(ValidationErrors(rules.violations))
        }
    }
}

#[derive(Default)]
struct Rules {
    violations: Vec<Violation>,
}

impl Rules {
    fn reject(&mut self, field: Field, kind: ViolationKind) {
        self.violations.push(Violation::new(field, kind));
    }

    fn required_text<'a>(
        &mut self,
        field: Field,
        value: &'a Option<String>,
        max: usize,
    ) -> Option<&'a str> {
        match value.as_deref() {
            Some(text) if !text.trim().is_empty() => self.within_length(field, text, max),
            _ => {
                self.reject(field, ViolationKind::Required);
                None
            }
        }
    }

    fn optional_text<'a>(
        &mut self,
        field: Field,
        value: &'a Option<String>,
        max: usize,
    ) -> Option<&'a str> {
        value
            .as_deref()
            .and_then(|text| self.within_length(field, text, max))
    }

    fn within_length<'a>(&mut self, field: Field, text: &'a str, max: usize) -> Option<&'a str> {
        if text.chars().count() > max {
            self.reject(field, ViolationKind::TooLong { max });
            None
        } else {
            Some(text)
        }
    }

    fn required_number(&mut self, field: Field, value: &Option<NumericInput>) -> Option<f64> {
        match value {
            Some(input) => self.numeric(field, input),
            None => {
                self.reject(field, ViolationKind::Required);
                None
            }
        }
    }

    fn optional_non_negative(&mut self, field: Field, value: &Option<NumericInput>) -> Option<f64> {
        let number = self.numeric(field, value.as_ref()?)?;
        if number < 0.0 {
            self.reject(field, ViolationKind::OutOfRange);
            return None;
        }
        Some(number)
    }

    fn numeric(&mut self, field: Field, input: &NumericInput) -> Option<f64> {
        let number = input.as_f64();
        if number.is_none() {
            self.reject(field, ViolationKind::NotNumeric);
        }
        number
    }

    fn required_datetime(
        &mut self,
        field: Field,
        value: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        if value.is_none() {
            self.reject(field, ViolationKind::Required);
        }
        value
    }

    fn unique(&mut self, key: &UniquenessKey, own_id: Option<i64>, existing: &[Event]) {
        let taken = existing
            .iter()
            .filter(|event| own_id != Some(event.id))
            .any(|event| event.key() == *key);
        if taken {
            self.reject(Field::Name, ViolationKind::DuplicateKey);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::EventFactory;

    #[test]
    fn reports_every_violation_in_field_order() {
        let candidate = EventCandidate {
            price: Some("free".into()),
            venue: Some("V".repeat(101)),
            ..EventCandidate::default()
        };

        let result = validate(&candidate, &[]);
        assert_eq!(
            result.violations(),
            &[
                Violation::new(Field::Category, ViolationKind::Required),
                Violation::new(Field::Name, ViolationKind::Required),
                Violation::new(Field::Venue, ViolationKind::TooLong { max: 100 }),
                Violation::new(Field::Address, ViolationKind::Required),
                Violation::new(Field::Latitude, ViolationKind::Required),
                Violation::new(Field::Longitude, ViolationKind::Required),
                Violation::new(Field::Link, ViolationKind::Required),
                Violation::new(Field::Price, ViolationKind::NotNumeric),
                Violation::new(Field::Datetime, ViolationKind::Required),
            ]
        );
    }

    #[test]
    fn blank_required_text_counts_as_missing() {
        let mut candidate = EventFactory::event();
        candidate.category = Some("  \t".to_string());
        let result = validate(&candidate, &[]);
        assert!(result.has(Field::Category, ViolationKind::Required));
    }

    #[test]
    fn empty_optional_text_is_allowed() {
        let mut candidate = EventFactory::event();
        candidate.venue = Some(String::new());
        candidate.description = Some(String::new());
        assert!(validate(&candidate, &[]).is_valid());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let mut candidate = EventFactory::event();
        candidate.name = Some("é".repeat(100));
        assert!(validate(&candidate, &[]).is_valid());
    }

    #[test]
    fn negative_price_is_out_of_range_only() {
        let mut candidate = EventFactory::event();
        candidate.price = Some("-0.5".into());
        assert_eq!(
            validate(&candidate, &[]).violations(),
            &[Violation::new(Field::Price, ViolationKind::OutOfRange)]
        );
    }

    #[test]
    fn record_does_not_collide_with_itself() {
        let stored = EventFactory::stored(7, EventFactory::event());
        let mut edit = stored.to_candidate();
        edit.description = Some("Updated".to_string());
        assert!(validate(&edit, std::slice::from_ref(&stored)).is_valid());

        edit.id = Some(8);
        assert!(validate(&edit, &[stored]).has(Field::Name, ViolationKind::DuplicateKey));
    }

    #[test]
    fn duplicate_is_reported_alongside_unrelated_failures() {
        let saved = [EventFactory::stored(1, EventFactory::event())];
        let mut candidate = EventFactory::event2();
        candidate.category = None;
        candidate.link = Some("L".repeat(1001));

        assert_eq!(
            validate(&candidate, &saved).violations(),
            &[
                Violation::new(Field::Category, ViolationKind::Required),
                Violation::new(Field::Link, ViolationKind::TooLong { max: 1000 }),
                Violation::new(Field::Name, ViolationKind::DuplicateKey),
            ]
        );
    }

    #[test]
    fn validate_new_returns_typed_fields() {
        let fields = validate_new(&EventFactory::event(), &[]).expect("valid");
        assert_eq!(fields.name, "Intro to Rust");
        assert_eq!(fields.price, Some(0.0));
    }

    #[test]
    fn messages_read_like_form_errors() {
        let errors = ValidationErrors(vec![
            Violation::new(Field::Name, ViolationKind::TooLong { max: 100 }),
            Violation::new(Field::Price, ViolationKind::OutOfRange),
        ]);
        assert_eq!(
            errors.to_string(),
            "validation failed: name is too long (maximum is 100 characters); \
             price must be greater than or equal to 0"
        );
    }

    #[test]
    fn violations_serialize_with_field_and_kind() {
        let json = serde_json::to_value(Violation::new(
            Field::Link,
            ViolationKind::TooLong { max: 1000 },
        ))
        .expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({ "field": "link", "kind": "too_long", "max": 1000 })
        );
    }
}
