use chrono::Duration;
use rstest::{fixture, rstest};

use event_board::fixtures::EventFactory;
use event_board::models::{Event, EventCandidate, NumericInput};
use event_board::validate;
use event_board::validation::{Field, ValidationResult, ViolationKind};

#[fixture]
fn event() -> EventCandidate {
    let candidate = EventFactory::event();
    assert!(validate(&candidate, &[]).is_valid());
    candidate
}

fn only(result: &ValidationResult, field: Field, kind: ViolationKind) {
    assert!(!result.is_valid(), "expected {field} to be rejected");
    assert!(
        result.has(field, kind),
        "expected {kind:?} on {field}, got {:?}",
        result.violations()
    );
    assert_eq!(result.violations().len(), 1, "{:?}", result.violations());
}

#[rstest]
#[case::category(Field::Category)]
#[case::name(Field::Name)]
#[case::address(Field::Address)]
#[case::latitude(Field::Latitude)]
#[case::longitude(Field::Longitude)]
#[case::link(Field::Link)]
#[case::datetime(Field::Datetime)]
fn requires_field(mut event: EventCandidate, #[case] field: Field) {
    match field {
        Field::Category => event.category = None,
        Field::Name => event.name = None,
        Field::Address => event.address = None,
        Field::Latitude => event.latitude = None,
        Field::Longitude => event.longitude = None,
        Field::Link => event.link = None,
        Field::Datetime => event.datetime = None,
        _ => unreachable!("not a required field"),
    }
    only(&validate(&event, &[]), field, ViolationKind::Required);
}

fn set_text(event: &mut EventCandidate, field: Field, value: String) {
    match field {
        Field::Category => event.category = Some(value),
        Field::Name => event.name = Some(value),
        Field::Venue => event.venue = Some(value),
        Field::Address => event.address = Some(value),
        Field::Link => event.link = Some(value),
        Field::Description => event.description = Some(value),
        _ => unreachable!("not a text field"),
    }
}

#[rstest]
#[case::category(Field::Category, 100)]
#[case::name(Field::Name, 100)]
#[case::venue(Field::Venue, 100)]
#[case::address(Field::Address, 200)]
#[case::link(Field::Link, 1000)]
#[case::description(Field::Description, 500)]
fn limits_text_length(mut event: EventCandidate, #[case] field: Field, #[case] max: usize) {
    let mut value = "A".repeat(max);
    set_text(&mut event, field, value.clone());
    assert!(validate(&event, &[]).is_valid(), "{field} at {max} chars");

    value.push('A');
    set_text(&mut event, field, value);
    only(&validate(&event, &[]), field, ViolationKind::TooLong { max });
}

#[rstest]
fn allows_venue_to_be_absent(mut event: EventCandidate) {
    event.venue = None;
    assert!(validate(&event, &[]).is_valid());
}

#[rstest]
fn allows_description_to_be_absent(mut event: EventCandidate) {
    event.description = None;
    assert!(validate(&event, &[]).is_valid());
}

#[rstest]
#[case::latitude(Field::Latitude)]
#[case::longitude(Field::Longitude)]
fn requires_coordinates_to_be_numbers(mut event: EventCandidate, #[case] field: Field) {
    let value = Some(NumericInput::from("A"));
    match field {
        Field::Latitude => event.latitude = value,
        _ => event.longitude = value,
    }
    only(&validate(&event, &[]), field, ViolationKind::NotNumeric);
}

#[rstest]
fn accepts_numeric_text_coordinates(mut event: EventCandidate) {
    event.latitude = Some("44.0503".into());
    event.longitude = Some(" -123.0937 ".into());
    assert!(validate(&event, &[]).is_valid());
}

#[rstest]
fn allows_price_to_be_absent(mut event: EventCandidate) {
    event.price = None;
    assert!(validate(&event, &[]).is_valid());
}

#[rstest]
fn requires_present_price_to_be_a_non_negative_number(mut event: EventCandidate) {
    event.price = Some("A".into());
    only(&validate(&event, &[]), Field::Price, ViolationKind::NotNumeric);

    event.price = Some((-1).into());
    only(&validate(&event, &[]), Field::Price, ViolationKind::OutOfRange);

    event.price = Some(0.into());
    assert!(validate(&event, &[]).is_valid());
}

mod unique_fields {
    use super::*;

    #[fixture]
    fn saved() -> Vec<Event> {
        vec![EventFactory::stored(1, EventFactory::event())]
    }

    #[fixture]
    fn event2(saved: Vec<Event>) -> EventCandidate {
        let candidate = EventFactory::event2();
        only(&validate(&candidate, &saved), Field::Name, ViolationKind::DuplicateKey);
        candidate
    }

    #[rstest]
    fn rejects_case_insensitive_duplicate(saved: Vec<Event>, mut event2: EventCandidate) {
        event2.name = Some(saved[0].name.to_uppercase());
        only(&validate(&event2, &saved), Field::Name, ViolationKind::DuplicateKey);
    }

    #[rstest]
    fn allows_duplicate_when_latitude_differs(saved: Vec<Event>, mut event2: EventCandidate) {
        event2.latitude = Some(44.into());
        assert!(validate(&event2, &saved).is_valid());
    }

    #[rstest]
    fn allows_duplicate_when_longitude_differs(saved: Vec<Event>, mut event2: EventCandidate) {
        event2.longitude = Some((-124.2).into());
        assert!(validate(&event2, &saved).is_valid());
    }

    #[rstest]
    fn allows_duplicate_when_name_differs(saved: Vec<Event>, mut event2: EventCandidate) {
        event2.name = Some("What is Business Casual?".to_string());
        assert!(validate(&event2, &saved).is_valid());
    }

    #[rstest]
    fn allows_duplicate_when_datetime_differs(saved: Vec<Event>, mut event2: EventCandidate) {
        event2.datetime = event2.datetime.map(|dt| dt + Duration::days(1));
        assert!(validate(&event2, &saved).is_valid());
    }

    #[rstest]
    fn one_second_apart_is_a_different_event(saved: Vec<Event>, mut event2: EventCandidate) {
        event2.datetime = event2.datetime.map(|dt| dt + Duration::seconds(1));
        assert!(validate(&event2, &saved).is_valid());
    }

    #[rstest]
    fn numeric_text_matches_stored_number(saved: Vec<Event>, mut event2: EventCandidate) {
        event2.latitude = Some(format!("{}", saved[0].latitude).as_str().into());
        only(&validate(&event2, &saved), Field::Name, ViolationKind::DuplicateKey);
    }
}
