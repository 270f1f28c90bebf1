//! Ready-made candidates for tests, demos and seeding an empty store.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::models::{Event, EventCandidate, NumericInput};
use crate::validation;

pub struct EventFactory;

impl EventFactory {
    /// A candidate that passes every rule.
    pub fn event() -> EventCandidate {
        EventCandidate {
            id: None,
            category: Some("Technology".to_string()),
            name: Some("Intro to Rust".to_string()),
            venue: Some("Downtown Library".to_string()),
            address: Some("100 W 10th Ave, Eugene, OR 97401".to_string()),
            latitude: Some(NumericInput::Number(44.0503)),
            longitude: Some(NumericInput::Number(-123.0937)),
            link: Some("https://example.com/events/intro-to-rust".to_string()),
            price: Some(NumericInput::Number(0.0)),
            description: Some("An evening walkthrough of ownership and borrowing.".to_string()),
            datetime: Some(Self::default_datetime()),
        }
    }

    /// Same location, name and time as [`EventFactory::event`]; everything else differs.
    pub fn event2() -> EventCandidate {
        EventCandidate {
            category: Some("Education".to_string()),
            venue: Some("Main Branch".to_string()),
            address: Some("100 West 10th Avenue, Eugene, Oregon".to_string()),
            link: Some("https://example.org/calendar/rust-intro".to_string()),
            price: Some(NumericInput::Number(5.0)),
            description: None,
            ..Self::event()
        }
    }

    pub fn default_datetime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2014, 10, 2, 19, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Seed data spread over the coming weeks, relative to `now`.
    pub fn sample_events(now: DateTime<Utc>) -> Vec<EventCandidate> {
        vec![
            sample(
                "Music",
                "Open Mic Night",
                Some("Pine Box Rock Shop"),
                (45.5122, -122.6587),
                now + Duration::days(1),
                None,
            ),
            sample(
                "Technology",
                "Rust Study Group",
                None,
                (44.0503, -123.0937),
                now + Duration::days(6),
                Some(0.0),
            ),
            sample(
                "Arts",
                "Printmaking Workshop",
                Some("Community Arts Center"),
                (43.6150, -116.2023),
                now + Duration::days(14),
                Some(25.0),
            ),
        ]
    }

    /// Stores `candidate` as row `id` without touching a database.
    ///
    /// Panics if the candidate breaks a field rule.
    pub fn stored(id: i64, candidate: EventCandidate) -> Event {
        match validation::validate_new(&candidate, &[]) {
            Ok(fields) => {
                let now = Utc::now();
                fields.into_event(id, now, now)
            }
            Err(err) => panic!("fixture candidate is invalid: {err}"),
        }
    }
}

fn sample(
    category: &str,
    name: &str,
    venue: Option<&str>,
    (latitude, longitude): (f64, f64),
    datetime: DateTime<Utc>,
    price: Option<f64>,
) -> EventCandidate {
    let slug = name.to_lowercase().replace(' ', "-");
    EventCandidate {
        id: None,
        category: Some(category.to_string()),
        name: Some(name.to_string()),
        venue: venue.map(str::to_string),
        address: Some(format!("{latitude:.4}, {longitude:.4}")),
        latitude: Some(latitude.into()),
        longitude: Some(longitude.into()),
        link: Some(format!("https://events.example.com/{slug}")),
        price: price.map(NumericInput::Number),
        description: None,
        datetime: Some(datetime),
    }
}
