use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::utils;

/// A stored event. Every field on this type has already passed validation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Event {
    pub id: i64,
    pub category: String,
    pub name: String,
    pub venue: Option<String>,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub link: String,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub datetime: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn key(&self) -> UniquenessKey {
        UniquenessKey::new(self.latitude, self.longitude, &self.name, self.datetime)
    }

    pub fn summary_line(&self) -> String {
        let place = self.venue.as_deref().unwrap_or(&self.address);
        let price = match self.price {
            Some(p) if p == 0.0 => "free".to_string(),
            Some(p) => format!("${p:.2}"),
            None => "price n/a".to_string(),
        };
        format!(
            "#{} {} [{}] {} @ {} ({price})",
            self.id,
            self.datetime.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.category,
            self.name,
            place
        )
    }

    /// Turns the stored row back into a candidate, e.g. as the base for an edit.
    pub fn to_candidate(&self) -> EventCandidate {
        EventCandidate {
            id: Some(self.id),
            category: Some(self.category.clone()),
            name: Some(self.name.clone()),
            venue: self.venue.clone(),
            address: Some(self.address.clone()),
            latitude: Some(NumericInput::Number(self.latitude)),
            longitude: Some(NumericInput::Number(self.longitude)),
            link: Some(self.link.clone()),
            price: self.price.map(NumericInput::Number),
            description: self.description.clone(),
            datetime: Some(self.datetime),
        }
    }
}

/// Typed field values of an event that passed validation but has no row yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NewEvent {
    pub category: String,
    pub name: String,
    pub venue: Option<String>,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub link: String,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub datetime: DateTime<Utc>,
}

impl NewEvent {
    pub fn key(&self) -> UniquenessKey {
        UniquenessKey::new(self.latitude, self.longitude, &self.name, self.datetime)
    }

    pub fn into_event(
        self,
        id: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Event {
        Event {
            id,
            category: self.category,
            name: self.name,
            venue: self.venue,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            link: self.link,
            price: self.price,
            description: self.description,
            datetime: self.datetime,
            created_at,
            updated_at,
        }
    }
}

/// A numeric field as submitted: either a real number or text that may not parse.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

// Any JSON value is accepted; non-numbers become text that fails to parse.
impl<'de> Deserialize<'de> for NumericInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => match n.as_f64() {
                Some(value) => NumericInput::Number(value),
                None => NumericInput::Text(n.to_string()),
            },
            Value::String(text) => NumericInput::Text(text),
            other => NumericInput::Text(other.to_string()),
        })
    }
}

impl NumericInput {
    /// The finite `f64` behind this input, if there is one.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            NumericInput::Number(n) => *n,
            NumericInput::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for NumericInput {
    fn from(value: f64) -> Self {
        NumericInput::Number(value)
    }
}

impl From<i32> for NumericInput {
    fn from(value: i32) -> Self {
        NumericInput::Number(f64::from(value))
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        NumericInput::Text(value.to_string())
    }
}

/// An unvalidated event as handed over by a submission or import flow.
///
/// `id` is set when the candidate edits an existing row; that row is then left
/// out of its own uniqueness check.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventCandidate {
    pub id: Option<i64>,
    pub category: Option<String>,
    pub name: Option<String>,
    pub venue: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<NumericInput>,
    pub longitude: Option<NumericInput>,
    pub link: Option<String>,
    pub price: Option<NumericInput>,
    pub description: Option<String>,
    pub datetime: Option<DateTime<Utc>>,
}

impl EventCandidate {
    /// The key this candidate would occupy, or `None` while any part of it is
    /// missing or unparseable.
    pub fn uniqueness_key(&self) -> Option<UniquenessKey> {
        let name = self.name.as_deref().filter(|n| !n.trim().is_empty())?;
        let latitude = self.latitude.as_ref()?.as_f64()?;
        let longitude = self.longitude.as_ref()?.as_f64()?;
        let datetime = self.datetime?;
        Some(UniquenessKey::new(latitude, longitude, name, datetime))
    }
}

/// Wire shape of a candidate in JSON import files.
///
/// `datetime` stays text here because naive values need the configured zone.
/// A value of the wrong JSON type is coerced rather than failing the whole file,
/// so only the offending record gets rejected.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct EventSubmission {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "lenient_text")]
    pub category: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub venue: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub address: Option<String>,
    pub latitude: Option<NumericInput>,
    pub longitude: Option<NumericInput>,
    #[serde(deserialize_with = "lenient_text")]
    pub link: Option<String>,
    pub price: Option<NumericInput>,
    #[serde(deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub datetime: Option<String>,
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_i64())
}

impl EventSubmission {
    /// An unreadable datetime becomes `None` and is reported as missing.
    pub fn into_candidate(self, tz: Tz) -> EventCandidate {
        let datetime = self
            .datetime
            .as_deref()
            .and_then(|text| utils::parse_datetime(text, tz));
        EventCandidate {
            id: self.id,
            category: self.category,
            name: self.name,
            venue: self.venue,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            link: self.link,
            price: self.price,
            description: self.description,
            datetime,
        }
    }
}

/// (latitude, longitude, lowercased name, datetime).
#[derive(Clone, Debug, PartialEq)]
pub struct UniquenessKey {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub datetime: DateTime<Utc>,
}

impl UniquenessKey {
    pub fn new(latitude: f64, longitude: f64, name: &str, datetime: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            name: name.to_lowercase(),
            datetime,
        }
    }

    /// Stable hex digest, equal for two keys exactly when the keys compare equal.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{:016x}", canonical_bits(self.latitude)).as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{:016x}", canonical_bits(self.longitude)).as_bytes());
        hasher.update(b"|");
        hasher.update(self.name.as_bytes());
        hasher.update(b"|");
        hasher.update(
            self.datetime
                .to_rfc3339_opts(SecondsFormat::Nanos, true)
                .as_bytes(),
        );
        format!("{:x}", hasher.finalize())
    }
}

// -0.0 == 0.0 as f64, so both must hash the same.
fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}
