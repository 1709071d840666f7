//! Core data models used throughout Cardkeep.
//!
//! [`ContactRecord`] is the only persisted entity. [`NewContact`] is a record
//! that has not been assigned an id yet, and [`ExtractedFields`] is the
//! transient result of one extraction call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Clockwise rotation (in degrees) needed to make a card's text upright.
///
/// Only the four cardinal angles exist. Storage reads and extraction replies
/// are repaired with [`Rotation::from_degrees`]. Deserialization (user edits
/// over JSON) is strict and rejects anything but 0, 90, 180, or 270.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Rotation {
    #[default]
    Upright,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    /// Normalize an arbitrary integer angle.
    ///
    /// Angles congruent to a cardinal angle modulo 360 map to it
    /// (`-90` becomes `270`, `450` becomes `90`); every other value maps to
    /// [`Rotation::Upright`].
    pub fn from_degrees(degrees: i64) -> Self {
        match degrees.rem_euclid(360) {
            90 => Rotation::Quarter,
            180 => Rotation::Half,
            270 => Rotation::ThreeQuarter,
            _ => Rotation::Upright,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Upright => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }

    /// The next orientation when the user taps "rotate" (90° clockwise).
    pub fn rotate_clockwise(self) -> Self {
        Self::from_degrees(i64::from(self.degrees()) + 90)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid rotation {0}: must be 0, 90, 180, or 270")]
pub struct InvalidRotation(pub i64);

impl TryFrom<i64> for Rotation {
    type Error = InvalidRotation;

    fn try_from(degrees: i64) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Upright),
            90 => Ok(Rotation::Quarter),
            180 => Ok(Rotation::Half),
            270 => Ok(Rotation::ThreeQuarter),
            other => Err(InvalidRotation(other)),
        }
    }
}

impl From<Rotation> for i64 {
    fn from(rotation: Rotation) -> Self {
        i64::from(rotation.degrees())
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// A contact as stored in the `contacts` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Store-assigned, never reused after deletion.
    pub id: i64,
    /// De-duplication key. Never empty for a stored record.
    pub name: String,
    pub title: String,
    pub company: String,
    /// Office phone.
    pub phone: String,
    pub mobile_phone: String,
    pub email: String,
    pub address: String,
    pub website: String,
    /// Base64 of the crop-stage card image. Written once, at creation.
    pub image_data: Option<String>,
    pub suggested_rotation: Rotation,
    /// Set by the store at creation and never changed afterwards.
    pub created_at: DateTime<Utc>,
}

/// A contact that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub title: String,
    pub company: String,
    pub phone: String,
    pub mobile_phone: String,
    pub email: String,
    pub address: String,
    pub website: String,
    pub image_data: Option<String>,
    pub suggested_rotation: Rotation,
}

impl NewContact {
    /// Build the record to persist from one extraction and its card image.
    pub fn from_extracted(fields: ExtractedFields, image_data: Option<String>) -> Self {
        Self {
            name: fields.name,
            title: fields.title,
            company: fields.company,
            phone: fields.phone,
            mobile_phone: fields.mobile_phone,
            email: fields.email,
            address: fields.address,
            website: fields.website,
            image_data,
            suggested_rotation: fields.suggested_rotation,
        }
    }

    /// Attach the store-assigned identity.
    pub fn into_record(self, id: i64, created_at: DateTime<Utc>) -> ContactRecord {
        ContactRecord {
            id,
            name: self.name,
            title: self.title,
            company: self.company,
            phone: self.phone,
            mobile_phone: self.mobile_phone,
            email: self.email,
            address: self.address,
            website: self.website,
            image_data: self.image_data,
            suggested_rotation: self.suggested_rotation,
            created_at,
        }
    }
}

/// Fields read off a card by the extractor. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub suggested_rotation: Rotation,
    pub name: String,
    pub title: String,
    pub company: String,
    pub phone: String,
    pub mobile_phone: String,
    pub email: String,
    pub address: String,
    pub website: String,
}

/// A user edit: `Some` replaces the field, `None` leaves it alone.
///
/// The image and the creation time are not editable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactEdit {
    pub name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub suggested_rotation: Option<Rotation>,
}

impl ContactEdit {
    pub fn is_empty(&self) -> bool {
        self == &ContactEdit::default()
    }

    pub fn apply(self, record: &mut ContactRecord) {
        fn replace(slot: &mut String, value: Option<String>) {
            if let Some(v) = value {
                *slot = v;
            }
        }

        replace(&mut record.name, self.name);
        replace(&mut record.title, self.title);
        replace(&mut record.company, self.company);
        replace(&mut record.phone, self.phone);
        replace(&mut record.mobile_phone, self.mobile_phone);
        replace(&mut record.email, self.email);
        replace(&mut record.address, self.address);
        replace(&mut record.website, self.website);
        if let Some(rotation) = self.suggested_rotation {
            record.suggested_rotation = rotation;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_normalizes_congruent_angles() {
        assert_eq!(Rotation::from_degrees(0), Rotation::Upright);
        assert_eq!(Rotation::from_degrees(90), Rotation::Quarter);
        assert_eq!(Rotation::from_degrees(-90), Rotation::ThreeQuarter);
        assert_eq!(Rotation::from_degrees(450), Rotation::Quarter);
        assert_eq!(Rotation::from_degrees(720), Rotation::Upright);
    }

    #[test]
    fn test_rotation_non_cardinal_is_upright() {
        assert_eq!(Rotation::from_degrees(45), Rotation::Upright);
        assert_eq!(Rotation::from_degrees(271), Rotation::Upright);
    }

    #[test]
    fn test_rotate_clockwise_cycles() {
        let mut r = Rotation::Upright;
        let mut seen = Vec::new();
        for _ in 0..4 {
            r = r.rotate_clockwise();
            seen.push(r.degrees());
        }
        assert_eq!(seen, vec![90, 180, 270, 0]);
    }

    #[test]
    fn test_rotation_serializes_as_integer() {
        let json = serde_json::to_string(&Rotation::Half).unwrap();
        assert_eq!(json, "180");
        let back: Rotation = serde_json::from_str("270").unwrap();
        assert_eq!(back, Rotation::ThreeQuarter);
    }

    #[test]
    fn test_rotation_deserialize_rejects_non_cardinal() {
        assert!(serde_json::from_str::<Rotation>("45").is_err());
        assert!(serde_json::from_str::<Rotation>("-90").is_err());
        assert_eq!(Rotation::try_from(271), Err(InvalidRotation(271)));

        let err = serde_json::from_str::<ContactEdit>(r#"{"suggested_rotation":45}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("invalid rotation 45"), "unexpected error: {err}");
    }

    #[test]
    fn test_edit_only_touches_given_fields() {
        let mut record = NewContact {
            name: "Jane Doe".into(),
            company: "Acme".into(),
            image_data: Some("aGk=".into()),
            ..Default::default()
        }
        .into_record(7, Utc::now());
        let created = record.created_at;

        ContactEdit {
            title: Some("CTO".into()),
            suggested_rotation: Some(Rotation::Half),
            ..Default::default()
        }
        .apply(&mut record);

        assert_eq!(record.id, 7);
        assert_eq!(record.name, "Jane Doe");
        assert_eq!(record.company, "Acme");
        assert_eq!(record.title, "CTO");
        assert_eq!(record.suggested_rotation, Rotation::Half);
        assert_eq!(record.image_data.as_deref(), Some("aGk="));
        assert_eq!(record.created_at, created);
    }

    #[test]
    fn test_edit_deserializes_partial_json() {
        let edit: ContactEdit =
            serde_json::from_str(r#"{"email":"j@acme.test","suggested_rotation":270}"#).unwrap();
        assert_eq!(edit.email.as_deref(), Some("j@acme.test"));
        assert_eq!(edit.suggested_rotation, Some(Rotation::ThreeQuarter));
        assert!(edit.name.is_none());
        assert!(ContactEdit::default().is_empty());
        assert!(!edit.is_empty());
    }
}
