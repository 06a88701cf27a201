//! Priced tour packages and their itineraries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::mutation::{Attachment, EncodingTable, FieldSpec, MutationRequest, Payload};

use super::{require_text, CreateRequest, Named, Resource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct TourPackage {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "pricePerPersonUgx")]
    pub price_per_person_ugx: f64,
    #[serde(rename = "pricePerPersonUsd")]
    pub price_per_person_usd: f64,
    #[serde(rename = "primaryPhotoUrl")]
    pub primary_photo_url: String,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resource for TourPackage {
    const KEY: &'static str = "tour-packages";
    const PATH: &'static str = "/tour-packages";
}

impl Named for TourPackage {
    fn name(&self) -> &str {
        &self.name
    }
}

/// One day or stop of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ItineraryItem {
    pub name: String,
    pub description: String,
}

impl ItineraryItem {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Both name and description have content.
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.description.trim().is_empty()
    }
}

pub const CREATE_TOUR_PACKAGE_FIELDS: EncodingTable = &[
    FieldSpec::scalar("name"),
    FieldSpec::scalar("description"),
    FieldSpec::scalar("pricePerPersonUgx"),
    FieldSpec::scalar("pricePerPersonUsd"),
    FieldSpec::json("itinerary"),
    FieldSpec::file("photo"),
    FieldSpec::files("photos"),
];

#[derive(Debug, Clone, Default)]
pub struct CreateTourPackage {
    pub name: String,
    pub description: String,
    pub price_per_person_ugx: u64,
    pub price_per_person_usd: u64,
    /// Form rows; incomplete rows are dropped before sending.
    pub itinerary: Vec<ItineraryItem>,
    pub photo: Option<Attachment>,
    pub photos: Vec<Attachment>,
}

impl CreateRequest for CreateTourPackage {
    type Entity = TourPackage;

    fn into_request(self) -> Result<MutationRequest, ValidationError> {
        require_text("name", &self.name)?;
        require_text("description", &self.description)?;
        let photo = self.photo.ok_or(ValidationError::MissingFile("primary photo"))?;

        let itinerary: Vec<ItineraryItem> = self
            .itinerary
            .into_iter()
            .filter(ItineraryItem::is_complete)
            .collect();
        if itinerary.is_empty() {
            return Err(ValidationError::EmptyItinerary);
        }

        let payload = Payload::new()
            .scalar("name", self.name)
            .scalar("description", self.description)
            .scalar("pricePerPersonUgx", self.price_per_person_ugx)
            .scalar("pricePerPersonUsd", self.price_per_person_usd)
            .json("itinerary", &itinerary)
            .map_err(|_| ValidationError::WrongEncoding {
                field: "itinerary".to_string(),
                expected: "a JSON blob",
            })?
            .file("photo", photo)
            .files("photos", self.photos);

        Ok(MutationRequest::new(TourPackage::PATH, CREATE_TOUR_PACKAGE_FIELDS, payload)
            .invalidates(TourPackage::KEY))
    }
}
