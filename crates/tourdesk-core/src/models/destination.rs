use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::mutation::{Attachment, EncodingTable, FieldSpec, MutationRequest, Payload};

use super::{CreateRequest, Named, Resource};

closed_enum!(DestinationType, "destination type" {
    NationalPark => "national park",
    City => "city",
    Waterfall => "waterfall",
    CulturalSite => "cultural site",
    HistoricalSite => "historical site",
    AdventureSpot => "adventure spot",
    Mountain => "mountain",
    Beach => "beach",
    Lake => "lake",
    River => "river",
});

closed_enum!(Region, "region" {
    Central => "central",
    Eastern => "eastern",
    Northern => "northern",
    Western => "western",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Destination {
    pub id: String,
    pub name: String,
    #[serde(rename = "photoUrl")]
    pub photo_url: String,
    pub district: String,
    #[serde(rename = "type")]
    pub destination_type: DestinationType,
    pub region: Region,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Resource for Destination {
    const KEY: &'static str = "destinations";
    const PATH: &'static str = "/destinations";
}

impl Named for Destination {
    fn name(&self) -> &str {
        &self.name
    }
}

pub const CREATE_DESTINATION_FIELDS: EncodingTable = &[
    FieldSpec::scalar("name"),
    FieldSpec::scalar("description"),
    FieldSpec::scalar("region"),
    FieldSpec::scalar("district"),
    FieldSpec::scalar("type"),
    FieldSpec::file("photo"),
];

#[derive(Debug, Clone, Default)]
pub struct CreateDestination {
    pub name: String,
    pub description: String,
    pub region: Option<Region>,
    pub district: String,
    pub destination_type: Option<DestinationType>,
    pub photo: Option<Attachment>,
}

impl CreateRequest for CreateDestination {
    type Entity = Destination;

    fn into_request(self) -> Result<MutationRequest, ValidationError> {
        let region = self.region.ok_or(ValidationError::MissingSelection("region"))?;
        let destination_type = self
            .destination_type
            .ok_or(ValidationError::MissingSelection("destination type"))?;
        let photo = self.photo.ok_or(ValidationError::MissingFile("photo"))?;

        let payload = Payload::new()
            .scalar("name", self.name)
            .scalar("description", self.description)
            .scalar("region", region.as_str())
            .scalar("district", self.district)
            .scalar("type", destination_type.as_str())
            .file("photo", photo);

        Ok(MutationRequest::new(Destination::PATH, CREATE_DESTINATION_FIELDS, payload)
            .invalidates(Destination::KEY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{EncodedBody, PartContent};

    fn jinja() -> CreateDestination {
        CreateDestination {
            name: "Jinja".to_string(),
            description: "Source of the Nile".to_string(),
            region: Some(Region::Eastern),
            district: "Jinja".to_string(),
            destination_type: Some(DestinationType::Waterfall),
            photo: Some(Attachment::image("nile.jpg", vec![0xff, 0xd8, 0xff])),
        }
    }

    #[test]
    fn test_jinja_encodes_five_scalars_and_one_photo() {
        let body = jinja().into_request().expect("valid form").encode().expect("encodes");
        let EncodedBody::Multipart(parts) = body else {
            panic!("expected multipart");
        };

        assert_eq!(parts.len(), 6);
        let scalars: Vec<(&str, &str)> = parts
            .iter()
            .filter_map(|p| p.as_text().map(|text| (p.name.as_str(), text)))
            .collect();
        assert_eq!(
            scalars,
            vec![
                ("name", "Jinja"),
                ("description", "Source of the Nile"),
                ("region", "eastern"),
                ("district", "Jinja"),
                ("type", "waterfall"),
            ]
        );

        let photo = &parts[5];
        assert_eq!(photo.name, "photo");
        match &photo.content {
            PartContent::File(file) => {
                assert_eq!(file.file_name, "nile.jpg");
                assert_eq!(file.mime_type, "image/jpeg");
                assert_eq!(&file.bytes[..], &[0xff, 0xd8, 0xff]);
            }
            PartContent::Text(_) => panic!("photo should be a file part"),
        }
    }

    #[test]
    fn test_region_required() {
        let mut form = jinja();
        form.region = None;
        let err = form.into_request().expect_err("region missing");
        assert_eq!(err.to_string(), "Please select a region");
    }

    #[test]
    fn test_parse_destination() {
        let json = r#"{"id":"d1","name":"Kidepo Valley","photoUrl":"https://cdn/d1.jpg","district":"Kaabong","type":"national park","region":"northern","createdAt":"2025-02-01T08:30:00Z"}"#;
        let destination: Destination = serde_json::from_str(json).expect("destination parses");
        assert_eq!(destination.destination_type, DestinationType::NationalPark);
        assert_eq!(destination.region, Region::Northern);
    }

    #[test]
    fn test_destination_type_from_wire() {
        assert_eq!("adventure spot".parse::<DestinationType>(), Ok(DestinationType::AdventureSpot));
        assert!("desert".parse::<DestinationType>().is_err());
        assert_eq!(DestinationType::ALL.len(), 10);
        assert_eq!(DestinationType::HistoricalSite.label(), "Historical Site");
    }
}
