//! Fleet vehicles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::mutation::{Attachment, EncodingTable, FieldSpec, MutationRequest, Payload};

use super::{CreateRequest, Named, Resource};

closed_enum!(FuelType, "fuel type" {
    Petrol => "petrol",
    Diesel => "diesel",
    Hybrid => "hybrid",
    Electric => "electric",
});

closed_enum!(DriveType, "drive type" {
    TwoWheel => "2wd",
    FourWheel => "4wd",
    AllWheel => "awd",
});

closed_enum!(TransmissionType, "transmission type" {
    Automatic => "automatic",
    Manual => "manual",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Car {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub seats: u32,
    #[serde(rename = "pricePerDayUsd")]
    pub price_per_day_usd: f64,
    #[serde(rename = "pricePerDayUgx")]
    pub price_per_day_ugx: f64,
    pub drive: DriveType,
    #[serde(rename = "fuelType")]
    pub fuel_type: FuelType,
    #[serde(rename = "transmissionType")]
    pub transmission_type: TransmissionType,
    #[serde(rename = "selfDriveAvailable", default)]
    pub self_drive_available: bool,
    #[serde(rename = "primaryPhotoUrl")]
    pub primary_photo_url: String,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Resource for Car {
    const KEY: &'static str = "cars";
    const PATH: &'static str = "/cars";
}

impl Named for Car {
    fn name(&self) -> &str {
        &self.name
    }
}

pub const CREATE_CAR_FIELDS: EncodingTable = &[
    FieldSpec::scalar("name"),
    FieldSpec::scalar("description"),
    FieldSpec::scalar("seats"),
    FieldSpec::scalar("pricePerDayUsd"),
    FieldSpec::scalar("pricePerDayUgx"),
    FieldSpec::scalar("drive"),
    FieldSpec::scalar("fuelType"),
    FieldSpec::scalar("transmissionType"),
    FieldSpec::scalar("selfDriveAvailable"),
    FieldSpec::file("photo"),
    FieldSpec::files("photos"),
];

/// Form input for adding a car. Selections start empty and must be chosen.
#[derive(Debug, Clone, Default)]
pub struct CreateCar {
    pub name: String,
    pub description: String,
    pub seats: u32,
    pub price_per_day_usd: u64,
    pub price_per_day_ugx: u64,
    pub drive: Option<DriveType>,
    pub fuel_type: Option<FuelType>,
    pub transmission_type: Option<TransmissionType>,
    pub self_drive_available: bool,
    pub photo: Option<Attachment>,
    pub photos: Vec<Attachment>,
}

impl CreateRequest for CreateCar {
    type Entity = Car;

    fn into_request(self) -> Result<MutationRequest, ValidationError> {
        let photo = self.photo.ok_or(ValidationError::MissingFile("photo"))?;
        let transmission = self
            .transmission_type
            .ok_or(ValidationError::MissingSelection("transmission type"))?;
        let fuel = self.fuel_type.ok_or(ValidationError::MissingSelection("fuel type"))?;
        let drive = self.drive.ok_or(ValidationError::MissingSelection("drive type"))?;

        let payload = Payload::new()
            .scalar("name", self.name)
            .scalar("description", self.description)
            .scalar("seats", self.seats)
            .scalar("pricePerDayUsd", self.price_per_day_usd)
            .scalar("pricePerDayUgx", self.price_per_day_ugx)
            .scalar("drive", drive.as_str())
            .scalar("fuelType", fuel.as_str())
            .scalar("transmissionType", transmission.as_str())
            .scalar("selfDriveAvailable", self.self_drive_available)
            .file("photo", photo)
            .files("photos", self.photos);

        Ok(MutationRequest::new(Car::PATH, CREATE_CAR_FIELDS, payload).invalidates(Car::KEY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{EncodedBody, PartContent};

    fn complete() -> CreateCar {
        CreateCar {
            name: "Land Cruiser".to_string(),
            description: "Safari ready".to_string(),
            seats: 7,
            price_per_day_usd: 120,
            price_per_day_ugx: 450000,
            drive: Some(DriveType::FourWheel),
            fuel_type: Some(FuelType::Diesel),
            transmission_type: Some(TransmissionType::Manual),
            self_drive_available: true,
            photo: Some(Attachment::image("cruiser.jpg", vec![1, 2, 3])),
            photos: vec![
                Attachment::image("side.jpg", vec![4]),
                Attachment::image("back.jpg", vec![5]),
            ],
        }
    }

    #[test]
    fn test_parse_car() {
        let json = r#"{"id":"c1","name":"Land Cruiser","description":"","seats":7,"pricePerDayUsd":120,"pricePerDayUgx":450000,"drive":"4wd","fuelType":"diesel","transmissionType":"manual","selfDriveAvailable":true,"primaryPhotoUrl":"https://cdn/c1.jpg","photos":["https://cdn/c1-2.jpg"],"createdAt":"2025-01-04T10:00:00Z"}"#;
        let car: Car = serde_json::from_str(json).expect("car parses");
        assert_eq!(car.drive, DriveType::FourWheel);
        assert_eq!(car.fuel_type, FuelType::Diesel);
        assert!(car.self_drive_available);
        assert_eq!(car.photos.len(), 1);
        assert!(car.created_at.is_some());
    }

    #[test]
    fn test_unknown_fuel_rejected() {
        let err = "kerosene".parse::<FuelType>().expect_err("not a fuel type");
        assert_eq!(
            err,
            ValidationError::UnknownVariant {
                kind: "fuel type",
                value: "kerosene".to_string()
            }
        );
        assert_eq!("awd".parse::<DriveType>(), Ok(DriveType::AllWheel));
    }

    #[test]
    fn test_missing_selection_is_rejected_before_sending() {
        let mut form = complete();
        form.fuel_type = None;
        assert_eq!(
            form.into_request().expect_err("fuel type missing"),
            ValidationError::MissingSelection("fuel type")
        );

        let mut form = complete();
        form.photo = None;
        assert_eq!(
            form.into_request().expect_err("photo missing"),
            ValidationError::MissingFile("photo")
        );
    }

    #[test]
    fn test_car_multipart_body() {
        let request = complete().into_request().expect("valid form");
        assert!(request.target_keys.contains(&"cars".into()));

        let EncodedBody::Multipart(parts) = request.encode().expect("encodes") else {
            panic!("expected multipart");
        };
        let text: Vec<(&str, Option<&str>)> =
            parts.iter().map(|p| (p.name.as_str(), p.as_text())).collect();
        assert_eq!(
            text,
            vec![
                ("name", Some("Land Cruiser")),
                ("description", Some("Safari ready")),
                ("seats", Some("7")),
                ("pricePerDayUsd", Some("120")),
                ("pricePerDayUgx", Some("450000")),
                ("drive", Some("4wd")),
                ("fuelType", Some("diesel")),
                ("transmissionType", Some("manual")),
                ("selfDriveAvailable", Some("true")),
                ("photo", None),
                ("photos", None),
                ("photos", None),
            ]
        );
        assert!(matches!(&parts[11].content, PartContent::File(f) if f.file_name == "back.jpg"));
    }

    #[test]
    fn test_labels() {
        assert_eq!(TransmissionType::Automatic.label(), "Automatic");
        assert_eq!(FuelType::ALL.len(), 4);
    }
}
