//! Staff accounts and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::mutation::{Attachment, EncodingTable, FieldSpec, MutationRequest, Payload};

use super::{require_text, CreateRequest, Named, Resource};

closed_enum!(StaffPermission, "staff permission" {
    ManageCars => "manage_cars",
    ManageDestinations => "manage_destinations",
    ManageTourPackages => "manage_tour_packages",
    ManageStaff => "manage_staff",
    ViewReports => "view_reports",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct StaffRole {
    pub id: String,
    pub name: String,
    /// Raw permission strings as stored by the server.
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl StaffRole {
    /// Permissions this client knows about; unrecognised strings are skipped.
    pub fn known_permissions(&self) -> Vec<StaffPermission> {
        self.permissions.iter().filter_map(|p| p.parse().ok()).collect()
    }
}

impl Resource for StaffRole {
    const KEY: &'static str = "staff-roles";
    const PATH: &'static str = "/staff/roles";
}

impl Named for StaffRole {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct StaffMember {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    #[serde(rename = "photoUrl")]
    pub photo_url: String,
    pub role: StaffRole,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Resource for StaffMember {
    const KEY: &'static str = "staff";
    const PATH: &'static str = "/staff";
}

impl Named for StaffMember {
    fn name(&self) -> &str {
        &self.name
    }
}

pub const CREATE_STAFF_MEMBER_FIELDS: EncodingTable = &[
    FieldSpec::scalar("name"),
    FieldSpec::scalar("phoneNumber"),
    FieldSpec::scalar("password"),
    FieldSpec::scalar("roleId"),
    FieldSpec::file("photo"),
];

pub const CREATE_STAFF_ROLE_FIELDS: EncodingTable = &[FieldSpec::scalar("name"), FieldSpec::json("permissions")];

#[derive(Clone, Default)]
pub struct CreateStaffMember {
    pub name: String,
    pub phone_number: String,
    pub password: String,
    pub role_id: Option<String>,
    pub photo: Option<Attachment>,
}

impl std::fmt::Debug for CreateStaffMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateStaffMember")
            .field("name", &self.name)
            .field("phone_number", &self.phone_number)
            .field("password", &"[REDACTED]")
            .field("role_id", &self.role_id)
            .field("photo", &self.photo.as_ref().map(|p| &p.file_name))
            .finish()
    }
}

impl CreateRequest for CreateStaffMember {
    type Entity = StaffMember;

    fn into_request(self) -> Result<MutationRequest, ValidationError> {
        require_text("name", &self.name)?;
        require_text("phoneNumber", &self.phone_number)?;
        require_text("password", &self.password)?;
        let role_id = self
            .role_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ValidationError::MissingSelection("role"))?;
        let photo = self.photo.ok_or(ValidationError::MissingFile("photo"))?;

        let payload = Payload::new()
            .scalar("name", self.name)
            .scalar("phoneNumber", self.phone_number)
            .scalar("password", self.password)
            .scalar("roleId", role_id)
            .file("photo", photo);

        Ok(MutationRequest::new(StaffMember::PATH, CREATE_STAFF_MEMBER_FIELDS, payload)
            .invalidates(StaffMember::KEY))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateStaffRole {
    pub name: String,
    pub permissions: Vec<StaffPermission>,
}

impl CreateStaffRole {
    /// Build from raw permission strings, rejecting any outside the known set.
    pub fn from_strings<S: AsRef<str>>(name: impl Into<String>, permissions: &[S]) -> Result<Self, ValidationError> {
        let permissions = permissions
            .iter()
            .map(|p| p.as_ref().parse())
            .collect::<Result<Vec<StaffPermission>, _>>()?;
        Ok(Self {
            name: name.into(),
            permissions,
        })
    }
}

impl CreateRequest for CreateStaffRole {
    type Entity = StaffRole;

    fn into_request(self) -> Result<MutationRequest, ValidationError> {
        require_text("name", &self.name)?;

        let payload = Payload::new()
            .scalar("name", self.name)
            .json("permissions", &self.permissions)
            .map_err(|_| ValidationError::WrongEncoding {
                field: "permissions".to_string(),
                expected: "a JSON blob",
            })?;

        Ok(MutationRequest::new(StaffRole::PATH, CREATE_STAFF_ROLE_FIELDS, payload).invalidates(StaffRole::KEY))
    }
}
