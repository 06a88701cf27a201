//! Data models for tourdesk resources.
//!
//! This module contains the server-defined entities and their create
//! requests:
//!
//! - `Car`: fleet vehicles with fuel/drive/transmission enumerations
//! - `Destination`: places with a type and a geographic region
//! - `TourPackage`: priced packages with an itinerary
//! - `StaffMember`, `StaffRole`: staff accounts and their permissions
//!
//! Entities are immutable snapshots; the cache replaces whole collections.

use crate::error::ValidationError;
use crate::mutation::MutationRequest;

/// Declares a closed enumeration with its wire strings.
macro_rules! closed_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[cfg_attr(feature = "ts", derive(ts_rs::TS))]
        #[cfg_attr(feature = "ts", ts(export))]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            /// Title-cased text for selection lists.
            pub fn label(self) -> String {
                $crate::models::to_label(self.as_str())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err($crate::error::ValidationError::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub mod car;
pub mod destination;
pub mod staff;
pub mod tour_package;

pub use car::{Car, CreateCar, DriveType, FuelType, TransmissionType};
pub use destination::{CreateDestination, Destination, DestinationType, Region};
pub use staff::{CreateStaffMember, CreateStaffRole, StaffMember, StaffPermission, StaffRole};
pub use tour_package::{CreateTourPackage, ItineraryItem, TourPackage};

/// A server-side resource collection.
pub trait Resource {
    /// Cache key of the collection.
    const KEY: &'static str;
    /// REST path for listing and creating.
    const PATH: &'static str;
}

/// A validated create operation for a resource.
pub trait CreateRequest {
    type Entity: Resource;

    /// Run pre-flight validation and build the mutation.
    fn into_request(self) -> Result<MutationRequest, ValidationError>;
}

/// Entities searchable by name.
pub trait Named {
    fn name(&self) -> &str;
}

/// Case-insensitive substring search on entity names. An empty query matches everything.
pub fn filter_by_name<'a, T: Named>(items: &'a [T], query: &str) -> Vec<&'a T> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return items.iter().collect();
    }
    items
        .iter()
        .filter(|item| item.name().to_lowercase().contains(&query))
        .collect()
}

/// Capitalize the first letter of each word: `"national park"` -> `"National Park"`.
pub fn to_label(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Error unless `value` has non-whitespace content.
pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField { field })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item(&'static str);

    impl Named for Item {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_filter_by_name() {
        let items = [Item("Murchison Falls"), Item("Jinja"), Item("Kidepo Valley")];
        let found = filter_by_name(&items, "  FALLS ");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "Murchison Falls");

        assert_eq!(filter_by_name(&items, "").len(), 3);
        assert!(filter_by_name(&items, "zanzibar").is_empty());
    }

    #[test]
    fn test_to_label() {
        assert_eq!(to_label("national park"), "National Park");
        assert_eq!(to_label("4wd"), "4wd");
        assert_eq!(to_label(""), "");
    }
}
