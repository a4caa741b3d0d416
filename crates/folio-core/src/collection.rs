//! Collection-type dispatch table.
//!
//! [`COLLECTIONS`] is the single source of truth consulted by every
//! lifecycle and content operation: which store collection a type lives in,
//! its HTTP route segment, the asset folder its images were uploaded to,
//! which field orders it, where its images are, and which fields a restored
//! or created record must carry.
//!
//! | Type | Collection / route | Asset folder | Sort field | Images |
//! |------|--------------------|--------------|------------|--------|
//! | About | `about` | `about` | `updatedAt` | gallery |
//! | Project | `projects` | `projects` | `updatedAt` | gallery |
//! | Service | `services` | `services` | `updatedAt` | gallery |
//! | Skill | `skills` | `skills` | `createdAt` | single |
//! | Blog | `blog` | `blog` | `createdAt` | gallery |
//! | Certificate | `certificates` | `certificates` | `updatedAt` | gallery |
//! | Contact | `contacts` | — | `createdAt` | none |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The origin collection of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionType {
    About,
    Project,
    Service,
    Skill,
    Blog,
    Certificate,
    Contact,
}

impl CollectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionType::About => "About",
            CollectionType::Project => "Project",
            CollectionType::Service => "Service",
            CollectionType::Skill => "Skill",
            CollectionType::Blog => "Blog",
            CollectionType::Certificate => "Certificate",
            CollectionType::Contact => "Contact",
        }
    }

    /// The dispatch-table row for this type.
    pub fn info(&self) -> &'static CollectionInfo {
        // Rows are ordered like the enum variants.
        &COLLECTIONS[*self as usize]
    }

    /// Look up a type by its HTTP route segment (e.g. `"projects"`).
    pub fn from_route(route: &str) -> Option<Self> {
        COLLECTIONS
            .iter()
            .find(|info| info.route == route)
            .map(|info| info.collection_type)
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a tag has no row in [`COLLECTIONS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCollectionType(pub String);

impl fmt::Display for UnknownCollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown collection type: {}", self.0)
    }
}

impl std::error::Error for UnknownCollectionType {}

impl FromStr for CollectionType {
    type Err = UnknownCollectionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        COLLECTIONS
            .iter()
            .find(|info| info.collection_type.as_str() == s)
            .map(|info| info.collection_type)
            .ok_or_else(|| UnknownCollectionType(s.to_string()))
    }
}

/// Where a record keeps its image URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    /// `mainImage` plus `additionalImages[].url`.
    Gallery,
    /// A single `image` field.
    Single,
    /// No images.
    None,
}

impl ImageLayout {
    /// Collect the non-empty image URLs from a raw JSON snapshot.
    ///
    /// Works on untyped payloads so that archived snapshots from an older
    /// schema can still have their assets cleaned up.
    pub fn urls_in(&self, item: &Value) -> Vec<String> {
        let non_empty = |v: Option<&Value>| {
            v.and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match self {
            ImageLayout::Gallery => {
                let mut urls: Vec<String> = non_empty(item.get("mainImage")).into_iter().collect();
                if let Some(images) = item.get("additionalImages").and_then(Value::as_array) {
                    urls.extend(images.iter().filter_map(|img| non_empty(img.get("url"))));
                }
                urls
            }
            ImageLayout::Single => non_empty(item.get("image")).into_iter().collect(),
            ImageLayout::None => Vec::new(),
        }
    }
}

/// One row of the dispatch table.
#[derive(Debug)]
pub struct CollectionInfo {
    pub collection_type: CollectionType,
    /// Entity-store collection name; also the SQLite table name.
    pub collection: &'static str,
    /// Path segment under `/api/`.
    pub route: &'static str,
    /// Asset-store folder the type's images are uploaded into.
    pub asset_folder: Option<&'static str>,
    pub sort_field: &'static str,
    pub image_layout: ImageLayout,
    /// Fields that must be present, non-null and non-empty.
    pub required_fields: &'static [&'static str],
    /// Fields from older schemas dropped before a snapshot is restored.
    pub legacy_fields: &'static [&'static str],
}

/// Fields that carry store identity and never survive a restore.
pub const IDENTITY_FIELDS: &[&str] = &["id", "_id", "__v"];

pub static COLLECTIONS: &[CollectionInfo] = &[
    CollectionInfo {
        collection_type: CollectionType::About,
        collection: "about",
        route: "about",
        asset_folder: Some("about"),
        sort_field: "updatedAt",
        image_layout: ImageLayout::Gallery,
        required_fields: &["title", "description"],
        legacy_fields: &[],
    },
    CollectionInfo {
        collection_type: CollectionType::Project,
        collection: "projects",
        route: "projects",
        asset_folder: Some("projects"),
        sort_field: "updatedAt",
        image_layout: ImageLayout::Gallery,
        required_fields: &["title", "description"],
        legacy_fields: &[],
    },
    CollectionInfo {
        collection_type: CollectionType::Service,
        collection: "services",
        route: "services",
        asset_folder: Some("services"),
        sort_field: "updatedAt",
        image_layout: ImageLayout::Gallery,
        required_fields: &["title", "description", "mainImage"],
        legacy_fields: &[],
    },
    CollectionInfo {
        collection_type: CollectionType::Skill,
        collection: "skills",
        route: "skills",
        asset_folder: Some("skills"),
        sort_field: "createdAt",
        image_layout: ImageLayout::Single,
        required_fields: &["name", "proficiency"],
        legacy_fields: &[],
    },
    CollectionInfo {
        collection_type: CollectionType::Blog,
        collection: "blog",
        route: "blog",
        asset_folder: Some("blog"),
        sort_field: "createdAt",
        image_layout: ImageLayout::Gallery,
        required_fields: &["title", "content"],
        legacy_fields: &[],
    },
    CollectionInfo {
        collection_type: CollectionType::Certificate,
        collection: "certificates",
        route: "certificates",
        asset_folder: Some("certificates"),
        sort_field: "updatedAt",
        image_layout: ImageLayout::Gallery,
        required_fields: &["title", "issuingOrganization", "issueDate", "mainImage"],
        legacy_fields: &["credentialUrl"],
    },
    CollectionInfo {
        collection_type: CollectionType::Contact,
        collection: "contacts",
        route: "contacts",
        asset_folder: None,
        sort_field: "createdAt",
        image_layout: ImageLayout::None,
        required_fields: &["name", "email", "message"],
        legacy_fields: &[],
    },
];

impl CollectionInfo {
    /// Names of required fields that are missing, null, or empty strings.
    pub fn missing_fields(&self, payload: &Value) -> Vec<&'static str> {
        self.required_fields
            .iter()
            .copied()
            .filter(|field| match payload.get(*field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .collect()
    }

    /// Remove this type's legacy fields from a JSON object in place.
    pub fn strip_legacy(&self, payload: &mut Value) {
        strip_fields(payload, self.legacy_fields);
    }
}

/// Remove the named keys from a JSON object; non-objects are left alone.
pub fn strip_fields(payload: &mut Value, fields: &[&str]) {
    if let Some(obj) = payload.as_object_mut() {
        for field in fields {
            obj.remove(*field);
        }
    }
}
