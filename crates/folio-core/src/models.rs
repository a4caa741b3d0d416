//! Content record types and the recycle-bin entry shape.
//!
//! Every live record belongs to exactly one collection. The [`Entity`] enum
//! is the tagged union over all of them and is what the stores, the
//! lifecycle manager and the HTTP layer pass around. Records serialize as
//! camelCase JSON, which is also the format archived into the recycle bin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collection::CollectionType;

/// An image embedded by value inside a content record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct About {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default)]
    pub additional_images: Vec<ImageReference>,
    #[serde(default)]
    pub additional_description: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default)]
    pub additional_images: Vec<ImageReference>,
    /// Comma-separated list, kept verbatim.
    #[serde(default)]
    pub technologies: Option<String>,
    #[serde(default)]
    pub additional_description: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub title: String,
    pub description: String,
    pub main_image: String,
    #[serde(default)]
    pub additional_images: Vec<ImageReference>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Skills carry a single optional image instead of a gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    pub name: String,
    /// Free-form, e.g. `"80%"` or `"Expert"`.
    pub proficiency: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default)]
    pub additional_images: Vec<ImageReference>,
    #[serde(default)]
    pub additional_description: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: String,
    pub title: String,
    pub issuing_organization: String,
    pub issue_date: DateTime<Utc>,
    pub main_image: String,
    #[serde(default)]
    pub additional_images: Vec<ImageReference>,
    /// Comma-separated skills tag string.
    #[serde(default)]
    pub skills: Option<String>,
    #[serde(default)]
    pub additional_description: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// A message submitted through the public contact form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Any record held by the entity store, tagged by its collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    About(About),
    Project(Project),
    Service(Service),
    Skill(Skill),
    Blog(Blog),
    Certificate(Certificate),
    Contact(Contact),
}

impl Entity {
    /// Decode a JSON payload as a record of the given collection.
    ///
    /// Unknown fields are ignored, so snapshots carrying fields from an
    /// older schema still decode.
    pub fn from_payload(collection: CollectionType, payload: Value) -> serde_json::Result<Self> {
        Ok(match collection {
            CollectionType::About => Entity::About(serde_json::from_value(payload)?),
            CollectionType::Project => Entity::Project(serde_json::from_value(payload)?),
            CollectionType::Service => Entity::Service(serde_json::from_value(payload)?),
            CollectionType::Skill => Entity::Skill(serde_json::from_value(payload)?),
            CollectionType::Blog => Entity::Blog(serde_json::from_value(payload)?),
            CollectionType::Certificate => Entity::Certificate(serde_json::from_value(payload)?),
            CollectionType::Contact => Entity::Contact(serde_json::from_value(payload)?),
        })
    }

    /// Encode the record (without its tag) as a JSON object.
    pub fn to_payload(&self) -> serde_json::Result<Value> {
        match self {
            Entity::About(r) => serde_json::to_value(r),
            Entity::Project(r) => serde_json::to_value(r),
            Entity::Service(r) => serde_json::to_value(r),
            Entity::Skill(r) => serde_json::to_value(r),
            Entity::Blog(r) => serde_json::to_value(r),
            Entity::Certificate(r) => serde_json::to_value(r),
            Entity::Contact(r) => serde_json::to_value(r),
        }
    }

    pub fn collection_type(&self) -> CollectionType {
        match self {
            Entity::About(_) => CollectionType::About,
            Entity::Project(_) => CollectionType::Project,
            Entity::Service(_) => CollectionType::Service,
            Entity::Skill(_) => CollectionType::Skill,
            Entity::Blog(_) => CollectionType::Blog,
            Entity::Certificate(_) => CollectionType::Certificate,
            Entity::Contact(_) => CollectionType::Contact,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::About(r) => &r.id,
            Entity::Project(r) => &r.id,
            Entity::Service(r) => &r.id,
            Entity::Skill(r) => &r.id,
            Entity::Blog(r) => &r.id,
            Entity::Certificate(r) => &r.id,
            Entity::Contact(r) => &r.id,
        }
    }

    /// Value of the collection's canonical sort field.
    pub fn sort_value(&self) -> DateTime<Utc> {
        match self {
            Entity::About(r) => r.updated_at,
            Entity::Project(r) => r.updated_at,
            Entity::Service(r) => r.updated_at,
            Entity::Skill(r) => r.created_at,
            Entity::Blog(r) => r.created_at,
            Entity::Certificate(r) => r.updated_at,
            Entity::Contact(r) => r.created_at,
        }
    }

    /// Refresh the last-update timestamp on types that carry one.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        match self {
            Entity::About(r) => r.updated_at = now,
            Entity::Project(r) => r.updated_at = now,
            Entity::Service(r) => r.updated_at = now,
            Entity::Skill(r) => r.updated_at = now,
            Entity::Certificate(r) => r.updated_at = now,
            Entity::Blog(_) | Entity::Contact(_) => {}
        }
    }

    /// Every non-empty image URL referenced by the record.
    pub fn image_urls(&self) -> Vec<&str> {
        fn gallery<'a>(main: Option<&'a str>, extra: &'a [ImageReference]) -> Vec<&'a str> {
            main.into_iter()
                .chain(extra.iter().map(|img| img.url.as_str()))
                .filter(|url| !url.is_empty())
                .collect()
        }

        match self {
            Entity::About(r) => gallery(r.main_image.as_deref(), &r.additional_images),
            Entity::Project(r) => gallery(r.main_image.as_deref(), &r.additional_images),
            Entity::Service(r) => gallery(Some(&r.main_image), &r.additional_images),
            Entity::Blog(r) => gallery(r.main_image.as_deref(), &r.additional_images),
            Entity::Certificate(r) => gallery(Some(&r.main_image), &r.additional_images),
            Entity::Skill(r) => r.image.as_deref().into_iter().filter(|u| !u.is_empty()).collect(),
            Entity::Contact(_) => Vec::new(),
        }
    }
}

/// An archived record awaiting restore or purge.
///
/// `collection_type` is kept as the raw tag string: entries written by an
/// older build may name a type that is no longer in the dispatch table, and
/// they must still be listable and purgeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecycleBinEntry {
    pub id: String,
    pub collection_type: String,
    /// Full snapshot of the record at deletion time.
    pub item: Value,
    pub deleted_at: DateTime<Utc>,
    pub original_sort_field: String,
    pub original_sort_value: Value,
}
