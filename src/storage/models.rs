use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Non-attachment columns of an owning record. Opaque to this crate.
pub type Fields = HashMap<String, serde_json::Value>;

/// Three-state change to a nullable column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// Leave the column as it is.
    #[default]
    Absent,
    /// Set the column to null.
    Null,
    /// Set the column to a new value.
    Value(T),
}

/// The kinds of record that own an attachment. Each kind binds into exactly
/// one attachment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Expenditure,
    PlacementApplication,
    StudentInternship,
}

impl OwnerKind {
    pub const ALL: [OwnerKind; 3] = [
        OwnerKind::StudentInternship,
        OwnerKind::Expenditure,
        OwnerKind::PlacementApplication,
    ];

    /// Name of the attachment category this kind's binding points into.
    pub fn category_name(self) -> &'static str {
        match self {
            OwnerKind::Expenditure => "bills",
            OwnerKind::PlacementApplication => "offer-letters",
            OwnerKind::StudentInternship => "certificates",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OwnerKind::Expenditure => "expenditure",
            OwnerKind::PlacementApplication => "placement_application",
            OwnerKind::StudentInternship => "student_internship",
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An owning record as stored in redb
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub id: String,
    pub kind: OwnerKind,
    /// Binding: name of the stored file in the kind's category, if any
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default)]
    pub fields: Fields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnerRecord {
    pub fn new(kind: OwnerKind, id: &str, attachment: Option<String>, fields: Fields) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            kind,
            attachment,
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    /// The bound file name. Empty strings written by older tooling count as unbound.
    pub fn binding(&self) -> Option<&str> {
        self.attachment.as_deref().filter(|name| !name.is_empty())
    }
}
