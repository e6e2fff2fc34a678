//! Attachment categories: named partitions with their own storage root and
//! accepted media types.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("Duplicate attachment category: {0}")]
    DuplicateName(String),
    #[error("Categories {first} and {second} overlap at storage root {root}")]
    SharedRoot {
        first: String,
        second: String,
        root: PathBuf,
    },
}

/// A media type a category accepts, with the extension stored files get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedType {
    pub media_type: &'static str,
    pub extension: &'static str,
}

/// Scanned documents: the set every built-in category accepts.
/// `image/jpg` is not registered but browsers still send it.
pub const DOCUMENT_TYPES: &[AcceptedType] = &[
    AcceptedType {
        media_type: "image/jpeg",
        extension: ".jpg",
    },
    AcceptedType {
        media_type: "image/jpg",
        extension: ".jpg",
    },
    AcceptedType {
        media_type: "image/png",
        extension: ".png",
    },
    AcceptedType {
        media_type: "application/pdf",
        extension: ".pdf",
    },
];

#[derive(Debug, Clone)]
pub struct AttachmentCategory {
    /// Stable identifier, e.g. `certificates`
    pub name: String,
    /// Leading segment of every generated file name, e.g. `cert`
    pub prefix: String,
    /// Directory holding this category's files and nothing else
    pub root: PathBuf,
    pub accepted: Vec<AcceptedType>,
    /// Whether an owning record may be created without an attachment
    pub required_on_create: bool,
}

impl AttachmentCategory {
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        root: impl Into<PathBuf>,
        accepted: &[AcceptedType],
    ) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            root: root.into(),
            accepted: accepted.to_vec(),
            required_on_create: false,
        }
    }

    pub fn require_on_create(mut self) -> Self {
        self.required_on_create = true;
        self
    }

    /// Internship completion certificates.
    pub fn certificates(upload_root: &Path) -> Self {
        Self::new(
            "certificates",
            "cert",
            upload_root.join("certificates"),
            DOCUMENT_TYPES,
        )
    }

    /// Expenditure bills. An expenditure is never recorded without one.
    pub fn bills(upload_root: &Path) -> Self {
        Self::new("bills", "bill", upload_root.join("expenditure"), DOCUMENT_TYPES)
            .require_on_create()
    }

    /// Placement offer letters.
    pub fn offer_letters(upload_root: &Path) -> Self {
        Self::new(
            "offer-letters",
            "offer",
            upload_root.join("offer-letters"),
            DOCUMENT_TYPES,
        )
    }

    pub fn builtin(upload_root: &Path) -> Vec<Self> {
        vec![
            Self::certificates(upload_root),
            Self::bills(upload_root),
            Self::offer_letters(upload_root),
        ]
    }

    /// Look up an accepted type by its normalized media type.
    pub fn accepted_type(&self, media_type: &str) -> Option<&AcceptedType> {
        self.accepted.iter().find(|t| t.media_type == media_type)
    }
}

/// The fixed set of categories a deployment serves.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: Vec<Arc<AttachmentCategory>>,
}

impl CategoryRegistry {
    /// Build a registry, rejecting duplicate names and overlapping roots.
    pub fn new(categories: Vec<AttachmentCategory>) -> Result<Self, CategoryError> {
        for (i, a) in categories.iter().enumerate() {
            for b in &categories[i + 1..] {
                if a.name == b.name {
                    return Err(CategoryError::DuplicateName(a.name.clone()));
                }
                if a.root.starts_with(&b.root) || b.root.starts_with(&a.root) {
                    return Err(CategoryError::SharedRoot {
                        first: a.name.clone(),
                        second: b.name.clone(),
                        root: a.root.clone(),
                    });
                }
            }
        }

        Ok(Self {
            categories: categories.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<AttachmentCategory>> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AttachmentCategory>> {
        self.categories.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }
}
