//! Upload acceptance based on the declared media type.
//!
//! Only the declared type (and, when given, the client file name's extension)
//! is checked. File contents are never sniffed: a PDF declared as
//! `application/pdf` and a text file declared the same way are indistinguishable
//! here.

use std::path::Path;

use thiserror::Error;

use crate::category::{AcceptedType, AttachmentCategory};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "Unsupported file type {:?} for {}; accepted types are {}",
    .media_type,
    .category,
    .accepted.join(", ")
)]
pub struct UnsupportedMediaType {
    pub category: String,
    pub media_type: String,
    pub accepted: Vec<String>,
}

/// Strip parameters and normalize case: `Image/PNG; q=1` -> `image/png`.
pub fn normalize_media_type(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Decide whether an upload may be staged into `category`.
///
/// Returns the accepted type, whose extension is what the stored file gets.
/// A client file name whose extension is known to map only to types outside
/// the accepted set is rejected even when the declared type is acceptable.
pub fn validate<'c>(
    category: &'c AttachmentCategory,
    declared: &str,
    file_name: Option<&str>,
) -> Result<&'c AcceptedType, UnsupportedMediaType> {
    let media_type = normalize_media_type(declared);
    let reject = || UnsupportedMediaType {
        category: category.name.clone(),
        media_type: declared.to_string(),
        accepted: category
            .accepted
            .iter()
            .map(|t| t.media_type.to_string())
            .collect(),
    };

    let accepted = category.accepted_type(&media_type).ok_or_else(reject)?;

    if let Some(ext) = file_name.and_then(|n| Path::new(n).extension()?.to_str()) {
        let guess = mime_guess::from_ext(ext);
        if !guess.is_empty()
            && !guess
                .iter()
                .any(|m| category.accepted_type(m.essence_str()).is_some())
        {
            return Err(reject());
        }
    }

    Ok(accepted)
}
