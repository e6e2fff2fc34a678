//! Stored file names: `<prefix>-<owner id>-<disambiguator><extension>`.
//!
//! Within one process the disambiguator is strictly increasing, so two upload
//! events never produce the same name even for the same owner in the same
//! microsecond. Across processes the microsecond clock makes a collision
//! unlikely, and the store's create-only `put` turns any remaining collision
//! into a Stage failure instead of an overwrite.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::category::{AcceptedType, AttachmentCategory};

static LAST_DISAMBIGUATOR: AtomicI64 = AtomicI64::new(0);

/// Owner ids become part of a file name, so only a conservative charset is allowed.
pub fn is_valid_owner_id(owner_id: &str) -> bool {
    !owner_id.is_empty()
        && owner_id.len() <= 128
        && owner_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Next value of a process-wide strictly increasing sequence seeded from the
/// wall clock in microseconds.
pub fn next_disambiguator() -> i64 {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_DISAMBIGUATOR.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_DISAMBIGUATOR.compare_exchange_weak(
            last,
            next,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Build a stored file name. Pure: equal inputs give equal names, distinct
/// disambiguators give distinct names.
pub fn generate_name(
    category: &AttachmentCategory,
    owner_id: &str,
    accepted: &AcceptedType,
    disambiguator: i64,
) -> String {
    format!(
        "{}-{}-{}{}",
        category.prefix, owner_id, disambiguator, accepted.extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::DOCUMENT_TYPES;
    use std::collections::HashSet;
    use std::path::Path;

    #[test]
    fn test_generate_name_layout() {
        let category = AttachmentCategory::certificates(Path::new("/tmp/up"));
        let pdf = category.accepted_type("application/pdf").unwrap();
        assert_eq!(generate_name(&category, "7", pdf, 100), "cert-7-100.pdf");
    }

    #[test]
    fn test_generate_name_is_deterministic() {
        let category = AttachmentCategory::bills(Path::new("/tmp/up"));
        let png = &DOCUMENT_TYPES[2];
        assert_eq!(
            generate_name(&category, "42", png, 5),
            generate_name(&category, "42", png, 5)
        );
        assert_ne!(
            generate_name(&category, "42", png, 5),
            generate_name(&category, "42", png, 6)
        );
    }

    #[test]
    fn test_disambiguator_strictly_increases() {
        let mut previous = next_disambiguator();
        for _ in 0..10_000 {
            let next = next_disambiguator();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_disambiguator_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| (0..1_000).map(|_| next_disambiguator()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(seen.insert(value), "duplicate disambiguator {value}");
            }
        }
    }

    #[test]
    fn test_owner_id_charset() {
        assert!(is_valid_owner_id("7"));
        assert!(is_valid_owner_id("exp_2024-01"));
        assert!(!is_valid_owner_id(""));
        assert!(!is_valid_owner_id("../etc"));
        assert!(!is_valid_owner_id("a/b"));
        assert!(!is_valid_owner_id("a b"));
    }
}
