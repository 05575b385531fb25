// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document fingerprints — SHA-256 identifiers for inputs, outputs and backups.

use sha2::{Digest, Sha256};
use typekeep_core::error::{Result, TypekeepError};

/// Lowercase hex SHA-256 of a serialized document.
///
/// Audit entries record this as `input_id`, `output_id` and per-outcome
/// `document_id`; snapshots are checked against it before restore.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Whether two fingerprints name the same document. Hex case is ignored.
pub fn same_fingerprint(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Fail with `IntegrityMismatch` unless `data` has fingerprint `expected_hex`.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<()> {
    let actual = hash_bytes(data);
    if same_fingerprint(&actual, expected_hex) {
        return Ok(());
    }
    Err(TypekeepError::IntegrityMismatch {
        expected: expected_hex.to_owned(),
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_lowercase_sha256_hex() {
        let id = hash_bytes(b"%PDF-1.7\n%%EOF");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn edited_document_changes_fingerprint() {
        assert_ne!(hash_bytes(b"BT (Old) Tj ET"), hash_bytes(b"BT (New) Tj ET"));
    }

    #[test]
    fn snapshot_check_ignores_hex_case() {
        let snapshot = b"%PDF-1.7 snapshot";
        let id = hash_bytes(snapshot);
        assert!(verify_hash(snapshot, &id).is_ok());
        assert!(verify_hash(snapshot, &id.to_uppercase()).is_ok());
        assert!(same_fingerprint(&id, &id.to_uppercase()));
    }

    #[test]
    fn tampered_snapshot_reports_both_fingerprints() {
        let recorded = hash_bytes(b"%PDF-1.7 snapshot");
        match verify_hash(b"%PDF-1.7 tampered", &recorded).unwrap_err() {
            TypekeepError::IntegrityMismatch { expected, actual } => {
                assert_eq!(expected, recorded);
                assert_eq!(actual, hash_bytes(b"%PDF-1.7 tampered"));
            }
            other => panic!("unexpected error variant: {other}"),
        }
    }
}
