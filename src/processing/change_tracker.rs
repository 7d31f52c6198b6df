//! Content hashing and change detection between document versions

use sha2::{Digest, Sha256};

use crate::types::{DocumentChange, DocumentVersion};

/// SHA-256 hex digest of document content.
///
/// Deterministic: identical content always produces the identical digest.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether a document must be re-vectorized for the given content.
///
/// True when the document has never been vectorized, or when the stored
/// version's hash no longer matches the content.
pub fn needs_revectorization(latest: Option<&DocumentVersion>, content: &str) -> bool {
    match latest {
        None => true,
        Some(version) => version.content_hash != hash_content(content),
    }
}

/// Diff two versions of a document's content.
///
/// Finds the common prefix and common suffix; the differing middle becomes a
/// deleted span (old middle) plus an added span (new middle). Pure appends and
/// truncations collapse to a single change. Returns an empty list when the
/// contents are equal, which means no re-embedding is required.
pub fn diff_content(old: &str, new: &str) -> Vec<DocumentChange> {
    if old == new {
        return Vec::new();
    }

    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();
    let min_len = old_chars.len().min(new_chars.len());

    let mut prefix = 0;
    while prefix < min_len && old_chars[prefix] == new_chars[prefix] {
        prefix += 1;
    }

    let mut suffix = 0;
    while suffix < min_len - prefix
        && old_chars[old_chars.len() - 1 - suffix] == new_chars[new_chars.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let old_middle_end = old_chars.len() - suffix;
    let new_middle_end = new_chars.len() - suffix;

    let mut changes = Vec::new();

    if prefix + suffix < min_len {
        // Both sides have a differing middle
        if old_middle_end > prefix {
            let removed: String = old_chars[prefix..old_middle_end].iter().collect();
            changes.push(DocumentChange::deleted(prefix, old_middle_end, removed));
        }
        if new_middle_end > prefix {
            let inserted: String = new_chars[prefix..new_middle_end].iter().collect();
            changes.push(DocumentChange::added(prefix, new_middle_end, inserted));
        }
    } else if new_chars.len() > old_chars.len() {
        // Pure insertion
        let inserted: String = new_chars[prefix..new_middle_end].iter().collect();
        changes.push(DocumentChange::added(prefix, new_middle_end, inserted));
    } else {
        // Pure truncation
        let removed: String = old_chars[prefix..old_middle_end].iter().collect();
        changes.push(DocumentChange::deleted(prefix, old_middle_end, removed));
    }

    changes
}
