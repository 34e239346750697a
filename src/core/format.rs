//! Purpose: Centralize table file format versioning and upgrade guidance.
//! Exports: `TABLE_FORMAT_VERSION`, `SUPPORTED_TABLE_FORMAT_VERSIONS`, `table_version_error`.
//! Role: Shared policy for gating on-disk compatibility when tables are opened.
//! Invariants: Version list is additive; bump only for incompatible on-disk changes.

use std::path::Path;

use crate::core::error::{Error, ErrorKind};

pub const TABLE_FORMAT_VERSION: u32 = 1;
pub const SUPPORTED_TABLE_FORMAT_VERSIONS: &[u32] = &[TABLE_FORMAT_VERSION];

pub fn is_supported(version: u32) -> bool {
    SUPPORTED_TABLE_FORMAT_VERSIONS.contains(&version)
}

pub fn table_version_error(detected: u32, path: &Path) -> Error {
    let supported = SUPPORTED_TABLE_FORMAT_VERSIONS
        .iter()
        .map(|version| version.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Error::new(ErrorKind::Usage)
        .with_message(format!(
            "unsupported table format version {detected} (supported: {supported})"
        ))
        .with_path(path)
        .with_hint("Upgrade wtscope, or inspect the database with the tool version that wrote it.")
}

#[cfg(test)]
mod tests {
    use super::{TABLE_FORMAT_VERSION, is_supported, table_version_error};
    use crate::core::error::ErrorKind;
    use std::path::Path;

    #[test]
    fn current_version_is_supported() {
        assert!(is_supported(TABLE_FORMAT_VERSION));
        assert!(!is_supported(TABLE_FORMAT_VERSION + 1));
    }

    #[test]
    fn version_error_lists_supported_versions() {
        let err = table_version_error(9, Path::new("db/t.wt"));
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.message().unwrap().contains("version 9"));
        assert!(err.message().unwrap().contains("supported: 1"));
        assert!(err.hint().is_some());
    }
}
