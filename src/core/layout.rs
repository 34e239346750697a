// On-disk naming: table URIs, well-known table names, and the storage file extension.
use std::path::{Component, Path, PathBuf};

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_CATALOG_TABLE: &str = "_mdb_catalog";
pub const DEFAULT_SIZE_TABLE: &str = "sizeStorer";
pub const DEFAULT_EXTENSION: &str = "wt";
const TABLE_URI_PREFIX: &str = "table:";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Layout {
    pub catalog_table: String,
    pub size_table: String,
    pub extension: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            catalog_table: DEFAULT_CATALOG_TABLE.to_string(),
            size_table: DEFAULT_SIZE_TABLE.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl Layout {
    /// `<dir>/<ident>.<extension>`; used for tables and for index/collection idents alike.
    pub fn file_path(&self, dir: &Path, ident: &str) -> PathBuf {
        dir.join(format!("{ident}.{}", self.extension))
    }
}

pub fn table_uri(name: &str) -> String {
    format!("{TABLE_URI_PREFIX}{name}")
}

/// Extracts the table name from `table:<name>`.
pub fn parse_table_uri(uri: &str) -> Result<&str, Error> {
    let name = uri.strip_prefix(TABLE_URI_PREFIX).ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("expected a table:<name> uri, got `{uri}`"))
    })?;
    validate_table_name(name)?;
    Ok(name)
}

pub fn validate_table_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("table name is empty"));
    }
    let escapes = Path::new(name)
        .components()
        .any(|component| !matches!(component, Component::Normal(_)));
    if escapes {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("table name `{name}` must be a relative path without `..`")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Layout, parse_table_uri, table_uri};
    use crate::core::error::ErrorKind;
    use std::path::Path;

    #[test]
    fn default_layout_matches_engine_names() {
        let layout = Layout::default();
        assert_eq!(layout.catalog_table, "_mdb_catalog");
        assert_eq!(layout.size_table, "sizeStorer");
        assert_eq!(
            layout.file_path(Path::new("/data/db"), "collection-1"),
            Path::new("/data/db/collection-1.wt")
        );
    }

    #[test]
    fn table_uri_round_trip() {
        assert_eq!(parse_table_uri(&table_uri("t")).expect("uri"), "t");
        assert_eq!(
            parse_table_uri("table:test/collection-7").expect("uri"),
            "test/collection-7"
        );
    }

    #[test]
    fn bad_uris_are_usage_errors() {
        for uri in ["t", "file:t.wt", "table:", "table:../etc", "table:/abs", "table:a/../b"] {
            let err = parse_table_uri(uri).expect_err(uri);
            assert_eq!(err.kind(), ErrorKind::Usage, "{uri}");
        }
    }
}
