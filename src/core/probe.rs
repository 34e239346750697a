// Maps an ident to its expected storage file and reports whether it is there.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::session::Session;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskFileRef {
    pub path: PathBuf,
    pub exists: bool,
    /// Zero when the file is absent.
    pub size_bytes: u64,
}

/// Never fails: an unreadable or missing artifact is reported as absent.
pub fn probe(session: &Session, ident: &str) -> DiskFileRef {
    probe_path(session.table_path(ident))
}

pub fn probe_path(path: impl AsRef<Path>) -> DiskFileRef {
    let path = path.as_ref().to_path_buf();
    match fs::metadata(&path) {
        Ok(meta) if meta.is_file() => DiskFileRef {
            path,
            exists: true,
            size_bytes: meta.len(),
        },
        Ok(_) | Err(_) => {
            debug!(path = %path.display(), "artifact absent");
            DiskFileRef {
                path,
                exists: false,
                size_bytes: 0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{probe, probe_path};
    use crate::core::testutil::Fixture;

    #[test]
    fn existing_file_reports_size() {
        let fixture = Fixture::new();
        fixture.raw_file("collection-1", 2000);
        let session = fixture.session();
        let found = probe(&session, "collection-1");
        assert!(found.exists);
        assert_eq!(found.size_bytes, 2000);
        assert_eq!(found.path, fixture.path().join("collection-1.wt"));
    }

    #[test]
    fn missing_file_is_absent_not_error() {
        let fixture = Fixture::new();
        let session = fixture.session();
        let missing = probe(&session, "collection-9");
        assert!(!missing.exists);
        assert_eq!(missing.size_bytes, 0);
    }

    #[test]
    fn directory_is_not_an_artifact() {
        let fixture = Fixture::new();
        std::fs::create_dir(fixture.path().join("index-1.wt")).expect("dir");
        assert!(!probe_path(fixture.path().join("index-1.wt")).exists);
    }
}
