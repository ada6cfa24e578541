use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::config::MountSpec;
use crate::error::SyncError;

/// Well-known credential store path inside the sidecar container.
pub const DEFAULT_PASSWD_PATH: &str = "/etc/passwd-mntx";

/// Append-only passwd-style credential store: one `bucket:key:secret` line
/// per bucket, at most one record per bucket, owner-only permissions.
///
/// Records persist until the container restarts; the store is never
/// rewritten wholesale and its contents are only read back to check bucket
/// membership.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CredentialStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if the store already holds a record for `bucket`.
    pub fn has_bucket(&self, bucket: &str) -> bool {
        let Ok(text) = std::fs::read_to_string(&self.path) else {
            return false;
        };
        let prefix = format!("{bucket}:");
        text.lines().any(|line| line.starts_with(&prefix))
    }

    /// Make sure a credential record exists for `spec`'s bucket before the
    /// mount attempt. Returns `true` if a record was appended, `false` if
    /// the mount needs no credentials or the bucket is already recorded.
    pub fn ensure(&self, spec: &MountSpec) -> Result<bool, SyncError> {
        let Some(refs) = &spec.credentials else {
            return Ok(false);
        };
        let access_key = read_key_file(&spec.name, &refs.access_key_file)?;
        let secret_key = read_key_file(&spec.name, &refs.secret_key_file)?;
        if self.has_bucket(&spec.source.bucket) {
            return Ok(false);
        }
        self.append_record(&spec.source.bucket, &access_key, &secret_key)
            .map_err(|detail| SyncError::CredentialUnavailable {
                mount: spec.name.clone(),
                path: self.path.clone(),
                detail,
            })?;
        Ok(true)
    }

    /// Append one record with a single write. The file is created with
    /// owner-only permissions; the mode of an existing store is left alone.
    fn append_record(&self, bucket: &str, access_key: &str, secret_key: &str) -> Result<(), String> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o600)
            .open(&self.path)
            .map_err(|e| format!("cannot open credential store: {e}"))?;
        file.write_all(format!("{bucket}:{access_key}:{secret_key}\n").as_bytes())
            .map_err(|e| format!("cannot write credential store: {e}"))
    }
}

/// Read one key-material file, trimming surrounding whitespace.
fn read_key_file(mount: &str, path: &Path) -> Result<String, SyncError> {
    let unavailable = |detail: String| SyncError::CredentialUnavailable {
        mount: mount.to_string(),
        path: path.to_path_buf(),
        detail,
    };
    let text = std::fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
    let key = text.trim();
    if key.is_empty() {
        return Err(unavailable("file is empty".to_string()));
    }
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialRefs, SourceUri};

    fn spec_with_creds(name: &str, bucket: &str, ak: &Path, sk: &Path) -> MountSpec {
        MountSpec {
            name: name.to_string(),
            source: SourceUri {
                scheme: "oss".to_string(),
                bucket: bucket.to_string(),
                subpath: None,
            },
            relative_path: name.to_string(),
            options: vec![],
            credentials: Some(CredentialRefs {
                access_key_file: ak.to_path_buf(),
                secret_key_file: sk.to_path_buf(),
            }),
        }
    }

    fn write_keys(dir: &Path) -> (PathBuf, PathBuf) {
        let ak = dir.join("ak");
        let sk = dir.join("sk");
        std::fs::write(&ak, "ACCESS\n").unwrap();
        std::fs::write(&sk, "SECRET\n").unwrap();
        (ak, sk)
    }

    #[test]
    fn ensure_appends_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let (ak, sk) = write_keys(dir.path());
        let store = CredentialStore::new(dir.path().join("passwd"));
        let spec = spec_with_creds("a", "bucket1", &ak, &sk);

        assert!(store.ensure(&spec).unwrap());
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "bucket1:ACCESS:SECRET\n");
    }

    #[test]
    fn ensure_is_idempotent_per_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let (ak, sk) = write_keys(dir.path());
        let store = CredentialStore::new(dir.path().join("passwd"));
        let spec = spec_with_creds("a", "bucket1", &ak, &sk);

        assert!(store.ensure(&spec).unwrap());
        assert!(!store.ensure(&spec).unwrap());
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.lines().count(), 1, "got: {content}");
    }

    #[test]
    fn ensure_records_distinct_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let (ak, sk) = write_keys(dir.path());
        let store = CredentialStore::new(dir.path().join("passwd"));

        store
            .ensure(&spec_with_creds("a", "bucket1", &ak, &sk))
            .unwrap();
        store
            .ensure(&spec_with_creds("b", "bucket2", &ak, &sk))
            .unwrap();
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.lines().count(), 2, "got: {content}");
        assert!(content.contains("bucket2:ACCESS:SECRET"));
    }

    #[test]
    fn has_bucket_matches_whole_bucket_key() {
        let dir = tempfile::tempdir().unwrap();
        let (ak, sk) = write_keys(dir.path());
        let store = CredentialStore::new(dir.path().join("passwd"));
        store
            .ensure(&spec_with_creds("a", "bucket1", &ak, &sk))
            .unwrap();

        assert!(store.has_bucket("bucket1"));
        // "bucket1:" is a prefix of no record for "bucket10".
        assert!(!store.has_bucket("bucket10"));
        assert!(!store.has_bucket("bucket"));
    }

    #[test]
    fn ensure_without_credentials_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("passwd"));
        let mut spec = spec_with_creds("a", "bucket1", Path::new("/nope"), Path::new("/nope"));
        spec.credentials = None;

        assert!(!store.ensure(&spec).unwrap());
        assert!(!store.path().exists(), "store must not be created");
    }

    #[test]
    fn ensure_missing_key_file_is_credential_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("passwd"));
        let missing = dir.path().join("missing-ak");
        let sk = dir.path().join("sk");
        std::fs::write(&sk, "SECRET").unwrap();
        let spec = spec_with_creds("a", "bucket1", &missing, &sk);

        let err = store.ensure(&spec).unwrap_err();
        assert!(matches!(err, SyncError::CredentialUnavailable { .. }));
        assert!(err.to_string().contains("missing-ak"), "got: {err}");
        assert!(!store.path().exists(), "no partial record on failure");
    }

    #[test]
    fn ensure_empty_key_file_is_credential_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("passwd"));
        let ak = dir.path().join("ak");
        let sk = dir.path().join("sk");
        std::fs::write(&ak, "\n").unwrap();
        std::fs::write(&sk, "SECRET").unwrap();
        let spec = spec_with_creds("a", "bucket1", &ak, &sk);

        let err = store.ensure(&spec).unwrap_err();
        assert!(err.to_string().contains("empty"), "got: {err}");
    }

    #[test]
    fn key_material_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let ak = dir.path().join("ak");
        let sk = dir.path().join("sk");
        std::fs::write(&ak, "  ACCESS  \n").unwrap();
        std::fs::write(&sk, "SECRET\n\n").unwrap();
        let store = CredentialStore::new(dir.path().join("passwd"));
        store
            .ensure(&spec_with_creds("a", "bucket1", &ak, &sk))
            .unwrap();
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "bucket1:ACCESS:SECRET\n");
    }

    #[cfg(unix)]
    #[test]
    fn store_is_created_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let (ak, sk) = write_keys(dir.path());
        let store = CredentialStore::new(dir.path().join("passwd"));
        store
            .ensure(&spec_with_creds("a", "bucket1", &ak, &sk))
            .unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600, "mode was {mode:o}");
    }
}
