//! Desired-state loading: parse the sidecar config document into typed
//! mount records, normalizing paths and extracting credential references.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::SyncError;

/// Well-known config document path inside the sidecar container.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mntx/config.json";

/// Option keys that carry credential file references rather than mount flags.
const ACCESS_KEY_FILE_OPT: &str = "accessKeyFile";
const SECRET_KEY_FILE_OPT: &str = "secretKeyFile";

/// A parsed `scheme://bucket[/subpath]` source identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUri {
    pub scheme: String,
    pub bucket: String,
    pub subpath: Option<String>,
}

impl SourceUri {
    /// Parse a scheme-qualified source URI.
    pub fn parse(uri: &str) -> Result<Self, String> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| format!("source {uri} is not scheme-qualified"))?;
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("source {uri} has an invalid scheme"));
        }
        let (bucket, subpath) = match rest.split_once('/') {
            Some((b, s)) => (b, Some(s.trim_matches('/'))),
            None => (rest, None),
        };
        if bucket.is_empty() {
            return Err(format!("source {uri} has an empty bucket"));
        }
        Ok(SourceUri {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            subpath: subpath.filter(|s| !s.is_empty()).map(str::to_string),
        })
    }
}

impl std::fmt::Display for SourceUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subpath {
            Some(sub) => write!(f, "{}://{}/{}", self.scheme, self.bucket, sub),
            None => write!(f, "{}://{}", self.scheme, self.bucket),
        }
    }
}

/// Credential file references for one mount, materialized by the pod.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRefs {
    pub access_key_file: PathBuf,
    pub secret_key_file: PathBuf,
}

/// One desired mount, normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct MountSpec {
    /// Unique identifier among all mounts in the document.
    pub name: String,
    pub source: SourceUri,
    /// Subdirectory under the target root where the source is exposed.
    /// Defaults to `name`; never empty, never `/`.
    pub relative_path: String,
    /// Driver flags in document order, credential refs already removed.
    pub options: Vec<(String, String)>,
    pub credentials: Option<CredentialRefs>,
}

/// The full desired state for one pod.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredState {
    pub target_root: PathBuf,
    pub access_modes: Vec<String>,
    pub mounts: Vec<MountSpec>,
    /// Non-fatal normalization notes (e.g. the `path: /` redirect).
    pub warnings: Vec<String>,
}

impl DesiredState {
    /// Reconciliation keys: the normalized relative path of every mount.
    pub fn desired_keys(&self) -> BTreeSet<String> {
        self.mounts
            .iter()
            .map(|m| m.relative_path.clone())
            .collect()
    }

    pub fn spec_for_key(&self, key: &str) -> Option<&MountSpec> {
        self.mounts.iter().find(|m| m.relative_path == key)
    }

    /// Absolute target path for a reconciliation key.
    pub fn target_path(&self, key: &str) -> PathBuf {
        self.target_root.join(key)
    }

    /// Read-only unless some pod access mode grants writes.
    /// An empty mode list means read-only, matching the PV default.
    pub fn read_only(&self) -> bool {
        !self.access_modes.iter().any(|m| m.starts_with("ReadWrite"))
    }
}

/// Private serde types for deserialization only.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(rename = "targetPath")]
    target_path: Option<String>,
    #[serde(rename = "accessModes", default)]
    access_modes: Vec<String>,
    mounts: Option<Vec<RawMount>>,
}

#[derive(Deserialize)]
struct RawMount {
    name: Option<String>,
    #[serde(rename = "mountPoint")]
    mount_point: Option<String>,
    path: Option<String>,
    #[serde(default)]
    options: serde_yaml::Mapping,
}

fn malformed(reason: impl Into<String>) -> SyncError {
    SyncError::ConfigMalformed {
        reason: reason.into(),
    }
}

/// Read and parse the desired-state document at `path`.
pub fn load(path: &Path) -> Result<DesiredState, SyncError> {
    let text = std::fs::read_to_string(path).map_err(|e| SyncError::ConfigUnavailable {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&text)
}

/// Parse a desired-state document. YAML 1.2 is a superset of JSON, so both
/// the original JSON documents and hand-written YAML parse here.
pub fn parse(text: &str) -> Result<DesiredState, SyncError> {
    let raw: RawConfig = serde_yaml::from_str(text).map_err(|e| malformed(e.to_string()))?;
    normalize(raw)
}

fn normalize(raw: RawConfig) -> Result<DesiredState, SyncError> {
    let target_path = raw
        .target_path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| malformed("missing targetPath"))?;
    if !Path::new(&target_path).is_absolute() {
        return Err(malformed(format!("targetPath {target_path} is not absolute")));
    }
    let trimmed = target_path.trim_end_matches('/');
    let target_root = if trimmed.is_empty() {
        PathBuf::from("/")
    } else {
        PathBuf::from(trimmed)
    };

    let raw_mounts = raw.mounts.ok_or_else(|| malformed("missing mounts array"))?;

    let mut warnings = Vec::new();
    let mut mounts = Vec::with_capacity(raw_mounts.len());
    let mut seen_names = BTreeSet::new();
    let mut seen_paths = BTreeSet::new();
    for (i, m) in raw_mounts.into_iter().enumerate() {
        let spec = normalize_mount(i, m, &mut warnings)?;
        if !seen_names.insert(spec.name.clone()) {
            return Err(malformed(format!("duplicate mount name {}", spec.name)));
        }
        if !seen_paths.insert(spec.relative_path.clone()) {
            return Err(malformed(format!(
                "mounts {} and another entry resolve to the same path {}",
                spec.name, spec.relative_path
            )));
        }
        mounts.push(spec);
    }

    Ok(DesiredState {
        target_root,
        access_modes: raw.access_modes,
        mounts,
        warnings,
    })
}

fn normalize_mount(
    index: usize,
    raw: RawMount,
    warnings: &mut Vec<String>,
) -> Result<MountSpec, SyncError> {
    let name = raw
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| malformed(format!("mount #{index} is missing name")))?;
    if name.contains('/') {
        return Err(malformed(format!("mount name {name} contains '/'")));
    }
    let mount_point = raw
        .mount_point
        .filter(|p| !p.is_empty())
        .ok_or_else(|| malformed(format!("mount {name} is missing mountPoint")))?;
    let source = SourceUri::parse(&mount_point).map_err(malformed)?;

    let relative_path = normalize_relative_path(&name, raw.path.as_deref(), warnings)?;

    let (options, credentials) = split_options(&name, raw.options)?;

    Ok(MountSpec {
        name,
        source,
        relative_path,
        options,
        credentials,
    })
}

/// Normalize a mount's `path` field into its reconciliation key.
///
/// Absent, empty, or `/` → the mount name (`/` means "mount at the shared
/// root", which is disallowed and redirected with a warning). Surrounding
/// separators are stripped; `.`/`..` components are rejected.
fn normalize_relative_path(
    name: &str,
    path: Option<&str>,
    warnings: &mut Vec<String>,
) -> Result<String, SyncError> {
    let raw = match path {
        None | Some("") => return Ok(name.to_string()),
        Some(p) => p,
    };
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        warnings.push(format!(
            "mount {name}: path / is the shared root, mounting at /{name} instead"
        ));
        return Ok(name.to_string());
    }
    let clean = Path::new(trimmed);
    if clean
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(malformed(format!(
            "mount {name}: path {raw} must be a plain relative path"
        )));
    }
    Ok(trimmed.to_string())
}

/// Split a raw options mapping into driver flags (document order preserved)
/// and credential file references.
fn split_options(
    name: &str,
    raw: serde_yaml::Mapping,
) -> Result<(Vec<(String, String)>, Option<CredentialRefs>), SyncError> {
    let mut options = Vec::new();
    let mut access_key_file: Option<PathBuf> = None;
    let mut secret_key_file: Option<PathBuf> = None;

    for (key, value) in raw {
        let key = match key {
            serde_yaml::Value::String(s) => s,
            other => {
                return Err(malformed(format!(
                    "mount {name}: option key {other:?} is not a string"
                )));
            }
        };
        let value = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            other => {
                return Err(malformed(format!(
                    "mount {name}: option {key} has unsupported value {other:?}"
                )));
            }
        };
        match key.as_str() {
            ACCESS_KEY_FILE_OPT => access_key_file = Some(PathBuf::from(value)),
            SECRET_KEY_FILE_OPT => secret_key_file = Some(PathBuf::from(value)),
            _ => options.push((key, value)),
        }
    }

    let credentials = match (access_key_file, secret_key_file) {
        (Some(access_key_file), Some(secret_key_file)) => Some(CredentialRefs {
            access_key_file,
            secret_key_file,
        }),
        (None, None) => None,
        _ => {
            return Err(malformed(format!(
                "mount {name}: {ACCESS_KEY_FILE_OPT} and {SECRET_KEY_FILE_OPT} must be set together"
            )));
        }
    };
    Ok((options, credentials))
}
