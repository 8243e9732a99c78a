//! Credential profiles.
//!
//! Reads `~/.config/misp` (INI), one section per profile:
//!
//! ```ini
//! [default]
//! endpoint = https://misp.example.org
//! api_key = ...
//! ```
//!
//! Quoted values are accepted too.

use std::path::{Path, PathBuf};

use ini::{Ini, ParseOption, Properties};

pub const DEFAULT_PROFILE: &str = "default";

/// Endpoint and API key for one MISP instance.
#[derive(Clone)]
pub struct Credentials {
    /// Base URL, e.g. "https://misp.example.org"
    pub endpoint: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

// Keep the key out of logs and error output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub enum ProfileError {
    /// The profile file could not be read
    Io(PathBuf, String),
    /// The profile file is not valid INI or a profile lacks a field
    Parse(PathBuf, String),
    /// No table with the requested name
    MissingProfile { path: PathBuf, profile: String },
    /// A profile field is present but blank
    Blank { profile: String, field: &'static str },
}

impl std::fmt::Display for ProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileError::Io(path, msg) => write!(f, "cannot read {}: {}", path.display(), msg),
            ProfileError::Parse(path, msg) => write!(f, "invalid profile file {}: {}", path.display(), msg),
            ProfileError::MissingProfile { path, profile } => {
                write!(f, "profile '{}' not found in {}", profile, path.display())
            }
            ProfileError::Blank { profile, field } => {
                write!(f, "profile '{}' has an empty {}", profile, field)
            }
        }
    }
}

impl std::error::Error for ProfileError {}

/// Default location of the profile file (`~/.config/misp`).
pub fn default_profile_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".config/misp"))
}

/// Expand a leading `~` (and `$VARS`) in a user-supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
    }
}

/// Load one profile from a profile file.
pub fn load_profile(path: &Path, profile: &str) -> Result<Credentials, ProfileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ProfileError::Io(path.to_path_buf(), e.to_string()))?;
    parse_profile(&contents, profile).map_err(|e| match e {
        ProfileError::Parse(_, msg) => ProfileError::Parse(path.to_path_buf(), msg),
        ProfileError::MissingProfile { profile, .. } => ProfileError::MissingProfile {
            path: path.to_path_buf(),
            profile,
        },
        other => other,
    })
}

fn parse_profile(contents: &str, profile: &str) -> Result<Credentials, ProfileError> {
    // API keys are taken verbatim, no backslash escapes.
    let options = ParseOption {
        enabled_escape: false,
        ..ParseOption::default()
    };
    let file = Ini::load_from_str_opt(contents, options)
        .map_err(|e| ProfileError::Parse(PathBuf::new(), e.to_string()))?;

    // Other profiles are not validated.
    let section = file.section(Some(profile)).ok_or_else(|| ProfileError::MissingProfile {
        path: PathBuf::new(),
        profile: profile.to_string(),
    })?;

    let endpoint = field(section, profile, "endpoint")?;
    let api_key = field(section, profile, "api_key")?;
    let creds = Credentials::new(endpoint.trim_end_matches('/'), api_key);

    if creds.endpoint.is_empty() {
        return Err(ProfileError::Blank { profile: profile.to_string(), field: "endpoint" });
    }
    if creds.api_key.is_empty() {
        return Err(ProfileError::Blank { profile: profile.to_string(), field: "api_key" });
    }
    Ok(creds)
}

/// Trimmed value of `key`; keys match case-insensitively.
fn field<'a>(section: &'a Properties, profile: &str, key: &str) -> Result<&'a str, ProfileError> {
    section
        .iter()
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim())
        .ok_or_else(|| ProfileError::Parse(PathBuf::new(), format!("[{profile}]: missing field `{key}`")))
}
