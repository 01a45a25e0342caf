//! Function metadata as held by the registry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::VersionId;

/// Who may invoke a function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthLevel {
    /// Anyone, including anonymous callers.
    Public,
    /// Any signed-in user.
    #[default]
    Authenticated,
    /// Administrators only.
    Admin,
}

impl AuthLevel {
    /// Whether a caller with the given credentials satisfies this level.
    #[must_use]
    pub fn permits(self, authenticated: bool, is_admin: bool) -> bool {
        match self {
            Self::Public => true,
            Self::Authenticated => authenticated || is_admin,
            Self::Admin => is_admin,
        }
    }

    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Authenticated => "authenticated",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for AuthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" | "none" => Ok(Self::Public),
            "authenticated" | "auth" | "user" => Ok(Self::Authenticated),
            "admin" => Ok(Self::Admin),
            other => Err(CoreError::UnknownAuthLevel(other.to_owned())),
        }
    }
}

/// Registry entry describing one invocable function.
///
/// Created by the loader from the worker's metadata report. Entries are never
/// mutated in place: a reload unregisters the old value and registers a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMeta {
    /// Unique function name (the registry key).
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Auth level required to invoke the function.
    #[serde(default)]
    pub auth: AuthLevel,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque JSON-Schema-like description of the payload.
    #[serde(default)]
    pub input_schema: Option<serde_json::Value>,
    /// Opaque JSON-Schema-like description of the result.
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
    /// Source file the function was loaded from.
    pub file_path: PathBuf,
    /// When the loader last (re)registered this entry.
    pub loaded_at: DateTime<Utc>,
    /// Version row of the loaded source, when versioning is enabled.
    #[serde(default)]
    pub version_id: Option<VersionId>,
}

impl FunctionMeta {
    /// Create metadata with defaults for everything except the name and path.
    pub fn new(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            auth: AuthLevel::default(),
            tags: Vec::new(),
            input_schema: None,
            output_schema: None,
            file_path: file_path.into(),
            loaded_at: Utc::now(),
            version_id: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the auth level.
    pub fn with_auth(mut self, auth: AuthLevel) -> Self {
        self.auth = auth;
        self
    }

    /// Set the tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the input and output schemas.
    pub fn with_schemas(
        mut self,
        input: Option<serde_json::Value>,
        output: Option<serde_json::Value>,
    ) -> Self {
        self.input_schema = input;
        self.output_schema = output;
        self
    }

    /// Attach the version id of the loaded source.
    pub fn with_version(mut self, version_id: VersionId) -> Self {
        self.version_id = Some(version_id);
        self
    }

    /// Key used for the warm pool: the source path as a string.
    #[must_use]
    pub fn pool_key(&self) -> String {
        self.file_path.to_string_lossy().into_owned()
    }

    /// Whether this entry was loaded from `path`.
    #[must_use]
    pub fn is_backed_by(&self, path: &Path) -> bool {
        self.file_path == path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("public", AuthLevel::Public)]
    #[case("Authenticated", AuthLevel::Authenticated)]
    #[case("user", AuthLevel::Authenticated)]
    #[case(" admin ", AuthLevel::Admin)]
    fn auth_level_parses(#[case] input: &str, #[case] expected: AuthLevel) {
        assert_eq!(input.parse::<AuthLevel>().unwrap(), expected);
    }

    #[test]
    fn auth_level_rejects_unknown() {
        let err = "root".parse::<AuthLevel>().unwrap_err();
        assert_eq!(err, CoreError::UnknownAuthLevel("root".into()));
    }

    #[rstest]
    #[case(AuthLevel::Public, false, false, true)]
    #[case(AuthLevel::Authenticated, false, false, false)]
    #[case(AuthLevel::Authenticated, true, false, true)]
    #[case(AuthLevel::Admin, true, false, false)]
    #[case(AuthLevel::Admin, true, true, true)]
    fn auth_level_permits(
        #[case] level: AuthLevel,
        #[case] authenticated: bool,
        #[case] admin: bool,
        #[case] expected: bool,
    ) {
        assert_eq!(level.permits(authenticated, admin), expected);
    }

    #[test]
    fn meta_builder_sets_fields() {
        let meta = FunctionMeta::new("double", "/fns/double.ts")
            .with_description("doubles a value")
            .with_auth(AuthLevel::Admin)
            .with_tags(["math", "demo"]);

        assert_eq!(meta.name, "double");
        assert_eq!(meta.description, "doubles a value");
        assert_eq!(meta.auth, AuthLevel::Admin);
        assert_eq!(meta.tags, vec!["math".to_owned(), "demo".to_owned()]);
        assert_eq!(meta.pool_key(), "/fns/double.ts");
        assert!(meta.is_backed_by(Path::new("/fns/double.ts")));
    }

    #[test]
    fn meta_deserializes_with_defaults() {
        let json = serde_json::json!({
            "name": "echo",
            "file_path": "/fns/echo.ts",
            "loaded_at": "2026-01-01T00:00:00Z"
        });
        let meta: FunctionMeta = serde_json::from_value(json).unwrap();
        assert_eq!(meta.auth, AuthLevel::Authenticated);
        assert!(meta.tags.is_empty());
        assert_eq!(meta.version_id, None);
    }
}
