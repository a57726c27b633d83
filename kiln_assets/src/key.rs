use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

/// Prefix of keys naming generated assets that are registered rather than loaded
pub const PROCEDURAL_PREFIX: &str = "proc:";

/// Names a loadable asset: a URL, a file path or a `proc:` name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetKey(Arc<str>);

/// Where the bytes of an asset come from
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum AssetLocation {
    Url(String),
    FilePath(PathBuf),
    Procedural(String),
}

impl AssetKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn location(&self) -> AssetLocation {
        let key = self.as_str();
        if key.starts_with("http://") || key.starts_with("https://") {
            AssetLocation::Url(key.to_string())
        } else if let Some(name) = key.strip_prefix(PROCEDURAL_PREFIX) {
            AssetLocation::Procedural(name.to_string())
        } else {
            AssetLocation::FilePath(PathBuf::from(key))
        }
    }
}

impl Display for AssetKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AssetKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AssetKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AssetKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AssetKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&AssetKey> for AssetKey {
    fn from(value: &AssetKey) -> Self {
        value.clone()
    }
}
