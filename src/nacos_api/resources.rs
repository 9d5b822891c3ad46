use serde::{Deserialize, Deserializer, Serialize};

/// Response envelope shared by the console and config APIs
///
/// `data` is absent (or `null`) when the server did not accept the access
/// token, which is the only reliable rejection signal some versions give.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

/// Namespace resource from the namespace listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace id; the built-in `public` namespace has an empty id
    #[serde(rename = "namespace", default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(rename = "namespaceShowName", default)]
    pub show_name: Option<String>,
}

impl Namespace {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            show_name: None,
        }
    }

    /// Name to show in logs: the display name when present, the id otherwise
    pub fn label(&self) -> &str {
        match self.show_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.id,
        }
    }
}

/// A (dataId, group) pair identifying one configuration item in a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    #[serde(rename = "dataId", default, deserialize_with = "null_as_empty")]
    pub data_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub group: String,
}

impl ConfigEntry {
    pub fn new(data_id: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            data_id: data_id.into(),
            group: group.into(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
