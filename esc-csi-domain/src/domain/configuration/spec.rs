use crate::{
    prelude::{to_pretty_json, to_yaml, StringExt, StructuredExt},
    ProviderError,
};
use serde::Deserialize;
use std::path::{Component, Path};
use strum::{AsRefStr, Display};

/// Output encoding requested for a secret file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, AsRefStr, Display)]
#[serde(from = "String")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Plaintext,
    Json,
    Yaml,
}

impl From<String> for OutputFormat {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "yaml" | "yml" => OutputFormat::Yaml,
            "plaintext" | "" => OutputFormat::Plaintext,
            other => {
                tracing::warn!("Unrecognized output format {other:?}, falling back to plaintext");
                OutputFormat::Plaintext
            }
        }
    }
}

impl OutputFormat {
    /// Re-encodes a JSON object or array in this format. Scalars and content
    /// that is not JSON are returned untouched whatever the format.
    pub fn render(&self, bytes: Vec<u8>) -> Result<Vec<u8>, ProviderError> {
        if *self == OutputFormat::Plaintext {
            return Ok(bytes);
        }

        let Some(document) = bytes.as_slice().as_structured() else {
            return Ok(bytes);
        };

        match self {
            OutputFormat::Json => to_pretty_json(&document),
            OutputFormat::Yaml => to_yaml(&document),
            OutputFormat::Plaintext => Ok(bytes),
        }
    }
}

/// An entry of one of the embedded YAML lists of the mount attributes.
pub trait SpecEntry {
    /// Name of the file written for this entry, relative to the target path.
    fn file_name(&self) -> &str;

    /// Key of the value in the remote environment.
    fn source_key(&self) -> &str;

    fn validate(&self) -> Result<(), String>;
}

/// One file built from a single environment property.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecretSpec {
    #[serde(default)]
    pub file_name: String,
    /// Property path inside the environment, e.g. `app.database.password`.
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub format: OutputFormat,
    /// Accepted for compatibility with existing SecretProviderClasses. Keys
    /// are always resolved from the environment root.
    #[serde(default)]
    pub secret_path: Option<String>,
}

impl SpecEntry for SecretSpec {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn source_key(&self) -> &str {
        &self.secret_key
    }

    fn validate(&self) -> Result<(), String> {
        if self.file_name.is_blank() {
            return Err("fileName is required".to_string());
        }
        if self.secret_key.is_blank() {
            return Err("secretKey is required".to_string());
        }
        validate_file_name(&self.file_name)
    }
}

/// One file built from a top-level environment property, read in bulk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectSpec {
    #[serde(rename = "objectName", default)]
    pub name: String,
    #[serde(rename = "objectAlias", default)]
    pub alias: Option<String>,
}

impl SpecEntry for ObjectSpec {
    fn file_name(&self) -> &str {
        match self.alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias,
            _ => &self.name,
        }
    }

    fn source_key(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_blank() {
            return Err("objectName is required".to_string());
        }
        if self.alias.as_deref().is_some_and(|alias| alias.contains('/')) {
            return Err("objectAlias must not contain '/'".to_string());
        }
        validate_file_name(self.file_name())
    }
}

fn validate_file_name(file_name: &str) -> Result<(), String> {
    let path = Path::new(file_name);
    if path.is_absolute() {
        return Err(format!("file name {file_name:?} must be relative"));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(format!("file name {file_name:?} must not contain '..'"));
    }
    if path.components().all(|c| matches!(c, Component::CurDir)) {
        return Err(format!("file name {file_name:?} must name a file"));
    }
    Ok(())
}
