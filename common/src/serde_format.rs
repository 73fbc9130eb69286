use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::file_format::{FileExtensionError, FileFormat};

#[derive(Debug, thiserror::Error)]
pub enum SerdeFormatError {
    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    FileExtension(#[from] FileExtensionError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

pub type SerdeFormatResult<T> = Result<T, SerdeFormatError>;

pub fn serialize<T: Serialize>(value: &T, format: FileFormat) -> SerdeFormatResult<String> {
    let serialized = match format {
        FileFormat::Yaml => serde_yml::to_string(value)?,
        FileFormat::Json => serde_json::to_string_pretty(value)?,
    };

    Ok(serialized)
}

pub fn deserialize<T: DeserializeOwned + 'static>(
    serialized: &str,
    format: FileFormat,
) -> SerdeFormatResult<T> {
    match format {
        FileFormat::Yaml => Ok(serde_yml::from_str(serialized)?),
        FileFormat::Json => Ok(serde_json::from_str(serialized)?),
    }
}

// Format is picked from the file extension.
pub fn deserialize_file<T: DeserializeOwned + 'static>(path: impl AsRef<Path>) -> SerdeFormatResult<T> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let format = FileFormat::from_file_name(&display)?;
    let serialized = std::fs::read_to_string(path).map_err(|source| SerdeFormatError::Io {
        path: display,
        source,
    })?;

    deserialize(&serialized, format)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn same_value_from_both_formats() -> anyhow::Result<()> {
        let from_yaml: Sample = deserialize("name: a\ncount: 3\n", FileFormat::Yaml)?;
        let from_json: Sample = deserialize(r#"{"name": "a", "count": 3}"#, FileFormat::Json)?;
        assert_eq!(from_yaml, from_json);

        let yaml = serialize(&from_yaml, FileFormat::Yaml)?;
        assert!(yaml.contains("count: 3"));

        Ok(())
    }

    #[test]
    fn missing_file_reports_path() {
        let err = deserialize_file::<Sample>("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, SerdeFormatError::Io { ref path, .. } if path.ends_with("exist.yaml")));
    }
}
