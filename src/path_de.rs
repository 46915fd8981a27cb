use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("at JSON path {path} → {message}")]
pub struct PathDeError {
    pub path: String,
    pub message: String,
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, PathDeError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(PathDeError { path, message: err.into_inner().to_string() })
        }
    }
}
