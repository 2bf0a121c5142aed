use crate::api::error::ApiError;
use serde::de::DeserializeOwned;

/// Decode a JSON request body, naming the offending field on failure.
/// An empty body is treated as `{}` so missing-field checks report the field.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) { b"{}".as_slice() } else { body };
    let de = &mut serde_json::Deserializer::from_slice(body);
    serde_path_to_error::deserialize(de).map_err(|e| {
        let path = e.path().to_string();
        if path == "." {
            ApiError::Validation(format!("JSON inválido: {}", e.inner()))
        } else {
            ApiError::Validation(format!("JSON inválido en '{}': {}", path, e.inner()))
        }
    })
}

/// Truthiness of an optional id the way callers send them: absent, null and 0
/// all mean "not provided".
pub fn provided_id(id: Option<i64>) -> Option<i64> {
    id.filter(|v| *v != 0)
}
