use super::ApiError;
use crate::domain::RecordId;

pub fn validate_record_id(id: &str) -> Result<RecordId, ApiError> {
    const MAX_LEN: usize = 64;

    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Record ID cannot be empty"));
    }

    if trimmed.len() > MAX_LEN {
        return Err(ApiError::validation(format!(
            "Invalid record ID: must be {} characters or less",
            MAX_LEN
        )));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::validation(format!(
            "Invalid record ID: {}. IDs may only contain letters, numbers, hyphens, and underscores",
            trimmed
        )));
    }

    Ok(RecordId::new(trimmed))
}
