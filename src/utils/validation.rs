use crate::utils::error::{ChainError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ChainError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ChainError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ChainError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// 檔名後綴只能出現在檔名內，不能帶路徑分隔符
pub fn validate_suffix(field_name: &str, suffix: &str) -> Result<()> {
    validate_non_empty_string(field_name, suffix)?;

    if suffix.contains('/') || suffix.contains('\\') || suffix.contains('\0') {
        return Err(ChainError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: suffix.to_string(),
            reason: "Suffix must not contain path separators".to_string(),
        });
    }
    Ok(())
}
