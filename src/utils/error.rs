use std::path::{Path, PathBuf};
use thiserror::Error;

fn located(file: &Option<PathBuf>) -> String {
    file.as_ref()
        .map(|path| format!(" in {}", path.display()))
        .unwrap_or_default()
}

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Record file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Malformed record '{key}'{}: {reason}", located(.file))]
    MalformedRecord {
        key: String,
        reason: String,
        file: Option<PathBuf>,
    },

    #[error("Missing required field: {field}{}", located(.file))]
    MissingField { field: String, file: Option<PathBuf> },

    #[error("Stage '{stage}' failed (exit code: {exit_code:?})")]
    StageFailure {
        stage: String,
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Record,
    Stage,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// 外部轉換失敗，輸入可能需要人工檢查
    Medium,
    /// 參數或設定錯誤，整個流程無法繼續
    High,
    /// 系統層級錯誤
    Critical,
}

impl ChainError {
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ChainError::MalformedRecord {
            key: key.into(),
            reason: reason.into(),
            file: None,
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        ChainError::MissingField {
            field: field.into(),
            file: None,
        }
    }

    /// 補上出錯的 record 檔路徑，已有路徑或非 record 錯誤則不變
    pub fn in_file(self, path: Option<&Path>) -> Self {
        match (self, path) {
            (ChainError::MalformedRecord { key, reason, file: None }, Some(path)) => {
                ChainError::MalformedRecord {
                    key,
                    reason,
                    file: Some(path.to_path_buf()),
                }
            }
            (ChainError::MissingField { field, file: None }, Some(path)) => {
                ChainError::MissingField {
                    field,
                    file: Some(path.to_path_buf()),
                }
            }
            (other, _) => other,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ChainError::FileNotFound { .. } => ErrorCategory::Input,
            ChainError::MalformedRecord { .. }
            | ChainError::MissingField { .. }
            | ChainError::CsvError(_) => ErrorCategory::Record,
            ChainError::StageFailure { .. } => ErrorCategory::Stage,
            ChainError::ConfigError { .. }
            | ChainError::ConfigValidationError { .. }
            | ChainError::InvalidConfigValueError { .. }
            | ChainError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ChainError::IoError(_) | ChainError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Stage => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Record | ErrorCategory::Configuration => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ChainError::FileNotFound { .. } => {
                "Check [records].directory and that the registration stages wrote their CSV results"
            }
            ChainError::MalformedRecord { .. } | ChainError::CsvError(_) => {
                "Re-run the registration stage that produced this record file"
            }
            ChainError::MissingField { .. } => {
                "The record file is incomplete; make sure scale and euler_angles_zyx entries were written"
            }
            ChainError::StageFailure { .. } => {
                "Inspect the service output above; intermediate assets from earlier stages are kept on disk"
            }
            ChainError::ConfigError { .. }
            | ChainError::ConfigValidationError { .. }
            | ChainError::InvalidConfigValueError { .. }
            | ChainError::MissingConfigError { .. } => "Fix the configuration file and try again",
            ChainError::IoError(_) | ChainError::SerializationError(_) => {
                "Check file permissions and available disk space"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ChainError::StageFailure {
                stage, diagnostics, ..
            } if !diagnostics.trim().is_empty() => {
                format!("Stage '{}' failed:\n{}", stage, diagnostics.trim_end())
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
