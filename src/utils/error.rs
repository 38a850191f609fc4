use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Duplicate data lake name: {name}")]
    DuplicateLake { name: String },

    #[error("Unknown data lake '{name}' referenced as {role}")]
    UnknownLake { name: String, role: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Failed to read '{identifier}' from lake {lake}: {message}")]
    ReadError {
        lake: String,
        identifier: String,
        message: String,
    },

    #[error("Failed to write '{identifier}' to lake {lake}: {message}")]
    WriteError {
        lake: String,
        identifier: String,
        message: String,
    },

    #[error("Expansion query on lake {lake} failed: {message}")]
    ExpansionQueryError {
        lake: String,
        query: String,
        message: String,
    },

    #[error("Audit logging failed: {message}")]
    AuditLoggingError { message: String },

    #[error("Audit logger setup failed for lake {lake}: {message}")]
    AuditSetupError { lake: String, message: String },

    #[error("Invalid transfer state transition: {from} -> {to}")]
    StateTransitionError { from: String, to: String },

    #[error("Relational connector error: {0}")]
    ConnectorError(#[from] tokio_postgres::Error),

    #[error("Object store error: {0}")]
    StorageError(#[from] object_store::Error),

    #[error("Object store path error: {0}")]
    StoragePathError(#[from] object_store::path::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Transfer,
    Audit,
    Infrastructure,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn config(message: impl Into<String>) -> Self {
        EtlError::ConfigError {
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        EtlError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::DuplicateLake { .. }
            | EtlError::UnknownLake { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::ReadError { .. }
            | EtlError::WriteError { .. }
            | EtlError::ExpansionQueryError { .. } => ErrorCategory::Transfer,
            EtlError::AuditLoggingError { .. } | EtlError::AuditSetupError { .. } => {
                ErrorCategory::Audit
            }
            EtlError::ConnectorError(_)
            | EtlError::StorageError(_)
            | EtlError::StoragePathError(_)
            | EtlError::IoError(_) => ErrorCategory::Infrastructure,
            EtlError::StateTransitionError { .. }
            | EtlError::CsvError(_)
            | EtlError::ParquetError(_)
            | EtlError::ArrowError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Audit => match self {
                // 無法建立稽核記錄器時整個 run 不能開始
                EtlError::AuditSetupError { .. } => ErrorSeverity::High,
                _ => ErrorSeverity::Low,
            },
            ErrorCategory::Infrastructure => ErrorSeverity::Medium,
            ErrorCategory::Transfer | ErrorCategory::Internal => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// 根據錯誤嚴重程度決定退出碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::DuplicateLake { name } => {
                format!("Data lake '{}' is declared more than once", name)
            }
            EtlError::UnknownLake { name, role } => {
                format!("The {} lake '{}' is not declared in the configuration", role, name)
            }
            EtlError::ReadError {
                lake, identifier, ..
            } => format!("Could not read '{}' from '{}'", identifier, lake),
            EtlError::WriteError {
                lake, identifier, ..
            } => format!("Could not write '{}' to '{}'", identifier, lake),
            EtlError::ExpansionQueryError { lake, query, .. } => {
                format!("Could not expand dynamic integration '{}' on '{}'", query, lake)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the configuration file: lake names, URLs and integration maps"
            }
            ErrorCategory::Transfer => {
                "Verify the source and destination are reachable and the identifiers exist, then re-run"
            }
            ErrorCategory::Audit => {
                "Check connectivity to the audit-enabled lake or disable auditing for it"
            }
            ErrorCategory::Infrastructure => "Check network access and credentials for the store",
            ErrorCategory::Internal => "Re-run with --verbose and inspect the logs",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_errors_exit_non_zero() {
        let err = EtlError::WriteError {
            lake: "orders_db".to_string(),
            identifier: "orders".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Transfer);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_configuration_errors_are_critical() {
        let err = EtlError::DuplicateLake {
            name: "a".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_audit_logging_errors_never_fail_the_process() {
        let err = EtlError::AuditLoggingError {
            message: "connection refused".to_string(),
        };
        assert_eq!(err.exit_code(), 0);
    }
}
