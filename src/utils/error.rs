use std::path::PathBuf;
use thiserror::Error;

/// Batch-fatal errors. Anything that goes wrong for a single cell is a
/// disposition instead, see [`crate::domain::model::CellDisposition`].
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read layout '{}': {message}", path.display())]
    LayoutError { path: PathBuf, message: String },

    #[error("Failed to create output directory '{}': {source}", path.display())]
    OutputDirError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{}': {source}", path.display())]
    OutputFileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker pool error: {message}")]
    SchedulerError { message: String },
}

/// Process exit code for errors that stop the batch before any verdict exists.
/// Distinct from the pass/fail codes 0 and 1.
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Configuration,
    Layout,
    Output,
    Internal,
}

impl CheckError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CheckError::IoError(_) => ErrorCategory::Io,
            CheckError::SerializationError(_) => ErrorCategory::Output,
            CheckError::ConfigError { .. }
            | CheckError::MissingConfigError { .. }
            | CheckError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            CheckError::LayoutError { .. } => ErrorCategory::Layout,
            CheckError::OutputDirError { .. } | CheckError::OutputFileError { .. } => {
                ErrorCategory::Output
            }
            CheckError::SchedulerError { .. } => ErrorCategory::Internal,
        }
    }

    pub fn exit_code(&self) -> i32 {
        EXIT_FATAL
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Io => "Check that the referenced files exist and are readable",
            ErrorCategory::Configuration => {
                "Check the command line flags and the TOML configuration file"
            }
            ErrorCategory::Layout => "Make sure --input points at a valid GDSII stream file",
            ErrorCategory::Output => "Check permissions and free space for the output directories",
            ErrorCategory::Internal => "Re-run with --verbose and report the log",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CheckError::MissingConfigError { field } => {
                format!("Required setting '{}' was not provided", field)
            }
            CheckError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            CheckError::LayoutError { path, .. } => {
                format!("Could not list the cells of {}", path.display())
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_and_messages() {
        let err = CheckError::MissingConfigError {
            field: "input".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(
            err.user_friendly_message(),
            "Required setting 'input' was not provided"
        );

        let err = CheckError::OutputDirError {
            path: PathBuf::from("/nope/out"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.category(), ErrorCategory::Output);
        assert!(err.to_string().contains("/nope/out"));
        assert_eq!(err.exit_code(), EXIT_FATAL);
    }
}
