use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdsError {
    #[error("required dependency missing: {0}")]
    MissingDependency(&'static str),

    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),

    #[error("invalid file path: {0}")]
    InvalidFilePath(String),

    #[error("registry not found at {0}: run 'ids register' or create it")]
    RegistryNotFound(String),

    #[error("registry is corrupt: {0}")]
    RegistryCorrupt(String),

    #[error("duplicate entity id '{id}' in categories '{first}' and '{second}'")]
    DuplicateEntity {
        id: String,
        first: String,
        second: String,
    },

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("backup not found for batch: {0}")]
    BackupNotFound(String),

    #[error("cannot compute checksum for '{path}': {reason}")]
    ChecksumFailed { path: String, reason: String },

    #[error("circuit open for {0}: call short-circuited")]
    CircuitOpen(String),

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl IdsError {
    /// Stable code callers can match on without parsing messages.
    pub fn code(&self) -> &'static str {
        match self {
            IdsError::MissingDependency(dep) => match *dep {
                "registry loader" => "IDS_REGISTRY_LOADER_MISSING",
                "decision engine" => "IDS_DECISION_ENGINE_MISSING",
                "registry updater" => "IDS_REGISTRY_UPDATER_MISSING",
                _ => "IDS_DEPENDENCY_MISSING",
            },
            IdsError::InvalidIntent(_) => "IDS_INVALID_INTENT",
            IdsError::InvalidEntityId(_) => "IDS_INVALID_ENTITY_ID",
            IdsError::InvalidFilePath(_) => "IDS_INVALID_FILE_PATH",
            IdsError::RegistryNotFound(_) => "IDS_REGISTRY_NOT_FOUND",
            IdsError::RegistryCorrupt(_) => "IDS_REGISTRY_CORRUPT",
            IdsError::DuplicateEntity { .. } => "IDS_DUPLICATE_ENTITY",
            IdsError::EntityNotFound(_) => "IDS_ENTITY_NOT_FOUND",
            IdsError::BackupNotFound(_) => "IDS_BACKUP_NOT_FOUND",
            IdsError::ChecksumFailed { .. } => "IDS_CHECKSUM_FAILED",
            IdsError::CircuitOpen(_) => "IDS_CIRCUIT_OPEN",
            IdsError::Timeout { .. } => "IDS_TIMEOUT",
            IdsError::Internal(_) => "IDS_INTERNAL",
            IdsError::Io(_) => "IDS_IO_ERROR",
            IdsError::Yaml(_) => "IDS_YAML_ERROR",
            IdsError::Json(_) => "IDS_JSON_ERROR",
        }
    }

    /// True for the validation family: the caller passed bad input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            IdsError::InvalidIntent(_) | IdsError::InvalidEntityId(_) | IdsError::InvalidFilePath(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, IdsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dependency_codes_are_specific() {
        assert_eq!(
            IdsError::MissingDependency("registry loader").code(),
            "IDS_REGISTRY_LOADER_MISSING"
        );
        assert_eq!(
            IdsError::MissingDependency("decision engine").code(),
            "IDS_DECISION_ENGINE_MISSING"
        );
        assert_eq!(
            IdsError::MissingDependency("registry updater").code(),
            "IDS_REGISTRY_UPDATER_MISSING"
        );
    }

    #[test]
    fn backup_not_found_message_names_batch() {
        let err = IdsError::BackupNotFound("heal-123".to_string());
        assert_eq!(err.code(), "IDS_BACKUP_NOT_FOUND");
        assert!(err.to_string().contains("heal-123"));
    }

    #[test]
    fn validation_family() {
        assert!(IdsError::InvalidIntent(String::new()).is_validation());
        assert!(!IdsError::EntityNotFound("x".into()).is_validation());
    }
}
