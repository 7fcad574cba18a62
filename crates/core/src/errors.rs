use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flows::LifecycleTransitionError;

/// Reason code carried by every rejected raid action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    NotFound,
    PermissionDenied,
    InvalidState,
    CapacityExceeded,
    Conflict,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidState => "invalid_state",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::Conflict => "conflict",
        }
    }
}

/// A rejected raid action. The aggregate is left untouched whenever one of these is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    CapacityExceeded(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleTransitionError),
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn capacity_exceeded(message: impl Into<String>) -> Self {
        Self::CapacityExceeded(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn reason(&self) -> ReasonCode {
        match self {
            Self::NotFound(_) => ReasonCode::NotFound,
            Self::PermissionDenied(_) => ReasonCode::PermissionDenied,
            Self::InvalidState(_) | Self::Lifecycle(_) => ReasonCode::InvalidState,
            Self::CapacityExceeded(_) => ReasonCode::CapacityExceeded,
            Self::Conflict(_) => ReasonCode::Conflict,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("rejected ({reason:?}): {message}")]
    Rejected { reason: ReasonCode, message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text safe to show the person who triggered the action.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Rejected { message, .. } => message,
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Rejected { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Rejected { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::Rejected {
                reason: error.reason(),
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError, ReasonCode};
    use crate::flows::{LifecycleEvent, LifecycleTransitionError, RaidPhase};

    #[test]
    fn domain_error_maps_to_rejection_with_user_text() {
        let interface = ApplicationError::from(DomainError::capacity_exceeded(
            "Limit reached (2 items).",
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::Rejected {
                reason: ReasonCode::CapacityExceeded,
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(interface.user_message(), "Limit reached (2 items).");
    }

    #[test]
    fn lifecycle_error_is_reported_as_invalid_state() {
        let error = DomainError::from(LifecycleTransitionError::InvalidTransition {
            phase: RaidPhase::Locked,
            event: LifecycleEvent::Close,
        });
        assert_eq!(error.reason(), ReasonCode::InvalidState);
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
        assert_eq!(interface.correlation_id(), "req-3");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("item catalog missing".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
