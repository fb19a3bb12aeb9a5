//! Error types for the logging runtime

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// A configuration element names a plugin type nobody registered
    #[error("Unable to locate plugin type '{plugin_type}' for element '{element}'")]
    UnknownPlugin { element: String, plugin_type: String },

    /// More than one Root logger was declared
    #[error("Configuration declares more than one root logger")]
    DuplicateRoot,

    /// The manager registry could not produce a manager for the key
    #[error("Manager '{name}' is unavailable")]
    ManagerUnavailable { name: String },

    /// A write on an established transport failed
    #[error("Error writing to {name}: {source}")]
    TransportWrite {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// No transport is currently connected
    #[error("Error writing to {name}: transport not available")]
    TransportUnavailable { name: String },

    /// Mail delivery failed
    #[error("Error sending mail via {name}: {message}")]
    MailError { name: String, message: String },

    /// Appender used outside its started lifetime
    #[error("Attempted to append to non-started appender '{name}'")]
    AppenderStopped { name: String },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn unknown_plugin(element: impl Into<String>, plugin_type: impl Into<String>) -> Self {
        LoggerError::UnknownPlugin {
            element: element.into(),
            plugin_type: plugin_type.into(),
        }
    }

    pub fn manager_unavailable(name: impl Into<String>) -> Self {
        LoggerError::ManagerUnavailable { name: name.into() }
    }

    /// Create a transport write error
    pub fn transport(name: impl Into<String>, source: std::io::Error) -> Self {
        LoggerError::TransportWrite {
            name: name.into(),
            source,
        }
    }

    pub fn transport_unavailable(name: impl Into<String>) -> Self {
        LoggerError::TransportUnavailable { name: name.into() }
    }

    pub fn mail(name: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::MailError {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn appender_stopped(name: impl Into<String>) -> Self {
        LoggerError::AppenderStopped { name: name.into() }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// True for errors raised while building a configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            LoggerError::InvalidConfiguration { .. }
                | LoggerError::UnknownPlugin { .. }
                | LoggerError::DuplicateRoot
        )
    }
}
