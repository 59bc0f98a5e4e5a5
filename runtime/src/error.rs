use thiserror::Error;

/// Errors that can occur during Store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store is shutting down and not accepting new actions
    ///
    /// Returned when `dispatch()` is called after shutdown was initiated.
    #[error("Store is shutting down")]
    ShutdownInProgress,

    /// Shutdown timed out waiting for effects to complete
    #[error("Shutdown timed out with {0} effects still running")]
    ShutdownTimeout(usize),

    /// Timed out waiting for an action's effects
    #[error("Timed out waiting for effects to complete")]
    Timeout,

    /// The serializability check rejected an action
    ///
    /// Only returned when the check runs with the `Reject` policy.
    #[error("Non-serializable {type_name} in action `{action_type}` at `{key_path}`")]
    NonSerializable {
        /// Type of the rejected action
        action_type: String,
        /// Path to the offending value
        key_path: String,
        /// Label of the offending value
        type_name: String,
    },

    /// A middleware refused or complained about an action
    #[error("Middleware `{name}` failed: {message}")]
    Middleware {
        /// Middleware name
        name: String,
        /// What went wrong
        message: String,
    },
}

impl StoreError {
    /// Build a [`StoreError::Middleware`]
    #[must_use]
    pub fn middleware(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Middleware {
            name: name.into(),
            message: message.into(),
        }
    }
}
