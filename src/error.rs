//! Error types used by the pagevisor runtime and its collaborators.
//!
//! The taxonomy follows how failures are meant to travel:
//!
//! - [`ConfigError`]: programming defects found while configuring modules or
//!   starting the load pass. These fail loudly and abort initialisation.
//! - [`PollError`]: a search inside a bounded wait failed outright (not "not
//!   found", which is a normal outcome). The chain aborts.
//! - [`DomError`]: the page refused an operation (e.g. observing a node that
//!   is gone). Callers degrade to "no such event".
//! - [`StorageError`], [`TransportError`]: collaborator failures, recovered
//!   locally into fallback states.
//! - [`HookError`]: a module's `load` hook failed.
//! - [`RegistryError`]: a registry call was invalid or could not be
//!   persisted.
//!
//! Every enum exposes `as_label()` with a short stable snake_case label for
//! logs.

use thiserror::Error;

/// # Configuration-time errors.
///
/// Raised while declaring types, registering modules or starting the load
/// pass. They indicate a defect in the embedding code, never a runtime page
/// condition.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The module type list was empty.
    #[error("no module types declared")]
    NoTypes,

    /// The same type name was declared twice.
    #[error("module type {name:?} declared more than once")]
    DuplicateType {
        /// Offending type name.
        name: String,
    },

    /// A module was registered with a type the registry does not know.
    #[error("module {module:?} uses undeclared type {module_type:?}")]
    UnknownType {
        /// Module identifier.
        module: String,
        /// Type name that was not declared.
        module_type: String,
    },

    /// A module identifier was registered twice.
    #[error("module {module:?} is already registered")]
    DuplicateModule {
        /// Module identifier.
        module: String,
    },

    /// No module with this identifier exists.
    #[error("module {module:?} is not registered")]
    UnknownModule {
        /// Module identifier.
        module: String,
    },

    /// The load pass was requested before any types were declared.
    #[error("load pass requested before module types were configured")]
    NotConfigured,

    /// The load pass was requested a second time.
    #[error("load pass already ran")]
    AlreadyInitialized,

    /// A module was registered after the load pass started.
    #[error("module {module:?} registered after the load pass started")]
    RegistrationClosed {
        /// Module identifier.
        module: String,
    },

    /// The runtime was built without a required collaborator.
    #[error("runtime built without a {name}")]
    MissingCollaborator {
        /// Collaborator kind (`page`, `network bridge`).
        name: &'static str,
    },

    /// A configured pattern failed to compile.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// Pattern source.
        pattern: String,
        /// Compiler message.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use pagevisor::ConfigError;
    ///
    /// let err = ConfigError::DuplicateModule { module: "shout".into() };
    /// assert_eq!(err.as_label(), "config_duplicate_module");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::NoTypes => "config_no_types",
            ConfigError::DuplicateType { .. } => "config_duplicate_type",
            ConfigError::UnknownType { .. } => "config_unknown_type",
            ConfigError::DuplicateModule { .. } => "config_duplicate_module",
            ConfigError::UnknownModule { .. } => "config_unknown_module",
            ConfigError::NotConfigured => "config_not_configured",
            ConfigError::AlreadyInitialized => "config_already_initialized",
            ConfigError::RegistrationClosed { .. } => "config_registration_closed",
            ConfigError::MissingCollaborator { .. } => "config_missing_collaborator",
            ConfigError::InvalidPattern { .. } => "config_invalid_pattern",
        }
    }
}

/// # Errors produced by a bounded wait.
///
/// Exhaustion is **not** an error (see [`PollOutcome`](crate::PollOutcome));
/// this type only reports a search that failed and aborted the chain.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// The search closure failed on the given attempt (1-based).
    #[error("search failed on attempt {attempt}: {reason}")]
    SearchFailed {
        /// Attempt on which the search failed.
        attempt: u32,
        /// Failure message.
        reason: String,
    },
}

impl PollError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PollError::SearchFailed { .. } => "poll_search_failed",
        }
    }
}

/// # Errors reported by a [`Page`](crate::Page) implementation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The node is no longer part of the document.
    #[error("node {node} is detached")]
    Detached {
        /// Node identifier.
        node: u64,
    },

    /// The selector cannot be evaluated by this page.
    #[error("unsupported selector {selector:?}")]
    UnsupportedSelector {
        /// Selector source.
        selector: String,
    },
}

impl DomError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DomError::Detached { .. } => "dom_detached",
            DomError::UnsupportedSelector { .. } => "dom_unsupported_selector",
        }
    }
}

/// # Errors reported by a [`Storage`](crate::Storage) backend.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend I/O failed.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StorageError::Io(_) => "storage_io",
            StorageError::Serialization(_) => "storage_serialization",
        }
    }
}

/// # Network bridge failure.
///
/// The bridge hides sandbox differences and reports only success or failure;
/// the optional status and reason are informational.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete with a success status.
    #[error("request {method} {path} failed: {reason}")]
    Failed {
        /// HTTP method.
        method: String,
        /// Requested path.
        path: String,
        /// Failure description.
        reason: String,
    },
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Failed { .. } => "transport_failed",
        }
    }
}

/// # Failure of a module lifecycle hook.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HookError {
    /// The hook reported a failure.
    #[error("hook failed: {reason}")]
    Failed {
        /// Failure description.
        reason: String,
    },

    /// Persisting properties from inside the hook failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl HookError {
    /// Convenience constructor for [`HookError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        HookError::Failed {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use pagevisor::HookError;
    ///
    /// assert_eq!(HookError::failed("boom").as_label(), "hook_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HookError::Failed { .. } => "hook_failed",
            HookError::Storage(_) => "hook_storage",
        }
    }
}

/// # Errors from registry operations that touch storage.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The operation was invalid for the current configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Persisting the change failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::Config(e) => e.as_label(),
            RegistryError::Storage(e) => e.as_label(),
        }
    }
}
