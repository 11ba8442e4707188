//! Recoverable error channel.
//!
//! Every failure attributable to external input or to a collaborator (layout
//! descriptors, materializers, configuration files, the operating system) is
//! reported as an [`Error`] to the immediate caller. Violated internal invariants
//! never show up here; they go through [`crate::utils::fatal`].
use std::io;

use strum::EnumIs;
use thiserror::Error;

#[derive(Debug, EnumIs, Error)]
pub enum Error {
    /// A plain failure carrying only a message.
    #[error("{0}")]
    Runtime(String),

    /// A failure wrapping a system error. The originating OS code is preserved in `source`.
    #[error("{message}: {source}")]
    System {
        source: io::Error,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The data layout descriptor could not be parsed.
    #[error("Malformed data layout descriptor `{descriptor}`: {}", errors.join("; "))]
    LayoutParse {
        descriptor: String,
        errors: Vec<String>,
    },

    /// A materializer failed to read its backing representation.
    #[error("Failed to materialize module `{module}`: {reason}")]
    Materialization { module: String, reason: String },

    /// A materializer reported success but left deferred globals behind.
    #[error(
        "Materialization of module `{module}` finished with {} deferred global(s) left: {}",
        remaining.len(),
        remaining.join(", ")
    )]
    IncompleteMaterialization {
        module: String,
        remaining: Vec<String>,
    },

    /// A deferred global was requested while no materializer is installed.
    #[error("Global `{0}` is deferred but the module has no materializer installed.")]
    NoMaterializer(String),

    /// The installed materializer cannot fill in a single global on its own.
    #[error("The installed materializer cannot materialize global `{0}` individually.")]
    NotMaterializable(String),

    /// A global with the same name is already owned by the module.
    #[error("A global named `{0}` already exists in the module.")]
    DuplicateGlobal(String),

    /// No global with the given name is owned by the module.
    #[error("No global named `{0}` exists in the module.")]
    UnknownGlobal(String),

    /// A metadata reference does not point into the module's metadata pool.
    #[error("Metadata `{owner}` refers to a value that is not owned by the module.")]
    UnknownMetadata { owner: String },

    #[error("Failed to parse configuration file '{file}': {source}")]
    ConfigParse {
        source: toml::de::Error,
        file: String,
    },

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Raw OS error code of the underlying system error, when there is one.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Error::System { source, .. } | Error::Io(source) => source.raw_os_error(),
            _ => None,
        }
    }
}

pub type HyResult<T> = Result<T, Error>;

/// Fail with a plain message.
pub fn fail<T>(message: impl Into<String>) -> HyResult<T> {
    Err(Error::Runtime(message.into()))
}

/// Fail with a system error, keeping its code for diagnostics.
pub fn fail_with_code<T>(source: io::Error, message: impl Into<String>) -> HyResult<T> {
    Err(Error::System {
        source,
        message: message.into(),
    })
}

/// Fail if `code` is a non-zero OS error code.
pub fn check_code(code: i32, message: impl Into<String>) -> HyResult<()> {
    if code != 0 {
        fail_with_code(io::Error::from_raw_os_error(code), message)
    } else {
        Ok(())
    }
}

/// Fail if `condition` does not hold.
pub fn check(condition: bool, message: impl Into<String>) -> HyResult<()> {
    if condition {
        Ok(())
    } else {
        fail(message)
    }
}
