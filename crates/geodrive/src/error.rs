//! Error types for the geodrive crate.

use std::fmt;

use crate::input::Action;
use crate::vehicle::VehicleId;

/// Result type for geodrive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A key binding was rejected because the key already drives another action.
    KeyInUse {
        /// The physical key code.
        key: String,
        /// The action that currently owns the key.
        action: Action,
    },
    /// The key has no binding.
    UnknownKey(String),
    /// The host failed to load a vehicle model.
    ModelLoad {
        /// The model URL.
        url: String,
        /// The error message.
        message: String,
    },
    /// No vehicle is registered under this id.
    UnknownVehicle(VehicleId),
    /// The vehicle exists but its model has not finished loading.
    VehicleNotReady(VehicleId),
    /// A vehicle tick produced a NaN or infinite value and was rolled back.
    NonFiniteState {
        /// The vehicle whose tick was rejected.
        id: VehicleId,
    },
    /// Configuration could not be parsed.
    Config {
        /// The error message.
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KeyInUse { key, action } => {
                write!(f, "key {key} is already bound to {action}")
            }
            Error::UnknownKey(key) => write!(f, "key {key} is not bound"),
            Error::ModelLoad { url, message } => {
                write!(f, "failed to load model {url}: {message}")
            }
            Error::UnknownVehicle(id) => write!(f, "unknown vehicle {id}"),
            Error::VehicleNotReady(id) => write!(f, "vehicle {id} is not ready"),
            Error::NonFiniteState { id } => {
                write!(f, "vehicle {id} produced a non-finite state")
            }
            Error::Config { message } => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config {
            message: e.to_string(),
        }
    }
}
