//! nsbatch Core - Foundation types, naming, and events
//!
//! This crate provides the core abstractions used throughout nsbatch.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod events;
pub mod naming;
pub mod types;

pub use error::{Error, Result};
pub use events::ProvisionEvent;
pub use naming::{
    INTERFACE_PREFIX, MAX_INTERFACE_NAME_LEN, NAMESPACE_PREFIX, NameCollision, NamingScheme,
};
pub use types::{IdRange, Mode, NamespaceId};
