//! Core types shared by every service: identifiers, configuration,
//! errors and the transport seam.

mod config;
mod error;
pub(crate) mod parse;
mod transport;
mod types;

pub use config::*;
pub use error::*;
pub use transport::*;
pub use types::*;
