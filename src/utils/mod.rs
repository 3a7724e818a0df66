//! Utility functions shared by the library and its demo programs

mod logging;

pub use logging::{setup_logging, LogConfig};

/// Re-exports of the utilities most binaries need.
pub mod prelude {
    pub use super::logging::{setup_logging, LogConfig};
}
