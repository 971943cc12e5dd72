pub mod config;
pub mod error;

pub use config::Config;
pub use error::*;

/// Annotation key prefix naming alert outputs: `com.uswitch.alert/<sink>`.
pub const ANNOTATION_PREFIX: &str = "com.uswitch.alert";
