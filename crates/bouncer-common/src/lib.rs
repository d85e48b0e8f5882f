pub mod config;
pub mod error;

pub use config::{
    Category, ConstLabels, ExporterConfig, HEALTH_PATH, parse_duration, parse_labels,
};
pub use error::{DecodeError, ExporterError, Result};
