//! Configuration loading and dependency wiring.

pub mod dependencies;
pub mod file;

pub use dependencies::Dependencies;
pub use file::{
    FileConfig, IndexSection, JsonFileSetting, SettingServices, SourceSection,
    DEFAULT_CONFIG_PATH,
};
