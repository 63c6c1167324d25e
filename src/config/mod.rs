//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: config struct definitions and TOML loading
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup checks that collect every problem at once
//!
//! The loaded [`Config`] is immutable; components receive the parts they
//! need when they are constructed.

mod defaults;
mod types;
mod validation;

pub use types::{
    Config, ConfigError, GeolocationConfig, GithubConfig, IrcConfig, TitlesConfig, UntappdConfig,
    WeatherConfig,
};
pub use validation::{ValidationError, validate};
