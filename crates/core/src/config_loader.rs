use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads engine configuration by merging TOML and environment variables.
    ///
    /// Missing files are skipped; every value falls back to its default.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or values
    /// fail validation.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/Config.toml")
    }

    /// Loads engine configuration from a specific TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or values
    /// fail validation.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("ARBSCAN_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Loads engine configuration with a profile override file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or values
    /// fail validation.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Toml::file("config/Config.toml"))
            .merge(Toml::file(format!("config/Config.{profile}.toml")))
            .merge(Env::prefixed("ARBSCAN_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }
}
