use home::home_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{
    constant::{CONFIG_DIR, CONFIG_ENV, CONFIG_FILE},
    scroll::Viewport,
    PlazaError, PlazaResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlazaConfig {
    /// Base url of the marketplace, e.g. https://plaza.example.com
    pub api_base: String,
    /// Id of the signed in user. Needed by every action on a post.
    pub user_id: Option<String>,
    pub posts_per_page: u32,
    pub category_page_size: u32,
    pub ad_spot_page_size: u32,
    pub request_timeout_secs: u64,
    pub viewport: Viewport,
    /// Distance in pixels from the bottom at which mobile loads more.
    pub mobile_load_threshold: f64,
}

impl Default for PlazaConfig {
    fn default() -> Self {
        Self {
            api_base: String::from("http://localhost:3000"),
            user_id: None,
            posts_per_page: 10,
            category_page_size: 5,
            ad_spot_page_size: 5,
            request_timeout_secs: 15,
            viewport: Viewport::Desktop,
            mobile_load_threshold: 300.0,
        }
    }
}

impl PlazaConfig {
    /// Default location of the config file, `~/.plaza/plaza.toml`.
    pub fn default_path() -> PathBuf {
        let home_dir = home_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        home_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Resolve the config file: explicit path, then `$PLAZACONF`, then the
    /// default path. A missing file gives the defaults.
    pub fn load(path: Option<&Path>) -> PlazaResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(Self::default_path),
        };
        if !path.try_exists()? {
            debug!(?path, "no config file; using defaults");
            return Ok(Self::default());
        }
        let buf = std::fs::read_to_string(&path)?;
        let config = Self::parse(&buf)?;
        debug!(?path, "config loaded");
        Ok(config)
    }

    pub fn parse(buf: &str) -> PlazaResult<Self> {
        let config: Self = toml::from_str(buf)
            .map_err(|err| PlazaError::config_error(format!("Parsing error: {err}")))?;
        config.verify()?;
        Ok(config)
    }

    fn verify(&self) -> PlazaResult<()> {
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(PlazaError::config_error(format!(
                "api_base must be an http(s) url, got '{}'",
                self.api_base
            ))
            .into());
        }
        if self.posts_per_page == 0 || self.category_page_size == 0 || self.ad_spot_page_size == 0
        {
            return Err(PlazaError::config_error("page sizes must be positive".into()).into());
        }
        Ok(())
    }

    /// Write the config to path
    pub fn save(&self, path: &Path) -> PlazaResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let buf = toml::to_string_pretty(self)?;
        std::fs::write(path, buf)?;
        Ok(())
    }

    pub fn user(&self) -> PlazaResult<&str> {
        self.user_id
            .as_deref()
            .ok_or_else(|| PlazaError::MissingUser.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = PlazaConfig::parse(
            r#"
            api_base = "https://plaza.example.com"
            user_id = "u1"
            viewport = "mobile"
            "#,
        )
        .unwrap();
        assert_eq!(config.user().unwrap(), "u1");
        assert_eq!(config.viewport, Viewport::Mobile);
        assert_eq!(config.posts_per_page, 10);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(PlazaConfig::parse(r#"api_base = "ftp://x""#).is_err());
        assert!(PlazaConfig::parse("posts_per_page = 0").is_err());
        assert!(PlazaConfig::parse("posts_per_page = \"ten\"").is_err());
    }

    #[test]
    fn missing_user_is_an_error() {
        let err = PlazaConfig::default().user().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlazaError>(),
            Some(PlazaError::MissingUser)
        ));
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir()
            .join("plaza-config-test")
            .join(CONFIG_FILE);
        let config = PlazaConfig {
            user_id: Some("u7".into()),
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(PlazaConfig::load(Some(&path)).unwrap(), config);

        let missing = std::env::temp_dir().join("plaza-config-test").join("none.toml");
        assert_eq!(PlazaConfig::load(Some(&missing)).unwrap(), PlazaConfig::default());
    }
}
