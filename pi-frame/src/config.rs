use crate::{
    prompts, registry::ModuleDefinition, schedule::ActiveHours, weather::Location, FrameError,
    Result,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_EVENING_HOUR: u32 = 18;
const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub artifact_directory: PathBuf,
    pub description_model: ModuleDefinition,
    pub image_model: ModuleDefinition,
    pub topic_strategy: ModuleDefinition,
    /// Cron expression for the next wake up. Hourly within `active_hours` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default)]
    pub active_hours: ActiveHours,
    #[serde(default = "default_evening_hour")]
    pub evening_hour: u32,
    #[serde(default = "prompts::default_styles")]
    pub styles: Vec<String>,
    #[serde(default)]
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
    #[serde(default = "default_generate_title")]
    pub generate_title: bool,
}

fn default_evening_hour() -> u32 {
    DEFAULT_EVENING_HOUR
}

fn default_generate_title() -> bool {
    true
}

impl Config {
    pub fn images_directory(&self) -> PathBuf {
        self.artifact_directory.join("images")
    }

    pub fn history_path(&self) -> PathBuf {
        self.artifact_directory.join(crate::history::HISTORY_FILE)
    }

    pub fn font_path(&self) -> &Path {
        self.font_path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_FONT_PATH))
    }

    fn validate(&self) -> Result<()> {
        if self.evening_hour > 23 {
            return Err(FrameError::Config(format!(
                "evening_hour must be within 0-23, got {}",
                self.evening_hour
            )));
        }
        if self.styles.is_empty() {
            return Err(FrameError::Config("styles cannot be empty".into()));
        }
        self.active_hours.validate()
    }
}

pub fn load(path: impl AsRef<Path>) -> Result<Config> {
    let s = fs::read_to_string(path)?;
    from_str(&s)
}

pub fn from_str(s: &str) -> Result<Config> {
    let config: Config =
        serde_json::from_str(s).map_err(|e| FrameError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Overwrite the configuration at `path`.
pub fn save(path: impl AsRef<Path>, config: &Config) -> Result<()> {
    let s = serde_json::to_string_pretty(config)?;
    fs::write(path, s)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    const CONFIG: &str = r#"
{
    "artifact_directory": "/home/pi/piframe",
    "description_model": {
        "component": "anthropic",
        "args": {
            "model_id": "anthropic.claude-3-5-sonnet-20241022-v2:0",
            "anthropic_version": "bedrock-2023-05-31",
            "max_tokens": 100,
            "temperature": 1.0
        }
    },
    "image_model": {
        "class_path": "stable-image-ultra",
        "args": {"model_id": "stable-image-ultra-api", "aspect_ratio": "16:9"}
    },
    "topic_strategy": {"component": "random-adlib"},
    "schedule": "0 9-23 * * *"
}
"#;

    #[test]
    fn from_str() {
        let config = assert_ok!(super::from_str(CONFIG));
        assert_eq!(config.artifact_directory, PathBuf::from("/home/pi/piframe"));
        assert_eq!(config.description_model.component, "anthropic");
        assert_eq!(config.description_model.args["max_tokens"], json!(100));
        assert_eq!(config.image_model.component, "stable-image-ultra");
        assert!(config.topic_strategy.args.is_empty());
        assert_eq!(config.schedule.as_deref(), Some("0 9-23 * * *"));
        assert_eq!(config.active_hours, ActiveHours::default());
        assert_eq!(config.evening_hour, DEFAULT_EVENING_HOUR);
        assert_eq!(config.styles, prompts::default_styles());
        assert!(config.generate_title);
        assert_eq!(config.font_path(), Path::new(DEFAULT_FONT_PATH));
        assert_eq!(
            config.images_directory(),
            PathBuf::from("/home/pi/piframe/images")
        );

        assert_err!(super::from_str(r#"{"artifact_directory": "."}"#));
        assert_err!(super::from_str(
            &CONFIG.replace(r#""schedule""#, r#""evening_hour": 24, "schedule""#)
        ));
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = assert_ok!(super::from_str(CONFIG));
        config.font_path = Some("/tmp/font.ttf".into());
        config.generate_title = false;
        config.styles = vec!["Pixel Art.".into()];

        assert_ok!(save(&path, &config));
        assert_eq!(assert_ok!(load(&path)), config);
    }
}
