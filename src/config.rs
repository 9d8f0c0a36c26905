use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::overlay::{OverlayStyle, MAX_LABEL_SCALE};
use crate::stage::{StageRules, DEFAULT_CIRCULARITY_THRESHOLD};
use crate::storage::LogFormat;

const DEFAULT_MIN_SCORE: f32 = 0.9;
const DEFAULT_FPS: f64 = 25.0;
const DEFAULT_OUTPUT_DIR: &str = "annotated";
const DEFAULT_LOG_PATH: &str = "observations.jsonl";

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    rules: Option<RulesConfigFile>,
    detection: Option<DetectionConfigFile>,
    source: Option<SourceConfigFile>,
    output: Option<OutputConfigFile>,
    overlay: Option<OverlayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct RulesConfigFile {
    circularity_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    min_score: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    fps: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    log_path: Option<PathBuf>,
    log_format: Option<LogFormat>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    label_scale: Option<u32>,
    draw_outlines: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rules: StageRules,
    /// Instances scoring below this are ignored.
    pub min_score: f32,
    pub fps: f64,
    pub output: OutputSettings,
    pub overlay: OverlayStyle,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub log_path: PathBuf,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules: StageRules::default(),
            min_score: DEFAULT_MIN_SCORE,
            fps: DEFAULT_FPS,
            output: OutputSettings {
                dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
                log_path: PathBuf::from(DEFAULT_LOG_PATH),
                log_format: LogFormat::Jsonl,
            },
            overlay: OverlayStyle::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the file named by `ICSI_CONFIG`, then `ICSI_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ICSI_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        let defaults = Self::default();
        let output = file.output.unwrap_or_default();
        let overlay = file.overlay.unwrap_or_default();
        Self {
            rules: StageRules {
                circularity_threshold: file
                    .rules
                    .and_then(|rules| rules.circularity_threshold)
                    .unwrap_or(DEFAULT_CIRCULARITY_THRESHOLD),
            },
            min_score: file
                .detection
                .and_then(|detection| detection.min_score)
                .unwrap_or(DEFAULT_MIN_SCORE),
            fps: file.source.and_then(|source| source.fps).unwrap_or(DEFAULT_FPS),
            output: OutputSettings {
                dir: output.dir.unwrap_or(defaults.output.dir),
                log_path: output.log_path.unwrap_or(defaults.output.log_path),
                log_format: output.log_format.unwrap_or(defaults.output.log_format),
            },
            overlay: OverlayStyle {
                label_scale: overlay.label_scale.unwrap_or(defaults.overlay.label_scale),
                draw_outlines: overlay
                    .draw_outlines
                    .unwrap_or(defaults.overlay.draw_outlines),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(value) = env_value("ICSI_CIRCULARITY_THRESHOLD") {
            self.rules.circularity_threshold = value
                .parse()
                .map_err(|_| anyhow!("ICSI_CIRCULARITY_THRESHOLD must be a number"))?;
        }
        if let Some(value) = env_value("ICSI_MIN_SCORE") {
            self.min_score = value
                .parse()
                .map_err(|_| anyhow!("ICSI_MIN_SCORE must be a number"))?;
        }
        if let Some(value) = env_value("ICSI_FPS") {
            self.fps = value
                .parse()
                .map_err(|_| anyhow!("ICSI_FPS must be a number"))?;
        }
        if let Some(value) = env_value("ICSI_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(value);
        }
        if let Some(value) = env_value("ICSI_LOG_PATH") {
            self.output.log_path = PathBuf::from(value);
        }
        if let Some(value) = env_value("ICSI_LOG_FORMAT") {
            self.output.log_format = value.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.rules.validate()?;
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(anyhow!(
                "min score must be within [0, 1], got {}",
                self.min_score
            ));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(anyhow!("fps must be positive, got {}", self.fps));
        }
        if !(1..=MAX_LABEL_SCALE).contains(&self.overlay.label_scale) {
            return Err(anyhow!(
                "overlay label scale must be within [1, {}], got {}",
                MAX_LABEL_SCALE,
                self.overlay.label_scale
            ));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
