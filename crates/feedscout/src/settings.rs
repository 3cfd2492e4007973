use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use feedscout_layout::{LayoutConfig, LayoutError};
use serde::Deserialize;

use crate::cli::{CliArgs, CliSources};
use crate::decision::DecisionConfig;
use crate::matcher::MatchThresholds;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    keywords: Option<Vec<String>>,
    store_path: Option<String>,
    output_dir: Option<String>,
    layout: LayoutConfig,
    matcher: MatchThresholds,
    stability: StabilitySettings,
    decision: DecisionConfig,
    store: StoreFileConfig,
    #[serde(rename = "loop")]
    run: LoopSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct StoreFileConfig {
    processed_store_max: usize,
}

impl Default for StoreFileConfig {
    fn default() -> Self {
        Self {
            processed_store_max: 5000,
        }
    }
}

/// When a list page counts as settled.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct StabilitySettings {
    /// Mean absolute thumbnail difference below which two frames match.
    pub list_page_stable_threshold: f32,
    pub list_min_stable_frames: u32,
    /// Frames without settling after which analysis is forced anyway.
    pub max_wait_frames: u32,
    pub thumbnail_width: usize,
    pub thumbnail_height: usize,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            list_page_stable_threshold: 3.0,
            list_min_stable_frames: 2,
            max_wait_frames: 8,
            thumbnail_width: 32,
            thumbnail_height: 32,
        }
    }
}

/// Loop pacing. Settle delays give the target UI time to react to an
/// injected action before the next capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    pub poll_interval_ms: u64,
    pub open_settle_ms: u64,
    pub back_settle_ms: u64,
    pub scroll_settle_ms: u64,
    pub max_scroll_retries: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            open_settle_ms: 1500,
            back_settle_ms: 1000,
            scroll_settle_ms: 800,
            max_scroll_retries: 2,
        }
    }
}

#[derive(Debug)]
pub struct EffectiveSettings {
    pub keywords: Vec<String>,
    pub replay_dir: PathBuf,
    pub store_path: PathBuf,
    pub output_dir: PathBuf,
    pub processed_store_max: usize,
    pub layout: LayoutConfig,
    pub matcher: MatchThresholds,
    pub stability: StabilitySettings,
    pub decision: DecisionConfig,
    pub run: LoopSettings,
    pub max_iterations: Option<u64>,
    pub config_path: Option<PathBuf>,
}

const DEFAULT_STORE_PATH: &str = "processed_signatures.json";
const DEFAULT_OUTPUT_DIR: &str = "posts";
const LOCAL_CONFIG_FILE: &str = "feedscout.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        path: Option<PathBuf>,
        field: &'static str,
        value: String,
    },
    NotFound {
        path: PathBuf,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config file {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config file {}: {source}", path.display())
            }
            ConfigError::InvalidValue { path, field, value } => match path {
                Some(path) => write!(
                    f,
                    "invalid value '{value}' for '{field}' in {}",
                    path.display()
                ),
                None => write!(f, "invalid value '{value}' for '{field}'"),
            },
            ConfigError::NotFound { path } => {
                write!(f, "config file {} does not exist", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::InvalidValue { .. } | ConfigError::NotFound { .. } => None,
        }
    }
}

pub fn resolve_settings(
    cli: &CliArgs,
    sources: &CliSources,
) -> Result<EffectiveSettings, ConfigError> {
    let (file, config_path) = load_config(cli.config.as_deref())?;
    let settings = merge(cli, sources, file, config_path)?;
    validate(&settings)?;
    Ok(settings)
}

fn load_config(path_override: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = path_override {
        let path = expand_pathbuf(path.to_path_buf());
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        return read_config(path);
    }

    let candidates = [local_config_path(), default_config_path()];
    match candidates.into_iter().flatten().find(|path| path.exists()) {
        Some(path) => read_config(path),
        None => Ok((FileConfig::default(), None)),
    }
}

fn read_config(path: PathBuf) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    log::debug!("loaded configuration from {}", path.display());
    Ok((config, Some(path)))
}

fn merge(
    cli: &CliArgs,
    sources: &CliSources,
    file: FileConfig,
    config_path: Option<PathBuf>,
) -> Result<EffectiveSettings, ConfigError> {
    let config_dir = config_path
        .as_ref()
        .and_then(|path| path.parent().map(Path::to_path_buf));

    let FileConfig {
        keywords: file_keywords,
        store_path: file_store_path,
        output_dir: file_output_dir,
        layout,
        matcher,
        stability,
        decision: mut decision,
        store,
        run: mut run,
    } = file;

    let keywords: Vec<String> = if sources.keywords_from_cli || file_keywords.is_none() {
        cli.keywords.clone()
    } else {
        file_keywords.unwrap_or_default()
    };
    let keywords: Vec<String> = keywords
        .into_iter()
        .filter_map(|keyword| normalize_string(Some(keyword)))
        .collect();
    if keywords.is_empty() {
        return Err(ConfigError::InvalidValue {
            path: config_path,
            field: "keywords",
            value: "[]".to_string(),
        });
    }

    let store_path = match cli.store.clone() {
        Some(path) => expand_pathbuf(path),
        None => normalize_string(file_store_path)
            .and_then(|value| resolve_path_from_config(value, config_dir.as_deref()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
    };
    let output_dir = match cli.output_dir.clone() {
        Some(path) => expand_pathbuf(path),
        None => normalize_string(file_output_dir)
            .and_then(|value| resolve_path_from_config(value, config_dir.as_deref()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
    };

    if sources.confirm_frames_from_cli {
        decision.match_confirm_frames = cli.confirm_frames;
    }
    if sources.grace_iterations_from_cli {
        decision.grace_iterations = cli.grace_iterations;
    }
    if sources.poll_interval_from_cli {
        run.poll_interval_ms = cli.poll_interval_ms;
    }

    Ok(EffectiveSettings {
        keywords,
        replay_dir: expand_pathbuf(cli.replay_dir.clone()),
        store_path,
        output_dir,
        processed_store_max: store.processed_store_max,
        layout,
        matcher,
        stability,
        decision,
        run,
        max_iterations: cli.max_iterations,
        config_path,
    })
}

fn validate(settings: &EffectiveSettings) -> Result<(), ConfigError> {
    let invalid = |field: &'static str, value: String| ConfigError::InvalidValue {
        path: settings.config_path.clone(),
        field,
        value,
    };

    settings
        .layout
        .validate()
        .map_err(|LayoutError::InvalidConfig { field, value }| invalid(field, value))?;

    let matcher = &settings.matcher;
    if !(0.0..=100.0).contains(&matcher.min_avg_conf) {
        return Err(invalid("min_avg_conf", matcher.min_avg_conf.to_string()));
    }
    if !(0.0..=100.0).contains(&matcher.min_token_conf) {
        return Err(invalid("min_token_conf", matcher.min_token_conf.to_string()));
    }
    if !(0.0..=1.0).contains(&matcher.min_cjk_ratio) {
        return Err(invalid("min_cjk_ratio", matcher.min_cjk_ratio.to_string()));
    }

    let stability = &settings.stability;
    if !(stability.list_page_stable_threshold > 0.0) {
        return Err(invalid(
            "list_page_stable_threshold",
            stability.list_page_stable_threshold.to_string(),
        ));
    }
    if stability.list_min_stable_frames == 0 {
        return Err(invalid("list_min_stable_frames", "0".to_string()));
    }
    if stability.thumbnail_width == 0 || stability.thumbnail_height == 0 {
        return Err(invalid(
            "thumbnail",
            format!("{}x{}", stability.thumbnail_width, stability.thumbnail_height),
        ));
    }

    if settings.decision.match_confirm_frames == 0 {
        return Err(invalid("match_confirm_frames", "0".to_string()));
    }
    if settings.decision.position_quantum <= 0 {
        return Err(invalid(
            "position_quantum",
            settings.decision.position_quantum.to_string(),
        ));
    }
    if settings.processed_store_max == 0 {
        return Err(invalid("processed_store_max", "0".to_string()));
    }
    if settings.run.poll_interval_ms == 0 {
        return Err(invalid("poll_interval_ms", "0".to_string()));
    }
    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("rs", "feedscout", "feedscout")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn local_config_path() -> Option<PathBuf> {
    env::current_dir().ok().map(|dir| dir.join(LOCAL_CONFIG_FILE))
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn expand_pathbuf(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) => expand_home_path(s),
        None => path,
    }
}

fn resolve_path_from_config(value: String, base: Option<&Path>) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_home_path(trimmed);
    match base {
        Some(base) if !expanded.is_absolute() => Some(base.join(expanded)),
        _ => Some(expanded),
    }
}

fn expand_home_path(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().to_path_buf();
        }
    } else if let Some(stripped) = value.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(stripped);
        }
    }
    PathBuf::from(value)
}
