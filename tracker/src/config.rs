use std::{path::{Path, PathBuf}, str::FromStr};

use anyhow::{bail, Context};
use hike_tracker_data_management::{DATABASE_PATH, DATA_DIR};
use hike_tracker_lib::hike_session::FirstSampleBaseline;

pub const CONFIG_FILE: &str = "tracker.conf";

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub data_dir: PathBuf,
    pub database: PathBuf,
    pub log_file: PathBuf,
    pub sample_interval_ms: u64,
    pub first_sample_baseline: FirstSampleBaseline,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_DIR),
            database: PathBuf::from(DATABASE_PATH),
            log_file: Path::new(DATA_DIR).join("log").join("tracker.log"),
            sample_interval_ms: 1000,
            first_sample_baseline: FirstSampleBaseline::default(),
        }
    }
}

pub fn parse_baseline(value: &str) -> Result<FirstSampleBaseline, String> {
    match value.trim().to_lowercase().as_str() {
        "zero" => Ok(FirstSampleBaseline::Zero),
        "reading" => Ok(FirstSampleBaseline::Reading),
        other => Err(format!("Unknown first sample baseline '{other}', expected zero or reading")),
    }
}

impl TrackerConfig {
    /// Parses `key = value` lines. Lines starting with `#` are comments.
    /// When only `data_dir` is given, the database and log file live inside it.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut config = Self::default();
        let mut database = None;
        let mut log_file = None;

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                bail!("Line {} is not a key = value pair: {line}", number + 1);
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "data_dir" => config.data_dir = PathBuf::from(value),
                "database" => database = Some(PathBuf::from(value)),
                "log_file" => log_file = Some(PathBuf::from(value)),
                "sample_interval_ms" => config.sample_interval_ms = parse_number(key, value)?,
                "first_sample_baseline" => config.first_sample_baseline = parse_baseline(value).map_err(anyhow::Error::msg)?,
                _ => {
                    tracing::warn!("Unknown config key: {}", key);
                }
            }
        }

        config.database = database.unwrap_or_else(|| config.data_dir.join("hikes.db"));
        config.log_file = log_file.unwrap_or_else(|| config.data_dir.join("log").join("tracker.log"));

        Ok(config)
    }

    /// Reads the config file, falling back to the defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {:?}", path))
    }

    /// The config file next to the workspace, or in the working directory outside of it.
    pub fn default_path() -> PathBuf {
        resolve(Path::new(CONFIG_FILE))
    }

    /// Makes every relative path absolute against the project root.
    pub fn resolved(mut self) -> Self {
        self.data_dir = resolve(&self.data_dir);
        self.database = resolve(&self.database);
        self.log_file = resolve(&self.log_file);
        self
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().with_context(|| format!("Invalid value for {key}: {value}"))
}

fn resolve(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    match project_root::get_project_root() {
        Ok(root) => root.join(path),
        Err(_) => path.to_path_buf(),
    }
}
