use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use time::Weekday;

use crate::presets::{weekday_from_index, PresetCatalog, PresetEntry};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Rangepick";
const APP_NAME: &str = "rangepick";

const DEFAULT_FIELD: &str = "@sysdate";
const STATE_SUFFIX: &str = "rangePicker";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    /// `config_override` is the `--config` flag; it wins over
    /// `RANGEPICK_CONFIG`.
    pub fn discover(config_override: Option<PathBuf>) -> Result<Self> {
        Ok(Self::with_paths(ConfigPaths::discover(config_override)?))
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Loads the config file, writing one with defaults on first run.
    pub fn load_or_init(&self) -> Result<PickerConfig> {
        if self.paths.config_file.exists() {
            return self.load();
        }
        let mut cfg = PickerConfig::default();
        cfg.post_load();
        let toml = toml::to_string_pretty(&cfg).context("serializing default config")?;
        write_creating_parent(&self.paths.config_file, &toml)?;
        tracing::info!(path = %self.paths.config_file.display(), "wrote default config");
        Ok(cfg)
    }

    pub fn load(&self) -> Result<PickerConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: PickerConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
        Ok(cfg)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_file: PathBuf,
    /// Saved state-store snapshot, reused across runs like a bookmarked URL.
    /// Only touched by `replay --persist`.
    pub state_file: PathBuf,
}

impl ConfigPaths {
    pub fn discover(config_override: Option<PathBuf>) -> Result<Self> {
        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_file = config_override
            .or_else(|| env::var_os("RANGEPICK_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| project_dirs.config_dir().join("config.toml"));
        let state_file = env::var_os("RANGEPICK_STATE")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                project_dirs
                    .state_dir()
                    .unwrap_or_else(|| project_dirs.data_dir())
                    .join("state.json")
            });

        Ok(Self {
            config_file,
            state_file,
        })
    }
}

/// Writes `contents` to `path`, creating missing parent directories.
pub fn write_creating_parent(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

/// Options of one date-range filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerConfig {
    /// Identifies the filter in the state store. Derived from the fields when
    /// left empty.
    pub id: String,
    pub title: String,
    pub field_from: String,
    pub field_to: String,
    pub enable_presets: bool,
    /// First day of the week for week presets, 0 = Sunday.
    pub first_day: u8,
    pub start_caption: String,
    pub end_caption: String,
    pub from_label: String,
    pub to_label: String,
    pub presets: Vec<PresetEntry>,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: "Date".into(),
            field_from: DEFAULT_FIELD.into(),
            field_to: DEFAULT_FIELD.into(),
            enable_presets: false,
            first_day: 0,
            start_caption: "Start".into(),
            end_caption: "End".into(),
            from_label: "from".into(),
            to_label: "to".into(),
            presets: PresetCatalog::default().entries().to_vec(),
        }
    }
}

impl PickerConfig {
    pub fn post_load(&mut self) {
        if self.field_from.trim().is_empty() {
            tracing::warn!("empty field_from in config, falling back to {DEFAULT_FIELD}");
            self.field_from = DEFAULT_FIELD.into();
        }
        if self.field_to.trim().is_empty() {
            tracing::warn!("empty field_to in config, falling back to {DEFAULT_FIELD}");
            self.field_to = DEFAULT_FIELD.into();
        }
        if self.id.trim().is_empty() {
            self.id = if self.field_from == self.field_to {
                self.field_from.clone()
            } else {
                format!("{}-{}", self.field_from, self.field_to)
            };
        }
        if weekday_from_index(self.first_day).is_none() {
            tracing::warn!(first_day = self.first_day, "first_day out of range, falling back to Sunday");
            self.first_day = 0;
        }
        if self.enable_presets && self.presets.is_empty() {
            tracing::warn!("presets enabled without any preset configured, using defaults");
            self.presets = PresetCatalog::default().entries().to_vec();
        }
    }

    /// Name of this filter's attribute in the state store.
    pub fn state_attribute(&self) -> String {
        format!("{}:{STATE_SUFFIX}", self.id)
    }

    pub fn week_start(&self) -> Weekday {
        weekday_from_index(self.first_day).unwrap_or(Weekday::Sunday)
    }

    pub fn catalog(&self) -> PresetCatalog {
        PresetCatalog::new(self.presets.clone())
    }
}
