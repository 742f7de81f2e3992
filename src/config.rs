//! Stack tagger settings.
//!
//! Values are layered: built-in defaults, then an optional INI file, then
//! command line overrides.
//!
//! ```ini
//! [stack]
//! name = instance-scheduler-stack
//! region = eu-west-1
//! profile = import
//!
//! [tags]
//! IMPORT2 = true
//! ```

use crate::error::{TaggerError, TaggerResult};
use configparser::ini::Ini;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_STACK_NAME: &str = "instance-scheduler-stack";
pub const DEFAULT_TAG_KEY: &str = "IMPORT2";
pub const DEFAULT_TAG_VALUE: &str = "true";

const STACK_SECTION: &str = "stack";
const TAGS_SECTION: &str = "tags";

type IniSections = HashMap<String, HashMap<String, Option<String>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggerConfig {
    pub stack_name: String,
    pub tags: BTreeMap<String, String>,
    pub region: Option<String>,
    pub profile: Option<String>,
    /// ARN partition; derived from the region when unset.
    pub partition: Option<String>,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            tags: BTreeMap::from([(DEFAULT_TAG_KEY.to_string(), DEFAULT_TAG_VALUE.to_string())]),
            region: None,
            profile: None,
            partition: None,
        }
    }
}

/// Values given on the command line. Empty `tags` keeps the configured set.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub stack_name: Option<String>,
    pub tags: Vec<(String, String)>,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub partition: Option<String>,
}

/// `~/.config/importkit/config.ini` (or the platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join("importkit").join("config.ini"))
}

pub fn parse_tag(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("tag key is empty in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl TaggerConfig {
    /// An explicit `config_path` must exist. Without one, the default path is
    /// used only if the file is there.
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> TaggerResult<Self> {
        let mut config = Self::default();

        let file = match config_path {
            Some(path) if !path.exists() => {
                return Err(TaggerError::config(format!(
                    "config file {} does not exist",
                    path.display()
                )))
            }
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|path| path.exists()),
        };

        if let Some(path) = file {
            debug!("Loading settings from {}", path.display());
            let mut ini = Ini::new_cs();
            let sections = ini.load(&path).map_err(|e| {
                TaggerError::config(format!("failed to read {}: {}", path.display(), e))
            })?;
            config.apply_ini(&sections);
        }

        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn merge_ini_str(&mut self, text: &str) -> TaggerResult<()> {
        let mut ini = Ini::new_cs();
        let sections = ini.read(text.to_string()).map_err(TaggerError::config)?;
        self.apply_ini(&sections);
        Ok(())
    }

    fn apply_ini(&mut self, sections: &IniSections) {
        if let Some(stack) = sections.get(STACK_SECTION) {
            if let Some(name) = stack.get("name").and_then(non_empty) {
                self.stack_name = name;
            }
            if let Some(region) = stack.get("region").and_then(non_empty) {
                self.region = Some(region);
            }
            if let Some(profile) = stack.get("profile").and_then(non_empty) {
                self.profile = Some(profile);
            }
            if let Some(partition) = stack.get("partition").and_then(non_empty) {
                self.partition = Some(partition);
            }
        }

        if let Some(tags) = sections.get(TAGS_SECTION) {
            if !tags.is_empty() {
                self.tags = tags
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone().unwrap_or_default()))
                    .collect();
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(stack_name) = overrides.stack_name {
            self.stack_name = stack_name;
        }
        if !overrides.tags.is_empty() {
            self.tags = overrides.tags.into_iter().collect();
        }
        if overrides.region.is_some() {
            self.region = overrides.region;
        }
        if overrides.profile.is_some() {
            self.profile = overrides.profile;
        }
        if overrides.partition.is_some() {
            self.partition = overrides.partition;
        }
    }

    pub fn validate(&self) -> TaggerResult<()> {
        if self.stack_name.trim().is_empty() {
            return Err(TaggerError::config("stack name is empty"));
        }
        if self.tags.is_empty() {
            return Err(TaggerError::config("no tags to apply"));
        }
        if let Some(key) = self.tags.keys().find(|k| k.trim().is_empty()) {
            return Err(TaggerError::config(format!("invalid tag key '{key}'")));
        }
        Ok(())
    }
}
