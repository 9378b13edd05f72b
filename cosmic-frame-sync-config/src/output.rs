// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs::OpenOptions, path::Path};
use tracing::{error, warn};

/// User preference for variable refresh rate on an output.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdaptiveSync {
    /// Only while a fullscreen surface is shown
    #[default]
    #[serde(rename = "true")]
    Enabled,
    #[serde(rename = "false")]
    Disabled,
    /// Always, regardless of content
    Force,
}

fn default_sync() -> AdaptiveSync {
    AdaptiveSync::Enabled
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputsConfig {
    pub config: HashMap<Vec<OutputInfo>, Vec<OutputConfig>>,
}

impl OutputsConfig {
    /// Adaptive sync preference stored for `info`, in any known output layout.
    pub fn adaptive_sync(&self, info: &OutputInfo) -> Option<AdaptiveSync> {
        self.config.iter().find_map(|(infos, configs)| {
            infos
                .iter()
                .position(|i| i == info)
                .and_then(|idx| configs.get(idx))
                .map(|conf| conf.vrr)
        })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OutputConfig {
    pub mode: ((i32, i32), Option<u32>),
    #[serde(default = "default_sync")]
    pub vrr: AdaptiveSync,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for OutputConfig {
    fn default() -> OutputConfig {
        OutputConfig {
            mode: ((0, 0), None),
            vrr: AdaptiveSync::Enabled,
            enabled: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputInfo {
    pub connector: String,
    pub make: String,
    pub model: String,
}

pub fn load_outputs(path: Option<impl AsRef<Path>>) -> OutputsConfig {
    if let Some(path) = path.as_ref() {
        let path: &Path = path.as_ref();
        if path.exists() {
            let res = OpenOptions::new()
                .read(true)
                .open(path)
                .map_err(|err| err.to_string())
                .and_then(|file| {
                    ron::de::from_reader::<_, OutputsConfig>(file).map_err(|err| err.to_string())
                });
            match res {
                Ok(config) => return config,
                Err(err) => {
                    warn!(?err, "Failed to read output_config, resetting..");
                    if let Err(err) = std::fs::remove_file(path) {
                        error!(?err, "Failed to remove output_config.");
                    }
                }
            };
        }
    }

    OutputsConfig {
        config: HashMap::new(),
    }
}
