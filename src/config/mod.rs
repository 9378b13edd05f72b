// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

pub use cosmic_frame_sync_config::{AdaptiveSync, OutputConfig, OutputInfo, OutputsConfig};
use tracing::{debug, info};

use crate::utils::env::bool_var;

#[derive(Debug, Default)]
pub struct Config {
    outputs: (Option<PathBuf>, OutputsConfig),
}

impl Config {
    pub fn load() -> Config {
        let xdg = xdg::BaseDirectories::new().ok();
        let output_path =
            xdg.and_then(|base| base.place_state_file("cosmic-frame-sync/outputs.ron").ok());
        Self::load_from(output_path)
    }

    pub fn load_from(output_path: Option<PathBuf>) -> Config {
        let outputs = cosmic_frame_sync_config::output::load_outputs(output_path.as_ref());
        info!(
            path = ?output_path,
            layouts = outputs.config.len(),
            "Loaded output configuration"
        );
        Config {
            outputs: (output_path, outputs),
        }
    }

    pub fn adaptive_sync(&self, output: &OutputInfo) -> AdaptiveSync {
        self.outputs.1.adaptive_sync(output).unwrap_or_else(|| {
            debug!(connector = %output.connector, "No stored adaptive sync setting");
            AdaptiveSync::default()
        })
    }
}

/// Whether frame sync should be requested for an output with the given setting.
pub fn requested_frame_sync(vrr: AdaptiveSync, has_active_fullscreen: bool) -> bool {
    if bool_var("COSMIC_DISABLE_VRR").unwrap_or(false) {
        return false;
    }
    policy(vrr, has_active_fullscreen)
}

fn policy(vrr: AdaptiveSync, has_active_fullscreen: bool) -> bool {
    match vrr {
        AdaptiveSync::Force => true,
        AdaptiveSync::Enabled => has_active_fullscreen,
        AdaptiveSync::Disabled => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::env::ENV_LOCK;
    use std::sync::PoisonError;

    #[test]
    fn adaptive_sync_policy() {
        assert!(policy(AdaptiveSync::Force, false));
        assert!(policy(AdaptiveSync::Force, true));
        assert!(!policy(AdaptiveSync::Enabled, false));
        assert!(policy(AdaptiveSync::Enabled, true));
        assert!(!policy(AdaptiveSync::Disabled, false));
        assert!(!policy(AdaptiveSync::Disabled, true));
    }

    #[test]
    fn disable_vrr_env_overrides_policy() {
        let _env = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        std::env::set_var("COSMIC_DISABLE_VRR", "1");
        let disabled = requested_frame_sync(AdaptiveSync::Force, true);
        std::env::set_var("COSMIC_DISABLE_VRR", "0");
        let allowed = requested_frame_sync(AdaptiveSync::Force, true);
        std::env::remove_var("COSMIC_DISABLE_VRR");

        assert!(!disabled);
        assert!(allowed);
        assert!(requested_frame_sync(AdaptiveSync::Enabled, true));
        assert!(!requested_frame_sync(AdaptiveSync::Enabled, false));
    }

    #[test]
    fn unknown_outputs_default_to_enabled() {
        let config = Config::load_from(None);
        assert!(config.outputs.1.config.is_empty());
        let info = OutputInfo {
            connector: "HDMI-A-1".into(),
            make: "LG".into(),
            model: "27GL850".into(),
        };
        assert_eq!(config.adaptive_sync(&info), AdaptiveSync::Enabled);
    }
}
