// SPDX-License-Identifier: GPL-3.0-only

/// Per-output configuration, as persisted by the compositor
pub mod output;

pub use output::{AdaptiveSync, OutputConfig, OutputInfo, OutputsConfig};
