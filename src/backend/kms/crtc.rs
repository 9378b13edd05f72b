// SPDX-License-Identifier: GPL-3.0-only

use std::{fmt, time::Duration};

use smithay::reexports::drm::control::crtc;

use super::DeviceId;

/// Whether the output can vary its refresh timing in the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshRateMode {
    Fixed,
    Variable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrtcModeInfo {
    pub width: u16,
    pub height: u16,
    /// Nominal refresh rate in Hz
    pub refresh_rate: f32,
    pub refresh_rate_mode: RefreshRateMode,
    /// Lower bound of the variable refresh range in Hz, if known
    pub min_refresh_rate: Option<f32>,
}

impl CrtcModeInfo {
    pub fn fixed(width: u16, height: u16, refresh_rate: f32) -> Self {
        CrtcModeInfo {
            width,
            height,
            refresh_rate,
            refresh_rate_mode: RefreshRateMode::Fixed,
            min_refresh_rate: None,
        }
    }

    pub fn variable(width: u16, height: u16, refresh_rate: f32, min_refresh_rate: f32) -> Self {
        CrtcModeInfo {
            width,
            height,
            refresh_rate,
            refresh_rate_mode: RefreshRateMode::Variable,
            min_refresh_rate: Some(min_refresh_rate),
        }
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        interval_from_rate(self.refresh_rate)
    }

    /// Longest time the output may wait for a new frame while VRR is active.
    pub fn min_refresh_interval(&self) -> Option<Duration> {
        match self.refresh_rate_mode {
            RefreshRateMode::Fixed => None,
            RefreshRateMode::Variable => self.min_refresh_rate.and_then(interval_from_rate),
        }
    }
}

fn interval_from_rate(rate: f32) -> Option<Duration> {
    (rate.is_finite() && rate > 0.0).then(|| Duration::from_secs_f64(1.0 / rate as f64))
}

impl fmt::Display for CrtcModeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{:.3}", self.width, self.height, self.refresh_rate)?;
        if let (RefreshRateMode::Variable, Some(min)) =
            (self.refresh_rate_mode, self.min_refresh_rate)
        {
            write!(f, " (vrr {:.0}-{:.0})", min, self.refresh_rate)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrtcMode {
    pub id: u64,
    pub info: Option<CrtcModeInfo>,
}

impl CrtcMode {
    pub fn new(id: u64, info: CrtcModeInfo) -> Self {
        CrtcMode {
            id,
            info: Some(info),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrtcConfig {
    pub mode: Option<CrtcMode>,
    pub position: (i32, i32),
}

impl CrtcConfig {
    pub fn new(mode: CrtcMode) -> Self {
        CrtcConfig {
            mode: Some(mode),
            position: (0, 0),
        }
    }

    pub fn mode_info(&self) -> Option<&CrtcModeInfo> {
        self.mode.as_ref().and_then(|mode| mode.info.as_ref())
    }
}

/// A CRTC driving a single output.
pub trait Crtc: fmt::Debug {
    fn handle(&self) -> crtc::Handle;
    fn device(&self) -> DeviceId;
    /// `None` while the CRTC is not assigned a mode.
    fn config(&self) -> Option<&CrtcConfig>;
}
