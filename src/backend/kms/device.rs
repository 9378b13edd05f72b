// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use smithay::reexports::drm::control::crtc;

use super::{update::KmsUpdate, DeviceId};

#[derive(Debug, thiserror::Error)]
pub enum KmsError {
    #[error("update for device {got:?} submitted to device {expected:?}")]
    WrongDevice { expected: DeviceId, got: DeviceId },
    #[error("unknown crtc {0:?}")]
    UnknownCrtc(crtc::Handle),
    #[error("crtc {0:?} is not vrr capable")]
    VrrUnsupported(crtc::Handle),
}

/// The mode setting side of a DRM device.
pub trait KmsDevice: fmt::Debug {
    fn id(&self) -> DeviceId;
    /// Commits all changes of `update` at once, or none of them.
    fn process_update(&mut self, update: KmsUpdate) -> Result<(), KmsError>;
}

/// PCI vendor of the gpu behind `/dev/dri/renderD<render_minor>`.
pub fn read_vendor(render_minor: u32) -> Option<u32> {
    let vendor = std::fs::read_to_string(format!(
        "/sys/class/drm/renderD{}/device/vendor",
        render_minor
    ))
    .ok()?;
    parse_vendor(&vendor)
}

fn parse_vendor(vendor: &str) -> Option<u32> {
    let vendor = vendor.trim();
    let hex = vendor
        .strip_prefix("0x")
        .or_else(|| vendor.strip_prefix("0X"))
        .unwrap_or(vendor);
    u32::from_str_radix(hex, 16).ok()
}
