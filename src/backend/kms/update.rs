// SPDX-License-Identifier: GPL-3.0-only

use smithay::reexports::drm::control::crtc;

use super::DeviceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrtcUpdate {
    /// Sets the `VRR_ENABLED` property of the CRTC.
    Vrr { crtc: crtc::Handle, enabled: bool },
    /// Scans out the newly rendered buffer.
    PageFlip { crtc: crtc::Handle },
}

impl CrtcUpdate {
    pub fn crtc(&self) -> crtc::Handle {
        match self {
            CrtcUpdate::Vrr { crtc, .. } | CrtcUpdate::PageFlip { crtc } => *crtc,
        }
    }
}

/// A set of changes to be committed to one device atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmsUpdate {
    device: DeviceId,
    crtc_updates: Vec<CrtcUpdate>,
}

impl KmsUpdate {
    pub fn new(device: DeviceId) -> Self {
        KmsUpdate {
            device,
            crtc_updates: Vec::new(),
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Requests VRR to be enabled or disabled on `crtc`.
    ///
    /// A later call for the same CRTC replaces the earlier one, so a batch
    /// never carries conflicting directives.
    pub fn set_vrr(&mut self, crtc: crtc::Handle, enabled: bool) {
        self.crtc_updates
            .retain(|update| !matches!(update, CrtcUpdate::Vrr { crtc: c, .. } if *c == crtc));
        self.crtc_updates.push(CrtcUpdate::Vrr { crtc, enabled });
    }

    pub fn page_flip(&mut self, crtc: crtc::Handle) {
        if !self.crtc_updates.contains(&CrtcUpdate::PageFlip { crtc }) {
            self.crtc_updates.push(CrtcUpdate::PageFlip { crtc });
        }
    }

    pub fn vrr(&self, crtc: crtc::Handle) -> Option<bool> {
        self.crtc_updates.iter().find_map(|update| match update {
            CrtcUpdate::Vrr { crtc: c, enabled } if *c == crtc => Some(*enabled),
            _ => None,
        })
    }

    pub fn crtc_updates(&self) -> &[CrtcUpdate] {
        &self.crtc_updates
    }

    pub fn is_empty(&self) -> bool {
        self.crtc_updates.is_empty()
    }
}
