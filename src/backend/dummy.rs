// SPDX-License-Identifier: GPL-3.0-only

//! Headless stand-ins for real KMS hardware.

use std::{collections::HashMap, num::NonZeroU32};

use smithay::reexports::drm::control::crtc;
use tracing::trace;

use super::kms::{
    crtc::{Crtc, CrtcConfig},
    device::{KmsDevice, KmsError},
    update::{CrtcUpdate, KmsUpdate},
    DeviceId,
};

#[derive(Debug, Clone)]
pub struct DummyCrtc {
    handle: crtc::Handle,
    device: DeviceId,
    config: Option<CrtcConfig>,
}

impl DummyCrtc {
    pub fn new(index: u32, device: DeviceId, config: Option<CrtcConfig>) -> Self {
        DummyCrtc {
            handle: crtc::Handle::from(NonZeroU32::MIN.saturating_add(index)),
            device,
            config,
        }
    }

    pub fn set_config(&mut self, config: Option<CrtcConfig>) {
        self.config = config;
    }
}

impl Crtc for DummyCrtc {
    fn handle(&self) -> crtc::Handle {
        self.handle
    }

    fn device(&self) -> DeviceId {
        self.device
    }

    fn config(&self) -> Option<&CrtcConfig> {
        self.config.as_ref()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct CrtcProps {
    vrr_capable: bool,
    vrr_enabled: bool,
}

/// A device that keeps its CRTC properties in memory.
#[derive(Debug)]
pub struct DummyDevice {
    id: DeviceId,
    crtcs: HashMap<crtc::Handle, CrtcProps>,
    committed: Vec<KmsUpdate>,
}

impl DummyDevice {
    pub fn new(id: DeviceId) -> Self {
        DummyDevice {
            id,
            crtcs: HashMap::new(),
            committed: Vec::new(),
        }
    }

    pub fn add_crtc(&mut self, crtc: &impl Crtc, vrr_capable: bool) {
        self.crtcs.insert(
            crtc.handle(),
            CrtcProps {
                vrr_capable,
                vrr_enabled: false,
            },
        );
    }

    /// Value of the `VRR_ENABLED` property, `None` for unknown CRTCs.
    pub fn vrr_enabled(&self, crtc: crtc::Handle) -> Option<bool> {
        self.crtcs.get(&crtc).map(|props| props.vrr_enabled)
    }

    /// Every update processed so far, oldest first.
    pub fn committed(&self) -> &[KmsUpdate] {
        &self.committed
    }

    fn check(&self, update: &CrtcUpdate) -> Result<(), KmsError> {
        let crtc = update.crtc();
        let props = self.crtcs.get(&crtc).ok_or(KmsError::UnknownCrtc(crtc))?;
        match update {
            CrtcUpdate::Vrr { enabled: true, .. } if !props.vrr_capable => {
                Err(KmsError::VrrUnsupported(crtc))
            }
            _ => Ok(()),
        }
    }
}

impl KmsDevice for DummyDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn process_update(&mut self, update: KmsUpdate) -> Result<(), KmsError> {
        if update.device() != self.id {
            return Err(KmsError::WrongDevice {
                expected: self.id,
                got: update.device(),
            });
        }
        for crtc_update in update.crtc_updates() {
            self.check(crtc_update)?;
        }

        for crtc_update in update.crtc_updates() {
            match *crtc_update {
                CrtcUpdate::Vrr { crtc, enabled } => {
                    trace!(?crtc, enabled, "VRR_ENABLED");
                    if let Some(props) = self.crtcs.get_mut(&crtc) {
                        props.vrr_enabled = enabled;
                    }
                }
                CrtcUpdate::PageFlip { crtc } => {
                    trace!(?crtc, "page flip");
                }
            }
        }
        self.committed.push(update);
        Ok(())
    }
}
