// SPDX-License-Identifier: GPL-3.0-only

//! Variable refresh rate ("frame sync") state of a single output.
//!
//! Policy code only ever states a preference through
//! [`FrameSyncController::request`]. The preference is reconciled with what the
//! output's current mode supports once per frame, and only actual changes are
//! pushed to the frame clock and the KMS update of that frame.

use tracing::debug;

use super::{
    crtc::{Crtc, RefreshRateMode},
    frame::Frame,
    surface::timings::{FrameClockMode, Timings},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSyncMode {
    Enabled,
    Disabled,
}

impl FrameSyncMode {
    fn from_enabled(enabled: bool) -> Self {
        if enabled {
            FrameSyncMode::Enabled
        } else {
            FrameSyncMode::Disabled
        }
    }

    fn clock_mode(self) -> FrameClockMode {
        match self {
            FrameSyncMode::Enabled => FrameClockMode::Variable,
            FrameSyncMode::Disabled => FrameClockMode::Fixed,
        }
    }
}

#[derive(Debug)]
pub struct FrameSyncController {
    requested: FrameSyncMode,
    /// `None` until the first reconcile applied a mode
    current: Option<FrameSyncMode>,
    /// Mode the hardware is known to be in while a switch awaits its commit
    uncommitted_from: Option<FrameSyncMode>,
    /// Issue a directive on the next reconcile, even if nothing changed
    needs_resync: bool,
}

impl Default for FrameSyncController {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSyncController {
    pub fn new() -> Self {
        FrameSyncController {
            requested: FrameSyncMode::Disabled,
            current: None,
            uncommitted_from: None,
            needs_resync: false,
        }
    }

    /// Takes effect on the next [`FrameSyncController::maybe_update`].
    pub fn request(&mut self, enabled: bool) {
        self.requested = FrameSyncMode::from_enabled(enabled);
    }

    pub fn requested(&self) -> FrameSyncMode {
        self.requested
    }

    pub fn current(&self) -> Option<FrameSyncMode> {
        self.current
    }

    pub fn is_enabled(&self) -> bool {
        self.current == Some(FrameSyncMode::Enabled)
    }

    fn applicable_mode(&self, crtc: &dyn Crtc) -> FrameSyncMode {
        let config = crtc
            .config()
            .unwrap_or_else(|| panic!("crtc {:?} has no configuration", crtc.handle()));
        let mode = config
            .mode
            .as_ref()
            .unwrap_or_else(|| panic!("crtc {:?} has no mode", crtc.handle()));
        let info = mode
            .info
            .as_ref()
            .unwrap_or_else(|| panic!("mode {} of crtc {:?} has no info", mode.id, crtc.handle()));

        match info.refresh_rate_mode {
            RefreshRateMode::Fixed => FrameSyncMode::Disabled,
            RefreshRateMode::Variable => self.requested,
        }
    }

    /// Applies the requested mode to `frame`, if the output allows it and it
    /// differs from what is currently applied.
    ///
    /// Returns whether a switch was issued.
    ///
    /// # Panics
    ///
    /// If `crtc` has no configuration, mode or mode info.
    pub fn maybe_update(
        &mut self,
        frame: &mut Frame,
        crtc: &dyn Crtc,
        frame_clock: &mut Timings,
    ) -> bool {
        let applicable = self.applicable_mode(crtc);
        if !self.needs_resync && self.current == Some(applicable) {
            return false;
        }

        frame_clock.set_mode(applicable.clock_mode());
        frame
            .ensure_kms_update(crtc.device())
            .set_vrr(crtc.handle(), applicable == FrameSyncMode::Enabled);

        debug!(
            crtc = ?crtc.handle(),
            frame = frame.sequence(),
            from = ?self.current,
            to = ?applicable,
            resync = self.needs_resync,
            "Switching frame sync mode"
        );
        // VRR_ENABLED is off until a directive turned it on
        if self.uncommitted_from.is_none() {
            self.uncommitted_from = Some(self.current.unwrap_or(FrameSyncMode::Disabled));
        }
        self.current = Some(applicable);
        self.needs_resync = false;
        true
    }

    /// The update carrying the last switch reached the hardware.
    pub fn commit_succeeded(&mut self) {
        self.uncommitted_from = None;
    }

    /// The update carrying the last switch was rejected.
    ///
    /// Falls back to the mode the hardware is still in, and makes the next
    /// reconcile issue its directive again.
    pub fn commit_failed(&mut self, frame_clock: &mut Timings) {
        let Some(fallback) = self.uncommitted_from.take() else {
            return;
        };
        debug!(
            from = ?self.current,
            to = ?fallback,
            "Frame sync switch was not committed"
        );
        frame_clock.set_mode(fallback.clock_mode());
        self.current = Some(fallback);
        self.needs_resync = true;
    }
}
