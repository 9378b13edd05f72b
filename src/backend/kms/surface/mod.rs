// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context, Result};
use smithay::utils::{Clock, Monotonic, Time};
use tracing::{debug, trace};

use super::{
    crtc::Crtc,
    device::KmsDevice,
    frame::{Frame, FrameFactory, FrameResult},
    frame_sync::FrameSyncController,
};

pub mod timings;

use timings::{FrameClockMode, Timings};

/// Rendering state of a single output.
#[derive(Debug)]
pub struct RendererView<C: Crtc> {
    name: String,
    crtc: C,
    frame_sync: FrameSyncController,
    factory: Box<dyn FrameFactory>,
    timings: Timings,
    clock: Clock<Monotonic>,
    frame_sequence: u64,
}

impl<C: Crtc> RendererView<C> {
    pub fn new(
        name: impl Into<String>,
        crtc: C,
        factory: impl FrameFactory + 'static,
        vendor: Option<u32>,
    ) -> Self {
        let info = crtc.config().and_then(|config| config.mode_info());
        let timings = Timings::new(
            info.and_then(|info| info.refresh_interval()),
            info.and_then(|info| info.min_refresh_interval()),
            FrameClockMode::Fixed,
            vendor,
        );

        RendererView {
            name: name.into(),
            crtc,
            frame_sync: FrameSyncController::new(),
            factory: Box::new(factory),
            timings,
            clock: Clock::new(),
            frame_sequence: 0,
        }
    }

    pub fn crtc(&self) -> &C {
        &self.crtc
    }

    pub fn crtc_mut(&mut self) -> &mut C {
        &mut self.crtc
    }

    pub fn frame_clock(&self) -> &Timings {
        &self.timings
    }

    pub fn now(&self) -> Time<Monotonic> {
        self.clock.now()
    }

    pub fn request_frame_sync(&mut self, enabled: bool) {
        self.frame_sync.request(enabled);
    }

    pub fn is_frame_sync_enabled(&self) -> bool {
        self.frame_sync.is_enabled()
    }

    /// Picks up new refresh intervals after the CRTC was given a new mode.
    pub fn mode_changed(&mut self) {
        let info = self.crtc.config().and_then(|config| config.mode_info());
        debug!(
            view = %self.name,
            mode = %info.map(ToString::to_string).unwrap_or_else(|| "none".into()),
            "mode changed"
        );
        self.timings
            .set_refresh_interval(info.and_then(|info| info.refresh_interval()));
        self.timings
            .set_min_refresh_interval(info.and_then(|info| info.min_refresh_interval()));
    }

    pub fn new_frame(&mut self) -> Frame {
        let frame = self.factory.new_frame(self.frame_sequence);
        self.frame_sequence += 1;
        self.timings.start_render(self.clock.now());
        frame
    }

    pub fn maybe_update_frame_sync_mode(&mut self, frame: &mut Frame) -> bool {
        self.frame_sync
            .maybe_update(frame, &self.crtc, &mut self.timings)
    }

    /// Records the rendered content of `frame` for scanout.
    pub fn render(&mut self, frame: &mut Frame) {
        let now = self.clock.now();
        self.timings.elements_done(now);
        frame
            .ensure_kms_update(self.crtc.device())
            .page_flip(self.crtc.handle());
        self.timings.draw_done(self.clock.now());
    }

    /// Hands the update carried by `frame` to `device`.
    pub fn finish_frame(
        &mut self,
        mut frame: Frame,
        device: &mut dyn KmsDevice,
    ) -> Result<FrameResult> {
        let result = match frame.take_kms_update() {
            Some(update) if !update.is_empty() => {
                if let Err(err) = device.process_update(update) {
                    self.timings.discard_current_frame();
                    self.frame_sync.commit_failed(&mut self.timings);
                    return Err(err).with_context(|| {
                        format!(
                            "Failed to commit frame {} of {}",
                            frame.sequence(),
                            self.name
                        )
                    });
                }
                self.frame_sync.commit_succeeded();
                self.timings.submitted_for_presentation(self.clock.now());
                FrameResult::Submitted
            }
            _ => {
                self.timings.discard_current_frame();
                FrameResult::Idle
            }
        };
        trace!(view = %self.name, frame = frame.sequence(), ?result, "frame finished");
        Ok(result)
    }

    pub fn presented(&mut self, time: Time<Monotonic>) {
        self.timings.presented(time);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::{
        dummy::{DummyCrtc, DummyDevice},
        kms::{
            crtc::{CrtcConfig, CrtcMode, CrtcModeInfo},
            frame::NativeFrameFactory,
            update::CrtcUpdate,
            DeviceId,
        },
    };

    fn setup(info: CrtcModeInfo) -> (RendererView<DummyCrtc>, DummyDevice) {
        let vrr_capable = info.min_refresh_interval().is_some();
        let crtc = DummyCrtc::new(
            0,
            DeviceId(0),
            Some(CrtcConfig::new(CrtcMode::new(1, info))),
        );
        let mut device = DummyDevice::new(DeviceId(0));
        device.add_crtc(&crtc, vrr_capable);
        let view = RendererView::new("DP-1", crtc, NativeFrameFactory, None);
        (view, device)
    }

    fn run_frame(view: &mut RendererView<DummyCrtc>, device: &mut DummyDevice) -> FrameResult {
        let mut frame = view.new_frame();
        view.maybe_update_frame_sync_mode(&mut frame);
        view.render(&mut frame);
        let result = view.finish_frame(frame, device).unwrap();
        let now = view.now();
        view.presented(now);
        result
    }

    #[test]
    fn enables_vrr_on_capable_output() {
        let (mut view, mut device) = setup(CrtcModeInfo::variable(2560, 1440, 144.0, 48.0));
        let handle = view.crtc().handle();

        view.request_frame_sync(true);
        assert_eq!(run_frame(&mut view, &mut device), FrameResult::Submitted);
        assert!(view.is_frame_sync_enabled());
        assert_eq!(view.frame_clock().mode(), FrameClockMode::Variable);
        assert_eq!(device.vrr_enabled(handle), Some(true));
        assert_eq!(
            device.committed()[0].crtc_updates(),
            &[
                CrtcUpdate::Vrr {
                    crtc: handle,
                    enabled: true
                },
                CrtcUpdate::PageFlip { crtc: handle },
            ]
        );

        // no further directives while nothing changes
        run_frame(&mut view, &mut device);
        assert_eq!(device.committed()[1].vrr(handle), None);

        view.request_frame_sync(false);
        run_frame(&mut view, &mut device);
        assert!(!view.is_frame_sync_enabled());
        assert_eq!(device.vrr_enabled(handle), Some(false));
        assert_eq!(view.frame_clock().mode(), FrameClockMode::Fixed);
        assert_eq!(view.frame_clock().previous_frames.len(), 3);
    }

    #[test]
    fn fixed_output_never_enables_vrr() {
        let (mut view, mut device) = setup(CrtcModeInfo::fixed(1920, 1080, 60.0));
        let handle = view.crtc().handle();

        view.request_frame_sync(true);
        run_frame(&mut view, &mut device);
        assert!(!view.is_frame_sync_enabled());
        assert_eq!(device.vrr_enabled(handle), Some(false));
        assert_eq!(device.committed()[0].vrr(handle), Some(false));
    }

    #[test]
    fn empty_frames_are_idle() {
        let (mut view, mut device) = setup(CrtcModeInfo::fixed(1920, 1080, 60.0));

        let mut frame = view.new_frame();
        assert!(view.maybe_update_frame_sync_mode(&mut frame));
        view.finish_frame(frame, &mut device).unwrap();

        // the mode is settled, and nothing was rendered
        let mut frame = view.new_frame();
        assert_eq!(frame.sequence(), 1);
        assert!(!view.maybe_update_frame_sync_mode(&mut frame));
        assert_eq!(
            view.finish_frame(frame, &mut device).unwrap(),
            FrameResult::Idle
        );
        assert_eq!(device.committed().len(), 1);
        assert!(view.frame_clock().pending_frame.is_none());
    }

    #[test]
    fn failed_commit_is_reported() {
        let (mut view, _) = setup(CrtcModeInfo::fixed(1920, 1080, 60.0));
        let mut other = DummyDevice::new(DeviceId(7));

        let mut frame = view.new_frame();
        view.render(&mut frame);
        let err = view.finish_frame(frame, &mut other).unwrap_err();
        assert!(err.to_string().contains("DP-1"));
        assert!(view.frame_clock().pending_frame.is_none());
    }

    #[test]
    fn rejected_vrr_switch_is_retried() {
        let (mut view, mut device) = setup(CrtcModeInfo::variable(2560, 1440, 144.0, 48.0));
        let handle = view.crtc().handle();
        // the connector does not report VRR support
        device.add_crtc(view.crtc(), false);

        view.request_frame_sync(true);
        for _ in 0..3 {
            let mut frame = view.new_frame();
            assert!(view.maybe_update_frame_sync_mode(&mut frame));
            view.render(&mut frame);
            assert!(view.finish_frame(frame, &mut device).is_err());
            assert!(!view.is_frame_sync_enabled());
            assert_eq!(view.frame_clock().mode(), FrameClockMode::Fixed);
            assert_eq!(device.vrr_enabled(handle), Some(false));
        }
        assert!(device.committed().is_empty());

        device.add_crtc(view.crtc(), true);
        assert_eq!(run_frame(&mut view, &mut device), FrameResult::Submitted);
        assert!(view.is_frame_sync_enabled());
        assert_eq!(view.frame_clock().mode(), FrameClockMode::Variable);
        assert_eq!(device.vrr_enabled(handle), Some(true));
        assert_eq!(device.committed()[0].vrr(handle), Some(true));

        view.request_frame_sync(false);
        assert_eq!(run_frame(&mut view, &mut device), FrameResult::Submitted);
        assert_eq!(device.vrr_enabled(handle), Some(false));
        assert_eq!(device.committed().len(), 2);
    }

    #[test]
    fn modeset_updates_frame_clock() {
        let (mut view, mut device) = setup(CrtcModeInfo::fixed(1920, 1080, 60.0));
        run_frame(&mut view, &mut device);
        assert_eq!(view.frame_clock().refresh_interval().as_micros(), 16_666);

        view.crtc_mut()
            .set_config(Some(CrtcConfig::new(CrtcMode::new(
                2,
                CrtcModeInfo::variable(1920, 1080, 120.0, 40.0),
            ))));
        view.mode_changed();
        assert_eq!(view.frame_clock().refresh_interval().as_micros(), 8_333);
        assert!(view.frame_clock().previous_frames.is_empty());
    }
}
