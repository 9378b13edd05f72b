// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

use anyhow::Result;
use calloop::LoopSignal;
use tracing::{debug, info};

use crate::{
    backend::{
        dummy::{DummyCrtc, DummyDevice},
        kms::{
            crtc::{Crtc, CrtcConfig, CrtcMode, CrtcModeInfo},
            device::{read_vendor, KmsDevice},
            DeviceId, NativeFrameFactory, RendererView,
        },
    },
    config::{requested_frame_sync, Config, OutputInfo},
};

const MIN_FRAME_DELAY: Duration = Duration::from_millis(1);
const RENDER_NODE_MINOR: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Frames to render before exiting, summed over all outputs
    pub frames: u64,
    /// Whether the external output only supports a fixed refresh rate
    pub fixed: bool,
    /// Toggle the fullscreen state every `n` frames, `0` never toggles
    pub fullscreen_every: u64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            frames: 600,
            fixed: false,
            fullscreen_every: 120,
        }
    }
}

#[derive(Debug)]
pub struct OutputState {
    pub info: OutputInfo,
    pub view: RendererView<DummyCrtc>,
    pub switches: u64,
}

pub struct State {
    pub config: Config,
    pub device: DummyDevice,
    pub outputs: Vec<OutputState>,
    pub has_active_fullscreen: bool,
    options: Options,
    frames: u64,
    signal: Option<LoopSignal>,
}

fn output_info(connector: &str, make: &str, model: &str) -> OutputInfo {
    OutputInfo {
        connector: connector.into(),
        make: make.into(),
        model: model.into(),
    }
}

impl State {
    pub fn new(config: Config, options: Options, signal: Option<LoopSignal>) -> State {
        let device_id = DeviceId(0);
        let mut device = DummyDevice::new(device_id);
        let vendor = read_vendor(RENDER_NODE_MINOR);

        let external_mode = if options.fixed {
            CrtcModeInfo::fixed(2560, 1440, 144.0)
        } else {
            CrtcModeInfo::variable(2560, 1440, 144.0, 48.0)
        };
        let outputs = [
            (output_info("DP-1", "Dell", "S2721DGF"), external_mode),
            (
                output_info("eDP-1", "BOE", "0x0bca"),
                CrtcModeInfo::fixed(1920, 1200, 60.0),
            ),
        ]
        .into_iter()
        .enumerate()
        .map(|(idx, (info, mode))| {
            let vrr_capable = mode.min_refresh_interval().is_some();
            let crtc = DummyCrtc::new(
                idx as u32,
                device_id,
                Some(CrtcConfig::new(CrtcMode::new(idx as u64, mode))),
            );
            device.add_crtc(&crtc, vrr_capable);
            OutputState {
                view: RendererView::new(info.connector.clone(), crtc, NativeFrameFactory, vendor),
                info,
                switches: 0,
            }
        })
        .collect();

        State {
            config,
            device,
            outputs,
            has_active_fullscreen: false,
            options,
            frames: 0,
            signal,
        }
    }

    /// Renders one frame on output `idx`.
    ///
    /// Returns when the next frame of this output is due, or `None` once all
    /// frames have been rendered.
    pub fn render_output(&mut self, idx: usize) -> Result<Option<Duration>> {
        if self.frames >= self.options.frames {
            self.stop();
            return Ok(None);
        }
        self.frames += 1;
        if self.options.fullscreen_every != 0 && self.frames % self.options.fullscreen_every == 0 {
            self.has_active_fullscreen = !self.has_active_fullscreen;
            debug!(
                fullscreen = self.has_active_fullscreen,
                "fullscreen toggled"
            );
        }

        let output = &mut self.outputs[idx];
        let vrr = self.config.adaptive_sync(&output.info);
        output
            .view
            .request_frame_sync(requested_frame_sync(vrr, self.has_active_fullscreen));

        let mut frame = output.view.new_frame();
        if output.view.maybe_update_frame_sync_mode(&mut frame) {
            output.switches += 1;
        }
        output.view.render(&mut frame);
        output.view.finish_frame(frame, &mut self.device)?;
        // the dummy device scans out right away
        let now = output.view.now();
        output.view.presented(now);

        let next = output
            .view
            .frame_clock()
            .next_render_time(output.view.now());
        Ok(Some(next.max(MIN_FRAME_DELAY)))
    }

    pub fn stop(&mut self) {
        if let Some(signal) = self.signal.take() {
            self.report();
            signal.stop();
        }
    }

    pub fn report(&self) {
        for output in &self.outputs {
            let timings = output.view.frame_clock();
            info!(
                output = %output.info.connector,
                frame_sync = output.view.is_frame_sync_enabled(),
                vrr_enabled = ?self.device.vrr_enabled(output.view.crtc().handle()),
                switches = output.switches,
                fps = %format!("{:.1}", timings.avg_fps()),
                avg_rendertime = ?timings.avg_rendertime(),
                "output summary"
            );
        }
        info!(
            device = ?self.device.id(),
            commits = self.device.committed().len(),
            "device summary"
        );
    }
}
