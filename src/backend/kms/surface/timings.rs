use std::{collections::VecDeque, num::NonZeroU64, time::Duration};

use smithay::utils::{Monotonic, Time};
use tracing::{debug, error};

const BASE_SAFETY_MARGIN: Duration = Duration::from_millis(3);
const MIN_MARGIN: Duration = Duration::from_millis(3);
const SAMPLE_TIME_WINDOW: usize = 5;
const VENDOR_NVIDIA: u32 = 0x10de;

/// Pacing mode of the frame clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameClockMode {
    /// Frames are aligned to the refresh cycle
    Fixed,
    /// Frames are presented as soon as they are ready, within the VRR range
    Variable,
}

#[derive(Debug)]
pub struct Timings {
    refresh_interval_ns: Option<NonZeroU64>,
    min_refresh_interval_ns: Option<NonZeroU64>,
    mode: FrameClockMode,
    vendor: Option<u32>,

    pub pending_frame: Option<PendingFrame>,
    pub previous_frames: VecDeque<Frame>,
}

#[derive(Debug)]
pub struct PendingFrame {
    render_start: Time<Monotonic>,
    render_duration_elements: Option<Duration>,
    render_duration_draw: Option<Duration>,
    presentation_submitted: Option<Time<Monotonic>>,
}

#[derive(Debug)]
pub struct Frame {
    pub render_start: Time<Monotonic>,
    pub render_duration_elements: Duration,
    pub render_duration_draw: Duration,
    pub presentation_submitted: Time<Monotonic>,
    pub presentation_presented: Time<Monotonic>,
}

impl Frame {
    fn render_time(&self) -> Duration {
        self.render_duration_elements + self.render_duration_draw
    }

    fn submit_time(&self) -> Duration {
        Time::elapsed(&self.render_start, self.presentation_submitted)
    }

    fn frame_time(&self) -> Duration {
        Time::elapsed(&self.render_start, self.presentation_presented)
    }
}

fn interval_ns(interval: Option<Duration>) -> Option<NonZeroU64> {
    interval
        .and_then(|duration| u64::try_from(duration.as_nanos()).ok())
        .and_then(NonZeroU64::new)
}

impl Timings {
    const CLEANUP: usize = 360;

    pub fn new(
        refresh_interval: Option<Duration>,
        min_interval: Option<Duration>,
        mode: FrameClockMode,
        vendor: Option<u32>,
    ) -> Self {
        Self {
            refresh_interval_ns: interval_ns(refresh_interval),
            min_refresh_interval_ns: interval_ns(min_interval),
            mode,
            vendor,

            pending_frame: None,
            previous_frames: VecDeque::new(),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        match self.refresh_interval_ns {
            Some(ns) => Duration::from_nanos(ns.get()),
            None => Duration::ZERO,
        }
    }

    pub fn set_refresh_interval(&mut self, interval: Option<Duration>) {
        self.refresh_interval_ns = interval_ns(interval);

        self.previous_frames.clear();
    }

    pub fn set_min_refresh_interval(&mut self, min_interval: Option<Duration>) {
        self.min_refresh_interval_ns = interval_ns(min_interval);
    }

    pub fn set_mode(&mut self, mode: FrameClockMode) {
        if self.mode != mode {
            debug!(from = ?self.mode, to = ?mode, "frame clock mode changed");
        }
        self.mode = mode;
    }

    pub fn mode(&self) -> FrameClockMode {
        self.mode
    }

    pub fn start_render(&mut self, now: Time<Monotonic>) {
        self.pending_frame = Some(PendingFrame {
            render_start: now,
            render_duration_elements: None,
            render_duration_draw: None,
            presentation_submitted: None,
        });
    }

    pub fn elements_done(&mut self, now: Time<Monotonic>) {
        if let Some(frame) = self.pending_frame.as_mut() {
            frame.render_duration_elements = Some(Time::elapsed(&frame.render_start, now));
        }
    }

    pub fn draw_done(&mut self, now: Time<Monotonic>) {
        if let Some(frame) = self.pending_frame.as_mut() {
            frame.render_duration_draw = Some(
                Time::elapsed(&frame.render_start, now)
                    .saturating_sub(frame.render_duration_elements.unwrap_or(Duration::ZERO)),
            );
        }
    }

    pub fn submitted_for_presentation(&mut self, now: Time<Monotonic>) {
        if let Some(frame) = self.pending_frame.as_mut() {
            frame.presentation_submitted = Some(now);
        }
    }

    pub fn presented(&mut self, value: Time<Monotonic>) {
        let Some(frame) = self.pending_frame.take() else {
            return;
        };
        let Some(presentation_submitted) = frame.presentation_submitted else {
            // presentation feedback for a frame we never submitted
            return;
        };

        let new_frame = Frame {
            render_start: frame.render_start,
            render_duration_elements: frame.render_duration_elements.unwrap_or_default(),
            render_duration_draw: frame.render_duration_draw.unwrap_or_default(),
            presentation_submitted,
            presentation_presented: value,
        };
        if new_frame.render_start > new_frame.presentation_submitted {
            debug!(
                "frame time overflowed: {}",
                new_frame.frame_time().as_millis()
            );
        }
        self.previous_frames.push_back(new_frame);

        if let Some(overflow) = self.previous_frames.len().checked_sub(Self::CLEANUP * 2) {
            self.previous_frames = self.previous_frames.split_off(overflow + Self::CLEANUP);
        }
    }

    pub fn discard_current_frame(&mut self) {
        let _ = self.pending_frame.take();
    }

    pub fn max_rendertime(&self) -> Duration {
        self.previous_frames
            .iter()
            .map(|f| f.render_time())
            .max()
            .unwrap_or(Duration::ZERO)
    }

    pub fn min_rendertime(&self) -> Duration {
        self.previous_frames
            .iter()
            .map(|f| f.render_time())
            .min()
            .unwrap_or(Duration::ZERO)
    }

    pub fn max_frametime(&self, window: usize) -> Duration {
        self.previous_frames
            .iter()
            .rev()
            .take(window)
            .map(|f| f.frame_time())
            .max()
            .unwrap_or(Duration::ZERO)
    }

    pub fn min_frametime(&self, window: usize) -> Duration {
        self.previous_frames
            .iter()
            .rev()
            .take(window)
            .map(|f| f.frame_time())
            .min()
            .unwrap_or(Duration::ZERO)
    }

    pub fn avg_rendertime(&self) -> Duration {
        let Some(sum_rendertime) = self
            .previous_frames
            .iter()
            .map(|f| f.render_time())
            .try_fold(Duration::ZERO, |acc, x| acc.checked_add(x))
        else {
            return Duration::ZERO;
        };

        sum_rendertime
            .checked_div(self.previous_frames.len() as u32)
            .unwrap_or(Duration::ZERO)
    }

    pub fn avg_submittime(&self, window: usize) -> Option<Duration> {
        if self.previous_frames.len() < window || window == 0 {
            return None;
        }

        Some(
            self.previous_frames
                .iter()
                .rev()
                .take(window)
                .map(|f| f.submit_time())
                .try_fold(Duration::ZERO, |acc, x| acc.checked_add(x))?
                / (window as u32),
        )
    }

    pub fn avg_frametime(&self, window: usize) -> Option<Duration> {
        if self.previous_frames.len() < window || window == 0 {
            return None;
        }

        Some(
            self.previous_frames
                .iter()
                .rev()
                .take(window)
                .map(|f| f.frame_time())
                .try_fold(Duration::ZERO, |acc, x| acc.checked_add(x))?
                / (window as u32),
        )
    }

    pub fn avg_fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.previous_frames.front(), self.previous_frames.back())
        else {
            return 0.0;
        };
        let secs = (Time::elapsed(&first.render_start, last.render_start) + last.frame_time())
            .as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }

        1.0 / (secs / self.previous_frames.len() as f64)
    }

    /// Time from `now` until the next frame can be presented.
    pub fn next_presentation_time(&self, now: Time<Monotonic>) -> Duration {
        let mut now: Duration = now.into();

        let Some(refresh_interval_ns) = self.refresh_interval_ns else {
            return Duration::ZERO;
        };
        let Some(last_presentation_time): Option<Duration> = self
            .previous_frames
            .back()
            .map(|frame| frame.presentation_presented.into())
        else {
            return Duration::ZERO;
        };
        let refresh_interval_ns = refresh_interval_ns.get();

        if now <= last_presentation_time {
            // Got an early VBlank.
            let orig_now = now;
            now += Duration::from_nanos(refresh_interval_ns);

            if now < last_presentation_time {
                error!(
                    now = ?orig_now,
                    ?last_presentation_time,
                    "got a 2+ early VBlank, {:?} until presentation",
                    last_presentation_time - now,
                );
                now = last_presentation_time + Duration::from_nanos(refresh_interval_ns);
            }
        }

        let since_last = now - last_presentation_time;
        let since_last_ns =
            since_last.as_secs() * 1_000_000_000 + u64::from(since_last.subsec_nanos());
        let to_next_ns = (since_last_ns / refresh_interval_ns + 1) * refresh_interval_ns;

        // With a variable clock, once a full cycle passed without a new frame
        // the output is waiting for us.
        if self.mode == FrameClockMode::Variable && to_next_ns > refresh_interval_ns {
            Duration::ZERO
        } else {
            last_presentation_time + Duration::from_nanos(to_next_ns) - now
        }
    }

    /// Whether the output would refresh on its own if we do not present soon.
    pub fn past_min_render_time(&self, now: Time<Monotonic>) -> bool {
        let now: Duration = now.into();
        if self.mode == FrameClockMode::Fixed {
            return true;
        }
        let Some(min_refresh_interval_ns) = self.min_refresh_interval_ns else {
            return true;
        };
        let Some(last_presentation_time): Option<Duration> = self
            .previous_frames
            .back()
            .map(|frame| frame.presentation_presented.into())
        else {
            return true;
        };

        let min_refresh_interval_ns = min_refresh_interval_ns.get();
        if now <= last_presentation_time {
            return false;
        }

        let baseline = if let Some(refresh_interval_ns) = self.refresh_interval_ns {
            MIN_MARGIN.max(Duration::from_nanos(refresh_interval_ns.get() / 2))
        } else {
            MIN_MARGIN
        };

        let next_presentation_time =
            last_presentation_time + Duration::from_nanos(min_refresh_interval_ns);
        let deadline = next_presentation_time.saturating_sub(
            self.avg_submittime(SAMPLE_TIME_WINDOW).unwrap_or(baseline) + BASE_SAFETY_MARGIN,
        );

        now >= deadline
    }

    /// Time from `now` until rendering of the next frame should start.
    pub fn next_render_time(&self, now: Time<Monotonic>) -> Duration {
        let Some(refresh_interval) = self.refresh_interval_ns else {
            return Duration::ZERO; // we don't know what to expect, so render immediately.
        };

        let baseline = MIN_MARGIN.max(Duration::from_nanos(refresh_interval.get() / 2));

        let estimated_presentation_time = self.next_presentation_time(now);
        if estimated_presentation_time.is_zero() {
            return Duration::ZERO;
        }

        // Nvidia returns `page_flip`/`commit` early, so submission times tell us nothing.
        if self.vendor == Some(VENDOR_NVIDIA) {
            return Duration::ZERO;
        }

        let Some(avg_submittime) = self.avg_submittime(SAMPLE_TIME_WINDOW) else {
            return estimated_presentation_time.saturating_sub(baseline + BASE_SAFETY_MARGIN);
        };

        let margin = avg_submittime + BASE_SAFETY_MARGIN;
        estimated_presentation_time.saturating_sub(margin)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const HZ_60: Duration = Duration::from_nanos(16_666_667);

    fn at(ms: u64) -> Time<Monotonic> {
        Time::from(Duration::from_millis(ms))
    }

    /// Records a frame rendered at `start`, submitted 2ms later and presented at `presented`.
    fn record(timings: &mut Timings, start: u64, presented: u64) {
        timings.start_render(at(start));
        timings.elements_done(at(start + 1));
        timings.draw_done(at(start + 2));
        timings.submitted_for_presentation(at(start + 2));
        timings.presented(at(presented));
    }

    #[test]
    fn unknown_refresh_renders_immediately() {
        let timings = Timings::new(None, None, FrameClockMode::Fixed, None);
        assert_eq!(timings.next_presentation_time(at(100)), Duration::ZERO);
        assert_eq!(timings.next_render_time(at(100)), Duration::ZERO);
    }

    #[test]
    fn fixed_mode_waits_for_next_cycle() {
        let mut timings = Timings::new(Some(HZ_60), None, FrameClockMode::Fixed, None);
        record(&mut timings, 990, 1000);

        // 40ms after the last vblank, the next one is two cycles and change away
        let next = timings.next_presentation_time(at(1040));
        assert!(next > Duration::ZERO);
        assert!(next < HZ_60);
    }

    #[test]
    fn variable_mode_presents_immediately_when_idle() {
        let mut timings = Timings::new(Some(HZ_60), None, FrameClockMode::Variable, None);
        record(&mut timings, 990, 1000);

        assert_eq!(timings.next_presentation_time(at(1040)), Duration::ZERO);
        assert_eq!(timings.next_render_time(at(1040)), Duration::ZERO);

        // still inside the first cycle, so we have to wait
        assert!(timings.next_presentation_time(at(1005)) > Duration::ZERO);

        timings.set_mode(FrameClockMode::Fixed);
        assert!(timings.next_presentation_time(at(1040)) > Duration::ZERO);
    }

    #[test]
    fn nvidia_renders_immediately() {
        let mut timings = Timings::new(Some(HZ_60), None, FrameClockMode::Fixed, Some(0x10de));
        record(&mut timings, 990, 1000);
        assert_eq!(timings.next_render_time(at(1005)), Duration::ZERO);
    }

    #[test]
    fn min_render_time_only_matters_for_vrr() {
        let min = Duration::from_millis(20);
        let mut timings = Timings::new(Some(HZ_60), Some(min), FrameClockMode::Variable, None);
        assert!(timings.past_min_render_time(at(1000)));

        record(&mut timings, 990, 1000);
        assert!(!timings.past_min_render_time(at(1001)));
        assert!(timings.past_min_render_time(at(1019)));

        timings.set_mode(FrameClockMode::Fixed);
        assert!(timings.past_min_render_time(at(1001)));
    }

    #[test]
    fn statistics() {
        let mut timings = Timings::new(Some(HZ_60), None, FrameClockMode::Fixed, None);
        assert_eq!(timings.avg_fps(), 0.0);
        assert_eq!(timings.avg_submittime(SAMPLE_TIME_WINDOW), None);

        for i in 0..SAMPLE_TIME_WINDOW as u64 {
            record(&mut timings, i * 10, i * 10 + 5);
        }
        assert_eq!(timings.max_rendertime(), Duration::from_millis(2));
        assert_eq!(timings.min_rendertime(), Duration::from_millis(2));
        assert_eq!(timings.avg_rendertime(), Duration::from_millis(2));
        assert_eq!(
            timings.avg_submittime(SAMPLE_TIME_WINDOW),
            Some(Duration::from_millis(2))
        );
        assert_eq!(timings.avg_frametime(2), Some(Duration::from_millis(5)));
        assert_eq!(timings.max_frametime(3), Duration::from_millis(5));
        // five frames over 45ms
        assert!((timings.avg_fps() - 5.0 / 0.045).abs() < 0.01);

        timings.set_refresh_interval(Some(HZ_60));
        assert!(timings.previous_frames.is_empty());
    }

    #[test]
    fn unsubmitted_frames_are_not_recorded() {
        let mut timings = Timings::new(Some(HZ_60), None, FrameClockMode::Fixed, None);
        timings.start_render(at(0));
        timings.presented(at(10));
        assert!(timings.previous_frames.is_empty());

        timings.start_render(at(20));
        timings.discard_current_frame();
        assert!(timings.pending_frame.is_none());
    }

    #[test]
    fn history_is_bounded() {
        let mut timings = Timings::new(Some(HZ_60), None, FrameClockMode::Fixed, None);
        for i in 0..(Timings::CLEANUP * 2) as u64 {
            record(&mut timings, i * 17, i * 17 + 10);
        }
        assert_eq!(timings.previous_frames.len(), Timings::CLEANUP);
    }
}
