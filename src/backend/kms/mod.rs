// SPDX-License-Identifier: GPL-3.0-only

pub mod crtc;
pub mod device;
pub mod frame;
pub mod frame_sync;
pub mod surface;
pub mod update;

pub use device::{KmsDevice, KmsError};
pub use frame::{Frame, FrameFactory, FrameResult, NativeFrameFactory};
pub use frame_sync::{FrameSyncController, FrameSyncMode};
pub use surface::RendererView;
pub use update::KmsUpdate;

/// Identifies a DRM device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);
