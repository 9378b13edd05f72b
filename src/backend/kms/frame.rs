// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use super::{update::KmsUpdate, DeviceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameResult {
    /// Nothing had to be committed
    Idle,
    Submitted,
}

/// A single frame being prepared for an output.
#[derive(Debug)]
pub struct Frame {
    sequence: u64,
    kms_update: Option<KmsUpdate>,
}

impl Frame {
    pub fn new(sequence: u64) -> Self {
        Frame {
            sequence,
            kms_update: None,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the update carried by this frame, creating it on first use.
    ///
    /// # Panics
    ///
    /// If the frame already carries an update for a different device.
    pub fn ensure_kms_update(&mut self, device: DeviceId) -> &mut KmsUpdate {
        let update = self
            .kms_update
            .get_or_insert_with(|| KmsUpdate::new(device));
        assert_eq!(
            update.device(),
            device,
            "frame {} already carries an update for another device",
            self.sequence
        );
        update
    }

    pub fn kms_update(&self) -> Option<&KmsUpdate> {
        self.kms_update.as_ref()
    }

    pub fn take_kms_update(&mut self) -> Option<KmsUpdate> {
        self.kms_update.take()
    }
}

/// Creates the frames of a view.
pub trait FrameFactory: fmt::Debug {
    fn new_frame(&mut self, sequence: u64) -> Frame;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeFrameFactory;

impl FrameFactory for NativeFrameFactory {
    fn new_frame(&mut self, sequence: u64) -> Frame {
        Frame::new(sequence)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn update_is_created_once() {
        let mut frame = NativeFrameFactory.new_frame(7);
        assert_eq!(frame.sequence(), 7);
        assert!(frame.kms_update().is_none());

        frame.ensure_kms_update(DeviceId(1));
        let update = frame.ensure_kms_update(DeviceId(1));
        assert_eq!(update.device(), DeviceId(1));
        assert!(update.is_empty());

        assert!(frame.take_kms_update().is_some());
        assert!(frame.take_kms_update().is_none());
    }

    #[test]
    #[should_panic]
    fn update_for_other_device() {
        let mut frame = Frame::new(0);
        frame.ensure_kms_update(DeviceId(1));
        frame.ensure_kms_update(DeviceId(2));
    }
}
