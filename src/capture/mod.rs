//! Audio capture collaborators.
//!
//! Two delivery styles are supported. A [`BlockingCapture`] hands the controller
//! one fixed-size buffer per `read`; a [`CallbackCapture`] pushes timestamped
//! packets into the ingestion queue from the device thread on its own.

mod device;
mod dispatch;

pub use device::{list_input_devices, DeviceCapture};
pub use dispatch::{downmix_into, Delivery, Dispatcher};

use crate::error::CaptureError;
use crate::queue::PacketSender;

/// Pull-style source: every `read` blocks until one buffer of mono samples is ready.
pub trait BlockingCapture {
    fn start(&mut self) -> Result<(), CaptureError>;

    fn read(&mut self) -> Result<Vec<f32>, CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;
}

/// Push-style source. After `start`, the device enqueues packets into `queue`
/// until `stop` returns; no packet is enqueued after that.
pub trait CallbackCapture {
    fn start(&mut self, queue: PacketSender) -> Result<(), CaptureError>;

    /// The most recent stream error reported by the device, if any.
    fn take_error(&mut self) -> Option<CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;
}
