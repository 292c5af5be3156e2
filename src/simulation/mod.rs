//! Device-load simulation: a clock, a pure noise function and the per-consumer
//! device lists driven by them.

pub mod clock;
pub mod devices;
pub mod noise;

pub use clock::{Clock, ManualClock, SystemClock};
pub use devices::{DeviceSimulator, LoadChange};
pub use noise::{device_key, power_at};
