//! Testing utilities and harness for Fiber-RS

pub mod recording;
pub mod testing;

pub use recording::{HostCall, RecordingHost};
pub use testing::*;

pub mod prelude {
    pub use crate::recording::{HostCall, RecordingHost};
    pub use crate::testing::*;
}
