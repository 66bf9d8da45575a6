pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{Harness, desktop_start, session_end, session_start};
#[allow(unused_imports)]
pub use mocks::{CountingTrackerSource, FailingTrackerSource, FlakyUploadStore};
