pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{seeded_bytes, upload_with_parts};
