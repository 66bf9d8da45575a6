pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{desktop_start, session_join, session_start, tracker};
