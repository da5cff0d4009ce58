pub mod maths_utils;
pub mod time_utils;

#[cfg(test)]
pub mod fixtures;

pub use time_utils::{TimeUtils, epoch_ms_to_utc};
