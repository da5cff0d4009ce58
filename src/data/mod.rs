// Candle collections on disk
pub mod series_file;

pub use series_file::{SeriesCollection, SeriesFile};
