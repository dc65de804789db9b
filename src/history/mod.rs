pub mod chunker;
pub mod comparative;
pub mod historize;
pub mod indicators;

pub use chunker::fetch_range;
