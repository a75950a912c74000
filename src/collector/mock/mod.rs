//! Mock filesystem for testing samplers without a real `/proc`.

mod filesystem;

pub use filesystem::MockFs;
