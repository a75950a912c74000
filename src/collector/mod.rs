//! Raw metric collection: the filesystem seam, `/proc` readers and the
//! in-memory mock used by tests.

pub mod mock;
pub mod procfs;
pub mod traits;

pub use traits::{FileSystem, RealFs};
