pub mod files;
pub mod prefetch;
pub mod storage;

pub use files::{find_files, FileFinder};
pub use prefetch::{background, background_with, PrefetchConfig, PrefetchExt, Prefetcher};
pub use storage::{ArrayStore, Element};
