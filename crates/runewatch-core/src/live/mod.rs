// In-game live data endpoint: source seam and the polling watcher.

pub mod source;
pub mod watcher;

pub use source::{HttpLiveSource, LiveSource};
pub use watcher::{LiveClientWatcher, WatcherSettings};
