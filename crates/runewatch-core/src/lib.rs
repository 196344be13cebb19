// Library root: game-state detection against the local client and the
// build-resolution pipeline driven by it.

pub mod build;
pub mod champions;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod lcu;
pub mod live;
pub mod protocol;
pub mod throttle;
pub mod ttl_cache;
