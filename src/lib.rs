pub mod android_jni;
pub mod announcer;
pub mod config;
pub mod debounce;
pub mod error;
pub mod geo;
pub mod off_route;
pub mod platform;
pub mod progress;
pub mod route;
pub mod session;
pub mod suggestions;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
