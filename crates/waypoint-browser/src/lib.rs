//! Chrome DevTools Protocol implementation of the engine's browser driver.

mod chrome_finder;
mod driver;
mod error;
mod network;
mod profile;

pub use chrome_finder::ChromeFinder;
pub use driver::{CdpDriver, LaunchOptions, WINDOW_SIZE};
pub use error::{Error, Result};
pub use network::{NetworkTracker, PendingRequest, STALE_REQUEST};
pub use profile::ProfileManager;
