pub mod completion;
pub mod map;
pub mod run;

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use waypoint_browser::LaunchOptions;
use waypoint_core::DetectionMethod;

/// Browser flags shared by `run` and `map`.
#[derive(Debug, Clone, Args)]
pub struct BrowserArgs {
    /// Path to the Chrome/Chromium binary (auto-detected if omitted)
    #[arg(long, value_name = "PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Named profile kept under ~/.waypoint/profiles
    #[arg(long, conflicts_with = "temp")]
    pub profile: Option<String>,

    /// Use a throwaway profile (the default)
    #[arg(long)]
    pub temp: bool,

    /// Run Chrome without a window
    #[arg(long)]
    pub headless: bool,
}

impl BrowserArgs {
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            chrome_path: self.chrome_path.clone(),
            profile: if self.temp { None } else { self.profile.clone() },
            headless: self.headless,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MethodArg {
    Dom,
    Vision,
}

impl From<MethodArg> for DetectionMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Dom => DetectionMethod::Dom,
            MethodArg::Vision => DetectionMethod::Vision,
        }
    }
}

/// Multi-threaded runtime for a command's async work.
pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
