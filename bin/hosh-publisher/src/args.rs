use std::path::PathBuf;

use argh::FromArgs;

/// Command-line arguments
#[derive(Debug, FromArgs)]
pub struct Args {
    /// path to the TOML config; env-only defaults apply when omitted
    #[argh(option, description = "path to config file")]
    pub config: Option<PathBuf>,
}
