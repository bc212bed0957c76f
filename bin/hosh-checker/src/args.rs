use std::path::PathBuf;

use argh::FromArgs;
use hosh_primitives::Module;

/// Command-line arguments
#[derive(Debug, FromArgs)]
pub struct Args {
    /// protocol module this worker checks (btc|zec|http)
    #[argh(option, description = "module to check (btc|zec|http)")]
    pub module: Module,

    /// path to the TOML config; env-only defaults apply when omitted
    #[argh(option, description = "path to config file")]
    pub config: Option<PathBuf>,
}
