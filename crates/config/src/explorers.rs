use hosh_primitives::Module;
use serde::{Deserialize, Serialize};

/// Declarative tip-height extractor for one explorer page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractorSpec {
    /// Dot-separated path into a JSON body; terminal value must be a number
    /// or a digit string.
    JsonPath { path: String },
    /// Regex whose first capture group is the height digit run.
    Regex { pattern: String },
}

/// One block-explorer endpoint the HTTP checker knows how to read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Stable id; `CheckRequest.host` carries this for http checks.
    pub explorer_id: String,
    /// Chain whose tip the explorer reports.
    pub chain: Module,
    pub url: String,
    pub extractor: ExtractorSpec,
}

/// The stock explorer catalogue. Deployments extend or replace it in TOML.
pub fn default_explorers() -> Vec<ExplorerConfig> {
    vec![
        ExplorerConfig {
            explorer_id: "blockstream.info".to_string(),
            chain: Module::Btc,
            url: "https://blockstream.info/api/blocks/tip/height".to_string(),
            extractor: ExtractorSpec::Regex {
                pattern: r"(\d+)".to_string(),
            },
        },
        ExplorerConfig {
            explorer_id: "mempool.space".to_string(),
            chain: Module::Btc,
            url: "https://mempool.space/api/blocks/tip/height".to_string(),
            extractor: ExtractorSpec::Regex {
                pattern: r"(\d+)".to_string(),
            },
        },
        ExplorerConfig {
            explorer_id: "blockchain.com".to_string(),
            chain: Module::Btc,
            url: "https://blockchain.info/q/getblockcount".to_string(),
            extractor: ExtractorSpec::Regex {
                pattern: r"(\d+)".to_string(),
            },
        },
        ExplorerConfig {
            explorer_id: "blockchair.com".to_string(),
            chain: Module::Btc,
            url: "https://api.blockchair.com/bitcoin/stats".to_string(),
            extractor: ExtractorSpec::JsonPath {
                path: "data.best_block_height".to_string(),
            },
        },
        ExplorerConfig {
            explorer_id: "blockchair.onion".to_string(),
            chain: Module::Btc,
            url: "http://blkchairbknpn73cfjhevhla7rkp4ed5gg2knctvv7it4lioy22defid.onion/api/bitcoin/stats".to_string(),
            extractor: ExtractorSpec::JsonPath {
                path: "data.best_block_height".to_string(),
            },
        },
        ExplorerConfig {
            explorer_id: "zec.rocks".to_string(),
            chain: Module::Zec,
            url: "https://explorer.zec.rocks/".to_string(),
            extractor: ExtractorSpec::Regex {
                pattern: r"Height[^0-9]*(\d+)".to_string(),
            },
        },
        ExplorerConfig {
            explorer_id: "blockchair-zcash".to_string(),
            chain: Module::Zec,
            url: "https://api.blockchair.com/zcash/stats".to_string(),
            extractor: ExtractorSpec::JsonPath {
                path: "data.best_block_height".to_string(),
            },
        },
        ExplorerConfig {
            explorer_id: "zcashexplorer.app".to_string(),
            chain: Module::Zec,
            url: "https://mainnet.zcashexplorer.app/".to_string(),
            extractor: ExtractorSpec::Regex {
                pattern: r"Block\s*Height[^0-9]*(\d+)".to_string(),
            },
        },
    ]
}
