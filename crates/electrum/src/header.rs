use bitcoin::{block::Header, consensus};
use chrono::DateTime;
use serde::Serialize;
use thiserror::Error;

/// Hex length of an 80-byte serialized block header.
pub const HEADER_HEX_LEN: usize = 160;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header hex must be {HEADER_HEX_LEN} chars, got {0}")]
    Length(usize),
    #[error("header hex is not valid hex")]
    Hex,
    #[error("header bytes do not decode as a block header")]
    Decode,
}

/// Parsed header fields as they appear in `response_data`, hashes in
/// big-endian display order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeaderInfo {
    pub version: i32,
    pub prev_block: String,
    pub merkle_root: String,
    pub timestamp: u32,
    pub timestamp_human: String,
    pub bits: u32,
    pub nonce: u32,
}

/// Decodes the 80-byte consensus encoding.
pub fn decode_header(bytes: &[u8]) -> Result<Header, HeaderError> {
    consensus::encode::deserialize(bytes).map_err(|_| HeaderError::Decode)
}

/// Parses a tip header out of the hex string Electrum servers report.
///
/// Multibyte fields are little-endian on the wire; the two 32-byte hashes
/// render byte-reversed per Bitcoin convention (the `bitcoin` hash display).
pub fn parse_header_hex(header_hex: &str) -> Result<HeaderInfo, HeaderError> {
    if header_hex.len() != HEADER_HEX_LEN {
        return Err(HeaderError::Length(header_hex.len()));
    }
    let bytes = hex::decode(header_hex).map_err(|_| HeaderError::Hex)?;
    let header = decode_header(&bytes)?;

    Ok(HeaderInfo {
        version: header.version.to_consensus(),
        prev_block: header.prev_blockhash.to_string(),
        merkle_root: header.merkle_root.to_string(),
        timestamp: header.time,
        timestamp_human: format_timestamp(header.time),
        bits: header.bits.to_consensus(),
        nonce: header.nonce,
    })
}

fn format_timestamp(time: u32) -> String {
    DateTime::from_timestamp(time as i64, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default()
}
