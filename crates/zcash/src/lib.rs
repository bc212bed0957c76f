//! lightwalletd probe: a single `GetLatestBlock` gRPC call with strict
//! deadlines, reporting the server's claimed chain tip.

pub mod proto;
mod probe;

pub use probe::ZcashProbe;
