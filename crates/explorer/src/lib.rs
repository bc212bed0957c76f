//! Block-explorer HTTP probe: fetch a page, run a deterministic extractor
//! over the body, report the explorer's claimed tip height.

mod extractor;
mod probe;

pub use extractor::{Extractor, ExtractorError};
pub use probe::HttpProbe;
