use hosh_config::ExtractorSpec;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("invalid extractor pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("body is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("json path '{0}' not found in body")]
    PathMissing(String),
    #[error("value at '{0}' is not a block height")]
    NotAHeight(String),
    #[error("no height digits matched in body")]
    NoMatch,
}

/// Compiled form of an [`ExtractorSpec`].
#[derive(Debug, Clone)]
pub enum Extractor {
    JsonPath { path: String, segments: Vec<String> },
    Regex { regex: regex::Regex },
}

impl Extractor {
    pub fn compile(spec: &ExtractorSpec) -> Result<Self, ExtractorError> {
        match spec {
            ExtractorSpec::JsonPath { path } => Ok(Extractor::JsonPath {
                path: path.clone(),
                segments: path.split('.').map(str::to_string).collect(),
            }),
            ExtractorSpec::Regex { pattern } => Ok(Extractor::Regex {
                regex: regex::Regex::new(pattern)?,
            }),
        }
    }

    /// Pulls a tip height out of a response body.
    pub fn extract(&self, body: &str) -> Result<u64, ExtractorError> {
        match self {
            Extractor::JsonPath { path, segments } => {
                let root: serde_json::Value = serde_json::from_str(body)?;
                let mut cursor = &root;
                for segment in segments {
                    cursor = cursor
                        .get(segment)
                        .ok_or_else(|| ExtractorError::PathMissing(path.clone()))?;
                }
                match cursor {
                    serde_json::Value::Number(n) => n
                        .as_u64()
                        .ok_or_else(|| ExtractorError::NotAHeight(path.clone())),
                    serde_json::Value::String(s) => s
                        .trim()
                        .parse::<u64>()
                        .map_err(|_| ExtractorError::NotAHeight(path.clone())),
                    _ => Err(ExtractorError::NotAHeight(path.clone())),
                }
            }
            Extractor::Regex { regex } => {
                let captures = regex.captures(body).ok_or(ExtractorError::NoMatch)?;
                let digits = captures
                    .get(1)
                    .ok_or(ExtractorError::NoMatch)?
                    .as_str();
                digits
                    .parse::<u64>()
                    .map_err(|_| ExtractorError::NotAHeight(digits.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(spec: ExtractorSpec) -> Extractor {
        Extractor::compile(&spec).unwrap()
    }

    #[test]
    fn test_json_path_number() {
        let ex = compile(ExtractorSpec::JsonPath {
            path: "data.best_block_height".to_string(),
        });
        let body = r#"{"data":{"best_block_height":840123,"blocks":840124}}"#;
        assert_eq!(ex.extract(body).unwrap(), 840123);
    }

    #[test]
    fn test_json_path_digit_string() {
        let ex = compile(ExtractorSpec::JsonPath {
            path: "height".to_string(),
        });
        assert_eq!(ex.extract(r#"{"height":"840123"}"#).unwrap(), 840123);
    }

    #[test]
    fn test_json_path_missing() {
        let ex = compile(ExtractorSpec::JsonPath {
            path: "data.height".to_string(),
        });
        let err = ex.extract(r#"{"data":{}}"#).unwrap_err();
        assert!(matches!(err, ExtractorError::PathMissing(_)));
    }

    #[test]
    fn test_regex_plain_body() {
        let ex = compile(ExtractorSpec::Regex {
            pattern: r"(\d+)".to_string(),
        });
        assert_eq!(ex.extract("840123\n").unwrap(), 840123);
    }

    #[test]
    fn test_regex_html_scrape() {
        let ex = compile(ExtractorSpec::Regex {
            pattern: r"Block\s*Height[^0-9]*(\d+)".to_string(),
        });
        let body = "<div><span>Block Height</span><b>2500123</b></div>";
        assert_eq!(ex.extract(body).unwrap(), 2500123);
    }

    #[test]
    fn test_regex_no_match() {
        let ex = compile(ExtractorSpec::Regex {
            pattern: r"height=(\d+)".to_string(),
        });
        assert!(matches!(
            ex.extract("nothing here").unwrap_err(),
            ExtractorError::NoMatch
        ));
    }

    #[test]
    fn test_bad_pattern_rejected_at_compile() {
        let err = Extractor::compile(&ExtractorSpec::Regex {
            pattern: "(".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, ExtractorError::Pattern(_)));
    }
}
