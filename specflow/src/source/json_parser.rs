//! JSON pipeline files.

use super::SpecParser;
use serde_json::Value;

/// Parses `pipeline.json` and `*.pipeline.json` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSpecParser;

impl SpecParser for JsonSpecParser {
    fn name(&self) -> &str {
        "json"
    }

    fn check_filename(&self, file_name: &str) -> bool {
        file_name == "pipeline.json" || file_name.ends_with(".pipeline.json")
    }

    fn parse(&self, content: &str) -> Result<Value, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_filename() {
        let parser = JsonSpecParser;
        assert!(parser.check_filename("pipeline.json"));
        assert!(parser.check_filename("ingest.pipeline.json"));
        assert!(!parser.check_filename("package.json"));
        assert!(!parser.check_filename("ingest.pipeline.toml"));
    }

    #[test]
    fn test_parse_error_message() {
        let err = JsonSpecParser.parse("{\"steps\": [").unwrap_err();
        assert!(err.contains("EOF"));
    }
}
