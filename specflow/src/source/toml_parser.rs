//! TOML pipeline files.

use super::SpecParser;
use serde_json::Value;

/// Parses `pipeline.toml` and `*.pipeline.toml` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlSpecParser;

impl SpecParser for TomlSpecParser {
    fn name(&self) -> &str {
        "toml"
    }

    fn check_filename(&self, file_name: &str) -> bool {
        file_name == "pipeline.toml" || file_name.ends_with(".pipeline.toml")
    }

    fn parse(&self, content: &str) -> Result<Value, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_filename() {
        let parser = TomlSpecParser;
        assert!(parser.check_filename("pipeline.toml"));
        assert!(parser.check_filename("nightly.pipeline.toml"));
        assert!(!parser.check_filename("Cargo.toml"));
    }

    #[test]
    fn test_parse_into_json_tree() {
        let value = TomlSpecParser
            .parse(
                r#"
name = "ingest"
schedule = "@daily"

[[steps]]
name = "load"
script = "load.py"
"#,
            )
            .unwrap();

        assert_eq!(value["name"], "ingest");
        assert_eq!(value["steps"][0]["script"], "load.py");
    }

    #[test]
    fn test_parse_error() {
        assert!(TomlSpecParser.parse("name = ").is_err());
    }
}
