use serde_json::Value;
use std::io::{self, Read};

/// Read a JSON (or YAML) document from stdin if data is being piped.
/// Returns None if stdin is a TTY (interactive).
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse_piped(trimmed).map(Some)
}

fn parse_piped(text: &str) -> Result<Value, Box<dyn std::error::Error>> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_yaml::from_str(text)
            .map_err(|_| format!("stdin is neither JSON nor YAML: {json_err}").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_and_yaml_both_accepted() {
        let json = parse_piped(r#"{"values": [0.01, -0.02]}"#).unwrap();
        let yaml = parse_piped("values:\n  - 0.01\n  - -0.02\n").unwrap();
        assert_eq!(json, yaml);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_piped("{ unterminated").is_err());
    }
}
