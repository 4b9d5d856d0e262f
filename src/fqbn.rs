//! Fully Qualified Board Name parsing and formatting.
//!
//! `package:arch:boardid[:opt1=val1,opt2=val2,...]` — string and struct forms
//! must round-trip exactly, config order included.

use crate::errors::{Error, Result};
use crate::props::PropertyStore;
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct Fqbn {
    pub package: String,
    pub architecture: String,
    pub board_id: String,
    /// User-selected config options, in the order they were written.
    pub configs: IndexMap<String, String>,
}

impl Fqbn {
    pub fn new(package: &str, architecture: &str, board_id: &str) -> Self {
        Self {
            package: package.to_string(),
            architecture: architecture.to_string(),
            board_id: board_id.to_string(),
            configs: IndexMap::new(),
        }
    }

    pub fn with_config(mut self, option: &str, value: &str) -> Self {
        self.configs.insert(option.to_string(), value.to_string());
        self
    }

    /// The configs as a PropertyStore, ready for
    /// [`Board::get_build_properties`](crate::board::Board::get_build_properties).
    pub fn config_properties(&self) -> PropertyStore {
        let mut props = PropertyStore::new();
        for (option, value) in &self.configs {
            props.set(option, value);
        }
        props
    }
}

impl FromStr for Fqbn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidFqbn {
            fqbn: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 3 || parts.len() > 4 {
            return Err(invalid("expected package:arch:boardid[:options]"));
        }
        if parts[..3].iter().any(|p| p.is_empty()) {
            return Err(invalid("empty segment"));
        }

        let mut fqbn = Fqbn::new(parts[0], parts[1], parts[2]);
        if let Some(&options) = parts.get(3) {
            if options.is_empty() {
                return Err(invalid("empty options segment"));
            }
            for pair in options.split(',') {
                match pair.split_once('=') {
                    Some((option, value)) if !option.is_empty() => {
                        fqbn.configs.insert(option.to_string(), value.to_string());
                    }
                    _ => return Err(invalid("options must be option=value pairs")),
                }
            }
        }
        Ok(fqbn)
    }
}

impl fmt::Display for Fqbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package, self.architecture, self.board_id)?;
        if !self.configs.is_empty() {
            let options: Vec<String> = self
                .configs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, ":{}", options.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let fqbn: Fqbn = "arduino:avr:uno".parse().unwrap();
        assert_eq!(fqbn.package, "arduino");
        assert_eq!(fqbn.architecture, "avr");
        assert_eq!(fqbn.board_id, "uno");
        assert!(fqbn.configs.is_empty());
    }

    #[test]
    fn test_round_trip_with_options() {
        let input = "arduino:avr:mega:cpu=atmega2560,mode=fast";
        let fqbn: Fqbn = input.parse().unwrap();
        assert_eq!(fqbn.configs.get("cpu").map(String::as_str), Some("atmega2560"));
        assert_eq!(fqbn.to_string(), input);
    }

    #[test]
    fn test_round_trip_preserves_option_order() {
        let input = "arduino:avr:mega:zz=1,aa=2";
        let fqbn: Fqbn = input.parse().unwrap();
        assert_eq!(fqbn.to_string(), input);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("arduino:avr".parse::<Fqbn>().is_err());
        assert!("a:b:c:d:e".parse::<Fqbn>().is_err());
        assert!("arduino::uno".parse::<Fqbn>().is_err());
        assert!("arduino:avr:uno:".parse::<Fqbn>().is_err());
        assert!("arduino:avr:uno:cpu".parse::<Fqbn>().is_err());
        assert!("arduino:avr:uno:=x".parse::<Fqbn>().is_err());
    }
}
