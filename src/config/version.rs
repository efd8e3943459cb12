use crate::error::{NodeError, Result};
use std::fmt;
use std::str::FromStr;

/// Accepted hello versions, written as `<n|x>.<n|x>.<n|x>`.
///
/// `0.2.x` accepts `0.2.0`, `0.2.17` and so on. A candidate version must be
/// exactly three dot-separated runs of ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPattern {
    parts: [Option<u64>; 3],
}

impl VersionPattern {
    pub fn matches(&self, version: &str) -> bool {
        let Some(components) = parse_components(version) else {
            return false;
        };
        self.parts
            .iter()
            .zip(components.iter())
            .all(|(expected, actual)| expected.map_or(true, |e| e == *actual))
    }
}

fn parse_components(version: &str) -> Option<[u64; 3]> {
    let mut out = [0u64; 3];
    let mut pieces = version.split('.');
    for slot in out.iter_mut() {
        let piece = pieces.next()?;
        if piece.is_empty() || !piece.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = piece.parse().ok()?;
    }
    if pieces.next().is_some() {
        return None;
    }
    Some(out)
}

impl FromStr for VersionPattern {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self> {
        let pieces: Vec<&str> = s.split('.').collect();
        if pieces.len() != 3 {
            return Err(NodeError::Config(format!(
                "Invalid version pattern {s}: expected three components"
            )));
        }
        let mut parts = [None; 3];
        for (slot, piece) in parts.iter_mut().zip(pieces) {
            if piece == "x" {
                continue;
            }
            let number = piece.parse::<u64>().map_err(|_| {
                NodeError::Config(format!("Invalid version pattern component '{piece}' in {s}"))
            })?;
            *slot = Some(number);
        }
        Ok(VersionPattern { parts })
    }
}

impl fmt::Display for VersionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .parts
            .iter()
            .map(|p| p.map_or_else(|| "x".to_string(), |n| n.to_string()))
            .collect();
        write!(f, "{}", rendered.join("."))
    }
}
