//! Payload encoding supplied by the protocol adapter for each evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How string fields in the request (and expected values) are encoded.
///
/// `Base64` is used when the original payload was binary: values are decoded to
/// bytes and compared byte-for-byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Base64,
}

impl Encoding {
    pub fn is_binary(&self) -> bool {
        matches!(self, Encoding::Base64)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Base64 => "base64",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" | "text" => Ok(Encoding::Utf8),
            "base64" | "binary" => Ok(Encoding::Base64),
            other => Err(format!("unknown encoding: {other}")),
        }
    }
}
