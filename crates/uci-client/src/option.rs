//! Engine option declarations (`option name ... type ...`)

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::UciError;
use crate::tokens::Tokens;

/// The five option types an engine may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// A boolean option.
    Check,
    /// An integer option in a certain range.
    Spin,
    /// A string option from a list of available strings.
    Combo,
    /// A button option that causes an effect when set.
    Button,
    /// A free-text option.
    String,
}

impl OptionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OptionKind::Check => "check",
            OptionKind::Spin => "spin",
            OptionKind::Combo => "combo",
            OptionKind::Button => "button",
            OptionKind::String => "string",
        }
    }
}

impl FromStr for OptionKind {
    type Err = UciError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check" => Ok(OptionKind::Check),
            "spin" => Ok(OptionKind::Spin),
            "combo" => Ok(OptionKind::Combo),
            "button" => Ok(OptionKind::Button),
            "string" => Ok(OptionKind::String),
            other => Err(UciError::MalformedOption(format!(
                "unknown option type {other:?}"
            ))),
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configurable engine parameter, as declared during the handshake.
///
/// `min`/`max` only mean something for [`OptionKind::Spin`] and `vars` for
/// [`OptionKind::Combo`], but whatever the engine sent is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineOption {
    pub name: String,
    pub kind: OptionKind,
    pub default: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<String>,
}

impl EngineOption {
    /// Parse one `option` line as sent by the engine.
    pub fn parse(line: &str) -> Result<Self, UciError> {
        let malformed = |reason: &str| UciError::MalformedOption(format!("{reason}: {line:?}"));

        if line.split_whitespace().count() < 5 {
            return Err(malformed("too few tokens"));
        }

        let mut tokens = Tokens::new(line);
        if tokens.next() != Some("option") || tokens.next() != Some("name") {
            return Err(malformed("expected `option name`"));
        }

        // Names may contain spaces, so everything up to `type` belongs to it
        let name = tokens.take_until("type").join(" ");
        if name.is_empty() {
            return Err(malformed("empty option name"));
        }

        let mut kind = None;
        let mut default = String::new();
        let mut min = None;
        let mut max = None;
        let mut vars = Vec::new();

        while let Some(key) = tokens.next() {
            match key {
                "type" => {
                    let value = tokens.next().ok_or_else(|| malformed("missing type"))?;
                    kind = Some(value.parse::<OptionKind>()?);
                }
                "default" => default = tokens.next().unwrap_or_default().to_string(),
                "min" => {
                    min = Some(
                        tokens
                            .parse_next()
                            .ok_or_else(|| malformed("non-integer min"))?,
                    )
                }
                "max" => {
                    max = Some(
                        tokens
                            .parse_next()
                            .ok_or_else(|| malformed("non-integer max"))?,
                    )
                }
                "var" => {
                    if let Some(value) = tokens.next() {
                        vars.push(value.to_string());
                    }
                }
                // Unknown keys are skipped for forward compatibility
                _ => {}
            }
        }

        Ok(Self {
            name,
            kind: kind.ok_or_else(|| malformed("missing type"))?,
            default,
            min,
            max,
            vars,
        })
    }

    /// Whether `value` is something this option can take. Used for warnings
    /// only; the engine has the final say.
    pub fn accepts(&self, value: &str) -> bool {
        match self.kind {
            OptionKind::Check => value == "true" || value == "false",
            OptionKind::Spin => match value.parse::<i64>() {
                Ok(n) => self.min.map_or(true, |min| n >= min) && self.max.map_or(true, |max| n <= max),
                Err(_) => false,
            },
            OptionKind::Combo => self.vars.iter().any(|v| v == value),
            OptionKind::Button => value.is_empty(),
            OptionKind::String => true,
        }
    }
}

/// Renders the declaration the way an engine would send it.
impl fmt::Display for EngineOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "option name {} type {}", self.name, self.kind)?;
        if !self.default.is_empty() {
            write!(f, " default {}", self.default)?;
        }
        if let Some(min) = self.min {
            write!(f, " min {min}")?;
        }
        if let Some(max) = self.max {
            write!(f, " max {max}")?;
        }
        for var in &self.vars {
            write!(f, " var {var}")?;
        }
        Ok(())
    }
}
