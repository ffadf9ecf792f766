use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::PipelineError;

/// The kind of a frontmatter property, as chosen by the user.
///
/// Only [`PropertyKind::List`] is rendered as a YAML sequence; every other kind
/// is written as a single `key: value` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Tags,
    Aliases,
    CssClasses,
    Text,
    List,
    Number,
    Checkbox,
    Date,
}

impl PropertyKind {
    pub const ALL: [PropertyKind; 8] = [
        Self::Tags,
        Self::Aliases,
        Self::CssClasses,
        Self::Text,
        Self::List,
        Self::Number,
        Self::Checkbox,
        Self::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Aliases => "aliases",
            Self::CssClasses => "cssclasses",
            Self::Text => "text",
            Self::List => "list",
            Self::Number => "number",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
        }
    }

    /// Property name the note library expects for this kind, if it has a fixed one.
    pub fn default_name(&self) -> Option<&'static str> {
        match self {
            Self::Tags => Some("tags"),
            Self::Aliases => Some("aliases"),
            Self::CssClasses => Some("cssclasses"),
            Self::Text | Self::List | Self::Number | Self::Checkbox | Self::Date => None,
        }
    }

    /// Check a raw value against the format this kind accepts.
    pub fn validate_value(&self, value: &str) -> Result<(), String> {
        match self {
            Self::Tags | Self::Aliases | Self::CssClasses | Self::List => {
                if !value.is_empty() && value.split(',').all(|item| !item.is_empty()) {
                    Ok(())
                } else {
                    Err(format!("expected `item1,item2,...`, got `{value}`"))
                }
            }
            Self::Number => {
                if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
                    Ok(())
                } else {
                    Err(format!("expected digits only, got `{value}`"))
                }
            }
            Self::Checkbox => match value {
                "true" | "false" => Ok(()),
                _ => Err(format!("expected `true` or `false`, got `{value}`")),
            },
            Self::Date => parse_date(value).map(|_| ()),
            Self::Text => Ok(()),
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| format!("unknown property type `{s}`"))
    }
}

/// One user-defined frontmatter property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    #[serde(rename = "type")]
    pub kind: PropertyKind,
    pub name: String,
    pub value: String,
}

impl PropertySpec {
    pub fn new(kind: PropertyKind, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err(format!("{} property has no name", self.kind));
        }
        self.kind
            .validate_value(&self.value)
            .map_err(|e| format!("property `{}`: {e}", self.name))
    }
}

impl FromStr for PropertySpec {
    type Err = String;

    /// Parse `type:name=value`. The name may be omitted (`tags:=a,b` or `tags=a,b`)
    /// for kinds with a default name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected `type:name=value`, got `{s}`"))?;
        let (kind, name) = match head.split_once(':') {
            Some((kind, name)) => (kind.parse::<PropertyKind>()?, name.trim()),
            None => (head.parse::<PropertyKind>()?, ""),
        };
        let name = if name.is_empty() {
            kind.default_name()
                .ok_or_else(|| format!("{kind} property needs a name"))?
        } else {
            name
        };
        Ok(Self::new(kind, name, value))
    }
}

/// Everything the caller decides before a run. Never mutated by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelRequest {
    pub trip_name: String,
    /// `YYYY-MM-DD`, used as the map identifier.
    pub trip_date: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub properties: Vec<PropertySpec>,
}

impl TravelRequest {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let name = self.trip_name.trim();
        if name.is_empty() {
            return Err(PipelineError::InvalidRequest("trip name is empty".into()));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(PipelineError::InvalidRequest(format!(
                "trip name `{name}` is not a valid folder name"
            )));
        }
        parse_date(&self.trip_date).map_err(PipelineError::InvalidRequest)?;
        for property in &self.properties {
            property.validate().map_err(PipelineError::InvalidRequest)?;
        }
        Ok(())
    }

    /// `<output>/<trip>`
    pub fn trip_dir(&self) -> PathBuf {
        self.output_dir.join(&self.trip_name)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    // chrono accepts `2024-1-5`; the library format does not.
    let shaped = value.len() == 10
        && value
            .bytes()
            .enumerate()
            .all(|(i, b)| if i == 4 || i == 7 { b == b'-' } else { b.is_ascii_digit() });
    if !shaped {
        return Err(format!("expected a YYYY-MM-DD date, got `{value}`"));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| format!("invalid date `{value}`: {e}"))
}
