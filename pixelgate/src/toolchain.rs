//! Toolchain descriptors for stage environments.
//!
//! A [`ToolchainDescriptor`] is pure data: it names the channel, target and
//! components a stage wants, and the command executor owns its
//! interpretation (the `+channel` argument convention). Descriptors are
//! immutable once a stage starts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A release channel or pinned compiler version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Channel {
    /// The stable release channel.
    Stable,
    /// The beta release channel.
    Beta,
    /// The nightly release channel.
    Nightly,
    /// A pinned version, e.g. `1.61.0`.
    Pinned(String),
}

impl Default for Channel {
    fn default() -> Self {
        Self::Stable
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Beta => write!(f, "beta"),
            Self::Nightly => write!(f, "nightly"),
            Self::Pinned(version) => write!(f, "{version}"),
        }
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.to_string()
    }
}

impl TryFrom<String> for Channel {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(match value.as_str() {
            "stable" => Self::Stable,
            "beta" => Self::Beta,
            "nightly" => Self::Nightly,
            _ => Self::Pinned(value),
        })
    }
}

/// The toolchain environment a stage executes in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainDescriptor {
    /// The release channel.
    #[serde(default)]
    pub channel: Channel,

    /// Compilation target triple, if cross-compiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Toolchain components the stage needs (e.g. `rustfmt`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
}

impl ToolchainDescriptor {
    /// Creates a descriptor for the given channel.
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            target: None,
            components: Vec::new(),
        }
    }

    /// Sets the compilation target.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Adds a required component.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.components.push(component.into());
        self
    }

    /// Renders the toolchain-override argument, e.g. `+nightly`.
    #[must_use]
    pub fn override_arg(&self) -> String {
        format!("+{}", self.channel)
    }
}
