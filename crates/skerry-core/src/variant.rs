//! Sandbox variant catalog.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Immutable catalog entry for a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSpec {
    /// Symbolic name.
    pub name: &'static str,
    /// Backing image reference.
    pub image: &'static str,
    /// Container ports to publish. The first is the control-plane port.
    pub ports: &'static [u16],
}

const BASE: VariantSpec = VariantSpec {
    name: "base",
    image: "agentruntime/sandbox:base",
    ports: &[8000],
};

const FILESYSTEM: VariantSpec = VariantSpec {
    name: "filesystem",
    image: "agentruntime/sandbox:filesystem",
    ports: &[8000],
};

const BROWSER: VariantSpec = VariantSpec {
    name: "browser",
    image: "agentruntime/sandbox:browser",
    ports: &[8000, 80, 3000, 9223],
};

const CUSTOM: VariantSpec = VariantSpec {
    name: "custom",
    image: "agentruntime/sandbox:custom",
    ports: &[8000],
};

/// The kind of sandbox to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SandboxVariant {
    /// Python and shell execution.
    #[default]
    Base,
    /// File-system tools.
    Filesystem,
    /// Browser automation (Playwright).
    Browser,
    /// Operator-supplied image.
    Custom,
}

impl SandboxVariant {
    /// Every variant, in catalog order.
    pub const ALL: [SandboxVariant; 4] = [Self::Base, Self::Filesystem, Self::Browser, Self::Custom];

    /// The catalog entry for this variant.
    pub const fn spec(self) -> &'static VariantSpec {
        match self {
            Self::Base => &BASE,
            Self::Filesystem => &FILESYSTEM,
            Self::Browser => &BROWSER,
            Self::Custom => &CUSTOM,
        }
    }

    /// Symbolic name.
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Image reference.
    pub fn image(self) -> &'static str {
        self.spec().image
    }

    /// Container ports to publish.
    pub fn ports(self) -> &'static [u16] {
        self.spec().ports
    }
}

impl fmt::Display for SandboxVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SandboxVariant {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| CoreError::UnknownVariant(s.to_string()))
    }
}

impl TryFrom<String> for SandboxVariant {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SandboxVariant> for String {
    fn from(variant: SandboxVariant) -> Self {
        variant.name().to_string()
    }
}
