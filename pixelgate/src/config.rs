//! Pipeline manifest: the authorable stage declaration surface.
//!
//! A manifest is plain data, loaded once at driver start and read-only
//! thereafter. Toolchain matrices are declared as a stage template plus a
//! list of toolchain descriptors and expanded into concrete stages here,
//! so the scheduler's graph construction stays mechanical no matter how
//! many variants exist.

use crate::compare::CompareConfig;
use crate::errors::{ConfigError, PixelgateError};
use crate::runner::RunnerConfig;
use crate::stages::Action;
use crate::toolchain::{Channel, ToolchainDescriptor};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Declaration of one concrete stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDecl {
    /// Unique stage name.
    pub name: String,
    /// Toolchain environment the stage runs under.
    #[serde(default)]
    pub toolchain: ToolchainDescriptor,
    /// Ordered action list.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Names of prerequisite stages.
    #[serde(default)]
    pub needs: Vec<String>,
    /// Visual regression settings; present only on regression stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regression: Option<RegressionDecl>,
}

/// Visual regression settings for a stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegressionDecl {
    /// Example identities to render and compare.
    #[serde(default)]
    pub examples: Vec<String>,
    /// Comparator settings.
    #[serde(default)]
    pub compare: CompareConfig,
}

/// A stage template crossed with a list of toolchain descriptors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixDecl {
    /// Template name; variants are suffixed with the toolchain label.
    pub name: String,
    /// Ordered action list shared by all variants.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Prerequisites shared by all variants.
    #[serde(default)]
    pub needs: Vec<String>,
    /// One variant per descriptor.
    pub toolchains: Vec<ToolchainDescriptor>,
}

impl MatrixDecl {
    fn variant_name(&self, toolchain: &ToolchainDescriptor) -> String {
        match &toolchain.target {
            Some(target) => format!("{} ({}, {target})", self.name, toolchain.channel),
            None => format!("{} ({})", self.name, toolchain.channel),
        }
    }

    /// Expands the template into concrete stage declarations.
    #[must_use]
    pub fn expand(&self) -> Vec<StageDecl> {
        self.toolchains
            .iter()
            .map(|toolchain| StageDecl {
                name: self.variant_name(toolchain),
                toolchain: toolchain.clone(),
                actions: self.actions.clone(),
                needs: self.needs.clone(),
                regression: None,
            })
            .collect()
    }
}

/// The persisted, authorable state of the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineManifest {
    /// Pipeline name.
    pub name: String,
    /// Concrete stage declarations.
    #[serde(default)]
    pub stages: Vec<StageDecl>,
    /// Matrix templates, expanded after the concrete stages.
    #[serde(default)]
    pub matrices: Vec<MatrixDecl>,
    /// Artifact layout for regression stages. Defaults to the
    /// conventional layout under the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<RunnerConfig>,
}

impl PipelineManifest {
    /// Parses a manifest from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or an invalid manifest.
    pub fn from_json_str(json: &str) -> Result<Self, PixelgateError> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Loads a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, PixelgateError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Basic structural validation; edge validation (duplicates, dangling
    /// prerequisites, cycles) belongs to the graph.
    ///
    /// # Errors
    ///
    /// Returns an error for empty pipeline or stage names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
        }
        for matrix in &self.matrices {
            if matrix.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
        }
        Ok(())
    }

    /// Returns every concrete stage: declared stages first, then expanded
    /// matrix variants, in declaration order.
    #[must_use]
    pub fn expanded_stages(&self) -> Vec<StageDecl> {
        let mut stages = self.stages.clone();
        for matrix in &self.matrices {
            stages.extend(matrix.expand());
        }
        stages
    }

    /// The built-in verification pipeline: a format gate in front of the
    /// embedded no-allocation build, a channel build-and-test matrix, the
    /// example regression check, and a documentation link check.
    #[must_use]
    pub fn default_pipeline() -> Self {
        let fmt = StageDecl {
            name: "fmt".to_string(),
            toolchain: ToolchainDescriptor::new(Channel::Stable).with_component("rustfmt"),
            actions: vec![Action::with_args("cargo", ["fmt", "--all", "--", "--check"])],
            needs: Vec::new(),
            regression: None,
        };

        let embedded = StageDecl {
            name: "build-embedded".to_string(),
            toolchain: ToolchainDescriptor::new(Channel::Stable)
                .with_target("thumbv7em-none-eabihf"),
            actions: vec![Action::with_args(
                "cargo",
                [
                    "build",
                    "--target",
                    "thumbv7em-none-eabihf",
                    "--no-default-features",
                ],
            )],
            needs: vec!["fmt".to_string()],
            regression: None,
        };

        let examples = StageDecl {
            name: "examples".to_string(),
            toolchain: ToolchainDescriptor::new(Channel::Stable),
            actions: vec![Action::with_args("cargo", ["build", "--examples"])],
            needs: vec!["fmt".to_string()],
            regression: Some(RegressionDecl::default()),
        };

        let doc_links = StageDecl {
            name: "doc-links".to_string(),
            toolchain: ToolchainDescriptor::new(Channel::Stable),
            actions: vec![
                Action::with_args("cargo", ["doc", "--no-deps"]),
                Action::with_args("cargo", ["deadlinks"]),
            ],
            needs: vec!["fmt".to_string()],
            regression: None,
        };

        let build_test = MatrixDecl {
            name: "build-test".to_string(),
            actions: vec![
                Action::with_args("cargo", ["build", "--all-features"]),
                Action::with_args("cargo", ["test", "--all-features"]),
            ],
            needs: vec!["fmt".to_string()],
            toolchains: vec![
                ToolchainDescriptor::new(Channel::Stable),
                ToolchainDescriptor::new(Channel::Beta),
                ToolchainDescriptor::new(Channel::Nightly),
            ],
        };

        Self {
            name: "verification".to_string(),
            stages: vec![fmt, embedded, examples, doc_links],
            matrices: vec![build_test],
            artifacts: None,
        }
    }
}
