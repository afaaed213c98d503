//! Synthesis policy: persona weights and per-dimension rules.
//!
//! Defaults:
//! - weights TechLead 2.0, Prosecutor 1.0, Defense 1.0
//! - rubric covers all ten dimensions
//! - only `safe_tool_engineering` is safety-sensitive
//! - dissent threshold 3 (smallest score spread that counts as dissent)
//! - acceptable minimum 4.0 (below it, a remediation item is emitted)
//! - fact supremacy on
//!
//! File format:
//!
//! ```toml
//! fact_supremacy = true
//!
//! [weights]
//! tech_lead = 2.0
//! prosecutor = 1.0
//! defense = 1.0
//!
//! [[dimension]]
//! id = "report_accuracy"
//! safety_sensitive = false
//! dissent_threshold = 2
//! acceptable_minimum = 3.5
//! ```
//!
//! Every key is optional. `[[dimension]]` entries override the defaults of
//! the named dimension only; an optional top-level `rubric = [...]` list
//! replaces the set of dimensions reported even without opinions.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::state::{Dimension, Persona};

/// Error type for policy loading and validation
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Failed to read policy file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse policy TOML: {0}")]
    Parse(String),

    #[error("Failed to serialize policy: {0}")]
    Serialize(String),

    #[error("Unknown dimension in policy: {0}")]
    UnknownDimension(String),

    #[error("Weight for {persona} must be a positive finite number, got {weight}")]
    NonPositiveWeight { persona: Persona, weight: f64 },

    #[error("Dissent threshold for {dimension} must be within 1..=4, got {threshold}")]
    ThresholdOutOfRange { dimension: Dimension, threshold: u8 },

    #[error("Acceptable minimum for {dimension} must be within 1.0..=5.0, got {minimum}")]
    MinimumOutOfRange { dimension: Dimension, minimum: f64 },
}

/// Result type for policy operations
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Default dissent threshold (score spread).
pub const DEFAULT_DISSENT_THRESHOLD: u8 = 3;

/// Default score below which remediation is emitted.
pub const DEFAULT_ACCEPTABLE_MINIMUM: f64 = 4.0;

/// Rules for one rubric dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionPolicy {
    /// A single score of 1 forces the final score to 1.
    pub safety_sensitive: bool,
    /// Smallest `max - min` spread flagged as dissent.
    pub dissent_threshold: u8,
    /// Final scores strictly below this produce a remediation item.
    pub acceptable_minimum: f64,
}

impl Default for DimensionPolicy {
    fn default() -> Self {
        Self {
            safety_sensitive: false,
            dissent_threshold: DEFAULT_DISSENT_THRESHOLD,
            acceptable_minimum: DEFAULT_ACCEPTABLE_MINIMUM,
        }
    }
}

impl DimensionPolicy {
    fn default_for(dimension: Dimension) -> Self {
        Self {
            safety_sensitive: dimension == Dimension::SafeToolEngineering,
            ..Self::default()
        }
    }
}

/// Injected configuration for the synthesis engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisPolicy {
    pub persona_weights: BTreeMap<Persona, f64>,
    /// Rubric dimensions and their rules. Keys are always reported.
    pub dimensions: BTreeMap<Dimension, DimensionPolicy>,
    /// Cap Defense scores when a dimension's evidence is entirely missing.
    pub fact_supremacy: bool,
}

impl Default for SynthesisPolicy {
    fn default() -> Self {
        let persona_weights = BTreeMap::from([
            (Persona::TechLead, 2.0),
            (Persona::Prosecutor, 1.0),
            (Persona::Defense, 1.0),
        ]);
        let dimensions = Dimension::ALL
            .iter()
            .map(|&d| (d, DimensionPolicy::default_for(d)))
            .collect();
        Self {
            persona_weights,
            dimensions,
            fact_supremacy: true,
        }
    }
}

impl SynthesisPolicy {
    /// Weight of a persona. Personas absent from the table weigh 1.0.
    pub fn weight(&self, persona: Persona) -> f64 {
        self.persona_weights.get(&persona).copied().unwrap_or(1.0)
    }

    /// Rules for a dimension, falling back to the built-in default for
    /// dimensions outside the rubric.
    pub fn dimension(&self, dimension: Dimension) -> DimensionPolicy {
        self.dimensions
            .get(&dimension)
            .copied()
            .unwrap_or_else(|| DimensionPolicy::default_for(dimension))
    }

    /// Rubric dimensions in canonical order.
    pub fn rubric(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.dimensions.keys().copied()
    }

    pub fn with_weight(mut self, persona: Persona, weight: f64) -> Self {
        self.persona_weights.insert(persona, weight);
        self
    }

    pub fn with_dimension(mut self, dimension: Dimension, policy: DimensionPolicy) -> Self {
        self.dimensions.insert(dimension, policy);
        self
    }

    pub fn with_fact_supremacy(mut self, enabled: bool) -> Self {
        self.fact_supremacy = enabled;
        self
    }

    /// Reject weights and thresholds the scoring algorithm cannot use.
    pub fn validate(&self) -> PolicyResult<()> {
        for (&persona, &weight) in &self.persona_weights {
            if !(weight.is_finite() && weight > 0.0) {
                return Err(PolicyError::NonPositiveWeight { persona, weight });
            }
        }
        for (&dimension, rules) in &self.dimensions {
            if !(1..=4).contains(&rules.dissent_threshold) {
                return Err(PolicyError::ThresholdOutOfRange {
                    dimension,
                    threshold: rules.dissent_threshold,
                });
            }
            if !(1.0..=5.0).contains(&rules.acceptable_minimum) {
                return Err(PolicyError::MinimumOutOfRange {
                    dimension,
                    minimum: rules.acceptable_minimum,
                });
            }
        }
        Ok(())
    }

    /// Parse and validate a TOML policy.
    pub fn from_toml_str(input: &str) -> PolicyResult<Self> {
        let file: PolicyFile =
            toml::from_str(input).map_err(|e| PolicyError::Parse(e.to_string()))?;
        let policy = file.into_policy()?;
        policy.validate()?;
        Ok(policy)
    }

    /// Load and validate a TOML policy file.
    pub fn load(path: impl AsRef<Path>) -> PolicyResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| PolicyError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Render the full policy in the file format.
    pub fn to_toml_string(&self) -> PolicyResult<String> {
        let file = PolicyFile::from_policy(self);
        toml::to_string(&file).map_err(|e| PolicyError::Serialize(e.to_string()))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fact_supremacy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rubric: Option<Vec<String>>,
    #[serde(default)]
    weights: WeightsFile,
    #[serde(default, rename = "dimension", skip_serializing_if = "Vec::is_empty")]
    dimensions: Vec<DimensionFile>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WeightsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tech_lead: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prosecutor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    defense: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DimensionFile {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    safety_sensitive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dissent_threshold: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    acceptable_minimum: Option<f64>,
}

fn parse_dimension(id: &str) -> PolicyResult<Dimension> {
    id.parse::<Dimension>()
        .map_err(|e| PolicyError::UnknownDimension(e.0))
}

impl PolicyFile {
    fn into_policy(self) -> PolicyResult<SynthesisPolicy> {
        let mut policy = SynthesisPolicy::default();

        if let Some(enabled) = self.fact_supremacy {
            policy.fact_supremacy = enabled;
        }

        for (persona, weight) in [
            (Persona::TechLead, self.weights.tech_lead),
            (Persona::Prosecutor, self.weights.prosecutor),
            (Persona::Defense, self.weights.defense),
        ] {
            if let Some(w) = weight {
                policy.persona_weights.insert(persona, w);
            }
        }

        if let Some(ids) = self.rubric {
            let mut dims = BTreeMap::new();
            for id in &ids {
                let d = parse_dimension(id)?;
                dims.insert(d, DimensionPolicy::default_for(d));
            }
            policy.dimensions = dims;
        }

        for entry in self.dimensions {
            let d = parse_dimension(&entry.id)?;
            let rules = policy
                .dimensions
                .entry(d)
                .or_insert_with(|| DimensionPolicy::default_for(d));
            if let Some(v) = entry.safety_sensitive {
                rules.safety_sensitive = v;
            }
            if let Some(v) = entry.dissent_threshold {
                rules.dissent_threshold = v;
            }
            if let Some(v) = entry.acceptable_minimum {
                rules.acceptable_minimum = v;
            }
        }

        Ok(policy)
    }

    fn from_policy(policy: &SynthesisPolicy) -> Self {
        Self {
            fact_supremacy: Some(policy.fact_supremacy),
            rubric: Some(policy.rubric().map(|d| d.id().to_string()).collect()),
            weights: WeightsFile {
                tech_lead: policy.persona_weights.get(&Persona::TechLead).copied(),
                prosecutor: policy.persona_weights.get(&Persona::Prosecutor).copied(),
                defense: policy.persona_weights.get(&Persona::Defense).copied(),
            },
            dimensions: policy
                .dimensions
                .iter()
                .map(|(d, rules)| DimensionFile {
                    id: d.id().to_string(),
                    safety_sensitive: Some(rules.safety_sensitive),
                    dissent_threshold: Some(rules.dissent_threshold),
                    acceptable_minimum: Some(rules.acceptable_minimum),
                })
                .collect(),
        }
    }
}
