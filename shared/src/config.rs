//! Authored patient configuration, stored as RON.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::damage::{DamageableArea, PunchOffSlot};
use crate::effects::AreaEffectRule;
use crate::patient::{ForceMeter, VitalsConfig};
use crate::ragdoll::{ColliderShape, RagdollElement, RagdollSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse patient config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("failed to serialize patient config: {0}")]
    Serialize(#[from] ron::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagdollConfig {
    pub on_start: RagdollSettings,
    pub elements: Vec<RagdollElement>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientConfig {
    pub rules: Vec<AreaEffectRule>,
    pub areas: Vec<DamageableArea>,
    pub punch_off: Vec<PunchOffSlot>,
    pub ragdoll: RagdollConfig,
    pub vitals: VitalsConfig,
    pub force_meter: ForceMeter,
}

/// Something odd in a config that still loads.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigIssue {
    pub at: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.at, self.message)
    }
}

impl PatientConfig {
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&source)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Report values that are clamped or ignored at runtime.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut issue = |at: String, message: &str| {
            issues.push(ConfigIssue {
                at,
                message: message.to_string(),
            })
        };

        for (i, rule) in self.rules.iter().enumerate() {
            let at = format!("rules[{i}] ({})", rule.area_id);
            if rule.is_inverted() {
                issue(at.clone(), "min_force is above max_force, the rule never fires");
            }
            if !(0.0..=1.0).contains(&rule.probability) {
                issue(at.clone(), "probability outside [0, 1]");
            }
            if let Some(slow) = rule.effect.slow_motion {
                if slow.scale <= 0.0 {
                    issue(at.clone(), "slow motion scale must be positive");
                } else if slow.scale > 1.0 {
                    issue(at.clone(), "slow motion scale above 1 is clamped to 1");
                }
            }
            for spawn in &rule.effect.spawns {
                if spawn.prototype.is_empty() {
                    issue(at.clone(), "spawn without a prototype");
                }
            }
        }

        for area in &self.areas {
            for dna in &area.dna {
                if dna.min_delta > dna.max_delta {
                    issue(format!("areas.{}", area.area_id), "inverted shape delta band is normalised");
                }
            }
            for expression in &area.expressions {
                if expression.min > expression.max {
                    issue(format!("areas.{}", area.area_id), "inverted expression band is normalised");
                }
            }
        }

        let roots = self.ragdoll.elements.iter().filter(|e| e.is_root).count();
        if !self.ragdoll.elements.is_empty() && roots != 1 {
            issue("ragdoll".into(), "exactly one root element expected");
        }
        for element in &self.ragdoll.elements {
            let at = format!("ragdoll.{}", element.bone);
            if !element.is_root && element.parent.is_none() {
                issue(at.clone(), "non-root element without a parent gets no joint");
            }
            if element.mass <= 0.0 {
                issue(at.clone(), "mass must be positive");
            }
            for collider in &element.colliders {
                if let ColliderShape::Capsule { radius, height, .. } = collider.shape {
                    if height < 2.0 * radius {
                        issue(at.clone(), "capsule shorter than its diameter becomes a sphere");
                    }
                }
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;

    const SAMPLE: &str = r#"(
        rules: [
            (
                area_id: "head",
                min_force: 0.5,
                max_force: 1.0,
                probability: 0.5,
                effect: (
                    sound: Some("punch_heavy"),
                    slow_motion: Some((scale: 0.5, duration: 1.0)),
                    spawns: [(prototype: "stars", anchor: HitPoint, align_to_normal: true)],
                ),
            ),
        ],
        areas: [
            (
                area_id: "head",
                renderer: "Body",
                shader_name: "Bruise",
                material_param: "damage",
                expressions: [(expression: JawOpenClose, force_factor: 0.5)],
                dna: [(channel: "head", parameter: "noseFlatten")],
            ),
        ],
        punch_off: [(slot: "Helmet")],
        ragdoll: (
            elements: [
                (bone: "Hips", is_root: true, mass: 20.0, colliders: [
                    (shape: Box(size: (0.3, 0.2, 0.2))),
                ]),
                (bone: "Head", parent: Some("Hips"), mass: 5.0, colliders: [
                    (center: (0.0, 0.1, 0.0), shape: Sphere(radius: 0.12)),
                ]),
            ],
        ),
    )"#;

    #[test]
    fn parses_with_authoring_defaults() {
        let config = PatientConfig::from_ron(SAMPLE).unwrap();
        let rule = &config.rules[0];
        assert_eq!(rule.effect.anim_trigger.as_deref(), Some("hit"));
        assert_eq!(rule.effect.spawns[0].release_after, Some(3.0));
        assert_eq!(rule.effect.spawns[0].bone, "Head");

        let area = &config.areas[0];
        assert_eq!(area.material_force_factor, 0.25);
        assert_eq!(area.expressions[0].expression, Expression::JawOpenClose);
        assert_eq!(area.dna[0].min_delta, -1.0);

        assert_eq!(config.punch_off[0], PunchOffSlot::default());
        assert_eq!(config.ragdoll.elements.len(), 2);
        assert_eq!(config.vitals.max_health, 100.0);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn round_trips_through_ron() {
        let config = PatientConfig::from_ron(SAMPLE).unwrap();
        let text = config.to_ron().unwrap();
        assert_eq!(PatientConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn validation_reports_odd_values() {
        let mut config = PatientConfig::from_ron(SAMPLE).unwrap();
        config.rules[0].min_force = 2.0;
        config.ragdoll.elements[1].parent = None;
        let issues = config.validate();
        assert_eq!(issues.len(), 2);
        assert!(issues[0].to_string().starts_with("rules[0] (head)"));
    }

    #[test]
    fn nan_probability_is_reported() {
        let mut config = PatientConfig::from_ron(SAMPLE).unwrap();
        config.rules[0].probability = f32::NAN;
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].to_string().contains("probability"), "{}", issues[0]);
    }

    #[test]
    fn parse_errors_surface() {
        assert!(matches!(
            PatientConfig::from_ron("(rules: [)"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            PatientConfig::load("/nonexistent/patient.ron"),
            Err(ConfigError::Io { .. })
        ));
    }
}
