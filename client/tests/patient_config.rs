use std::collections::HashSet;

use knockout::humanoid::{BODY_SHAPES, HEAD_SHAPES, SKELETON};
use knockout::patient::PATIENT_CONFIG_PATH;
use knockout_shared::PatientConfig;

fn shipped() -> PatientConfig {
    PatientConfig::load(PATIENT_CONFIG_PATH).unwrap()
}

#[test]
fn shipped_config_is_clean() {
    let config = shipped();
    let issues = config.validate();
    assert!(issues.is_empty(), "{issues:?}");
    assert!(!config.rules.is_empty());
    assert!(!config.areas.is_empty());
}

#[test]
fn every_rule_and_ragdoll_area_is_declared() {
    let config = shipped();
    let areas: HashSet<&str> = config.areas.iter().map(|a| a.area_id.as_str()).collect();
    for rule in &config.rules {
        assert!(areas.contains(rule.area_id.as_str()), "rule for unknown area {}", rule.area_id);
    }
    for element in &config.ragdoll.elements {
        if let Some(area) = &element.area {
            assert!(areas.contains(area.as_str()), "{} maps to unknown area {area}", element.bone);
        }
    }
}

#[test]
fn config_matches_the_humanoid_model() {
    let config = shipped();
    let bones: HashSet<&str> = SKELETON.iter().map(|(name, _, _)| *name).collect();
    for element in &config.ragdoll.elements {
        assert!(bones.contains(element.bone.as_str()), "no bone {}", element.bone);
    }
    assert!(bones.contains(config.vitals.knockout_bone.as_str()));

    for area in &config.areas {
        assert!(matches!(area.renderer.as_str(), "Body" | "Face"));
        for dna in &area.dna {
            let names = match dna.channel.as_str() {
                "head" => HEAD_SHAPES,
                "body" => BODY_SHAPES,
                other => panic!("no shape channel {other}"),
            };
            assert!(names.contains(&dna.parameter.as_str()), "no shape {}", dna.parameter);
        }
    }
    for rule in &config.rules {
        for spawn in &rule.effect.spawns {
            assert!(bones.contains(spawn.bone.as_str()));
        }
    }
}
