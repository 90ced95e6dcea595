//! Parameter sink standing in for the patient's animation graph.
//!
//! Hit effects write floats, bools and triggers here; whatever drives the
//! actual clips reads them. Triggers live for one frame.

use std::collections::HashMap;

use bevy::prelude::*;
use knockout_shared::effects::Pose;
use knockout_shared::router::AnimationSink;

use crate::character::{descendants, world_transform, PatientWorld};

pub fn plugin(app: &mut App) {
    app.add_systems(Last, clear_triggers);
}

#[derive(Component, Clone, Debug)]
pub struct Animator {
    pub enabled: bool,
    floats: HashMap<String, f32>,
    bools: HashMap<String, bool>,
    triggers: Vec<String>,
}

impl Default for Animator {
    fn default() -> Self {
        Self {
            enabled: true,
            floats: HashMap::new(),
            bools: HashMap::new(),
            triggers: Vec::new(),
        }
    }
}

impl Animator {
    pub fn float(&self, param: &str) -> Option<f32> {
        self.floats.get(param).copied()
    }

    pub fn flag(&self, param: &str) -> Option<bool> {
        self.bools.get(param).copied()
    }

    /// Triggers set since the end of the last frame.
    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    pub fn is_triggered(&self, param: &str) -> bool {
        self.triggers.iter().any(|t| t == param)
    }
}

fn clear_triggers(mut animators: Query<&mut Animator>) {
    for mut animator in &mut animators {
        if !animator.triggers.is_empty() {
            animator.triggers.clear();
        }
    }
}

/// Pause or resume every clip player under `root`.
pub fn set_players_paused(world: &mut World, root: Entity, paused: bool) {
    for entity in descendants(world, root) {
        let Some(mut player) = world.get_mut::<AnimationPlayer>(entity) else {
            continue;
        };
        if paused {
            player.pause_all();
        } else {
            player.resume_all();
        }
    }
}

impl PatientWorld<'_> {
    fn animator_mut(&mut self) -> Option<Mut<'_, Animator>> {
        let patient = self.patient();
        self.world_mut().get_mut::<Animator>(patient)
    }

    pub fn has_animator(&self) -> bool {
        self.world().get::<Animator>(self.patient()).is_some()
    }
}

impl AnimationSink for PatientWorld<'_> {
    fn set_float(&mut self, param: &str, value: f32) {
        if let Some(mut animator) = self.animator_mut() {
            animator.floats.insert(param.to_string(), value);
        }
    }

    fn set_bool(&mut self, param: &str, value: bool) {
        if let Some(mut animator) = self.animator_mut() {
            animator.bools.insert(param.to_string(), value);
        }
    }

    fn set_trigger(&mut self, param: &str) {
        if let Some(mut animator) = self.animator_mut() {
            animator.triggers.push(param.to_string());
        }
    }

    fn bone_pose(&self, bone: &str) -> Option<Pose> {
        let entity = self.bone(bone)?;
        let transform = world_transform(self.world(), entity);
        Some(Pose::new(transform.translation, transform.rotation))
    }

    fn is_enabled(&self) -> bool {
        self.world()
            .get::<Animator>(self.patient())
            .is_some_and(|a| a.enabled)
    }
}
