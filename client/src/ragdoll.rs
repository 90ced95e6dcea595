//! The shared ragdoll rig on avian bodies.
//!
//! Every ragdoll bone is its own rigid body, colliders are child entities of
//! the bone and joints are standalone [`SphericalJoint`] entities. Animated
//! bodies are kinematic; a knockout makes them dynamic.

use avian3d::prelude::*;
use bevy::prelude::*;
use knockout_shared::patient::{self as vitals, Knockout};
use knockout_shared::ragdoll::{
    ColliderShape, ColliderSpec, ForceMode, LocalTransform, MassProperties, RagdollElement,
    RagdollHost, SpherePair,
};
use knockout_shared::RagdollRig;

use crate::animation::{set_players_paused, Animator};
use crate::character::{descendants, relative_to, world_transform, Bones, PatientWorld};
use crate::damage::HitArea;
use crate::time_scale::SlowMotionRequested;

/// Step used to turn forces into velocity changes when no fixed clock exists.
pub const DEFAULT_PHYSICS_STEP: f32 = 1.0 / 64.0;

pub fn plugin(app: &mut App) {
    app.add_observer(on_recover);
}

// ── Events ──────────────────────────────────────────────────────────

/// Mutation: the patient went limp and was thrown with `impulse`.
#[derive(Event, Clone, Copy, Debug)]
pub struct KnockedOut {
    pub patient: Entity,
    pub impulse: Vec3,
}

/// Intent: hand the patient's body back to the animator.
#[derive(Event, Clone, Copy, Debug)]
pub struct Recover {
    pub patient: Entity,
}

/// Feedback: the patient is animated again.
#[derive(Event, Clone, Copy, Debug)]
pub struct Recovered {
    pub patient: Entity,
}

// ── Components ──────────────────────────────────────────────────────

#[derive(Component, Debug, Deref, DerefMut)]
pub struct Ragdoll(pub RagdollRig<Entity, Entity>);

impl Ragdoll {
    pub fn new(elements: Vec<RagdollElement>, on_start: knockout_shared::RagdollSettings) -> Self {
        Self(RagdollRig::new(elements, on_start))
    }
}

#[derive(Component, Clone, Copy, Debug)]
pub struct RagdollCollider {
    pub bone: Entity,
}

#[derive(Component, Clone, Copy, Debug)]
pub struct RagdollJoint {
    pub bone: Entity,
}

/// The patient keeps updating while no camera sees it.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct UpdateWhenOffscreen;

/// Colliders a cloth simulation should push against.
#[derive(Component, Clone, Debug, Default, PartialEq)]
pub struct Cloth {
    pub sphere_pairs: Vec<(Entity, Option<Entity>)>,
    pub capsules: Vec<Entity>,
}

// ── Host ────────────────────────────────────────────────────────────

impl RagdollHost for PatientWorld<'_> {
    type Bone = Entity;
    type Collider = Entity;

    fn find_bone(&self, name: &str) -> Option<Entity> {
        self.bone(name)
    }

    fn ensure_body(&mut self, bone: Entity, mass: f32) {
        let Ok(mut entity) = self.world_mut().get_entity_mut(bone) else {
            return;
        };
        if !entity.contains::<RigidBody>() {
            entity.insert(RigidBody::Kinematic);
        }
        entity.insert(Mass(mass));
    }

    fn has_body(&self, bone: Entity) -> bool {
        self.world().get::<RigidBody>(bone).is_some()
    }

    fn add_collider(&mut self, bone: Entity, spec: &ColliderSpec, trigger: bool) -> Entity {
        let collider = match spec.shape {
            ColliderShape::Box { size } => Collider::cuboid(size.x, size.y, size.z),
            ColliderShape::Sphere { radius } => Collider::sphere(radius),
            ColliderShape::Capsule { radius, height, .. } => {
                Collider::capsule(radius, ColliderShape::capsule_segment(radius, height))
            }
        };
        let rotation = spec.shape.rotation();
        let mut entity = self.world_mut().spawn((
            Name::new("Ragdoll Collider"),
            RagdollCollider { bone },
            collider,
            Transform::from_translation(spec.center).with_rotation(rotation),
            ChildOf(bone),
        ));
        if trigger {
            entity.insert(Sensor);
        }
        entity.id()
    }

    fn add_joint(&mut self, bone: Entity, parent: Entity, element: &RagdollElement) {
        let anchor = relative_to(
            &world_transform(self.world(), parent),
            &world_transform(self.world(), bone),
        )
        .translation;
        let swing = element.limits.swing_cone();
        let (low, high) = element.limits.twist_range();
        self.world_mut().spawn((
            Name::new(format!("{} Joint", element.bone)),
            RagdollJoint { bone },
            SphericalJoint::new(parent, bone)
                .with_local_anchor1(anchor)
                .with_swing_limits(-swing, swing)
                .with_twist_limits(low, high),
        ));
    }

    fn set_body_mode(&mut self, bone: Entity, kinematic: bool, gravity: bool) {
        let Ok(mut entity) = self.world_mut().get_entity_mut(bone) else {
            return;
        };
        let body = if kinematic {
            RigidBody::Kinematic
        } else {
            RigidBody::Dynamic
        };
        entity.insert((body, GravityScale(if gravity { 1.0 } else { 0.0 })));
        if kinematic {
            entity.insert((LinearVelocity::ZERO, AngularVelocity::ZERO));
        }
    }

    fn set_collider_mode(&mut self, collider: Entity, trigger: bool, layer: Option<u32>) {
        let Ok(mut entity) = self.world_mut().get_entity_mut(collider) else {
            return;
        };
        if trigger {
            entity.insert(Sensor);
        } else {
            entity.remove::<Sensor>();
        }
        if let Some(layer) = layer {
            entity.insert(CollisionLayers::from_bits(1 << layer.min(31), u32::MAX));
        }
    }

    fn animator_enabled(&self) -> Option<bool> {
        self.world().get::<Animator>(self.patient()).map(|a| a.enabled)
    }

    fn set_animator_enabled(&mut self, enabled: bool) {
        let patient = self.patient();
        let Some(mut animator) = self.world_mut().get_mut::<Animator>(patient) else {
            return;
        };
        if animator.enabled == enabled {
            return;
        }
        animator.enabled = enabled;
        set_players_paused(self.world_mut(), patient, !enabled);
    }

    fn set_update_when_offscreen(&mut self, enabled: bool) {
        let patient = self.patient();
        let Ok(mut entity) = self.world_mut().get_entity_mut(patient) else {
            return;
        };
        if enabled {
            entity.insert(UpdateWhenOffscreen);
        } else {
            entity.remove::<UpdateWhenOffscreen>();
        }
    }

    fn bone_world_position(&self, bone: Entity) -> Vec3 {
        world_transform(self.world(), bone).translation
    }

    fn character_position(&self) -> Vec3 {
        world_transform(self.world(), self.patient()).translation
    }

    /// Snaps across the floor only: the root bone sits above the patient's
    /// origin, so taking its height would lift the patient on every recovery.
    fn set_character_position(&mut self, position: Vec3) {
        let patient = self.patient();
        let current = world_transform(self.world(), patient).translation;
        let position = Vec3::new(position.x, current.y, position.z);
        let parent = self
            .world()
            .get::<ChildOf>(patient)
            .map(|c| world_transform(self.world(), c.parent()));
        let translation = match parent {
            Some(parent) => relative_to(&parent, &Transform::from_translation(position)).translation,
            None => position,
        };
        if let Some(mut transform) = self.world_mut().get_mut::<Transform>(patient) {
            transform.translation = translation;
        }
    }

    fn apply_force(
        &mut self,
        bone: Entity,
        force: Vec3,
        at: Vec3,
        mode: ForceMode,
        body: &MassProperties,
    ) {
        let dt = self
            .world()
            .get_resource::<Time<Fixed>>()
            .map_or(DEFAULT_PHYSICS_STEP, |t| t.timestep().as_secs_f32());
        let pose = world_transform(self.world(), bone);
        let (linear, angular) =
            body.velocity_change(force, at, mode, dt, pose.translation, pose.rotation);
        push(self.world_mut(), bone, linear, angular);
    }

    fn skeleton_bones(&self) -> Vec<Entity> {
        let mut bones: Vec<Entity> = self
            .world()
            .get::<Bones>(self.patient())
            .map(|b| b.values().copied().collect())
            .unwrap_or_default();
        bones.sort();
        bones
    }

    fn local_transform(&self, bone: Entity) -> Option<LocalTransform> {
        let transform = self.world().get::<Transform>(bone)?;
        Some(LocalTransform {
            translation: transform.translation,
            rotation: transform.rotation,
            scale: transform.scale,
        })
    }

    fn set_local_transform(&mut self, bone: Entity, local: &LocalTransform) {
        if let Some(mut transform) = self.world_mut().get_mut::<Transform>(bone) {
            *transform = Transform {
                translation: local.translation,
                rotation: local.rotation,
                scale: local.scale,
            };
        }
    }

    fn assign_cloth_colliders(&mut self, spheres: &[SpherePair<Entity>], capsules: &[Entity]) -> usize {
        let patient = self.patient();
        let mut assigned = 0;
        for entity in descendants(self.world(), patient) {
            let Some(mut cloth) = self.world_mut().get_mut::<Cloth>(entity) else {
                continue;
            };
            cloth.sphere_pairs = spheres.iter().map(|p| (p.first, p.second)).collect();
            cloth.capsules = capsules.to_vec();
            assigned += 1;
        }
        assigned
    }
}

/// Add a velocity change to a body, linear and angular.
fn push(world: &mut World, body: Entity, linear: Vec3, angular: Vec3) {
    let Ok(mut entity) = world.get_entity_mut(body) else {
        return;
    };
    match entity.get_mut::<LinearVelocity>() {
        Some(mut velocity) => velocity.0 += linear,
        None => {
            entity.insert(LinearVelocity(linear));
        }
    }
    match entity.get_mut::<AngularVelocity>() {
        Some(mut velocity) => velocity.0 += angular,
        None => {
            entity.insert(AngularVelocity(angular));
        }
    }
}

// ── Knockout ────────────────────────────────────────────────────────

/// Label every ragdoll collider with the damage area of its element.
pub fn tag_hit_areas(world: &mut World, patient: Entity) {
    let Some(ragdoll) = world.get::<Ragdoll>(patient) else {
        return;
    };
    let areas: Vec<(String, String)> = ragdoll
        .elements()
        .iter()
        .filter_map(|e| Some((e.bone.clone(), e.area.clone()?)))
        .collect();
    let host = PatientWorld::new(world, patient);
    let targets: Vec<(Entity, String)> = areas
        .into_iter()
        .filter_map(|(bone, area)| Some((host.bone(&bone)?, area)))
        .collect();

    for (bone, area) in targets {
        let colliders: Vec<Entity> = world
            .get::<Children>(bone)
            .map(|children| {
                children
                    .iter()
                    .filter(|&c| world.get::<RagdollCollider>(c).is_some_and(|rc| rc.bone == bone))
                    .collect()
            })
            .unwrap_or_default();
        for collider in colliders {
            if let Ok(mut entity) = world.get_entity_mut(collider) {
                entity.insert(HitArea(area.clone()));
            }
        }
    }
}

/// Go limp and fly. Slow motion starts with the throw.
pub fn knock_out(world: &mut World, patient: Entity, knockout: &Knockout) {
    let thrown = PatientWorld::new(world, patient)
        .scoped::<Ragdoll, _>(|rig, host| vitals::knock_out(&rig.0, knockout, host));
    if thrown != Some(true) {
        warn!("{patient} has no ragdoll root to throw");
    }
    if let Some(slow_motion) = knockout.slow_motion {
        world.trigger(SlowMotionRequested::from(slow_motion));
    }
    info!("{patient} knocked out");
    world.trigger(KnockedOut {
        patient,
        impulse: knockout.impulse,
    });
}

fn on_recover(on: On<Recover>, mut commands: Commands) {
    let patient = on.event().patient;
    commands.queue(move |world: &mut World| recover(world, patient));
}

pub fn recover(world: &mut World, patient: Entity) {
    let recovered = PatientWorld::new(world, patient)
        .scoped::<Ragdoll, _>(|rig, host| vitals::recover(&rig.0, host));
    if recovered.is_none() {
        debug!("{patient} has no ragdoll to recover");
        return;
    }
    world.trigger(Recovered { patient });
}
