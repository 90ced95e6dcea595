//! The patient's character model as ECS data, and [`PatientWorld`], the
//! adapter the shared damage and ragdoll logic runs against.
//!
//! Character lifecycle:  [`CharacterPhaseChanged`] → damage state + ragdoll
//! Rebuild chain:        [`RebuildRequested`] → [`CharacterPhaseChanged`]

use std::collections::{BTreeMap, HashMap};

use avian3d::prelude::*;
use bevy::prelude::*;
use knockout_shared::character::{
    DeformationHost, DirtyFlags, ExpressionHost, MaterialHost, WardrobeHost,
};
use knockout_shared::expression::Expression;
use knockout_shared::lifecycle::{CharacterLifecycle, CharacterPhase};
use knockout_shared::ragdoll::{ColliderShape, ColliderSpec, ForceMode, MassProperties};
use knockout_shared::Rebuild;

use crate::damage::DamageState;
use crate::ragdoll::{self, Ragdoll};

/// Mass given to wardrobe items knocked off the patient.
pub const EJECTED_ITEM_MASS: f32 = 1.0;
/// Ejected items without a collider of their own fly as a ball this size.
pub const EJECTED_ITEM_RADIUS: f32 = 0.12;

pub fn plugin(app: &mut App) {
    app.add_observer(on_phase_changed)
        .add_observer(on_rebuild_requested);
}

// ── Events ──────────────────────────────────────────────────────────

/// The character reached a lifecycle phase. Damage state and ragdoll react
/// in that order: ragdoll first, so a restored pose is what materials see.
#[derive(Event, Clone, Copy, Debug)]
pub struct CharacterPhaseChanged {
    pub patient: Entity,
    pub phase: CharacterPhase,
}

/// Mutation: the character's cached parts must be regenerated.
#[derive(Event, Clone, Copy, Debug)]
pub struct RebuildRequested {
    pub patient: Entity,
    pub kind: Rebuild,
}

// ── Character data ──────────────────────────────────────────────────

/// Bone entities by name.
#[derive(Component, Clone, Debug, Default, Deref, DerefMut)]
pub struct Bones(pub HashMap<String, Entity>);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderMaterial {
    pub shader: String,
    pub floats: HashMap<String, f32>,
}

impl ShaderMaterial {
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            floats: HashMap::new(),
        }
    }

    pub fn float(&self, param: &str) -> Option<f32> {
        self.floats.get(param).copied()
    }
}

/// A named renderer under the patient. Only its material parameters are
/// modelled; drawing them is someone else's job.
#[derive(Component, Clone, Debug, Default)]
pub struct Renderer {
    pub name: String,
    pub materials: Vec<ShaderMaterial>,
}

/// One material instance: the renderer entity and the slot on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialSlot {
    pub renderer: Entity,
    pub index: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DnaChannel {
    pub names: Vec<String>,
    pub values: Vec<f32>,
}

impl DnaChannel {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>, value: f32) -> Self {
        let names: Vec<String> = names.into_iter().map(str::to_string).collect();
        Self {
            values: vec![value; names.len()],
            names,
        }
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        let index = self.names.iter().position(|n| n == name)?;
        self.values.get(index).copied()
    }
}

/// Shape deformation channels by name.
#[derive(Component, Clone, Debug, Default, Deref, DerefMut)]
pub struct DnaChannels(pub HashMap<String, DnaChannel>);

#[derive(Component, Clone, Debug, PartialEq)]
pub struct ExpressionPlayer {
    pub values: Vec<f32>,
}

impl Default for ExpressionPlayer {
    fn default() -> Self {
        Self {
            values: vec![0.0; Expression::COUNT],
        }
    }
}

impl ExpressionPlayer {
    pub fn get(&self, expression: Expression) -> f32 {
        self.values.get(expression.index()).copied().unwrap_or_default()
    }
}

/// Worn slots and the visual entity of each, if it has one.
#[derive(Component, Clone, Debug, Default)]
pub struct Wardrobe {
    pub worn: BTreeMap<String, Option<Entity>>,
}

#[derive(Component, Clone, Debug)]
pub struct WardrobeItem {
    pub slot: String,
}

/// A wardrobe item that was punched off and now flies on its own.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Ejected;

/// How often the character was rebuilt, and what is waiting to be.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct CharacterBuilds {
    pub full: u32,
    pub mesh: u32,
    pub pending: DirtyFlags,
}

// ── Transforms ──────────────────────────────────────────────────────

/// World transform composed from local transforms up the hierarchy, so it
/// is correct even before transform propagation has run.
pub fn world_transform(world: &World, entity: Entity) -> Transform {
    let mut transform = world.get::<Transform>(entity).copied().unwrap_or_default();
    let mut current = entity;
    while let Some(parent) = world.get::<ChildOf>(current).map(ChildOf::parent) {
        let parent_transform = world.get::<Transform>(parent).copied().unwrap_or_default();
        transform = parent_transform.mul_transform(transform);
        current = parent;
    }
    transform
}

/// `world` expressed in the space of `parent`.
pub fn relative_to(parent: &Transform, world: &Transform) -> Transform {
    let inverse = parent.rotation.inverse();
    let scale = parent.scale.max(Vec3::splat(f32::EPSILON));
    Transform {
        translation: inverse * (world.translation - parent.translation) / scale,
        rotation: inverse * world.rotation,
        scale: world.scale / scale,
    }
}

pub fn descendants(world: &World, root: Entity) -> Vec<Entity> {
    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(entity) = stack.pop() {
        if let Some(children) = world.get::<Children>(entity) {
            for child in children.iter() {
                found.push(child);
                stack.push(child);
            }
        }
    }
    found
}

// ── World adapter ───────────────────────────────────────────────────

/// One patient seen through the shared host traits.
///
/// Stateful parts of the patient ([`DamageState`], [`Ragdoll`], the hit
/// router) are lifted off the entity with [`PatientWorld::scoped`] while they
/// run, so the rest of the world stays reachable from the host calls.
pub struct PatientWorld<'w> {
    world: &'w mut World,
    patient: Entity,
}

impl<'w> PatientWorld<'w> {
    pub fn new(world: &'w mut World, patient: Entity) -> Self {
        Self { world, patient }
    }

    pub fn patient(&self) -> Entity {
        self.patient
    }

    pub fn world(&self) -> &World {
        self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.world
    }

    pub fn bone(&self, name: &str) -> Option<Entity> {
        self.world.get::<Bones>(self.patient)?.get(name).copied()
    }

    pub fn renderer(&self, name: &str) -> Option<Entity> {
        descendants(self.world, self.patient)
            .into_iter()
            .find(|&e| self.world.get::<Renderer>(e).is_some_and(|r| r.name == name))
    }

    /// Run `f` with component `C` taken off the patient. `None` when the
    /// patient has no `C`.
    pub fn scoped<C: Component, R>(&mut self, f: impl FnOnce(&mut C, &mut Self) -> R) -> Option<R> {
        let mut component = self.world.get_entity_mut(self.patient).ok()?.take::<C>()?;
        let out = f(&mut component, self);
        match self.world.get_entity_mut(self.patient) {
            Ok(mut entity) => {
                entity.insert(component);
            }
            Err(_) => warn!("patient {} was despawned while being updated", self.patient),
        }
        Some(out)
    }

    fn dna(&self) -> Option<&DnaChannels> {
        self.world.get::<DnaChannels>(self.patient)
    }
}

impl MaterialHost for PatientWorld<'_> {
    type Material = MaterialSlot;

    fn find_material(&self, renderer: &str, shader: &str) -> Option<(usize, MaterialSlot)> {
        let entity = self.renderer(renderer)?;
        let index = self
            .world
            .get::<Renderer>(entity)?
            .materials
            .iter()
            .position(|m| m.shader == shader)?;
        Some((
            index,
            MaterialSlot {
                renderer: entity,
                index,
            },
        ))
    }

    fn set_material_float(&mut self, material: &MaterialSlot, param: &str, value: f32) {
        let Some(mut renderer) = self.world.get_mut::<Renderer>(material.renderer) else {
            return;
        };
        if let Some(slot) = renderer.materials.get_mut(material.index) {
            slot.floats.insert(param.to_string(), value);
        }
    }
}

impl DeformationHost for PatientWorld<'_> {
    fn dna_len(&self, channel: &str) -> Option<usize> {
        self.dna()?.get(channel).map(|c| c.values.len())
    }

    fn dna_index(&self, channel: &str, parameter: &str) -> Option<usize> {
        self.dna()?.get(channel)?.names.iter().position(|n| n == parameter)
    }

    fn dna_value(&self, channel: &str, index: usize) -> Option<f32> {
        self.dna()?.get(channel)?.values.get(index).copied()
    }

    fn set_dna_value(&mut self, channel: &str, index: usize, value: f32) {
        let Some(mut dna) = self.world.get_mut::<DnaChannels>(self.patient) else {
            return;
        };
        if let Some(slot) = dna.get_mut(channel).and_then(|c| c.values.get_mut(index)) {
            *slot = value;
        }
    }

    fn mark_dirty(&mut self, flags: DirtyFlags) {
        let Some(mut builds) = self.world.get_mut::<CharacterBuilds>(self.patient) else {
            return;
        };
        builds.pending.mesh |= flags.mesh;
        builds.pending.slots |= flags.slots;
        builds.pending.textures |= flags.textures;
    }
}

impl ExpressionHost for PatientWorld<'_> {
    fn expression_values(&self) -> Option<Vec<f32>> {
        self.world
            .get::<ExpressionPlayer>(self.patient)
            .map(|p| p.values.clone())
    }

    fn set_expression_values(&mut self, values: &[f32]) {
        if let Some(mut player) = self.world.get_mut::<ExpressionPlayer>(self.patient) {
            player.values.clear();
            player.values.extend_from_slice(values);
        }
    }
}

impl WardrobeHost for PatientWorld<'_> {
    fn worn_slots(&self) -> Vec<String> {
        self.world
            .get::<Wardrobe>(self.patient)
            .map(|w| w.worn.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn eject(&mut self, slot: &str, impulse: Vec3, at: Vec3) -> bool {
        let visual = self
            .world
            .get::<Wardrobe>(self.patient)
            .and_then(|w| w.worn.get(slot).copied().flatten());
        let Some(item) = visual else {
            return false;
        };
        let transform = world_transform(self.world, item);
        let Ok(mut entity) = self.world.get_entity_mut(item) else {
            return false;
        };
        let ball = ColliderShape::Sphere {
            radius: EJECTED_ITEM_RADIUS,
        };
        let body = MassProperties::from_colliders(EJECTED_ITEM_MASS, &[ColliderSpec::new(Vec3::ZERO, ball)]);
        let (linear, angular) = body.velocity_change(
            impulse,
            at,
            ForceMode::Impulse,
            0.0,
            transform.translation,
            transform.rotation,
        );
        entity.remove::<ChildOf>().insert((
            transform,
            Ejected,
            RigidBody::Dynamic,
            Mass(EJECTED_ITEM_MASS),
            LinearVelocity(linear),
            AngularVelocity(angular),
        ));
        if !entity.contains::<Collider>() {
            entity.insert(Collider::sphere(EJECTED_ITEM_RADIUS));
        }
        debug!("'{slot}' knocked off with impulse {impulse}");
        true
    }

    fn clear_slot(&mut self, slot: &str) {
        if let Some(mut wardrobe) = self.world.get_mut::<Wardrobe>(self.patient) {
            wardrobe.worn.remove(slot);
        }
    }

    fn build_character(&mut self) {
        self.mark_dirty(DirtyFlags {
            mesh: true,
            slots: true,
            textures: true,
        });
    }
}

// ── Lifecycle ───────────────────────────────────────────────────────

fn on_phase_changed(on: On<CharacterPhaseChanged>, mut commands: Commands) {
    let event = *on.event();
    commands.queue(move |world: &mut World| run_phase(world, event.patient, event.phase));
}

/// Hand `phase` to the ragdoll and then to the damage state.
pub fn run_phase(world: &mut World, patient: Entity, phase: CharacterPhase) {
    let mut host = PatientWorld::new(world, patient);
    let built = host.scoped::<Ragdoll, _>(|rig, host| {
        // only the first creation builds the rig
        if phase == CharacterPhase::Created && rig.is_built() {
            return false;
        }
        rig.0.on_phase(phase, host);
        phase == CharacterPhase::Created
    });
    host.scoped::<DamageState, _>(|state, host| state.0.on_phase(phase, host));
    if built == Some(true) {
        ragdoll::tag_hit_areas(world, patient);
    }
}

fn on_rebuild_requested(on: On<RebuildRequested>, mut commands: Commands) {
    let event = *on.event();
    commands.queue(move |world: &mut World| rebuild(world, event.patient, event.kind));
}

/// Regenerate the character. A full build hands out fresh material
/// instances and counts as a new creation; a mesh update re-poses.
pub fn rebuild(world: &mut World, patient: Entity, kind: Rebuild) {
    let Some(mut builds) = world.get_mut::<CharacterBuilds>(patient) else {
        debug!("{patient} has no character to rebuild");
        return;
    };
    builds.pending = DirtyFlags::default();
    match kind {
        Rebuild::None => {}
        Rebuild::Mesh => {
            builds.mesh += 1;
            run_phase(world, patient, CharacterPhase::PoseBegin);
            run_phase(world, patient, CharacterPhase::PoseEnd);
        }
        Rebuild::Full => {
            builds.full += 1;
            for renderer in descendants(world, patient) {
                if let Some(mut renderer) = world.get_mut::<Renderer>(renderer) {
                    for material in &mut renderer.materials {
                        material.floats.clear();
                    }
                }
            }
            run_phase(world, patient, CharacterPhase::Created);
        }
    }
}
