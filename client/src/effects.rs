//! Hit effects: the per-patient rule router and the pooled objects it spawns.

use std::collections::HashMap;

use avian3d::prelude::*;
use bevy::prelude::*;
use knockout_shared::effects::Placement;
use knockout_shared::router::{AnimationSink, AudioSink, HitHost};
use knockout_shared::{DamageRouter, HitEvent, Rebuild, TimeScaleController};

use crate::character::{relative_to, world_transform, PatientWorld};
use crate::damage::DamageState;
use crate::time_scale::SlowMotionClock;

pub fn plugin(app: &mut App) {
    app.init_resource::<EffectPrototypes>()
        .add_systems(Update, release_expired_effects);
}

/// Effect rules of one patient plus the instances they spawned.
#[derive(Component, Debug, Default, Deref, DerefMut)]
pub struct HitRouter(pub DamageRouter<Entity>);

/// What a named spawn prototype looks like once instantiated.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectPrototype {
    pub scale: Vec3,
    /// Sensor sphere so the effect can be found by spatial queries.
    pub sensor_radius: Option<f32>,
}

impl Default for EffectPrototype {
    fn default() -> Self {
        Self {
            scale: Vec3::ONE,
            sensor_radius: None,
        }
    }
}

#[derive(Resource, Clone, Debug, Default, Deref, DerefMut)]
pub struct EffectPrototypes(pub HashMap<String, EffectPrototype>);

impl EffectPrototypes {
    pub fn with(mut self, name: impl Into<String>, prototype: EffectPrototype) -> Self {
        self.0.insert(name.into(), prototype);
        self
    }
}

/// An object spawned by a hit effect.
#[derive(Component, Clone, Debug)]
pub struct HitEffect {
    pub prototype: String,
}

/// Back in its pool, waiting to be reused.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Parked;

impl HitHost for PatientWorld<'_> {
    type Instance = Entity;

    fn animation(&mut self) -> Option<&mut dyn AnimationSink> {
        if !self.has_animator() {
            return None;
        }
        Some(self as &mut dyn AnimationSink)
    }

    fn audio(&mut self) -> Option<&mut dyn AudioSink> {
        if !self.has_audio() {
            return None;
        }
        Some(self as &mut dyn AudioSink)
    }

    fn time_scale(&mut self) -> Option<&mut TimeScaleController> {
        self.world_mut()
            .get_resource_mut::<SlowMotionClock>()
            .map(|clock| &mut clock.into_inner().0)
    }

    fn instantiate(&mut self, prototype: &str) -> Option<Entity> {
        let template = self
            .world()
            .get_resource::<EffectPrototypes>()?
            .get(prototype)?
            .clone();
        let mut entity = self.world_mut().spawn((
            Name::new(format!("Effect ({prototype})")),
            HitEffect {
                prototype: prototype.to_string(),
            },
            Transform::from_scale(template.scale),
            Parked,
        ));
        if let Some(radius) = template.sensor_radius {
            entity.insert((Collider::sphere(radius), Sensor));
        }
        debug!("new '{prototype}' effect instance {}", entity.id());
        Some(entity.id())
    }

    fn place(&mut self, instance: &Entity, placement: &Placement) {
        let scale = self
            .world()
            .get::<Transform>(*instance)
            .map_or(Vec3::ONE, |t| t.scale);
        let transform = Transform {
            translation: placement.world.translation,
            rotation: placement.world.rotation,
            scale,
        };
        let bone = placement.attach_to.as_deref().and_then(|name| self.bone(name));
        let parent_transform = bone.map(|bone| world_transform(self.world(), bone));

        let Ok(mut entity) = self.world_mut().get_entity_mut(*instance) else {
            return;
        };
        entity.remove::<Parked>();
        match (bone, parent_transform) {
            (Some(bone), Some(parent)) => {
                entity.insert((relative_to(&parent, &transform), ChildOf(bone)));
            }
            _ => {
                entity.remove::<ChildOf>().insert(transform);
            }
        }
    }

    fn retire(&mut self, instance: &Entity) {
        if let Ok(mut entity) = self.world_mut().get_entity_mut(*instance) {
            entity.remove::<ChildOf>().insert(Parked);
        }
    }

    fn damage(&mut self, hit: &HitEvent) -> Rebuild {
        self.scoped::<DamageState, _>(|state, host| state.0.damage(hit, host))
            .unwrap_or_else(|| {
                debug!("{} has no damage state", self.patient());
                Rebuild::None
            })
    }
}

/// Return spawned effects whose time is up to their pools. Runs on game
/// time, so slow motion keeps them around longer.
fn release_expired_effects(world: &mut World) {
    let dt = world.get_resource::<Time>().map_or(0.0, Time::delta_secs);
    let patients: Vec<Entity> = world
        .query_filtered::<Entity, With<HitRouter>>()
        .iter(world)
        .collect();
    for patient in patients {
        let mut host = PatientWorld::new(world, patient);
        let released = host.scoped::<HitRouter, _>(|router, host| router.tick(dt, host));
        if let Some(released @ 1..) = released {
            debug!("{released} hit effects returned to their pools");
        }
    }
}

/// Despawn every pooled effect of `patient`, parked or live.
pub fn despawn_effects(world: &mut World, patient: Entity) {
    let mut host = PatientWorld::new(world, patient);
    let instances = host
        .scoped::<HitRouter, _>(|router, _| router.shutdown())
        .unwrap_or_default();
    for instance in instances {
        if let Ok(entity) = world.get_entity_mut(instance) {
            entity.despawn();
        }
    }
}
