//! Punch resolution.
//!
//! Punch chain:  [`Punch`] → [`Punched`] → [`RebuildRequested`]
//! Health chain: [`Punched`] → [`KnockedOut`] + [`ReadyForPunch`]
//!
//! [`RebuildRequested`]: crate::character::RebuildRequested
//! [`KnockedOut`]: crate::ragdoll::KnockedOut
//! [`ReadyForPunch`]: crate::patient::ReadyForPunch

use bevy::prelude::*;
use knockout_shared::rng::{Roll, ScriptedRolls, SeededRolls};
use knockout_shared::{CharacterDamageState, HitEvent};
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;

use crate::character::{MaterialSlot, PatientWorld, RebuildRequested};
use crate::effects::HitRouter;
use crate::patient::{self, Patient, PatientVitals};

pub fn plugin(app: &mut App) {
    app.init_resource::<HitRolls>()
        .add_observer(on_punch)
        .add_observer(on_punched);
}

// ── Events ──────────────────────────────────────────────────────────

/// Intent: something struck `collider` at `position`.
/// Resolved into [`Punched`] when the collider belongs to a patient area.
#[derive(Event, Clone, Debug)]
pub struct Punch {
    pub collider: Entity,
    pub position: Vec3,
    pub normal: Vec3,
    /// Punch strength, expected in [0, 1].
    pub force: f32,
}

/// Mutation: a patient area took a hit.
#[derive(Event, Clone, Debug)]
pub struct Punched {
    pub patient: Entity,
    pub area_id: String,
    pub position: Vec3,
    pub normal: Vec3,
    pub force: f32,
}

impl Punched {
    pub fn hit(&self) -> HitEvent {
        HitEvent::new(self.area_id.clone(), self.position, self.normal, self.force)
    }
}

// ── Components ──────────────────────────────────────────────────────

/// Damage area reported when this collider is struck.
#[derive(Component, Clone, Debug, PartialEq, Eq, Deref)]
pub struct HitArea(pub String);

#[derive(Component, Debug, Deref, DerefMut)]
pub struct DamageState(pub CharacterDamageState<MaterialSlot>);

/// Where effect rules draw their probability rolls from.
#[derive(Resource, Debug)]
pub enum HitRolls {
    Random(StdRng),
    Seeded(SeededRolls),
    Scripted(ScriptedRolls),
}

impl Default for HitRolls {
    fn default() -> Self {
        Self::Random(StdRng::from_os_rng())
    }
}

impl Roll for HitRolls {
    fn roll(&mut self) -> f32 {
        match self {
            Self::Random(rng) => rng.roll(),
            Self::Seeded(rolls) => rolls.roll(),
            Self::Scripted(rolls) => rolls.roll(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("{0} has no hit area")]
    NoArea(Entity),
    #[error("{0} is not part of a patient")]
    NoPatient(Entity),
}

// ── Resolution ──────────────────────────────────────────────────────

/// Find the area and the patient a struck entity belongs to. The nearest
/// [`HitArea`] and [`Patient`] up the hierarchy win.
pub fn resolve_target(world: &World, collider: Entity) -> Result<(Entity, String), TargetError> {
    let mut area = None;
    let mut current = Some(collider);
    while let Some(entity) = current {
        if area.is_none() {
            area = world.get::<HitArea>(entity).map(|a| a.0.clone());
        }
        if world.get::<Patient>(entity).is_some() {
            return area.map(|area| (entity, area)).ok_or(TargetError::NoArea(collider));
        }
        current = world.get::<ChildOf>(entity).map(ChildOf::parent);
    }
    Err(TargetError::NoPatient(collider))
}

fn on_punch(on: On<Punch>, mut commands: Commands) {
    let punch = on.event().clone();
    commands.queue(move |world: &mut World| match resolve_target(world, punch.collider) {
        Ok((patient, area_id)) => world.trigger(Punched {
            patient,
            area_id,
            position: punch.position,
            normal: punch.normal,
            force: punch.force,
        }),
        Err(err) => debug!("punch ignored: {err}"),
    });
}

fn on_punched(on: On<Punched>, mut commands: Commands) {
    let punched = on.event().clone();
    commands.queue(move |world: &mut World| resolve_punch(world, &punched));
}

/// Run a landed punch through the effect rules, the character damage and
/// the patient's health, in that order.
pub fn resolve_punch(world: &mut World, punched: &Punched) {
    let patient = punched.patient;
    let Some(vitals) = world.get::<PatientVitals>(patient) else {
        warn!("{patient} was punched but is not a patient");
        return;
    };
    if !vitals.is_ready() {
        debug!("{patient} is not ready for a punch");
        return;
    }

    let hit = punched.hit();
    let mut rolls = world.remove_resource::<HitRolls>().unwrap_or_default();
    let report = PatientWorld::new(world, patient)
        .scoped::<HitRouter, _>(|router, host| router.apply(&hit, &mut rolls, host));
    world.insert_resource(rolls);

    let Some(report) = report else {
        warn!("{patient} has no hit router");
        return;
    };
    debug!(
        "'{}' hit at {:.2}: rules {:?}, {} spawned, rebuild {:?}",
        hit.area_id,
        hit.clamped_force(),
        report.fired,
        report.spawned,
        report.rebuild
    );
    if report.rebuild.is_needed() {
        world.trigger(RebuildRequested {
            patient,
            kind: report.rebuild,
        });
    }
    patient::take_hit(world, patient, hit.clamped_force());
}
