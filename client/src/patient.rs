//! The punchable patient: spawning, health, healing.
//!
//! Heal chain: [`Heal`] → [`Healed`] + [`ReadyForPunch`] + [`RebuildRequested`]
//!
//! [`RebuildRequested`]: crate::character::RebuildRequested

use bevy::prelude::*;
use easy_ext::ext;
use knockout_shared::lifecycle::CharacterPhase;
use knockout_shared::patient::{ForceMeter, HitOutcome, Vitals, VitalsConfig};
use knockout_shared::router::AnimationSink;
use knockout_shared::{CharacterDamageState, PatientConfig};

use crate::animation::Animator;
use crate::character::{CharacterBuilds, CharacterPhaseChanged, PatientWorld, RebuildRequested};
use crate::damage::{DamageState, Punch};
use crate::effects::{despawn_effects, HitRouter};
use crate::humanoid;
use crate::ragdoll::{self, Ragdoll};

pub const PATIENT_CONFIG_PATH: &str = "assets/patient.ron";

pub fn plugin(app: &mut App) {
    app.insert_resource(PatientSettings::load())
        .init_resource::<PunchMeter>()
        .add_observer(on_heal)
        .add_systems(Update, tick_punch_meter);
}

// ── Events ──────────────────────────────────────────────────────────

/// Intent: restore the patient to full health and undo its damage.
#[derive(Event, Clone, Copy, Debug)]
pub struct Heal {
    pub patient: Entity,
}

/// Feedback: health, materials, shapes and expressions are back to baseline.
#[derive(Event, Clone, Copy, Debug)]
pub struct Healed {
    pub patient: Entity,
}

/// Feedback: punches are accepted again, or no longer.
#[derive(Event, Clone, Copy, Debug)]
pub struct ReadyForPunch {
    pub patient: Entity,
    pub ready: bool,
}

// ── Components ──────────────────────────────────────────────────────

#[derive(Component, Clone, Copy, Debug, Default)]
#[require(Transform)]
pub struct Patient;

#[derive(Component, Clone, Debug, Deref, DerefMut)]
pub struct PatientVitals {
    #[deref]
    pub vitals: Vitals,
    pub config: VitalsConfig,
}

impl PatientVitals {
    pub fn new(config: VitalsConfig) -> Self {
        Self {
            vitals: Vitals::new(&config),
            config,
        }
    }
}

// ── Resources ───────────────────────────────────────────────────────

/// Patient configuration, read once from [`PATIENT_CONFIG_PATH`].
#[derive(Resource, Clone, Debug, Default, Deref)]
pub struct PatientSettings(pub PatientConfig);

impl PatientSettings {
    pub fn load() -> Self {
        match PatientConfig::load(PATIENT_CONFIG_PATH) {
            Ok(config) => {
                info!("Loaded patient config from '{PATIENT_CONFIG_PATH}'");
                for issue in config.validate() {
                    warn!("patient config: {issue}");
                }
                Self(config)
            }
            Err(e) => {
                warn!("Failed to load '{PATIENT_CONFIG_PATH}', using defaults: {e}");
                Self::default()
            }
        }
    }
}

/// The oscillating punch strength gauge.
#[derive(Resource, Clone, Debug, Default)]
pub struct PunchMeter {
    pub meter: ForceMeter,
    pub elapsed: f32,
}

impl PunchMeter {
    pub fn force(&self) -> f32 {
        self.meter.force(self.elapsed)
    }
}

fn tick_punch_meter(time: Res<Time>, mut meter: ResMut<PunchMeter>) {
    meter.elapsed += time.delta_secs();
}

// ── Spawning ────────────────────────────────────────────────────────

/// Everything a patient entity carries apart from its model.
pub fn patient_bundle(config: &PatientConfig) -> impl Bundle {
    (
        Name::new("Patient"),
        Patient,
        PatientVitals::new(config.vitals.clone()),
        DamageState(CharacterDamageState::new(
            config.areas.clone(),
            config.punch_off.clone(),
        )),
        HitRouter(knockout_shared::DamageRouter::new(config.rules.clone())),
        Ragdoll::new(config.ragdoll.elements.clone(), config.ragdoll.on_start),
        Animator::default(),
        CharacterBuilds::default(),
    )
}

#[ext(PatientCommands)]
impl Commands<'_, '_> {
    /// Spawn a patient with the procedural humanoid model and announce its
    /// creation once the model exists.
    pub fn spawn_patient(&mut self, config: &PatientConfig, transform: Transform) -> Entity {
        let patient = self.spawn((patient_bundle(config), transform)).id();
        self.queue(move |world: &mut World| {
            humanoid::build(world, patient);
            world.trigger(CharacterPhaseChanged {
                patient,
                phase: CharacterPhase::Created,
            });
        });
        patient
    }

    pub fn punch(&mut self, collider: Entity, position: Vec3, normal: Vec3, force: f32) {
        self.trigger(Punch {
            collider,
            position,
            normal,
            force,
        });
    }

    pub fn heal_patient(&mut self, patient: Entity) {
        self.trigger(Heal { patient });
    }

    pub fn recover_patient(&mut self, patient: Entity) {
        self.trigger(ragdoll::Recover { patient });
    }

    /// Despawn the patient together with every effect it ever spawned.
    pub fn despawn_patient(&mut self, patient: Entity) {
        self.queue(move |world: &mut World| {
            despawn_effects(world, patient);
            if let Ok(entity) = world.get_entity_mut(patient) {
                entity.despawn();
            }
        });
    }
}

// ── Health ──────────────────────────────────────────────────────────

/// Charge `force` against the patient's health and knock it out at zero.
pub fn take_hit(world: &mut World, patient: Entity, force: f32) {
    let Some(mut vitals) = world.get_mut::<PatientVitals>(patient) else {
        return;
    };
    let PatientVitals { vitals, config } = &mut *vitals;
    let outcome = vitals.take_hit(force, config);
    let (snapshot, config) = (vitals.clone(), config.clone());

    report_health(world, patient, &snapshot, &config);
    match outcome {
        HitOutcome::Ignored => {}
        HitOutcome::Hurt { health } => debug!("{patient} health {health:.1}"),
        HitOutcome::KnockedOut(knockout) => {
            world.trigger(ReadyForPunch {
                patient,
                ready: false,
            });
            ragdoll::knock_out(world, patient, &knockout);
        }
    }
}

fn report_health(world: &mut World, patient: Entity, vitals: &Vitals, config: &VitalsConfig) {
    let mut host = PatientWorld::new(world, patient);
    let animation = host.has_animator().then_some(&mut host as &mut dyn AnimationSink);
    vitals.report(config, animation);
}

fn on_heal(on: On<Heal>, mut commands: Commands) {
    let patient = on.event().patient;
    commands.queue(move |world: &mut World| heal(world, patient));
}

/// Full health, punches back on, damage undone. Ejected wardrobe stays off.
pub fn heal(world: &mut World, patient: Entity) {
    let Some(mut vitals) = world.get_mut::<PatientVitals>(patient) else {
        debug!("{patient} is not a patient, nothing to heal");
        return;
    };
    vitals.heal();
    let (snapshot, config) = (vitals.vitals.clone(), vitals.config.clone());

    let rebuild = PatientWorld::new(world, patient)
        .scoped::<DamageState, _>(|state, host| state.0.heal(host))
        .unwrap_or_default();
    report_health(world, patient, &snapshot, &config);
    if rebuild.is_needed() {
        world.trigger(RebuildRequested {
            patient,
            kind: rebuild,
        });
    }
    world.trigger(ReadyForPunch {
        patient,
        ready: true,
    });
    world.trigger(Healed { patient });
}
