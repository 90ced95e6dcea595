use std::time::Duration;

use avian3d::prelude::*;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use knockout::animation::Animator;
use knockout::audio::HitSounds;
use knockout::character::{
    Bones, CharacterBuilds, DnaChannels, Ejected, ExpressionPlayer, Renderer, Wardrobe,
};
use knockout::damage::{resolve_target, HitArea, HitRolls, TargetError};
use knockout::effects::{EffectPrototype, EffectPrototypes, HitEffect, Parked};
use knockout::humanoid::{self, SHAPE_BASELINE};
use knockout::patient::{Healed, PatientCommands, PatientSettings, PatientVitals, ReadyForPunch};
use knockout::ragdoll::{
    Cloth, KnockedOut, Ragdoll, RagdollCollider, RagdollJoint, Recovered, UpdateWhenOffscreen,
};
use knockout::time_scale::{SlowMotionClock, SlowMotionRequested};
use knockout_shared::expression::Expression;
use knockout_shared::rng::ScriptedRolls;

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Resource, Default)]
struct Seen {
    knockouts: Vec<Vec3>,
    ready: Vec<bool>,
    healed: usize,
    recovered: usize,
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

/// Headless app with the patient plugin, effect prototypes and rolls that
/// always come out as `roll`.
fn test_app(roll: f32) -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, knockout::plugin))
        .insert_resource(HitRolls::Scripted(ScriptedRolls::constant(roll)))
        .insert_resource(
            EffectPrototypes::default()
                .with("stars", EffectPrototype::default())
                .with(
                    "tooth",
                    EffectPrototype {
                        scale: Vec3::splat(0.02),
                        sensor_radius: Some(0.01),
                    },
                ),
        )
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(200)))
        .init_resource::<Seen>()
        .add_observer(|on: On<KnockedOut>, mut seen: ResMut<Seen>| {
            seen.knockouts.push(on.event().impulse)
        })
        .add_observer(|on: On<ReadyForPunch>, mut seen: ResMut<Seen>| {
            seen.ready.push(on.event().ready)
        })
        .add_observer(|_: On<Healed>, mut seen: ResMut<Seen>| seen.healed += 1)
        .add_observer(|_: On<Recovered>, mut seen: ResMut<Seen>| seen.recovered += 1);
    app
}

/// Observers answer with queued commands, which may queue more.
fn settle(app: &mut App) {
    for _ in 0..4 {
        app.world_mut().flush();
    }
}

fn spawn_patient(app: &mut App) -> Entity {
    let config = app.world().resource::<PatientSettings>().0.clone();
    let patient = app
        .world_mut()
        .commands()
        .spawn_patient(&config, Transform::default());
    settle(app);
    patient
}

fn bone(app: &App, patient: Entity, name: &str) -> Entity {
    app.world().get::<Bones>(patient).unwrap()[name]
}

/// The first ragdoll collider on bone `name`.
fn collider_on(app: &mut App, patient: Entity, name: &str) -> Entity {
    let bone = bone(app, patient, name);
    let world = app.world_mut();
    world
        .query::<(Entity, &RagdollCollider)>()
        .iter(world)
        .find(|(_, c)| c.bone == bone)
        .map(|(e, _)| e)
        .unwrap()
}

fn punch(app: &mut App, patient: Entity, bone_name: &str, force: f32) {
    let collider = collider_on(app, patient, bone_name);
    let position = app
        .world()
        .get::<Transform>(bone(app, patient, bone_name))
        .map(|t| t.translation)
        .unwrap();
    app.world_mut()
        .commands()
        .punch(collider, position, Vec3::Z, force);
    settle(app);
}

fn renderer_float(app: &mut App, name: &str, slot: usize, param: &str) -> Option<f32> {
    let world = app.world_mut();
    world
        .query::<&Renderer>()
        .iter(world)
        .find(|r| r.name == name)
        .and_then(|r| r.materials[slot].float(param))
}

fn shape(app: &App, patient: Entity, channel: &str, name: &str) -> f32 {
    app.world().get::<DnaChannels>(patient).unwrap()[channel]
        .get(name)
        .unwrap()
}

fn health(app: &App, patient: Entity) -> f32 {
    app.world().get::<PatientVitals>(patient).unwrap().health()
}

fn effects(app: &mut App, prototype: &str) -> Vec<Entity> {
    let world = app.world_mut();
    world
        .query::<(Entity, &HitEffect)>()
        .iter(world)
        .filter(|(_, e)| e.prototype == prototype)
        .map(|(e, _)| e)
        .collect()
}

fn body_of(app: &App, patient: Entity, name: &str) -> RigidBody {
    *app.world().get::<RigidBody>(bone(app, patient, name)).unwrap()
}

// ── Spawning ────────────────────────────────────────────────────────

#[test]
fn spawned_patient_has_rigged_model() {
    let mut app = test_app(0.0);
    let patient = spawn_patient(&mut app);

    let bones = app.world().get::<Bones>(patient).unwrap();
    assert_eq!(bones.len(), humanoid::SKELETON.len());
    assert!(app.world().get::<Ragdoll>(patient).unwrap().is_built());

    let world = app.world_mut();
    assert_eq!(world.query::<&RagdollCollider>().iter(world).count(), 13);
    assert_eq!(world.query::<&RagdollJoint>().iter(world).count(), 12);
    // legs carry no area
    assert_eq!(world.query::<&HitArea>().iter(world).count(), 9);

    let cloth = world.query::<&Cloth>().single(world).unwrap();
    assert_eq!(cloth.sphere_pairs.len(), 2);
    assert_eq!(cloth.capsules.len(), 8);

    assert_eq!(body_of(&app, patient, "Hips"), RigidBody::Kinematic);
    assert!(app.world().get::<UpdateWhenOffscreen>(patient).is_none());
    assert!(app.world().get::<Animator>(patient).unwrap().enabled);
    assert_eq!(shape(&app, patient, "head", "noseFlatten"), SHAPE_BASELINE);
}

#[test]
fn punch_targets_resolve_through_the_hierarchy() {
    let mut app = test_app(0.0);
    let patient = spawn_patient(&mut app);
    let head = collider_on(&mut app, patient, "Head");
    let leg = collider_on(&mut app, patient, "LeftUpperLeg");
    let stray = app.world_mut().spawn(Transform::default()).id();

    let world = app.world();
    assert_eq!(resolve_target(world, head), Ok((patient, "head".to_string())));
    assert_eq!(resolve_target(world, leg), Err(TargetError::NoArea(leg)));
    assert_eq!(resolve_target(world, stray), Err(TargetError::NoPatient(stray)));
}

#[test]
fn punches_off_the_patient_are_ignored() {
    let mut app = test_app(0.0);
    let patient = spawn_patient(&mut app);
    let leg = collider_on(&mut app, patient, "LeftLowerLeg");
    app.world_mut().commands().punch(leg, Vec3::ZERO, Vec3::Z, 1.0);
    settle(&mut app);

    assert_eq!(health(&app, patient), 100.0);
    assert!(app.world().resource::<HitSounds>().queued().is_empty());
}

// ── Damage ──────────────────────────────────────────────────────────

#[test]
fn heavy_head_punch_runs_every_layer() {
    let mut app = test_app(0.0);
    let patient = spawn_patient(&mut app);
    punch(&mut app, patient, "Head", 0.8);

    // effect rule for heavy head hits
    let animator = app.world().get::<Animator>(patient).unwrap();
    assert!(animator.is_triggered("hit"));
    assert_eq!(animator.flag("dizzy"), Some(true));
    assert!(close(animator.float("force").unwrap(), 0.8));
    assert_eq!(app.world().resource::<HitSounds>().queued(), ["punch_heavy".to_string()]);
    assert!(close(app.world().resource::<SlowMotionClock>().scale(), 0.4));

    let stars = effects(&mut app, "stars");
    assert_eq!(stars.len(), 1);
    let head = bone(&app, patient, "Head");
    assert_eq!(app.world().get::<ChildOf>(stars[0]).map(ChildOf::parent), Some(head));
    assert!(app.world().get::<Parked>(stars[0]).is_none());

    // bruise, shapes and expression
    assert!(close(renderer_float(&mut app, "Face", 1, "damage").unwrap(), 0.2));
    assert!(close(shape(&app, patient, "head", "noseFlatten"), 0.66));
    assert!(close(shape(&app, patient, "head", "foreheadSize"), 0.62));
    assert_eq!(shape(&app, patient, "head", "earsSize"), SHAPE_BASELINE);
    let player = app.world().get::<ExpressionPlayer>(patient).unwrap();
    assert!(close(player.get(Expression::LeftEyeOpenClose), -0.24));

    // health
    assert_eq!(health(&app, patient), 80.0);
    assert!(close(animator_health(&app, patient), 0.8));
}

fn animator_health(app: &App, patient: Entity) -> f32 {
    app.world()
        .get::<Animator>(patient)
        .and_then(|a| a.float("health"))
        .unwrap()
}

#[test]
fn helmet_flies_off_and_forces_a_full_rebuild() {
    let mut app = test_app(0.0);
    let patient = spawn_patient(&mut app);
    let helmet = app.world().get::<Wardrobe>(patient).unwrap().worn["Helmet"].unwrap();

    // below the punch-off threshold
    punch(&mut app, patient, "Chest", 0.2);
    assert!(app.world().get::<Ejected>(helmet).is_none());
    assert_eq!(app.world().get::<CharacterBuilds>(patient).unwrap().full, 0);

    punch(&mut app, patient, "Chest", 0.5);
    assert!(app.world().get::<Ejected>(helmet).is_some());
    assert!(app.world().get::<ChildOf>(helmet).is_none());
    assert_eq!(app.world().get::<RigidBody>(helmet), Some(&RigidBody::Dynamic));
    // struck far below its centre, the helmet flips over
    let spin = app.world().get::<AngularVelocity>(helmet).unwrap().0;
    assert!(spin.x > 1.0, "{spin}");
    assert!(spin.y.abs() < 1e-3 && spin.z.abs() < 1e-3, "{spin}");
    let wardrobe = app.world().get::<Wardrobe>(patient).unwrap();
    assert!(!wardrobe.worn.contains_key("Helmet"));
    assert!(wardrobe.worn.contains_key("Shirt"));

    let builds = app.world().get::<CharacterBuilds>(patient).unwrap();
    assert_eq!(builds.full, 1);
    assert_eq!(builds.pending, Default::default());

    // the rebuild cleared the renderer, the damage state rewrote its value
    assert!(close(renderer_float(&mut app, "Body", 1, "damage").unwrap(), 0.105));
    // the rig was not rebuilt
    let world = app.world_mut();
    assert_eq!(world.query::<&RagdollCollider>().iter(world).count(), 13);
}

#[test]
fn head_and_jaw_share_one_bruise() {
    let mut app = test_app(0.99);
    let patient = spawn_patient(&mut app);
    punch(&mut app, patient, "Head", 0.4);
    punch(&mut app, patient, "Jaw", 0.6);

    assert!(close(renderer_float(&mut app, "Face", 1, "damage").unwrap(), 0.25));
    assert!(close(shape(&app, patient, "head", "jawsSize"), 0.62));
    let player = app.world().get::<ExpressionPlayer>(patient).unwrap();
    assert!(close(player.get(Expression::JawOpenClose), 0.3));
    // the tooth rule needs a lucky roll
    assert!(effects(&mut app, "tooth").is_empty());
}

#[test]
fn hard_jaw_punch_knocks_a_tooth_loose() {
    let mut app = test_app(0.0);
    let patient = spawn_patient(&mut app);
    punch(&mut app, patient, "Jaw", 0.7);

    let teeth = effects(&mut app, "tooth");
    assert_eq!(teeth.len(), 1);
    let tooth = teeth[0];
    assert!(app.world().get::<ChildOf>(tooth).is_none());
    assert!(app.world().get::<Sensor>(tooth).is_some());
    let jaw = app.world().get::<Transform>(bone(&app, patient, "Jaw")).unwrap().translation;
    let at = app.world().get::<Transform>(tooth).unwrap().translation;
    assert!(at.distance(jaw) < 1e-4);
}

#[test]
fn spawned_effects_go_back_to_their_pool() {
    let mut app = test_app(0.0);
    let patient = spawn_patient(&mut app);
    punch(&mut app, patient, "Head", 0.3);

    let stars = effects(&mut app, "stars");
    assert_eq!(stars.len(), 1);
    assert!(app.world().get::<Parked>(stars[0]).is_none());

    // released after two seconds of game time
    for _ in 0..20 {
        app.update();
    }
    assert!(app.world().get::<Parked>(stars[0]).is_some());
    assert!(app.world().get::<ChildOf>(stars[0]).is_none());

    // reused rather than spawned again
    punch(&mut app, patient, "Head", 0.3);
    assert_eq!(effects(&mut app, "stars"), stars);
    assert!(app.world().get::<Parked>(stars[0]).is_none());
}

// ── Knockout ────────────────────────────────────────────────────────

#[test]
fn zero_health_knocks_the_patient_out() {
    let mut app = test_app(0.0);
    let patient = spawn_patient(&mut app);
    for _ in 0..3 {
        punch(&mut app, patient, "Chest", 1.0);
    }
    assert_eq!(health(&app, patient), 25.0);
    assert!(app.world().resource::<Seen>().knockouts.is_empty());

    punch(&mut app, patient, "Chest", 1.0);
    let seen = app.world().resource::<Seen>();
    assert_eq!(seen.knockouts, [Vec3::new(0.0, 60.0, -120.0)]);
    assert_eq!(seen.ready, [false]);

    assert_eq!(body_of(&app, patient, "Hips"), RigidBody::Dynamic);
    assert_eq!(body_of(&app, patient, "Head"), RigidBody::Dynamic);
    assert!(app.world().get::<UpdateWhenOffscreen>(patient).is_some());
    assert!(!app.world().get::<Animator>(patient).unwrap().enabled);
    assert!(close(app.world().resource::<SlowMotionClock>().scale(), 0.2));

    // the impulse lands on the root body
    let hips = bone(&app, patient, "Hips");
    let velocity = app.world().get::<LinearVelocity>(hips).unwrap();
    assert!(velocity.0.distance(Vec3::new(0.0, 5.0, -10.0)) < 1e-4);
    // thrown at the chest, 0.3 above the hips' centre of mass, so it tips over
    let spin = app.world().get::<AngularVelocity>(hips).unwrap().0;
    assert!(spin.distance(Vec3::new(-450.0, 0.0, 0.0)) < 0.5, "{spin}");

    // knocked out patients take no more punches
    let bruise = renderer_float(&mut app, "Body", 1, "damage");
    punch(&mut app, patient, "Chest", 1.0);
    assert_eq!(renderer_float(&mut app, "Body", 1, "damage"), bruise);
    assert_eq!(app.world().resource::<Seen>().knockouts.len(), 1);
}

#[test]
fn heal_and_recover_restore_the_patient() {
    let mut app = test_app(0.0);
    let patient = spawn_patient(&mut app);
    punch(&mut app, patient, "Head", 0.8);
    for _ in 0..4 {
        punch(&mut app, patient, "Chest", 1.0);
    }
    assert_eq!(app.world().resource::<Seen>().knockouts.len(), 1);

    app.world_mut().commands().heal_patient(patient);
    settle(&mut app);
    assert_eq!(health(&app, patient), 100.0);
    assert!(close(animator_health(&app, patient), 1.0));
    assert_eq!(renderer_float(&mut app, "Face", 1, "damage"), Some(0.0));
    assert_eq!(renderer_float(&mut app, "Body", 1, "damage"), Some(0.0));
    assert_eq!(shape(&app, patient, "head", "noseFlatten"), SHAPE_BASELINE);
    let player = app.world().get::<ExpressionPlayer>(patient).unwrap();
    assert_eq!(player.get(Expression::LeftEyeOpenClose), 0.0);
    // healing does not put the helmet back on
    assert!(!app.world().get::<Wardrobe>(patient).unwrap().worn.contains_key("Helmet"));

    let seen = app.world().resource::<Seen>();
    assert_eq!(seen.healed, 1);
    assert_eq!(seen.ready, [false, true]);

    app.world_mut().commands().recover_patient(patient);
    settle(&mut app);
    assert_eq!(app.world().resource::<Seen>().recovered, 1);
    assert_eq!(body_of(&app, patient, "Hips"), RigidBody::Kinematic);
    assert!(app.world().get::<Animator>(patient).unwrap().enabled);
    assert!(app.world().get::<UpdateWhenOffscreen>(patient).is_none());
    // snapped under the root bone, still on the floor
    let at = app.world().get::<Transform>(patient).unwrap().translation;
    assert_eq!(at, Vec3::ZERO);

    // punchable again
    punch(&mut app, patient, "Chest", 0.4);
    assert_eq!(health(&app, patient), 90.0);
}

#[test]
fn slow_motion_drives_virtual_time() {
    let mut app = test_app(0.0);
    app.world_mut().trigger(SlowMotionRequested {
        scale: 0.5,
        duration: 1.0,
    });
    app.update();
    assert_eq!(app.world().resource::<Time<Virtual>>().relative_speed(), 0.5);

    for _ in 0..10 {
        app.update();
    }
    assert_eq!(app.world().resource::<SlowMotionClock>().active(), 0);
    assert_eq!(app.world().resource::<Time<Virtual>>().relative_speed(), 1.0);
}

#[test]
fn despawning_takes_the_effects_along() {
    let mut app = test_app(0.0);
    let patient = spawn_patient(&mut app);
    punch(&mut app, patient, "Head", 0.8);
    punch(&mut app, patient, "Jaw", 0.7);
    let spawned: Vec<Entity> = [effects(&mut app, "stars"), effects(&mut app, "tooth")].concat();
    assert_eq!(spawned.len(), 2);

    app.world_mut().commands().despawn_patient(patient);
    settle(&mut app);
    assert!(app.world().get_entity(patient).is_err());
    for effect in spawned {
        assert!(app.world().get_entity(effect).is_err());
    }
}
