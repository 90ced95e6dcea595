//! Headless sandbox: a procedural patient on a floor, punched at the force
//! meter's current strength until it drops, then healed and stood up again.

use std::time::Duration;

use avian3d::prelude::*;
use bevy::{app::ScheduleRunnerPlugin, log, prelude::*};
use knockout::damage::HitArea;
use knockout::effects::{EffectPrototype, EffectPrototypes};
use knockout::patient::{Healed, PatientCommands, PatientSettings, PunchMeter};
use knockout::ragdoll::{KnockedOut, Recovered};
use rand::seq::IndexedRandom;

const PUNCH_INTERVAL: f32 = 0.6;
const RECOVERY_DELAY: f32 = 3.0;
const KNOCKOUTS: u32 = 3;

fn main() -> AppExit {
    let mut app = App::new();

    // DEBUG
    // let filter = "trace,avian3d=info,bevy_ecs=info".to_string();
    let filter = "info,knockout=debug,knockout_shared=debug,avian3d=warn".to_string();
    let log_level = log::LogPlugin {
        level: log::Level::TRACE,
        filter,
        ..Default::default()
    };
    let frame = Duration::from_secs_f64(1.0 / 60.0);

    app.add_plugins((
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(frame)),
        TransformPlugin,
        log_level,
        PhysicsPlugins::default(),
    ));

    app.add_plugins(knockout::plugin)
        .insert_resource(
            EffectPrototypes::default()
                .with(
                    "stars",
                    EffectPrototype {
                        scale: Vec3::splat(0.3),
                        sensor_radius: None,
                    },
                )
                .with(
                    "tooth",
                    EffectPrototype {
                        scale: Vec3::splat(0.02),
                        sensor_radius: Some(0.01),
                    },
                ),
        )
        .init_resource::<Sandbox>()
        .add_systems(Startup, setup)
        .add_systems(Update, (punch_patient, stand_up))
        .add_observer(on_knocked_out)
        .add_observer(on_healed)
        .add_observer(on_recovered);

    app.run()
}

#[derive(Resource)]
struct Sandbox {
    patient: Option<Entity>,
    punch: Timer,
    down_for: Option<f32>,
    knockouts: u32,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self {
            patient: None,
            punch: Timer::from_seconds(PUNCH_INTERVAL, TimerMode::Repeating),
            down_for: None,
            knockouts: 0,
        }
    }
}

fn setup(settings: Res<PatientSettings>, mut sandbox: ResMut<Sandbox>, mut commands: Commands) {
    commands.spawn((
        Name::new("Floor"),
        RigidBody::Static,
        Collider::half_space(Vec3::Y),
        Transform::default(),
    ));
    sandbox.patient = Some(commands.spawn_patient(&settings, Transform::default()));
}

fn punch_patient(
    time: Res<Time>,
    meter: Res<PunchMeter>,
    mut sandbox: ResMut<Sandbox>,
    areas: Query<(Entity, &GlobalTransform), With<HitArea>>,
    mut commands: Commands,
) {
    if sandbox.down_for.is_some() || !sandbox.punch.tick(time.delta()).just_finished() {
        return;
    }
    let targets: Vec<_> = areas.iter().collect();
    let Some(&(collider, transform)) = targets.choose(&mut rand::rng()) else {
        return;
    };
    commands.punch(collider, transform.translation(), Vec3::Z, meter.force());
}

fn on_knocked_out(on: On<KnockedOut>, mut sandbox: ResMut<Sandbox>) {
    sandbox.knockouts += 1;
    sandbox.down_for = Some(0.0);
    info!("knockout #{} with impulse {}", sandbox.knockouts, on.event().impulse);
}

fn stand_up(
    real_time: Res<Time<Real>>,
    mut sandbox: ResMut<Sandbox>,
    mut commands: Commands,
    mut exit: MessageWriter<AppExit>,
) {
    let Some(down_for) = sandbox.down_for.as_mut() else {
        return;
    };
    *down_for += real_time.delta_secs();
    if *down_for < RECOVERY_DELAY {
        return;
    }
    sandbox.down_for = None;
    if sandbox.knockouts >= KNOCKOUTS {
        info!("{KNOCKOUTS} knockouts, done");
        exit.write(AppExit::Success);
        return;
    }
    if let Some(patient) = sandbox.patient {
        commands.heal_patient(patient);
        commands.recover_patient(patient);
    }
}

fn on_healed(_on: On<Healed>) {
    info!("patient healed");
}

fn on_recovered(_on: On<Recovered>) {
    info!("patient back on its feet");
}
