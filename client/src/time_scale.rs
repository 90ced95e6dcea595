use bevy::prelude::*;
use knockout_shared::time_scale::SlowMotion;
use knockout_shared::TimeScaleController;

pub fn plugin(app: &mut App) {
    app.init_resource::<SlowMotionClock>()
        .add_observer(on_slow_motion_requested)
        .add_systems(Update, tick_slow_motion);
}

// ── Slow Motion ─────────────────────────────────────────────────────

/// Intent: slow the game down by `scale` for `duration` real seconds.
#[derive(Event, Clone, Copy, Debug)]
pub struct SlowMotionRequested {
    pub scale: f32,
    pub duration: f32,
}

impl From<SlowMotion> for SlowMotionRequested {
    fn from(slow_motion: SlowMotion) -> Self {
        Self {
            scale: slow_motion.scale,
            duration: slow_motion.duration,
        }
    }
}

/// Stacked slow-motion requests. Drives the relative speed of `Time<Virtual>`
/// and unwinds with `Time<Real>`.
#[derive(Resource, Default, Debug, Deref, DerefMut)]
pub struct SlowMotionClock(pub TimeScaleController);

fn on_slow_motion_requested(on: On<SlowMotionRequested>, mut clock: ResMut<SlowMotionClock>) {
    let event = on.event();
    if let Ok(scale) = clock.request(event.scale, event.duration) {
        debug!("slow motion x{} for {}s, now x{scale}", event.scale, event.duration);
    }
}

fn tick_slow_motion(
    real_time: Res<Time<Real>>,
    mut clock: ResMut<SlowMotionClock>,
    mut time: ResMut<Time<Virtual>>,
) {
    if clock.active() == 0 && time.relative_speed() == clock.scale() {
        return;
    }
    let scale = clock.tick(real_time.delta_secs());
    if time.relative_speed() != scale {
        time.set_relative_speed(scale);
    }
}
