//! The patient's health loop: hits cost health, zero health knocks the
//! ragdoll out, healing and recovery bring it back.

use std::fmt::Debug;
use std::hash::Hash;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ragdoll::{ForceMode, RagdollHost, RagdollRig, RagdollSettings};
use crate::router::AnimationSink;
use crate::time_scale::SlowMotion;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalsConfig {
    pub max_health: f32,
    /// Health lost per unit of hit force.
    pub damage_per_force: f32,
    pub knockout_impulse: Vec3,
    pub knockout_bone: String,
    pub knockout_slow_motion: Option<SlowMotion>,
    /// Animation float that receives the health fraction.
    pub health_param: Option<String>,
}

impl Default for VitalsConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            damage_per_force: 4.0,
            knockout_impulse: Vec3::new(0.0, 100.0, 100.0),
            knockout_bone: "Head".into(),
            knockout_slow_motion: Some(SlowMotion::new(0.2, 3.0)),
            health_param: Some("health".into()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Knockout {
    pub impulse: Vec3,
    pub bone: String,
    pub slow_motion: Option<SlowMotion>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HitOutcome {
    /// Punches are disabled, nothing changed.
    Ignored,
    Hurt { health: f32 },
    KnockedOut(Knockout),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Vitals {
    health: f32,
    max_health: f32,
    ready_for_punch: bool,
}

impl Vitals {
    pub fn new(config: &VitalsConfig) -> Self {
        let max_health = config.max_health.max(f32::EPSILON);
        Self {
            health: max_health,
            max_health,
            ready_for_punch: true,
        }
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn fraction(&self) -> f32 {
        (self.health / self.max_health).clamp(0.0, 1.0)
    }

    pub fn is_ready(&self) -> bool {
        self.ready_for_punch
    }

    pub fn is_knocked_out(&self) -> bool {
        self.health <= 0.0
    }

    pub fn take_hit(&mut self, force: f32, config: &VitalsConfig) -> HitOutcome {
        if !self.ready_for_punch {
            return HitOutcome::Ignored;
        }
        let force = if force.is_finite() { force.clamp(0.0, 1.0) } else { 0.0 };
        self.health -= force * config.damage_per_force;
        if self.health > 0.0 {
            return HitOutcome::Hurt {
                health: self.health,
            };
        }
        self.ready_for_punch = false;
        info!("patient knocked out");
        HitOutcome::KnockedOut(Knockout {
            impulse: config.knockout_impulse,
            bone: config.knockout_bone.clone(),
            slow_motion: config.knockout_slow_motion,
        })
    }

    pub fn heal(&mut self) {
        self.health = self.max_health;
        self.ready_for_punch = true;
    }

    /// Push the health fraction to the animator, if there is one.
    pub fn report(&self, config: &VitalsConfig, animation: Option<&mut dyn AnimationSink>) {
        if let (Some(param), Some(animation)) = (&config.health_param, animation) {
            animation.set_float(param, self.fraction());
        }
    }
}

/// Switch the rig to full simulation and throw it with the knockout impulse,
/// applied at the knockout bone or, without one, at the character itself.
pub fn knock_out<B, C, H>(rig: &RagdollRig<B, C>, knockout: &Knockout, host: &mut H) -> bool
where
    B: Copy + Eq + Hash + Debug,
    C: Copy + Eq + Debug,
    H: RagdollHost<Bone = B, Collider = C>,
{
    rig.set_properties(&RagdollSettings::knockout(), host);
    let at = host
        .find_bone(&knockout.bone)
        .map(|bone| host.bone_world_position(bone))
        .unwrap_or_else(|| host.character_position());
    rig.add_force(knockout.impulse, at, ForceMode::Impulse, host)
}

/// Hand the body back to the animator.
pub fn recover<B, C, H>(rig: &RagdollRig<B, C>, host: &mut H)
where
    B: Copy + Eq + Hash + Debug,
    C: Copy + Eq + Debug,
    H: RagdollHost<Bone = B, Collider = C>,
{
    rig.set_properties(&RagdollSettings::animated(), host);
}

/// Oscillating punch strength gauge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceMeter {
    pub speed: f32,
    pub start: f32,
}

impl Default for ForceMeter {
    fn default() -> Self {
        Self {
            speed: 2.0,
            start: 0.0,
        }
    }
}

impl ForceMeter {
    pub fn force(&self, elapsed: f32) -> f32 {
        ((1.0 + (elapsed * self.speed - self.start).sin()) / 2.0).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_drains_by_force() {
        let config = VitalsConfig::default();
        let mut vitals = Vitals::new(&config);
        assert_eq!(vitals.take_hit(0.5, &config), HitOutcome::Hurt { health: 98.0 });
        assert!((vitals.fraction() - 0.98).abs() < 1e-6);
    }

    #[test]
    fn zero_health_knocks_out_once() {
        let config = VitalsConfig {
            max_health: 4.0,
            ..Default::default()
        };
        let mut vitals = Vitals::new(&config);
        let HitOutcome::KnockedOut(knockout) = vitals.take_hit(1.0, &config) else {
            panic!("expected a knockout");
        };
        assert_eq!(knockout.bone, "Head");
        assert_eq!(knockout.impulse, Vec3::new(0.0, 100.0, 100.0));
        assert_eq!(knockout.slow_motion, Some(SlowMotion::new(0.2, 3.0)));
        assert!(!vitals.is_ready());
        assert_eq!(vitals.take_hit(1.0, &config), HitOutcome::Ignored);

        vitals.heal();
        assert!(vitals.is_ready());
        assert_eq!(vitals.health(), 4.0);
    }

    #[test]
    fn force_meter_stays_in_unit_range() {
        let meter = ForceMeter::default();
        assert!((meter.force(0.0) - 0.5).abs() < 1e-6);
        assert!((meter.force(std::f32::consts::FRAC_PI_4) - 1.0).abs() < 1e-6);
        for step in 0..1000 {
            let f = meter.force(step as f32 * 0.013);
            assert!((0.0..=1.0).contains(&f));
        }
    }
}
