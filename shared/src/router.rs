//! Hit dispatch: from a contact on a named area to every side effect it
//! causes.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use glam::Vec3;
use tracing::{debug, warn};

use crate::damage::Rebuild;
use crate::effects::{AreaEffectRule, EffectSpec, ObjectSpawnSpec, Placement, Pose};
use crate::pool::ResourcePool;
use crate::rng::Roll;
use crate::time_scale::TimeScaleController;
use crate::timers::DelayQueue;

/// A resolved contact against one damageable area.
#[derive(Clone, Debug, PartialEq)]
pub struct HitEvent {
    pub area_id: String,
    pub position: Vec3,
    pub normal: Vec3,
    pub force: f32,
}

impl HitEvent {
    pub fn new(area_id: impl Into<String>, position: Vec3, normal: Vec3, force: f32) -> Self {
        Self {
            area_id: area_id.into(),
            position,
            normal,
            force,
        }
    }

    /// Force clamped into `[0, 1]`; NaN and infinities count as no force.
    pub fn clamped_force(&self) -> f32 {
        if self.force.is_finite() {
            self.force.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

// ── Collaborator seams ──────────────────────────────────────────────

pub trait AnimationSink {
    fn set_float(&mut self, param: &str, value: f32);
    fn set_bool(&mut self, param: &str, value: bool);
    fn set_trigger(&mut self, param: &str);
    fn bone_pose(&self, bone: &str) -> Option<Pose>;
    fn is_enabled(&self) -> bool;
}

pub trait AudioSink {
    fn play_one_shot(&mut self, clip: &str);
}

/// Everything the router needs from the world around one character.
pub trait HitHost {
    type Instance: Clone + Eq + Hash + Debug;

    fn animation(&mut self) -> Option<&mut dyn AnimationSink>;
    fn audio(&mut self) -> Option<&mut dyn AudioSink>;
    fn time_scale(&mut self) -> Option<&mut TimeScaleController>;

    /// Build a fresh instance of `prototype`. `None` when it is unknown.
    fn instantiate(&mut self, prototype: &str) -> Option<Self::Instance>;
    /// Activate an instance at `placement`, reparenting it if requested.
    fn place(&mut self, instance: &Self::Instance, placement: &Placement);
    /// Deactivate an instance that went back to its pool.
    fn retire(&mut self, instance: &Self::Instance);

    /// Forward the hit to the character's persistent damage state.
    fn damage(&mut self, hit: &HitEvent) -> Rebuild;
}

// ── Router ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApplyReport {
    /// Indices, within the area's rule list, of every rule that fired.
    pub fired: Vec<usize>,
    pub spawned: usize,
    pub skipped_spawns: usize,
    pub rebuild: Rebuild,
}

#[derive(Debug)]
pub struct DamageRouter<I> {
    rules: HashMap<String, Vec<AreaEffectRule>>,
    pool: ResourcePool<String, I>,
    releases: DelayQueue<I>,
}

impl<I> Default for DamageRouter<I> {
    fn default() -> Self {
        Self {
            rules: HashMap::new(),
            pool: ResourcePool::default(),
            releases: DelayQueue::default(),
        }
    }
}

impl<I> DamageRouter<I>
where
    I: Clone + Eq + Hash + Debug,
{
    pub fn new(rules: impl IntoIterator<Item = AreaEffectRule>) -> Self {
        let mut router = Self::default();
        for rule in rules {
            router.add_rule(rule);
        }
        router
    }

    pub fn add_rule(&mut self, rule: AreaEffectRule) {
        if rule.is_inverted() {
            warn!(
                "effect rule for area '{}' has an inverted force band [{}, {}) and will never fire",
                rule.area_id, rule.min_force, rule.max_force
            );
        }
        self.rules.entry(rule.area_id.clone()).or_default().push(rule);
    }

    pub fn rules_for(&self, area_id: &str) -> &[AreaEffectRule] {
        self.rules.get(area_id).map_or(&[], Vec::as_slice)
    }

    pub fn areas(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn pool(&self) -> &ResourcePool<String, I> {
        &self.pool
    }

    pub fn pending_releases(&self) -> usize {
        self.releases.len()
    }

    /// Run every matching rule for `hit`, then forward the hit to the
    /// character exactly once.
    pub fn apply<H>(&mut self, hit: &HitEvent, rolls: &mut impl Roll, host: &mut H) -> ApplyReport
    where
        H: HitHost<Instance = I>,
    {
        let force = hit.clamped_force();
        let mut report = ApplyReport::default();

        if let Some(rules) = self.rules.get(&hit.area_id) {
            for (index, rule) in rules.iter().enumerate() {
                if !rule.matches(force) {
                    continue;
                }
                if !rule.fires_on(rolls.roll()) {
                    continue;
                }
                report.fired.push(index);
                signal_animation(&rule.effect, force, host);
                if let (Some(clip), Some(audio)) = (&rule.effect.sound, host.audio()) {
                    audio.play_one_shot(clip);
                }
                for spec in &rule.effect.spawns {
                    if spawn_object(&mut self.pool, &mut self.releases, spec, hit, host) {
                        report.spawned += 1;
                    } else {
                        report.skipped_spawns += 1;
                    }
                }
                if let Some(slow_motion) = rule.effect.slow_motion {
                    match host.time_scale() {
                        // a rejected request has already been logged
                        Some(time) => {
                            let _ = time.request_slow_motion(slow_motion);
                        }
                        None => debug!("no time scale controller, slow motion skipped"),
                    }
                }
            }
        }

        report.rebuild = host.damage(&HitEvent {
            force,
            ..hit.clone()
        });
        report
    }

    /// Advance the release clock and return expired instances to their pools.
    pub fn tick<H>(&mut self, dt: f32, host: &mut H) -> usize
    where
        H: HitHost<Instance = I>,
    {
        let mut released = 0;
        for instance in self.releases.advance(dt) {
            match self.pool.release(instance.clone()) {
                Ok(_) => {
                    host.retire(&instance);
                    released += 1;
                }
                Err(err) => warn!("could not release {instance:?}: {err}"),
            }
        }
        released
    }

    /// Release an instance ahead of its timer.
    pub fn release<H>(&mut self, instance: &I, host: &mut H) -> bool
    where
        H: HitHost<Instance = I>,
    {
        self.releases.cancel(|pending| pending == instance);
        if self.pool.release(instance.clone()).is_err() {
            return false;
        }
        host.retire(instance);
        true
    }

    /// Forget every pooled instance and pending release, handing the
    /// instances back so the owner can despawn them.
    pub fn shutdown(&mut self) -> Vec<I> {
        self.releases.clear();
        self.pool.drain()
    }
}

fn signal_animation<H: HitHost>(effect: &EffectSpec, force: f32, host: &mut H) {
    if !effect.has_animation() {
        return;
    }
    let Some(animation) = host.animation() else {
        debug!("no animation sink, hit signals skipped");
        return;
    };
    if let Some(param) = &effect.anim_force_param {
        animation.set_float(param, force);
    }
    for flag in &effect.anim_bools {
        animation.set_bool(&flag.param, flag.value);
    }
    if let Some(trigger) = &effect.anim_trigger {
        animation.set_trigger(trigger);
    }
}

fn spawn_object<H: HitHost>(
    pool: &mut ResourcePool<String, H::Instance>,
    releases: &mut DelayQueue<H::Instance>,
    spec: &ObjectSpawnSpec,
    hit: &HitEvent,
    host: &mut H,
) -> bool {
    let bone = {
        let Some(animation) = host.animation() else {
            debug!("no animation sink, spawn of '{}' skipped", spec.prototype);
            return false;
        };
        match animation.bone_pose(&spec.bone) {
            Some(pose) => pose,
            None => {
                warn!("bone '{}' not found, spawn of '{}' skipped", spec.bone, spec.prototype);
                return false;
            }
        }
    };

    let Some(instance) = pool.try_acquire_with(&spec.prototype, |prototype| host.instantiate(prototype))
    else {
        warn!("unknown spawn prototype '{}'", spec.prototype);
        return false;
    };

    let placement = spec.placement(bone, hit.position, hit.normal);
    host.place(&instance, &placement);
    if let Some(delay) = spec.release_after {
        releases.schedule(delay, instance);
    }
    true
}
