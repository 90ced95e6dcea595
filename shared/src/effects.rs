//! Effect rules and spawn placement.

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::time_scale::SlowMotion;

/// One probabilistic response to hits on `area_id` inside `[min_force, max_force)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaEffectRule {
    pub area_id: String,
    pub min_force: f32,
    pub max_force: f32,
    pub probability: f32,
    pub effect: EffectSpec,
}

impl Default for AreaEffectRule {
    fn default() -> Self {
        Self {
            area_id: String::new(),
            min_force: 0.0,
            max_force: 1.0,
            probability: 1.0,
            effect: EffectSpec::default(),
        }
    }
}

impl AreaEffectRule {
    pub fn new(area_id: impl Into<String>, min_force: f32, max_force: f32) -> Self {
        Self {
            area_id: area_id.into(),
            min_force,
            max_force,
            ..Default::default()
        }
    }

    pub fn with_probability(mut self, probability: f32) -> Self {
        self.probability = probability;
        self
    }

    pub fn with_effect(mut self, effect: EffectSpec) -> Self {
        self.effect = effect;
        self
    }

    /// Half-open band test: `max_force` itself never matches.
    pub fn matches(&self, force: f32) -> bool {
        force >= self.min_force && force < self.max_force
    }

    pub fn is_inverted(&self) -> bool {
        self.min_force > self.max_force
    }

    /// Whether a roll in `[0, 1)` fires the rule. A probability that is not a
    /// number never fires.
    pub fn fires_on(&self, roll: f32) -> bool {
        roll < self.probability
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimBool {
    pub param: String,
    pub value: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSpec {
    /// Float parameter that receives the hit force.
    pub anim_force_param: Option<String>,
    pub anim_bools: Vec<AnimBool>,
    pub anim_trigger: Option<String>,
    pub sound: Option<String>,
    pub spawns: Vec<ObjectSpawnSpec>,
    pub slow_motion: Option<SlowMotion>,
}

impl Default for EffectSpec {
    fn default() -> Self {
        Self {
            anim_force_param: Some("force".into()),
            anim_bools: Vec::new(),
            anim_trigger: Some("hit".into()),
            sound: None,
            spawns: Vec::new(),
            slow_motion: None,
        }
    }
}

impl EffectSpec {
    pub fn has_animation(&self) -> bool {
        self.anim_force_param.is_some() || self.anim_trigger.is_some() || !self.anim_bools.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Space {
    #[default]
    Local,
    World,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnAnchor {
    #[default]
    Bone,
    HitPoint,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectSpawnSpec {
    pub prototype: String,
    pub bone: String,
    pub anchor: SpawnAnchor,
    pub offset: Vec3,
    pub offset_space: Space,
    /// Euler angles in degrees, applied Y then X then Z.
    pub rotation: Vec3,
    pub rotation_space: Space,
    pub align_to_normal: bool,
    pub link_to_bone: bool,
    /// Seconds until the instance goes back to its pool. `None` keeps it.
    pub release_after: Option<f32>,
}

impl Default for ObjectSpawnSpec {
    fn default() -> Self {
        Self {
            prototype: String::new(),
            bone: "Head".into(),
            anchor: SpawnAnchor::Bone,
            offset: Vec3::ZERO,
            offset_space: Space::Local,
            rotation: Vec3::ZERO,
            rotation_space: Space::Local,
            align_to_normal: false,
            link_to_bone: true,
            release_after: Some(3.0),
        }
    }
}

/// World-space translation and rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::IDENTITY)
    }

    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.translation + self.rotation * local
    }
}

/// Where a spawned instance goes, and the bone it should follow if any.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub world: Pose,
    pub attach_to: Option<String>,
}

impl ObjectSpawnSpec {
    pub fn euler(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.rotation.y.to_radians(),
            self.rotation.x.to_radians(),
            self.rotation.z.to_radians(),
        )
    }

    /// Resolve the world pose for an instance spawned from a hit at
    /// `hit_point` with surface `normal`, relative to `bone`.
    pub fn placement(&self, bone: Pose, hit_point: Vec3, normal: Vec3) -> Placement {
        let rotation = if self.align_to_normal && normal.length_squared() > f32::EPSILON {
            look_rotation(normal, Vec3::Y)
        } else {
            match self.rotation_space {
                Space::Local => bone.rotation * self.euler(),
                Space::World => self.euler(),
            }
        };

        let translation = match (self.anchor, self.offset_space) {
            (SpawnAnchor::HitPoint, Space::Local) => hit_point + rotation * self.offset,
            (SpawnAnchor::HitPoint, Space::World) => hit_point + self.offset,
            (SpawnAnchor::Bone, Space::Local) => bone.transform_point(self.offset),
            (SpawnAnchor::Bone, Space::World) => bone.translation + self.offset,
        };

        Placement {
            world: Pose::new(translation, rotation),
            attach_to: self.link_to_bone.then(|| self.bone.clone()),
        }
    }
}

/// Rotation whose local +Z points along `forward`, with +Y as close to `up`
/// as possible.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let z = forward.normalize_or_zero();
    if z == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let mut x = up.cross(z);
    if x.length_squared() < 1e-8 {
        x = z.any_orthonormal_vector();
    }
    let x = x.normalize();
    let y = z.cross(x);
    Quat::from_mat3(&glam::Mat3::from_cols(x, y, z))
}
