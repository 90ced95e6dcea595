//! Declarative ragdoll rigs.
//!
//! A rig is a list of [`RagdollElement`]s, one per simulated bone. Building
//! it attaches bodies and colliders to the live skeleton, then joints in a
//! second pass once every body exists. After that the whole rig is switched
//! between animated and simulated with [`RagdollRig::set_properties`].

use std::fmt::Debug;
use std::hash::Hash;

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::lifecycle::CharacterLifecycle;

/// Above this many sphere and capsule colliders cloth simulation degrades.
pub const CLOTH_COLLIDER_WARN_THRESHOLD: usize = 10;

// ── Configuration ───────────────────────────────────────────────────

/// Angular joint limits in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointLimits {
    pub low_twist: f32,
    pub high_twist: f32,
    pub swing1: f32,
    pub swing2: f32,
}

impl Default for JointLimits {
    fn default() -> Self {
        Self {
            low_twist: -20.0,
            high_twist: 70.0,
            swing1: 40.0,
            swing2: 0.0,
        }
    }
}

impl JointLimits {
    pub fn new(low_twist: f32, high_twist: f32, swing1: f32, swing2: f32) -> Self {
        Self {
            low_twist,
            high_twist,
            swing1,
            swing2,
        }
    }

    /// Symmetric swing cone half-angle in radians. Physics backends without
    /// elliptical cones get the wider of the two swing limits.
    pub fn swing_cone(&self) -> f32 {
        self.swing1.abs().max(self.swing2.abs()).to_radians()
    }

    /// Twist range in radians, low end first.
    pub fn twist_range(&self) -> (f32, f32) {
        let (a, b) = (self.low_twist.to_radians(), self.high_twist.to_radians());
        (a.min(b), a.max(b))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapsuleAxis {
    X,
    #[default]
    Y,
    Z,
}

impl CapsuleAxis {
    /// Rotation taking a Y-aligned capsule onto this axis.
    pub fn rotation(self) -> Quat {
        match self {
            Self::X => Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Self::Y => Quat::IDENTITY,
            Self::Z => Quat::from_rotation_x(std::f32::consts::FRAC_PI_2),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Box { size: Vec3 },
    Sphere { radius: f32 },
    /// `height` is the full tip-to-tip length, caps included.
    Capsule { radius: f32, height: f32, axis: CapsuleAxis },
}

impl ColliderShape {
    /// Length of the cylindrical part of a capsule.
    pub fn capsule_segment(radius: f32, height: f32) -> f32 {
        (height - 2.0 * radius).max(0.0)
    }

    pub fn is_cloth_collider(&self) -> bool {
        !matches!(self, Self::Box { .. })
    }

    /// Orientation of the shape inside its collider frame.
    pub fn rotation(&self) -> Quat {
        match self {
            Self::Capsule { axis, .. } => axis.rotation(),
            _ => Quat::IDENTITY,
        }
    }

    /// Principal moments of inertia per unit mass, about the shape's centre
    /// and before [`Self::rotation`]. A capsule counts as a solid cylinder of
    /// its full length.
    pub fn unit_inertia(&self) -> Vec3 {
        match *self {
            Self::Box { size } => {
                let sq = size * size;
                Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) / 12.0
            }
            Self::Sphere { radius } => Vec3::splat(0.4 * radius * radius),
            Self::Capsule { radius, height, .. } => {
                let side = (3.0 * radius * radius + height * height) / 12.0;
                Vec3::new(side, 0.5 * radius * radius, side)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColliderSpec {
    #[serde(default)]
    pub center: Vec3,
    pub shape: ColliderShape,
}

impl ColliderSpec {
    pub fn new(center: Vec3, shape: ColliderShape) -> Self {
        Self { center, shape }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagdollElement {
    pub bone: String,
    pub parent: Option<String>,
    pub is_root: bool,
    pub mass: f32,
    pub axis: Vec3,
    pub swing_axis: Vec3,
    pub limits: JointLimits,
    pub colliders: Vec<ColliderSpec>,
    /// Damage area reported when one of this bone's colliders is hit.
    pub area: Option<String>,
}

impl Default for RagdollElement {
    fn default() -> Self {
        Self {
            bone: String::new(),
            parent: None,
            is_root: false,
            mass: 1.0,
            axis: Vec3::X,
            swing_axis: Vec3::Y,
            limits: JointLimits::default(),
            colliders: Vec::new(),
            area: None,
        }
    }
}

impl RagdollElement {
    pub fn root(bone: impl Into<String>, mass: f32) -> Self {
        Self {
            bone: bone.into(),
            is_root: true,
            mass,
            ..Default::default()
        }
    }

    pub fn child(bone: impl Into<String>, parent: impl Into<String>, mass: f32) -> Self {
        Self {
            bone: bone.into(),
            parent: Some(parent.into()),
            mass,
            ..Default::default()
        }
    }

    pub fn with_collider(mut self, collider: ColliderSpec) -> Self {
        self.colliders.push(collider);
        self
    }

    pub fn with_limits(mut self, limits: JointLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }
}

/// Bulk switches for every body and collider of a rig.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagdollSettings {
    pub triggers: bool,
    pub kinematic: bool,
    pub gravity: bool,
    pub set_layer: bool,
    pub layer: u32,
    pub animation: bool,
    pub move_to_root_bone_position: bool,
    pub update_when_offscreen: bool,
}

impl Default for RagdollSettings {
    fn default() -> Self {
        Self::animated()
    }
}

impl RagdollSettings {
    /// Bodies follow the animation.
    pub fn animated() -> Self {
        Self {
            triggers: false,
            kinematic: true,
            gravity: false,
            set_layer: false,
            layer: 0,
            animation: true,
            move_to_root_bone_position: true,
            update_when_offscreen: false,
        }
    }

    /// Bodies are simulated and the animator is off.
    pub fn knockout() -> Self {
        Self {
            triggers: false,
            kinematic: false,
            gravity: true,
            set_layer: true,
            layer: 1,
            animation: false,
            move_to_root_bone_position: false,
            update_when_offscreen: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceMode {
    #[default]
    Force,
    Acceleration,
    Impulse,
    VelocityChange,
}

impl ForceMode {
    /// Velocity change caused by applying `force` for one step of `dt`
    /// seconds to a body of `mass`. Massless bodies ignore mass-based modes.
    pub fn velocity_change(self, force: Vec3, mass: f32, dt: f32) -> Vec3 {
        let inverse_mass = if mass > 0.0 { mass.recip() } else { 0.0 };
        match self {
            Self::Force => force * inverse_mass * dt,
            Self::Acceleration => force * dt,
            Self::Impulse => force * inverse_mass,
            Self::VelocityChange => force,
        }
    }
}

/// Mass, centre of mass and inertia tensor of one body, in its bone's frame.
/// The mass is split evenly between the colliders; a body without colliders
/// is a point mass at the bone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MassProperties {
    pub mass: f32,
    pub center: Vec3,
    pub inertia: Mat3,
}

impl MassProperties {
    pub fn point(mass: f32) -> Self {
        Self {
            mass: mass.max(0.0),
            center: Vec3::ZERO,
            inertia: Mat3::ZERO,
        }
    }

    pub fn from_colliders(mass: f32, colliders: &[ColliderSpec]) -> Self {
        if colliders.is_empty() || mass <= 0.0 {
            return Self::point(mass);
        }
        let count = colliders.len() as f32;
        let share = mass / count;
        let center = colliders.iter().map(|c| c.center).sum::<Vec3>() / count;
        let inertia = colliders.iter().fold(Mat3::ZERO, |sum, collider| {
            let basis = Mat3::from_quat(collider.shape.rotation());
            let own = basis * Mat3::from_diagonal(collider.shape.unit_inertia() * share) * basis.transpose();
            // parallel axis shift onto the common centre
            let d = collider.center - center;
            let outer = Mat3::from_cols(d * d.x, d * d.y, d * d.z);
            let shift = (Mat3::IDENTITY * d.length_squared() - outer) * share;
            sum + own + shift
        });
        Self {
            mass,
            center,
            inertia,
        }
    }

    /// Linear and angular velocity change, both in world space, of `force`
    /// applied at the world point `at` while the body sits at
    /// `translation`/`rotation`. Bodies without inertia do not spin.
    pub fn velocity_change(
        &self,
        force: Vec3,
        at: Vec3,
        mode: ForceMode,
        dt: f32,
        translation: Vec3,
        rotation: Quat,
    ) -> (Vec3, Vec3) {
        let linear = mode.velocity_change(force, self.mass, dt);
        let basis = Mat3::from_quat(rotation);
        let inertia = basis * self.inertia * basis.transpose();
        if inertia.determinant() == 0.0 {
            return (linear, Vec3::ZERO);
        }
        let arm = at - (translation + rotation * self.center);
        let angular = inertia.inverse() * arm.cross(linear * self.mass);
        if !angular.is_finite() {
            return (linear, Vec3::ZERO);
        }
        (linear, angular)
    }
}

// ── Host seam ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneSnapshot<B> {
    pub bone: B,
    pub local: LocalTransform,
}

/// Sphere colliders as the cloth solver wants them. Only `first` is filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpherePair<C> {
    pub first: C,
    pub second: Option<C>,
}

impl<C> SpherePair<C> {
    pub fn single(first: C) -> Self {
        Self {
            first,
            second: None,
        }
    }
}

pub trait RagdollHost {
    type Bone: Copy + Eq + Hash + Debug;
    type Collider: Copy + Eq + Debug;

    fn find_bone(&self, name: &str) -> Option<Self::Bone>;
    /// Attach a body to `bone` if it has none and set its mass.
    fn ensure_body(&mut self, bone: Self::Bone, mass: f32);
    fn has_body(&self, bone: Self::Bone) -> bool;
    fn add_collider(&mut self, bone: Self::Bone, spec: &ColliderSpec, trigger: bool) -> Self::Collider;
    fn add_joint(&mut self, bone: Self::Bone, parent: Self::Bone, element: &RagdollElement);

    fn set_body_mode(&mut self, bone: Self::Bone, kinematic: bool, gravity: bool);
    fn set_collider_mode(&mut self, collider: Self::Collider, trigger: bool, layer: Option<u32>);

    /// `None` when the character has no animator.
    fn animator_enabled(&self) -> Option<bool>;
    fn set_animator_enabled(&mut self, enabled: bool);
    fn set_update_when_offscreen(&mut self, enabled: bool);

    fn bone_world_position(&self, bone: Self::Bone) -> Vec3;
    fn character_position(&self) -> Vec3;
    fn set_character_position(&mut self, position: Vec3);
    /// Push `bone` with `force` at the world point `at`. `body` describes how
    /// the push splits into linear and angular motion.
    fn apply_force(
        &mut self,
        bone: Self::Bone,
        force: Vec3,
        at: Vec3,
        mode: ForceMode,
        body: &MassProperties,
    );

    fn skeleton_bones(&self) -> Vec<Self::Bone>;
    fn local_transform(&self, bone: Self::Bone) -> Option<LocalTransform>;
    fn set_local_transform(&mut self, bone: Self::Bone, local: &LocalTransform);

    /// Hand the collider lists to every cloth on the character. Returns how
    /// many cloth components received them.
    fn assign_cloth_colliders(
        &mut self,
        spheres: &[SpherePair<Self::Collider>],
        capsules: &[Self::Collider],
    ) -> usize;
}

// ── Rig ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildReport {
    pub bodies: usize,
    pub colliders: usize,
    pub joints: usize,
    pub missing_bones: Vec<String>,
    pub skipped_joints: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClothUpdate {
    /// Cloth components that received the collider lists.
    pub cloths: usize,
    pub colliders: usize,
}

impl ClothUpdate {
    pub fn crowded(&self) -> bool {
        self.cloths > 0 && self.colliders > CLOTH_COLLIDER_WARN_THRESHOLD
    }
}

#[derive(Clone, Debug)]
pub struct RagdollRig<B, C> {
    elements: Vec<RagdollElement>,
    on_start: RagdollSettings,
    bodies: Vec<B>,
    root: Option<B>,
    boxes: Vec<C>,
    spheres: Vec<SpherePair<C>>,
    capsules: Vec<C>,
    snapshots: Vec<BoneSnapshot<B>>,
    built: bool,
}

impl<B, C> RagdollRig<B, C>
where
    B: Copy + Eq + Hash + Debug,
    C: Copy + Eq + Debug,
{
    pub fn new(elements: Vec<RagdollElement>, on_start: RagdollSettings) -> Self {
        Self {
            elements,
            on_start,
            bodies: Vec::new(),
            root: None,
            boxes: Vec::new(),
            spheres: Vec::new(),
            capsules: Vec::new(),
            snapshots: Vec::new(),
            built: false,
        }
    }

    pub fn elements(&self) -> &[RagdollElement] {
        &self.elements
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn root(&self) -> Option<B> {
        self.root
    }

    pub fn bodies(&self) -> &[B] {
        &self.bodies
    }

    pub fn boxes(&self) -> &[C] {
        &self.boxes
    }

    pub fn sphere_pairs(&self) -> &[SpherePair<C>] {
        &self.spheres
    }

    pub fn capsules(&self) -> &[C] {
        &self.capsules
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshots.len()
    }

    /// Attach bodies, colliders and joints for every element whose bone
    /// exists. Missing bones and parents are skipped, never fatal.
    pub fn build<H>(&mut self, host: &mut H) -> BuildReport
    where
        H: RagdollHost<Bone = B, Collider = C>,
    {
        let mut report = BuildReport::default();
        if self.built {
            warn!("ragdoll is already built, ignoring second build");
            return report;
        }

        let trigger = self.on_start.triggers;
        for element in &self.elements {
            let Some(bone) = host.find_bone(&element.bone) else {
                warn!("ragdoll bone '{}' not found", element.bone);
                report.missing_bones.push(element.bone.clone());
                continue;
            };
            host.ensure_body(bone, element.mass);
            if !self.bodies.contains(&bone) {
                self.bodies.push(bone);
                report.bodies += 1;
            }
            if element.is_root {
                self.root = Some(bone);
            }
            for spec in &element.colliders {
                let collider = host.add_collider(bone, spec, trigger);
                match spec.shape {
                    ColliderShape::Box { .. } => self.boxes.push(collider),
                    ColliderShape::Sphere { .. } => self.spheres.push(SpherePair::single(collider)),
                    ColliderShape::Capsule { .. } => self.capsules.push(collider),
                }
                report.colliders += 1;
            }
        }

        // joints need the parent's body, so they wait until every body exists
        for element in self.elements.iter().filter(|e| !e.is_root) {
            let Some(bone) = host.find_bone(&element.bone) else {
                continue;
            };
            let parent = element
                .parent
                .as_deref()
                .and_then(|name| host.find_bone(name))
                .filter(|&parent| host.has_body(parent));
            let Some(parent) = parent else {
                warn!(
                    "ragdoll joint for '{}' skipped: parent {:?} has no body",
                    element.bone, element.parent
                );
                report.skipped_joints.push(element.bone.clone());
                continue;
            };
            host.add_joint(bone, parent, element);
            report.joints += 1;
        }

        self.built = true;
        self.update_cloth_colliders(host);
        self.set_properties(
            &RagdollSettings {
                move_to_root_bone_position: false,
                ..self.on_start
            },
            host,
        );
        debug!(
            "ragdoll built: {} bodies, {} colliders, {} joints",
            report.bodies, report.colliders, report.joints
        );
        report
    }

    pub fn set_properties<H>(&self, settings: &RagdollSettings, host: &mut H)
    where
        H: RagdollHost<Bone = B, Collider = C>,
    {
        for &body in &self.bodies {
            host.set_body_mode(body, settings.kinematic, settings.gravity);
        }
        let layer = settings.set_layer.then_some(settings.layer);
        let colliders = self
            .boxes
            .iter()
            .chain(self.spheres.iter().map(|pair| &pair.first))
            .chain(&self.capsules);
        for &collider in colliders {
            host.set_collider_mode(collider, settings.triggers, layer);
        }
        host.set_animator_enabled(settings.animation);
        host.set_update_when_offscreen(settings.update_when_offscreen);

        if settings.move_to_root_bone_position {
            match self.root {
                Some(root) => {
                    let position = host.bone_world_position(root);
                    host.set_character_position(position);
                }
                None => debug!("ragdoll has no root body to snap to"),
            }
        }
    }

    /// Push the root body at the world point `at`. Returns `false` when the
    /// rig has no root.
    pub fn add_force<H>(&self, force: Vec3, at: Vec3, mode: ForceMode, host: &mut H) -> bool
    where
        H: RagdollHost<Bone = B, Collider = C>,
    {
        let Some(root) = self.root else {
            return false;
        };
        let body = self
            .elements
            .iter()
            .rev()
            .find(|e| e.is_root && host.find_bone(&e.bone) == Some(root))
            .map_or(MassProperties::point(1.0), |e| {
                MassProperties::from_colliders(e.mass, &e.colliders)
            });
        host.apply_force(root, force, at, mode, &body);
        true
    }

    pub fn update_cloth_colliders<H>(&self, host: &mut H) -> ClothUpdate
    where
        H: RagdollHost<Bone = B, Collider = C>,
    {
        let update = ClothUpdate {
            cloths: host.assign_cloth_colliders(&self.spheres, &self.capsules),
            colliders: self.spheres.len() + self.capsules.len(),
        };
        if update.crowded() {
            warn!(
                "cloth collider count is high ({}), cloth simulation may misbehave",
                update.colliders
            );
        }
        update
    }

    /// Snapshot every bone while the animator is off.
    pub fn pose_begin<H>(&mut self, host: &mut H)
    where
        H: RagdollHost<Bone = B, Collider = C>,
    {
        if host.animator_enabled() == Some(true) {
            return;
        }
        self.snapshots.clear();
        for bone in host.skeleton_bones() {
            if let Some(local) = host.local_transform(bone) {
                self.snapshots.push(BoneSnapshot { bone, local });
            }
        }
    }

    /// Write the snapshot back and forget it.
    pub fn pose_end<H>(&mut self, host: &mut H)
    where
        H: RagdollHost<Bone = B, Collider = C>,
    {
        if host.animator_enabled() == Some(true) {
            return;
        }
        for snapshot in self.snapshots.drain(..) {
            host.set_local_transform(snapshot.bone, &snapshot.local);
        }
    }
}

impl<B, C, H> CharacterLifecycle<H> for RagdollRig<B, C>
where
    B: Copy + Eq + Hash + Debug,
    C: Copy + Eq + Debug,
    H: RagdollHost<Bone = B, Collider = C>,
{
    fn created(&mut self, host: &mut H) {
        self.build(host);
    }

    fn pose_begin(&mut self, host: &mut H) {
        RagdollRig::pose_begin(self, host);
    }

    fn pose_end(&mut self, host: &mut H) {
        RagdollRig::pose_end(self, host);
    }
}
