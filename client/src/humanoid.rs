//! A procedural stand-in humanoid: named bones, two renderers, shape
//! channels, a helmet and a cape. Matches the bone and renderer names used
//! by `assets/patient.ron`.

use bevy::prelude::*;

use crate::character::{
    Bones, DnaChannel, DnaChannels, ExpressionPlayer, Renderer, ShaderMaterial, Wardrobe, WardrobeItem,
};
use crate::ragdoll::Cloth;

/// `(bone, parent, offset from parent)`, parents first.
pub const SKELETON: &[(&str, Option<&str>, Vec3)] = &[
    ("Hips", None, Vec3::new(0.0, 1.0, 0.0)),
    ("Spine", Some("Hips"), Vec3::new(0.0, 0.12, 0.0)),
    ("Chest", Some("Spine"), Vec3::new(0.0, 0.18, 0.0)),
    ("Neck", Some("Chest"), Vec3::new(0.0, 0.22, 0.0)),
    ("Head", Some("Neck"), Vec3::new(0.0, 0.1, 0.0)),
    ("Jaw", Some("Head"), Vec3::new(0.0, -0.04, 0.07)),
    ("LeftUpperArm", Some("Chest"), Vec3::new(0.18, 0.16, 0.0)),
    ("LeftLowerArm", Some("LeftUpperArm"), Vec3::new(0.28, 0.0, 0.0)),
    ("LeftHand", Some("LeftLowerArm"), Vec3::new(0.25, 0.0, 0.0)),
    ("RightUpperArm", Some("Chest"), Vec3::new(-0.18, 0.16, 0.0)),
    ("RightLowerArm", Some("RightUpperArm"), Vec3::new(-0.28, 0.0, 0.0)),
    ("RightHand", Some("RightLowerArm"), Vec3::new(-0.25, 0.0, 0.0)),
    ("LeftUpperLeg", Some("Hips"), Vec3::new(0.1, -0.06, 0.0)),
    ("LeftLowerLeg", Some("LeftUpperLeg"), Vec3::new(0.0, -0.42, 0.0)),
    ("LeftFoot", Some("LeftLowerLeg"), Vec3::new(0.0, -0.42, 0.0)),
    ("RightUpperLeg", Some("Hips"), Vec3::new(-0.1, -0.06, 0.0)),
    ("RightLowerLeg", Some("RightUpperLeg"), Vec3::new(0.0, -0.42, 0.0)),
    ("RightFoot", Some("RightLowerLeg"), Vec3::new(0.0, -0.42, 0.0)),
];

pub const HEAD_SHAPES: &[&str] = &[
    "headSize",
    "foreheadSize",
    "noseSize",
    "noseFlatten",
    "cheekSize",
    "jawsSize",
    "earsSize",
];

pub const BODY_SHAPES: &[&str] = &["upperMuscle", "belly", "waist"];

/// Resting value of every shape parameter.
pub const SHAPE_BASELINE: f32 = 0.5;

/// Give `patient` the humanoid model.
pub fn build(world: &mut World, patient: Entity) {
    let mut bones = Bones::default();
    for &(name, parent, offset) in SKELETON {
        let parent = parent.and_then(|p| bones.get(p).copied()).unwrap_or(patient);
        let bone = world
            .spawn((Name::new(name), Transform::from_translation(offset), ChildOf(parent)))
            .id();
        bones.insert(name.to_string(), bone);
    }
    let head = bones.get("Head").copied().unwrap_or(patient);
    let chest = bones.get("Chest").copied().unwrap_or(patient);

    world.spawn((
        Name::new("Body"),
        Renderer {
            name: "Body".into(),
            materials: vec![ShaderMaterial::new("Skin"), ShaderMaterial::new("Bruise")],
        },
        Transform::default(),
        ChildOf(patient),
    ));
    world.spawn((
        Name::new("Face"),
        Renderer {
            name: "Face".into(),
            materials: vec![ShaderMaterial::new("FaceSkin"), ShaderMaterial::new("Bruise")],
        },
        Transform::default(),
        ChildOf(head),
    ));
    let helmet = world
        .spawn((
            Name::new("Helmet"),
            WardrobeItem {
                slot: "Helmet".into(),
            },
            Transform::from_xyz(0.0, 0.12, 0.0),
            ChildOf(head),
        ))
        .id();
    world.spawn((
        Name::new("Cape"),
        Cloth::default(),
        Transform::from_xyz(0.0, 0.0, -0.12),
        ChildOf(chest),
    ));

    let mut dna = DnaChannels::default();
    dna.insert("head".into(), DnaChannel::new(HEAD_SHAPES.iter().copied(), SHAPE_BASELINE));
    dna.insert("body".into(), DnaChannel::new(BODY_SHAPES.iter().copied(), SHAPE_BASELINE));

    let mut wardrobe = Wardrobe::default();
    wardrobe.worn.insert("Helmet".into(), Some(helmet));
    // worn, but drawn as part of the body
    wardrobe.worn.insert("Shirt".into(), None);

    if let Ok(mut entity) = world.get_entity_mut(patient) {
        entity.insert((bones, dna, ExpressionPlayer::default(), wardrobe));
    }
}
