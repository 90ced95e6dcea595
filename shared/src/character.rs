//! What the damage layer needs to know about a live character.
//!
//! The character system (meshes, materials, shape channels, the expression
//! player and the wardrobe) lives elsewhere; these traits are the only
//! surface the damage state touches.

use glam::Vec3;

/// Which cached parts of the character must be regenerated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    pub mesh: bool,
    pub slots: bool,
    pub textures: bool,
}

impl DirtyFlags {
    pub const MESH: Self = Self {
        mesh: true,
        slots: false,
        textures: false,
    };

    pub fn any(self) -> bool {
        self.mesh || self.slots || self.textures
    }
}

pub trait MaterialHost {
    /// Live handle to one material instance. Rebuilds may replace it.
    type Material: Clone;

    /// First material slot on `renderer` whose shader is `shader`.
    fn find_material(&self, renderer: &str, shader: &str) -> Option<(usize, Self::Material)>;
    fn set_material_float(&mut self, material: &Self::Material, param: &str, value: f32);
}

pub trait DeformationHost {
    /// Number of parameters in a shape channel, `None` if the character
    /// has no such channel.
    fn dna_len(&self, channel: &str) -> Option<usize>;
    fn dna_index(&self, channel: &str, parameter: &str) -> Option<usize>;
    fn dna_value(&self, channel: &str, index: usize) -> Option<f32>;
    fn set_dna_value(&mut self, channel: &str, index: usize, value: f32);
    fn mark_dirty(&mut self, flags: DirtyFlags);
}

pub trait ExpressionHost {
    /// Current expression buffer, `None` without an expression player.
    fn expression_values(&self) -> Option<Vec<f32>>;
    fn set_expression_values(&mut self, values: &[f32]);
}

pub trait WardrobeHost {
    fn worn_slots(&self) -> Vec<String>;
    /// Spawn a free physical replica of the item in `slot` and push it with
    /// `impulse` at `at`. Returns whether a replica was made.
    fn eject(&mut self, slot: &str, impulse: Vec3, at: Vec3) -> bool;
    fn clear_slot(&mut self, slot: &str);
    /// Rebuild the character after its wardrobe changed.
    fn build_character(&mut self);
}

pub trait CharacterHost: MaterialHost + DeformationHost + ExpressionHost + WardrobeHost {}

impl<T> CharacterHost for T where T: MaterialHost + DeformationHost + ExpressionHost + WardrobeHost {}
