//! Persistent per-character damage: bruise materials, shape deltas,
//! expression offsets and punched-off wardrobe.
//!
//! Every layer keeps the character's baseline next to the accumulated
//! change, so [`CharacterDamageState::heal`] can always put it back.

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::character::{CharacterHost, DirtyFlags};
use crate::expression::Expression;
use crate::lifecycle::CharacterLifecycle;
use crate::router::HitEvent;

/// How much of the character has to be regenerated after a change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rebuild {
    #[default]
    None,
    /// Cached mesh deformation is stale.
    Mesh,
    /// The slot list changed.
    Full,
}

impl Rebuild {
    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn is_needed(self) -> bool {
        self != Self::None
    }

    pub fn is_full(self) -> bool {
        self == Self::Full
    }
}

// ── Configuration ───────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageableArea {
    pub area_id: String,
    /// Renderer holding the bruise material. Empty for no material layer.
    pub renderer: String,
    pub shader_name: String,
    pub material_param: String,
    pub material_force_factor: f32,
    pub expressions: Vec<ExpressionEffect>,
    pub dna: Vec<DnaEffect>,
}

impl Default for DamageableArea {
    fn default() -> Self {
        Self {
            area_id: String::new(),
            renderer: String::new(),
            shader_name: String::new(),
            material_param: String::new(),
            material_force_factor: 0.25,
            expressions: Vec::new(),
            dna: Vec::new(),
        }
    }
}

impl DamageableArea {
    pub fn new(area_id: impl Into<String>) -> Self {
        Self {
            area_id: area_id.into(),
            ..Default::default()
        }
    }

    pub fn with_material(
        mut self,
        renderer: impl Into<String>,
        shader_name: impl Into<String>,
        param: impl Into<String>,
        force_factor: f32,
    ) -> Self {
        self.renderer = renderer.into();
        self.shader_name = shader_name.into();
        self.material_param = param.into();
        self.material_force_factor = force_factor;
        self
    }

    pub fn with_dna(mut self, effect: DnaEffect) -> Self {
        self.dna.push(effect);
        self
    }

    pub fn with_expression(mut self, effect: ExpressionEffect) -> Self {
        self.expressions.push(effect);
        self
    }

    pub fn has_material(&self) -> bool {
        !self.renderer.is_empty() && !self.material_param.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnaEffect {
    pub channel: String,
    pub parameter: String,
    pub force_factor: f32,
    pub min_delta: f32,
    pub max_delta: f32,
}

impl Default for DnaEffect {
    fn default() -> Self {
        Self {
            channel: String::new(),
            parameter: String::new(),
            force_factor: 0.25,
            min_delta: -1.0,
            max_delta: 1.0,
        }
    }
}

impl DnaEffect {
    pub fn new(channel: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            parameter: parameter.into(),
            ..Default::default()
        }
    }

    pub fn with_factor(mut self, force_factor: f32) -> Self {
        self.force_factor = force_factor;
        self
    }

    pub fn with_band(mut self, min_delta: f32, max_delta: f32) -> Self {
        self.min_delta = min_delta;
        self.max_delta = max_delta;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionEffect {
    pub expression: Expression,
    pub force_factor: f32,
    pub min: f32,
    pub max: f32,
}

impl Default for ExpressionEffect {
    fn default() -> Self {
        Self {
            expression: Expression::JawOpenClose,
            force_factor: 0.25,
            min: -1.0,
            max: 1.0,
        }
    }
}

impl ExpressionEffect {
    pub fn new(expression: Expression) -> Self {
        Self {
            expression,
            ..Default::default()
        }
    }

    pub fn with_factor(mut self, force_factor: f32) -> Self {
        self.force_factor = force_factor;
        self
    }

    pub fn with_band(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

/// Wardrobe slot that flies off when hit at least this hard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PunchOffSlot {
    pub slot: String,
    pub min_force: f32,
}

impl Default for PunchOffSlot {
    fn default() -> Self {
        Self {
            slot: "Helmet".into(),
            min_force: 0.3,
        }
    }
}

/// Clamp into a band given in either order.
pub(crate) fn clamp_band(value: f32, a: f32, b: f32) -> f32 {
    value.clamp(a.min(b), a.max(b))
}

// ── Material bindings ───────────────────────────────────────────────

/// Identity of one shader parameter on one material slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    pub renderer: String,
    pub slot: usize,
    pub param: String,
}

#[derive(Clone, Debug)]
pub struct MaterialParam<M> {
    pub material: M,
    pub force_factor: f32,
    pub value: f32,
}

/// Many areas to one key, one running value per key.
#[derive(Clone, Debug)]
pub struct MaterialBindings<M> {
    areas: HashMap<String, MaterialKey>,
    values: HashMap<MaterialKey, MaterialParam<M>>,
}

impl<M> Default for MaterialBindings<M> {
    fn default() -> Self {
        Self {
            areas: HashMap::new(),
            values: HashMap::new(),
        }
    }
}

impl<M> MaterialBindings<M> {
    /// Bind `area` to `key`. The first area bound to a key sets its material
    /// and force factor; later aliases share them.
    pub fn bind(&mut self, area: &str, key: MaterialKey, material: M, force_factor: f32) {
        self.values.entry(key.clone()).or_insert(MaterialParam {
            material,
            force_factor,
            value: 0.0,
        });
        self.areas.insert(area.to_string(), key);
    }

    pub fn key(&self, area: &str) -> Option<&MaterialKey> {
        self.areas.get(area)
    }

    pub fn param(&self, key: &MaterialKey) -> Option<&MaterialParam<M>> {
        self.values.get(key)
    }

    pub fn value_for(&self, area: &str) -> Option<f32> {
        self.key(area).and_then(|key| self.values.get(key)).map(|p| p.value)
    }

    /// Read-modify-write the shared value behind `area`.
    pub fn accumulate(&mut self, area: &str, force: f32) -> Option<(&MaterialKey, &MaterialParam<M>)> {
        let key = self.areas.get(area)?;
        let param = self.values.get_mut(key)?;
        param.value = (param.value + force * param.force_factor).clamp(0.0, 1.0);
        Some((key, &*param))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MaterialKey, &MaterialParam<M>)> {
        self.values.iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (&MaterialKey, &mut MaterialParam<M>)> {
        self.values.iter_mut()
    }

    fn clear(&mut self) {
        self.areas.clear();
        self.values.clear();
    }
}

// ── Damage state ────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
struct DnaChannel {
    baseline: Vec<f32>,
    delta: Vec<f32>,
}

#[derive(Clone, Debug, Default)]
struct ExpressionBuffer {
    baseline: Vec<f32>,
    values: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct CharacterDamageState<M> {
    areas: Vec<DamageableArea>,
    area_index: HashMap<String, usize>,
    punch_off: Vec<PunchOffSlot>,
    materials: MaterialBindings<M>,
    dna: HashMap<String, DnaChannel>,
    expressions: Option<ExpressionBuffer>,
    created: bool,
}

impl<M: Clone> CharacterDamageState<M> {
    pub fn new(areas: Vec<DamageableArea>, punch_off: Vec<PunchOffSlot>) -> Self {
        let mut area_index = HashMap::new();
        for (index, area) in areas.iter().enumerate() {
            if area_index.insert(area.area_id.clone(), index).is_some() {
                warn!("damageable area '{}' is declared twice, the last one wins", area.area_id);
            }
        }
        Self {
            areas,
            area_index,
            punch_off,
            materials: MaterialBindings::default(),
            dna: HashMap::new(),
            expressions: None,
            created: false,
        }
    }

    pub fn area(&self, area_id: &str) -> Option<&DamageableArea> {
        self.area_index.get(area_id).map(|&i| &self.areas[i])
    }

    pub fn materials(&self) -> &MaterialBindings<M> {
        &self.materials
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn dna_delta(&self, channel: &str, index: usize) -> Option<f32> {
        self.dna.get(channel)?.delta.get(index).copied()
    }

    pub fn dna_baseline(&self, channel: &str, index: usize) -> Option<f32> {
        self.dna.get(channel)?.baseline.get(index).copied()
    }

    pub fn expression_values(&self) -> Option<&[f32]> {
        self.expressions.as_ref().map(|e| e.values.as_slice())
    }

    /// Apply one hit to every layer. Reports the rebuild the character needs.
    pub fn damage<H>(&mut self, hit: &HitEvent, host: &mut H) -> Rebuild
    where
        H: CharacterHost<Material = M>,
    {
        let force = hit.clamped_force();
        let mut rebuild = Rebuild::None;

        self.damage_material(&hit.area_id, force, host);
        if self.damage_dna(&hit.area_id, force, host) {
            host.mark_dirty(DirtyFlags::MESH);
            rebuild = rebuild.merge(Rebuild::Mesh);
        }
        self.damage_expressions(&hit.area_id, force, host);
        if self.punch_off(hit.position, hit.normal, force, host) {
            rebuild = rebuild.merge(Rebuild::Full);
        }
        rebuild
    }

    fn damage_material<H>(&mut self, area: &str, force: f32, host: &mut H)
    where
        H: CharacterHost<Material = M>,
    {
        if let Some((key, param)) = self.materials.accumulate(area, force) {
            host.set_material_float(&param.material, &key.param, param.value);
        }
    }

    fn damage_dna<H>(&mut self, area: &str, force: f32, host: &mut H) -> bool
    where
        H: CharacterHost<Material = M>,
    {
        let Some(&index) = self.area_index.get(area) else {
            return false;
        };
        let mut changed = false;
        for effect in &self.areas[index].dna {
            let Some(param) = host.dna_index(&effect.channel, &effect.parameter) else {
                warn!("shape parameter '{}/{}' not found", effect.channel, effect.parameter);
                continue;
            };
            let Some(channel) = self.dna.get_mut(&effect.channel) else {
                warn!("no baseline captured for shape channel '{}'", effect.channel);
                continue;
            };
            let (Some(&baseline), Some(delta)) =
                (channel.baseline.get(param), channel.delta.get_mut(param))
            else {
                warn!("shape parameter '{}/{}' is out of range", effect.channel, effect.parameter);
                continue;
            };
            *delta = clamp_band(*delta + force * effect.force_factor, effect.min_delta, effect.max_delta);
            host.set_dna_value(&effect.channel, param, baseline + *delta);
            changed = true;
        }
        changed
    }

    fn damage_expressions<H>(&mut self, area: &str, force: f32, host: &mut H)
    where
        H: CharacterHost<Material = M>,
    {
        let Some(&index) = self.area_index.get(area) else {
            return;
        };
        let effects = &self.areas[index].expressions;
        if effects.is_empty() {
            return;
        }
        let Some(buffer) = self.expressions.as_mut() else {
            debug!("no expression player, expression damage skipped");
            return;
        };
        for effect in effects {
            let Some(value) = buffer.values.get_mut(effect.expression.index()) else {
                warn!("expression {:?} is outside the expression buffer", effect.expression);
                continue;
            };
            *value = clamp_band(*value + force * effect.force_factor, effect.min, effect.max);
        }
        host.set_expression_values(&buffer.values);
    }

    fn punch_off<H>(&self, at: Vec3, normal: Vec3, force: f32, host: &mut H) -> bool
    where
        H: CharacterHost<Material = M>,
    {
        let slots: Vec<String> = host
            .worn_slots()
            .into_iter()
            .filter(|slot| {
                self.punch_off
                    .iter()
                    .find(|p| &p.slot == slot)
                    .is_some_and(|p| p.min_force <= force)
            })
            .collect();

        let impulse = (-normal + Vec3::Y) * force;
        for slot in &slots {
            if !host.eject(slot, impulse, at) {
                debug!("slot '{slot}' has no visual to eject");
            }
            host.clear_slot(slot);
        }
        if slots.is_empty() {
            return false;
        }
        host.build_character();
        true
    }

    /// Put every material, shape and expression value back to its baseline.
    /// Ejected wardrobe stays ejected.
    pub fn heal<H>(&mut self, host: &mut H) -> Rebuild
    where
        H: CharacterHost<Material = M>,
    {
        for (key, param) in self.materials.iter_mut() {
            param.value = 0.0;
            host.set_material_float(&param.material, &key.param, 0.0);
        }
        for (name, channel) in &mut self.dna {
            for (index, (baseline, delta)) in
                channel.baseline.iter().zip(channel.delta.iter_mut()).enumerate()
            {
                *delta = 0.0;
                host.set_dna_value(name, index, *baseline);
            }
        }
        if let Some(buffer) = self.expressions.as_mut() {
            buffer.values.clone_from(&buffer.baseline);
            host.set_expression_values(&buffer.values);
        }
        host.mark_dirty(DirtyFlags::MESH);
        Rebuild::Mesh
    }

    fn bind_materials<H>(&mut self, host: &H)
    where
        H: CharacterHost<Material = M>,
    {
        self.materials.clear();
        for area in self.areas.iter().filter(|a| a.has_material()) {
            let Some((slot, material)) = host.find_material(&area.renderer, &area.shader_name) else {
                warn!(
                    "no '{}' material on renderer '{}' for area '{}'",
                    area.shader_name, area.renderer, area.area_id
                );
                continue;
            };
            let key = MaterialKey {
                renderer: area.renderer.clone(),
                slot,
                param: area.material_param.clone(),
            };
            self.materials.bind(&area.area_id, key, material, area.material_force_factor);
        }
    }

    /// Swap in the live material handles after a rebuild and rewrite the
    /// accumulated values onto them.
    fn refresh_materials<H>(&mut self, host: &mut H)
    where
        H: CharacterHost<Material = M>,
    {
        for area in self.areas.iter().filter(|a| a.has_material()) {
            let Some((_, material)) = host.find_material(&area.renderer, &area.shader_name) else {
                continue;
            };
            let Some(key) = self.materials.areas.get(&area.area_id) else {
                continue;
            };
            if let Some(param) = self.materials.values.get_mut(key) {
                param.material = material;
                host.set_material_float(&param.material, &key.param, param.value);
            }
        }
    }

    fn capture_baselines<H>(&mut self, host: &H)
    where
        H: CharacterHost<Material = M>,
    {
        for effect in self.areas.iter().flat_map(|a| &a.dna) {
            if self.dna.contains_key(&effect.channel) {
                continue;
            }
            let Some(len) = host.dna_len(&effect.channel) else {
                warn!("character has no shape channel '{}'", effect.channel);
                continue;
            };
            let baseline: Vec<f32> = (0..len)
                .map(|i| host.dna_value(&effect.channel, i).unwrap_or_default())
                .collect();
            self.dna.insert(
                effect.channel.clone(),
                DnaChannel {
                    delta: vec![0.0; baseline.len()],
                    baseline,
                },
            );
        }
        self.expressions = host.expression_values().map(|baseline| ExpressionBuffer {
            values: baseline.clone(),
            baseline,
        });
    }
}

impl<M, H> CharacterLifecycle<H> for CharacterDamageState<M>
where
    M: Clone,
    H: CharacterHost<Material = M>,
{
    /// First build scans the character. A repeated creation of the same
    /// instance only refreshes material handles and keeps what accumulated.
    fn created(&mut self, host: &mut H) {
        if self.areas.is_empty() {
            return;
        }
        if self.created {
            self.refresh_materials(host);
            return;
        }
        self.bind_materials(host);
        self.capture_baselines(host);
        self.created = true;
    }

    fn pose_end(&mut self, host: &mut H) {
        if self.created {
            self.refresh_materials(host);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{DeformationHost, ExpressionHost, MaterialHost, WardrobeHost};

    #[derive(Default)]
    struct Face {
        generation: u32,
        shader_params: HashMap<(u32, String), f32>,
        dna: HashMap<String, Vec<(String, f32)>>,
        expressions: Option<Vec<f32>>,
        worn: Vec<String>,
        ejected: Vec<(String, Vec3)>,
        dirty: u32,
        builds: u32,
    }

    impl MaterialHost for Face {
        type Material = u32;
        fn find_material(&self, renderer: &str, shader: &str) -> Option<(usize, u32)> {
            (renderer == "Face" && shader == "Bruise").then_some((0, self.generation))
        }
        fn set_material_float(&mut self, material: &u32, param: &str, value: f32) {
            self.shader_params.insert((*material, param.to_string()), value);
        }
    }

    impl DeformationHost for Face {
        fn dna_len(&self, channel: &str) -> Option<usize> {
            self.dna.get(channel).map(Vec::len)
        }
        fn dna_index(&self, channel: &str, parameter: &str) -> Option<usize> {
            self.dna.get(channel)?.iter().position(|(n, _)| n == parameter)
        }
        fn dna_value(&self, channel: &str, index: usize) -> Option<f32> {
            self.dna.get(channel)?.get(index).map(|(_, v)| *v)
        }
        fn set_dna_value(&mut self, channel: &str, index: usize, value: f32) {
            if let Some(slot) = self.dna.get_mut(channel).and_then(|c| c.get_mut(index)) {
                slot.1 = value;
            }
        }
        fn mark_dirty(&mut self, _: DirtyFlags) {
            self.dirty += 1;
        }
    }

    impl ExpressionHost for Face {
        fn expression_values(&self) -> Option<Vec<f32>> {
            self.expressions.clone()
        }
        fn set_expression_values(&mut self, values: &[f32]) {
            self.expressions = Some(values.to_vec());
        }
    }

    impl WardrobeHost for Face {
        fn worn_slots(&self) -> Vec<String> {
            self.worn.clone()
        }
        fn eject(&mut self, slot: &str, impulse: Vec3, _: Vec3) -> bool {
            self.ejected.push((slot.to_string(), impulse));
            true
        }
        fn clear_slot(&mut self, slot: &str) {
            self.worn.retain(|s| s != slot);
        }
        fn build_character(&mut self) {
            self.builds += 1;
        }
    }

    fn face() -> Face {
        Face {
            dna: HashMap::from([(
                "head".to_string(),
                vec![("noseFlatten".to_string(), 0.5), ("jawWidth".to_string(), 0.2)],
            )]),
            expressions: Some(vec![0.1; Expression::COUNT]),
            ..Default::default()
        }
    }

    fn cheeks() -> Vec<DamageableArea> {
        vec![
            DamageableArea::new("cheekLeft").with_material("Face", "Bruise", "_Damage", 1.0),
            DamageableArea::new("cheekRight").with_material("Face", "Bruise", "_Damage", 1.0),
        ]
    }

    fn hit(area: &str, force: f32) -> HitEvent {
        HitEvent::new(area, Vec3::ZERO, Vec3::Z, force)
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn aliased_areas_share_one_value() {
        let mut host = face();
        let mut state = CharacterDamageState::<u32>::new(cheeks(), vec![]);
        state.created(&mut host);

        state.damage(&hit("cheekLeft", 0.5), &mut host);
        state.damage(&hit("cheekRight", 0.5), &mut host);

        assert_eq!(state.materials().len(), 1);
        assert_eq!(state.materials().value_for("cheekLeft"), Some(1.0));
        assert_eq!(host.shader_params[&(0, "_Damage".to_string())], 1.0);

        state.damage(&hit("cheekRight", 0.9), &mut host);
        assert_eq!(state.materials().value_for("cheekLeft"), Some(1.0));
    }

    #[test]
    fn dna_stays_inside_its_band() {
        let mut host = face();
        let areas = vec![
            DamageableArea::new("nose").with_dna(DnaEffect::new("head", "noseFlatten").with_band(-0.1, 0.3)),
        ];
        let mut state = CharacterDamageState::<u32>::new(areas, vec![]);
        state.created(&mut host);

        for _ in 0..10 {
            let rebuild = state.damage(&hit("nose", 1.0), &mut host);
            assert_eq!(rebuild, Rebuild::Mesh);
        }
        assert!(close(state.dna_delta("head", 0).unwrap(), 0.3));
        assert!(close(host.dna_value("head", 0).unwrap(), 0.8));
        assert_eq!(host.dirty, 10);
    }

    #[test]
    fn negative_factor_stops_at_the_lower_band() {
        let mut host = face();
        let areas = vec![DamageableArea::new("nose").with_dna(
            DnaEffect::new("head", "noseFlatten").with_factor(-0.25).with_band(-0.3, 0.3),
        )];
        let mut state = CharacterDamageState::<u32>::new(areas, vec![]);
        state.created(&mut host);

        state.damage(&hit("nose", 1.0), &mut host);
        assert!(close(state.dna_delta("head", 0).unwrap(), -0.25));
        assert!(close(host.dna_value("head", 0).unwrap(), 0.25));

        state.damage(&hit("nose", 1.0), &mut host);
        assert!(close(state.dna_delta("head", 0).unwrap(), -0.3));
        assert!(close(host.dna_value("head", 0).unwrap(), 0.2));
    }

    #[test]
    fn inverted_dna_band_is_normalised() {
        let mut host = face();
        let areas = vec![DamageableArea::new("jaw").with_dna(DnaEffect::new("head", "jawWidth").with_band(0.1, -0.1))];
        let mut state = CharacterDamageState::<u32>::new(areas, vec![]);
        state.created(&mut host);
        state.damage(&hit("jaw", 1.0), &mut host);
        assert!(close(state.dna_delta("head", 1).unwrap(), 0.1));
    }

    #[test]
    fn unknown_shape_parameter_is_skipped() {
        let mut host = face();
        let areas = vec![
            DamageableArea::new("nose")
                .with_dna(DnaEffect::new("head", "earSize"))
                .with_dna(DnaEffect::new("head", "noseFlatten")),
        ];
        let mut state = CharacterDamageState::<u32>::new(areas, vec![]);
        state.created(&mut host);
        assert_eq!(state.damage(&hit("nose", 0.4), &mut host), Rebuild::Mesh);
        assert!(close(state.dna_delta("head", 0).unwrap(), 0.1));
    }

    #[test]
    fn expressions_accumulate_and_clamp() {
        let mut host = face();
        let areas = vec![DamageableArea::new("jaw").with_expression(
            ExpressionEffect::new(Expression::JawOpenClose).with_factor(0.5).with_band(0.0, 0.6),
        )];
        let mut state = CharacterDamageState::<u32>::new(areas, vec![]);
        state.created(&mut host);

        assert_eq!(state.damage(&hit("jaw", 0.8), &mut host), Rebuild::None);
        let jaw = Expression::JawOpenClose.index();
        assert!(close(host.expressions.as_ref().unwrap()[jaw], 0.5));
        state.damage(&hit("jaw", 0.8), &mut host);
        assert!(close(host.expressions.as_ref().unwrap()[jaw], 0.6));
    }

    #[test]
    fn helmets_fly_off_above_threshold() {
        let mut host = face();
        host.worn = vec!["Helmet".into(), "Shirt".into()];
        let mut state = CharacterDamageState::<u32>::new(vec![], vec![PunchOffSlot::default()]);

        assert_eq!(state.damage(&hit("head", 0.2), &mut host), Rebuild::None);
        assert_eq!(state.damage(&hit("head", 0.5), &mut host), Rebuild::Full);
        assert_eq!(host.worn, vec!["Shirt".to_string()]);
        assert_eq!(host.builds, 1);
        let (slot, impulse) = &host.ejected[0];
        assert_eq!(slot, "Helmet");
        assert_eq!(*impulse, Vec3::new(0.0, 0.5, -0.5));
    }

    #[test]
    fn heal_restores_baselines_but_not_wardrobe() {
        let mut host = face();
        host.worn = vec!["Helmet".into()];
        let areas = vec![
            DamageableArea::new("cheekLeft")
                .with_material("Face", "Bruise", "_Damage", 1.0)
                .with_dna(DnaEffect::new("head", "noseFlatten"))
                .with_expression(ExpressionEffect::new(Expression::LeftEyeOpenClose)),
        ];
        let mut state = CharacterDamageState::<u32>::new(areas, vec![PunchOffSlot::default()]);
        state.created(&mut host);
        state.damage(&hit("cheekLeft", 0.9), &mut host);

        assert_eq!(state.heal(&mut host), Rebuild::Mesh);
        assert_eq!(state.materials().value_for("cheekLeft"), Some(0.0));
        assert_eq!(state.dna_delta("head", 0), Some(0.0));
        assert!(close(host.dna_value("head", 0).unwrap(), 0.5));
        assert_eq!(host.expressions, Some(vec![0.1; Expression::COUNT]));
        assert!(host.worn.is_empty());
    }

    #[test]
    fn rebuild_keeps_values_on_new_materials() {
        let mut host = face();
        let mut state = CharacterDamageState::<u32>::new(cheeks(), vec![]);
        state.created(&mut host);
        state.damage(&hit("cheekLeft", 0.3), &mut host);

        host.generation = 1;
        state.pose_end(&mut host);
        assert!(close(host.shader_params[&(1, "_Damage".to_string())], 0.3));

        // a second creation of the same character keeps the accumulated value
        host.generation = 2;
        state.created(&mut host);
        assert!(close(host.shader_params[&(2, "_Damage".to_string())], 0.3));
        assert!(close(state.materials().value_for("cheekRight").unwrap(), 0.3));
    }

    #[test]
    fn missing_renderer_leaves_area_unbound() {
        let mut host = face();
        let areas = vec![DamageableArea::new("ear").with_material("Ears", "Bruise", "_Damage", 1.0)];
        let mut state = CharacterDamageState::<u32>::new(areas, vec![]);
        state.created(&mut host);
        assert!(state.materials().is_empty());
        assert_eq!(state.damage(&hit("ear", 1.0), &mut host), Rebuild::None);
    }
}
