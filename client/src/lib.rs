//! Punchable ragdoll patients for Bevy.
//!
//! Add [`plugin`] next to avian's `PhysicsPlugins`, spawn a patient with
//! [`patient::PatientCommands::spawn_patient`] and report hits from your own
//! ray casts with [`damage::Punch`]. The patient answers with effect
//! triggers, bruises, shape damage, a knocked-off helmet and, once its
//! health runs out, a ragdoll knockout in slow motion.

use bevy::prelude::*;

pub mod animation;
pub mod audio;
pub mod character;
pub mod damage;
pub mod effects;
pub mod humanoid;
pub mod patient;
pub mod ragdoll;
pub mod time_scale;

pub use knockout_shared as shared;

pub fn plugin(app: &mut App) {
    // the order is important
    // be sure you use resources/types AFTER you add plugins that insert them
    app.add_plugins((
        time_scale::plugin,
        audio::plugin,
        animation::plugin,
        effects::plugin,
        character::plugin,
        ragdoll::plugin,
        damage::plugin,
        patient::plugin,
    ));
}
