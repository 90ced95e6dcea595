//! Engine-independent hit response for damageable ragdoll characters.
//!
//! Everything here is plain data plus small host traits; the game client
//! implements the traits over its ECS world.

pub mod character;
pub mod config;
pub mod damage;
pub mod effects;
pub mod expression;
pub mod lifecycle;
pub mod patient;
pub mod pool;
pub mod ragdoll;
pub mod rng;
pub mod router;
pub mod time_scale;
pub mod timers;

pub use config::{ConfigError, PatientConfig};
pub use damage::{CharacterDamageState, Rebuild};
pub use lifecycle::{CharacterLifecycle, CharacterPhase};
pub use ragdoll::{RagdollRig, RagdollSettings};
pub use router::{DamageRouter, HitEvent};
pub use time_scale::TimeScaleController;
