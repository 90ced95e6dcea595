//! One-shot hit sounds.
//!
//! Effects only name a clip. Names are queued in [`HitSounds`]; with the
//! `audio` feature they are played through bevy_seedling, otherwise they are
//! dropped at the end of the frame.

use bevy::prelude::*;
#[cfg(feature = "audio")]
use bevy_seedling::prelude::*;
use knockout_shared::router::AudioSink;

use crate::character::PatientWorld;

/// Folder hit sound clips are loaded from, `<clip>.ogg` inside it.
pub const HIT_SOUNDS_DIR: &str = "audio/sfx";

pub fn plugin(app: &mut App) {
    app.init_resource::<HitSounds>();
    #[cfg(feature = "audio")]
    app.add_systems(Update, play_hit_sounds);
    #[cfg(not(feature = "audio"))]
    app.add_systems(Last, drop_hit_sounds);
}

#[derive(Resource, Default, Debug)]
pub struct HitSounds {
    queued: Vec<String>,
}

impl HitSounds {
    pub fn push(&mut self, clip: impl Into<String>) {
        self.queued.push(clip.into());
    }

    pub fn queued(&self) -> &[String] {
        &self.queued
    }

    pub fn drain(&mut self) -> impl Iterator<Item = String> + '_ {
        self.queued.drain(..)
    }
}

#[cfg(feature = "audio")]
fn play_hit_sounds(mut sounds: ResMut<HitSounds>, assets: Res<AssetServer>, mut cmds: Commands) {
    for clip in sounds.drain() {
        let handle: Handle<AudioSample> = assets.load(format!("{HIT_SOUNDS_DIR}/{clip}.ogg"));
        cmds.spawn(SamplePlayer::new(handle));
    }
}

#[cfg(not(feature = "audio"))]
fn drop_hit_sounds(mut sounds: ResMut<HitSounds>) {
    if sounds.queued.is_empty() {
        return;
    }
    for clip in sounds.drain() {
        debug!("hit sound '{clip}' (audio disabled)");
    }
}

impl PatientWorld<'_> {
    pub fn has_audio(&self) -> bool {
        self.world().contains_resource::<HitSounds>()
    }
}

impl AudioSink for PatientWorld<'_> {
    fn play_one_shot(&mut self, clip: &str) {
        if let Some(mut sounds) = self.world_mut().get_resource_mut::<HitSounds>() {
            sounds.push(clip);
        }
    }
}
