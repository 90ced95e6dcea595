use serde::{Deserialize, Serialize};

/// Points in a character's build cycle, in the order they happen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterPhase {
    /// First complete build of the character instance.
    Created,
    /// Pose data is about to be rewritten.
    PoseBegin,
    /// Pose data was rewritten.
    PoseEnd,
}

/// Implemented by anything that must follow a character through its builds.
/// The owner calls the phases in order; nothing subscribes behind its back.
pub trait CharacterLifecycle<H: ?Sized> {
    fn created(&mut self, host: &mut H);

    fn pose_begin(&mut self, _host: &mut H) {}

    fn pose_end(&mut self, _host: &mut H) {}

    fn on_phase(&mut self, phase: CharacterPhase, host: &mut H) {
        match phase {
            CharacterPhase::Created => self.created(host),
            CharacterPhase::PoseBegin => self.pose_begin(host),
            CharacterPhase::PoseEnd => self.pose_end(host),
        }
    }
}
