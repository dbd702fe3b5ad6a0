pub mod message;
pub mod pool;
pub mod voice;

pub use pool::{StealPolicy, VoicePool, VoiceSlot};
pub use voice::{NoteEvent, Voice, VoiceState};
