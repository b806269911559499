pub mod doorkeeper;
pub mod frequency_sketch;
pub mod slot_arena;

pub use doorkeeper::Doorkeeper;
pub use frequency_sketch::FrequencySketch;
pub use slot_arena::{SlotArena, SlotId};
