pub mod achievements;
pub mod content;
pub mod model;
pub mod rewards;
pub mod sequencer;
pub mod week;
pub mod wrong_notes;

pub use content::*;
pub use model::*;
pub use rewards::*;
pub use sequencer::*;
pub use week::*;
pub use wrong_notes::*;
