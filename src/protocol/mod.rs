pub mod events;
pub mod player;
pub mod tracks;

pub use events::*;
pub use player::*;
pub use tracks::*;
