pub mod base;
pub mod bridge;
pub mod logging;
pub mod node;
pub mod playback;
pub mod server;
pub mod tenants;

pub use base::*;
pub use bridge::*;
pub use logging::*;
pub use node::*;
pub use playback::*;
pub use server::*;
pub use tenants::*;
