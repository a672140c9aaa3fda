pub mod events;
pub mod session;

pub use events::{Base64EncodedAudioBytes, ClientEvent, Item, ResponseConfig, ServerEvent};
pub use session::Session;
