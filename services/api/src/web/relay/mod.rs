pub mod hub;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod ws_handler;

pub use hub::RelayHub;
pub use registry::SessionRegistry;
pub use service::{ChatRelay, RelayError};
pub use ws_handler::ws_handler;
