pub mod consumer;
pub mod dispatcher;
pub mod immediate;
pub mod registry;

pub use consumer::{build_handlers, Consumer};
pub use dispatcher::UserDispatcherHandle;
pub use registry::DispatcherRegistry;
