pub mod app;
pub mod handlers;
pub mod worker;

pub use app::{App, Backends};
pub use handlers::{HandlerError, MessageHandler, Topics};
