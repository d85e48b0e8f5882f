pub mod cli;
pub mod handlers;
pub mod router;

pub use cli::{Cli, Command};
pub use router::{AppState, app_router};
