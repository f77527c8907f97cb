pub mod criterion;
pub mod error;
pub mod exec;
pub mod io;
pub mod monitor;
pub mod orchestrator;
pub mod parser;
pub mod paths;
pub mod prompt;
pub mod settings;
pub mod skills;
pub mod store;
pub mod types;
pub mod verifier;

pub use error::{ForchError, Result};
