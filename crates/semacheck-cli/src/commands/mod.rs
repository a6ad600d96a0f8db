//! CLI command implementations

pub mod info;
pub mod list;
pub mod run;

pub use info::InfoCommand;
pub use list::ListCommand;
pub use run::RunCommand;
