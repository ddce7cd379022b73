//! Domain entities - Core business objects with no external dependencies

pub mod artifact;
pub mod command;
pub mod descriptor;
pub mod event;

pub use artifact::Artifact;
pub use command::{Command, CommandHandler, CommandRegistry};
pub use descriptor::{Dependency, ModuleDescriptor, VersionRequirement};
pub use event::Event;
