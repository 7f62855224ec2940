pub mod command;
pub mod identify;
pub mod list;
pub mod program;
