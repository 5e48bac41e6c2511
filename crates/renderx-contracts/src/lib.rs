pub mod commands;
pub mod events;
pub mod models;
pub mod runs;
pub mod session;
