pub mod app;
pub mod layout;
pub mod preset;
