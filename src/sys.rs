//! The engine's boundary with the desktop and with storage.

pub mod geometry;
pub mod headless;
pub mod store;
pub mod window;
