// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "catalog/mod.rs"]
pub mod catalog;

#[path = "images/mod.rs"]
pub mod images;
