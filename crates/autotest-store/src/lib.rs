//! Collaborator adapters for AutoTest: an in-process datastore and a
//! course portal backed by static configuration.

pub mod course;
pub mod memory;

pub use course::{CourseConfig, StaticCoursePortal};
pub use memory::MemoryDataStore;
