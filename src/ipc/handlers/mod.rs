pub mod applications;
pub mod assignments;
pub mod core;
pub mod grades;
pub mod modules;
pub mod schedule;
pub mod setup;
