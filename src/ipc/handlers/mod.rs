pub mod agrps;
pub mod core;
pub mod courses;
pub mod events;
pub mod ordering;
pub mod settings;
pub mod sortlist;
