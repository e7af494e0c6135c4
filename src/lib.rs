pub mod client;
pub mod config;
pub mod db;
pub mod events;
pub mod grouptool;
pub mod ipc;
pub mod render;
pub mod reorder;
pub mod session;
pub mod sortlist;
