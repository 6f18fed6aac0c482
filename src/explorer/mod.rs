pub mod action;
pub mod app_map;
pub mod crawler;
pub mod driver;
pub mod recovery;
pub mod screenshots;
pub mod world_state;
