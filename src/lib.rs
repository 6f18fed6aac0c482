pub mod cli;
pub mod device;
pub mod error;
pub mod explorer;
pub mod reconcile;
pub mod report;
pub mod screen;
pub mod trace;
