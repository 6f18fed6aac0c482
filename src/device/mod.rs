pub mod controller;
pub mod fake;
pub mod session;
pub mod simctl;
pub mod simulator;
