pub mod chart;
pub mod config;
pub mod dashboard;
pub mod device;
pub mod logging;
pub mod model;
pub mod view;
