pub mod config;
pub mod history;
pub mod logging;
pub mod run;
pub mod send;
