//! Control-layer actors - the brightness controller and what drives it

pub mod brightness_controller;
pub mod indicator_adapter;
pub mod poller;
pub mod session;
