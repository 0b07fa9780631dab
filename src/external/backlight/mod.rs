//! Access to display and keyboard backlights through external tools

pub mod brightnessctl;
pub mod interface;
#[cfg(test)]
pub mod mock;

pub use interface::*;
