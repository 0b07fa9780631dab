//! Provides abstractions over the external programs we control brightness with

pub mod backlight;
