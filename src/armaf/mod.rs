//! A minimal actor toolkit on top of Tokio tasks: request/response ports and
//! lifecycle handles for child tasks.

mod ports;

#[doc(inline)]
pub use ports::*;

#[cfg(test)]
mod test_ports;
