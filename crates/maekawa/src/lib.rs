//! Library half of the `maekawa` demo binary, split out so integration tests
//! can drive the real TCP transport end to end instead of only the
//! socket-free harness in `maekawa-core`'s own test suite.

pub mod cli;
pub mod logging;
pub mod transport;
