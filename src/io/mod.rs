//! Result artifacts written per simulation directory.

pub mod export;
