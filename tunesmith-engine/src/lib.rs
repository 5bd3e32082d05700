pub mod catalog;
pub mod session;
pub mod synth;
pub mod traits;
pub mod workspace;
