pub mod effects;
pub mod process;
pub mod session;
