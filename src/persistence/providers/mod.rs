pub mod firebase;
pub mod memory;
