pub mod knowledge;
pub mod memory;
pub mod mirrored;
pub mod openai;
pub mod remote;
pub mod sqlite;
