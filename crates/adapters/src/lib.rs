pub mod backend;
pub mod export;
pub mod mysql;
pub mod sqlite;
