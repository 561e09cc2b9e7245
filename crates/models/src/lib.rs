pub mod db;
pub mod logging;
pub mod note;
pub mod session;
pub mod workspace;
