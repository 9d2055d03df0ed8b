pub mod connection;
pub mod operations;
pub mod session;

pub use session::PgSession;
