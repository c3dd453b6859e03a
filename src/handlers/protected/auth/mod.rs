pub mod session;

pub use session::me as session_me;
