pub mod auth;
pub mod transaction;
pub mod user;
pub mod wallet;

mod router;
pub use router::get_router;
