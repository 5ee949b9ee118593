pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod sabnzbd;
pub mod torznab;

pub use routes::create_router;
