//! Request handler wrappers that run in front of the application.

mod forwarded;

pub use forwarded::ForwardedMiddleware;
