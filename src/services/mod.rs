//! gRPC service implementations.

mod blog;

pub use blog::BlogServer;
