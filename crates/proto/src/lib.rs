//! Protocol types for the blog API.
//!
//! Messages and the `BlogService` server and client are generated by
//! `tonic-build`; messages also derive serde so the same types serve the
//! gRPC codec and the HTTP/JSON gateway. Request messages implement
//! [`blog_core::Fields`] and [`blog_core::Defaultable`] for the request
//! pipeline.

pub mod v1;
