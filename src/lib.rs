//! Blog API server: a gRPC service and an HTTP/JSON gateway sharing one
//! authentication, authorization, defaulting and validation pipeline.

pub mod aggregate;
pub mod authz;
pub mod biz;
pub mod config;
pub mod context;
pub mod middleware;
pub mod server;
pub mod services;
pub mod startup;
pub mod validation;
