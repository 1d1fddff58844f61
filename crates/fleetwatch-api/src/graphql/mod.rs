// GraphQL over HTTP: request envelope, response unwrapping, trip queries.

mod client;
pub mod queries;

pub use client::{GraphqlClient, GraphqlResponse};
