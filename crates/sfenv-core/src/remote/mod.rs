use std::future::Future;

mod client;

pub use client::{
    ApiErrorEntry, QueryError, QueryResponse, QueryResult, Record, RestConnection,
};

/// Capability to run a query against the org.
pub trait RemoteClient {
    fn query(&self, soql: &str) -> impl Future<Output = QueryResult<QueryResponse>> + Send;
}
