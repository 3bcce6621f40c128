use tracing::{debug, info};

use crate::remote::{QueryError, QueryResponse, RemoteClient};

/// The one query the runner issues.
pub const ACCOUNT_QUERY: &str = "SELECT Id, Name FROM Account";

/// Destination for the outcome of a query run.
pub trait QueryOutput {
    /// Receives the full response exactly as returned by the client.
    fn rows(&mut self, response: &QueryResponse);
    fn error(&mut self, error: &QueryError);
}

/// Runs [`ACCOUNT_QUERY`] once and reports the outcome.
pub struct AccountQueryRunner<C> {
    client: C,
}

impl<C> AccountQueryRunner<C>
where
    C: RemoteClient,
{
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Returns whether the query succeeded; the outcome itself goes to `output`.
    pub async fn run<O>(&self, output: &mut O) -> bool
    where
        O: QueryOutput,
    {
        debug!(query = ACCOUNT_QUERY, "running account query");
        match self.client.query(ACCOUNT_QUERY).await {
            Ok(response) => {
                info!(
                    total_size = response.total_size,
                    done = response.done,
                    "account query succeeded"
                );
                output.rows(&response);
                true
            }
            Err(err) => {
                output.error(&err);
                false
            }
        }
    }
}
