pub mod apps;
pub mod instances;
pub mod run;
pub mod serve;

// Re-export command functions for convenience
pub use apps::{add, info, list, remove, AddParams};
pub use instances::{cleanup, health, reload, status};
pub use run::{run, RunParams};
pub use serve::{serve, ServeParams};

use anyhow::{anyhow, Result};

use devports::coordinator::{ClientConfig, ClientError, CoordinatorClient};

/// Client for the coordinator named by `$DEVPORTS_URL`
pub(crate) fn connect() -> Result<CoordinatorClient> {
    Ok(CoordinatorClient::new(ClientConfig::from_env())?)
}

/// Turn a client error into a message a person can act on
pub(crate) fn explain(client: &CoordinatorClient, err: ClientError) -> anyhow::Error {
    if err.is_unavailable() {
        anyhow!(
            "Coordinator is not running at {}.\nStart it with: devports serve",
            client.base_url()
        )
    } else {
        anyhow!(err)
    }
}
