use std::future::Future;
use std::time::Duration;

use ruledb_core::{Error, Result};

/// Run `fut` under `limit`; on expiry return the error built by `on_timeout`.
pub(crate) async fn bounded<T, F>(limit: Duration, fut: F, on_timeout: impl FnOnce() -> Error) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
