//! Component runtime.
//!
//! A [`Component`] is a long-running unit (today only the HTTP channel)
//! that owns its state and stops when the shared [`CancellationToken`]
//! fires. [`run_components`] drives them until all have exited.

use std::future::Future;
use std::pin::Pin;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::AppError;

pub type ComponentFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

pub trait Component: Send + 'static {
    /// Name used in log fields.
    fn id(&self) -> &str;

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture;
}

/// Run every component on its own task and wait for all of them.
///
/// A failing or panicking component cancels `shutdown`; the first failure
/// is returned after the others drain.
pub async fn run_components(
    components: Vec<Box<dyn Component>>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let mut tasks = JoinSet::new();
    for component in components {
        debug!(component = component.id(), "starting component");
        tasks.spawn(component.run(shutdown.clone()));
    }

    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        let err = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(e) => AppError::Comms(format!("component panicked: {e}")),
        };
        error!("component stopped: {err}");
        shutdown.cancel();
        failure.get_or_insert(err);
    }

    failure.map_or(Ok(()), Err)
}
