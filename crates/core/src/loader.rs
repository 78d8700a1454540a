//! Async page loading
//!
//! Runs the [`LoadTicket`]s issued by a [`ReaderPageController`] against a
//! [`ByteFetcher`] and publishes the bytes through a [`ResourceHost`]. A load
//! never decides on its own whether its result is still wanted: it always
//! reports back, and the controller discards whatever arrives for a
//! superseded session or an aborted load.

use std::sync::Arc;

use nview_render::{app_blob_url, probe_dimensions, ByteFetcher, FetchError, FetchOptions, ResourceHost};
use tokio::task::JoinSet;

use crate::reader::{LoadCompletion, LoadFailure, LoadOutcome, LoadTicket, ReaderPageController};

/// Fetches page bytes and turns them into renderable resources
pub struct PageLoader<F> {
    fetcher: F,
    host: Arc<dyn ResourceHost>,
}

impl<F: ByteFetcher> PageLoader<F> {
    pub fn new(fetcher: F, host: Arc<dyn ResourceHost>) -> Self {
        Self { fetcher, host }
    }

    /// Run one ticket to completion
    pub async fn load(&self, ticket: LoadTicket) -> LoadCompletion {
        let outcome = self.fetch_page(&ticket).await;
        ticket.complete(outcome)
    }

    async fn fetch_page(&self, ticket: &LoadTicket) -> LoadOutcome {
        let url = app_blob_url(&ticket.path);
        let options = FetchOptions::app_blob(Some(ticket.cancel.clone()));

        let response = match self.fetcher.fetch(&url, &options).await {
            Ok(response) => response,
            Err(FetchError::Aborted) => return LoadOutcome::Aborted,
            Err(FetchError::Transport(error)) => return LoadOutcome::Failed(LoadFailure::Network(error)),
        };
        if !response.is_success() {
            return LoadOutcome::Failed(LoadFailure::Http { status: response.status });
        }

        let Some(metadata) = probe_dimensions(&response.body) else {
            return LoadOutcome::Failed(LoadFailure::Decode);
        };
        let resource = self.host.create_resource(response.body, metadata.mime_type);
        LoadOutcome::Loaded { resource, natural_size: Some((metadata.width, metadata.height)) }
    }
}

/// Run loads until the controller stops issuing them
///
/// Completions are applied as they settle, which may issue further loads.
/// Returns the number of completions applied.
pub async fn drain_loads<F>(controller: &mut ReaderPageController, loader: &Arc<PageLoader<F>>) -> usize
where
    F: ByteFetcher + 'static,
{
    let mut tasks = JoinSet::new();
    let mut settled = 0;

    loop {
        for ticket in controller.take_load_requests() {
            let loader = Arc::clone(loader);
            tasks.spawn(async move { loader.load(ticket).await });
        }

        let Some(joined) = tasks.join_next().await else {
            return settled;
        };
        match joined {
            Ok(completion) => {
                controller.complete_load(completion);
                settled += 1;
            }
            Err(error) => tracing::warn!(%error, "page load task failed"),
        }
    }
}
