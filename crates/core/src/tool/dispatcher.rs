use std::sync::Arc;

use cinescout_catalog::MediaCatalog;
use cinescout_model::{ModelTool, ToolCallRequest};
use futures_util::future::BoxFuture;
use serde_json::{Value, json};
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::tool::{
    AnyTool, Discover, Error, GetTrending, PresentResults, SearchMedia,
    ToolName, ToolObject,
};

/// The output of one tool call, ready to be folded into the transcript.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutput {
    /// The identifier of the call this output answers.
    pub call_id: String,
    /// The result, or an error payload if the call failed.
    pub result: Value,
}

/// Routes tool calls from the model to their handlers.
///
/// The tool catalog is fixed: every [`ToolName`] has exactly one handler.
pub struct Dispatcher {
    search_media: Box<dyn ToolObject>,
    discover_movies: Box<dyn ToolObject>,
    discover_tv: Box<dyn ToolObject>,
    get_trending: Box<dyn ToolObject>,
    present_results: Box<dyn ToolObject>,
}

impl Dispatcher {
    /// Creates a dispatcher whose handlers query `catalog`.
    pub fn new(catalog: Arc<dyn MediaCatalog>) -> Self {
        Self {
            search_media: Box::new(AnyTool::new(SearchMedia::new(Arc::clone(
                &catalog,
            )))),
            discover_movies: Box::new(AnyTool::new(Discover::movies(
                Arc::clone(&catalog),
            ))),
            discover_tv: Box::new(AnyTool::new(Discover::tv(Arc::clone(
                &catalog,
            )))),
            get_trending: Box::new(AnyTool::new(GetTrending::new(catalog))),
            present_results: Box::new(AnyTool::new(PresentResults)),
        }
    }

    fn handler(&self, name: ToolName) -> &dyn ToolObject {
        match name {
            ToolName::SearchMedia => self.search_media.as_ref(),
            ToolName::DiscoverMovies => self.discover_movies.as_ref(),
            ToolName::DiscoverTv => self.discover_tv.as_ref(),
            ToolName::GetTrending => self.get_trending.as_ref(),
            ToolName::PresentResults => self.present_results.as_ref(),
        }
    }

    /// Returns the tool catalog advertised to the model.
    pub fn definitions(&self) -> Vec<ModelTool> {
        ToolName::ALL
            .into_iter()
            .map(|name| self.handler(name).definition().clone())
            .collect()
    }

    /// Executes a single call.
    ///
    /// Fails if the tool is unknown, the arguments don't match the tool's
    /// parameters, or the handler itself fails.
    pub async fn execute(
        &self,
        call: ToolCallRequest,
    ) -> Result<ToolOutput, Error> {
        let fut = self.prepare(&call)?;
        let result = fut.await?;
        Ok(ToolOutput {
            call_id: call.id,
            result,
        })
    }

    /// Executes a batch of calls concurrently.
    ///
    /// `on_success` is invoked for each call whose handler succeeded, in
    /// completion order. A failed call never affects the others: its output
    /// becomes `{"error": "Failed to execute <name>"}`. Outputs are
    /// returned in the order of `calls`.
    pub async fn execute_all<F>(
        &self,
        calls: &[ToolCallRequest],
        mut on_success: F,
    ) -> Vec<ToolOutput>
    where
        F: FnMut(&ToolCallRequest),
    {
        let mut results: Vec<Option<Value>> = vec![None; calls.len()];
        let mut join_set = JoinSet::new();

        for (idx, call) in calls.iter().enumerate() {
            match self.prepare(call) {
                Ok(fut) => {
                    let span =
                        debug_span!("tool", name = %call.name, id = %call.id);
                    join_set.spawn(
                        async move { (idx, fut.await) }.instrument(span),
                    );
                }
                Err(err) => {
                    warn!("tool call {} rejected: {err}", call.id);
                    results[idx] = Some(failure_payload(&call.name));
                }
            }
        }

        while let Some(joined) = join_set.join_next().await {
            let (idx, result) = match joined {
                Ok(joined) => joined,
                Err(err) => {
                    // The slot stays empty and is filled with an error
                    // payload below.
                    error!("tool task failed: {err}");
                    continue;
                }
            };
            let call = &calls[idx];
            match result {
                Ok(value) => {
                    trace!("tool call {} succeeded", call.id);
                    on_success(call);
                    results[idx] = Some(value);
                }
                Err(err) => {
                    warn!(
                        "tool call {} ({}) failed: {err}",
                        call.id, call.name
                    );
                    results[idx] = Some(failure_payload(&call.name));
                }
            }
        }

        calls
            .iter()
            .zip(results)
            .map(|(call, result)| ToolOutput {
                call_id: call.id.clone(),
                result: result.unwrap_or_else(|| failure_payload(&call.name)),
            })
            .collect()
    }

    fn prepare(
        &self,
        call: &ToolCallRequest,
    ) -> Result<BoxFuture<'static, Result<Value, Error>>, Error> {
        let name = call.name.parse::<ToolName>().map_err(|err| {
            // The catalog is fixed, so this is a model or wiring fault.
            error!("{err}");
            Error::unknown_tool().with_reason(err.to_string())
        })?;
        trace!("calling {name} ({}) with {}", call.id, call.arguments);
        let arguments = if call.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.arguments).map_err(|err| {
                Error::invalid_input().with_reason(err.to_string())
            })?
        };
        Ok(self.handler(name).execute(arguments))
    }
}

fn failure_payload(name: &str) -> Value {
    json!({ "error": format!("Failed to execute {name}") })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use cinescout_catalog::{
        CatalogError, DiscoverQuery, InMemoryCatalog, MediaListItem,
        SearchQuery, TrendingQuery,
    };
    use tokio::sync::Barrier;
    use tokio::time::timeout;

    use super::*;
    use crate::tool::ErrorKind;

    fn call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_owned(),
            name: name.to_owned(),
            arguments: arguments.to_owned(),
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(InMemoryCatalog::sample()))
    }

    /// Search works, discovery is rate limited.
    struct FlakyCatalog(InMemoryCatalog);

    #[async_trait]
    impl MediaCatalog for FlakyCatalog {
        async fn search(
            &self,
            query: SearchQuery,
        ) -> Result<Vec<MediaListItem>, CatalogError> {
            self.0.search(query).await
        }

        async fn discover(
            &self,
            _query: DiscoverQuery,
        ) -> Result<Vec<MediaListItem>, CatalogError> {
            Err(CatalogError::RateLimited)
        }

        async fn trending(
            &self,
            query: TrendingQuery,
        ) -> Result<Vec<MediaListItem>, CatalogError> {
            self.0.trending(query).await
        }
    }

    /// Search and discovery only return once both are in flight.
    struct RendezvousCatalog {
        inner: InMemoryCatalog,
        barrier: Barrier,
    }

    #[async_trait]
    impl MediaCatalog for RendezvousCatalog {
        async fn search(
            &self,
            query: SearchQuery,
        ) -> Result<Vec<MediaListItem>, CatalogError> {
            self.barrier.wait().await;
            self.inner.search(query).await
        }

        async fn discover(
            &self,
            query: DiscoverQuery,
        ) -> Result<Vec<MediaListItem>, CatalogError> {
            self.barrier.wait().await;
            self.inner.discover(query).await
        }

        async fn trending(
            &self,
            query: TrendingQuery,
        ) -> Result<Vec<MediaListItem>, CatalogError> {
            self.inner.trending(query).await
        }
    }

    #[test]
    fn test_definitions() {
        let names = dispatcher()
            .definitions()
            .into_iter()
            .map(|tool| tool.name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                "search_media",
                "discover_movies",
                "discover_tv",
                "get_trending",
                "present_results"
            ]
        );
    }

    #[tokio::test]
    async fn test_execute() {
        let dispatcher = dispatcher();

        let output = dispatcher
            .execute(call(
                "call_1",
                "discover_movies",
                r#"{"genres":"28","min_rating":"8"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(output.call_id, "call_1");
        let results = output.result["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["title"], "The Dark Knight");

        let err = dispatcher
            .execute(call("call_2", "book_tickets", "{}"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownTool);

        let err = dispatcher
            .execute(call("call_3", "search_media", r#"{"query":"  "}"#))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = dispatcher
            .execute(call("call_4", "search_media", "{"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_execute_all_isolates_failures() {
        let dispatcher = Dispatcher::new(Arc::new(FlakyCatalog(
            InMemoryCatalog::sample(),
        )));
        let calls = vec![
            call("a", "discover_movies", r#"{"genres":[28]}"#),
            call("b", "search_media", r#"{"query":"Alien"}"#),
            call("c", "unknown_tool", "{}"),
            call("d", "get_trending", ""),
        ];

        let mut succeeded = vec![];
        let outputs = dispatcher
            .execute_all(&calls, |call| succeeded.push(call.id.clone()))
            .await;

        succeeded.sort();
        assert_eq!(succeeded, ["b", "d"]);

        let ids = outputs
            .iter()
            .map(|o| o.call_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["a", "b", "c", "d"]);
        assert_eq!(
            outputs[0].result,
            json!({ "error": "Failed to execute discover_movies" })
        );
        assert_eq!(outputs[1].result["results"][0]["title"], "Alien");
        assert_eq!(
            outputs[2].result,
            json!({ "error": "Failed to execute unknown_tool" })
        );
        assert!(!outputs[3].result["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_all_runs_calls_concurrently() {
        let dispatcher = Dispatcher::new(Arc::new(RendezvousCatalog {
            inner: InMemoryCatalog::sample(),
            barrier: Barrier::new(2),
        }));
        let calls = vec![
            call("a", "search_media", r#"{"query":"Alien"}"#),
            call("b", "discover_movies", r#"{"genres":[28]}"#),
        ];

        let mut succeeded = 0;
        let outputs = timeout(
            Duration::from_secs(5),
            dispatcher.execute_all(&calls, |_| succeeded += 1),
        )
        .await
        .expect("tool calls ran one after another");

        assert_eq!(succeeded, 2);
        assert_eq!(outputs[0].result["results"][0]["title"], "Alien");
        assert!(outputs[1].result["results"].is_array());
    }
}
