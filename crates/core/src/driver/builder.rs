use std::sync::Arc;

use cinescout_catalog::MediaCatalog;
use cinescout_model::ModelProvider;

use super::{DEFAULT_INSTRUCTIONS, Driver, DriverInner};
use crate::message::MAX_MESSAGES;
use crate::model_client::ModelClient;
use crate::tool::Dispatcher;

/// [`Driver`] builder.
pub struct DriverBuilder {
    model_client: ModelClient,
    catalog: Arc<dyn MediaCatalog>,
    instructions: Option<String>,
    max_tool_iterations: Option<usize>,
    max_messages: Option<usize>,
}

impl DriverBuilder {
    /// Creates a new builder with the specified model provider and catalog.
    #[inline]
    pub fn with_model_provider<P, C>(provider: P, catalog: C) -> Self
    where
        P: ModelProvider + 'static,
        C: MediaCatalog,
    {
        Self::with_shared_catalog(provider, Arc::new(catalog))
    }

    /// Like [`DriverBuilder::with_model_provider`], for a catalog that is
    /// already shared.
    #[inline]
    pub fn with_shared_catalog<P: ModelProvider + 'static>(
        provider: P,
        catalog: Arc<dyn MediaCatalog>,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            catalog,
            instructions: None,
            max_tool_iterations: None,
            max_messages: None,
        }
    }

    /// Replaces the default system instructions.
    #[inline]
    pub fn with_instructions<S: Into<String>>(
        mut self,
        instructions: S,
    ) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Sets how many model round-trips the tool-calling phase may take.
    /// Defaults to 5.
    #[inline]
    pub fn with_max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = Some(max);
        self
    }

    /// Sets the maximum number of messages per request. Defaults to 20.
    #[inline]
    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = Some(max);
        self
    }

    /// Builds the driver.
    pub fn build(self) -> Driver {
        Driver::from_inner(DriverInner {
            model_client: self.model_client,
            dispatcher: Dispatcher::new(self.catalog),
            instructions: self
                .instructions
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_owned()),
            max_tool_iterations: self.max_tool_iterations.unwrap_or(5),
            max_messages: self.max_messages.unwrap_or(MAX_MESSAGES),
        })
    }
}
