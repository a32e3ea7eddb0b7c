//! Tool call supports.

mod args;
mod catalog;
mod dispatcher;
mod error;
mod name;

use cinescout_model::ModelTool;
use futures_util::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use args::inject_default_language;
pub use catalog::{
    Discover, DiscoverInput, GetTrending, PresentResults, PresentResultsInput,
    SearchMedia, SearchMediaInput, TrendingInput,
};
pub use dispatcher::{Dispatcher, ToolOutput};
pub use error::{Error, ErrorKind};
pub use name::{ToolName, UnknownToolName};

/// The result of a tool call.
pub type ToolResult = Result<Value, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless. Anything a tool
/// needs to do its work (such as the catalog client) is set during
/// initialization and cloned into the future returned by
/// [`Tool::execute`].
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    ///
    /// Its JSON schema is what the model sees as the tool's parameters.
    type Input: DeserializeOwned + JsonSchema;

    /// Returns the name of the tool.
    fn name(&self) -> ToolName;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of
    /// `self`, and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn definition(&self) -> &ModelTool;

    fn execute(&self, arguments: Value) -> BoxFuture<'static, ToolResult>;
}

pub(crate) struct AnyTool<T: Tool> {
    tool: T,
    definition: ModelTool,
}

impl<T: Tool> AnyTool<T> {
    pub fn new(tool: T) -> Self {
        let mut parameters = schemars::schema_for!(T::Input).to_value();
        if let Some(schema) = parameters.as_object_mut() {
            schema.remove("$schema");
        }
        let definition = ModelTool {
            name: tool.name().as_str().to_owned(),
            description: tool.description().to_owned(),
            parameters,
        };
        Self { tool, definition }
    }
}

impl<T: Tool> ToolObject for AnyTool<T> {
    #[inline]
    fn definition(&self) -> &ModelTool {
        &self.definition
    }

    fn execute(&self, mut arguments: Value) -> BoxFuture<'static, ToolResult> {
        args::coerce_arguments(&mut arguments, &self.definition.parameters);
        let input: T::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => {
                let reason = format!("{err}");
                return Box::pin(std::future::ready(ToolResult::Err(
                    Error::invalid_input().with_reason(reason),
                )));
            }
        };
        Box::pin(self.tool.execute(input))
    }
}
