use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::StockMcp;

/// Payload listing the MCP commands and how to use them.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpCommands {
    pub commands: Vec<String>,
    pub notes: Vec<String>,
}

impl HelpCommands {
    fn from_server(server: &StockMcp) -> Self {
        let mut commands: Vec<String> = server
            .dispatcher()
            .registry()
            .iter()
            .map(|spec| format!("{} - {}", spec.name, spec.description))
            .collect();
        commands.push("list_tools - Argument schema for every data tool.".to_string());
        commands.push("health - Returns 'ok'.".to_string());
        Self {
            commands,
            notes: vec![
                "Missing upstream fields are the string 'unavailable'.".to_string(),
                "Error codes: invalid_argument, unknown_tool, not_found, upstream_unavailable, upstream_schema.".to_string(),
                "Only upstream_unavailable is retryable.".to_string(),
            ],
        }
    }
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl StockMcp {
    #[tool(description = "List the MCP commands and how results and errors are shaped.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::json(HelpCommands::from_server(self))?]))
    }

    #[tool(description = "List every data tool with its arguments, defaults and accepted values.")]
    async fn list_tools(&self) -> Result<CallToolResult, ErrorData> {
        let tools: Vec<_> = self.dispatcher().registry().iter().collect();
        Ok(CallToolResult::success(vec![Content::json(tools)?]))
    }
}
