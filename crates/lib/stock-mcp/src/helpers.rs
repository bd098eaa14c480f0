use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content};
use stock_schema::ToolResult;

/// Tool failures travel in-band as error results carrying the structured body.
pub(crate) fn call_result(result: ToolResult) -> Result<CallToolResult, ErrorData> {
    match result {
        ToolResult::Success { payload } => Ok(CallToolResult::success(vec![Content::json(payload)?])),
        ToolResult::Error { error } => Ok(CallToolResult::error(vec![Content::json(error)?])),
    }
}
