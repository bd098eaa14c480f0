use std::sync::Arc;

use futures::FutureExt;
use rmcp::handler::server::tool::{ToolCallContext, ToolRoute, ToolRouter};
use rmcp::model::{JsonObject, Tool};
use serde_json::{Value, json};
use stock_core::registry::{ArgKind, ArgSpec, ToolRegistry, ToolSpec};
use stock_schema::schema::{PERIOD_ANNUAL, PERIOD_QUARTERLY};

use crate::StockMcp;

/// One route per registered tool.
///
/// Routes pass the caller's argument object through untouched so the
/// registry reports missing, unknown and malformed arguments in-band.
pub(crate) fn data_router(registry: &ToolRegistry) -> ToolRouter<StockMcp> {
    let mut router = ToolRouter::new();
    for spec in registry.iter() {
        let route = ToolRoute::<StockMcp>::new_dyn(tool(spec), |context| {
            let ToolCallContext {
                service,
                name,
                arguments,
                ..
            } = context;
            async move {
                service
                    .dispatch_tool(&name, arguments.unwrap_or_default())
                    .await
            }
            .boxed()
        });
        router.add_route(route);
    }
    router
}

fn tool(spec: &'static ToolSpec) -> Tool {
    Tool::new(spec.name, spec.description, Arc::new(input_schema(spec)))
}

/// JSON schema advertised in `tools/list`, derived from the argument table.
pub(crate) fn input_schema(spec: &ToolSpec) -> JsonObject {
    let properties: JsonObject = spec
        .args
        .iter()
        .map(|arg| (arg.name.to_string(), property(arg)))
        .collect();
    let required: Vec<&str> = spec
        .args
        .iter()
        .filter(|arg| arg.required)
        .map(|arg| arg.name)
        .collect();

    let mut schema = JsonObject::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    schema
}

fn property(arg: &ArgSpec) -> Value {
    let mut property = match arg.kind {
        ArgKind::Symbol => json!({ "type": "string" }),
        ArgKind::Period => json!({ "type": "string", "enum": [PERIOD_ANNUAL, PERIOD_QUARTERLY] }),
        ArgKind::Choice { options } => json!({ "type": "string", "enum": options }),
        ArgKind::Date => json!({ "type": "string", "format": "date" }),
        // Numeric strings are accepted too.
        ArgKind::Integer { min, max } => {
            json!({ "type": ["integer", "string"], "minimum": min, "maximum": max })
        }
    };
    if let Value::Object(fields) = &mut property {
        fields.insert("description".to_string(), json!(arg.description));
        if let Some(default) = arg.default {
            let default = match arg.kind {
                ArgKind::Integer { .. } => default
                    .parse::<i64>()
                    .map_or_else(|_| json!(default), |number| json!(number)),
                _ => json!(default),
            };
            fields.insert("default".to_string(), default);
        }
    }
    property
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_of(name: &str) -> JsonObject {
        let spec = ToolRegistry::builtin().get(name).expect("registered tool");
        input_schema(spec)
    }

    #[test]
    fn symbol_tools_require_a_symbol() {
        let schema = schema_of("ticker_info");
        assert_eq!(schema["required"], json!(["symbol"]));
        assert_eq!(schema["properties"]["symbol"]["type"], "string");
    }

    #[test]
    fn defaults_and_choices_are_advertised() {
        let schema = schema_of("market_data");
        let interval = &schema["properties"]["interval"];
        assert_eq!(interval["default"], "1d");
        assert!(
            interval["enum"]
                .as_array()
                .expect("enum")
                .contains(&json!("1wk"))
        );
        assert_eq!(schema["properties"]["start"]["format"], "date");

        let revisions = schema_of("analyst_revisions");
        let limit = &revisions["properties"]["limit"];
        assert_eq!(limit["default"], 50);
        assert_eq!(limit["maximum"], 500);
    }

    #[test]
    fn sector_top_takes_no_symbol() {
        let schema = schema_of("sector_top");
        assert_eq!(schema["required"], json!(["sector"]));
        assert!(schema["properties"].get("symbol").is_none());
        assert_eq!(schema["properties"]["category"]["default"], "companies");
    }

    #[test]
    fn every_registered_tool_gets_a_route() {
        let router = data_router(&ToolRegistry::builtin());
        for spec in ToolRegistry::builtin().iter() {
            assert!(router.has_route(spec.name), "missing route for {}", spec.name);
        }
    }
}
