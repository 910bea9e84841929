//! Example external provider exposing a single `add` tool, used to ground
//! scenario walkthroughs against a real child process.

use async_trait::async_trait;
use provider_runtime::{run, Provider, ToolContext, ToolDescriptor};
use serde_json::{json, Value};

struct Calc;

#[async_trait]
impl Provider for Calc {
    fn name(&self) -> &str {
        "calc"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "arithmetic tools"
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor {
            name: "add".to_string(),
            description: "add two numbers".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "a": {"type": "number"},
                    "b": {"type": "number"},
                },
                "required": ["a", "b"],
            }),
            output_schema: Some(json!({
                "type": "object",
                "properties": {"sum": {"type": "number"}},
            })),
        }]
    }

    async fn call(&self, tool: &str, _ctx: &ToolContext, params: Value) -> Result<Value, String> {
        match tool {
            "add" => {
                let a = params
                    .get("a")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| "missing numeric field `a`".to_string())?;
                let b = params
                    .get("b")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| "missing numeric field `b`".to_string())?;
                Ok(json!({ "sum": a + b }))
            }
            other => Err(format!("unknown tool `{other}`")),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(Calc).await {
        eprintln!("calc-provider exited: {e}");
        std::process::exit(1);
    }
}
