use async_trait::async_trait;
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{json, Value};

use winmetrics_core::error::{Result, WinMetricsError};

use crate::dispatch::RpcMethod;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Operands {
    a: i64,
    b: i64,
}

/// `Arith.Multiply {"a": i64, "b": i64}` -> product.
pub struct ArithMultiply;

#[async_trait]
impl RpcMethod for ArithMultiply {
    fn name(&self) -> &'static str {
        "Arith.Multiply"
    }

    async fn call(&self, params: Option<&RawValue>) -> Result<Value> {
        let raw = params.ok_or_else(|| WinMetricsError::BadRequest("missing params".into()))?;
        let ops: Operands = serde_json::from_str(raw.get())
            .map_err(|e| WinMetricsError::BadRequest(format!("invalid params: {e}")))?;
        let product = ops
            .a
            .checked_mul(ops.b)
            .ok_or_else(|| WinMetricsError::BadRequest("product overflows i64".into()))?;
        Ok(json!(product))
    }
}
