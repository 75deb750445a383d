//! Routes agent tool calls to local actions.
//!
//! Every call is acknowledged. Capture failures, unknown products, unknown
//! tools and invalid parameters all produce a plain-text acknowledgment
//! rather than an error on the channel.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use thiserror::Error;

use super::manifest::{ManifestError, ToolDefinition, ADD_TO_CART, TRIGGER_CAMERA_SCAN};
use super::messages::{FunctionCall, FunctionCallResponse};
use crate::types::{CartState, Product};

/// The local capture action failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("capture failed: {0}")]
pub struct CaptureError(pub String);

/// Local action behind `trigger_camera_scan`.
///
/// Invoked synchronously from the dispatcher; implementations that do real
/// work should hand it off (e.g. to a channel) and return.
pub trait CaptureAction: Send + Sync {
    fn capture(&self) -> Result<(), CaptureError>;
}

impl<F> CaptureAction for F
where
    F: Fn() -> Result<(), CaptureError> + Send + Sync,
{
    fn capture(&self) -> Result<(), CaptureError> {
        self()
    }
}

/// Dispatches tool calls against the current recommendations and cart.
pub struct ToolDispatcher {
    validators: BTreeMap<String, jsonschema::Validator>,
    recommendations: Vec<Product>,
    cart: CartState,
    capture: Box<dyn CaptureAction>,
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("tools", &self.validators.keys().collect::<Vec<_>>())
            .field("recommendations", &self.recommendations.len())
            .field("cart", &self.cart.len())
            .finish()
    }
}

impl ToolDispatcher {
    /// Compile the parameter schema of every tool.
    pub fn new(tools: &[ToolDefinition], capture: Box<dyn CaptureAction>) -> Result<Self, ManifestError> {
        let mut validators = BTreeMap::new();
        for tool in tools {
            let validator = jsonschema::options().build(&tool.parameters).map_err(|e| {
                ManifestError::InvalidSchema {
                    tool: tool.name.clone(),
                    message: e.to_string(),
                }
            })?;
            if validators.insert(tool.name.clone(), validator).is_some() {
                return Err(ManifestError::DuplicateTool(tool.name.clone()));
            }
        }

        Ok(Self {
            validators,
            recommendations: Vec::new(),
            cart: CartState::new(),
            capture,
        })
    }

    /// Replace the recommendation set that `add_to_cart` resolves against.
    pub fn set_recommendations(&mut self, products: Vec<Product>) {
        self.recommendations = products;
    }

    pub fn recommendations(&self) -> &[Product] {
        &self.recommendations
    }

    pub fn cart(&self) -> &CartState {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut CartState {
        &mut self.cart
    }

    /// Handle one tool call and build its acknowledgment.
    pub fn dispatch(&mut self, call: &FunctionCall) -> FunctionCallResponse {
        let output = match self.check_parameters(call) {
            Err(problems) => format!("Invalid parameters for {}: {}", call.name, problems),
            Ok(()) => match call.name.as_str() {
                TRIGGER_CAMERA_SCAN => self.trigger_camera_scan(),
                ADD_TO_CART => self.add_to_cart(&call.parameters),
                other => {
                    tracing::warn!(tool = %other, "Agent called an unknown tool");
                    format!("Unknown tool {}.", other)
                }
            },
        };

        FunctionCallResponse {
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            output,
        }
    }

    fn check_parameters(&self, call: &FunctionCall) -> Result<(), String> {
        let Some(validator) = self.validators.get(&call.name) else {
            return Ok(());
        };
        // Agents omit `parameters` for tools without arguments.
        let empty = JsonValue::Object(Default::default());
        let params = if call.parameters.is_null() { &empty } else { &call.parameters };

        let errors: Vec<String> = validator
            .iter_errors(params)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }

    fn trigger_camera_scan(&self) -> String {
        if let Err(e) = self.capture.capture() {
            // The agent is told the scan started either way.
            tracing::warn!(error = %e, "Camera capture failed");
        }
        "Camera scan initiated.".to_string()
    }

    fn add_to_cart(&mut self, parameters: &JsonValue) -> String {
        let product_id = parameters
            .get("productId")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();

        match self.recommendations.iter().find(|p| p.id == product_id) {
            Some(product) => {
                let name = product.name.clone();
                self.cart.add(product.clone());
                tracing::info!(product_id = %product_id, "Added product to cart by voice");
                format!("Product {} added to cart.", name)
            }
            None => "Product ID not found in current recommendations.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::manifest::VoiceAgentConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn call(name: &str, parameters: JsonValue) -> FunctionCall {
        FunctionCall {
            call_id: "call-1".to_string(),
            name: name.to_string(),
            parameters,
        }
    }

    fn dispatcher_with(capture: Box<dyn CaptureAction>) -> ToolDispatcher {
        let mut dispatcher = ToolDispatcher::new(&VoiceAgentConfig::default().tools, capture).unwrap();
        dispatcher.set_recommendations(vec![
            Product::new("mock_h1", "Hydra-Restore Bio-Serum", 124.0, "hydration"),
            Product::new("mock_h2", "Clinical Ceramide Complex", 95.0, "hydration"),
        ]);
        dispatcher
    }

    fn noop_dispatcher() -> ToolDispatcher {
        dispatcher_with(Box::new(|| Ok(())))
    }

    #[test]
    fn test_camera_scan_invokes_capture() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let mut dispatcher = dispatcher_with(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let response = dispatcher.dispatch(&call(TRIGGER_CAMERA_SCAN, JsonValue::Null));
        assert_eq!(response.output, "Camera scan initiated.");
        assert_eq!(response.call_id, "call-1");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_camera_scan_acknowledged_when_capture_fails() {
        let mut dispatcher =
            dispatcher_with(Box::new(|| Err(CaptureError("camera busy".to_string()))));
        let response = dispatcher.dispatch(&call(TRIGGER_CAMERA_SCAN, serde_json::json!({})));
        assert_eq!(response.output, "Camera scan initiated.");
    }

    #[test]
    fn test_add_to_cart_found() {
        let mut dispatcher = noop_dispatcher();
        let response =
            dispatcher.dispatch(&call(ADD_TO_CART, serde_json::json!({ "productId": "mock_h2" })));

        assert_eq!(response.output, "Product Clinical Ceramide Complex added to cart.");
        assert!(dispatcher.cart().contains("mock_h2"));
    }

    #[test]
    fn test_add_to_cart_not_found_leaves_cart_unchanged() {
        let mut dispatcher = noop_dispatcher();
        dispatcher.dispatch(&call(ADD_TO_CART, serde_json::json!({ "productId": "mock_h1" })));
        let before = dispatcher.cart().clone();

        let response =
            dispatcher.dispatch(&call(ADD_TO_CART, serde_json::json!({ "productId": "MOCK_H1" })));

        assert!(response.output.contains("not found"));
        assert_eq!(dispatcher.cart(), &before);
    }

    #[test]
    fn test_add_to_cart_missing_parameter() {
        let mut dispatcher = noop_dispatcher();
        let response = dispatcher.dispatch(&call(ADD_TO_CART, serde_json::json!({})));

        assert!(response.output.starts_with("Invalid parameters for add_to_cart"));
        assert!(dispatcher.cart().is_empty());
    }

    #[test]
    fn test_unknown_tool_acknowledged() {
        let mut dispatcher = noop_dispatcher();
        let response = dispatcher.dispatch(&call("book_appointment", JsonValue::Null));
        assert_eq!(response.output, "Unknown tool book_appointment.");
    }

    #[test]
    fn test_duplicate_tools_rejected() {
        let tools = vec![ToolDefinition::add_to_cart(), ToolDefinition::add_to_cart()];
        let result = ToolDispatcher::new(&tools, Box::new(|| Ok(())));
        assert!(matches!(result, Err(ManifestError::DuplicateTool(_))));
    }
}
