//! OpenTelemetry GenAI semantic convention attribute names.
//!
//! `tracing` span macros need literal field names, so spans declare these
//! fields inline (usually as `tracing::field::Empty`); the constants are
//! for `Span::record` calls made after the fact.

/// The name of the operation being performed (e.g., "chat").
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// Provider family that served the request (e.g., "deepseek", "qianfan").
pub const GEN_AI_SYSTEM: &str = "gen_ai.system";

/// The model requested.
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";

/// The number of input tokens consumed.
pub const GEN_AI_USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";

/// The number of output tokens generated.
pub const GEN_AI_USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";

/// Standard chat completion operation.
pub const OP_CHAT: &str = "chat";

/// Derived text (mindmap, summary) built from a prompt template.
pub const OP_DERIVE: &str = "derive";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_names_share_namespace() {
        for name in [
            GEN_AI_OPERATION_NAME,
            GEN_AI_SYSTEM,
            GEN_AI_REQUEST_MODEL,
            GEN_AI_USAGE_INPUT_TOKENS,
            GEN_AI_USAGE_OUTPUT_TOKENS,
        ] {
            assert!(name.starts_with("gen_ai."), "{name}");
        }
    }
}
