/// The closed set of tool names the dispatcher knows about. A tool not
/// known to the core and not present in the catalog returns
/// `UNKNOWN_TOOL`. Effectful tools require a prior `request_decision`
/// round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    CreateObligation,
    CallMcpTool,
    McpToolSearch,
    SearchObligations,
    RequestDecision,
    SubmitModuleBundle,
    RequestModuleActivation,
}

impl ToolName {
    pub fn parse(name: &str) -> Option<ToolName> {
        match name {
            "create_obligation" => Some(ToolName::CreateObligation),
            "call_mcp_tool" => Some(ToolName::CallMcpTool),
            "mcp_tool_search" => Some(ToolName::McpToolSearch),
            "search_obligations" => Some(ToolName::SearchObligations),
            "request_decision" => Some(ToolName::RequestDecision),
            "submit_module_bundle" => Some(ToolName::SubmitModuleBundle),
            "request_module_activation" => Some(ToolName::RequestModuleActivation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::CreateObligation => "create_obligation",
            ToolName::CallMcpTool => "call_mcp_tool",
            ToolName::McpToolSearch => "mcp_tool_search",
            ToolName::SearchObligations => "search_obligations",
            ToolName::RequestDecision => "request_decision",
            ToolName::SubmitModuleBundle => "submit_module_bundle",
            ToolName::RequestModuleActivation => "request_module_activation",
        }
    }

    /// Effectful tools all require a prior `request_decision` round-trip;
    /// the rest are admission-checked only.
    pub fn effectful(&self) -> bool {
        matches!(
            self,
            ToolName::CreateObligation
                | ToolName::CallMcpTool
                | ToolName::SubmitModuleBundle
                | ToolName::RequestModuleActivation
        )
    }
}
