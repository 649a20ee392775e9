//! MCP server exposing the voice catalog and synthesis as tools over stdio.

use std::sync::Arc;

use anyhow::Result;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, JsonObject, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, ServiceExt};
use rmcp::{Error as McpError, RoleServer, ServerHandler};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use voxedge_core::{SynthesisJob, SynthesisRequest, VoiceCatalog};

use crate::server::check_adjustments;

const LIST_VOICES_TOOL: &str = "list_voices";
const TEXT_TO_SPEECH_TOOL: &str = "text_to_speech";

#[derive(Clone)]
pub struct VoxEdgeMcp {
    catalog: VoiceCatalog,
    job: SynthesisJob,
}

#[derive(Debug, Deserialize)]
struct TextToSpeechArgs {
    text: String,
    voice: String,
    #[serde(default)]
    rate: i32,
    #[serde(default)]
    pitch: i32,
}

fn schema(value: Value) -> Arc<JsonObject> {
    match value {
        Value::Object(map) => Arc::new(map),
        _ => Arc::default(),
    }
}

impl VoxEdgeMcp {
    pub fn new(catalog: VoiceCatalog, job: SynthesisJob) -> Self {
        Self { catalog, job }
    }

    pub fn tools() -> Vec<Tool> {
        vec![
            Tool::new(
                LIST_VOICES_TOOL,
                "Fetch available Microsoft Edge TTS voices. Returns a JSON object mapping \
                 display names (e.g. \"en-US-JennyNeural - Female\") to voice metadata, \
                 highest priority first.",
                schema(json!({
                    "type": "object",
                    "properties": {}
                })),
            ),
            Tool::new(
                TEXT_TO_SPEECH_TOOL,
                "Convert text to speech with Microsoft Edge TTS. Returns the path of the \
                 generated MP3 file.",
                schema(json!({
                    "type": "object",
                    "properties": {
                        "text": {
                            "type": "string",
                            "description": "The text to synthesize into speech"
                        },
                        "voice": {
                            "type": "string",
                            "description": "Voice display name in the form \"ShortName - Gender\""
                        },
                        "rate": {
                            "type": "integer",
                            "description": "Speech rate adjustment in percent",
                            "minimum": -50,
                            "maximum": 50,
                            "default": 0
                        },
                        "pitch": {
                            "type": "integer",
                            "description": "Pitch adjustment in Hz",
                            "minimum": -20,
                            "maximum": 20,
                            "default": 0
                        }
                    },
                    "required": ["text", "voice"]
                })),
            ),
        ]
    }

    /// Runs one tool call. Service failures are reported as tool errors so
    /// the client sees the message; malformed calls are protocol errors.
    pub async fn call(&self, request: CallToolRequestParam) -> Result<CallToolResult, McpError> {
        debug!(tool = %request.name, "MCP tool call");
        match &*request.name {
            LIST_VOICES_TOOL => self.list_voices().await,
            TEXT_TO_SPEECH_TOOL => {
                self.text_to_speech(request.arguments.unwrap_or_default())
                    .await
            }
            other => Err(McpError::invalid_params(
                format!("Unknown tool '{other}'"),
                None,
            )),
        }
    }

    async fn list_voices(&self) -> Result<CallToolResult, McpError> {
        let catalog = match self.catalog.fetch_voices().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "list_voices tool failed");
                return Ok(CallToolResult::error(vec![Content::text(e.to_string())]));
            }
        };

        let json = serde_json::to_string(&catalog).map_err(|e| {
            McpError::internal_error(format!("Failed to encode voice catalog: {e}"), None)
        })?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    async fn text_to_speech(&self, arguments: JsonObject) -> Result<CallToolResult, McpError> {
        let args: TextToSpeechArgs =
            serde_json::from_value(Value::Object(arguments)).map_err(|e| {
                McpError::invalid_params(format!("Invalid text_to_speech arguments: {e}"), None)
            })?;
        check_adjustments(args.rate, args.pitch)
            .map_err(|message| McpError::invalid_params(message, None))?;

        let request = SynthesisRequest::new(args.text, args.voice)
            .with_rate(args.rate)
            .with_pitch(args.pitch);
        match self.job.run(&request).await {
            Ok(path) => Ok(CallToolResult::success(vec![Content::text(path)])),
            Err(e) => {
                warn!(error = %e, "text_to_speech tool failed");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}

impl ServerHandler for VoxEdgeMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Microsoft Edge text to speech. Call list_voices to pick a voice, then \
                 text_to_speech to generate an MP3 file."
                    .into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            next_cursor: None,
            tools: Self::tools(),
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(request).await
    }
}

/// Serves MCP on stdin/stdout until the client disconnects.
pub async fn serve_stdio(handler: VoxEdgeMcp) -> Result<()> {
    info!("Starting MCP server on stdio");

    let service = handler
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start MCP server: {e:?}"))?;
    service
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server stopped: {e:?}"))?;

    info!("MCP client disconnected");
    Ok(())
}
