//! Minimal MCP stdio server adapter.
//!
//! Exposes the query engine as MCP tools over Content-Length framed JSON-RPC.
//! The record collection is loaded once by the binary and injected here; the
//! server only ever reads it.

use crate::about;
use crate::record::AptamerRecord;
use crate::search::{
    DEFAULT_SEARCH_LIMIT, DEFAULT_TOP_N, get_by_doi, get_by_external_id, list_targets,
    search_by_target, top_by_pkd,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::io::{self, BufRead, BufReader, BufWriter, Write};

const MCP_PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "aptanexus_mcp";
const SERVER_TITLE: &str = "AptaNexus MCP";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchOutcome {
    NoResponse,
    Response,
    Exit,
}

#[derive(Debug, Clone, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub fn run_stdio_server(records: &[AptamerRecord]) -> Result<(), String> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = BufWriter::new(stdout.lock());
    run_server_loop(records, &mut reader, &mut writer)
}

fn run_server_loop<R: BufRead, W: Write>(
    records: &[AptamerRecord],
    reader: &mut R,
    writer: &mut W,
) -> Result<(), String> {
    loop {
        let Some(message) = read_framed_json(reader)? else {
            return Ok(());
        };
        match handle_message(records, &message, writer)? {
            DispatchOutcome::NoResponse => {}
            DispatchOutcome::Response => {}
            DispatchOutcome::Exit => return Ok(()),
        }
    }
}

fn read_framed_json<R: BufRead>(reader: &mut R) -> Result<Option<Value>, String> {
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let bytes_read = reader
            .read_line(&mut line)
            .map_err(|e| format!("Could not read MCP header line: {e}"))?;
        if bytes_read == 0 {
            return if content_length.is_some() {
                Err("Unexpected EOF while reading MCP headers".to_string())
            } else {
                Ok(None)
            };
        }
        let line_trimmed = line.trim_end_matches(['\r', '\n']);
        if line_trimmed.is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }
        if let Some(value) = line_trimmed.strip_prefix("Content-Length:") {
            let len = value
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("Invalid Content-Length header '{line_trimmed}': {e}"))?;
            content_length = Some(len);
        }
    }

    let len = content_length.ok_or_else(|| "Missing Content-Length header".to_string())?;
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .map_err(|e| format!("Could not read MCP JSON payload body: {e}"))?;
    serde_json::from_slice::<Value>(&body)
        .map(Some)
        .map_err(|e| format!("Could not parse MCP JSON payload: {e}"))
}

fn write_framed_json<W: Write>(writer: &mut W, payload: &Value) -> Result<(), String> {
    let body = serde_json::to_vec(payload)
        .map_err(|e| format!("Could not serialize MCP response JSON: {e}"))?;
    writer
        .write_all(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes())
        .map_err(|e| format!("Could not write MCP response header: {e}"))?;
    writer
        .write_all(&body)
        .map_err(|e| format!("Could not write MCP response body: {e}"))?;
    writer
        .flush()
        .map_err(|e| format!("Could not flush MCP response stream: {e}"))?;
    Ok(())
}

fn tool_list() -> Value {
    json!([
        {
            "name": "search_by_target",
            "title": "Search by Target",
            "description": "Search for aptamers by target name. Supports partial matching and Chinese queries.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Target name to search for (e.g. \"thrombin\", \"VEGF\", \"乳酸\")."
                    },
                    "limit": {
                        "type": "number",
                        "description": "Maximum number of results to return.",
                        "default": DEFAULT_SEARCH_LIMIT
                    },
                    "offset": {
                        "type": "number",
                        "description": "Number of results to skip (for pagination).",
                        "default": 0
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }
        },
        {
            "name": "top_by_pkd",
            "title": "Top by pKd",
            "description": "Get the top aptamers with the highest binding affinity (pKd) for a specific target.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Target name to search for."
                    },
                    "top": {
                        "type": "number",
                        "description": "Number of top aptamers to return.",
                        "default": DEFAULT_TOP_N
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_by_doi",
            "title": "Get by DOI",
            "description": "Retrieve all aptamers from a specific publication using its DOI.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "doi": {
                        "type": "string",
                        "description": "Digital Object Identifier of the publication."
                    }
                },
                "required": ["doi"],
                "additionalProperties": false
            }
        },
        {
            "name": "list_targets",
            "title": "List Targets",
            "description": "List all target molecules in the database with aptamer counts.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Optional filter by target name."
                    }
                },
                "additionalProperties": false
            }
        },
        {
            "name": "get_by_external_id",
            "title": "Get by External ID",
            "description": "Retrieve a specific aptamer using its external identifier (e.g. an Aptagen ID).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": {
                        "type": "string",
                        "description": "External identifier."
                    },
                    "external_id": {
                        "type": "string",
                        "description": "Alias for id."
                    }
                },
                "additionalProperties": false
            }
        }
    ])
}

fn jsonrpc_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn jsonrpc_error(id: Option<Value>, code: i64, message: &str, data: Option<Value>) -> Value {
    let mut error = json!({
        "code": code,
        "message": message
    });
    if let Some(data) = data {
        error["data"] = data;
    }
    json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "error": error
    })
}

fn tool_result_text(text: String, is_error: bool) -> Value {
    json!({
        "content": [
            {
                "type": "text",
                "text": text
            }
        ],
        "isError": is_error
    })
}

fn tool_result_json(value: Value, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
    json!({
        "content": [
            {
                "type": "text",
                "text": text
            }
        ],
        "structuredContent": value,
        "isError": is_error
    })
}

fn string_arg(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

// Numeric parameters arrive from loosely typed clients as numbers or number
// text. Anything unusable (negative, non-finite, garbage) falls back to the
// default instead of erroring.
fn usize_arg(args: &Map<String, Value>, key: &str, default: usize) -> usize {
    match args.get(key) {
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                usize::try_from(v).unwrap_or(default)
            } else if let Some(v) = n.as_f64() {
                if v.is_finite() && v >= 0.0 {
                    v as usize
                } else {
                    default
                }
            } else {
                default
            }
        }
        Some(Value::String(s)) => s.trim().parse::<usize>().unwrap_or(default),
        _ => default,
    }
}

fn engine_result<T: serde::Serialize>(out: T) -> Value {
    match serde_json::to_value(out) {
        Ok(value) => tool_result_json(value, false),
        Err(e) => tool_result_text(format!("Could not serialize tool result: {e}"), true),
    }
}

fn tool_call_result(records: &[AptamerRecord], params: ToolCallParams) -> Value {
    let args = params.arguments.as_object().cloned().unwrap_or_default();
    match params.name.trim() {
        "search_by_target" => {
            let Some(query) = string_arg(&args, "query") else {
                return tool_result_text(
                    "search_by_target requires a 'query' argument".to_string(),
                    true,
                );
            };
            let limit = usize_arg(&args, "limit", DEFAULT_SEARCH_LIMIT);
            let offset = usize_arg(&args, "offset", 0);
            engine_result(search_by_target(records, &query, limit, offset))
        }
        "top_by_pkd" => {
            let Some(query) = string_arg(&args, "query") else {
                return tool_result_text(
                    "top_by_pkd requires a 'query' argument".to_string(),
                    true,
                );
            };
            let top = usize_arg(&args, "top", DEFAULT_TOP_N);
            engine_result(top_by_pkd(records, &query, top))
        }
        "get_by_doi" => {
            let Some(doi) = string_arg(&args, "doi") else {
                return tool_result_text("get_by_doi requires a 'doi' argument".to_string(), true);
            };
            engine_result(get_by_doi(records, &doi))
        }
        "list_targets" => {
            let query = string_arg(&args, "query");
            engine_result(list_targets(records, query.as_deref()))
        }
        "get_by_external_id" => {
            let Some(id) = string_arg(&args, "id").or_else(|| string_arg(&args, "external_id"))
            else {
                return tool_result_text(
                    "get_by_external_id requires an 'id' argument (or alias 'external_id')"
                        .to_string(),
                    true,
                );
            };
            engine_result(get_by_external_id(records, &id))
        }
        other => tool_result_text(format!("Unknown MCP tool '{other}'"), true),
    }
}

fn write_response<W: Write>(writer: &mut W, value: Value) -> Result<DispatchOutcome, String> {
    write_framed_json(writer, &value)?;
    Ok(DispatchOutcome::Response)
}

fn handle_message<W: Write>(
    records: &[AptamerRecord],
    message: &Value,
    writer: &mut W,
) -> Result<DispatchOutcome, String> {
    let Some(obj) = message.as_object() else {
        return write_response(
            writer,
            jsonrpc_error(None, -32600, "Invalid Request: expected JSON object", None),
        );
    };
    let id = obj.get("id").cloned();
    let Some(method) = obj.get("method").and_then(Value::as_str) else {
        return write_response(
            writer,
            jsonrpc_error(
                id,
                -32600,
                "Invalid Request: missing method field",
                Some(message.clone()),
            ),
        );
    };

    match method {
        "initialize" => {
            let Some(id) = id else {
                return write_response(
                    writer,
                    jsonrpc_error(
                        None,
                        -32600,
                        "Invalid Request: initialize requires id",
                        None,
                    ),
                );
            };
            let result = json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {
                        "listChanged": false
                    }
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "title": SERVER_TITLE,
                    "version": about::APTANEXUS_DISPLAY_VERSION
                }
            });
            write_response(writer, jsonrpc_response(id, result))
        }
        "notifications/initialized" => Ok(DispatchOutcome::NoResponse),
        "ping" => {
            if let Some(id) = id {
                write_response(writer, jsonrpc_response(id, json!({})))
            } else {
                Ok(DispatchOutcome::NoResponse)
            }
        }
        "tools/list" => {
            let Some(id) = id else {
                return Ok(DispatchOutcome::NoResponse);
            };
            write_response(
                writer,
                jsonrpc_response(id, json!({ "tools": tool_list() })),
            )
        }
        "tools/call" => {
            let Some(id) = id else {
                return Ok(DispatchOutcome::NoResponse);
            };
            let params = obj.get("params").cloned().unwrap_or_else(|| json!({}));
            let call = match serde_json::from_value::<ToolCallParams>(params) {
                Ok(call) => call,
                Err(err) => {
                    return write_response(
                        writer,
                        jsonrpc_error(
                            Some(id),
                            -32602,
                            "Invalid params for tools/call",
                            Some(json!({ "details": err.to_string() })),
                        ),
                    );
                }
            };
            let result = tool_call_result(records, call);
            write_response(writer, jsonrpc_response(id, result))
        }
        "shutdown" => {
            if let Some(id) = id {
                write_response(writer, jsonrpc_response(id, json!({})))
            } else {
                Ok(DispatchOutcome::NoResponse)
            }
        }
        "exit" => Ok(DispatchOutcome::Exit),
        _ => {
            if id.is_none() {
                return Ok(DispatchOutcome::NoResponse);
            }
            write_response(
                writer,
                jsonrpc_error(id, -32601, &format!("Method '{method}' not found"), None),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frame(value: &Value) -> Vec<u8> {
        let body = serde_json::to_vec(value).expect("serialize test message");
        let mut bytes = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        bytes.extend(body);
        bytes
    }

    fn read_response_body(buffer: &[u8]) -> Value {
        let text = String::from_utf8(buffer.to_vec()).expect("utf8 response");
        let marker = "\r\n\r\n";
        let idx = text.find(marker).expect("response header separator");
        let body = &text[idx + marker.len()..];
        serde_json::from_str(body).expect("response body json")
    }

    fn sample_records() -> Vec<AptamerRecord> {
        let thrombin = AptamerRecord {
            article_title: "t".to_string(),
            doi: "10.1038/355564a0".to_string(),
            target_name: "Thrombin".to_string(),
            sequence_id: "TBA".to_string(),
            pkd: Some(9.0),
            external_id: "APT-001".to_string(),
            ..AptamerRecord::default()
        };
        let vegf = AptamerRecord {
            article_title: "t".to_string(),
            doi: "10.1021/ja1018818".to_string(),
            target_name: "VEGF165".to_string(),
            sequence_id: "V7t1".to_string(),
            pkd: Some(9.2),
            ..AptamerRecord::default()
        };
        vec![thrombin, vegf]
    }

    fn run_single(records: &[AptamerRecord], request: Value) -> Value {
        let mut reader = Cursor::new(frame(&request));
        let mut writer = Vec::<u8>::new();
        run_server_loop(records, &mut reader, &mut writer).expect("server loop");
        read_response_body(&writer)
    }

    fn call_tool(records: &[AptamerRecord], name: &str, arguments: Value) -> Value {
        run_single(
            records,
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": { "name": name, "arguments": arguments }
            }),
        )
    }

    #[test]
    fn initialize_and_tools_list_roundtrip() {
        let init = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": MCP_PROTOCOL_VERSION
            }
        });
        let list = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/list",
            "params": {}
        });
        let mut input = frame(&init);
        input.extend(frame(&list));
        let mut reader = Cursor::new(input);
        let mut writer = Vec::<u8>::new();

        run_server_loop(&sample_records(), &mut reader, &mut writer).expect("server loop");

        let output = String::from_utf8(writer).expect("utf8 output");
        let parts = output
            .split("Content-Length:")
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>();
        assert_eq!(parts.len(), 2);
        assert!(output.contains("search_by_target"));
        assert!(output.contains("get_by_external_id"));
    }

    #[test]
    fn search_tool_returns_structured_results() {
        let response = call_tool(
            &sample_records(),
            "search_by_target",
            json!({ "query": "thrombin" }),
        );
        let is_error = response
            .pointer("/result/isError")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        assert!(!is_error);
        let first = response
            .pointer("/result/structuredContent/0")
            .expect("first result");
        assert_eq!(first["target_name"], "Thrombin");
        assert_eq!(first["score"], 1.0);
        assert_eq!(first["match_strategy"], "exact");
    }

    #[test]
    fn numeric_arguments_accept_number_text() {
        let response = call_tool(
            &sample_records(),
            "search_by_target",
            json!({ "query": "thrombin", "limit": "1", "offset": "0" }),
        );
        let results = response
            .pointer("/result/structuredContent")
            .and_then(Value::as_array)
            .expect("results array");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn unusable_numeric_arguments_fall_back_to_defaults() {
        let response = call_tool(
            &sample_records(),
            "search_by_target",
            json!({ "query": "thrombin", "limit": "plenty", "offset": -3 }),
        );
        let results = response
            .pointer("/result/structuredContent")
            .and_then(Value::as_array)
            .expect("results array");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn search_without_query_is_a_tool_error() {
        let response = call_tool(&sample_records(), "search_by_target", json!({}));
        let is_error = response
            .pointer("/result/isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        assert!(is_error);
    }

    #[test]
    fn external_id_tool_accepts_both_argument_names() {
        let records = sample_records();
        for args in [json!({ "id": "APT-001" }), json!({ "external_id": "APT-001" })] {
            let response = call_tool(&records, "get_by_external_id", args);
            let results = response
                .pointer("/result/structuredContent")
                .and_then(Value::as_array)
                .expect("results array");
            assert_eq!(results.len(), 1);
            assert_eq!(results[0]["sequence_id"], "TBA");
        }
    }

    #[test]
    fn top_by_pkd_tool_filters_to_reported_affinities() {
        let mut records = sample_records();
        records.push(AptamerRecord {
            article_title: "t".to_string(),
            doi: "10.1/no-pkd".to_string(),
            target_name: "Thrombin".to_string(),
            sequence_id: "NOPKD".to_string(),
            ..AptamerRecord::default()
        });
        let response = call_tool(&records, "top_by_pkd", json!({ "query": "thrombin", "top": 5 }));
        let results = response
            .pointer("/result/structuredContent")
            .and_then(Value::as_array)
            .expect("results array");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["sequence_id"], "TBA");
    }

    #[test]
    fn unmatched_query_is_an_empty_success() {
        let response = call_tool(
            &sample_records(),
            "search_by_target",
            json!({ "query": "nonexistent molecule" }),
        );
        let is_error = response
            .pointer("/result/isError")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        assert!(!is_error);
        let results = response
            .pointer("/result/structuredContent")
            .and_then(Value::as_array)
            .expect("results array");
        assert!(results.is_empty());
    }

    #[test]
    fn unknown_tool_returns_tool_error_payload() {
        let response = call_tool(&sample_records(), "unknown_tool", json!({}));
        let is_error = response
            .pointer("/result/isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        assert!(is_error);
    }

    #[test]
    fn unknown_method_returns_jsonrpc_error() {
        let response = run_single(
            &sample_records(),
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "resources/list",
                "params": {}
            }),
        );
        let code = response
            .pointer("/error/code")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        assert_eq!(code, -32601);
    }

    #[test]
    fn list_targets_tool_counts_targets() {
        let response = call_tool(&sample_records(), "list_targets", json!({}));
        let results = response
            .pointer("/result/structuredContent")
            .and_then(Value::as_array)
            .expect("results array");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["count"], 1);
    }
}
