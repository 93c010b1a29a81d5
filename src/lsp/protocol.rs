//! The subset of the language server protocol the server speaks.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use oak_core::{Diagnostic as OakDiagnostic, Location, Severity};

// ============================================================================
// JSON-RPC envelope
// ============================================================================

/// Any incoming or outgoing JSON-RPC 2.0 message.
///
/// Requests carry `id` and `method`, notifications only `method`, responses
/// only `id` with `result` or `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Message {
    pub fn notification(method: &str, params: impl Serialize) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: Some(method.into()),
            params: serde_json::to_value(params).ok(),
            ..Self::default()
        }
    }

    pub fn response(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Some(id),
            result: Some(result),
            ..Self::default()
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Some(id),
            error: Some(ResponseError {
                code,
                message: message.into(),
            }),
            ..Self::default()
        }
    }

    pub fn is_request(&self) -> bool {
        self.id.is_some() && self.method.is_some()
    }

    /// Deserialize `params` into `T`.
    pub fn params<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.params.clone().unwrap_or(Value::Null))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
}

pub mod error_codes {
    pub const INVALID_PARAMS: i64 = -32602;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_REQUEST: i64 = -32600;
}

// ============================================================================
// Positions
// ============================================================================

/// Zero-based line and character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl From<&Location> for Range {
    fn from(location: &Location) -> Self {
        let (line, column) = location.line_col();
        let (end_line, end_column) = location.end_line_col();
        Range {
            start: Position {
                line: line - 1,
                character: column - 1,
            },
            end: Position {
                line: end_line - 1,
                character: end_column - 1,
            },
        }
    }
}

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub root_uri: Option<String>,
    #[serde(default)]
    pub root_path: Option<String>,
    #[serde(default)]
    pub workspace_folders: Option<Vec<WorkspaceFolder>>,
}

impl InitializeParams {
    /// Workspace directories, most specific source first.
    pub fn roots(&self) -> Vec<PathBuf> {
        if let Some(folders) = &self.workspace_folders
            && !folders.is_empty()
        {
            return folders.iter().filter_map(|f| uri_to_path(&f.uri)).collect();
        }
        self.root_uri
            .as_deref()
            .and_then(uri_to_path)
            .or_else(|| self.root_path.as_ref().map(PathBuf::from))
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceFolder {
    pub uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextDocumentIdentifier {
    pub uri: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentItem {
    pub uri: String,
    #[serde(default)]
    pub language_id: String,
    #[serde(default)]
    pub version: i64,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidOpenTextDocumentParams {
    pub text_document: TextDocumentItem,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidChangeTextDocumentParams {
    pub text_document: TextDocumentIdentifier,
    pub content_changes: Vec<TextDocumentContentChangeEvent>,
}

/// A whole-document replacement when `range` is absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextDocumentContentChangeEvent {
    #[serde(default)]
    pub range: Option<Range>,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidCloseTextDocumentParams {
    pub text_document: TextDocumentIdentifier,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetTraceParams {
    pub value: String,
}

// ============================================================================
// Outgoing notifications
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishDiagnosticsParams {
    pub uri: String,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub range: Range,
    pub severity: u8,
    pub source: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_information: Vec<RelatedInformation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedInformation {
    pub location: LspLocation,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LspLocation {
    pub uri: String,
    pub range: Range,
}

impl From<&OakDiagnostic> for Diagnostic {
    fn from(diagnostic: &OakDiagnostic) -> Self {
        Diagnostic {
            range: Range::from(&diagnostic.location),
            severity: match diagnostic.severity {
                Severity::Error => 1,
                Severity::Warning => 2,
            },
            source: "oak",
            message: diagnostic.message.clone(),
            related_information: diagnostic
                .extra
                .iter()
                .map(|location| RelatedInformation {
                    location: LspLocation {
                        uri: path_to_uri(Path::new(location.path())),
                        range: Range::from(location),
                    },
                    message: "see also".into(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowMessageParams {
    #[serde(rename = "type")]
    pub kind: u8,
    pub message: String,
}

pub mod message_type {
    pub const ERROR: u8 = 1;
    pub const WARNING: u8 = 2;
    pub const INFO: u8 = 3;
}

// ============================================================================
// URIs
// ============================================================================

const FILE_SCHEME: &str = "file://";

/// Filesystem path of a `file://` URI.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    let encoded = uri.strip_prefix(FILE_SCHEME)?;
    // authority is empty or `localhost`
    let encoded = encoded.strip_prefix("localhost").unwrap_or(encoded);
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(hex) = encoded.get(i + 1..i + 3)
            && let Ok(byte) = u8::from_str_radix(hex, 16)
        {
            decoded.push(byte);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok().map(PathBuf::from)
}

/// `file://` URI of an absolute path.
pub fn path_to_uri(path: &Path) -> String {
    let mut uri = String::from(FILE_SCHEME);
    for byte in path.to_string_lossy().bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'/' | b'-' | b'_' | b'.' | b'~' => {
                uri.push(byte as char)
            }
            _ => uri.push_str(&format!("%{byte:02X}")),
        }
    }
    uri
}

#[cfg(test)]
mod tests {
    use super::*;
    use oak_core::SourceFile;

    #[test]
    fn uris_translate_to_paths() {
        assert_eq!(
            uri_to_path("file:///home/u/My%20Project/src/M.oak"),
            Some(PathBuf::from("/home/u/My Project/src/M.oak"))
        );
        assert_eq!(uri_to_path("file://localhost/tmp/a.oak"), Some(PathBuf::from("/tmp/a.oak")));
        assert_eq!(uri_to_path("untitled:Untitled-1"), None);

        let path = Path::new("/home/u/My Project/src/Ö.oak");
        let uri = path_to_uri(path);
        assert_eq!(uri, "file:///home/u/My%20Project/src/%C3%96.oak");
        assert_eq!(uri_to_path(&uri).as_deref(), Some(path));
    }

    #[test]
    fn locations_become_zero_based_ranges() {
        let file = SourceFile::new("/p/src/M.oak", "module M\ndef x = nope\n");
        let location = Location::new(file, 17, 21);
        let range = Range::from(&location);
        assert_eq!(range.start, Position { line: 1, character: 8 });
        assert_eq!(range.end, Position { line: 1, character: 12 });
    }

    #[test]
    fn messages_classify() {
        let request: Message =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"shutdown"}"#).unwrap();
        assert!(request.is_request());

        let notification: Message =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#)
                .unwrap();
        assert!(!notification.is_request());

        let response = serde_json::to_value(Message::response(1.into(), Value::Null)).unwrap();
        assert_eq!(response, serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": null}));
    }

    #[test]
    fn diagnostics_serialize_in_protocol_shape() {
        let file = SourceFile::new("/p/src/M.oak", "module M\ndef x = nope\n");
        let diagnostic = OakDiagnostic::error(
            Location::new(file, 17, 21),
            "unknown identifier 'nope'",
        );
        let value = serde_json::to_value(Diagnostic::from(&diagnostic)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "range": {
                    "start": {"line": 1, "character": 8},
                    "end": {"line": 1, "character": 12}
                },
                "severity": 1,
                "source": "oak",
                "message": "unknown identifier 'nope'"
            })
        );
    }
}
