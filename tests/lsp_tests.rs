//! Language server sessions over in-memory streams.

use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use oak::lsp::protocol::Message;
use oak::lsp::{serve, transport};

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn frame(messages: &[Value]) -> Vec<u8> {
    let mut input = Vec::new();
    for message in messages {
        let message: Message = serde_json::from_value(message.clone()).unwrap();
        transport::write_message(&mut input, &message).unwrap();
    }
    input
}

/// Run a whole session and collect what the server wrote.
fn session(messages: &[Value]) -> Vec<Message> {
    let output = SharedBuffer::default();
    let cache = std::env::temp_dir().join("oak-lsp-session-cache");
    serve(Cursor::new(frame(messages)), output.clone(), cache).unwrap();

    let bytes = output.0.lock().unwrap().clone();
    let mut reader = Cursor::new(bytes);
    let mut received = Vec::new();
    while let Some(message) = transport::read_message(&mut reader).unwrap() {
        received.push(message);
    }
    received
}

fn publishes(received: &[Message], uri: &str) -> Vec<Value> {
    received
        .iter()
        .filter(|m| m.method.as_deref() == Some("textDocument/publishDiagnostics"))
        .filter_map(|m| m.params.clone())
        .filter(|p| p["uri"] == uri)
        .map(|p| p["diagnostics"].clone())
        .collect()
}

const URI: &str = "file:///oak-lsp-session/src/M.oak";

fn initialize() -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"rootUri": null}})
}

fn open(text: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "textDocument/didOpen",
        "params": {"textDocument": {"uri": URI, "languageId": "oak", "version": 1, "text": text}}
    })
}

fn shutdown_and_exit() -> [Value; 2] {
    [
        json!({"jsonrpc": "2.0", "id": 99, "method": "shutdown"}),
        json!({"jsonrpc": "2.0", "method": "exit"}),
    ]
}

#[test]
fn open_documents_get_diagnostics() {
    let [shutdown, exit] = shutdown_and_exit();
    let received = session(&[
        initialize(),
        json!({"jsonrpc": "2.0", "method": "initialized", "params": {}}),
        open("module M\ndef x = nope\n"),
        shutdown,
        exit,
    ]);

    let init = received.iter().find(|m| m.id == Some(json!(1))).unwrap();
    let capabilities = &init.result.as_ref().unwrap()["capabilities"];
    assert_eq!(capabilities["textDocumentSync"]["change"], 2);
    assert_eq!(capabilities["positionEncoding"], "utf-32");

    let shutdown = received.iter().find(|m| m.id == Some(json!(99))).unwrap();
    assert!(shutdown.error.is_none());

    let batches = publishes(&received, URI);
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0],
        json!([{
            "range": {"start": {"line": 1, "character": 8}, "end": {"line": 1, "character": 12}},
            "severity": 1,
            "source": "oak",
            "message": "unknown identifier 'nope'"
        }])
    );
}

#[test]
fn fixed_documents_are_cleared() {
    let [shutdown, exit] = shutdown_and_exit();
    let received = session(&[
        initialize(),
        open("module M\ndef x = nope\n"),
        json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didChange",
            "params": {
                "textDocument": {"uri": URI, "version": 2},
                "contentChanges": [{
                    "range": {"start": {"line": 1, "character": 8}, "end": {"line": 1, "character": 12}},
                    "text": "42"
                }]
            }
        }),
        shutdown,
        exit,
    ]);

    let batches = publishes(&received, URI);
    assert!(!batches.is_empty());
    assert_eq!(batches.last().unwrap(), &json!([]));
}

#[test]
fn requests_before_initialize_are_rejected() {
    let received = session(&[
        json!({"jsonrpc": "2.0", "id": 5, "method": "shutdown"}),
        initialize(),
        json!({"jsonrpc": "2.0", "id": 6, "method": "textDocument/hover", "params": {}}),
        json!({"jsonrpc": "2.0", "id": 7, "method": "initialize", "params": {}}),
        json!({"jsonrpc": "2.0", "method": "exit"}),
    ]);

    let code = |id: i64| {
        received
            .iter()
            .find(|m| m.id == Some(json!(id)))
            .and_then(|m| m.error.as_ref())
            .map(|e| e.code)
    };
    assert_eq!(code(5), Some(-32002));
    assert_eq!(code(6), Some(-32601));
    assert_eq!(code(7), Some(-32600));
}
