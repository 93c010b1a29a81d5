//! Language server.
//!
//! Four tasks connected by channels:
//!
//! - **receiver**: reads framed messages from the client
//! - **dispatcher**: routes each message by method (runs on the caller's
//!   thread)
//! - **sender**: writes responses and notifications to the client
//! - **compiler**: see [`compiler_task`]
//!
//! Only the compiler task touches document and compiler state.

pub mod compiler_task;
pub mod protocol;
pub mod transport;

use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use serde_json::{Value, json};
use tracing::{debug, info, trace, warn};

use oak_compiler::CompileOptions;
use oak_core::{OakError, Result};

use compiler_task::{CompilerTask, Event};
use protocol::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    InitializeParams, Message, SetTraceParams, error_codes, uri_to_path,
};

/// Returned to requests received before `initialize`.
const SERVER_NOT_INITIALIZED: i64 = -32002;

/// Serve the protocol on stdin and stdout.
pub fn serve_stdio(cache_dir: PathBuf) -> Result<()> {
    info!("language server on stdio");
    serve(BufReader::new(io::stdin()), io::stdout(), cache_dir)
}

/// Accept one client on `127.0.0.1:port` and serve it.
pub fn serve_tcp(port: u16, cache_dir: PathBuf) -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port))?;
    info!(port, "language server waiting for a client");
    let (stream, peer) = listener.accept()?;
    info!(%peer, "client connected");
    let reader = BufReader::new(stream.try_clone()?);
    serve(reader, stream, cache_dir)
}

/// Serve one client until it sends `exit` or closes its input.
pub fn serve<R, W>(reader: R, writer: W, cache_dir: PathBuf) -> Result<()>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    let (incoming_tx, incoming_rx) = mpsc::channel();
    let (outgoing_tx, outgoing_rx) = mpsc::channel();
    let (events_tx, events_rx) = mpsc::channel();

    // not joined: it may stay blocked on input after `exit`
    thread::Builder::new()
        .name("oak-lsp-receiver".into())
        .spawn(move || receive(reader, incoming_tx))?;
    let sender = thread::Builder::new()
        .name("oak-lsp-sender".into())
        .spawn(move || send(writer, outgoing_rx))?;
    let task = CompilerTask::new(cache_dir, CompileOptions::default(), outgoing_tx.clone());
    let compiler = thread::Builder::new()
        .name("oak-lsp-compiler".into())
        .spawn(move || task.run(events_rx))?;

    let mut dispatcher = Dispatcher {
        outgoing: outgoing_tx,
        events: events_tx,
        initialized: false,
        shutdown: false,
    };
    dispatcher.run(incoming_rx);
    drop(dispatcher);

    compiler
        .join()
        .map_err(|_| OakError::internal("compiler task panicked"))?;
    sender
        .join()
        .map_err(|_| OakError::internal("sender task panicked"))??;
    info!("language server stopped");
    Ok(())
}

fn receive(mut reader: impl BufRead, incoming: Sender<Message>) {
    loop {
        match transport::read_message(&mut reader) {
            Ok(Some(message)) => {
                trace!(method = ?message.method, "received");
                if incoming.send(message).is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("client closed its input");
                break;
            }
            Err(err) => {
                warn!(%err, "cannot read message");
                break;
            }
        }
    }
}

fn send(mut writer: impl Write, outgoing: Receiver<Message>) -> Result<()> {
    for message in outgoing {
        trace!(method = ?message.method, id = ?message.id, "sending");
        transport::write_message(&mut writer, &message)?;
    }
    Ok(())
}

struct Dispatcher {
    outgoing: Sender<Message>,
    events: Sender<Event>,
    initialized: bool,
    shutdown: bool,
}

impl Dispatcher {
    fn run(&mut self, incoming: Receiver<Message>) {
        for message in incoming {
            let Some(method) = message.method.clone() else {
                trace!(id = ?message.id, "ignoring response");
                continue;
            };
            if method == "exit" {
                debug!(clean = self.shutdown, "exit");
                return;
            }
            if message.is_request() {
                self.request(&method, message);
            } else {
                self.notification(&method, &message);
            }
        }
    }

    fn request(&mut self, method: &str, message: Message) {
        let id = message.id.clone().unwrap_or(Value::Null);
        let reply = match method {
            "initialize" if self.initialized => Message::error(
                id,
                error_codes::INVALID_REQUEST,
                "server is already initialized",
            ),
            "initialize" => match message.params::<InitializeParams>() {
                Ok(params) => {
                    self.initialized = true;
                    self.event(Event::Roots(params.roots()));
                    Message::response(id, capabilities())
                }
                Err(err) => Message::error(id, error_codes::INVALID_PARAMS, err.to_string()),
            },
            _ if !self.initialized => {
                Message::error(id, SERVER_NOT_INITIALIZED, "server is not initialized")
            }
            "shutdown" => {
                self.shutdown = true;
                Message::response(id, Value::Null)
            }
            _ => Message::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("unsupported method '{method}'"),
            ),
        };
        self.reply(reply);
    }

    fn notification(&mut self, method: &str, message: &Message) {
        if !self.initialized || self.shutdown {
            trace!(method, "dropping notification");
            return;
        }
        let event = match method {
            "initialized" => {
                info!("client initialized");
                None
            }
            "$/setTrace" => {
                if let Ok(params) = message.params::<SetTraceParams>() {
                    debug!(value = %params.value, "trace level");
                }
                None
            }
            "textDocument/didOpen" => message
                .params::<DidOpenTextDocumentParams>()
                .ok()
                .and_then(|p| {
                    let path = uri_to_path(&p.text_document.uri)?;
                    Some(Event::Open {
                        path,
                        text: p.text_document.text,
                    })
                }),
            "textDocument/didChange" => message
                .params::<DidChangeTextDocumentParams>()
                .ok()
                .and_then(|p| {
                    let path = uri_to_path(&p.text_document.uri)?;
                    Some(Event::Change {
                        path,
                        changes: p.content_changes,
                    })
                }),
            "textDocument/didClose" => message
                .params::<DidCloseTextDocumentParams>()
                .ok()
                .and_then(|p| Some(Event::Close {
                    path: uri_to_path(&p.text_document.uri)?,
                })),
            _ => {
                trace!(method, "unhandled notification");
                None
            }
        };
        if let Some(event) = event {
            self.event(event);
        } else if method.starts_with("textDocument/") {
            warn!(method, "invalid document notification");
        }
    }

    fn event(&self, event: Event) {
        if self.events.send(event).is_err() {
            warn!("compiler task is gone");
        }
    }

    fn reply(&self, message: Message) {
        if self.outgoing.send(message).is_err() {
            warn!("sender task is gone");
        }
    }
}

fn capabilities() -> Value {
    json!({
        "capabilities": {
            "positionEncoding": "utf-32",
            "textDocumentSync": {
                "openClose": true,
                "change": 2
            }
        },
        "serverInfo": {
            "name": "oak",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}
