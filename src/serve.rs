//! Local HTTP JSON API over the element store
//!
//! `diagtree serve` → listens on 127.0.0.1 and answers one request at a time.
//! Every response is `{ ok, data, error }`.

use serde::{Deserialize, Serialize};
use tiny_http::{Header, Method, Request, Response, Server};

use crate::config::Config;
use crate::layout::{LayeredLayout, Layout, LayoutConfig, LayoutEngine};
use crate::model::Element;
use crate::store::{ElementStore, StoreError};
use crate::subgraph::{extract, Subgraph};
use crate::tree::build_forest;

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// A response before it is handed to tiny_http
#[derive(Debug)]
struct Reply {
    status: u16,
    body: String,
    /// Download file name, sent as a Content-Disposition attachment
    attachment: Option<String>,
}

impl Reply {
    fn json<T: Serialize>(status: u16, payload: &ApiResponse<T>) -> Self {
        let body = serde_json::to_string(payload).unwrap_or_else(|e| {
            format!(r#"{{"ok":false,"data":null,"error":"serialization failed: {}"}}"#, e)
        });
        Self {
            status,
            body,
            attachment: None,
        }
    }

    fn ok<T: Serialize>(data: T) -> Self {
        Self::json(200, &ApiResponse::success(data))
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, &ApiResponse::failure(message))
    }

    fn from_store_error(e: StoreError) -> Self {
        let status = match e {
            StoreError::Validation(_) | StoreError::Json(_) => 400,
            StoreError::NotFound(_) => 404,
            StoreError::Cycle { .. } => 409,
            StoreError::Storage(_) => 500,
        };
        Self::error(status, e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    element_id: String,
    #[serde(default)]
    new_parent: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubgraphView {
    subgraph: Subgraph,
    layout: Layout,
}

#[derive(Debug, Serialize)]
struct Created {
    id: String,
}

/// Request state shared across the loop
pub struct ApiState {
    store: ElementStore,
    layout: LayoutConfig,
    export_name: String,
}

impl ApiState {
    pub fn new(store: ElementStore, config: &Config) -> Self {
        Self {
            store,
            layout: config.layout.clone(),
            export_name: config.export.file_name.clone(),
        }
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }
}

/// Start the JSON API server
pub fn start_server(port: u16, mut state: ApiState) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr).map_err(|e| std::io::Error::other(e.to_string()))?;

    eprintln!("\n\x1b[1;32mdiagtree\x1b[0m");
    eprintln!("   API: http://localhost:{}/api/elements", port);
    eprintln!("   Storage: {}", state.store.storage_location());
    eprintln!("   Press Ctrl+C to stop\n");
    log::info!("listening on {}", addr);

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(&mut state, request) {
            log::error!("request failed: {}", e);
        }
    }
    Ok(())
}

fn handle_request(state: &mut ApiState, mut request: Request) -> std::io::Result<()> {
    let method = request.method().clone();
    let url = request.url().to_string();

    let mut body = String::new();
    if matches!(method, Method::Post | Method::Put) {
        if let Err(e) = request.as_reader().read_to_string(&mut body) {
            let reply = Reply::error(400, format!("Failed to read body: {}", e));
            return respond(request, reply);
        }
    }

    let reply = route(state, &method, &url, &body);
    log::debug!("{} {} -> {}", method, url, reply.status);
    respond(request, reply)
}

fn respond(request: Request, reply: Reply) -> std::io::Result<()> {
    let mut response = Response::from_string(reply.body).with_status_code(reply.status);
    if let Ok(h) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(h);
    }
    if let Some(name) = reply.attachment {
        let value = format!("attachment; filename=\"{}\"", name);
        if let Ok(h) = Header::from_bytes(&b"Content-Disposition"[..], value.as_bytes()) {
            response = response.with_header(h);
        }
    }
    request.respond(response)
}

fn route(state: &mut ApiState, method: &Method, url: &str, body: &str) -> Reply {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    let reply = match (method, segments.as_slice()) {
        (Method::Get, ["api", "elements"]) => {
            Reply::ok(state.store.elements().cloned().collect::<Vec<Element>>())
        }
        (Method::Get, ["api", "tree"]) => Reply::ok(build_forest(&state.store)),
        (Method::Get, ["api", "elements", id]) => match state.store.get(id) {
            Some(el) => Reply::ok(el.clone()),
            None => Reply::from_store_error(StoreError::NotFound(id.to_string())),
        },
        (Method::Get, ["api", "search"]) => match serde_urlencoded::from_str::<SearchQuery>(query) {
            Ok(q) => Reply::ok(state.store.search(&q.q).into_iter().cloned().collect::<Vec<Element>>()),
            Err(e) => Reply::error(400, format!("Invalid query: {}", e)),
        },
        (Method::Get, ["api", "subgraph", id]) if !state.store.contains(id) => {
            Reply::from_store_error(StoreError::NotFound(id.to_string()))
        }
        (Method::Get, ["api", "subgraph", id]) => {
            let subgraph = extract(&state.store, id);
            let layout = LayeredLayout.layout(&subgraph, &state.layout);
            Reply::ok(SubgraphView { subgraph, layout })
        }
        (Method::Get, ["api", "export"]) => match state.store.data().to_pretty_json() {
            Ok(json) => Reply {
                status: 200,
                body: json,
                attachment: Some(state.export_name.clone()),
            },
            Err(e) => Reply::error(500, e.to_string()),
        },
        (Method::Post, ["api", "elements"]) => match serde_json::from_str::<Element>(body) {
            Ok(element) => match state.store.add(element) {
                Ok(id) => Reply::json(201, &ApiResponse::success(Created { id })),
                Err(e) => Reply::from_store_error(e),
            },
            Err(e) => Reply::error(400, format!("Invalid JSON: {}", e)),
        },
        (Method::Put, ["api", "elements", id]) => match serde_json::from_str::<Element>(body) {
            Ok(mut element) => {
                element.id = id.to_string();
                match state.store.update(element) {
                    Ok(()) => Reply::ok(state.store.get(id).cloned()),
                    Err(e) => Reply::from_store_error(e),
                }
            }
            Err(e) => Reply::error(400, format!("Invalid JSON: {}", e)),
        },
        (Method::Delete, ["api", "elements", id]) => match state.store.delete(id) {
            Ok(removed) => Reply::ok(removed),
            Err(e) => Reply::from_store_error(e),
        },
        (Method::Post, ["api", "move"]) => match serde_json::from_str::<MoveRequest>(body) {
            Ok(req) => match state
                .store
                .move_element(&req.element_id, req.new_parent.as_deref())
            {
                Ok(()) => Reply::ok(state.store.get(&req.element_id).cloned()),
                Err(e) => Reply::from_store_error(e),
            },
            Err(e) => Reply::error(400, format!("Invalid JSON: {}", e)),
        },
        _ => Reply::error(404, "Not found"),
    };

    for notice in state.store.drain_notices() {
        log::debug!("[{:?}] {}", notice.level, notice);
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementType, ElementsData};
    use serde_json::Value;

    fn state() -> ApiState {
        let store = ElementStore::in_memory(ElementsData::new(vec![
            Element::new(ElementType::Category, "Pump").with_id("cat1"),
            Element::new(ElementType::Verification, "Pressure low?")
                .with_id("verif1")
                .with_parent("cat1")
                .with_branches(Some("action1"), None),
            Element::new(ElementType::Action, "Replace seal")
                .with_id("action1")
                .with_parent("verif1"),
        ]));
        ApiState::new(store, &Config::default())
    }

    fn call(state: &mut ApiState, method: Method, url: &str, body: &str) -> (u16, Value) {
        let reply = route(state, &method, url, body);
        let value = serde_json::from_str(&reply.body).unwrap();
        (reply.status, value)
    }

    #[test]
    fn test_api_response_serializes_to_json() {
        let response: ApiResponse<String> = ApiResponse::success("test".to_string());
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"ok\":true"));
        assert!(json.contains("\"data\":\"test\""));
        assert!(json.contains("\"error\":null"));
    }

    #[test]
    fn test_list_and_get() {
        let mut state = state();
        let (status, body) = call(&mut state, Method::Get, "/api/elements", "");
        assert_eq!(status, 200);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);

        let (status, body) = call(&mut state, Method::Get, "/api/elements/verif1", "");
        assert_eq!(status, 200);
        assert_eq!(body["data"]["type"], "verification");

        let (status, body) = call(&mut state, Method::Get, "/api/elements/nope", "");
        assert_eq!(status, 404);
        assert_eq!(body["ok"], false);
    }

    #[test]
    fn test_tree() {
        let mut state = state();
        let (_, body) = call(&mut state, Method::Get, "/api/tree", "");
        let roots = body["data"].as_array().unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0]["element"]["id"], "cat1");
        assert_eq!(roots[0]["children"][0]["children"][0]["element"]["id"], "action1");
    }

    #[test]
    fn test_search_query_string() {
        let mut state = state();
        let (_, body) = call(&mut state, Method::Get, "/api/search?q=pressure+LOW", "");
        assert_eq!(body["data"][0]["id"], "verif1");

        let (_, body) = call(&mut state, Method::Get, "/api/search?q=%20", "");
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_subgraph_includes_layout() {
        let mut state = state();
        let (_, body) = call(&mut state, Method::Get, "/api/subgraph/verif1", "");
        assert_eq!(body["data"]["subgraph"]["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["subgraph"]["edges"][0]["id"], "verif1-ok-action1");
        assert_eq!(body["data"]["layout"]["nodes"][1]["y"], 170.0);
        assert_eq!(body["data"]["layout"]["edges"][0]["id"], "verif1-ok-action1");
        assert!(body["data"]["layout"]["edges"][0]["points"].as_array().unwrap().len() >= 2);

        let (status, _) = call(&mut state, Method::Get, "/api/subgraph/ghost", "");
        assert_eq!(status, 404);
    }

    #[test]
    fn test_export_is_attachment() {
        let mut state = state();
        let reply = route(&mut state, &Method::Get, "/api/export", "");
        assert_eq!(reply.attachment.as_deref(), Some("troubleshooting-data.json"));
        assert!(reply.body.starts_with("{\n  \"elements\""));
    }

    #[test]
    fn test_create_update_delete() {
        let mut state = state();
        let (status, body) = call(
            &mut state,
            Method::Post,
            "/api/elements",
            r#"{"type":"action","title":"Check hose","parent":"cat1"}"#,
        );
        assert_eq!(status, 201);
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert!(id.starts_with("action"));

        let (status, body) = call(
            &mut state,
            Method::Put,
            &format!("/api/elements/{}", id),
            r#"{"type":"action","title":"Check hose clamp","parent":"cat1"}"#,
        );
        assert_eq!(status, 200);
        assert_eq!(body["data"]["title"], "Check hose clamp");

        let (status, body) = call(&mut state, Method::Delete, "/api/elements/verif1", "");
        assert_eq!(status, 200);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(state.store().len(), 2);
    }

    #[test]
    fn test_post_body_over_socket() {
        use std::io::{Read, Write};
        use std::net::TcpStream;

        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let client = std::thread::spawn(move || {
            let body = r#"{"type":"state","title":"Motor hums","parent":"cat1"}"#;
            let mut stream = TcpStream::connect(addr).unwrap();
            write!(
                stream,
                "POST /api/elements HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).unwrap();
            response
        });

        let mut state = state();
        handle_request(&mut state, server.recv().unwrap()).unwrap();
        let response = client.join().unwrap();

        assert!(response.starts_with("HTTP/1.1 201"));
        assert!(response.contains("\"id\":\"state"));
        assert_eq!(state.store().len(), 4);
    }

    #[test]
    fn test_validation_errors() {
        let mut state = state();
        let (status, body) = call(
            &mut state,
            Method::Post,
            "/api/elements",
            r#"{"type":"action","title":"  ","parent":null}"#,
        );
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Title is required");

        let (status, _) = call(&mut state, Method::Post, "/api/elements", "not json");
        assert_eq!(status, 400);
    }

    #[test]
    fn test_move_cycle_conflict() {
        let mut state = state();
        let (status, _) = call(
            &mut state,
            Method::Post,
            "/api/move",
            r#"{"element_id":"cat1","new_parent":"action1"}"#,
        );
        assert_eq!(status, 409);
        assert_eq!(state.store().get("cat1").unwrap().parent, None);

        let (status, body) = call(
            &mut state,
            Method::Post,
            "/api/move",
            r#"{"element_id":"action1","new_parent":null}"#,
        );
        assert_eq!(status, 200);
        assert_eq!(body["data"]["parent"], Value::Null);
    }

    #[test]
    fn test_unknown_route() {
        let mut state = state();
        let (status, body) = call(&mut state, Method::Get, "/api/nothing", "");
        assert_eq!(status, 404);
        assert_eq!(body["error"], "Not found");
    }
}
