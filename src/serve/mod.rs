// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! HTTP read surface for a single archive.
//!
//! A thin browser over the reader: the index page takes a search query,
//! result links carry the payload offset so following one skips the name
//! lookup, and every other path is treated as a page name. The page
//! template and stylesheet are embedded in the binary, so the server ships
//! as one file plus the archive.
//!
//! The archive handle is stateful (each operation seeks), so handlers take
//! it through a mutex. For a local browsing server that is plenty; fan out
//! by running more processes if it ever is not.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Form, Path as UrlPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::archive::{Archive, SearchHit};
use crate::error::{ArchiveError, Result};

const INDEX_HTML: &str = include_str!("../../data/index.html");
const STYLE_CSS: &str = include_str!("../../data/style.css");

/// Characters escaped when a page name becomes a link target. `/` stays
/// literal: names contain it and the page route is a wildcard.
const LINK_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

struct AppState {
    archive: Mutex<Archive>,
}

/// Open `archive` and serve it on `127.0.0.1:port` until interrupted.
pub fn run(archive: &Path, port: u16) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wikivault=info,tower_http=info")),
        )
        .init();

    let opened = Archive::open(archive)?;
    info!(path = %archive.display(), "archive opened");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(opened, port))
}

async fn serve(archive: Archive, port: u16) -> Result<()> {
    let state = Arc::new(AppState {
        archive: Mutex::new(archive),
    });

    let app = Router::new()
        .route("/", get(index_page).post(run_query))
        .route("/-/style.css", get(stylesheet))
        .route("/{*name}", get(page))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_page() -> Html<String> {
    Html(render_index(&[]))
}

#[derive(Deserialize)]
struct QueryForm {
    #[serde(default)]
    query: String,
}

async fn run_query(
    State(state): State<Arc<AppState>>,
    Form(form): Form<QueryForm>,
) -> Response {
    if form.query.is_empty() {
        return Html(render_index(&[])).into_response();
    }

    let results = state.archive.lock().search_default(&form.query);
    match results {
        Ok(hits) => Html(render_index(&hits)).into_response(),
        Err(e) => {
            error!(query = %form.query, error = %e, "search failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Deserialize)]
struct PageParams {
    offset: Option<u64>,
}

async fn page(
    State(state): State<Arc<AppState>>,
    UrlPath(name): UrlPath<String>,
    Query(params): Query<PageParams>,
) -> Response {
    if name == "favicon.ico" {
        return StatusCode::NO_CONTENT.into_response();
    }

    let mut archive = state.archive.lock();

    let offset = match params.offset {
        Some(offset) => offset,
        None => match archive.entry_offset(&name) {
            Ok(offset) => offset,
            Err(e) => return lookup_failure(&name, e),
        },
    };

    match archive.read_entry(offset) {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(name = %name, offset, error = %e, "payload read failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLE_CSS)
}

fn lookup_failure(name: &str, e: ArchiveError) -> Response {
    if e.is_miss() {
        StatusCode::NOT_FOUND.into_response()
    } else {
        error!(name = %name, error = %e, "lookup failed");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

fn render_index(hits: &[SearchHit]) -> String {
    let mut items = String::new();
    for hit in hits {
        items.push_str(&format!(
            "<li><a href=\"/{}?offset={}\">{}</a></li>\n",
            utf8_percent_encode(&hit.key, LINK_ESCAPE),
            hit.offset,
            escape_html(&hit.key),
        ));
    }
    INDEX_HTML.replace("{{RESULTS}}", &items)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
