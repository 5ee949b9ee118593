//! Torznab indexer API emulation.
//!
//! Lidarr searches through `t=search`/`t=music` and fetches the NZB linked
//! from each item's enclosure.

use std::io::Cursor;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use soulbridge_core::nzb::{encode_nzb, NzbError, NzbMetadata};
use soulbridge_core::search::{
    release_title, GroupedResult, CATEGORY_AUDIO, CATEGORY_LOSSLESS, CATEGORY_MP3,
};
use soulbridge_core::slskd::{DownloadRequest, SlskdError};

use crate::state::AppState;

const DEFAULT_LIMIT: usize = 100;
const NEWZNAB_NS: &str = "http://www.newznab.com/DTD/2010/feeds/attributes/";
const TEST_ITEM_GUID: &str = "soulbridge-test";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TorznabQuery {
    t: Option<String>,
    q: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    offset: Option<String>,
    limit: Option<String>,
}

impl TorznabQuery {
    fn operation(&self) -> TorznabOperation<'_> {
        match self.t.as_deref().map(str::trim) {
            None | Some("") => TorznabOperation::Missing,
            Some("caps") => TorznabOperation::Caps,
            Some("search") | Some("music") => TorznabOperation::Search,
            Some(other) => TorznabOperation::Unsupported(other),
        }
    }

    /// `q`, else `artist album`, else `artist`.
    fn search_text(&self) -> Option<String> {
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(q) = non_empty(&self.q) {
            return Some(q);
        }
        match (non_empty(&self.artist), non_empty(&self.album)) {
            (Some(artist), Some(album)) => Some(format!("{} {}", artist, album)),
            (Some(artist), None) => Some(artist),
            _ => None,
        }
    }

    fn page(&self) -> (usize, usize) {
        let parse = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse::<usize>().ok());
        (
            parse(&self.offset).unwrap_or(0),
            parse(&self.limit).unwrap_or(DEFAULT_LIMIT),
        )
    }
}

enum TorznabOperation<'a> {
    Caps,
    Search,
    Missing,
    Unsupported(&'a str),
}

#[derive(Debug, Error)]
pub enum TorznabError {
    #[error("Missing parameter (t)")]
    MissingFunction,

    #[error("No such function ({0})")]
    UnsupportedFunction(String),

    #[error("Item not found")]
    NotFound,

    #[error("slskd search failed: {0}")]
    Upstream(#[from] SlskdError),

    #[error("Failed to render response: {0}")]
    Render(String),
}

impl TorznabError {
    /// Newznab error code and HTTP status.
    fn code(&self) -> (u16, StatusCode) {
        match self {
            TorznabError::MissingFunction => (200, StatusCode::BAD_REQUEST),
            TorznabError::UnsupportedFunction(_) => (202, StatusCode::BAD_REQUEST),
            TorznabError::NotFound => (300, StatusCode::NOT_FOUND),
            TorznabError::Upstream(_) => (900, StatusCode::BAD_GATEWAY),
            TorznabError::Render(_) => (900, StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl From<NzbError> for TorznabError {
    fn from(e: NzbError) -> Self {
        TorznabError::Render(e.to_string())
    }
}

impl IntoResponse for TorznabError {
    fn into_response(self) -> Response {
        let (code, status) = self.code();
        if status.is_server_error() {
            error!(error = %self, "Torznab request failed");
        }

        let description = self.to_string();
        let xml = render_error(code, &description).unwrap_or_else(|_| {
            format!(r#"<?xml version="1.0" encoding="UTF-8"?><error code="{}"/>"#, code)
        });
        (status, xml_headers(), xml).into_response()
    }
}

fn xml_headers() -> [(header::HeaderName, &'static str); 1] {
    [(header::CONTENT_TYPE, "application/xml; charset=utf-8")]
}

/// In-memory XML document.
struct XmlDoc {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlDoc {
    fn new() -> Result<Self, TorznabError> {
        let mut doc = Self {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        };
        doc.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(doc)
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), TorznabError> {
        self.writer
            .write_event(event)
            .map_err(|e| TorznabError::Render(e.to_string()))
    }

    fn start(&mut self, element: BytesStart<'_>) -> Result<(), TorznabError> {
        self.write(Event::Start(element))
    }

    fn end(&mut self, name: &str) -> Result<(), TorznabError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, element: BytesStart<'_>) -> Result<(), TorznabError> {
        self.write(Event::Empty(element))
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<(), TorznabError> {
        self.start(BytesStart::new(name))?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn finish(self) -> Result<String, TorznabError> {
        String::from_utf8(self.writer.into_inner().into_inner())
            .map_err(|e| TorznabError::Render(e.to_string()))
    }
}

fn element<'a>(name: &'a str, attributes: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut element = BytesStart::new(name);
    for attribute in attributes {
        element.push_attribute(*attribute);
    }
    element
}

fn render_error(code: u16, description: &str) -> Result<String, TorznabError> {
    let mut doc = XmlDoc::new()?;
    let code = code.to_string();
    doc.empty(element(
        "error",
        &[("code", code.as_str()), ("description", description)],
    ))?;
    doc.finish()
}

fn render_caps() -> Result<String, TorznabError> {
    let mut doc = XmlDoc::new()?;
    let limit = DEFAULT_LIMIT.to_string();

    doc.start(BytesStart::new("caps"))?;
    doc.empty(element("server", &[("version", "1.0"), ("title", "soulbridge")]))?;
    doc.empty(element(
        "limits",
        &[("max", limit.as_str()), ("default", limit.as_str())],
    ))?;

    doc.start(BytesStart::new("searching"))?;
    doc.empty(element(
        "search",
        &[("available", "yes"), ("supportedParams", "q")],
    ))?;
    doc.empty(element(
        "audio-search",
        &[("available", "yes"), ("supportedParams", "q,artist,album")],
    ))?;
    doc.empty(element("tv-search", &[("available", "no")]))?;
    doc.empty(element("movie-search", &[("available", "no")]))?;
    doc.end("searching")?;

    let audio = CATEGORY_AUDIO.to_string();
    let mp3 = CATEGORY_MP3.to_string();
    let lossless = CATEGORY_LOSSLESS.to_string();
    doc.start(BytesStart::new("categories"))?;
    doc.start(element("category", &[("id", audio.as_str()), ("name", "Audio")]))?;
    doc.empty(element("subcat", &[("id", mp3.as_str()), ("name", "MP3")]))?;
    doc.empty(element("subcat", &[("id", lossless.as_str()), ("name", "Lossless")]))?;
    doc.end("category")?;
    doc.end("categories")?;

    doc.end("caps")?;
    doc.finish()
}

/// One `<item>` in the search feed.
struct FeedItem {
    guid: String,
    title: String,
    category: u32,
    size: u64,
    files: usize,
    bit_rate: u32,
    link: String,
}

impl FeedItem {
    fn from_result(result: &GroupedResult, base_url: &str) -> Self {
        Self {
            guid: result.guid.clone(),
            title: release_title(result),
            category: result.category,
            size: result.total_size,
            files: result.files.len(),
            bit_rate: result.bit_rate,
            link: download_url(base_url, &result.guid),
        }
    }

    /// Returned for a search without terms, which is how Lidarr tests the indexer.
    fn test_item(base_url: &str) -> Self {
        Self {
            guid: TEST_ITEM_GUID.to_string(),
            title: "soulbridge test result [FLAC]".to_string(),
            category: CATEGORY_LOSSLESS,
            size: 1_048_576,
            files: 1,
            bit_rate: 0,
            link: download_url(base_url, TEST_ITEM_GUID),
        }
    }
}

fn download_url(base_url: &str, guid: &str) -> String {
    format!("{}/torznab/download/{}", base_url.trim_end_matches('/'), guid)
}

fn render_feed(items: &[FeedItem], offset: usize, total: usize) -> Result<String, TorznabError> {
    let mut doc = XmlDoc::new()?;
    let pub_date = Utc::now().to_rfc2822();

    doc.start(element(
        "rss",
        &[
            ("version", "2.0"),
            ("xmlns:atom", "http://www.w3.org/2005/Atom"),
            ("xmlns:newznab", NEWZNAB_NS),
        ],
    ))?;
    doc.start(BytesStart::new("channel"))?;
    doc.text_element("title", "soulbridge")?;
    doc.text_element("description", "Soulseek search results via slskd")?;

    let offset_attr = offset.to_string();
    let total_attr = total.to_string();
    doc.empty(element(
        "newznab:response",
        &[("offset", offset_attr.as_str()), ("total", total_attr.as_str())],
    ))?;

    for item in items {
        let size = item.size.to_string();
        let category = item.category.to_string();
        let files = item.files.to_string();

        doc.start(BytesStart::new("item"))?;
        doc.text_element("title", &item.title)?;
        doc.start(element("guid", &[("isPermaLink", "false")]))?;
        doc.write(Event::Text(BytesText::new(&item.guid)))?;
        doc.end("guid")?;
        doc.text_element("link", &item.link)?;
        doc.text_element("pubDate", &pub_date)?;
        doc.text_element("size", &size)?;
        doc.text_element("category", &category)?;
        doc.empty(element(
            "enclosure",
            &[
                ("url", item.link.as_str()),
                ("length", size.as_str()),
                ("type", "application/x-nzb"),
            ],
        ))?;

        let mut attrs: Vec<(&str, String)> = vec![
            ("category", category.clone()),
            ("size", size.clone()),
            ("files", files),
        ];
        if item.bit_rate > 0 {
            attrs.push(("audio:bitrate", item.bit_rate.to_string()));
        }
        attrs.push(("usenetdate", pub_date.clone()));
        for (name, value) in &attrs {
            doc.empty(element(
                "newznab:attr",
                &[("name", *name), ("value", value.as_str())],
            ))?;
        }
        doc.end("item")?;
    }

    doc.end("channel")?;
    doc.end("rss")?;
    doc.finish()
}

/// Base for enclosure links: the configured public URL, else the Host header.
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.config().server.public_url {
        return url.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{}", host)
}

/// `GET /torznab/api?t=...`
pub async fn api(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TorznabQuery>,
) -> Result<Response, TorznabError> {
    match query.operation() {
        TorznabOperation::Caps => Ok((xml_headers(), render_caps()?).into_response()),
        TorznabOperation::Search => search(&state, &headers, &query).await,
        TorznabOperation::Missing => Err(TorznabError::MissingFunction),
        TorznabOperation::Unsupported(name) => {
            Err(TorznabError::UnsupportedFunction(name.to_string()))
        }
    }
}

async fn search(
    state: &AppState,
    headers: &HeaderMap,
    query: &TorznabQuery,
) -> Result<Response, TorznabError> {
    let base_url = base_url(state, headers);
    let (offset, limit) = query.page();

    let Some(text) = query.search_text() else {
        let xml = render_feed(&[FeedItem::test_item(&base_url)], 0, 1)?;
        return Ok((rss_headers(), xml).into_response());
    };

    let results = state.search().search(&text).await?;
    let total = results.len();
    let items: Vec<FeedItem> = results
        .iter()
        .skip(offset)
        .take(limit)
        .map(|r| FeedItem::from_result(r, &base_url))
        .collect();

    info!(
        query = %text,
        total,
        offset,
        returned = items.len(),
        "Torznab search"
    );

    let xml = render_feed(&items, offset, total)?;
    Ok((rss_headers(), xml).into_response())
}

fn rss_headers() -> [(header::HeaderName, &'static str); 1] {
    [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")]
}

/// `GET /torznab/download/{guid}`
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(guid): Path<String>,
) -> Result<Response, TorznabError> {
    let guid = guid.trim_end_matches(".nzb");
    let result = state
        .search()
        .result(guid)
        .await
        .ok_or(TorznabError::NotFound)?;

    let metadata = NzbMetadata {
        username: result.username.clone(),
        files: result
            .files
            .iter()
            .map(|f| DownloadRequest {
                filename: f.filename.clone(),
                size: f.size,
            })
            .collect(),
    };
    let nzb = encode_nzb(&release_title(&result), &metadata)?;

    let disposition = format!("attachment; filename=\"{}.nzb\"", result.guid);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/x-nzb".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        nzb,
    )
        .into_response())
}
