// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

#![allow(dead_code)]

use actix_web::http::StatusCode;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::TcpListener;
use std::sync::Arc;
use taxbox::config::ApiConfig;
use taxbox::item::ContentItemRef;
use taxbox::registry::{EditingSession, SessionSettings};
use taxbox::store::{
    MemoryBackend, RestClient, StoreError, StoreErrorKind, TaxonomyDirectory, TermBackend,
    TermQuery,
};
use taxbox::term::{NewTerm, TaxonomyDescriptor, Term, TermId};

pub const POST_ID: u64 = 7;
pub const NONCE: &str = "test-nonce";

/// Two taxonomies for posts and one for books, with post 7 filed under
/// World and tagged rust and tokio.
pub fn seeded_backend() -> Arc<MemoryBackend> {
    let backend = MemoryBackend::new();
    backend.add_taxonomy(
        TaxonomyDescriptor::new("category", "categories", true)
            .with_types(&["post"])
            .with_label("name", "Categories"),
    );
    backend.add_taxonomy(
        TaxonomyDescriptor::new("post_tag", "tags", false)
            .with_types(&["post"])
            .with_label("name", "Tags"),
    );
    backend.add_taxonomy(TaxonomyDescriptor::new("genre", "genres", false).with_types(&["book"]));

    backend.seed_terms(
        "categories",
        vec![
            Term::new(1, "News").with_count(4),
            Term::new(2, "World").with_parent(1).with_count(2),
            Term::new(3, "Local").with_parent(1),
            Term::new(4, "Sport").with_count(7),
            Term::new(5, "Recipes").with_count(1),
        ],
    );
    backend.seed_terms(
        "tags",
        vec![
            Term::new(10, "rust").with_count(5),
            Term::new(11, "async").with_count(2),
            Term::new(12, "tokio").with_count(1),
            Term::new(13, "unused"),
        ],
    );
    backend.seed_terms("genres", vec![Term::new(20, "Fantasy").with_count(3)]);
    backend.assign("categories", POST_ID, &[2]);
    backend.assign("tags", POST_ID, &[10, 12]);
    Arc::new(backend)
}

pub struct TestHarness {
    pub backend: Arc<MemoryBackend>,
    pub session: EditingSession,
}

impl TestHarness {
    /// A session run straight against the in-memory backend.
    pub async fn new(item_id: u64) -> Self {
        let backend = seeded_backend();
        let mut session = EditingSession::new(
            backend.clone(),
            backend.clone(),
            ContentItemRef::post(item_id),
            SessionSettings::default(),
        );
        session.run().await.expect("session run");
        Self { backend, session }
    }

    /// A session run through `RestClient` against the emulated REST API.
    pub async fn over_rest(item_id: u64) -> (Self, RestClient) {
        let backend = seeded_backend();
        let base_url = start_rest_server(backend.clone(), None).await;
        let client = RestClient::new(&api_config(&base_url)).expect("rest client");
        let shared = Arc::new(client.clone());
        let mut session = EditingSession::new(
            shared.clone(),
            shared,
            ContentItemRef::post(item_id),
            SessionSettings::default(),
        );
        session.run().await.expect("session run");
        (Self { backend, session }, client)
    }
}

pub fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        namespace: "wp/v2".to_string(),
        timeout_seconds: 5,
        username: None,
        application_password: None,
        nonce: None,
    }
}

struct ServerState {
    backend: Arc<MemoryBackend>,
    nonce: Option<String>,
    page_cap: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TermParams {
    number: Option<u32>,
    per_page: Option<u32>,
    page: Option<u32>,
    offset: Option<u32>,
    hide_empty: Option<bool>,
    post: Option<u64>,
    search: Option<String>,
    parent: Option<TermId>,
}

impl From<TermParams> for TermQuery {
    fn from(params: TermParams) -> Self {
        TermQuery {
            number: params.number.or(params.per_page),
            page: params.page,
            offset: params.offset,
            hide_empty: params.hide_empty,
            post: params.post,
            search: params.search,
            parent: params.parent,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TypeParams {
    #[serde(rename = "type")]
    post_type: String,
}

#[derive(Debug, Deserialize)]
struct ForceParams {
    #[serde(default)]
    force: bool,
}

/// Serves `wp/v2` taxonomy and term routes over `backend` on an ephemeral
/// port and returns the `wp-json` base URL. With `nonce` set, requests
/// without a matching `X-WP-Nonce` header are refused.
pub async fn start_rest_server(backend: Arc<MemoryBackend>, nonce: Option<String>) -> String {
    serve(ServerState {
        backend,
        nonce,
        page_cap: None,
    })
}

/// Like `start_rest_server`, but term listings ignore `number=0` and are cut
/// to `cap` terms per page, the way servers with a hard page limit behave.
pub async fn start_capped_rest_server(backend: Arc<MemoryBackend>, cap: u32) -> String {
    serve(ServerState {
        backend,
        nonce: None,
        page_cap: Some(cap),
    })
}

fn serve(state: ServerState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = web::Data::new(state);

    actix_web::rt::spawn(async move {
        let _ = HttpServer::new(move || {
            App::new().app_data(state.clone()).service(
                web::scope("/wp-json/wp/v2")
                    .route("/taxonomies", web::get().to(list_taxonomies))
                    .route("/{rest_base}", web::get().to(list_terms))
                    .route("/{rest_base}", web::post().to(create_term))
                    .route("/{rest_base}/{id}", web::delete().to(delete_term))
                    .route("/{rest_base}/{id}", web::post().to(update_item)),
            )
        })
        .workers(1)
        .listen(listener)
        .expect("listen")
        .run()
        .await;
    });

    format!("http://{}/wp-json", addr)
}

fn error_response(err: &StoreError) -> HttpResponse {
    let (status, code) = match err.kind() {
        StoreErrorKind::Conflict => (501, "rest_trash_not_supported"),
        StoreErrorKind::NotFound => (404, "rest_term_invalid"),
        StoreErrorKind::Validation => (400, "rest_invalid_param"),
        StoreErrorKind::Forbidden => (403, "rest_forbidden"),
        _ => (err.status().unwrap_or(500), "rest_error"),
    };
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(serde_json::json!({
        "code": code,
        "message": err.message(),
        "data": { "status": status.as_u16() },
    }))
}

fn authorize(req: &HttpRequest, state: &ServerState) -> Result<(), HttpResponse> {
    let Some(expected) = &state.nonce else {
        return Ok(());
    };
    let presented = req
        .headers()
        .get("X-WP-Nonce")
        .and_then(|value| value.to_str().ok());
    if presented == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(HttpResponse::Unauthorized().json(serde_json::json!({
            "code": "rest_cookie_invalid_nonce",
            "message": "Cookie check failed",
            "data": { "status": 401 },
        })))
    }
}

async fn list_taxonomies(
    req: HttpRequest,
    state: web::Data<ServerState>,
    params: web::Query<TypeParams>,
) -> HttpResponse {
    if let Err(response) = authorize(&req, &state) {
        return response;
    }
    match state.backend.fetch_taxonomies(&params.post_type).await {
        Ok(taxonomies) => {
            let listed: BTreeMap<String, serde_json::Value> = taxonomies
                .into_iter()
                .map(|taxonomy| {
                    let body = serde_json::json!({
                        "slug": taxonomy.slug,
                        "name": taxonomy.name,
                        "rest_base": taxonomy.rest_base,
                        "hierarchical": taxonomy.hierarchical,
                        "types": taxonomy.types,
                        "labels": taxonomy.labels,
                    });
                    (taxonomy.slug, body)
                })
                .collect();
            HttpResponse::Ok().json(listed)
        }
        Err(err) => error_response(&err),
    }
}

async fn list_terms(
    req: HttpRequest,
    state: web::Data<ServerState>,
    path: web::Path<String>,
    params: web::Query<TermParams>,
) -> HttpResponse {
    if let Err(response) = authorize(&req, &state) {
        return response;
    }
    let mut query = TermQuery::from(params.into_inner());
    if let Some(cap) = state.page_cap {
        query.number = Some(query.number.filter(|number| *number > 0).unwrap_or(cap).min(cap));
    }
    match state.backend.fetch_terms(&path, &query).await {
        Ok(page) => HttpResponse::Ok()
            .insert_header(("X-WP-Total", page.info.total.to_string()))
            .insert_header(("X-WP-TotalPages", page.info.total_pages.to_string()))
            .json(page.terms),
        Err(err) => error_response(&err),
    }
}

async fn create_term(
    req: HttpRequest,
    state: web::Data<ServerState>,
    path: web::Path<String>,
    body: web::Json<NewTerm>,
) -> HttpResponse {
    if let Err(response) = authorize(&req, &state) {
        return response;
    }
    match state.backend.create_term(&path, &body).await {
        Ok(term) => HttpResponse::Created().json(term),
        Err(err) => error_response(&err),
    }
}

async fn delete_term(
    req: HttpRequest,
    state: web::Data<ServerState>,
    path: web::Path<(String, TermId)>,
    params: web::Query<ForceParams>,
) -> HttpResponse {
    if let Err(response) = authorize(&req, &state) {
        return response;
    }
    let (rest_base, id) = path.into_inner();
    let previous = state
        .backend
        .terms(&rest_base)
        .into_iter()
        .find(|term| term.id == id);
    match state.backend.destroy_term(&rest_base, id, params.force).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "deleted": true,
            "previous": previous,
        })),
        Err(err) => error_response(&err),
    }
}

/// Stores each `<taxonomy rest_base>: [ids]` field of the item body.
async fn update_item(
    req: HttpRequest,
    state: web::Data<ServerState>,
    path: web::Path<(String, u64)>,
    body: web::Json<serde_json::Map<String, serde_json::Value>>,
) -> HttpResponse {
    if let Err(response) = authorize(&req, &state) {
        return response;
    }
    let (_, id) = path.into_inner();
    for (field, value) in body.iter() {
        if state.backend.taxonomy(field).is_none() {
            continue;
        }
        let ids: Vec<TermId> = match serde_json::from_value(value.clone()) {
            Ok(ids) => ids,
            Err(err) => {
                return error_response(&StoreError::validation(format!(
                    "{} is not a list of term ids: {}",
                    field, err
                )));
            }
        };
        state.backend.assign(field, id, &ids);
    }
    HttpResponse::Ok().json(serde_json::json!({ "id": id }))
}
