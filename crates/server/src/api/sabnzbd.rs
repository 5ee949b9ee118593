//! SABnzbd download client API emulation.
//!
//! Lidarr drives downloads through one endpoint dispatched on `mode`.
//! Parameters arrive in the query string and, for POST, in a form or
//! multipart body; body fields win.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use soulbridge_core::downloads::{
    job_progress, matching_transfers, DownloadStatus, JobProgress, TrackedDownload,
};
use soulbridge_core::metrics::JOBS_REGISTERED;
use soulbridge_core::nzb::decode_nzb;
use soulbridge_core::search::job_title;
use soulbridge_core::slskd::{PeerTransfer, SlskdError};
use soulbridge_core::Identity;

use super::middleware::parse_query;
use crate::state::AppState;

/// Version reported to Lidarr.
pub const SABNZBD_VERSION: &str = "4.3.2";

/// Multipart field names accepted for the uploaded NZB.
const UPLOAD_FIELDS: &[&str] = &["name", "nzbfile"];

/// An uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Merged request parameters plus any uploaded NZB.
#[derive(Debug, Clone, Default)]
pub struct SabRequest {
    params: HashMap<String, String>,
    upload: Option<Upload>,
}

impl SabRequest {
    fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn mode(&self) -> String {
        self.param("mode").unwrap_or_default().to_lowercase()
    }
}

impl<S> FromRequest<S> for SabRequest
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut params = parse_query(request.uri());
        let content_type = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let mut upload = None;

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(request, state)
                .await
                .map_err(IntoResponse::into_response)?;

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| failure(StatusCode::BAD_REQUEST, e.to_string()))?
            {
                let name = field.name().unwrap_or_default().to_string();
                let file_name = field.file_name().map(str::to_string);

                match file_name {
                    Some(file_name) if UPLOAD_FIELDS.contains(&name.as_str()) => {
                        let data = field
                            .bytes()
                            .await
                            .map_err(|e| failure(StatusCode::BAD_REQUEST, e.to_string()))?;
                        upload = Some(Upload {
                            file_name,
                            data: data.to_vec(),
                        });
                    }
                    _ => {
                        let value = field
                            .text()
                            .await
                            .map_err(|e| failure(StatusCode::BAD_REQUEST, e.to_string()))?;
                        params.insert(name, value);
                    }
                }
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(form) = Form::<HashMap<String, String>>::from_request(request, state)
                .await
                .map_err(IntoResponse::into_response)?;
            params.extend(form);
        }

        Ok(Self { params, upload })
    }
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "status": false, "error": error.into() })),
    )
        .into_response()
}

fn success() -> Response {
    Json(json!({ "status": true })).into_response()
}

/// `GET|POST /sabnzbd/api?mode=...`
pub async fn api(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    request: SabRequest,
) -> Response {
    match request.mode().as_str() {
        "version" => Json(json!({ "version": SABNZBD_VERSION })).into_response(),
        "get_config" => Json(get_config(&state)).into_response(),
        "fullstatus" => Json(json!({
            "status": { "completedir": state.config().downloads.path }
        }))
        .into_response(),
        "queue" => match (request.param("name"), request.param("value")) {
            (Some("delete"), Some(ids)) => delete_queue_jobs(&state, &identity, ids).await,
            (None, _) => Json(queue(&state).await).into_response(),
            _ => success(),
        },
        "history" => match (request.param("name"), request.param("value")) {
            (Some("delete"), Some(ids)) => delete_history_jobs(&state, &identity, ids).await,
            (None, _) => Json(history(&state).await).into_response(),
            _ => success(),
        },
        "addfile" => add_file(&state, &identity, &request).await,
        _ => success(),
    }
}

fn get_config(state: &AppState) -> Value {
    let downloads = &state.config().downloads;
    json!({
        "config": {
            "misc": {
                "complete_dir": downloads.path,
                "pre_check": false,
                "history_retention": "",
                "enable_tv_sorting": false,
                "enable_movie_sorting": false,
                "enable_date_sorting": false,
            },
            "categories": [{
                "name": downloads.category,
                "pp": "",
                "script": "Default",
                "dir": "",
                "priority": -100,
            }],
            "sorters": [],
        }
    })
}

/// Live transfers for the tracked jobs. No jobs means no slskd call.
async fn live_transfers(
    state: &AppState,
    jobs: &[TrackedDownload],
) -> Result<Vec<PeerTransfer>, SlskdError> {
    if jobs.is_empty() {
        return Ok(Vec::new());
    }
    state.slskd().list_downloads().await
}

#[derive(Debug, Serialize)]
struct QueueSlot {
    index: usize,
    nzo_id: String,
    filename: String,
    cat: String,
    priority: &'static str,
    status: &'static str,
    mb: String,
    mbleft: String,
    percentage: String,
    timeleft: String,
}

impl QueueSlot {
    fn new(index: usize, job: &TrackedDownload, progress: &JobProgress) -> Self {
        Self {
            index,
            nzo_id: job.nzo_id.clone(),
            filename: job.title.clone(),
            cat: job.category.clone(),
            priority: "Normal",
            status: progress.status.as_str(),
            mb: format!("{:.2}", progress.mb()),
            mbleft: format!("{:.2}", progress.mb_left()),
            percentage: progress.percentage().to_string(),
            timeleft: progress.time_left.clone(),
        }
    }
}

fn queue_body(slots: Vec<QueueSlot>) -> Value {
    let downloading = slots
        .iter()
        .any(|s| s.status == DownloadStatus::Downloading.as_str());

    json!({
        "queue": {
            "status": if downloading { "Downloading" } else { "Idle" },
            "paused": false,
            "noofslots": slots.len(),
            "slots": slots,
        }
    })
}

/// Unfinished jobs. While slskd is unreachable the queue reads as empty.
async fn queue(state: &AppState) -> Value {
    let jobs = state.tracker().list().await;
    let transfers = match live_transfers(state, &jobs).await {
        Ok(transfers) => transfers,
        Err(e) => {
            warn!(error = %e, jobs = jobs.len(), "Failed to list slskd downloads, reporting an empty queue");
            return queue_body(Vec::new());
        }
    };

    let slots: Vec<QueueSlot> = jobs
        .iter()
        .map(|job| (job, job_progress(job, &transfers)))
        .filter(|(_, progress)| !progress.status.is_finished())
        .enumerate()
        .map(|(index, (job, progress))| QueueSlot::new(index, job, &progress))
        .collect();

    queue_body(slots)
}

#[derive(Debug, Serialize)]
struct HistorySlot {
    nzo_id: String,
    name: String,
    nzb_name: String,
    category: String,
    bytes: u64,
    status: &'static str,
    fail_message: String,
    completed: i64,
    download_time: i64,
    storage: String,
}

fn history_body(slots: Vec<HistorySlot>) -> Value {
    json!({
        "history": {
            "noofslots": slots.len(),
            "slots": slots,
        }
    })
}

/// Finished jobs. While slskd is unreachable the history reads as empty.
async fn history(state: &AppState) -> Value {
    let jobs = state.tracker().list().await;
    let transfers = match live_transfers(state, &jobs).await {
        Ok(transfers) => transfers,
        Err(e) => {
            warn!(error = %e, jobs = jobs.len(), "Failed to list slskd downloads, reporting an empty history");
            return history_body(Vec::new());
        }
    };

    let now = chrono::Utc::now();
    let download_path = state.config().downloads.path.trim_end_matches('/');

    let slots: Vec<HistorySlot> = jobs
        .iter()
        .map(|job| (job, job_progress(job, &transfers)))
        .filter(|(_, progress)| progress.status.is_finished())
        .map(|(job, progress)| HistorySlot {
            nzo_id: job.nzo_id.clone(),
            name: job.title.clone(),
            nzb_name: format!("{}.nzb", job.title),
            category: job.category.clone(),
            bytes: job.total_size,
            status: progress.status.as_str(),
            fail_message: if progress.status == DownloadStatus::Failed {
                "One or more transfers failed".to_string()
            } else {
                String::new()
            },
            completed: now.timestamp(),
            download_time: (now - job.added_at).num_seconds().max(0),
            storage: format!("{}/{}", download_path, job.username),
        })
        .collect();

    history_body(slots)
}

fn job_ids(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|id| !id.is_empty())
}

fn job_lock_key(nzo_id: &str) -> String {
    format!("job:{}", nzo_id)
}

/// Cancel the jobs' live transfers, then forget the jobs. Always succeeds.
async fn delete_queue_jobs(state: &AppState, identity: &Identity, ids: &str) -> Response {
    for id in job_ids(ids) {
        state
            .lock()
            .acquire(&job_lock_key(id), || delete_queue_job(state, identity, id))
            .await;
    }
    success()
}

async fn delete_queue_job(state: &AppState, identity: &Identity, id: &str) {
    let Some(job) = state.tracker().get(id).await else {
        return;
    };

    match state.slskd().list_downloads().await {
        Ok(transfers) => {
            let cancellations = matching_transfers(&job, &transfers)
                .into_iter()
                .map(|t| async move { (t, state.slskd().cancel_download(&t.username, &t.id).await) });

            for (transfer, result) in join_all(cancellations).await {
                if let Err(e) = result {
                    warn!(
                        nzo_id = id,
                        filename = %transfer.filename,
                        error = %e,
                        "Failed to cancel transfer"
                    );
                }
            }
        }
        Err(e) => {
            warn!(nzo_id = id, error = %e, "Failed to list slskd downloads, removing job without cancelling");
        }
    }

    state.tracker().remove(id).await;
    info!(
        nzo_id = id,
        title = %job.title,
        principal = %identity.principal,
        "Removed job from queue"
    );
}

async fn delete_history_jobs(state: &AppState, identity: &Identity, ids: &str) -> Response {
    for id in job_ids(ids) {
        let removed = state
            .lock()
            .acquire(&job_lock_key(id), || state.tracker().remove(id))
            .await;
        if removed.is_some() {
            info!(nzo_id = id, principal = %identity.principal, "Removed job from history");
        }
    }
    success()
}

async fn add_file(state: &AppState, identity: &Identity, request: &SabRequest) -> Response {
    let Some(upload) = &request.upload else {
        return failure(StatusCode::BAD_REQUEST, "No NZB file uploaded");
    };

    let xml = String::from_utf8_lossy(&upload.data);
    let metadata = match decode_nzb(&xml) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(file = %upload.file_name, error = %e, "Rejected NZB upload");
            return failure(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let Some(first) = metadata.files.first() else {
        return failure(StatusCode::BAD_REQUEST, "NZB lists no files");
    };
    let title = job_title(&first.filename);
    let category = request
        .param("cat")
        .unwrap_or(&state.config().downloads.category)
        .to_string();

    if let Err(e) = state
        .slskd()
        .enqueue_downloads(&metadata.username, &metadata.files)
        .await
    {
        tracing::error!(
            username = %metadata.username,
            title = %title,
            error = %e,
            "Failed to enqueue downloads on slskd"
        );
        return failure(StatusCode::BAD_GATEWAY, format!("Failed to enqueue: {}", e));
    }

    let job = TrackedDownload::new(title, category, metadata.username, metadata.files);
    let nzo_id = job.nzo_id.clone();
    info!(
        nzo_id = %nzo_id,
        title = %job.title,
        username = %job.username,
        files = job.files.len(),
        principal = %identity.principal,
        "Registered download job"
    );
    state.tracker().add(job).await;
    JOBS_REGISTERED.inc();

    Json(json!({ "status": true, "nzo_ids": [nzo_id] })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(pairs: &[(&str, &str)]) -> SabRequest {
        SabRequest {
            params: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            upload: None,
        }
    }

    #[test]
    fn test_mode_is_case_insensitive() {
        assert_eq!(request(&[("mode", "ADDFILE")]).mode(), "addfile");
        assert_eq!(request(&[]).mode(), "");
    }

    #[test]
    fn test_blank_params_are_absent() {
        let req = request(&[("name", "  "), ("value", "SABnzbd_nzo_x")]);
        assert_eq!(req.param("name"), None);
        assert_eq!(req.param("value"), Some("SABnzbd_nzo_x"));
    }

    #[test]
    fn test_job_ids_split() {
        let ids: Vec<&str> = job_ids("a, b,,c ").collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
