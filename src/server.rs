//! HTTP boundary of the gesture service.
//!
//! The endpoints mirror the contract the frontend consumes:
//!
//! - `GET /` — liveness banner.
//! - `GET /video` — annotated MJPEG stream from the camera.
//! - `POST /rate` — raw JPEG/PNG bytes in, JSON rating out.
//! - `POST /submit_review_image?remark=...` — persists the uploaded bytes and remark.

use std::{
    fs,
    io::Read,
    path::Path,
    sync::{Arc, Mutex},
    thread,
};

use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::config::Config;
use crate::hand::landmark::{self, HandLandmarker, LandmarkProvider};
use crate::image::Image;
use crate::nn::Cnn;
use crate::pipeline::GesturePipeline;
use crate::video::mjpeg::{self, MjpegStream};
use crate::video::webcam::{Webcam, WebcamOptions};

/// Upload size limit; protects the decoder from unbounded request bodies.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// The JSON reply of the rating endpoint.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RateResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RateResponse {
    fn success(rating: u8) -> Self {
        Self {
            status: "success",
            rating: Some(rating),
            message: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            rating: None,
            message: Some(message.into()),
        }
    }
}

/// The JSON reply of the review submission endpoint.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Rates the hand gesture in an uploaded image.
///
/// Decode failures and absent hands are reported in the response; nothing here is fatal to the
/// process.
pub fn rate_image<P: LandmarkProvider>(
    pipeline: &mut GesturePipeline<P>,
    data: &[u8],
) -> RateResponse {
    let frame = match Image::decode(data) {
        Ok(frame) => frame,
        Err(e) => {
            log::debug!("rejecting rating upload: {e}");
            return RateResponse::error("Invalid image");
        }
    };

    let result = pipeline.process(&frame);
    match result.rating() {
        Some(rating) => RateResponse::success(rating),
        None => RateResponse::error("No hand detected"),
    }
}

/// Persists an uploaded review image (and a non-empty remark) under a timestamped name.
///
/// Returns the generated image filename.
pub fn save_review(dir: &Path, data: &[u8], remark: &str) -> anyhow::Result<String> {
    fs::create_dir_all(dir)?;

    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let mut filename = format!("review_{timestamp}.jpg");
    // Same-second uploads get a numeric suffix instead of overwriting each other.
    let mut counter = 1;
    while dir.join(&filename).exists() {
        filename = format!("review_{timestamp}_{counter}.jpg");
        counter += 1;
    }

    fs::write(dir.join(&filename), data)?;
    if !remark.is_empty() {
        let remark_name = format!("{}.txt", filename.trim_end_matches(".jpg"));
        fs::write(dir.join(remark_name), remark)?;
    }

    Ok(filename)
}

/// The running service: configuration, the shared landmark network, and the camera.
pub struct App {
    config: Config,
    cnn: Cnn,
    camera: Mutex<Option<Webcam>>,
}

impl App {
    /// Loads the landmark model and opens the camera.
    ///
    /// A missing or broken model is fatal — every detection path needs it. A missing camera is
    /// not: the single-shot and review endpoints work without one, so it is only logged and
    /// `/video` reports it per request.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let cnn = landmark::load_cnn(&config.model)?;
        log::info!(
            "loaded hand landmark model from {} (input {})",
            config.model.display(),
            cnn.input_resolution(),
        );

        let camera = match Webcam::open(WebcamOptions::default().resolution(config.resolution)) {
            Ok(webcam) => Some(webcam),
            Err(e) => {
                log::warn!("camera unavailable, streaming disabled: {e}");
                None
            }
        };

        Ok(Self {
            config,
            cnn,
            camera: Mutex::new(camera),
        })
    }

    /// Runs the HTTP server until the process exits.
    pub fn run(self) -> anyhow::Result<()> {
        let server = tiny_http::Server::http(self.config.listen)
            .map_err(|e| anyhow::anyhow!("failed to bind {}: {e}", self.config.listen))?;
        log::info!("listening on http://{}", self.config.listen);

        let app = Arc::new(self);
        for request in server.incoming_requests() {
            let app = app.clone();
            thread::Builder::new()
                .name("http worker".into())
                .spawn(move || app.handle(request))?;
        }

        Ok(())
    }

    fn handle(&self, mut request: Request) {
        let url = request.url().to_string();
        let path = url.split('?').next().unwrap_or("/");
        log::debug!("{} {}", request.method(), url);

        let outcome = match (request.method().clone(), path) {
            (Method::Get, "/") => {
                request.respond(cors(Response::from_string("handrate backend is running")))
            }
            (Method::Get, "/video") => self.handle_video(request),
            (Method::Post, "/rate") => match read_body(&mut request) {
                Ok(body) => {
                    let mut pipeline = self.fresh_pipeline();
                    respond_json(request, &rate_image(&mut pipeline, &body))
                }
                Err(response) => request.respond(response),
            },
            (Method::Post, "/submit_review_image") => match read_body(&mut request) {
                Ok(body) => {
                    let remark = query_param(&url, "remark").unwrap_or_default();
                    respond_json(request, &self.handle_review(&body, &remark))
                }
                Err(response) => request.respond(response),
            },
            (Method::Options, _) => request.respond(cors(Response::empty(204))),
            _ => request.respond(cors(Response::empty(404))),
        };

        if let Err(e) = outcome {
            // Disconnects while streaming land here; they are ordinary.
            log::debug!("connection closed: {e}");
        }
    }

    fn fresh_pipeline(&self) -> GesturePipeline<HandLandmarker> {
        // Clones share the loaded network, so this is cheap.
        let provider = HandLandmarker::new(self.cnn.clone(), self.config.min_confidence);
        GesturePipeline::new(provider)
    }

    fn handle_video(&self, request: Request) -> std::io::Result<()> {
        // The mutex enforces the single-consumer policy for the one camera handle; a second
        // streaming client is turned away instead of waiting for the first to disconnect.
        let Ok(mut guard) = self.camera.try_lock() else {
            return request.respond(cors(
                Response::from_string("camera is busy").with_status_code(503),
            ));
        };
        let Some(webcam) = guard.as_mut() else {
            return request.respond(cors(
                Response::from_string("camera is unavailable").with_status_code(503),
            ));
        };

        let mut pipeline = self.fresh_pipeline();
        let stream = MjpegStream::new(&mut *webcam, move |frame| {
            pipeline.process_and_annotate(frame);
        });

        let content_type = Header::from_bytes(&b"Content-Type"[..], mjpeg::content_type().as_bytes())
            .expect("static header");
        let response = Response::new(StatusCode(200), vec![content_type], stream, None, None);
        request.respond(cors(response))
    }

    fn handle_review(&self, body: &[u8], remark: &str) -> ReviewResponse {
        if body.is_empty() {
            return ReviewResponse {
                status: "error",
                message: "No image provided".into(),
                filename: None,
            };
        }

        match save_review(&self.config.review_dir, body, remark) {
            Ok(filename) => ReviewResponse {
                status: "success",
                message: "Review submitted successfully".into(),
                filename: Some(filename),
            },
            Err(e) => {
                log::error!("failed to persist review image: {e}");
                ReviewResponse {
                    status: "error",
                    message: "Failed to store review".into(),
                    filename: None,
                }
            }
        }
    }
}

/// Reads a bounded request body, or produces the error response to send instead.
fn read_body(request: &mut Request) -> Result<Vec<u8>, Response<std::io::Cursor<Vec<u8>>>> {
    let mut body = Vec::new();
    let mut reader = request.as_reader().take(MAX_UPLOAD_BYTES as u64 + 1);
    if reader.read_to_end(&mut body).is_err() {
        return Err(cors(
            Response::from_string("failed to read request body").with_status_code(400),
        ));
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(cors(
            Response::from_string("request body too large").with_status_code(413),
        ));
    }
    Ok(body)
}

/// Extracts a query parameter from a request URL.
fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    form_urlencoded::parse(query.as_bytes())
        .find_map(|(key, value)| (key == name).then(|| value.into_owned()))
}

fn respond_json<T: Serialize>(request: Request, payload: &T) -> std::io::Result<()> {
    let body = serde_json::to_string(payload).expect("response serialization cannot fail");
    let content_type = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("static header");
    request.respond(cors(
        Response::from_data(body.into_bytes()).with_header(content_type),
    ))
}

/// The frontend is served from a different origin, so every response carries a blanket CORS
/// allowance, like the original deployment did.
fn cors<R: Read>(response: Response<R>) -> Response<R> {
    let allow_origin = Header::from_bytes(&b"Access-Control-Allow-Origin"[..], &b"*"[..])
        .expect("static header");
    let allow_headers = Header::from_bytes(&b"Access-Control-Allow-Headers"[..], &b"*"[..])
        .expect("static header");
    response.with_header(allow_origin).with_header(allow_headers)
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn temp_review_dir(tag: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos();
        std::env::temp_dir().join(format!("handrate-test-{tag}-{}-{nanos}", std::process::id()))
    }

    #[test]
    fn review_files_are_written() {
        let dir = temp_review_dir("review");
        let name = save_review(&dir, b"fake jpeg bytes", "nice hands").unwrap();
        assert!(name.starts_with("review_") && name.ends_with(".jpg"));
        assert_eq!(fs::read(dir.join(&name)).unwrap(), b"fake jpeg bytes");

        let remark = format!("{}.txt", name.trim_end_matches(".jpg"));
        assert_eq!(fs::read(dir.join(remark)).unwrap(), b"nice hands");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn review_names_do_not_collide() {
        let dir = temp_review_dir("collide");
        let first = save_review(&dir, b"a", "").unwrap();
        let second = save_review(&dir, b"b", "").unwrap();
        assert_ne!(first, second);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_remark_writes_no_sidecar() {
        let dir = temp_review_dir("no-remark");
        let name = save_review(&dir, b"img", "").unwrap();
        let remark = format!("{}.txt", name.trim_end_matches(".jpg"));
        assert!(!dir.join(remark).exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn query_params() {
        assert_eq!(
            query_param("/submit_review_image?remark=hello%20world", "remark").as_deref(),
            Some("hello world")
        );
        assert_eq!(
            query_param("/submit_review_image?a=1&remark=x", "remark").as_deref(),
            Some("x")
        );
        assert_eq!(query_param("/submit_review_image", "remark"), None);
    }
}
