use crate::state::RosterState;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer, limit::RequestBodyLimitLayer, services::ServeDir,
    trace::TraceLayer,
};

pub mod api;
pub mod audio;
pub mod import;
pub mod index;
pub mod qr;
pub mod students;

pub fn router(state: RosterState) -> Router {
    let storage_config = state.config().storage_config();

    Router::new()
        .route("/", get(index::get_index_route))
        .route(
            "/student/add",
            get(students::get_add_student).post(students::post_add_student),
        )
        .route("/student/email", get(students::get_student_by_email))
        .route("/student/{id}", get(students::get_student))
        .route(
            "/student/{id}/edit",
            get(students::get_edit_student).post(students::post_edit_student),
        )
        .route("/student/{id}/delete", post(students::post_delete_student))
        .route("/student/{id}/qrcode", get(qr::get_qrcode))
        .route("/student/{id}/play_audio", get(audio::get_play_audio))
        .route("/student/{id}/audio", get(audio::get_audio))
        .route("/scan", get(qr::get_scan).post(qr::post_scan))
        .route("/scan/advanced", get(qr::get_scan_advanced))
        .route("/import", get(import::get_import).post(import::post_import))
        .route("/api/student", post(api::post_student))
        .route(
            "/api/student/{id}",
            get(api::get_student).put(api::put_student),
        )
        .nest_service("/qrcodes", ServeDir::new(&storage_config.qr_code_dir))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(storage_config.max_upload_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{FakeTranscoder, SourceFormat, Transcoder},
        config::{DbConfig, RuntimeConfiguration, StorageConfig},
        data::{
            DataType,
            student::{AudioClip, Student, StudentFields, StudentUpdate},
            test_pool,
        },
        error::RosterResult,
        files::FileManager,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, Response, StatusCode, header},
    };
    use base64::{Engine, prelude::BASE64_STANDARD};
    use serde_json::{Value, json};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::{sync::Arc, time::Duration};
    use tempfile::TempDir;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    const BOUNDARY: &str = "roster-test-boundary";

    struct TestApp {
        state: RosterState,
        transcoder: Arc<FakeTranscoder>,
        qr_dir: TempDir,
    }

    impl TestApp {
        async fn new() -> Self {
            let qr_dir = TempDir::new().unwrap();
            let config = RuntimeConfiguration::from_parts(
                DbConfig {
                    path: ":memory:".to_string(),
                    max_connections: 1,
                },
                StorageConfig {
                    qr_code_dir: qr_dir.path().to_path_buf(),
                    ffmpeg_path: "ffmpeg".into(),
                    max_upload_bytes: 1024 * 1024,
                },
            );
            let transcoder = Arc::new(FakeTranscoder::default());
            let state = RosterState::from_parts(test_pool().await, config, transcoder.clone());

            Self {
                state,
                transcoder,
                qr_dir,
            }
        }

        async fn send(&self, request: Request<Body>) -> Response<Body> {
            router(self.state.clone()).oneshot(request).await.unwrap()
        }

        async fn add(&self, first_name: &str, email: &str) -> i64 {
            let fields = StudentFields {
                first_name: Some(first_name.to_string()),
                last_name: Some("Smith".to_string()),
                department: Some("Physics".to_string()),
                email: Some(email.to_string()),
                audio: None,
            };
            Student::insert_into_database(fields, &mut *self.state.get_connection().await.unwrap())
                .await
                .unwrap()
        }

        async fn get(&self, id: i64) -> Option<Student> {
            Student::get_from_db_by_id(id, &mut *self.state.get_connection().await.unwrap())
                .await
                .unwrap()
        }
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a str, &'a [u8]),
    }

    fn multipart(uri: &str, parts: &[Part]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, filename, content_type, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    fn student_parts<'a>(first_name: &'a str, email: &'a str) -> Vec<Part<'a>> {
        vec![
            Part::Text("first_name", first_name),
            Part::Text("last_name", "Lovelace"),
            Part::Text("department", "Mathematics"),
            Part::Text("email", email),
        ]
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, value: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap()
    }

    fn location(response: &Response<Body>) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response<Body>) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        String::from_utf8(body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn index_lists_students() {
        let app = TestApp::new().await;
        app.add("Grace", "grace@example.com").await;

        let response = app.send(get_request("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Grace Smith"));
        assert!(body.contains("grace@example.com"));
    }

    #[tokio::test]
    async fn add_student_redirects_home() {
        let app = TestApp::new().await;

        let response = app
            .send(multipart(
                "/student/add",
                &student_parts("Ada", "ada@example.com"),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let student = app.get(1).await.unwrap();
        assert_eq!(student.first_name, "Ada");
        assert!(student.audio.is_none());
    }

    #[tokio::test]
    async fn add_student_keeps_uploaded_audio() {
        let app = TestApp::new().await;
        let mut parts = student_parts("Ada", "ada@example.com");
        parts.push(Part::File("audio", "../my clip.wav", "audio/wav", b"RIFF-ish"));

        let response = app.send(multipart("/student/add", &parts)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let audio = app.get(1).await.unwrap().audio.unwrap();
        assert_eq!(audio.filename, "my_clip.wav");
        assert_eq!(audio.bytes, b"RIFF-ish");
    }

    #[tokio::test]
    async fn add_student_without_a_field_is_rejected() {
        let app = TestApp::new().await;
        let parts = vec![
            Part::Text("first_name", "Ada"),
            Part::Text("last_name", "Lovelace"),
            Part::Text("department", "  "),
            Part::Text("email", "ada@example.com"),
        ];

        let response = app.send(multipart("/student/add", &parts)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("department"));
        assert!(app.get(1).await.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_leaves_existing_student_alone() {
        let app = TestApp::new().await;
        let id = app.add("Grace", "dup@example.com").await;

        let response = app
            .send(multipart("/student/add", &student_parts("Ada", "dup@example.com")))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let student = app.get(id).await.unwrap();
        assert_eq!(student.first_name, "Grace");
        assert!(app.get(id + 1).await.is_none());
    }

    #[tokio::test]
    async fn view_and_find_by_email() {
        let app = TestApp::new().await;
        let id = app.add("Grace", "grace@example.com").await;

        let response = app.send(get_request(&format!("/student/{id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Grace Smith"));

        let response = app.send(get_request("/student/email?email=grace@example.com")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Grace Smith"));

        let response = app.send(get_request("/student/email?email=nobody@example.com")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.send(get_request("/student/email")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.send(get_request("/student/999")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scanning_a_generated_code_redirects_to_the_student() {
        let app = TestApp::new().await;
        sqlx::query(
            "INSERT INTO students (id, first_name, last_name, department, email) VALUES (7, 'Alan', 'Turing', 'Computing', 'alan@example.com')",
        )
        .execute(&*app.state)
        .await
        .unwrap();

        let response = app.send(get_request("/student/7/qrcode")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("data:image/png;base64,"));

        let student = app.get(7).await.unwrap();
        assert_eq!(student.qr_code_file.as_deref(), Some("7_qrcode.png"));
        let png = std::fs::read(app.qr_dir.path().join("7_qrcode.png")).unwrap();

        let response = app
            .send(multipart(
                "/scan",
                &[Part::File("qr_code", "code.png", "image/png", &png)],
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/student/7");
    }

    #[tokio::test]
    async fn stored_qr_codes_are_served() {
        let app = TestApp::new().await;
        let id = app.add("Grace", "grace@example.com").await;
        app.send(get_request(&format!("/student/{id}/qrcode"))).await;

        let response = app.send(get_request(&format!("/qrcodes/{id}_qrcode.png"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn scanning_a_blank_image_changes_nothing() {
        use image::{DynamicImage, GrayImage, ImageFormat, Luma};
        use std::io::Cursor;

        let app = TestApp::new().await;
        let id = app.add("Grace", "grace@example.com").await;

        let mut blank = Vec::new();
        DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 100, Luma([255])))
            .write_to(&mut Cursor::new(&mut blank), ImageFormat::Png)
            .unwrap();

        let response = app
            .send(multipart(
                "/scan",
                &[Part::File("qr_code", "blank.png", "image/png", &blank)],
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.send(multipart("/scan", &[])).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let student = app.get(id).await.unwrap();
        assert_eq!(student.first_name, "Grace");
        assert!(student.qr_code_file.is_none());
    }

    #[tokio::test]
    async fn delete_removes_record_and_qr_file() {
        let app = TestApp::new().await;
        let id = app.add("Grace", "grace@example.com").await;
        app.send(get_request(&format!("/student/{id}/qrcode"))).await;
        let qr_path = FileManager::new(app.qr_dir.path()).qr_path(id);
        assert!(qr_path.exists());

        let response = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri(format!("/student/{id}/delete"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        assert!(!qr_path.exists());
        assert!(app.get(id).await.is_none());
        let response = app.send(get_request(&format!("/student/{id}"))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_a_missing_student_is_not_found() {
        let app = TestApp::new().await;

        let response = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/student/42/delete")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn edit_with_recording_stores_transcoded_mp3() {
        let app = TestApp::new().await;
        let id = app.add("Grace", "grace@example.com").await;

        let data_url = format!(
            "data:audio/webm;codecs=opus;base64,{}",
            BASE64_STANDARD.encode(b"webm bytes")
        );
        let mut parts = student_parts("Grace", "grace@example.com");
        parts.push(Part::Text("audio_data", &data_url));

        let response = app
            .send(multipart(&format!("/student/{id}/edit"), &parts))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), format!("/student/{id}"));

        let audio = app.get(id).await.unwrap().audio.unwrap();
        assert_eq!(audio.filename, format!("{id}_audio.mp3"));
        assert_eq!(audio.bytes, b"ID3 fake mp3");

        let seen = app.transcoder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (path, existed, _) = &seen[0];
        assert!(*existed);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn edit_prefers_uploaded_file_over_recording() {
        let app = TestApp::new().await;
        let id = app.add("Grace", "grace@example.com").await;

        let data_url = format!(
            "data:audio/ogg;base64,{}",
            BASE64_STANDARD.encode(b"ogg bytes")
        );
        let mut parts = student_parts("Grace", "grace@example.com");
        parts.push(Part::File("audio", "upload.mp3", "audio/mpeg", b"ID3 upload"));
        parts.push(Part::Text("audio_data", &data_url));

        let response = app
            .send(multipart(&format!("/student/{id}/edit"), &parts))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let audio = app.get(id).await.unwrap().audio.unwrap();
        assert_eq!(audio.filename, "upload.mp3");
        assert!(app.transcoder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn edit_with_unsupported_recording_changes_nothing() {
        let app = TestApp::new().await;
        let id = app.add("Grace", "grace@example.com").await;

        let mut parts = student_parts("Renamed", "grace@example.com");
        parts.push(Part::Text("audio_data", "data:audio/flac;base64,AAAA"));

        let response = app
            .send(multipart(&format!("/student/{id}/edit"), &parts))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let student = app.get(id).await.unwrap();
        assert_eq!(student.first_name, "Grace");
        assert!(student.audio.is_none());
    }

    #[tokio::test]
    async fn audio_is_served_with_content_type() {
        let app = TestApp::new().await;
        let fields = StudentFields {
            first_name: Some("Grace".to_string()),
            last_name: Some("Hopper".to_string()),
            department: Some("Navy".to_string()),
            email: Some("grace@example.com".to_string()),
            audio: Some(AudioClip {
                bytes: b"ID3 some mp3".to_vec(),
                filename: "grace.mp3".to_string(),
            }),
        };
        let id = Student::insert_into_database(fields, &mut *app.state.get_connection().await.unwrap())
            .await
            .unwrap();
        let no_audio = app.add("Ada", "ada@example.com").await;

        let response = app.send(get_request(&format!("/student/{id}/play_audio"))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), format!("/student/{id}/audio"));

        let response = app.send(get_request(&format!("/student/{id}/audio"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(body_bytes(response).await, b"ID3 some mp3");

        let response = app.send(get_request(&format!("/student/{no_audio}/play_audio"))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app.send(get_request(&format!("/student/{no_audio}/audio"))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn api_create_get_and_partial_update() {
        let app = TestApp::new().await;

        let response = app
            .send(json_request(
                "POST",
                "/api/student",
                &json!({
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "department": "Mathematics",
                    "email": "ada@example.com",
                }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["message"], "Student created successfully.");
        let id = created["id"].as_i64().unwrap();

        let response = app.send(get_request(&format!("/api/student/{id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let student = body_json(response).await;
        assert_eq!(student["email"], "ada@example.com");
        assert_eq!(student["audio_url"], Value::Null);

        let response = app
            .send(json_request(
                "PUT",
                &format!("/api/student/{id}"),
                &json!({ "department": "Computing" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let student = body_json(response).await;
        assert_eq!(student["department"], "Computing");
        assert_eq!(student["first_name"], "Ada");
        assert_eq!(student["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn api_errors_are_json() {
        let app = TestApp::new().await;
        app.add("Grace", "grace@example.com").await;

        let response = app.send(get_request("/api/student/404")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_json(response).await["error"].is_string());

        let response = app
            .send(json_request(
                "POST",
                "/api/student",
                &json!({ "first_name": "Ada", "last_name": "Lovelace", "department": "Maths" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(
            body_json(response).await["error"]
                .as_str()
                .unwrap()
                .contains("email")
        );

        let response = app
            .send(json_request(
                "PUT",
                "/api/student/1",
                &json!({ "email": "grace@example.com", "first_name": "" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .send(json_request(
                "PUT",
                "/api/student/404",
                &json!({ "department": "Computing" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unreadable_api_bodies_are_json_errors() {
        let app = TestApp::new().await;
        let id = app.add("Grace", "grace@example.com").await;

        let response = app
            .send(json_request("POST", "/api/student", &json!({ "first_name": 5 })))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_json(response).await["error"].is_string());

        let response = app
            .send(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/api/student/{id}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"department\": "))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());

        let response = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/api/student")
                    .body(Body::from("first_name=Ada"))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body_json(response).await["error"].is_string());

        assert_eq!(app.get(id).await.unwrap().department, "Physics");
        assert!(app.get(id + 1).await.is_none());
    }

    /// Holds every transcode until told to finish.
    #[derive(Debug, Default)]
    struct GatedTranscoder {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Transcoder for GatedTranscoder {
        async fn transcode_to_mp3(
            &self,
            _input: &std::path::Path,
            _format: SourceFormat,
        ) -> RosterResult<Vec<u8>> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(b"ID3 gated".to_vec())
        }
    }

    #[tokio::test]
    async fn transcoding_does_not_block_other_writes() {
        let dir = TempDir::new().unwrap();
        let db_config = DbConfig {
            path: dir.path().join("roster.db").to_string_lossy().into_owned(),
            max_connections: 5,
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(db_config.max_connections)
            .connect_with(db_config.connect_options())
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        let config = RuntimeConfiguration::from_parts(
            db_config,
            StorageConfig {
                qr_code_dir: dir.path().join("qrcodes"),
                ffmpeg_path: "ffmpeg".into(),
                max_upload_bytes: 1024 * 1024,
            },
        );
        let transcoder = Arc::new(GatedTranscoder::default());
        let state = RosterState::from_parts(pool, config, transcoder.clone());

        let mut ids = vec![];
        for email in ["first@example.com", "second@example.com"] {
            let fields = StudentFields {
                first_name: Some("Ada".to_string()),
                last_name: Some("Lovelace".to_string()),
                department: Some("Mathematics".to_string()),
                email: Some(email.to_string()),
                audio: None,
            };
            ids.push(
                Student::insert_into_database(fields, &mut *state.get_connection().await.unwrap())
                    .await
                    .unwrap(),
            );
        }
        let (first, second) = (ids[0], ids[1]);

        let data_url = format!(
            "data:audio/webm;base64,{}",
            BASE64_STANDARD.encode(b"webm bytes")
        );
        let mut parts = student_parts("Ada", "first@example.com");
        parts.push(Part::Text("audio_data", &data_url));
        let edit = tokio::spawn(
            router(state.clone()).oneshot(multipart(&format!("/student/{first}/edit"), &parts)),
        );
        transcoder.started.notified().await;

        //well under the busy timeout, so a held lock would show up as a timeout here
        let update = tokio::time::timeout(Duration::from_secs(2), async {
            let mut conn = state.get_connection().await?;
            Student::update_in_database(
                second,
                StudentUpdate {
                    department: Some("Computing".to_string()),
                    ..StudentUpdate::default()
                },
                &mut conn,
            )
            .await
        })
        .await;
        assert!(matches!(update, Ok(Ok(()))));

        transcoder.release.notify_one();
        let response = edit.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let mut conn = state.get_connection().await.unwrap();
        let audio = Student::get(first, &mut conn).await.unwrap().audio.unwrap();
        assert_eq!(audio.filename, format!("{first}_audio.mp3"));
        assert_eq!(audio.bytes, b"ID3 gated");
        assert_eq!(
            Student::get(second, &mut conn).await.unwrap().department,
            "Computing"
        );
    }

    #[tokio::test]
    async fn editing_a_missing_student_skips_transcoding() {
        let app = TestApp::new().await;

        let data_url = format!(
            "data:audio/webm;base64,{}",
            BASE64_STANDARD.encode(b"webm bytes")
        );
        let mut parts = student_parts("Ada", "ada@example.com");
        parts.push(Part::Text("audio_data", &data_url));

        let response = app.send(multipart("/student/42/edit", &parts)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(app.transcoder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn csv_import_skips_bad_rows_and_generates_qr_codes() {
        let app = TestApp::new().await;
        app.add("Grace", "taken@example.com").await;

        let csv = b"first_name,last_name,department,email\n\
            Ada,Lovelace,Mathematics,ada@example.com\n\
            Alan,,Computing,alan@example.com\n\
            Someone,Else,Physics,taken@example.com\n\
            Edsger,Dijkstra,Computing,edsger@example.com\n";

        let response = app
            .send(multipart(
                "/import",
                &[Part::File("students_csv", "students.csv", "text/csv", csv)],
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Added 2 students."));
        assert!(body.contains("Row 3"));
        assert!(body.contains("Row 4"));

        let students = Student::get_all(&app.state).await.unwrap();
        let emails: Vec<_> = students.iter().map(|s| s.email.as_str()).collect();
        assert_eq!(
            emails,
            ["taken@example.com", "ada@example.com", "edsger@example.com"]
        );

        for student in &students[1..] {
            let file = student.qr_code_file.as_deref().unwrap();
            assert!(app.qr_dir.path().join(file).exists());
        }
        assert!(students[0].qr_code_file.is_none());
    }

    #[tokio::test]
    async fn oversized_uploads_are_rejected() {
        let app = TestApp::new().await;
        let big = vec![0u8; 2 * 1024 * 1024];
        let mut parts = student_parts("Ada", "ada@example.com");
        parts.push(Part::File("audio", "big.wav", "audio/wav", &big));

        let response = app.send(multipart("/student/add", &parts)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(app.get(1).await.is_none());
    }
}
