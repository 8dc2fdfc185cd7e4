//! HTTP backend client
//!
//! Auth, quiz CRUD and PDF-to-quiz generation. The backend authenticates with
//! a raw `token` header rather than a bearer scheme.

use crate::session::AuthSession;
use crate::types::{Question, Quiz, QuizId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

pub const MIN_PASSWORD_LEN: usize = 6;
const DEFAULT_DESCRIPTION: &str = "Creado/Editado en CYRAQuiz";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Validation(String),

    #[error("Session expired or invalid, log in again")]
    NotAuthenticated,

    #[error("Quiz generation failed: {0}")]
    Generation(String),

    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),
}

/// Operations the host dashboard and editor need from the backend
#[async_trait]
pub trait QuizBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> ApiResult<AuthSession>;

    async fn register(&self, email: &str, password: &str, confirm: &str) -> ApiResult<()>;

    async fn list_quizzes(&self, token: &str) -> ApiResult<Vec<Quiz>>;

    /// Create or update. A draft quiz is created and its id replaced in place.
    async fn save_quiz(&self, token: &str, quiz: &mut Quiz) -> ApiResult<()>;

    async fn delete_quiz(&self, token: &str, id: i64) -> ApiResult<()>;

    /// Upload a PDF and get back a draft quiz with generated questions
    async fn generate_from_pdf(&self, path: &Path) -> ApiResult<Quiz>;
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: LoginUser,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    email: String,
}

#[derive(Debug, Serialize)]
struct QuizBody<'a> {
    title: &'a str,
    questions: &'a [Question],
    description: &'a str,
}

impl<'a> QuizBody<'a> {
    fn from_quiz(quiz: &'a Quiz) -> Self {
        let description = if quiz.description.is_empty() {
            DEFAULT_DESCRIPTION
        } else {
            quiz.description.as_str()
        };
        Self {
            title: &quiz.title,
            questions: &quiz.questions,
            description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SavedQuiz {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    questions: Vec<Question>,
    #[serde(default)]
    error: Option<String>,
}

/// Check the register form before bothering the server
pub fn validate_registration(email: &str, password: &str, confirm: &str) -> ApiResult<()> {
    if email.trim().is_empty() {
        return Err(ApiError::Validation("El correo es obligatorio".to_string()));
    }
    if password != confirm {
        return Err(ApiError::Validation(
            "Las contraseñas no coinciden".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "La contraseña debe tener al menos {} caracteres",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Pull a human message out of an error body (`{"error": ..}` or `{"message": ..}`)
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// reqwest implementation of [`QuizBackend`]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn non-2xx responses into [`ApiError::Status`]
    async fn check(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status.as_u16(), &body))
    }
}

fn status_error(status: u16, body: &str) -> ApiError {
    match status {
        401 | 403 => ApiError::NotAuthenticated,
        _ => ApiError::Status {
            status,
            message: error_message(body),
        },
    }
}

#[async_trait]
impl QuizBackend for ApiClient {
    async fn login(&self, email: &str, password: &str) -> ApiResult<AuthSession> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&Credentials { email, password })
            .send()
            .await?;
        let response = Self::check(response).await.map_err(|e| match e {
            ApiError::NotAuthenticated => {
                ApiError::Validation("Correo o contraseña incorrectos".to_string())
            }
            other => other,
        })?;
        let login: LoginResponse = response.json().await?;

        tracing::info!("Logged in as {}", login.user.email);
        Ok(AuthSession {
            token: login.token,
            email: login.user.email,
        })
    }

    async fn register(&self, email: &str, password: &str, confirm: &str) -> ApiResult<()> {
        validate_registration(email, password, confirm)?;
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&Credentials {
                email: email.trim(),
                password,
            })
            .send()
            .await?;
        Self::check(response).await?;
        tracing::info!("Registered {}", email.trim());
        Ok(())
    }

    async fn list_quizzes(&self, token: &str) -> ApiResult<Vec<Quiz>> {
        let response = self
            .client
            .get(self.url("/quizzes"))
            .header("token", token)
            .send()
            .await?;
        let quizzes: Vec<Quiz> = Self::check(response).await?.json().await?;
        tracing::debug!("Fetched {} quizzes", quizzes.len());
        Ok(quizzes)
    }

    async fn save_quiz(&self, token: &str, quiz: &mut Quiz) -> ApiResult<()> {
        let body = QuizBody::from_quiz(quiz);
        let request = match &quiz.id {
            QuizId::Saved(id) => self.client.put(self.url(&format!("/quizzes/{}", id))),
            QuizId::Draft(_) => self.client.post(self.url("/quizzes")),
        };

        let response = request.header("token", token).json(&body).send().await?;
        let saved: SavedQuiz = Self::check(response).await?.json().await?;

        if quiz.id.is_draft() {
            tracing::info!("Quiz created, replacing draft id {} with {}", quiz.id, saved.id);
            quiz.id = QuizId::Saved(saved.id);
        }
        Ok(())
    }

    async fn delete_quiz(&self, token: &str, id: i64) -> ApiResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/quizzes/{}", id)))
            .header("token", token)
            .send()
            .await?;
        Self::check(response).await?;
        tracing::info!("Deleted quiz {}", id);
        Ok(())
    }

    async fn generate_from_pdf(&self, path: &Path) -> ApiResult<Quiz> {
        let (file_name, title) = pdf_names(path)?;
        let bytes = tokio::fs::read(path).await?;
        tracing::info!("Uploading {} ({} bytes) for generation", file_name, bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("pdfFile", part);

        let response = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await?;
        let upload: UploadResponse = Self::check(response).await?.json().await?;
        quiz_from_upload(title, upload)
    }
}

/// File name to upload and quiz title derived from a PDF path
fn pdf_names(path: &Path) -> ApiResult<(String, String)> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(ApiError::Validation(
            "Por favor sube un archivo PDF válido.".to_string(),
        ));
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("quiz.pdf")
        .to_string();
    let title = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("Quiz")
        .to_string();
    Ok((file_name, title))
}

fn quiz_from_upload(title: String, upload: UploadResponse) -> ApiResult<Quiz> {
    if !upload.success {
        return Err(ApiError::Generation(
            upload
                .error
                .unwrap_or_else(|| "Fallo en el servidor".to_string()),
        ));
    }
    let mut quiz = Quiz::new(title);
    quiz.questions = upload.questions;
    tracing::info!(
        "Generated draft quiz '{}' with {} questions",
        quiz.title,
        quiz.questions.len()
    );
    Ok(quiz)
}
