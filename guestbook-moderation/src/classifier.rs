use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use guestbook_utils::parse::parse_duration;

/// Any label scoring above this rejects the submission.
pub const TOXICITY_THRESHOLD: f32 = 0.85;
pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

#[derive(Serialize)]
struct ClassifierRequest<'a> {
    inputs: &'a str,
}

// Text-classification endpoints answer either `[{..}]` or, batched, `[[{..}]]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ClassifierResponse {
    Flat(Vec<LabelScore>),
    Nested(Vec<Vec<LabelScore>>),
}

impl ClassifierResponse {
    fn into_scores(self) -> Vec<LabelScore> {
        match self {
            Self::Flat(scores) => scores,
            Self::Nested(batches) => batches.into_iter().flatten().collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("classifier returned HTTP {0}")]
    Status(u16),
    #[error("classifier response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("classifier returned no scores")]
    Empty,
    #[error("classifier returned a non-finite score for `{0}`")]
    InvalidScore(String),
}

/// Remote toxicity classifier (Hugging Face inference compatible).
#[derive(Clone, Debug)]
pub struct ClassifierClient {
    http: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
}

impl ClassifierClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build classifier http client: {e}"))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_token,
        })
    }

    /// Build a client from `CLASSIFIER_*` variables. Returns `None` when no
    /// endpoint is configured, which disables the remote stage.
    pub fn from_env_optional() -> anyhow::Result<Option<Self>> {
        let Some(endpoint) = env::var("CLASSIFIER_URL")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
        else {
            return Ok(None);
        };

        let api_token = env::var("CLASSIFIER_API_TOKEN")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let timeout = env::var("CLASSIFIER_TIMEOUT")
            .ok()
            .and_then(|value| parse_duration(&value))
            .unwrap_or(DEFAULT_CLASSIFIER_TIMEOUT);

        Ok(Some(Self::new(endpoint, api_token, timeout)?))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        let mut request = self.http.post(&self.endpoint).json(&ClassifierRequest { inputs: text });
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ClassifierError::Request)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let body: ClassifierResponse = response.json().await.map_err(ClassifierError::Decode)?;
        let scores = body.into_scores();
        if scores.is_empty() {
            return Err(ClassifierError::Empty);
        }

        Ok(scores)
    }
}

/// Highest-scoring label above [`TOXICITY_THRESHOLD`], if any.
pub fn flagged_label(scores: &[LabelScore]) -> Result<Option<&LabelScore>, ClassifierError> {
    if let Some(bad) = scores.iter().find(|item| !item.score.is_finite()) {
        return Err(ClassifierError::InvalidScore(bad.label.clone()));
    }

    Ok(scores
        .iter()
        .filter(|item| item.score > TOXICITY_THRESHOLD)
        .max_by(|a, b| a.score.total_cmp(&b.score)))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    use super::{ClassifierClient, ClassifierError, LabelScore, flagged_label};

    /// What the fake classifier answers with.
    #[derive(Clone)]
    pub(crate) enum FakeReply {
        Scores(Value),
        Status(StatusCode),
        Slow(Duration),
    }

    #[derive(Clone)]
    struct FakeState {
        reply: FakeReply,
        seen: Arc<Mutex<Vec<Value>>>,
    }

    async fn fake_classify(
        State(state): State<FakeState>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        state.seen.lock().unwrap().push(body);
        match state.reply {
            FakeReply::Scores(scores) => (StatusCode::OK, Json(scores)),
            FakeReply::Status(status) => (status, Json(json!({"error": "down"}))),
            FakeReply::Slow(delay) => {
                tokio::time::sleep(delay).await;
                (StatusCode::OK, Json(json!([])))
            }
        }
    }

    /// Spawn a fake classifier; returns its URL and the request bodies it received.
    pub(crate) async fn spawn_fake(reply: FakeReply) -> (String, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/classify", post(fake_classify))
            .with_state(FakeState {
                reply,
                seen: seen.clone(),
            });

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/classify"), seen)
    }

    fn client(url: String, timeout: Duration) -> ClassifierClient {
        ClassifierClient::new(url, None, timeout).unwrap()
    }

    #[test]
    fn picks_highest_flagged_label() {
        let scores = vec![
            LabelScore { label: "toxic".into(), score: 0.91 },
            LabelScore { label: "insult".into(), score: 0.97 },
            LabelScore { label: "threat".into(), score: 0.10 },
        ];
        assert_eq!(flagged_label(&scores).unwrap().unwrap().label, "insult");
    }

    #[test]
    fn threshold_is_exclusive() {
        let scores = vec![LabelScore { label: "toxic".into(), score: 0.85 }];
        assert!(flagged_label(&scores).unwrap().is_none());
    }

    #[test]
    fn nan_scores_are_errors() {
        let scores = vec![LabelScore { label: "toxic".into(), score: f32::NAN }];
        assert!(matches!(flagged_label(&scores), Err(ClassifierError::InvalidScore(_))));
    }

    #[tokio::test]
    async fn sends_inputs_and_reads_flat_scores() {
        let (url, seen) =
            spawn_fake(FakeReply::Scores(json!([{"label": "toxic", "score": 0.2}]))).await;

        let scores = client(url, Duration::from_secs(5))
            .classify("Alice: Hello there!")
            .await
            .unwrap();

        assert_eq!(scores.len(), 1);
        assert_eq!(seen.lock().unwrap()[0], json!({"inputs": "Alice: Hello there!"}));
    }

    #[tokio::test]
    async fn reads_nested_scores() {
        let (url, _) = spawn_fake(FakeReply::Scores(json!([[
            {"label": "toxic", "score": 0.95},
            {"label": "insult", "score": 0.4}
        ]])))
        .await;

        let scores = client(url, Duration::from_secs(5)).classify("x: y").await.unwrap();
        assert_eq!(scores.len(), 2);
    }

    #[tokio::test]
    async fn http_errors_and_empty_bodies_fail() {
        let (url, _) = spawn_fake(FakeReply::Status(StatusCode::SERVICE_UNAVAILABLE)).await;
        assert!(matches!(
            client(url, Duration::from_secs(5)).classify("x: y").await,
            Err(ClassifierError::Status(503))
        ));

        let (url, _) = spawn_fake(FakeReply::Scores(json!([]))).await;
        assert!(matches!(
            client(url, Duration::from_secs(5)).classify("x: y").await,
            Err(ClassifierError::Empty)
        ));

        let (url, _) = spawn_fake(FakeReply::Scores(json!({"unexpected": true}))).await;
        assert!(matches!(
            client(url, Duration::from_secs(5)).classify("x: y").await,
            Err(ClassifierError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn slow_classifier_times_out() {
        let (url, _) = spawn_fake(FakeReply::Slow(Duration::from_secs(3))).await;
        assert!(matches!(
            client(url, Duration::from_millis(200)).classify("x: y").await,
            Err(ClassifierError::Request(_))
        ));
    }
}
