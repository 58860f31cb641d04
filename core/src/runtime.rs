use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agent::{AgentBackend, RunRequest};
use crate::classifier::{ClassificationOutcome, ResponseClassifier};
use crate::error::{CatalogError, Result};
use crate::product::NormalizedProduct;

pub const GREETING: &str =
    "Hello! Type what you're looking for and I'll search the product catalog for you.";
pub const SEARCHING: &str = "Searching...";
pub const SEARCH_FAILED: &str = "Sorry, an error occurred while searching. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<NormalizedProduct>,
    /// Set while the placeholder waits for the backend.
    pub pending: bool,
}

/// What one search produced, after it has been written to the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchReply {
    pub message_id: u64,
    pub text: String,
    /// `None` when the request never produced a payload to classify.
    pub outcome: Option<ClassificationOutcome>,
}

impl SearchReply {
    pub fn products(&self) -> &[NormalizedProduct] {
        self.outcome.as_ref().map(|o| o.products()).unwrap_or(&[])
    }
}

#[derive(Debug, Default)]
struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    fn replace(&mut self, id: u64, text: String, products: Vec<NormalizedProduct>) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
            message.text = text;
            message.products = products;
            message.pending = false;
        }
    }
}

// The pending agent line of one search. Dropping it unsettled (the search
// future was cancelled mid-request) writes the apology in its place.
struct Placeholder<'a> {
    runtime: &'a SearchRuntime,
    id: u64,
    settled: bool,
}

impl Placeholder<'_> {
    fn settle(mut self, text: String, products: Vec<NormalizedProduct>) {
        self.runtime.transcript_mut().replace(self.id, text, products);
        self.settled = true;
    }
}

impl Drop for Placeholder<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(
            session = %self.runtime.session_id,
            message_id = self.id,
            "search abandoned before the agent replied"
        );
        self.runtime.transcript_mut().replace(self.id, SEARCH_FAILED.to_string(), Vec::new());
    }
}

/// One conversation with the agent backend.
pub struct SearchRuntime {
    backend: Arc<dyn AgentBackend>,
    classifier: Arc<ResponseClassifier>,
    user_id: String,
    session_id: String,
    // Held across the backend call so requests on this session never overlap.
    in_flight: Mutex<()>,
    // Never held across an await, so snapshots do not wait on the backend.
    transcript: RwLock<Transcript>,
    next_id: AtomicU64,
}

impl SearchRuntime {
    pub fn new(
        backend: Arc<dyn AgentBackend>,
        classifier: Arc<ResponseClassifier>,
        user_id: impl Into<String>,
    ) -> Self {
        let mut runtime = Self {
            backend,
            classifier,
            user_id: user_id.into(),
            session_id: Uuid::new_v4().to_string(),
            in_flight: Mutex::new(()),
            transcript: RwLock::new(Transcript::default()),
            next_id: AtomicU64::new(1),
        };
        let greeting = runtime.message(Role::Agent, GREETING.to_string(), false);
        runtime
            .transcript
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .push(greeting);
        runtime
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Creates the backend session. A failure is logged and otherwise
    /// ignored; searches are still attempted afterwards.
    pub async fn bootstrap(&self) -> bool {
        match self.backend.create_session(&self.user_id, &self.session_id).await {
            Ok(()) => {
                info!(session = %self.session_id, user = %self.user_id, "agent session created");
                true
            }
            Err(e) => {
                warn!(session = %self.session_id, error = %e, "agent session bootstrap failed");
                false
            }
        }
    }

    pub async fn search(&self, query: &str) -> Result<SearchReply> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CatalogError::EmptyQuery);
        }

        let placeholder = {
            let mut transcript = self.transcript_mut();
            let user = self.message(Role::User, query.to_string(), false);
            transcript.messages.push(user);
            let pending = self.message(Role::Agent, SEARCHING.to_string(), true);
            let id = pending.id;
            transcript.messages.push(pending);
            Placeholder { runtime: self, id, settled: false }
        };

        let request = RunRequest::user_query(
            self.backend.app_name(),
            self.user_id.as_str(),
            self.session_id.as_str(),
            query,
        );

        let result = {
            let _turn = self.in_flight.lock().await;
            self.backend.run(&request).await
        };

        let (text, outcome) = match result {
            Ok(payload) => {
                let outcome = self.classifier.classify(&payload);
                info!(
                    session = %self.session_id,
                    outcome = outcome.kind(),
                    products = outcome.products().len(),
                    "search classified"
                );
                (outcome.display_text(), Some(outcome))
            }
            Err(e) => {
                error!(session = %self.session_id, error = %e, "agent search failed");
                (SEARCH_FAILED.to_string(), None)
            }
        };

        let message_id = placeholder.id;
        let products = outcome.as_ref().map(|o| o.products().to_vec()).unwrap_or_default();
        placeholder.settle(text.clone(), products);

        Ok(SearchReply { message_id, text, outcome })
    }

    /// Snapshot of the conversation so far, pending placeholders included.
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.read().unwrap_or_else(PoisonError::into_inner).messages.clone()
    }

    fn transcript_mut(&self) -> RwLockWriteGuard<'_, Transcript> {
        self.transcript.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn message(&self, role: Role, text: String, pending: bool) -> ChatMessage {
        ChatMessage {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            role,
            text,
            products: Vec::new(),
            pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::NoResultsReason;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;
    use std::time::{Duration, Instant};

    struct ScriptedBackend {
        session_ok: bool,
        replies: StdMutex<Vec<Result<Value>>>,
        requests: StdMutex<Vec<RunRequest>>,
    }

    impl ScriptedBackend {
        fn new(session_ok: bool, replies: Vec<Result<Value>>) -> Arc<Self> {
            Arc::new(Self {
                session_ok,
                replies: StdMutex::new(replies),
                requests: StdMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AgentBackend for ScriptedBackend {
        fn app_name(&self) -> &str {
            "catalog_agent"
        }

        async fn create_session(&self, _user_id: &str, _session_id: &str) -> Result<()> {
            if self.session_ok {
                Ok(())
            } else {
                Err(CatalogError::Status { status: 500, body: "down".to_string() })
            }
        }

        async fn run(&self, request: &RunRequest) -> Result<Value> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies.lock().unwrap().remove(0)
        }
    }

    // Sleeps on every run and records how many runs overlapped.
    struct SlowBackend {
        delay: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl SlowBackend {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self { delay, active: AtomicUsize::new(0), max_active: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl AgentBackend for SlowBackend {
        fn app_name(&self) -> &str {
            "catalog_agent"
        }

        async fn create_session(&self, _user_id: &str, _session_id: &str) -> Result<()> {
            Ok(())
        }

        async fn run(&self, _request: &RunRequest) -> Result<Value> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(json!([]))
        }
    }

    fn runtime(backend: Arc<dyn AgentBackend>) -> SearchRuntime {
        SearchRuntime::new(backend, Arc::new(ResponseClassifier::default()), "user")
    }

    fn hoodies() -> Value {
        let item = json!({
            "id": "GGOEGAEB164817",
            "title": "Black Eco Zip Hoodie",
            "price": "35.0 USD",
            "availability": 2
        });
        let result = json!({"items": [item]})
        .to_string();
        json!([{"content": {"parts": [
            {"functionCall": {"name": "call_catalog_search", "args": {"query": "hoodie"}}},
            {"functionResponse": {"name": "call_catalog_search", "response": {"result": result}}}
        ]}}])
    }

    #[tokio::test]
    async fn search_replaces_placeholder_with_outcome() {
        let backend = ScriptedBackend::new(true, vec![Ok(hoodies())]);
        let runtime = runtime(backend.clone());

        let reply = runtime.search("  hoodie ").await.unwrap();
        assert_eq!(reply.text, "Found 1 product. All are in stock.");
        assert_eq!(reply.products().len(), 1);

        let transcript = runtime.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[0].text, GREETING);
        assert_eq!(transcript[1].role, Role::User);
        assert_eq!(transcript[1].text, "hoodie");
        assert_eq!(transcript[2].id, reply.message_id);
        assert!(!transcript[2].pending);
        assert_eq!(transcript[2].products[0].stock, "In stock (2)");

        let sent = backend.requests.lock().unwrap();
        assert_eq!(sent[0].session_id, runtime.session_id());
        assert_eq!(sent[0].new_message.parts[0].text, "hoodie");
        assert!(!sent[0].streaming);
    }

    #[tokio::test]
    async fn transport_failure_yields_apology() {
        let backend = ScriptedBackend::new(
            true,
            vec![Err(CatalogError::Status { status: 502, body: String::new() })],
        );
        let runtime = runtime(backend);

        let reply = runtime.search("mug").await.unwrap();
        assert_eq!(reply.text, SEARCH_FAILED);
        assert!(reply.outcome.is_none());

        let transcript = runtime.transcript();
        assert_eq!(transcript.last().unwrap().text, SEARCH_FAILED);
        assert!(transcript.iter().all(|m| !m.pending));
    }

    #[tokio::test]
    async fn failed_bootstrap_does_not_block_search() {
        let backend = ScriptedBackend::new(false, vec![Ok(json!([]))]);
        let runtime = runtime(backend);

        assert!(!runtime.bootstrap().await);
        let reply = runtime.search("stickers").await.unwrap();
        assert_eq!(
            reply.outcome,
            Some(ClassificationOutcome::NoResults { reason: NoResultsReason::NoFunctionResponse })
        );
    }

    #[tokio::test]
    async fn empty_query_is_rejected_without_transcript_change() {
        let backend = ScriptedBackend::new(true, Vec::new());
        let runtime = runtime(backend);

        assert!(matches!(runtime.search("   ").await, Err(CatalogError::EmptyQuery)));
        assert_eq!(runtime.transcript().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_search_settles_its_placeholder() {
        let runtime = runtime(SlowBackend::new(Duration::from_millis(200)));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), runtime.search("hoodie")).await;
        assert!(cancelled.is_err());

        let transcript = runtime.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[2].text, SEARCH_FAILED);
        assert!(transcript.iter().all(|m| !m.pending));

        // The session lock was released with the cancelled future.
        let reply = runtime.search("mug").await.unwrap();
        assert_eq!(
            reply.outcome,
            Some(ClassificationOutcome::NoResults { reason: NoResultsReason::NoFunctionResponse })
        );
        assert_eq!(runtime.transcript().len(), 5);
    }

    #[tokio::test]
    async fn runs_on_one_session_never_overlap() {
        let backend = SlowBackend::new(Duration::from_millis(50));
        let runtime = runtime(backend.clone());

        let observe = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let started = Instant::now();
            let snapshot = runtime.transcript();
            (snapshot, started.elapsed())
        };
        let (first, second, (snapshot, waited)) =
            tokio::join!(runtime.search("mug"), runtime.search("stickers"), observe);

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(backend.max_active.load(Ordering::SeqCst), 1);

        // One run is in the backend and the other is parked on the session.
        assert!(waited < Duration::from_millis(50));
        assert_eq!(snapshot.len(), 5);
        assert_eq!(snapshot.iter().filter(|m| m.pending).count(), 2);
        assert!(runtime.transcript().iter().all(|m| !m.pending));
    }
}
