//! In-memory registry client for tests

use crate::image::reference::ImageReference;
use crate::registry::auth::{AuthToken, Credentials};
use crate::registry::{LoginStatus, ProgressMessage, ProgressStream, RegistryClient, RegistryError};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Step at which a scripted failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailAt {
    /// `pull` itself returns an error
    Pull,
    /// `pull` starts but the stream reports an error
    PullStream,
    Tag,
    Push,
    /// `push` starts but the stream reports an error
    PushStream,
}

/// Succeeds for every image unless told otherwise
#[derive(Default)]
pub struct FakeRegistry {
    failures: Vec<(String, FailAt)>,
    panics: HashSet<String>,
    login_rejection: Option<(u16, String)>,
    delay: Option<Duration>,
    slow: Vec<(String, Duration)>,
    login_calls: AtomicUsize,
    pull_calls: AtomicUsize,
    tag_calls: AtomicUsize,
    push_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pushed: Mutex<Vec<(String, String)>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the given source image at `step`
    pub fn fail(mut self, source: &str, step: FailAt) -> Self {
        self.failures.push((source.to_string(), step));
        self
    }

    /// Panic while pulling the given source image
    pub fn panic_on(mut self, source: &str) -> Self {
        self.panics.insert(source.to_string());
        self
    }

    pub fn reject_login(self) -> Self {
        self.reject_login_with(401, "incorrect username or password")
    }

    /// Answer login with an arbitrary status code and message
    pub fn reject_login_with(mut self, code: u16, message: &str) -> Self {
        self.login_rejection = Some((code, message.to_string()));
        self
    }

    /// Hold every pull open for `delay` so transfers overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold the pull of one source image open for `delay`
    pub fn slow(mut self, source: &str, delay: Duration) -> Self {
        self.slow.push((source.to_string(), delay));
        self
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    pub fn tag_calls(&self) -> usize {
        self.tag_calls.load(Ordering::SeqCst)
    }

    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    /// Highest number of pulls that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// `(image, auth token)` for every push that was started
    pub fn pushed(&self) -> Vec<(String, String)> {
        self.pushed.lock().unwrap().clone()
    }

    fn fails(&self, image: &str, step: FailAt) -> bool {
        self.failures
            .iter()
            .any(|(source, at)| *at == step && source == image)
    }

    /// Push failures are scripted by source name; targets are `<user>/<source>`
    fn push_fails(&self, target: &str, step: FailAt) -> bool {
        self.failures.iter().any(|(source, at)| {
            *at == step && target.ends_with(&format!("/{}", source.replace('/', ".")))
        })
    }

    fn progress(fail: bool, what: &str) -> ProgressStream {
        let mut items = vec![
            Ok(ProgressMessage::status(format!("{} started", what))),
            Ok(ProgressMessage::status(format!("{} complete", what))),
        ];
        if fail {
            items[1] = Err(RegistryError::Daemon(format!("{} failed", what)));
        }
        stream::iter(items).boxed()
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn login(&self, credentials: &Credentials) -> Result<LoginStatus, RegistryError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((code, message)) = &self.login_rejection {
            return Err(RegistryError::Status {
                code: *code,
                message: format!("{} ({})", message, credentials.username()),
            });
        }
        Ok(LoginStatus {
            status: "Login Succeeded".to_string(),
            identity_token: None,
        })
    }

    async fn pull(&self, image: &ImageReference) -> Result<ProgressStream, RegistryError> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        let name = image.to_string();

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = self
            .slow
            .iter()
            .find(|(source, _)| *source == name)
            .map(|(_, delay)| *delay)
            .or(self.delay);
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panics.contains(&name) {
            panic!("registry exploded while pulling {}", name);
        }
        if self.fails(&name, FailAt::Pull) {
            return Err(RegistryError::Status {
                code: 404,
                message: format!("manifest for {} not found", name),
            });
        }
        Ok(Self::progress(self.fails(&name, FailAt::PullStream), "pull"))
    }

    async fn tag(
        &self,
        source: &ImageReference,
        _target: &ImageReference,
    ) -> Result<(), RegistryError> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        let name = source.to_string();
        if self.fails(&name, FailAt::Tag) {
            return Err(RegistryError::Status {
                code: 404,
                message: format!("No such image: {}", name),
            });
        }
        Ok(())
    }

    async fn push(
        &self,
        image: &ImageReference,
        auth: &AuthToken,
    ) -> Result<ProgressStream, RegistryError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        let name = image.to_string();
        self.pushed
            .lock()
            .unwrap()
            .push((name.clone(), auth.as_str().to_string()));

        if self.push_fails(&name, FailAt::Push) {
            return Err(RegistryError::Status {
                code: 500,
                message: format!("push of {} refused", name),
            });
        }
        Ok(Self::progress(
            self.push_fails(&name, FailAt::PushStream),
            "push",
        ))
    }
}
