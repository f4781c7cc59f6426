//! Per-request context shared between the interceptor and application code.
//!
//! The interceptor opens a [`RequestContext`] for every request it handles.
//! Application code running on the same task retrieves it through
//! [`RequestContextStore::get`], usually indirectly via the
//! [`AuthorizationVerifier`](crate::verifier::AuthorizationVerifier).
//!
//! The context lives in a tokio task-local slot established by
//! [`RequestContextStore::scope`]. It is not visible to tasks the handler
//! spawns.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use http::{HeaderMap, Method, Uri};
use partnerauth_core::AuthError;
use tracing::warn;

use crate::body::EntityDigestAccumulator;

tokio::task_local! {
    static CURRENT_REQUEST: RefCell<Option<Arc<RequestContext>>>;
}

/// What the interceptor knows about the request being served.
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    digest: Option<Arc<EntityDigestAccumulator>>,
    access_count: AtomicUsize,
}

impl RequestContext {
    /// Create a context. `digest` is `None` for requests that are not being
    /// digested.
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        digest: Option<Arc<EntityDigestAccumulator>>,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            digest,
            access_count: AtomicUsize::new(0),
        }
    }

    /// Request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URI as received.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The request body digest, finalizing it on first access.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Programmer`] if the request body is not being
    /// digested.
    pub fn entity_digest(&self) -> Result<Option<String>, AuthError> {
        let digest = self.digest.as_ref().ok_or_else(|| {
            AuthError::Programmer("entity digest not available for this request".to_owned())
        })?;
        Ok(digest.finalize())
    }

    /// How many times application code retrieved this context.
    #[must_use]
    pub fn access_count(&self) -> usize {
        self.access_count.load(Ordering::Acquire)
    }
}

/// Handle to the task-local request context slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContextStore;

impl RequestContextStore {
    /// Create a store handle.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run `fut` with an empty context slot.
    ///
    /// Every request must be served inside its own scope.
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CURRENT_REQUEST.scope(RefCell::new(None), fut).await
    }

    /// Install `context` as the current request context.
    ///
    /// The returned guard clears the slot when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Programmer`] when called outside
    /// [`scope`](Self::scope).
    pub fn open(&self, context: Arc<RequestContext>) -> Result<RequestContextGuard, AuthError> {
        let replaced = CURRENT_REQUEST
            .try_with(|slot| slot.borrow_mut().replace(Arc::clone(&context)))
            .map_err(|_| {
                AuthError::Programmer("request context opened outside of a request scope".to_owned())
            })?;
        if let Some(previous) = replaced {
            warn!(
                previous = %previous.uri(),
                current = %context.uri(),
                "request context opened while another was still open"
            );
        }
        Ok(RequestContextGuard {
            store: *self,
            context,
        })
    }

    /// The current request context.
    ///
    /// Each successful call counts as one access.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Programmer`] when no context is open, which means
    /// the interceptor is not installed in front of the caller.
    pub fn get(&self) -> Result<Arc<RequestContext>, AuthError> {
        let context = CURRENT_REQUEST
            .try_with(|slot| slot.borrow().clone())
            .ok()
            .flatten()
            .ok_or_else(|| {
                AuthError::Programmer(
                    "no request context available; is the PartnerAuth interceptor installed?"
                        .to_owned(),
                )
            })?;
        context.access_count.fetch_add(1, Ordering::AcqRel);
        Ok(context)
    }

    /// Clear the current request context.
    pub fn close(&self) {
        match CURRENT_REQUEST.try_with(|slot| slot.borrow_mut().take()) {
            Ok(Some(_)) => {}
            Ok(None) => warn!("request context closed but none was open"),
            Err(_) => warn!("request context closed outside of a request scope"),
        }
    }
}

/// Keeps a request context open; closes it on drop.
#[derive(Debug)]
#[must_use = "the request context is closed as soon as the guard is dropped"]
pub struct RequestContextGuard {
    store: RequestContextStore,
    context: Arc<RequestContext>,
}

impl RequestContextGuard {
    /// The context this guard keeps open.
    #[must_use]
    pub fn context(&self) -> &Arc<RequestContext> {
        &self.context
    }
}

impl Drop for RequestContextGuard {
    fn drop(&mut self) {
        self.store.close();
    }
}
