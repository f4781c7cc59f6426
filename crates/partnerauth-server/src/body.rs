//! Request and response body types.
//!
//! [`RequestBody`] wraps the inbound body and feeds every data frame into an
//! [`EntityDigestAccumulator`] as the application polls it. The accumulator
//! is shared with the request context, which finalizes it the first time the
//! application asks for the request's authorization info.
//!
//! [`ResponseBody`] is the type-erased body handlers answer with.

use std::convert::Infallible;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use parking_lot::Mutex;
use pin_project_lite::pin_project;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Type-erased response body used by handlers and the interceptor.
pub type ResponseBody = BoxBody<Bytes, io::Error>;

/// Create a [`ResponseBody`] from bytes.
pub fn full_body(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never: Infallible| match never {})
        .boxed()
}

/// Create an empty [`ResponseBody`].
#[must_use]
pub fn empty_body() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never: Infallible| match never {})
        .boxed()
}

enum DigestState {
    NotYetRead,
    Pending { hasher: Sha256, len: u64 },
    Finalized(Option<String>),
}

/// Incremental SHA-256 of a request body.
///
/// Bytes are fed in with [`update`](Self::update) as the body streams. The
/// first call to [`finalize`](Self::finalize) fixes the digest; later calls
/// return the cached value. Bytes arriving after finalization are not part of
/// the digest and are logged.
pub struct EntityDigestAccumulator {
    state: Mutex<DigestState>,
}

impl EntityDigestAccumulator {
    /// Create an accumulator that has seen no bytes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DigestState::NotYetRead),
        }
    }

    /// Feed body bytes.
    pub fn update(&self, data: &[u8]) {
        let mut state = self.state.lock();
        if matches!(*state, DigestState::NotYetRead) {
            *state = DigestState::Pending {
                hasher: Sha256::new(),
                len: 0,
            };
        }
        match &mut *state {
            DigestState::NotYetRead => {}
            DigestState::Pending { hasher, len } => {
                hasher.update(data);
                *len += data.len() as u64;
            }
            DigestState::Finalized(_) => {
                if !data.is_empty() {
                    warn!(
                        bytes = data.len(),
                        "request body read after its digest was taken; these bytes are not covered by the signature"
                    );
                }
            }
        }
    }

    /// The lowercase hex SHA-256 of everything fed so far, or `None` if that
    /// was nothing.
    ///
    /// Idempotent: the first call fixes the result.
    pub fn finalize(&self) -> Option<String> {
        let mut state = self.state.lock();
        let digest = match std::mem::replace(&mut *state, DigestState::Finalized(None)) {
            DigestState::NotYetRead | DigestState::Pending { len: 0, .. } => None,
            DigestState::Pending { hasher, .. } => Some(hex::encode(hasher.finalize())),
            DigestState::Finalized(digest) => digest,
        };
        *state = DigestState::Finalized(digest.clone());
        digest
    }

    /// Whether [`finalize`](Self::finalize) has been called.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        matches!(*self.state.lock(), DigestState::Finalized(_))
    }
}

impl Default for EntityDigestAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityDigestAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.lock() {
            DigestState::NotYetRead => "NotYetRead".to_owned(),
            DigestState::Pending { len, .. } => format!("Pending({len} bytes)"),
            DigestState::Finalized(digest) => format!("Finalized({digest:?})"),
        };
        f.debug_struct("EntityDigestAccumulator")
            .field("state", &state)
            .finish()
    }
}

pin_project! {
    /// Inbound request body handed to the application.
    ///
    /// When the request carries an `Authorization` header every data frame is
    /// also fed to the shared [`EntityDigestAccumulator`]. Otherwise frames
    /// pass through untouched.
    #[derive(Debug)]
    pub struct RequestBody<B> {
        #[pin]
        inner: B,
        digest: Option<Arc<EntityDigestAccumulator>>,
    }
}

impl<B> RequestBody<B> {
    /// Wrap `inner`, digesting it into `digest`.
    pub fn digesting(inner: B, digest: Arc<EntityDigestAccumulator>) -> Self {
        Self {
            inner,
            digest: Some(digest),
        }
    }

    /// Wrap `inner` without digesting.
    pub fn passthrough(inner: B) -> Self {
        Self {
            inner,
            digest: None,
        }
    }

    /// Whether frames are being digested.
    #[must_use]
    pub fn is_digesting(&self) -> bool {
        self.digest.is_some()
    }
}

impl<B> Body for RequestBody<B>
where
    B: Body<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let polled = this.inner.poll_frame(cx);
        if let (Some(digest), Poll::Ready(Some(Ok(frame)))) = (this.digest.as_ref(), &polled) {
            if let Some(data) = frame.data_ref() {
                digest.update(data);
            }
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
