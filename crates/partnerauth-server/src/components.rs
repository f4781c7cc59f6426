//! Wiring of the server-side components from one configuration.

use std::sync::Arc;

use partnerauth_core::keys::KeyConfigError;
use partnerauth_core::{
    Clock, HmacStringSigner, KeyProvider, KeyProviderRegistry, MessageSigner, PartnerAuthConfig,
    SystemClock,
};
use tracing::info;

use crate::context::RequestContextStore;
use crate::interceptor::{AuthInterceptor, InterceptorConfig};
use crate::request_info::InterceptorRequestInfoProvider;
use crate::verifier::AuthorizationVerifier;

/// Signer, context store, verifier and interceptor settings sharing one key
/// provider and clock.
///
/// Build once at start-up and hand the parts to whoever needs them.
#[derive(Debug, Clone)]
pub struct AuthComponents {
    /// Key lookup backend.
    pub keys: Arc<dyn KeyProvider>,
    /// Message signer used for verifying requests and signing responses.
    pub signer: MessageSigner,
    /// Request context store shared by interceptor and verifier.
    pub store: RequestContextStore,
    /// Verifier for application code.
    pub verifier: Arc<AuthorizationVerifier>,
    /// Interceptor settings.
    pub interceptor_config: InterceptorConfig,
}

impl AuthComponents {
    /// Build the components around `keys` using the system clock.
    pub fn new(keys: Arc<dyn KeyProvider>, config: &PartnerAuthConfig) -> Self {
        Self::with_clock(keys, config, Arc::new(SystemClock))
    }

    /// Build the components around `keys` using `clock`.
    pub fn with_clock(
        keys: Arc<dyn KeyProvider>,
        config: &PartnerAuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let string_signer = Arc::new(HmacStringSigner::new(Arc::clone(&keys)));
        let signer = MessageSigner::with_clock(string_signer, clock);
        let store = RequestContextStore::new();
        let verifier = AuthorizationVerifier::new(
            Arc::new(InterceptorRequestInfoProvider::new(store)),
            signer.clone(),
        )
        .with_validity_window(config.validity_window_secs);

        Self {
            keys,
            signer,
            store,
            verifier: Arc::new(verifier),
            interceptor_config: InterceptorConfig {
                signed_response_headers: config.signed_response_headers.clone(),
            },
        }
    }

    /// Build the key provider named in `config` from `registry`, then the
    /// rest of the components around it.
    ///
    /// # Errors
    ///
    /// Returns the registry's error if the key provider cannot be built.
    pub fn from_config(
        config: &PartnerAuthConfig,
        registry: &KeyProviderRegistry,
    ) -> Result<Self, KeyConfigError> {
        let keys = registry.build(config)?;
        info!(
            key_provider = %config.key_provider,
            validity_window_secs = config.validity_window_secs,
            signed_response_headers = ?config.signed_response_headers,
            "PartnerAuth components initialized"
        );
        Ok(Self::new(keys, config))
    }

    /// An interceptor in front of `handler` using these components.
    pub fn interceptor<H>(&self, handler: H) -> AuthInterceptor<H> {
        AuthInterceptor::new(
            handler,
            self.signer.clone(),
            self.store,
            self.interceptor_config.clone(),
        )
    }
}
