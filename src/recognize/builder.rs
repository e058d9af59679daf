//! Session builder and connection preparer.
//!
//! [`SpeechToText`] holds everything that outlives a single session: the
//! service endpoint, the credential provider, and caller-supplied default
//! headers. From those plus a [`RecognitionOptions`] it produces the fully
//! prepared connection request: base URL + `model`/`customization_id` query
//! parameters, bearer-token header, and a merged User-Agent.

use std::sync::Arc;

use http::header::{AUTHORIZATION, USER_AGENT};
use http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use url::form_urlencoded;

use crate::auth::{CredentialProvider, NoAuth};
use crate::error::RecognizeError;
use crate::recognize::config::RecognitionOptions;

/// Library identifier sent as the default User-Agent.
pub const LIBRARY_USER_AGENT: &str = concat!("watson-stream/", env!("CARGO_PKG_VERSION"));

/// Entry point for starting streaming recognition sessions.
///
/// Construct one per service endpoint and reuse it; each call to
/// [`start_session`](SpeechToText::start_session) opens an independent
/// connection. A single session is not designed for concurrent recognitions.
pub struct SpeechToText {
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    default_headers: Vec<(String, String)>,
}

impl SpeechToText {
    /// Create a builder for the given WebSocket endpoint, e.g.
    /// `wss://api.us-south.speech-to-text.watson.cloud.ibm.com/v1/recognize`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: Arc::new(NoAuth),
            default_headers: Vec::new(),
        }
    }

    /// Use the given credential provider for the Authorization header.
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Attach a default header to every connection request.
    ///
    /// A `User-Agent` supplied here is not sent verbatim: it is appended
    /// after the library's own identifier, space-separated.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Build the connection URL: base + `model` (if set) +
    /// `customization_id` (if set and non-empty).
    pub(crate) fn build_url(&self, options: &RecognitionOptions) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        let mut any = false;
        if let Some(model) = &options.model {
            query.append_pair("model", model);
            any = true;
        }
        if let Some(id) = &options.customization_id {
            if !id.is_empty() {
                query.append_pair("customization_id", id);
                any = true;
            }
        }
        if any {
            format!("{}?{}", self.base_url, query.finish())
        } else {
            self.base_url.clone()
        }
    }

    /// Prepare the full connection request: URL, auth token, merged
    /// User-Agent, and pass-through headers.
    pub(crate) async fn build_request(
        &self,
        options: &RecognitionOptions,
    ) -> Result<http::Request<()>, RecognizeError> {
        let url = self.build_url(options);
        let mut request = url
            .into_client_request()
            .map_err(|e| RecognizeError::Configuration(format!("invalid endpoint URL: {e}")))?;

        let mut user_agent = LIBRARY_USER_AGENT.to_string();
        for (name, value) in &self.default_headers {
            if name.eq_ignore_ascii_case("user-agent") {
                user_agent.push(' ');
                user_agent.push_str(value);
                continue;
            }
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RecognizeError::Configuration(format!("invalid header name: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| RecognizeError::Configuration(format!("invalid header value: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        request.headers_mut().insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent)
                .map_err(|e| RecognizeError::Configuration(format!("invalid User-Agent: {e}")))?,
        );

        if let Some(token) = self.credentials.bearer_token().await? {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| RecognizeError::Configuration(format!("invalid bearer token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        Ok(request)
    }
}
