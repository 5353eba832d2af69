use fw_core::error::AppError;

/// Base URL (and optional credential) of a hosted HTTP service.
#[derive(Clone)]
pub struct ServiceEndpoint {
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for ServiceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEndpoint")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ServiceEndpoint {
    /// Accepts `http(s)://host[:port][/path]`. A trailing slash is trimmed;
    /// credentials in the authority, queries and fragments are rejected.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        let invalid = |why: &str| {
            AppError::new("CONFIG_ENDPOINT_INVALID", "Service base URL is invalid")
                .with_details(format!("base_url={base_url}; {why}"))
        };

        let rest = base_url
            .strip_prefix("https://")
            .or_else(|| base_url.strip_prefix("http://"))
            .ok_or_else(|| invalid("scheme must be http or https"))?;
        if rest.contains('?') || rest.contains('#') {
            return Err(invalid("query and fragment are not allowed"));
        }

        let authority = rest.split('/').next().unwrap_or_default();
        if authority.contains('@') {
            return Err(invalid("credentials in URL are not allowed"));
        }
        let split = if authority.starts_with('[') {
            authority.split_once("]:")
        } else {
            authority.rsplit_once(':')
        };
        let (host, port) = match split {
            Some((h, p)) => (h, Some(p)),
            None => (authority, None),
        };
        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        if let Some(p) = port {
            match p.parse::<u16>() {
                Ok(n) if n > 0 => {}
                _ => return Err(invalid("port must be 1-65535")),
            }
        }

        Ok(Self {
            base_url,
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: &str) -> Result<Self, AppError> {
        let key = api_key.trim();
        if key.is_empty() {
            return Err(AppError::new("CONFIG_API_KEY_MISSING", "API key must not be empty")
                .with_details(format!("base_url={}", self.base_url)));
        }
        self.api_key = Some(key.to_string());
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Attach `Authorization: Bearer <key>` when a key is configured.
    pub(crate) fn bearer(&self, req: ureq::Request) -> ureq::Request {
        match &self.api_key {
            Some(key) => req.set("Authorization", &format!("Bearer {key}")),
            None => req,
        }
    }
}

/// Map a ureq failure to an `AppError` under `code`.
///
/// Status failures keep the (truncated) response body for diagnosis;
/// transport failures and 429/5xx are retryable.
pub(crate) fn upstream_error(code: &str, message: &str, url: &str, err: ureq::Error) -> AppError {
    match err {
        ureq::Error::Status(status, resp) => {
            let body = resp.into_string().unwrap_or_default();
            let body = fw_core::normalize::text::truncate_on_char_boundary(&body, 512);
            AppError::new(code, message)
                .with_details(format!("url={url}; status={status}; body={body}"))
                .with_retryable(status == 429 || status >= 500)
        }
        other => AppError::new(code, message)
            .with_details(format!("url={url}; err={other}"))
            .with_retryable(true),
    }
}
