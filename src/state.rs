use crate::config::Settings;
use crate::error::ApiError;
use crate::rate_limit::RateLimiter;
use crate::upstream::UpstreamClient;

// app's shared state, injected into every handler
pub struct AppState {
    pub upstream: UpstreamClient,
    pub rate_limiter: RateLimiter,
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, reqwest::Error> {
        Self::with_rate_limiter(settings, RateLimiter::in_memory())
    }

    pub fn with_rate_limiter(
        settings: Settings,
        rate_limiter: RateLimiter,
    ) -> Result<Self, reqwest::Error> {
        let upstream = UpstreamClient::new(&settings.upstream_url, settings.upstream_timeout)?;
        Ok(Self {
            upstream,
            rate_limiter,
            settings,
        })
    }

    // credential is read per request so a missing key only fails the AI routes
    pub fn api_key(&self) -> Result<&str, ApiError> {
        self.settings
            .api_key
            .as_deref()
            .ok_or(ApiError::ServiceConfiguration)
    }
}
