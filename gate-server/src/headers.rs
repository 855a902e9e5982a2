use crate::engine::CacheMode;
use axum::http::HeaderValue;

/// Cache-Control directives sent by a client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCacheControl {
    pub no_cache: bool,
    pub no_store: bool,
    pub max_age: Option<u32>,
}

impl ClientCacheControl {
    /// Parse cache control header from request
    pub fn from_header_value(value: Option<&HeaderValue>) -> Self {
        let mut control = Self::default();

        if let Some(value) = value.and_then(|v| v.to_str().ok()) {
            for directive in value.split(',').map(str::trim) {
                match directive.to_ascii_lowercase().as_str() {
                    "no-cache" => control.no_cache = true,
                    "no-store" => control.no_store = true,
                    d => {
                        if let Some(age) = d.strip_prefix("max-age=") {
                            if let Ok(age) = age.parse::<u32>() {
                                control.max_age = Some(age);
                            }
                        }
                        // Ignore unknown directives
                    }
                }
            }
        }

        control
    }

    /// How the engine may use the permission cache for this request.
    /// `max-age=0` is treated like `no-cache`.
    pub fn cache_mode(&self) -> CacheMode {
        if self.no_store {
            CacheMode::Bypass
        } else if self.no_cache || self.max_age == Some(0) {
            CacheMode::Refresh
        } else {
            CacheMode::Use
        }
    }
}
