//! Auth configuration and the shared state handed to handlers.

use std::path::PathBuf;

use super::media::MediaStore;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 14 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    media_root: PathBuf,
    session_ttl_seconds: i64,
    session_cookie_secure: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(media_root: PathBuf) -> Self {
        Self {
            media_root,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: false,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn media_root(&self) -> &PathBuf {
        &self.media_root
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }
}

#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
    media: MediaStore,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let media = MediaStore::new(config.media_root().clone());
        Self { config, media }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn media(&self) -> &MediaStore {
        &self.media
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_defaults() {
        let config = AuthConfig::new(PathBuf::from("media"));
        assert_eq!(config.session_ttl_seconds(), 1_209_600);
        assert!(!config.session_cookie_secure());
        assert_eq!(config.media_root(), &PathBuf::from("media"));
    }

    #[test]
    fn auth_config_builders() {
        let config = AuthConfig::new(PathBuf::from("/srv/media"))
            .with_session_ttl_seconds(60)
            .with_session_cookie_secure(true);
        assert_eq!(config.session_ttl_seconds(), 60);
        assert!(config.session_cookie_secure());
    }
}
