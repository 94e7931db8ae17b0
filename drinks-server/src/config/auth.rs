use confique::Config;
use url::Url;

/// Configuration for bearer token verification
#[derive(Debug, Config, Clone)]
pub struct AuthConfig {
    /// Expected `iss` claim, e.g. `https://coffee.eu.auth0.com/`
    #[config(env = "DRINKS_AUTH_ISSUER")]
    pub issuer: String,

    /// Expected `aud` claim
    #[config(env = "DRINKS_AUTH_AUDIENCE")]
    pub audience: String,

    /// Signing-key set endpoint (default: `<issuer>.well-known/jwks.json`)
    #[config(env = "DRINKS_AUTH_JWKS_URL")]
    pub jwks_url: Option<String>,

    /// Timeout for key set requests in seconds (default: 5)
    #[config(env = "DRINKS_AUTH_JWKS_TIMEOUT", default = 5)]
    pub jwks_timeout: u64,

    /// How long a fetched key set is reused, in seconds (default: 600, 0 disables caching)
    #[config(env = "DRINKS_AUTH_JWKS_CACHE_TTL", default = 600)]
    pub jwks_cache_ttl: u64,

    /// Minimum seconds between refetches triggered by an unknown key id (default: 30)
    #[config(env = "DRINKS_AUTH_JWKS_REFRESH_INTERVAL", default = 30)]
    pub jwks_refresh_interval: u64,
}

impl AuthConfig {
    /// Returns the URL of the signing-key set
    pub fn jwks_url(&self) -> Result<Url, url::ParseError> {
        if let Some(url) = &self.jwks_url {
            return Url::parse(url);
        }

        let mut base = Url::parse(&self.issuer)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(".well-known/jwks.json")
    }
}
