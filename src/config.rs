use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    /// Absent when GEMINI_API_KEY is not set; scans then run on pattern rules.
    pub gemini: Option<GeminiConfig>,
    pub gmail_api_base: String,
    pub usd_krw_rate: f64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let session = SessionConfig {
            secret: std::env::var("SESSION_JWT_SECRET")?,
            issuer: std::env::var("SESSION_JWT_ISSUER").unwrap_or_else(|_| "subtrack".into()),
            audience: std::env::var("SESSION_JWT_AUDIENCE")
                .unwrap_or_else(|_| "subtrack-users".into()),
        };
        let gemini = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(|api_key| GeminiConfig {
                api_key,
                model: std::env::var("GEMINI_MODEL")
                    .unwrap_or_else(|_| "gemini-2.0-flash".into()),
            });
        let gmail_api_base = std::env::var("GMAIL_API_BASE")
            .unwrap_or_else(|_| "https://gmail.googleapis.com/gmail/v1".into());
        let usd_krw_rate = std::env::var("USD_KRW_RATE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(1400.0);
        Ok(Self {
            database_url,
            session,
            gemini,
            gmail_api_base,
            usd_krw_rate,
        })
    }
}
