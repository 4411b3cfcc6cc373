//! Tipos de erro para o cliente da API OpenAI.
//!
//! Define [`OpenAiError`] com variantes para rate limiting, erros da API,
//! erros de rede e respostas sem conteúdo utilizável.

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com a API da OpenAI.
#[derive(Debug, Error)]
pub enum OpenAiError {
    /// O servidor retornou HTTP 429 (rate limit).
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Erro retornado pela API (ex.: 401 chave inválida, 500 erro interno).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// A resposta não trouxe imagem nem texto.
    #[error("response contained no {0}")]
    EmptyResponse(&'static str),

    /// Base64 inválido no campo `b64_json`.
    #[error("invalid image payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display() {
        let err = OpenAiError::RateLimited {
            retry_after_ms: 5000,
        };
        assert_eq!(err.to_string(), "rate limited, retry after 5000ms");
    }

    #[test]
    fn api_error_display() {
        let err = OpenAiError::ApiError {
            status: 401,
            message: "Invalid API key".into(),
        };
        assert_eq!(err.to_string(), "API error (status 401): Invalid API key");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OpenAiError>();
    }
}
