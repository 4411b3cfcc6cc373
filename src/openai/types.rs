//! Tipos de dados para os endpoints de imagens e chat da API OpenAI.
//!
//! Apenas os campos usados pelos funcionários são modelados; o restante da
//! resposta é ignorado na desserialização.

use serde::{Deserialize, Serialize};

/// Corpo da requisição para `/images/generations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub n: u32,
    pub size: String,
}

/// Resposta de `/images/generations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    pub data: Vec<ImageData>,
}

/// Uma imagem gerada, codificada em base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub b64_json: Option<String>,
}

/// Corpo da requisição para `/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Papel do remetente: "user" ou "system".
    pub role: String,
    pub content: Vec<ContentPart>,
}

/// Parte de uma mensagem: texto ou imagem referenciada por URL.
///
/// Serializado com a tag `"type"`, no formato esperado pela API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Resposta de `/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn user(content: Vec<ContentPart>) -> Self {
        Self {
            role: "user".into(),
            content,
        }
    }
}

impl ChatResponse {
    /// Texto da primeira escolha, se houver.
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|text| !text.trim().is_empty())
    }
}
