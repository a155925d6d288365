use crate::config::ProviderConfig;
use crate::db::pgvector::EMBEDDING_DIMENSION;
use crate::services::ProviderError;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
        CreateEmbeddingRequest, EmbeddingInput,
    },
    Client,
};
use text_splitter::{ChunkConfig, TextSplitter};
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Tokens per stored chunk
pub const CHUNK_TOKENS: usize = 512;
/// Tokens shared between neighbouring chunks
pub const CHUNK_OVERLAP_TOKENS: usize = 64;
// Inputs per embeddings request
const EMBEDDING_BATCH: usize = 64;

/// A chunk of text with its token count
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    pub token_count: usize,
}

/// Service for AI operations: token-aware chunking, embeddings and chat
pub struct IntelligenceService {
    client: Client<OpenAIConfig>,
    /// Tokenizer shared by the embedding and chat models
    tokenizer: CoreBPE,
    embedding_model: String,
    chat_model: String,
}

// Manual Debug implementation since CoreBPE doesn't implement Debug
impl std::fmt::Debug for IntelligenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntelligenceService")
            .field("embedding_model", &self.embedding_model)
            .field("chat_model", &self.chat_model)
            .finish_non_exhaustive()
    }
}

impl IntelligenceService {
    /// Creates the service. The OpenAI key is read from `OPENAI_API_KEY` here,
    /// when the client is built; a missing key only fails once a request is sent.
    /// Construction makes no network calls.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let tokenizer = cl100k_base().map_err(|e| ProviderError::Tokenizer(e.to_string()))?;
        Ok(Self {
            client: Client::new(),
            tokenizer,
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
        })
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.encode_ordinary(text).len()
    }

    /// Splits content into overlapping chunks of at most `max_tokens` tokens
    pub fn chunk_text(
        &self,
        text: &str,
        max_tokens: usize,
        overlap: usize,
    ) -> Result<Vec<TextChunk>, ProviderError> {
        let chunk_config = ChunkConfig::new(max_tokens)
            .with_sizer(&self.tokenizer)
            .with_overlap(overlap)
            .map_err(|e| ProviderError::Tokenizer(e.to_string()))?;
        let splitter = TextSplitter::new(chunk_config);

        Ok(splitter
            .chunks(text)
            .map(|chunk| TextChunk {
                content: chunk.to_string(),
                token_count: self.count_tokens(chunk),
            })
            .collect())
    }

    /// Embeds each input, preserving order
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut embeddings = Vec::with_capacity(inputs.len());

        for batch in inputs.chunks(EMBEDDING_BATCH) {
            let request = CreateEmbeddingRequest {
                model: self.embedding_model.clone(),
                dimensions: Some(EMBEDDING_DIMENSION as u32),
                input: EmbeddingInput::StringArray(batch.to_vec()),
                ..Default::default()
            };

            let mut response = self.client.embeddings().create(request).await?;
            if response.data.len() != batch.len() {
                return Err(ProviderError::InvalidResponse(format!(
                    "Requested {} embeddings, received {}",
                    batch.len(),
                    response.data.len()
                )));
            }
            response.data.sort_by_key(|e| e.index);
            embeddings.extend(response.data.into_iter().map(|e| e.embedding));
        }

        Ok(embeddings)
    }

    /// Embeds a single text
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| ProviderError::InvalidResponse("No embedding returned".to_string()))
    }

    fn chat_messages(
        &self,
        system_content: &str,
        user_content: &str,
    ) -> Vec<ChatCompletionRequestMessage> {
        let system_message = ChatCompletionRequestSystemMessage {
            content: ChatCompletionRequestSystemMessageContent::Text(system_content.to_string()),
            name: None,
        };

        let user_message = ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(user_content.to_string()),
            name: None,
        };

        vec![
            ChatCompletionRequestMessage::System(system_message),
            ChatCompletionRequestMessage::User(user_message),
        ]
    }

    /// Single-turn chat completion returning the first choice's text
    pub async fn complete(
        &self,
        system_content: &str,
        user_content: &str,
    ) -> Result<String, ProviderError> {
        let request = CreateChatCompletionRequest {
            messages: self.chat_messages(system_content, user_content),
            model: self.chat_model.clone(),
            temperature: Some(0.1),
            ..Default::default()
        };

        let response = self.client.chat().create(request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("No content was generated from the API".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> IntelligenceService {
        IntelligenceService::new(&ProviderConfig::default()).expect("tokenizer loads")
    }

    #[test]
    fn builds_without_network_or_key() {
        let config = ProviderConfig {
            embedding_model: "embed-test".to_string(),
            chat_model: "chat-test".to_string(),
            ..ProviderConfig::default()
        };
        let service = IntelligenceService::new(&config).unwrap();
        let debug = format!("{:?}", service);
        assert!(debug.contains("embed-test"));
        assert!(debug.contains("chat-test"));
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = service()
            .chunk_text("A short receipt.", CHUNK_TOKENS, CHUNK_OVERLAP_TOKENS)
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "A short receipt.");
        assert!(chunks[0].token_count > 0);
    }

    #[test]
    fn long_text_respects_token_budget() {
        let service = service();
        let paragraph = "Invoices list line items, taxes and totals for each order. ";
        let text = paragraph.repeat(400);

        let chunks = service.chunk_text(&text, 128, 16).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= 128, "chunk has {} tokens", chunk.token_count);
        }
    }

    #[test]
    fn overlap_larger_than_chunk_is_rejected() {
        assert!(service().chunk_text("text", 16, 32).is_err());
    }
}
