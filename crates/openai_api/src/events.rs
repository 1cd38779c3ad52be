use serde::{Deserialize, Serialize};

/// One `chat.completion.chunk` object from the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<CompletionUsage>,
}

impl ChatCompletionChunk {
    /// Text delta of the first choice, empty when the chunk carries none.
    pub fn delta_text(&self) -> &str {
        self.first_choice()
            .and_then(|choice| choice.delta.content.as_deref())
            .unwrap_or("")
    }

    /// Finish reason of the first choice.
    pub fn finish_reason(&self) -> Option<&str> {
        self.first_choice()
            .and_then(|choice| choice.finish_reason.as_deref())
    }

    fn first_choice(&self) -> Option<&ChunkChoice> {
        self.choices.iter().find(|choice| choice.index == 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Stream event emitted by the parser after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenAiStreamEvent {
    Chunk(ChatCompletionChunk),
    Error {
        code: Option<String>,
        message: Option<String>,
    },
    /// The `[DONE]` sentinel.
    Done,
}
