//! Wire protocol for the realtime quiz channel
//!
//! Inbound frames are `{"type": ..., "payload": ...}` envelopes. They are decoded
//! and validated here so the coordinator only ever sees typed [`ClientMessage`]s.

use crate::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors produced while decoding an inbound event envelope
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown event type: {0}")]
    UnknownType(String),

    #[error("bad payload for {kind}: {reason}")]
    BadPayload { kind: &'static str, reason: String },
}

/// Control and game events sent by participants
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join { name: String },
    Start,
    Answer { name: String, option_index: usize },
    NextQuestion,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerPayload {
    option_index: f64,
    name: String,
}

impl ClientMessage {
    /// Decode a text frame into a typed event
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_str(text)?;

        match envelope.kind.as_str() {
            "join" => match envelope.payload {
                Some(Value::String(name)) => Ok(ClientMessage::Join { name }),
                _ => Err(DecodeError::BadPayload {
                    kind: "join",
                    reason: "expected a display name string".to_string(),
                }),
            },
            "start" => Ok(ClientMessage::Start),
            "next_question" => Ok(ClientMessage::NextQuestion),
            "answer" => {
                let payload = envelope.payload.ok_or_else(|| DecodeError::BadPayload {
                    kind: "answer",
                    reason: "missing payload".to_string(),
                })?;
                let answer: AnswerPayload =
                    serde_json::from_value(payload).map_err(|e| DecodeError::BadPayload {
                        kind: "answer",
                        reason: e.to_string(),
                    })?;

                // Fractional indices truncate toward zero
                let index = answer.option_index.trunc();
                if !index.is_finite() || index < 0.0 {
                    return Err(DecodeError::BadPayload {
                        kind: "answer",
                        reason: format!("option index {} out of range", answer.option_index),
                    });
                }

                Ok(ClientMessage::Answer {
                    name: answer.name,
                    option_index: index as usize,
                })
            }
            other => Err(DecodeError::UnknownType(other.to_string())),
        }
    }

    /// Encode into the wire envelope (used by clients and tests)
    pub fn to_json(&self) -> String {
        let value = match self {
            ClientMessage::Join { name } => serde_json::json!({ "type": "join", "payload": name }),
            ClientMessage::Start => serde_json::json!({ "type": "start" }),
            ClientMessage::Answer { name, option_index } => serde_json::json!({
                "type": "answer",
                "payload": { "optionIndex": option_index, "name": name },
            }),
            ClientMessage::NextQuestion => serde_json::json!({ "type": "next_question" }),
        };
        value.to_string()
    }
}

/// One leaderboard or participant-list row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Standing {
    pub name: String,
    pub score: u32,
}

impl From<&Participant> for Standing {
    fn from(participant: &Participant) -> Self {
        Self {
            name: participant.name.clone(),
            score: participant.score,
        }
    }
}

/// Option as shown to participants (never carries correctness)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicOption {
    pub id: OptionId,
    pub text: String,
}

/// Question as shown to participants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicQuestion {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<PublicOption>,
}

impl From<&Question> for PublicQuestion {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            options: question
                .options
                .iter()
                .map(|o| PublicOption {
                    id: o.id.clone(),
                    text: o.text.clone(),
                })
                .collect(),
        }
    }
}

/// Broadcasts fanned out by a room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    Participants(Vec<Standing>),
    Question(PublicQuestion),
    /// Whole seconds remaining on the current question
    Timer(u64),
    Leaderboard(Vec<Standing>),
    QuizEnd(Vec<Standing>),
}
