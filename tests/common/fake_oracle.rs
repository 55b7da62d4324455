//! Scripted oracle shared by the integration test groups.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use agent_architect::providers::{
    GroundingCitation, OracleError, OracleRequest, OracleResponse, SearchOracle, TextOracle,
};

/// One scripted answer.
pub enum Reply {
    /// Successful text.
    Text(String),
    /// Successful text with grounding citations.
    Cited(String, Vec<GroundingCitation>),
    /// Oracle failure with this message.
    Fail(String),
}

/// Replays scripted replies in order and records every request. An exhausted
/// script answers with empty text.
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Reply::Text((*t).to_owned())).collect())
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(err) => panic!("request log poisoned: {err}"),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests().len()
    }

    fn answer(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request),
            Err(err) => panic!("request log poisoned: {err}"),
        }
        let next = match self.replies.lock() {
            Ok(mut replies) => replies.pop_front(),
            Err(err) => panic!("script poisoned: {err}"),
        };
        match next {
            Some(Reply::Text(text)) => Ok(OracleResponse {
                text,
                ..OracleResponse::default()
            }),
            Some(Reply::Cited(text, citations)) => Ok(OracleResponse {
                text,
                citations,
                model: None,
            }),
            Some(Reply::Fail(message)) => Err(OracleError::Unavailable(message)),
            None => Ok(OracleResponse::default()),
        }
    }
}

#[async_trait]
impl TextOracle for ScriptedOracle {
    async fn generate(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        self.answer(request)
    }
}

#[async_trait]
impl SearchOracle for ScriptedOracle {
    async fn search(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        self.answer(request)
    }
}

/// Citation helper.
pub fn cite(title: &str, uri: &str) -> GroundingCitation {
    GroundingCitation {
        title: title.to_owned(),
        uri: uri.to_owned(),
    }
}

/// All text parts of a request joined, for prompt assertions.
pub fn prompt_text(request: &OracleRequest) -> String {
    request
        .parts
        .iter()
        .filter_map(|part| match part {
            agent_architect::providers::ContentPart::Text { text } => Some(text.as_str()),
            agent_architect::providers::ContentPart::InlineData { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
