//! Scripted fakes for pipeline tests: an LLM that replays canned outcomes
//! and a store that records executed SQL. No network, no database.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::core::error::PipelineError;
use crate::core::executor::{QueryResult, QueryStore};
use crate::core::llm::{ChatMessage, LlmClient};

pub struct MockLlm {
    outcomes: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<(Vec<ChatMessage>, f32)>>,
}

impl MockLlm {
    pub fn scripted(responses: Vec<&str>) -> Self {
        Self::with_outcomes(responses.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn with_outcomes(outcomes: Vec<Result<String, String>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn temperatures(&self) -> Vec<f32> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    /// Full prompt text of call `idx`, system and user messages joined.
    pub fn prompt_text(&self, idx: usize) -> String {
        self.calls.lock().unwrap()[idx]
            .0
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((messages.to_vec(), temperature));
        match self.outcomes.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Err(anyhow!("mock llm exhausted")),
        }
    }
}

pub struct FakeStore {
    result: Result<QueryResult, String>,
    executed: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn returning(result: QueryResult) -> Self {
        Self {
            result: Ok(result),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryStore for FakeStore {
    async fn execute(&self, sql: &str) -> Result<QueryResult, PipelineError> {
        self.executed.lock().unwrap().push(sql.to_string());
        match &self.result {
            Ok(result) => Ok(result.clone()),
            Err(message) => Err(PipelineError::Execution(message.clone())),
        }
    }

    async fn ping(&self) -> Result<(), PipelineError> {
        match &self.result {
            Ok(_) => Ok(()),
            Err(message) => Err(PipelineError::Execution(message.clone())),
        }
    }
}
