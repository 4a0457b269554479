//! In-memory [`LogsClient`] that replays scripted results.
//!
//! Every call is recorded for later inspection. When no result has been
//! queued for a call, creates succeed and puts succeed with a fresh token
//! `token-N`, where `N` counts successful default puts from 1.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::{ClientError, LogsClient, PutLogEventsRequest, SequenceToken};

/// One observed `put_log_events` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedPut {
    pub log_group: String,
    pub log_stream: String,
    pub sequence_token: Option<SequenceToken>,
    pub messages: Vec<String>,
    pub timestamps: Vec<i64>,
}

#[derive(Default)]
struct ScriptState {
    group_results: VecDeque<Result<(), ClientError>>,
    stream_results: VecDeque<Result<(), ClientError>>,
    put_results: VecDeque<Result<Option<SequenceToken>, ClientError>>,
    group_calls: Vec<String>,
    stream_calls: Vec<(String, String)>,
    puts: Vec<RecordedPut>,
    issued_tokens: u64,
}

/// Cloneable handle; clones share the same script and call log.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next `create_log_group` call.
    pub fn push_create_group(&self, result: Result<(), ClientError>) -> &Self {
        self.state.lock().group_results.push_back(result);
        self
    }

    /// Queue the result of the next `create_log_stream` call.
    pub fn push_create_stream(&self, result: Result<(), ClientError>) -> &Self {
        self.state.lock().stream_results.push_back(result);
        self
    }

    /// Queue the result of the next `put_log_events` call.
    pub fn push_put(&self, result: Result<Option<SequenceToken>, ClientError>) -> &Self {
        self.state.lock().put_results.push_back(result);
        self
    }

    /// Every put observed so far, the startup token discovery put included.
    pub fn puts(&self) -> Vec<RecordedPut> {
        self.state.lock().puts.clone()
    }

    pub fn put_count(&self) -> usize {
        self.state.lock().puts.len()
    }

    pub fn group_calls(&self) -> Vec<String> {
        self.state.lock().group_calls.clone()
    }

    pub fn stream_calls(&self) -> Vec<(String, String)> {
        self.state.lock().stream_calls.clone()
    }

    /// Messages of every put after the first, in the order they were sent.
    ///
    /// The first put of a started shipper discovers the token.
    pub fn shipped_messages(&self) -> Vec<String> {
        self.state
            .lock()
            .puts
            .iter()
            .skip(1)
            .flat_map(|put| put.messages.iter().cloned())
            .collect()
    }
}

impl LogsClient for ScriptedClient {
    fn create_log_group(&self, log_group: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        state.group_calls.push(log_group.to_owned());
        state.group_results.pop_front().unwrap_or(Ok(()))
    }

    fn create_log_stream(&self, log_group: &str, log_stream: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        state
            .stream_calls
            .push((log_group.to_owned(), log_stream.to_owned()));
        state.stream_results.pop_front().unwrap_or(Ok(()))
    }

    fn put_log_events(
        &self,
        request: PutLogEventsRequest<'_>,
    ) -> Result<Option<SequenceToken>, ClientError> {
        let mut state = self.state.lock();
        state.puts.push(RecordedPut {
            log_group: request.log_group.to_owned(),
            log_stream: request.log_stream.to_owned(),
            sequence_token: request.sequence_token.cloned(),
            messages: request
                .events
                .iter()
                .map(|event| event.message().to_owned())
                .collect(),
            timestamps: request.events.iter().map(|event| event.timestamp()).collect(),
        });
        match state.put_results.pop_front() {
            Some(result) => result,
            None => {
                state.issued_tokens += 1;
                Ok(Some(SequenceToken::new(format!(
                    "token-{}",
                    state.issued_tokens
                ))))
            }
        }
    }
}
