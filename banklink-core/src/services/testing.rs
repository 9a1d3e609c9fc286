//! Scripted aggregator used by service tests

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::result::{Error, Result};
use crate::domain::{Institution, RefreshedToken, Requisition, RequisitionRequest, TokenPair};
use crate::ports::AggregatorApi;

#[derive(Default)]
struct Script {
    new_token: VecDeque<Result<TokenPair>>,
    refresh: VecDeque<Result<RefreshedToken>>,
    institutions: VecDeque<Result<Vec<Institution>>>,
    requisitions: VecDeque<Result<Requisition>>,
    new_token_calls: usize,
    refresh_calls: usize,
    institution_calls: usize,
    requisition_calls: usize,
    bearer_tokens: Vec<String>,
    countries: Vec<String>,
    requisition_requests: Vec<RequisitionRequest>,
}

/// Answers each call with the next queued response for that endpoint.
/// An empty queue answers with a transport error.
#[derive(Default)]
pub struct ScriptedAggregator {
    script: Mutex<Script>,
}

fn unscripted(endpoint: &str) -> Error {
    Error::Transport(format!("no scripted response for {}", endpoint))
}

impl ScriptedAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_new_token(self, response: Result<TokenPair>) -> Self {
        self.script.lock().unwrap().new_token.push_back(response);
        self
    }

    pub fn with_refresh(self, response: Result<RefreshedToken>) -> Self {
        self.script.lock().unwrap().refresh.push_back(response);
        self
    }

    pub fn with_institutions(self, response: Result<Vec<Institution>>) -> Self {
        self.script.lock().unwrap().institutions.push_back(response);
        self
    }

    pub fn with_requisition(self, response: Result<Requisition>) -> Self {
        self.script.lock().unwrap().requisitions.push_back(response);
        self
    }

    pub fn new_token_calls(&self) -> usize {
        self.script.lock().unwrap().new_token_calls
    }

    pub fn refresh_calls(&self) -> usize {
        self.script.lock().unwrap().refresh_calls
    }

    pub fn institution_calls(&self) -> usize {
        self.script.lock().unwrap().institution_calls
    }

    pub fn requisition_calls(&self) -> usize {
        self.script.lock().unwrap().requisition_calls
    }

    pub fn total_calls(&self) -> usize {
        let s = self.script.lock().unwrap();
        s.new_token_calls + s.refresh_calls + s.institution_calls + s.requisition_calls
    }

    /// Bearer tokens presented to authenticated endpoints, in call order
    pub fn bearer_tokens(&self) -> Vec<String> {
        self.script.lock().unwrap().bearer_tokens.clone()
    }

    pub fn countries(&self) -> Vec<String> {
        self.script.lock().unwrap().countries.clone()
    }

    pub fn requisition_requests(&self) -> Vec<RequisitionRequest> {
        self.script.lock().unwrap().requisition_requests.clone()
    }
}

impl AggregatorApi for ScriptedAggregator {
    fn new_token(&self, _secret_id: &str, _secret_key: &str) -> Result<TokenPair> {
        let mut s = self.script.lock().unwrap();
        s.new_token_calls += 1;
        s.new_token
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("token/new")))
    }

    fn refresh_token(&self, _refresh: &str) -> Result<RefreshedToken> {
        let mut s = self.script.lock().unwrap();
        s.refresh_calls += 1;
        s.refresh
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("token/refresh")))
    }

    fn list_institutions(&self, access_token: &str, country: &str) -> Result<Vec<Institution>> {
        let mut s = self.script.lock().unwrap();
        s.institution_calls += 1;
        s.bearer_tokens.push(access_token.to_string());
        s.countries.push(country.to_string());
        s.institutions
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("institutions")))
    }

    fn create_requisition(
        &self,
        access_token: &str,
        request: &RequisitionRequest,
    ) -> Result<Requisition> {
        let mut s = self.script.lock().unwrap();
        s.requisition_calls += 1;
        s.bearer_tokens.push(access_token.to_string());
        s.requisition_requests.push(request.clone());
        s.requisitions
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("requisitions")))
    }
}
