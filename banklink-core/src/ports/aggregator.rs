//! Aggregator API port
//!
//! The HTTP transport to the aggregator's REST API. Implementations map
//! non-success responses to `Error::Upstream`, network failures to
//! `Error::Transport` and timeouts to `Error::Timeout`.

use crate::domain::result::Result;
use crate::domain::{Institution, RefreshedToken, Requisition, RequisitionRequest, TokenPair};

pub trait AggregatorApi: Send + Sync {
    /// `POST /token/new/`
    fn new_token(&self, secret_id: &str, secret_key: &str) -> Result<TokenPair>;

    /// `POST /token/refresh/`
    fn refresh_token(&self, refresh: &str) -> Result<RefreshedToken>;

    /// `GET /institutions/?country={code}`, in whatever order the aggregator returns
    fn list_institutions(&self, access_token: &str, country: &str) -> Result<Vec<Institution>>;

    /// `POST /requisitions/`
    fn create_requisition(
        &self,
        access_token: &str,
        request: &RequisitionRequest,
    ) -> Result<Requisition>;
}
