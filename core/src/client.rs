//! Account client: builds requests, dispatches them, parses responses.
//!
//! # Design
//! `AccountClient` holds an immutable `ClientConfig` and a shared dispatcher,
//! nothing else, so clones are cheap and it can be used from many threads at
//! once. Each operation is split into a pure `build_*` step that produces an
//! `HttpRequest`, the dispatch, and a `parse_*` step that consumes the
//! `HttpResponse`. The build and parse halves are public so they can be
//! driven with canned data.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::context::CallContext;
use crate::dispatch::{DirectDispatcher, Dispatcher, RetryingDispatcher};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::normalize::normalize_response;
use crate::transport::{Transport, UreqTransport};
use crate::types::{Account, AccountRequest, AccountResponse, CreateAccountRequest};

/// Blocking client for the accounts API.
#[derive(Clone)]
pub struct AccountClient {
    config: ClientConfig,
    dispatcher: Arc<dyn Dispatcher>,
}

impl fmt::Debug for AccountClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AccountClient {
    /// Client over the default `ureq` transport.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }

    /// Client over a custom transport, still wrapped in the configured
    /// timeout and retry policy.
    pub fn with_transport<T: Transport + 'static>(config: ClientConfig, transport: T) -> Self {
        let direct = DirectDispatcher::new(transport, config.timeout);
        let dispatcher: Arc<dyn Dispatcher> = if config.retries.is_enabled() {
            Arc::new(RetryingDispatcher::new(direct, config.retries))
        } else {
            Arc::new(direct)
        };
        Self { config, dispatcher }
    }

    /// Client over a caller-supplied dispatcher; `config.timeout` and
    /// `config.retries` are then the dispatcher's business.
    pub fn with_dispatcher(config: ClientConfig, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { config, dispatcher }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[instrument(level = "debug", skip(self, ctx))]
    pub fn fetch(&self, ctx: &CallContext, id: &str) -> Result<Account, ApiError> {
        let request = self.build_fetch(id)?;
        let response = self.dispatch(&request, ctx)?;
        self.parse_fetch(response)
    }

    #[instrument(level = "debug", skip_all, fields(id = %account.id))]
    pub fn create(
        &self,
        ctx: &CallContext,
        account: &AccountRequest,
    ) -> Result<Account, ApiError> {
        let request = self.build_create(account)?;
        let response = self.dispatch(&request, ctx)?;
        self.parse_create(response)
    }

    /// Delete version 0 of the account.
    pub fn delete(&self, ctx: &CallContext, id: &str) -> Result<(), ApiError> {
        self.delete_version(ctx, id, 0)
    }

    #[instrument(level = "debug", skip(self, ctx))]
    pub fn delete_version(
        &self,
        ctx: &CallContext,
        id: &str,
        version: i64,
    ) -> Result<(), ApiError> {
        let request = self.build_delete(id, version)?;
        let response = self.dispatch(&request, ctx)?;
        self.parse_delete(response)
    }

    pub fn build_fetch(&self, id: &str) -> Result<HttpRequest, ApiError> {
        let id = required("id", id)?;
        Ok(HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}/{id}", self.config.base_url),
            headers: Vec::new(),
            body: None,
        })
    }

    pub fn build_create(&self, account: &AccountRequest) -> Result<HttpRequest, ApiError> {
        if account.id.is_nil() {
            return Err(ApiError::MissingRequiredField { field: "id" });
        }
        if account.organisation_id.is_nil() {
            return Err(ApiError::MissingRequiredField {
                field: "organisation_id",
            });
        }
        let body = serde_json::to_vec(&CreateAccountRequest { data: account })
            .map_err(|e| ApiError::SerializationFailure(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: self.config.base_url.clone(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        })
    }

    pub fn build_delete(&self, id: &str, version: i64) -> Result<HttpRequest, ApiError> {
        let id = required("id", id)?;
        Ok(HttpRequest {
            method: HttpMethod::Delete,
            path: format!("{}/{id}?version={version}", self.config.base_url),
            headers: Vec::new(),
            body: None,
        })
    }

    pub fn parse_fetch(&self, response: HttpResponse) -> Result<Account, ApiError> {
        let response = check_status(response, 200)?;
        parse_account(&response.body)
    }

    pub fn parse_create(&self, response: HttpResponse) -> Result<Account, ApiError> {
        let response = check_status(response, 201)?;
        parse_account(&response.body)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(response, 204)?;
        Ok(())
    }

    fn dispatch(
        &self,
        request: &HttpRequest,
        ctx: &CallContext,
    ) -> Result<HttpResponse, ApiError> {
        let response = self.dispatcher.execute(request, ctx)?;
        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "response received"
        );
        Ok(response)
    }
}

/// Trimmed value of a required identifier, or `MissingRequiredField`.
fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::MissingRequiredField { field });
    }
    Ok(value)
}

/// Pass the response through on the expected status, normalize it otherwise.
fn check_status(response: HttpResponse, expected: u16) -> Result<HttpResponse, ApiError> {
    if response.status == expected {
        return Ok(response);
    }
    Err(normalize_response(response))
}

fn parse_account(body: &[u8]) -> Result<Account, ApiError> {
    serde_json::from_slice::<AccountResponse>(body)
        .map(|envelope| envelope.data)
        .map_err(|e| ApiError::UnmarshalFailure(e.to_string()))
}
