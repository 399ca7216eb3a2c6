use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const ACCOUNTS_PATH: &str = "/v1/organisation/accounts";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub organisation_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: i64,
    pub attributes: Attributes,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attributes {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub name: Vec<String>,
    #[serde(default)]
    pub alternative_names: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub self_link: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountEnvelope {
    pub data: Account,
    pub links: Links,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error_message: String,
}

#[derive(Deserialize)]
pub struct CreateAccount {
    pub data: NewAccount,
}

#[derive(Deserialize)]
pub struct NewAccount {
    pub id: Uuid,
    pub organisation_id: Uuid,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub attributes: Option<Attributes>,
}

#[derive(Deserialize)]
pub struct DeleteParams {
    pub version: Option<String>,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Account>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route(ACCOUNTS_PATH, post(create_account))
        .route(
            &format!("{ACCOUNTS_PATH}/{{id}}"),
            get(fetch_account).delete(delete_account),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error_message: message.into(),
    };
    (status, Json(body)).into_response()
}

fn envelope(account: Account) -> AccountEnvelope {
    let links = Links {
        self_link: format!("{ACCOUNTS_PATH}/{}", account.id),
    };
    AccountEnvelope {
        data: account,
        links,
    }
}

fn parse_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw).map_err(|_| error(StatusCode::BAD_REQUEST, "id is not a valid uuid"))
}

/// Validation messages for a new account, in the API's list format.
fn validate(attributes: &Attributes) -> Option<String> {
    let mut problems = Vec::new();
    if attributes.country.trim().is_empty() {
        problems.push("country in body is required");
    }
    if attributes.name.iter().all(|n| n.trim().is_empty()) {
        problems.push("name in body is required");
    }
    if problems.is_empty() {
        return None;
    }
    Some(format!("validation failure list:\n{}", problems.join("\n")))
}

async fn create_account(State(db): State<Db>, body: Bytes) -> Response {
    let input: CreateAccount = match serde_json::from_slice(&body) {
        Ok(input) => input,
        Err(e) => return error(StatusCode::BAD_REQUEST, format!("invalid request body: {e}")),
    };
    let attributes = input.data.attributes.unwrap_or_default();
    if let Some(message) = validate(&attributes) {
        return error(StatusCode::BAD_REQUEST, message);
    }

    let mut accounts = db.write().await;
    if accounts.contains_key(&input.data.id) {
        return error(
            StatusCode::CONFLICT,
            "Account cannot be created as it violates a duplicate constraint",
        );
    }

    let now = Utc::now();
    let account = Account {
        id: input.data.id,
        organisation_id: input.data.organisation_id,
        kind: input.data.kind.unwrap_or_else(|| "accounts".to_string()),
        version: 0,
        attributes,
        created_on: now,
        modified_on: now,
    };
    accounts.insert(account.id, account.clone());
    info!(id = %account.id, "account created");
    (StatusCode::CREATED, Json(envelope(account))).into_response()
}

async fn fetch_account(State(db): State<Db>, Path(raw_id): Path<String>) -> Response {
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let accounts = db.read().await;
    match accounts.get(&id) {
        Some(account) => Json(envelope(account.clone())).into_response(),
        None => error(StatusCode::NOT_FOUND, format!("record {id} does not exist")),
    }
}

async fn delete_account(
    State(db): State<Db>,
    Path(raw_id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Response {
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Some(version) = params.version.and_then(|v| v.parse::<i64>().ok()) else {
        return error(StatusCode::BAD_REQUEST, "invalid version number");
    };

    let mut accounts = db.write().await;
    match accounts.get(&id) {
        None => StatusCode::NOT_FOUND.into_response(),
        Some(account) if account.version != version => {
            error(StatusCode::CONFLICT, "invalid version")
        }
        Some(_) => {
            accounts.remove(&id);
            info!(%id, "account deleted");
            StatusCode::NO_CONTENT.into_response()
        }
    }
}
