//! HTTP gateway to the remote portfolio ledger.
//!
//! Single choke-point for every remote call. The gateway owns the cached
//! short-lived auth token, serializes all calls through one critical section
//! (the remote endpoint's session semantics are not safe under concurrent
//! requests), retries transient failures, and trips a circuit breaker after
//! a streak of them.

use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::domain::entities::activity::{RemoteActivity, RemoteActivityType};
use crate::domain::entities::transaction::{CanonicalTransaction, InstrumentRef, SourceKey};
use crate::domain::errors::{ConfigError, GatewayError};
use crate::domain::repositories::ledger_gateway::{GatewayResult, LedgerGateway};
use crate::infrastructure::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::infrastructure::retry::{CallError, RetryPolicy};
use async_trait::async_trait;

/// Marker prefixed to the remote free-text comment field so that successive
/// passes can recognize activities created by this sidecar.
const COMMENT_KEY_PREFIX: &str = "sync-key:";

const TOKEN_PATH: &str = "/api/v1/auth/anonymous";
const ORDER_PATH: &str = "/api/v1/order";

struct CachedToken {
    bearer: String,
    acquired_at: Instant,
}

/// Mutable gateway state, guarded by the same lock that serializes calls so
/// token refresh can never race an in-flight request.
struct GatewayState {
    token: Option<CachedToken>,
    breaker: CircuitBreaker,
}

pub struct HttpLedgerGateway {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    token_ttl: Duration,
    retry: RetryPolicy,
    state: Mutex<GatewayState>,
}

impl HttpLedgerGateway {
    pub fn new(config: &SyncConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                variable: "FOLIOSYNC_REQUEST_TIMEOUT_MS",
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            token_ttl: Duration::from_secs(config.token_ttl_seconds),
            retry: RetryPolicy {
                max_attempts: config.max_retries,
                pause: Duration::from_millis(config.retry_pause_ms),
            },
            state: Mutex::new(GatewayState {
                token: None,
                breaker: CircuitBreaker::new(CircuitBreakerConfig {
                    failure_threshold: config.breaker_failure_threshold,
                    cooldown: Duration::from_secs(config.breaker_cooldown_seconds),
                }),
            }),
        })
    }

    /// The single call primitive every gateway operation funnels through.
    ///
    /// Holds the serialization lock for the whole call, including retries and
    /// token refresh. Returns `Ok(None)` without attempting anything when the
    /// circuit is open.
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, GatewayError> {
        let mut guard = self.state.lock().await;
        if !guard.breaker.should_attempt() {
            warn!(%method, %path, "circuit open, deferring remote call");
            return Ok(None);
        }

        let started = Instant::now();
        let result = self
            .call_with_retry(&mut guard, &method, path, body.as_ref())
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                guard.breaker.record_success();
                debug!(%method, %path, elapsed_ms, "remote call succeeded");
            }
            Err(err) if err.is_transient() => {
                guard.breaker.record_failure();
                warn!(
                    %method, %path, elapsed_ms, %err,
                    failure_streak = guard.breaker.failure_streak(),
                    "remote call failed"
                );
            }
            Err(err) => {
                warn!(%method, %path, elapsed_ms, %err, "remote call rejected");
            }
        }

        result.map(Some)
    }

    /// Bounded retry loop around [`Self::execute_once`]. Fatal classifications
    /// short-circuit; an exhausted budget folds the last retryable reason into
    /// [`GatewayError::Transient`].
    async fn call_with_retry(
        &self,
        state: &mut GatewayState,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, GatewayError> {
        let budget = self.retry.budget();
        let mut last_error = String::from("no attempt made");
        for attempt in 1..=budget {
            match self.execute_once(state, method, path, body).await {
                Ok(value) => return Ok(value),
                Err(CallError::Fatal(err)) => return Err(err),
                Err(CallError::Retryable(reason)) => {
                    warn!(attempt, budget, %reason, "retryable remote failure");
                    last_error = reason;
                    if attempt < budget {
                        sleep(self.retry.pause).await;
                    }
                }
            }
        }
        Err(GatewayError::Transient {
            attempts: budget,
            last_error,
        })
    }

    /// One authenticated attempt: resolve a token, issue the request and
    /// classify the response.
    async fn execute_once(
        &self,
        state: &mut GatewayState,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, CallError> {
        let bearer = self.ensure_token(state).await?;

        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url).bearer_auth(bearer);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CallError::Retryable(format!("transport error: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CallError::Retryable(format!("failed reading response body: {}", e)))?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(serde_json::Value::Null);
            }
            return serde_json::from_str(&text)
                .map_err(|e| CallError::Retryable(format!("malformed response body: {}", e)));
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                // Force re-acquisition on the next call.
                state.token = None;
                Err(CallError::Fatal(GatewayError::Unauthorized {
                    status: status.as_u16(),
                    context: text,
                }))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(CallError::Fatal(GatewayError::BadRequest {
                    status: status.as_u16(),
                    body: text,
                }))
            }
            _ => Err(CallError::Retryable(format!("status {}: {}", status, text))),
        }
    }

    /// Reuse the cached bearer token while it is fresh; otherwise trade the
    /// long-lived access credential for a new short-lived one.
    async fn ensure_token(&self, state: &mut GatewayState) -> Result<String, CallError> {
        if let Some(cached) = &state.token {
            if cached.acquired_at.elapsed() < self.token_ttl {
                return Ok(cached.bearer.clone());
            }
        }

        debug!("auth token missing or expired, acquiring a new one");
        let url = format!("{}{}", self.base_url, TOKEN_PATH);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "accessToken": self.access_token }))
            .send()
            .await
            .map_err(|e| CallError::Retryable(format!("token acquisition failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let context = response.text().await.unwrap_or_default();
            return Err(CallError::Fatal(GatewayError::Unauthorized {
                status: status.as_u16(),
                context,
            }));
        }
        if !status.is_success() {
            return Err(CallError::Retryable(format!(
                "token acquisition failed with status {}",
                status
            )));
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|e| CallError::Retryable(format!("malformed token response: {}", e)))?;
        let bearer = payload.auth_token.clone();
        state.token = Some(CachedToken {
            bearer: payload.auth_token,
            acquired_at: Instant::now(),
        });
        Ok(bearer)
    }

    fn payload_for(
        &self,
        account_id: &str,
        remote_id: Option<&str>,
        transaction: &CanonicalTransaction,
    ) -> Result<ActivityPayload, GatewayError> {
        ActivityPayload::from_transaction(account_id, remote_id, transaction)
    }
}

#[async_trait]
impl LedgerGateway for HttpLedgerGateway {
    async fn fetch_activities(&self, account_id: &str) -> GatewayResult<Vec<RemoteActivity>> {
        let path = format!("{}?accounts={}", ORDER_PATH, account_id);
        let Some(value) = self.call(Method::GET, &path, None).await? else {
            return Ok(None);
        };

        let listing: ActivityListing =
            serde_json::from_value(value).map_err(|e| GatewayError::Transient {
                attempts: 1,
                last_error: format!("unexpected activities payload: {}", e),
            })?;

        let mut activities = Vec::with_capacity(listing.activities.len());
        for payload in listing.activities {
            match payload.into_remote_activity() {
                Some(activity) => activities.push(activity),
                // Activities created directly on the remote system carry no
                // sync reference; they are not ours to touch.
                None => debug!(account_id, "skipping remote activity without sync reference"),
            }
        }
        Ok(Some(activities))
    }

    async fn create_activity(
        &self,
        account_id: &str,
        transaction: &CanonicalTransaction,
    ) -> GatewayResult<()> {
        let payload = self.payload_for(account_id, None, transaction)?;
        let body = encode(&payload)?;
        let result = self.call(Method::POST, ORDER_PATH, Some(body)).await?;
        Ok(result.map(|_| ()))
    }

    async fn update_activity(
        &self,
        remote_id: &str,
        transaction: &CanonicalTransaction,
    ) -> GatewayResult<()> {
        let payload =
            self.payload_for(&transaction.account_id, Some(remote_id), transaction)?;
        let body = encode(&payload)?;
        let path = format!("{}/{}", ORDER_PATH, remote_id);
        let result = self.call(Method::PUT, &path, Some(body)).await?;
        Ok(result.map(|_| ()))
    }

    async fn delete_activity(&self, remote_id: &str) -> GatewayResult<()> {
        let path = format!("{}/{}", ORDER_PATH, remote_id);
        let result = self.call(Method::DELETE, &path, None).await?;
        Ok(result.map(|_| ()))
    }
}

fn encode(payload: &ActivityPayload) -> Result<serde_json::Value, GatewayError> {
    serde_json::to_value(payload).map_err(|e| GatewayError::BadRequest {
        status: 400,
        body: format!("failed to serialize activity payload: {}", e),
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "authToken")]
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct ActivityListing {
    activities: Vec<ActivityPayload>,
}

/// Wire representation of one remote activity.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    account_id: String,
    #[serde(rename = "type")]
    activity_type: RemoteActivityType,
    date: DateTime<Utc>,
    currency: String,
    quantity: Decimal,
    unit_price: Decimal,
    amount: Decimal,
    #[serde(default)]
    data_source: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    comment: String,
}

impl ActivityPayload {
    fn from_transaction(
        account_id: &str,
        remote_id: Option<&str>,
        transaction: &CanonicalTransaction,
    ) -> Result<Self, GatewayError> {
        let activity_type =
            transaction
                .kind
                .remote_type()
                .ok_or_else(|| GatewayError::BadRequest {
                    status: 422,
                    body: format!("no remote activity type for kind {}", transaction.kind),
                })?;
        let (data_source, symbol) = transaction
            .instrument
            .primary()
            .map(|(scheme, id)| (scheme.to_string(), id.to_string()))
            .unwrap_or_default();

        Ok(Self {
            id: remote_id.map(|id| id.to_string()),
            account_id: account_id.to_string(),
            activity_type,
            date: transaction.timestamp,
            currency: transaction.currency.clone(),
            quantity: transaction.quantity,
            unit_price: transaction.unit_price,
            amount: transaction.total_amount,
            data_source,
            symbol,
            comment: format!("{}{}", COMMENT_KEY_PREFIX, transaction.source_key),
        })
    }

    /// `None` when the activity was not created by this sidecar (no id or no
    /// sync reference in the comment field).
    fn into_remote_activity(self) -> Option<RemoteActivity> {
        let id = self.id?;
        let key = self.comment.strip_prefix(COMMENT_KEY_PREFIX)?;
        let instrument = if self.symbol.is_empty() {
            InstrumentRef::empty()
        } else {
            InstrumentRef::single(&self.data_source, &self.symbol)
        };
        Some(RemoteActivity {
            id,
            account_id: self.account_id,
            activity_type: self.activity_type,
            timestamp: self.date,
            currency: self.currency,
            instrument,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_amount: self.amount,
            source_key: SourceKey::native(key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::transaction::TransactionKind;
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;

    fn sample_transaction() -> CanonicalTransaction {
        CanonicalTransaction::new(
            TransactionKind::Buy,
            NaiveDateTime::parse_from_str("2024-03-01 10:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap()
                .and_utc(),
            "USD",
            InstrumentRef::single("YAHOO", "AAPL"),
            dec!(2),
            dec!(175.50),
            dec!(351.00),
            SourceKey::native("broker-tx-1"),
            "acct-1",
        )
    }

    #[test]
    fn test_payload_round_trips_semantics() {
        let tx = sample_transaction();
        let payload =
            ActivityPayload::from_transaction("acct-1", Some("remote-9"), &tx).unwrap();
        let activity = payload.into_remote_activity().unwrap();

        assert_eq!(activity.id, "remote-9");
        assert_eq!(activity.source_key, tx.source_key);
        assert!(tx.semantically_eq(&activity));
    }

    #[test]
    fn test_comment_carries_source_key_marker() {
        let tx = sample_transaction();
        let payload = ActivityPayload::from_transaction("acct-1", None, &tx).unwrap();
        assert_eq!(payload.comment, "sync-key:broker-tx-1");
    }

    #[test]
    fn test_foreign_activity_is_ignored() {
        let tx = sample_transaction();
        let mut payload =
            ActivityPayload::from_transaction("acct-1", Some("remote-9"), &tx).unwrap();
        payload.comment = "added by hand".to_string();
        assert!(payload.into_remote_activity().is_none());
    }

    #[test]
    fn test_cash_kind_has_no_payload() {
        let tx = CanonicalTransaction::cash(
            TransactionKind::CashDeposit,
            chrono::Utc::now(),
            "USD",
            dec!(100),
            SourceKey::native("dep"),
            "acct-1",
        );
        let result = ActivityPayload::from_transaction("acct-1", None, &tx);
        assert!(matches!(result, Err(GatewayError::BadRequest { .. })));
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let tx = sample_transaction();
        let payload = ActivityPayload::from_transaction("acct-1", None, &tx).unwrap();
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "BUY");
        assert!(value.get("accountId").is_some());
        assert!(value.get("unitPrice").is_some());
        assert!(value.get("dataSource").is_some());
        assert!(value.get("id").is_none());
    }
}
