//! Audit record for one request/response cycle.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::Response;
use http_body::Body as HttpBody;
use serde::{Serialize, Serializer};

use super::headers::HeaderError;
use super::snapshot::MessageSnapshot;

/// Everything captured about one exchange.
///
/// The request side is filled in before the handler runs; the response
/// side and the timing are filled in by [`AuditRecord::complete`].
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub request_id: String,
    #[serde(serialize_with = "unix_millis")]
    pub time_started: SystemTime,
    #[serde(serialize_with = "opt_unix_millis")]
    pub time_finished: Option<SystemTime>,
    #[serde(rename = "time_in_millis", serialize_with = "duration_millis")]
    pub duration: Duration,
    /// Response status; 0 until the response is known.
    pub response_code: u16,
    pub request: MessageSnapshot,
    pub response: Option<MessageSnapshot>,
}

impl AuditRecord {
    pub fn new(request_id: String, time_started: SystemTime, request: MessageSnapshot) -> Self {
        Self {
            request_id,
            time_started,
            time_finished: None,
            duration: Duration::ZERO,
            response_code: 0,
            request,
            response: None,
        }
    }

    /// Record the handler's response and stamp the finish time.
    pub fn complete<B: HttpBody>(&mut self, response: &Response<B>) -> Result<(), HeaderError> {
        let snapshot = MessageSnapshot::from_response(response)?;
        self.finish(SystemTime::now(), response.status().as_u16(), Some(snapshot));
        Ok(())
    }

    /// Stamp the finish time. A finish time before the start (clock step)
    /// yields a zero duration.
    pub fn finish(&mut self, at: SystemTime, status: u16, response: Option<MessageSnapshot>) {
        self.time_finished = Some(at);
        self.duration = at.duration_since(self.time_started).unwrap_or_default();
        self.response_code = status;
        self.response = response;
    }
}

fn millis_since_epoch(t: &SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn unix_millis<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(millis_since_epoch(t))
}

fn opt_unix_millis<S: Serializer>(t: &Option<SystemTime>, s: S) -> Result<S::Ok, S::Error> {
    match t {
        Some(t) => s.serialize_some(&millis_since_epoch(t)),
        None => s.serialize_none(),
    }
}

fn duration_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::snapshot::MessageRole;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    async fn sample_record() -> AuditRecord {
        let mut req = Request::builder()
            .uri("/health")
            .header("host", "localhost:8080")
            .body(Body::empty())
            .unwrap();
        let snapshot = MessageSnapshot::from_request(&mut req).await.unwrap();
        AuditRecord::new("req-1".into(), SystemTime::now(), snapshot)
    }

    #[tokio::test]
    async fn test_complete_fills_response_side() {
        let mut record = sample_record().await;
        let res = Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(Body::empty())
            .unwrap();

        record.complete(&res).unwrap();
        assert_eq!(record.response_code, 204);
        assert!(record.time_finished.unwrap() >= record.time_started);
        assert_eq!(record.response.as_ref().unwrap().role, MessageRole::Response);
    }

    #[tokio::test]
    async fn test_duration_never_negative() {
        let mut record = sample_record().await;
        let earlier = record.time_started - Duration::from_secs(5);
        record.finish(earlier, 200, None);
        assert_eq!(record.duration, Duration::ZERO);

        let later = record.time_started + Duration::from_millis(1500);
        record.finish(later, 200, None);
        assert_eq!(record.duration, Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_serialized_field_names() {
        let record = sample_record().await;
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["request_id"], "req-1");
        assert_eq!(json["time_in_millis"], 0);
        assert_eq!(json["response_code"], 0);
        assert!(json["time_finished"].is_null());
        assert_eq!(json["request"]["request_method"], "GET");
        assert_eq!(json["request"]["port"], "8080");
    }
}
