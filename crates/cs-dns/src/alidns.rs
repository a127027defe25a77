//! Alibaba Cloud DNS (API version 2015-01-09) client

use crate::error::{DnsError, DnsResult};
use crate::provider::DnsProvider;
use crate::records::{DnsRecord, RecordSelector};
use crate::signer;
use async_trait::async_trait;
use chrono::Utc;
use cs_common::DnsCredentials;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://alidns.cn-hangzhou.aliyuncs.com";
const API_VERSION: &str = "2015-01-09";
const PAGE_SIZE: u32 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeRecordsResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    domain_records: Option<RecordList>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordList {
    #[serde(default)]
    record: Vec<RecordDto>,
}

#[derive(Debug, Deserialize)]
struct RecordDto {
    #[serde(rename = "RecordId")]
    record_id: String,
    #[serde(rename = "RR")]
    rr: String,
    #[serde(rename = "Type")]
    record_type: String,
    #[serde(rename = "Value", default)]
    value: String,
    #[serde(rename = "Status", default)]
    status: String,
}

impl From<RecordDto> for DnsRecord {
    fn from(dto: RecordDto) -> Self {
        Self {
            id: dto.record_id,
            host_prefix: dto.rr,
            record_type: dto.record_type,
            value: dto.value,
            enabled: !dto.status.eq_ignore_ascii_case("DISABLE"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordIdResponse {
    record_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// What [`AliDnsClient::upsert_record`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upserted {
    Updated(String),
    Created(String),
    /// No match and creation was not allowed
    Missing,
}

/// Desired state of a single host record for [`AliDnsClient::upsert_record`]
#[derive(Debug, Clone)]
pub struct RecordUpsert {
    pub domain: String,
    pub rr: String,
    pub record_type: String,
    pub value: String,
    pub ttl: Option<u32>,
    /// MX priority, ignored for other types
    pub priority: Option<u32>,
    pub line: Option<String>,
}

impl RecordUpsert {
    fn apply_to(&self, params: &mut BTreeMap<String, String>) {
        params.insert("RR".into(), self.rr.clone());
        params.insert("Type".into(), self.record_type.clone());
        params.insert("Value".into(), self.value.clone());
        if let Some(ttl) = self.ttl.filter(|t| *t > 0) {
            params.insert("TTL".into(), ttl.to_string());
        }
        if let Some(priority) = self.priority.filter(|p| *p > 0) {
            params.insert("Priority".into(), priority.to_string());
        }
        if let Some(line) = self.line.as_ref().filter(|l| !l.is_empty()) {
            params.insert("Line".into(), line.clone());
        }
    }
}

/// Signed RPC client for the Alibaba Cloud DNS API
pub struct AliDnsClient {
    http: reqwest::Client,
    endpoint: String,
    credentials: DnsCredentials,
}

impl AliDnsClient {
    pub fn new(credentials: DnsCredentials, timeout: Option<Duration>) -> DnsResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credentials,
        })
    }

    /// Point the client at another endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn common_params(&self, action: &str) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("Action".into(), action.to_string());
        params.insert("Format".into(), "JSON".into());
        params.insert("Version".into(), API_VERSION.into());
        params.insert("AccessKeyId".into(), self.credentials.access_key_id.clone());
        params.insert("SignatureMethod".into(), "HMAC-SHA1".into());
        params.insert("SignatureVersion".into(), "1.0".into());
        params.insert("SignatureNonce".into(), uuid::Uuid::new_v4().to_string());
        params.insert(
            "Timestamp".into(),
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );
        params
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        extra: BTreeMap<String, String>,
    ) -> DnsResult<T> {
        let mut params = self.common_params(action);
        params.extend(extra);

        let query = signer::signed_query("GET", &params, &self.credentials.access_key_secret);
        let url = format!("{}/?{}", self.endpoint, query);

        debug!(action, "Calling Alibaba Cloud DNS API");

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let err: ApiErrorBody = serde_json::from_str(&body).unwrap_or(ApiErrorBody {
                code: String::new(),
                message: body.clone(),
            });
            return Err(DnsError::Api {
                status: status.as_u16(),
                code: err.code,
                message: err.message,
            });
        }

        serde_json::from_str(&body).map_err(|e| DnsError::Decode(format!("{}: {}", action, e)))
    }

    /// One page of `DescribeDomainRecords`, optionally narrowed by keyword
    async fn describe_page(
        &self,
        domain: &str,
        page: u32,
        rr_keyword: Option<&str>,
        type_keyword: Option<&str>,
    ) -> DnsResult<DescribeRecordsResponse> {
        let mut params = BTreeMap::new();
        params.insert("DomainName".into(), domain.to_string());
        params.insert("PageNumber".into(), page.to_string());
        params.insert("PageSize".into(), PAGE_SIZE.to_string());
        if let Some(rr) = rr_keyword.filter(|s| !s.is_empty()) {
            params.insert("RRKeyWord".into(), rr.to_string());
        }
        if let Some(t) = type_keyword.filter(|s| !s.is_empty()) {
            params.insert("TypeKeyWord".into(), t.to_string());
        }
        self.call("DescribeDomainRecords", params).await
    }

    async fn describe_all(
        &self,
        domain: &str,
        rr_keyword: Option<&str>,
        type_keyword: Option<&str>,
    ) -> DnsResult<Vec<DnsRecord>> {
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let resp = self
                .describe_page(domain, page, rr_keyword, type_keyword)
                .await?;
            let batch = resp.domain_records.unwrap_or_default().record;
            let fetched = batch.len();
            records.extend(batch.into_iter().map(DnsRecord::from));

            if fetched == 0 || records.len() as u64 >= resp.total_count {
                break;
            }
            page += 1;
        }
        Ok(records)
    }

    /// Id of the record exactly matching `rr` and `record_type`, if any
    pub async fn find_record_id(
        &self,
        domain: &str,
        rr: &str,
        record_type: &str,
    ) -> DnsResult<Option<String>> {
        let records = self
            .describe_all(domain, Some(rr), Some(record_type))
            .await?;
        let selector = RecordSelector::new(rr).with_type(Some(record_type.to_string()));
        Ok(selector.filter(&records).first().map(|r| r.id.clone()))
    }

    pub async fn add_record(&self, record: &RecordUpsert) -> DnsResult<String> {
        let mut params = BTreeMap::new();
        params.insert("DomainName".into(), record.domain.clone());
        record.apply_to(&mut params);
        let resp: RecordIdResponse = self.call("AddDomainRecord", params).await?;
        info!(rr = %record.rr, domain = %record.domain, record_id = %resp.record_id, "Created DNS record");
        Ok(resp.record_id)
    }

    pub async fn update_record(&self, record_id: &str, record: &RecordUpsert) -> DnsResult<()> {
        let mut params = BTreeMap::new();
        params.insert("RecordId".into(), record_id.to_string());
        record.apply_to(&mut params);
        let _: RecordIdResponse = self.call("UpdateDomainRecord", params).await?;
        info!(rr = %record.rr, domain = %record.domain, record_id, "Updated DNS record");
        Ok(())
    }

    /// Update the matching record, or create it when `create_if_missing`
    pub async fn upsert_record(
        &self,
        record: &RecordUpsert,
        create_if_missing: bool,
    ) -> DnsResult<Upserted> {
        match self
            .find_record_id(&record.domain, &record.rr, &record.record_type)
            .await?
        {
            Some(id) => {
                self.update_record(&id, record).await?;
                Ok(Upserted::Updated(id))
            }
            None if create_if_missing => self.add_record(record).await.map(Upserted::Created),
            None => Ok(Upserted::Missing),
        }
    }
}

#[async_trait]
impl DnsProvider for AliDnsClient {
    fn name(&self) -> &'static str {
        "alidns"
    }

    async fn list_records(&self, domain: &str) -> DnsResult<Vec<DnsRecord>> {
        let records = self.describe_all(domain, None, None).await?;
        debug!(domain, count = records.len(), "Listed DNS records");
        Ok(records)
    }

    async fn set_record_enabled(&self, record_id: &str, enabled: bool) -> DnsResult<()> {
        let mut params = BTreeMap::new();
        params.insert("RecordId".into(), record_id.to_string());
        params.insert(
            "Status".into(),
            if enabled { "ENABLE" } else { "DISABLE" }.to_string(),
        );
        let _: serde_json::Value = self.call("SetDomainRecordStatus", params).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AliDnsClient {
        let creds = DnsCredentials {
            access_key_id: "testid".into(),
            access_key_secret: "testsecret".into(),
        };
        AliDnsClient::new(creds, Some(Duration::from_secs(5)))
            .unwrap()
            .with_endpoint(server.uri())
    }

    fn record_json(id: &str, rr: &str, status: &str) -> serde_json::Value {
        json!({
            "RecordId": id,
            "RR": rr,
            "Type": "A",
            "Value": "1.2.3.4",
            "Status": status,
            "DomainName": "example.com",
            "TTL": 600,
            "Line": "default"
        })
    }

    #[tokio::test]
    async fn test_list_records_parses_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("Action", "DescribeDomainRecords"))
            .and(query_param("DomainName", "example.com"))
            .and(query_param("AccessKeyId", "testid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "TotalCount": 2,
                "PageNumber": 1,
                "PageSize": 500,
                "DomainRecords": {
                    "Record": [record_json("1", "a", "ENABLE"), record_json("2", "b", "DISABLE")]
                }
            })))
            .mount(&server)
            .await;

        let records = client(&server).list_records("example.com").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].host_prefix, "a");
        assert!(records[0].enabled);
        assert!(!records[1].enabled);
    }

    #[tokio::test]
    async fn test_list_records_follows_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("PageNumber", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "TotalCount": 2,
                "DomainRecords": { "Record": [record_json("1", "a", "ENABLE")] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("PageNumber", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "TotalCount": 2,
                "DomainRecords": { "Record": [record_json("2", "b", "ENABLE")] }
            })))
            .mount(&server)
            .await;

        let records = client(&server).list_records("example.com").await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_set_record_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("Action", "SetDomainRecordStatus"))
            .and(query_param("RecordId", "42"))
            .and(query_param("Status", "DISABLE"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"RequestId": "r", "Status": "DISABLE"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        client(&server).set_record_enabled("42", false).await.unwrap();
    }

    #[tokio::test]
    async fn test_api_error_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "RequestId": "r",
                "Code": "InvalidAccessKeyId.NotFound",
                "Message": "Specified access key is not found."
            })))
            .mount(&server)
            .await;

        let err = client(&server).list_records("example.com").await.unwrap_err();
        match err {
            DnsError::Api { status, code, .. } => {
                assert_eq!(status, 404);
                assert_eq!(code, "InvalidAccessKeyId.NotFound");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_record() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("Action", "DescribeDomainRecords"))
            .and(query_param("RRKeyWord", "www"))
            .and(query_param("TypeKeyWord", "A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "TotalCount": 2,
                "DomainRecords": {
                    "Record": [record_json("7", "www2", "ENABLE"), record_json("8", "WWW", "ENABLE")]
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("Action", "UpdateDomainRecord"))
            .and(query_param("RecordId", "8"))
            .and(query_param("Value", "5.6.7.8"))
            .and(query_param("TTL", "600"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"RecordId": "8", "RequestId": "r"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let upsert = RecordUpsert {
            domain: "example.com".into(),
            rr: "www".into(),
            record_type: "A".into(),
            value: "5.6.7.8".into(),
            ttl: Some(600),
            priority: None,
            line: Some("default".into()),
        };
        let outcome = client(&server).upsert_record(&upsert, true).await.unwrap();
        assert_eq!(outcome, Upserted::Updated("8".into()));
    }

    #[tokio::test]
    async fn test_upsert_without_create_reports_missing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("Action", "DescribeDomainRecords"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "TotalCount": 0,
                "DomainRecords": { "Record": [] }
            })))
            .mount(&server)
            .await;

        let upsert = RecordUpsert {
            domain: "example.com".into(),
            rr: "new".into(),
            record_type: "A".into(),
            value: "5.6.7.8".into(),
            ttl: None,
            priority: None,
            line: None,
        };
        let outcome = client(&server).upsert_record(&upsert, false).await.unwrap();
        assert_eq!(outcome, Upserted::Missing);
    }
}
