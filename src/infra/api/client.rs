use std::time::Instant;

use kami_api_types::{
    Aggregate, AggregateTop, CategoryDetail, Link, Note, Paginated, Post, Timeline, Topic,
};
use metrics::{counter, histogram};
use reqwest::{
    Client, StatusCode, Url,
    header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::ApiSettings, i18n::Locale, infra::error::InfraError};

use super::error::RequestError;

const UUID_HEADER: HeaderName = HeaderName::from_static("x-uuid");
const LANG_HEADER: HeaderName = HeaderName::from_static("x-lang");
/// `lang` value asking for the untranslated original.
const ORIGINAL_LANG: &str = "original";

/// Which half of the timeline to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineKind {
    Post,
    Note,
}

impl TimelineKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "post" => Some(Self::Post),
            "note" => Some(Self::Note),
            _ => None,
        }
    }

    fn as_query(self) -> &'static str {
        match self {
            Self::Post => "0",
            Self::Note => "1",
        }
    }
}

/// Client for the mx-space content API.
///
/// Cheap to clone. The locale sent as `x-lang` is bound per request context
/// through [`ApiClient::with_locale`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    token: Option<String>,
    instance_id: Uuid,
    locale: Option<Locale>,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, InfraError> {
        let http = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            http,
            base: settings.base_url.clone(),
            token: settings.token.clone(),
            instance_id: Uuid::new_v4(),
            locale: None,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("kami/", env!("CARGO_PKG_VERSION"))
    }

    /// A client whose requests carry `locale` as `x-lang`.
    pub fn with_locale(&self, locale: &Locale) -> Self {
        Self {
            locale: Some(locale.clone()),
            ..self.clone()
        }
    }

    pub fn locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Endpoint URL under the base; each segment is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, RequestError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| RequestError::Transport(format!("base url `{}` cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.token.as_deref()
            && let Ok(value) = HeaderValue::from_str(token)
        {
            headers.insert(AUTHORIZATION, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.instance_id.to_string()) {
            headers.insert(UUID_HEADER, value);
        }
        if let Some(locale) = self.locale.as_ref()
            && let Ok(value) = HeaderValue::from_str(locale.as_str())
        {
            headers.insert(LANG_HEADER, value);
        }
        headers
    }

    /// GET an endpoint and return the undecoded JSON body.
    pub async fn get_json(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Value, RequestError> {
        let mut url = self.endpoint(segments)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let start = Instant::now();
        let path = url.path().to_string();
        let response = self
            .http
            .get(url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|err| self.record_failure(&path, RequestError::from(err)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.record_failure(&path, RequestError::from(err)))?;

        let elapsed = start.elapsed();
        histogram!("kami_api_request_ms").record(elapsed.as_secs_f64() * 1000.0);
        debug!(
            target = "kami::api::client",
            path = %path,
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "content api request completed"
        );

        if !status.is_success() {
            return Err(self.record_failure(&path, RequestError::from_status(status.as_u16(), &bytes)));
        }
        if status == StatusCode::NO_CONTENT || bytes.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes)
            .map_err(|err| self.record_failure(&path, RequestError::Decode(err.to_string())))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, RequestError> {
        let value = self.get_json(segments, query).await?;
        decode(value)
    }

    fn record_failure(&self, path: &str, err: RequestError) -> RequestError {
        let status = err
            .status()
            .map(|status| status.to_string())
            .unwrap_or_else(|| "none".to_string());
        counter!("kami_api_request_failed_total", "status" => status).increment(1);
        if !err.is_unauthorized() {
            warn!(
                target = "kami::api::client",
                path = %path,
                error = %err,
                "content api request failed"
            );
        }
        err
    }

    pub async fn aggregate(&self) -> Result<Aggregate, RequestError> {
        self.get(&["aggregate"], &[]).await
    }

    pub async fn aggregate_top(&self, size: Option<u32>) -> Result<AggregateTop, RequestError> {
        let query: Vec<_> = size.map(|size| ("size", size.to_string())).into_iter().collect();
        self.get(&["aggregate", "top"], &query).await
    }

    pub async fn timeline(
        &self,
        kind: Option<TimelineKind>,
        year: Option<i32>,
    ) -> Result<Timeline, RequestError> {
        let mut query = Vec::new();
        if let Some(kind) = kind {
            query.push(("type", kind.as_query().to_string()));
        }
        if let Some(year) = year {
            query.push(("year", year.to_string()));
        }
        let value = self.get_json(&["aggregate", "timeline"], &query).await?;
        decode(unwrap_data(value))
    }

    pub async fn posts(
        &self,
        page: u32,
        size: u32,
        year: Option<i32>,
        lang: Option<&str>,
    ) -> Result<Paginated<Post>, RequestError> {
        let mut query = page_query(page, size);
        if let Some(year) = year {
            query.push(("year", year.to_string()));
        }
        query.extend(lang_query(lang));
        self.get(&["posts"], &query).await
    }

    pub async fn post_by_slug(
        &self,
        category: &str,
        slug: &str,
        lang: Option<&str>,
    ) -> Result<Value, RequestError> {
        self.get_json(&["posts", category, slug], &lang_query(lang))
            .await
    }

    pub async fn post_by_id(&self, id: &str) -> Result<Value, RequestError> {
        self.get_json(&["posts", id], &[]).await
    }

    pub async fn notes(&self, page: u32, size: u32) -> Result<Paginated<Note>, RequestError> {
        self.get(&["notes"], &page_query(page, size)).await
    }

    pub async fn note_by_id(&self, id: &str, password: Option<&str>) -> Result<Value, RequestError> {
        let query: Vec<_> = password
            .map(|password| ("password", password.to_string()))
            .into_iter()
            .collect();
        self.get_json(&["notes", id], &query).await
    }

    /// `{ data, prev, next }` for the note with numeric id `nid`.
    pub async fn note_by_nid(
        &self,
        nid: u64,
        password: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Value, RequestError> {
        let mut query = lang_query(lang);
        if let Some(password) = password {
            query.push(("password", password.to_string()));
        }
        self.get_json(&["notes", "nid", &nid.to_string()], &query)
            .await
    }

    /// `{ data, next }` for the most recent note.
    pub async fn latest_note(&self) -> Result<Value, RequestError> {
        self.get_json(&["notes", "latest"], &[]).await
    }

    pub async fn notes_by_topic(
        &self,
        topic_id: &str,
        page: u32,
        size: u32,
        lang: Option<&str>,
    ) -> Result<Paginated<Note>, RequestError> {
        let mut query = page_query(page, size);
        query.extend(lang_query(lang));
        self.get(&["notes", "topics", topic_id], &query).await
    }

    pub async fn page_by_slug(&self, slug: &str) -> Result<Value, RequestError> {
        self.get_json(&["pages", "slug", slug], &[]).await
    }

    pub async fn project(&self, id: &str) -> Result<Value, RequestError> {
        self.get_json(&["projects", id], &[]).await
    }

    pub async fn topics(&self) -> Result<Vec<Topic>, RequestError> {
        let value = self.get_json(&["topics"], &[]).await?;
        match value {
            Value::Array(_) => decode(value),
            other => decode::<Paginated<Topic>>(other).map(|page| page.data),
        }
    }

    pub async fn topic_by_slug(&self, slug: &str) -> Result<Value, RequestError> {
        self.get_json(&["topics", "slug", slug], &[]).await
    }

    pub async fn category(&self, slug: &str) -> Result<CategoryDetail, RequestError> {
        let value = self.get_json(&["categories", slug], &[]).await?;
        decode(unwrap_data(value))
    }

    pub async fn links(&self, page: u32, size: u32) -> Result<Paginated<Link>, RequestError> {
        self.get(&["links"], &page_query(page, size)).await
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, RequestError> {
    serde_json::from_value(value).map_err(|err| RequestError::Decode(err.to_string()))
}

/// Unwrap a `{ "data": { .. } }` envelope; lists keep their envelope.
pub(crate) fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn page_query(page: u32, size: u32) -> Vec<(&'static str, String)> {
    vec![("page", page.max(1).to_string()), ("size", size.to_string())]
}

fn lang_query(lang: Option<&str>) -> Vec<(&'static str, String)> {
    lang.filter(|lang| !lang.is_empty() && *lang != ORIGINAL_LANG)
        .map(|lang| ("lang", lang.to_string()))
        .into_iter()
        .collect()
}
