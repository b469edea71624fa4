// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use juxta_app::{
    AddOnCatalog, Details, DetailsPayload, Payload, PayloadKind, PlanCatalog, SettingsCatalog,
};
use juxta_testkit::{PayloadFaker, entity_seed};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::thread;
use std::time::Duration;
use url::Url;

/// Entity name the demo source always reports as missing.
pub const DEMO_MISSING_ENTITY: &str = "error";

/// Anything that can produce payloads for an entity. Implementations are
/// called from worker threads.
pub trait PayloadSource: Send + Sync {
    fn fetch(&self, entity: &str, kind: PayloadKind) -> Result<Payload>;

    /// Short human-readable origin, shown in the status bar.
    fn describe(&self) -> String;
}

#[derive(Debug)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("source.base_url must not be empty -- set it in the config or run with --demo");
        }
        let base_url = Url::parse(trimmed)
            .with_context(|| format!("source.base_url {trimmed:?} is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "source.base_url must use http or https, got {}://",
                base_url.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URL of the endpoint serving `kind` for `entity`.
    pub fn endpoint(&self, entity: &str, kind: PayloadKind) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| anyhow!("source.base_url {} cannot carry a path", self.base_url))?;
            segments.pop_if_empty();
            match kind {
                PayloadKind::Details => {
                    segments.extend(["domain", "detail", ""]);
                }
                PayloadKind::Plans => {
                    segments.extend(["domain", "explore_plans", entity]);
                }
                PayloadKind::AddOns => {
                    segments.extend(["domain", "trial_items", entity]);
                }
                PayloadKind::Settings => {
                    segments.extend([
                        "settings_dashboard",
                        "context",
                        "domain",
                        "context_value",
                        entity,
                        "key",
                        "",
                    ]);
                }
            }
        }
        match kind {
            PayloadKind::Details => {
                url.query_pairs_mut().append_pair("domain", entity);
            }
            PayloadKind::Settings => {
                url.query_pairs_mut()
                    .append_pair("domain", entity)
                    .append_pair("hierarchy_type", "all");
            }
            PayloadKind::Plans | PayloadKind::AddOns => {}
        }
        Ok(url)
    }

    pub fn fetch_details(&self, entity: &str) -> Result<Details> {
        let payload: DetailsPayload = self.get_json(entity, PayloadKind::Details)?;
        Ok(payload.details)
    }

    pub fn fetch_plans(&self, entity: &str) -> Result<PlanCatalog> {
        self.get_json(entity, PayloadKind::Plans)
    }

    pub fn fetch_add_ons(&self, entity: &str) -> Result<AddOnCatalog> {
        self.get_json(entity, PayloadKind::AddOns)
    }

    pub fn fetch_settings(&self, entity: &str) -> Result<SettingsCatalog> {
        self.get_json(entity, PayloadKind::Settings)
    }

    fn get_json<T: DeserializeOwned>(&self, entity: &str, kind: PayloadKind) -> Result<T> {
        let url = self.endpoint(entity, kind)?;
        tracing::debug!(entity, kind = kind.as_str(), %url, "fetching payload");

        let response = self
            .http
            .get(url)
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(entity, kind = kind.as_str(), status = status.as_u16(), "fetch failed");
            return Err(error_response(self.base_url(), entity, status, &body));
        }

        decode(response, entity, kind)
    }
}

impl PayloadSource for Client {
    fn fetch(&self, entity: &str, kind: PayloadKind) -> Result<Payload> {
        Ok(match kind {
            PayloadKind::Details => Payload::Details(self.fetch_details(entity)?),
            PayloadKind::Plans => Payload::Plans(self.fetch_plans(entity)?),
            PayloadKind::AddOns => Payload::AddOns(self.fetch_add_ons(entity)?),
            PayloadKind::Settings => Payload::Settings(self.fetch_settings(entity)?),
        })
    }

    fn describe(&self) -> String {
        self.base_url().to_owned()
    }
}

/// Offline source backed by the payload faker. Payloads are stable for one
/// `salt` and vary across salts, so new sessions produce new versions.
#[derive(Debug, Clone)]
pub struct DemoSource {
    salt: u64,
    latency: Duration,
}

impl DemoSource {
    pub fn new(salt: u64) -> Self {
        Self {
            salt,
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn salt(&self) -> u64 {
        self.salt
    }

    fn faker(&self, entity: &str, kind: PayloadKind) -> PayloadFaker {
        let lane = PayloadKind::ALL
            .iter()
            .position(|candidate| *candidate == kind)
            .unwrap_or_default() as u64;
        PayloadFaker::new(entity_seed(entity) ^ self.salt ^ (lane << 56))
    }
}

impl PayloadSource for DemoSource {
    fn fetch(&self, entity: &str, kind: PayloadKind) -> Result<Payload> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        if kind == PayloadKind::Details && entity == DEMO_MISSING_ENTITY {
            bail!("{entity} not found -- check the entity name");
        }

        let mut faker = self.faker(entity, kind);
        Ok(match kind {
            PayloadKind::Details => Payload::Details(faker.details()),
            PayloadKind::Plans => Payload::Plans(faker.plan_catalog()),
            PayloadKind::AddOns => Payload::AddOns(faker.add_on_catalog()),
            PayloadKind::Settings => Payload::Settings(faker.settings_catalog()),
        })
    }

    fn describe(&self) -> String {
        "demo data".to_owned()
    }
}

fn decode<T: DeserializeOwned>(response: Response, entity: &str, kind: PayloadKind) -> Result<T> {
    let body = response
        .text()
        .with_context(|| format!("read {} response for {entity}", kind.as_str()))?;
    serde_json::from_str(&body)
        .with_context(|| format!("decode {} payload for {entity}", kind.as_str()))
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check source.base_url or run with --demo ({})",
        base_url,
        error
    )
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn error_response(base_url: &str, entity: &str, status: StatusCode, body: &str) -> anyhow::Error {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!("not logged in -- sign in at {base_url} and retry");
    }
    if status == StatusCode::NOT_FOUND {
        return anyhow!("{entity} not found -- check the entity name");
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.message.or(parsed.error)
        && !message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    if !body.is_empty() && body.len() < 100 && !body.contains('<') {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}
