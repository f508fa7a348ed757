//! REST-interface client.
//!
//! The console's REST interface serves quick-property documents as JSON
//! and manages sessions through a logon exchange. [`HmcRestClient`] is the
//! reqwest-backed implementation; [`ScriptedRest`] is the test fake.
//!
//! Sessions are acquired lazily on first use and must be released with
//! [`ManagementRest::close`] on every exit path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::TransportError;

/// REST handle onto the management console.
#[async_trait]
pub trait ManagementRest: Send + Sync {
    /// Resolve a managed system by name to its id and quick document.
    async fn lookup_system(&self, name: &str) -> Result<Option<(String, Value)>, TransportError>;

    /// Quick summary document for a managed system.
    async fn system_summary(&self, id: &str) -> Result<Value, TransportError>;

    /// Performance/capacity monitoring preferences for a managed system.
    async fn pcm_preferences(&self, id: &str) -> Result<Value, TransportError>;

    /// Toggle PCM metric groups. Returns the updated preference document,
    /// or `None` when the console reports nothing changed.
    async fn update_pcm(
        &self,
        id: &str,
        metrics: &[String],
        disable: bool,
    ) -> Result<Option<Value>, TransportError>;

    /// Quick documents of all service partitions under a managed system.
    async fn vios_quick_all(&self, system_id: &str) -> Result<Value, TransportError>;

    /// Quick document for one service partition.
    async fn vios_quick(&self, vios_id: &str) -> Result<Value, TransportError>;

    /// Virtual optical media attached to a service partition.
    async fn vios_optical_media(&self, vios_id: &str) -> Result<Value, TransportError>;

    /// Physical volumes not assigned to any partition.
    async fn free_physical_volumes(&self, vios_id: &str) -> Result<Vec<Value>, TransportError>;

    /// Release the session. Safe to call more than once.
    async fn close(&self) -> Result<(), TransportError>;
}

/// reqwest-backed REST client.
pub struct HmcRestClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    session: Mutex<Option<String>>,
}

const SESSION_HEADER: &str = "X-API-Session";

impl HmcRestClient {
    /// Create a client for `https://<host>:12443`.
    ///
    /// The console serves a self-signed certificate, so verification is
    /// disabled the same way the console's own tooling does.
    pub fn new(
        host: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, TransportError> {
        Self::with_base_url(format!("https://{host}:12443"), username, password)
    }

    /// Create a client against an explicit base URL (tests point this at a
    /// local mock server).
    pub fn with_base_url(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            session: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log on if no session is held yet and return the session token.
    async fn ensure_session(&self) -> Result<String, TransportError> {
        let mut session = self.session.lock().await;
        if let Some(token) = session.as_ref() {
            return Ok(token.clone());
        }

        debug!(base_url = %self.base_url, "opening console REST session");
        let body = format!(
            concat!(
                "<LogonRequest xmlns=\"http://www.ibm.com/xmlns/systems/power/firmware/web/mc/2012_10/\" schemaVersion=\"V1_0\">",
                "<UserID>{}</UserID><Password>{}</Password></LogonRequest>"
            ),
            self.username, self.password
        );

        let response = self
            .http
            .put(self.url("/rest/api/web/Logon"))
            .header("Content-Type", "application/vnd.ibm.powervm.web+xml")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let token = extract_tag(&text, SESSION_HEADER).ok_or_else(|| {
            TransportError::Malformed("logon response carried no session token".to_string())
        })?;
        *session = Some(token.clone());
        Ok(token)
    }

    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let token = self.ensure_session().await?;
        let response = self
            .http
            .get(self.url(path))
            .header(SESSION_HEADER, token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(TransportError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Pull `<tag>value</tag>` out of a small XML body.
///
/// The logon exchange is the only XML this client touches; everything else
/// is JSON.
fn extract_tag(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let start = body.find(&open)?;
    let value_start = body[start..].find('>')? + start + 1;
    let value_end = body[value_start..].find(&close)? + value_start;
    Some(body[value_start..value_end].trim().to_string())
}

#[async_trait]
impl ManagementRest for HmcRestClient {
    async fn lookup_system(&self, name: &str) -> Result<Option<(String, Value)>, TransportError> {
        let all = self.get_json("/rest/api/uom/ManagedSystem/quick/All").await?;
        let systems = all.as_array().ok_or_else(|| {
            TransportError::Malformed("managed system listing is not an array".to_string())
        })?;

        for system in systems {
            if system.get("SystemName").and_then(Value::as_str) == Some(name) {
                let id = system
                    .get("UUID")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        TransportError::Malformed("managed system record has no UUID".to_string())
                    })?
                    .to_string();
                return Ok(Some((id, system.clone())));
            }
        }
        Ok(None)
    }

    async fn system_summary(&self, id: &str) -> Result<Value, TransportError> {
        self.get_json(&format!("/rest/api/uom/ManagedSystem/{id}/quick"))
            .await
    }

    async fn pcm_preferences(&self, id: &str) -> Result<Value, TransportError> {
        self.get_json(&format!("/rest/api/pcm/ManagedSystem/{id}/preferences"))
            .await
    }

    async fn update_pcm(
        &self,
        id: &str,
        metrics: &[String],
        disable: bool,
    ) -> Result<Option<Value>, TransportError> {
        let token = self.ensure_session().await?;
        let body = serde_json::json!({
            "metrics": metrics,
            "disabled": disable,
        });

        let response = self
            .http
            .put(self.url(&format!("/rest/api/pcm/ManagedSystem/{id}/preferences")))
            .header(SESSION_HEADER, token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 204 {
            return Ok(None);
        }
        if status.is_success() {
            Ok(Some(response.json().await?))
        } else {
            Err(TransportError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }

    async fn vios_quick_all(&self, system_id: &str) -> Result<Value, TransportError> {
        self.get_json(&format!(
            "/rest/api/uom/ManagedSystem/{system_id}/VirtualIOServer/quick/All"
        ))
        .await
    }

    async fn vios_quick(&self, vios_id: &str) -> Result<Value, TransportError> {
        self.get_json(&format!("/rest/api/uom/VirtualIOServer/{vios_id}/quick"))
            .await
    }

    async fn vios_optical_media(&self, vios_id: &str) -> Result<Value, TransportError> {
        self.get_json(&format!(
            "/rest/api/uom/VirtualIOServer/{vios_id}/MediaRepository/quick"
        ))
        .await
    }

    async fn free_physical_volumes(&self, vios_id: &str) -> Result<Vec<Value>, TransportError> {
        let value = self
            .get_json(&format!(
                "/rest/api/uom/VirtualIOServer/{vios_id}/FreePhysicalVolumes/quick"
            ))
            .await?;
        value
            .as_array()
            .cloned()
            .ok_or_else(|| TransportError::Malformed("free volume listing is not an array".to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut session = self.session.lock().await;
        let Some(token) = session.take() else {
            return Ok(());
        };

        let response = self
            .http
            .delete(self.url("/rest/api/web/Logon"))
            .header(SESSION_HEADER, token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Scripted REST fake for tests.
#[derive(Default)]
pub struct ScriptedRest {
    systems: StdMutex<BTreeMap<String, (String, Value)>>,
    summaries: StdMutex<BTreeMap<String, Value>>,
    pcm: StdMutex<BTreeMap<String, Value>>,
    vios_lists: StdMutex<BTreeMap<String, Value>>,
    vios_docs: StdMutex<BTreeMap<String, Value>>,
    optical: StdMutex<BTreeMap<String, Value>>,
    free_pvs: StdMutex<BTreeMap<String, Vec<Value>>>,
    pcm_updates: StdMutex<Vec<(String, Vec<String>, bool)>>,
    closed: AtomicBool,
    fail_close: AtomicBool,
    fail_free_pvs: AtomicBool,
}

impl ScriptedRest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(self, name: &str, id: &str, doc: Value) -> Self {
        self.systems
            .lock()
            .unwrap()
            .insert(name.to_string(), (id.to_string(), doc));
        self
    }

    pub fn with_summary(self, id: &str, doc: Value) -> Self {
        self.summaries.lock().unwrap().insert(id.to_string(), doc);
        self
    }

    pub fn with_pcm(self, id: &str, doc: Value) -> Self {
        self.pcm.lock().unwrap().insert(id.to_string(), doc);
        self
    }

    pub fn with_vios_list(self, system_id: &str, doc: Value) -> Self {
        self.vios_lists
            .lock()
            .unwrap()
            .insert(system_id.to_string(), doc);
        self
    }

    pub fn with_vios(self, vios_id: &str, doc: Value) -> Self {
        self.vios_docs
            .lock()
            .unwrap()
            .insert(vios_id.to_string(), doc);
        self
    }

    pub fn with_optical_media(self, vios_id: &str, doc: Value) -> Self {
        self.optical.lock().unwrap().insert(vios_id.to_string(), doc);
        self
    }

    pub fn with_free_pvs(self, vios_id: &str, pvs: Vec<Value>) -> Self {
        self.free_pvs
            .lock()
            .unwrap()
            .insert(vios_id.to_string(), pvs);
        self
    }

    /// Make `close` fail, for logoff-warning tests.
    pub fn failing_close(self) -> Self {
        self.fail_close.store(true, Ordering::SeqCst);
        self
    }

    /// Make the free-volume listing fail, for degraded-facts tests.
    pub fn failing_free_pvs(self) -> Self {
        self.fail_free_pvs.store(true, Ordering::SeqCst);
        self
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Recorded `update_pcm` calls: (system id, metrics, disable).
    pub fn pcm_updates(&self) -> Vec<(String, Vec<String>, bool)> {
        self.pcm_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManagementRest for ScriptedRest {
    async fn lookup_system(&self, name: &str) -> Result<Option<(String, Value)>, TransportError> {
        Ok(self.systems.lock().unwrap().get(name).cloned())
    }

    async fn system_summary(&self, id: &str) -> Result<Value, TransportError> {
        self.summaries
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| TransportError::Api {
                status: 404,
                message: format!("no summary for {id}"),
            })
    }

    async fn pcm_preferences(&self, id: &str) -> Result<Value, TransportError> {
        self.pcm
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| TransportError::Api {
                status: 404,
                message: format!("no PCM preferences for {id}"),
            })
    }

    async fn update_pcm(
        &self,
        id: &str,
        metrics: &[String],
        disable: bool,
    ) -> Result<Option<Value>, TransportError> {
        self.pcm_updates
            .lock()
            .unwrap()
            .push((id.to_string(), metrics.to_vec(), disable));
        Ok(self.pcm.lock().unwrap().get(id).cloned())
    }

    async fn vios_quick_all(&self, system_id: &str) -> Result<Value, TransportError> {
        Ok(self
            .vios_lists
            .lock()
            .unwrap()
            .get(system_id)
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }

    async fn vios_quick(&self, vios_id: &str) -> Result<Value, TransportError> {
        self.vios_docs
            .lock()
            .unwrap()
            .get(vios_id)
            .cloned()
            .ok_or_else(|| TransportError::Api {
                status: 404,
                message: format!("no quick document for {vios_id}"),
            })
    }

    async fn vios_optical_media(&self, vios_id: &str) -> Result<Value, TransportError> {
        Ok(self
            .optical
            .lock()
            .unwrap()
            .get(vios_id)
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }

    async fn free_physical_volumes(&self, vios_id: &str) -> Result<Vec<Value>, TransportError> {
        if self.fail_free_pvs.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                status: 500,
                message: "volume inventory unavailable".to_string(),
            });
        }
        Ok(self
            .free_pvs
            .lock()
            .unwrap()
            .get(vios_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            Err(TransportError::Session("logoff failed".to_string()))
        } else {
            Ok(())
        }
    }
}
