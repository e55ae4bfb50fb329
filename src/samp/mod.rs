//! Thin SAMP standard-profile client for driving DS9.
//!
//! Only the surface the command layer needs: locate and register with the
//! hub, find the DS9 clients, send `ds9.get`/`ds9.set` messages with an
//! explicit per-call timeout, unregister. Message transport concerns such
//! as retries stay out; a failed send is reported, not re-attempted.
//!
//! Key items:
//!   Session::connect / get / set / close
//!   list_clients (hub-wide, no client targeting)
//!   SampError

pub mod xmlrpc;

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use self::xmlrpc::{Response, Value};

pub type Result<T> = std::result::Result<T, SampError>;

/// Failures raised by the hub client.
#[derive(Debug, Error)]
pub enum SampError {
    #[error("unable to find a running SAMP hub: {0}")]
    HubNotFound(String),

    #[error("invalid SAMP lockfile: {0}")]
    Lockfile(String),

    #[error("unable to talk to the SAMP hub at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("SAMP call failed (fault {code}): {message}")]
    Fault { code: i32, message: String },

    #[error("unexpected reply from the SAMP hub: {0}")]
    Protocol(String),

    #[error("DS9 returned an error: {0}")]
    Command(String),

    #[error("command timed out after {0} seconds")]
    Timeout(u64),

    #[error("no DS9 client is connected to the SAMP hub")]
    NoClient,

    #[error("multiple DS9 clients found ({0}); choose one with --name")]
    MultipleClients(String),

    #[error("no DS9 client called '{0}' in the SAMP hub")]
    UnknownClient(String),
}

/// Contents of the hub lockfile (standard profile).
#[derive(Debug)]
struct Lockfile {
    secret: String,
    url: Url,
}

impl Lockfile {
    /// `SAMP_HUB` (std-lockurl form) wins over `~/.samp`.
    fn locate() -> Result<PathBuf> {
        let Some(setting) = env::var_os("SAMP_HUB") else {
            return dirs::home_dir()
                .map(|home| home.join(".samp"))
                .ok_or_else(|| SampError::HubNotFound("cannot determine the home directory".into()));
        };

        let setting = setting.to_string_lossy().into_owned();
        let Some(lockurl) = setting.strip_prefix("std-lockurl:") else {
            return Err(SampError::HubNotFound(format!(
                "unsupported SAMP_HUB setting '{setting}'"
            )));
        };
        match Url::parse(lockurl) {
            Ok(url) if url.scheme() == "file" => url.to_file_path().map_err(|_| {
                SampError::HubNotFound(format!("lock-url '{lockurl}' is not a local path"))
            }),
            Ok(url) => Err(SampError::HubNotFound(format!(
                "only file lock-urls are supported, got '{url}'"
            ))),
            // Not a URL at all: take it as a plain path.
            Err(_) => Ok(PathBuf::from(lockurl)),
        }
    }

    fn load() -> Result<Lockfile> {
        let path = Self::locate()?;
        tracing::debug!(path = %path.display(), "reading SAMP lockfile");
        let text = fs::read_to_string(&path).map_err(|err| {
            SampError::HubNotFound(format!("cannot read lockfile {}: {err}", path.display()))
        })?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> Result<Lockfile> {
        let mut secret = None;
        let mut url = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "samp.secret" => secret = Some(value.trim().to_string()),
                "samp.hub.xmlrpc.url" => {
                    let parsed = Url::parse(value.trim()).map_err(|err| {
                        SampError::Lockfile(format!("bad samp.hub.xmlrpc.url: {err}"))
                    })?;
                    url = Some(parsed);
                }
                _ => {}
            }
        }
        Ok(Lockfile {
            secret: secret.ok_or_else(|| SampError::Lockfile("missing samp.secret".into()))?,
            url: url.ok_or_else(|| SampError::Lockfile("missing samp.hub.xmlrpc.url".into()))?,
        })
    }
}

/// A registered hub connection. Callers must end it with `unregister`.
struct Hub {
    http: reqwest::Client,
    url: Url,
    private_key: String,
}

impl Hub {
    async fn register() -> Result<Hub> {
        let lock = Lockfile::load()?;
        let http = reqwest::Client::builder().build().map_err(|err| {
            SampError::Transport {
                url: lock.url.to_string(),
                source: err,
            }
        })?;

        let reply = xmlrpc_call(
            &http,
            &lock.url,
            "samp.hub.register",
            vec![Value::str(lock.secret.as_str())],
        )
        .await?;
        let private_key = reply
            .get_str("samp.private-key")
            .ok_or_else(|| SampError::Protocol("registration reply lacks samp.private-key".into()))?
            .to_string();
        tracing::debug!(hub = %lock.url, "registered with SAMP hub");

        let hub = Hub {
            http,
            url: lock.url,
            private_key,
        };
        hub.declare_metadata().await?;
        Ok(hub)
    }

    /// Hub call with the private key as the implicit first argument.
    async fn call(&self, method: &str, mut params: Vec<Value>) -> Result<Value> {
        params.insert(0, Value::str(self.private_key.as_str()));
        xmlrpc_call(&self.http, &self.url, method, params).await
    }

    async fn declare_metadata(&self) -> Result<()> {
        let mut meta = BTreeMap::new();
        meta.insert("samp.name".to_string(), Value::str("ds9samp"));
        meta.insert(
            "samp.description.text".to_string(),
            Value::str("Command-line control of DS9"),
        );
        meta.insert(
            "ds9samp.version".to_string(),
            Value::str(env!("CARGO_PKG_VERSION")),
        );
        self.call("samp.hub.declareMetadata", vec![Value::Map(meta)])
            .await
            .map(drop)
    }

    async fn registered_clients(&self) -> Result<Vec<String>> {
        let reply = self
            .call("samp.hub.getRegisteredClients", Vec::new())
            .await?;
        let ids = reply
            .as_list()
            .ok_or_else(|| SampError::Protocol("client list reply is not an array".into()))?;
        ids.iter()
            .map(|id| {
                id.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SampError::Protocol("client id is not a string".into()))
            })
            .collect()
    }

    async fn client_name(&self, id: &str) -> Result<Option<String>> {
        let meta = self
            .call("samp.hub.getMetadata", vec![Value::str(id)])
            .await?;
        Ok(meta.get_str("samp.name").map(str::to_string))
    }

    /// Registered clients whose declared name is DS9, in hub order.
    async fn ds9_clients(&self) -> Result<Vec<String>> {
        let mut found = Vec::new();
        for id in self.registered_clients().await? {
            if let Some(name) = self.client_name(&id).await?
                && name.eq_ignore_ascii_case("ds9")
            {
                found.push(id);
            }
        }
        Ok(found)
    }

    /// Best-effort; a failed unregister only leaves a stale hub entry.
    async fn unregister(&self) {
        if let Err(err) = self.call("samp.hub.unregister", Vec::new()).await {
            tracing::debug!("hub unregister failed: {err}");
        }
    }
}

/// An active connection to one DS9 client via the hub.
pub struct Session {
    hub: Hub,
    client_id: String,
}

impl Session {
    /// Register with the hub and select the target DS9 client. The hub
    /// registration is released before any selection error is surfaced.
    pub async fn connect(client: Option<&str>) -> Result<Session> {
        let hub = Hub::register().await?;
        let selected = match hub.ds9_clients().await {
            Ok(clients) => choose_client(clients, client),
            Err(err) => Err(err),
        };
        match selected {
            Ok(client_id) => {
                tracing::debug!(%client_id, "session established");
                Ok(Session { hub, client_id })
            }
            Err(err) => {
                hub.unregister().await;
                Err(err)
            }
        }
    }

    /// Send a `ds9.get` and await the reply. An empty value is a valid
    /// no-content outcome, reported as `None`.
    pub async fn get(&self, command: &str, timeout: u64) -> Result<Option<String>> {
        let reply = self.call_and_wait("ds9.get", command, timeout).await?;
        let value = reply
            .get("samp.result")
            .and_then(|result| result.get_str("value"));
        Ok(match value {
            Some(text) if !text.is_empty() => Some(text.to_string()),
            _ => None,
        })
    }

    /// Send a `ds9.set`. The reply payload is discarded, but a `samp.error`
    /// status still surfaces as a failure.
    pub async fn set(&self, command: &str, timeout: u64) -> Result<()> {
        self.call_and_wait("ds9.set", command, timeout)
            .await
            .map(drop)
    }

    async fn call_and_wait(&self, mtype: &str, command: &str, timeout: u64) -> Result<Value> {
        tracing::debug!(%mtype, %command, timeout, "sending to DS9");
        let params = vec![
            Value::str(self.client_id.as_str()),
            command_message(mtype, command),
            Value::str(timeout.to_string()),
        ];
        let call = self.hub.call("samp.hub.callAndWait", params);

        // The hub-side timeout is authoritative; the local bound (with a
        // little grace) is a backstop against an unresponsive hub.
        let reply = if timeout > 0 {
            let grace = Duration::from_secs(timeout.saturating_add(5));
            match tokio::time::timeout(grace, call).await {
                Ok(reply) => reply?,
                Err(_) => return Err(SampError::Timeout(timeout)),
            }
        } else {
            call.await?
        };
        check_reply(reply)
    }

    /// Release the hub registration. Called on every exit path.
    pub async fn close(self) {
        self.hub.unregister().await;
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DS9 client {} via {}", self.client_id, self.hub.url)
    }
}

/// Hub-wide query for the DS9 client ids, in hub order. Registers for the
/// duration of the query only.
pub async fn list_clients() -> Result<Vec<String>> {
    let hub = Hub::register().await?;
    let clients = hub.ds9_clients().await;
    hub.unregister().await;
    clients
}

/// Pick the target client id from the discovered DS9 clients.
fn choose_client(clients: Vec<String>, requested: Option<&str>) -> Result<String> {
    match requested {
        Some(name) => clients
            .iter()
            .find(|id| id.as_str() == name)
            .cloned()
            .ok_or_else(|| SampError::UnknownClient(name.to_string())),
        None => match clients.as_slice() {
            [] => Err(SampError::NoClient),
            [only] => Ok(only.clone()),
            many => Err(SampError::MultipleClients(many.join(" "))),
        },
    }
}

/// Build the message map for a one-command mtype.
fn command_message(mtype: &str, command: &str) -> Value {
    let mut params = BTreeMap::new();
    params.insert("cmd".to_string(), Value::str(command));
    let mut message = BTreeMap::new();
    message.insert("samp.mtype".to_string(), Value::str(mtype));
    message.insert("samp.params".to_string(), Value::Map(params));
    Value::Map(message)
}

/// Turn a `callAndWait` reply into the result map, surfacing `samp.error`.
fn check_reply(reply: Value) -> Result<Value> {
    let status = reply
        .get_str("samp.status")
        .ok_or_else(|| SampError::Protocol("reply lacks samp.status".into()))?;
    match status {
        "samp.ok" => Ok(reply),
        "samp.warning" => {
            if let Some(text) = reply
                .get("samp.error")
                .and_then(|error| error.get_str("samp.errortxt"))
            {
                tracing::debug!("DS9 warning: {text}");
            }
            Ok(reply)
        }
        _ => {
            let text = reply
                .get("samp.error")
                .and_then(|error| error.get_str("samp.errortxt"))
                .unwrap_or("unknown error");
            Err(SampError::Command(text.to_string()))
        }
    }
}

async fn xmlrpc_call(
    http: &reqwest::Client,
    url: &Url,
    method: &str,
    params: Vec<Value>,
) -> Result<Value> {
    let transport = |source: reqwest::Error| SampError::Transport {
        url: url.to_string(),
        source,
    };

    tracing::trace!(%method, "hub call");
    let body = xmlrpc::request(method, &params);
    let response = http
        .post(url.clone())
        .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
        .body(body)
        .send()
        .await
        .map_err(transport)?
        .error_for_status()
        .map_err(transport)?;
    let text = response.text().await.map_err(transport)?;

    match xmlrpc::parse_response(&text).map_err(|err| SampError::Protocol(err.to_string()))? {
        Response::Success(value) => Ok(value),
        Response::Fault { code, message } => Err(SampError::Fault { code, message }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockfile_parse_skips_comments() {
        let lock = Lockfile::parse(
            "# SAMP lockfile written by ds9\n\
             \n\
             samp.secret=abc123\n\
             samp.hub.xmlrpc.url=http://127.0.0.1:41987/xmlrpc\n\
             samp.profile.version=1.3\n",
        )
        .unwrap();
        assert_eq!(lock.secret, "abc123");
        assert_eq!(lock.url.as_str(), "http://127.0.0.1:41987/xmlrpc");
    }

    #[test]
    fn lockfile_parse_requires_secret() {
        let err = Lockfile::parse("samp.hub.xmlrpc.url=http://127.0.0.1:1/\n").unwrap_err();
        assert!(err.to_string().contains("samp.secret"));
    }

    #[test]
    fn lockfile_parse_rejects_bad_url() {
        let err = Lockfile::parse("samp.secret=x\nsamp.hub.xmlrpc.url=not a url\n").unwrap_err();
        assert!(err.to_string().contains("samp.hub.xmlrpc.url"));
    }

    #[test]
    fn choose_client_prefers_requested_name() {
        let clients = vec!["c1".to_string(), "c56".to_string()];
        assert_eq!(choose_client(clients, Some("c56")).unwrap(), "c56");
    }

    #[test]
    fn choose_client_unknown_name() {
        let err = choose_client(vec!["c1".to_string()], Some("c9")).unwrap_err();
        assert!(matches!(err, SampError::UnknownClient(name) if name == "c9"));
    }

    #[test]
    fn choose_client_single() {
        assert_eq!(choose_client(vec!["c1".to_string()], None).unwrap(), "c1");
    }

    #[test]
    fn choose_client_none() {
        assert!(matches!(
            choose_client(Vec::new(), None),
            Err(SampError::NoClient)
        ));
    }

    #[test]
    fn choose_client_ambiguous() {
        let err = choose_client(vec!["c1".to_string(), "c2".to_string()], None).unwrap_err();
        assert!(matches!(err, SampError::MultipleClients(list) if list == "c1 c2"));
    }

    #[test]
    fn command_message_shape() {
        let msg = command_message("ds9.get", "scale");
        assert_eq!(msg.get_str("samp.mtype"), Some("ds9.get"));
        assert_eq!(
            msg.get("samp.params").and_then(|p| p.get_str("cmd")),
            Some("scale")
        );
    }

    fn reply(status: &str, errortxt: Option<&str>) -> Value {
        let mut map = BTreeMap::new();
        map.insert("samp.status".to_string(), Value::str(status));
        if let Some(text) = errortxt {
            let mut error = BTreeMap::new();
            error.insert("samp.errortxt".to_string(), Value::str(text));
            map.insert("samp.error".to_string(), Value::Map(error));
        }
        Value::Map(map)
    }

    #[test]
    fn check_reply_ok() {
        assert!(check_reply(reply("samp.ok", None)).is_ok());
    }

    #[test]
    fn check_reply_error_surfaces_text() {
        let err = check_reply(reply("samp.error", Some("unknown command"))).unwrap_err();
        assert!(matches!(err, SampError::Command(text) if text == "unknown command"));
    }

    #[test]
    fn check_reply_missing_status() {
        let err = check_reply(Value::Map(BTreeMap::new())).unwrap_err();
        assert!(matches!(err, SampError::Protocol(_)));
    }
}
