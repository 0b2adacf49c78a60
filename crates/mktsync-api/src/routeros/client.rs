// RouterOS API client
//
// One TCP session per device. Every call is a blocking request/response
// exchange: write one sentence, read replies until `!done`. Each read is
// bounded by the configured timeout.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use super::codec::{Sentence, SentenceCodec};
use super::{Record, Reply};
use crate::error::Error;

/// Rows and closing attributes of one command.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// One entry per `!re` sentence.
    pub rows: Vec<Record>,
    /// Attributes of the `!done` sentence (e.g. `ret`).
    pub done: Record,
}

/// An authenticated API session with one RouterOS device.
pub struct RouterOsClient {
    framed: Framed<TcpStream, SentenceCodec>,
    host: String,
    timeout: Duration,
}

impl RouterOsClient {
    /// Open a TCP session to `host:port` and log in.
    ///
    /// Uses the post-6.43 plaintext login (`/login =name= =password=`).
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        password: &SecretString,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let addr = format!("{host}:{port}");
        debug!(%addr, "connecting to RouterOS API");

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Connect {
                host: addr.clone(),
                reason: format!("timed out after {}s", timeout.as_secs()),
            })?
            .map_err(|e| Error::Connect {
                host: addr.clone(),
                reason: e.to_string(),
            })?;

        let mut client = Self::from_stream(stream, host, timeout);
        client.login(username, password).await?;
        debug!(host, "RouterOS login successful");
        Ok(client)
    }

    /// Wrap an already-connected stream without logging in.
    pub fn from_stream(stream: TcpStream, host: &str, timeout: Duration) -> Self {
        Self {
            framed: Framed::new(stream, SentenceCodec::new()),
            host: host.to_owned(),
            timeout,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn login(&mut self, username: &str, password: &SecretString) -> Result<(), Error> {
        let words = vec![
            "/login".to_owned(),
            format!("=name={username}"),
            format!("=password={}", password.expose_secret()),
        ];
        match self.query(words).await {
            Ok(_) => Ok(()),
            Err(Error::Trap { message, .. }) => Err(Error::Authentication { message }),
            Err(e) => Err(e),
        }
    }

    // ── Section operations ──────────────────────────────────────────

    /// `{section}/print`, restricted to `.id` plus `proplist` when non-empty.
    pub async fn print(&mut self, section: &str, proplist: &[&str]) -> Result<Vec<Record>, Error> {
        let mut words = vec![format!("{section}/print")];
        if !proplist.is_empty() {
            words.push(format!("=.proplist=.id,{}", proplist.join(",")));
        }
        Ok(self.query(words).await?.rows)
    }

    /// `{section}/print ?{key}={value}`
    pub async fn print_where(
        &mut self,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<Record>, Error> {
        let words = vec![format!("{section}/print"), format!("?{key}={value}")];
        Ok(self.query(words).await?.rows)
    }

    /// `{section}/add` with one `=key=value` word per attribute.
    ///
    /// Returns the id of the new item when the device reports one.
    pub async fn add(
        &mut self,
        section: &str,
        attrs: &[(String, String)],
    ) -> Result<Option<String>, Error> {
        let mut words = vec![format!("{section}/add")];
        words.extend(attrs.iter().map(|(k, v)| format!("={k}={v}")));
        let mut response = self.query(words).await?;
        Ok(response.done.remove("ret"))
    }

    /// `{section}/set =.id={id}` with one `=key=value` word per attribute.
    pub async fn set(
        &mut self,
        section: &str,
        id: &str,
        attrs: &[(String, String)],
    ) -> Result<(), Error> {
        let mut words = vec![format!("{section}/set"), format!("=.id={id}")];
        words.extend(attrs.iter().map(|(k, v)| format!("={k}={v}")));
        self.query(words).await?;
        Ok(())
    }

    /// `{section}/remove =.id=id1,id2,...`
    pub async fn remove(&mut self, section: &str, ids: &[String]) -> Result<Vec<Record>, Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let words = vec![format!("{section}/remove"), format!("=.id={}", ids.join(","))];
        Ok(self.query(words).await?.rows)
    }

    // ── Raw exchange ─────────────────────────────────────────────────

    /// Send one sentence and read replies up to `!done`.
    ///
    /// A `!trap` does not end the exchange; its message is returned as
    /// [`Error::Trap`] once `!done` arrives so the session stays in sync.
    pub async fn query(&mut self, words: Vec<String>) -> Result<Response, Error> {
        let command = words.first().cloned().unwrap_or_default();
        trace!(host = %self.host, %command, "sending sentence");

        tokio::time::timeout(self.timeout, self.framed.send(Sentence::new(words)))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        let mut response = Response::default();
        let mut trap: Option<String> = None;

        loop {
            let sentence = tokio::time::timeout(self.timeout, self.framed.next())
                .await
                .map_err(|_| Error::Timeout(self.timeout))?
                .ok_or(Error::ConnectionClosed)??;

            match Reply::from_sentence(&sentence) {
                Reply::Row(record) => response.rows.push(record),
                Reply::Done(record) => {
                    response.done = record;
                    break;
                }
                Reply::Trap(record) => {
                    let message = record
                        .get("message")
                        .cloned()
                        .unwrap_or_else(|| "unknown error".into());
                    trap.get_or_insert(message);
                }
                Reply::Fatal(message) => return Err(Error::Fatal { message }),
                Reply::Ignored => {}
            }
        }

        match trap {
            Some(message) => Err(Error::Trap { command, message }),
            None => {
                trace!(host = %self.host, rows = response.rows.len(), "command done");
                Ok(response)
            }
        }
    }
}
