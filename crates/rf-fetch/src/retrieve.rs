//! Raw document retrieval over HTTP or from a local command.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, Url};
use tokio::process::Command;
use tracing::debug;

use crate::fetcher::FetchCause;
use crate::source::Source;

const DEFAULT_USER_AGENT: &str = concat!("rfeed/", env!("CARGO_PKG_VERSION"));

/// Knobs for the real retriever and the fetch boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Upper bound for a whole fetch, HTTP or command.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Shell used as `<shell> -c <command line>`.
    pub shell: String,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            shell: "sh".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Produces the raw bytes of a feed document.
pub trait Retrieve: Send + Sync {
    fn retrieve<'a>(&'a self, source: &'a Source) -> BoxFuture<'a, Result<Vec<u8>, FetchCause>>;
}

/// Retrieves URLs with reqwest and runs commands through the shell.
pub struct SourceRetriever {
    http: Client,
    shell: String,
}

/// Build an HTTP client with appropriate timeouts and connection limits.
fn build_http_client(settings: &FetchSettings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(settings.timeout)
        .connect_timeout(settings.connect_timeout)
        .pool_max_idle_per_host(2)
        .user_agent(settings.user_agent.clone())
        .build()
}

impl SourceRetriever {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchCause> {
        Ok(Self {
            http: build_http_client(settings)?,
            shell: settings.shell.clone(),
        })
    }

    async fn get(&self, url: &Url) -> Result<Vec<u8>, FetchCause> {
        let response = self.http.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(FetchCause::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        debug!(%url, bytes = body.len(), "downloaded feed document");
        Ok(body.to_vec())
    }

    async fn run(&self, line: &str) -> Result<Vec<u8>, FetchCause> {
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(line)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(FetchCause::Command {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(command = line, bytes = output.stdout.len(), "command produced feed document");
        Ok(output.stdout)
    }
}

impl Retrieve for SourceRetriever {
    fn retrieve<'a>(&'a self, source: &'a Source) -> BoxFuture<'a, Result<Vec<u8>, FetchCause>> {
        Box::pin(async move {
            match source {
                Source::Url(url) => self.get(url).await,
                Source::Command(line) => self.run(line).await,
            }
        })
    }
}
