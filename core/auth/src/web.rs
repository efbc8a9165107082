//! Interactive authorization-code flow.
//!
//! The operator visits the authorization URL, approves access and pastes the
//! code back. Obtaining the code is a synchronous hand-off to a
//! [`CodeSource`], so the console prompt can be replaced without touching the
//! rest of the flow.

use async_trait::async_trait;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};

use driveup_common::{Credential, Error, Result};

use crate::config::ClientConfig;
use crate::oauth::{authorization_url, TokenEndpoint};

/// Supplies the authorization code for a given authorization URL.
///
/// Implementations may block; the flow waits without a timeout.
pub trait CodeSource: Send {
    /// Present `authorization_url` and return the code the operator obtained.
    fn authorization_code(&mut self, authorization_url: &str) -> Result<String>;
}

/// Prompts on a writer and reads the code from a reader.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
    open_browser: bool,
}

impl ConsolePrompt<BufReader<Stdin>, Stdout> {
    /// Prompt on stdout and read from stdin.
    pub fn stdio(open_browser: bool) -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout(), open_browser)
    }
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    /// Create a prompt over arbitrary streams.
    pub fn new(input: R, output: W, open_browser: bool) -> Self {
        Self {
            input,
            output,
            open_browser,
        }
    }

    /// Recover the underlying streams.
    pub fn into_parts(self) -> (R, W) {
        (self.input, self.output)
    }

    /// Read the first whitespace-delimited token, skipping blank lines.
    fn read_token(&mut self) -> Result<String> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .input
                .read_line(&mut line)
                .map_err(|e| Error::UserInput(e.to_string()))?;

            if read == 0 {
                return Err(Error::UserInput("unexpected end of input".to_string()));
            }

            if let Some(token) = line.split_whitespace().next() {
                return Ok(token.to_string());
            }
        }
    }
}

impl<R, W> CodeSource for ConsolePrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn authorization_code(&mut self, authorization_url: &str) -> Result<String> {
        writeln!(
            self.output,
            "Go to the following link in your browser then type the authorization code: \n{}",
            authorization_url
        )?;
        self.output.flush()?;

        if self.open_browser {
            if let Err(e) = open::that(authorization_url) {
                warn!("Could not open browser: {}", e);
            }
        }

        self.read_token()
    }
}

/// Obtains a credential when the cache cannot supply one.
#[async_trait]
pub trait Authorizer: Send {
    /// Run the authorization flow for `config`.
    ///
    /// # Errors
    /// - `UserInput` if no code could be read
    /// - `ExchangeRejected` if the token endpoint declines the code
    /// - `Transport` on network failure
    async fn request_authorization(&mut self, config: &ClientConfig) -> Result<Credential>;
}

/// Authorization-code flow: URL → operator → code → token exchange.
///
/// There is no retry loop. A failed read or exchange ends the flow.
pub struct WebAuthorizer<S> {
    code_source: S,
    endpoint: Arc<dyn TokenEndpoint>,
    state_token: String,
}

impl<S: CodeSource> WebAuthorizer<S> {
    /// Create an authorizer stamping `state_token` into every URL.
    pub fn new(
        code_source: S,
        endpoint: Arc<dyn TokenEndpoint>,
        state_token: impl Into<String>,
    ) -> Self {
        Self {
            code_source,
            endpoint,
            state_token: state_token.into(),
        }
    }

    /// Recover the code source.
    pub fn into_code_source(self) -> S {
        self.code_source
    }
}

#[async_trait]
impl<S: CodeSource> Authorizer for WebAuthorizer<S> {
    async fn request_authorization(&mut self, config: &ClientConfig) -> Result<Credential> {
        let url = authorization_url(config, &self.state_token)?;
        debug!("Requesting authorization code from operator");

        let code = self.code_source.authorization_code(&url)?;
        if code.trim().is_empty() {
            return Err(Error::UserInput("empty authorization code".to_string()));
        }

        info!("Exchanging authorization code for a credential");
        self.endpoint.exchange_code(config, code.trim()).await
    }
}
