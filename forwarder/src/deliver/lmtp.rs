//! LMTP client (RFC 2033).
//!
//! One transaction per connection: `LHLO`, `MAIL FROM`, one `RCPT TO` per
//! recipient, `DATA`, then one reply per accepted recipient. The session is
//! always ended with `QUIT` and a socket shutdown, whatever the outcome.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use super::{DeliveryError, MailSink};

/// Name announced in `LHLO`.
const LOCAL_NAME: &str = "localhost";

/// Longest reply line accepted from the server, CRLF included.
const MAX_REPLY_LINE: u64 = 4096;

/// LMTP client for a single `host:port` endpoint.
#[derive(Debug, Clone)]
pub struct LmtpClient {
    addr: String,
    timeout: Duration,
}

impl LmtpClient {
    /// `timeout` bounds the connect and every individual command round trip.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MailSink for LmtpClient {
    async fn deliver(
        &self,
        sender: &str,
        recipients: &[String],
        body: &[u8],
    ) -> Result<(), DeliveryError> {
        let stream = timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| DeliveryError::Timeout { stage: "connect" })?
            .map_err(|source| DeliveryError::Connect {
                addr: self.addr.clone(),
                source,
            })?;

        debug!(addr = %self.addr, "lmtp_connected");

        let mut session = Session::new(stream, self.timeout);
        let result = session
            .transaction(LOCAL_NAME, sender, recipients, body)
            .await;
        session.close().await;

        if result.is_ok() {
            info!(
                addr = %self.addr,
                recipient_count = recipients.len(),
                body_length = body.len(),
                "lmtp_delivery_complete"
            );
        }

        result
    }
}

/// A server reply, possibly assembled from several continuation lines.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    code: u16,
    text: String,
}

impl Reply {
    fn class(&self) -> u16 {
        self.code / 100
    }
}

struct Session {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout: Duration,
}

impl Session {
    fn new(stream: TcpStream, timeout: Duration) -> Self {
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
            timeout,
        }
    }

    async fn transaction(
        &mut self,
        local_name: &str,
        sender: &str,
        recipients: &[String],
        body: &[u8],
    ) -> Result<(), DeliveryError> {
        let greeting = self.read_reply("greeting").await?;
        expect_class(&greeting, 2, "greeting")?;

        self.command(&format!("LHLO {local_name}"), "LHLO", 2).await?;
        self.command(&format!("MAIL FROM:<{sender}>"), "MAIL FROM", 2)
            .await?;

        for recipient in recipients {
            self.write(format!("RCPT TO:<{recipient}>\r\n").as_bytes(), "RCPT TO")
                .await?;
            let reply = self.read_reply("RCPT TO").await?;
            if reply.class() != 2 {
                return Err(DeliveryError::RecipientRejected {
                    recipient: recipient.clone(),
                    code: reply.code,
                    text: reply.text,
                });
            }
        }

        self.command("DATA", "DATA", 3).await?;
        self.write(&encode_data(body), "message body").await?;

        // Drain every per-recipient reply before reporting, so QUIT lands on
        // a synchronized session.
        let mut first_failure = None;
        for recipient in recipients {
            let reply = self.read_reply("message body").await?;
            if reply.class() != 2 && first_failure.is_none() {
                first_failure = Some(DeliveryError::RecipientRejected {
                    recipient: recipient.clone(),
                    code: reply.code,
                    text: reply.text,
                });
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Best-effort `QUIT`, then close the socket.
    async fn close(&mut self) {
        if self.write(b"QUIT\r\n", "QUIT").await.is_ok() {
            if let Err(e) = self.read_reply("QUIT").await {
                debug!(error = %e, "lmtp_quit_failed");
            }
        }
        if let Err(e) = self.writer.shutdown().await {
            debug!(error = %e, "lmtp_shutdown_failed");
        }
    }

    async fn command(
        &mut self,
        line: &str,
        stage: &'static str,
        class: u16,
    ) -> Result<Reply, DeliveryError> {
        self.write(format!("{line}\r\n").as_bytes(), stage).await?;
        let reply = self.read_reply(stage).await?;
        expect_class(&reply, class, stage)?;
        Ok(reply)
    }

    async fn write(&mut self, bytes: &[u8], stage: &'static str) -> Result<(), DeliveryError> {
        timeout(self.timeout, self.writer.write_all(bytes))
            .await
            .map_err(|_| DeliveryError::Timeout { stage })??;
        Ok(())
    }

    async fn read_reply(&mut self, stage: &'static str) -> Result<Reply, DeliveryError> {
        let mut lines = Vec::new();

        loop {
            let mut raw = String::new();
            let n = timeout(
                self.timeout,
                (&mut self.reader).take(MAX_REPLY_LINE).read_line(&mut raw),
            )
            .await
            .map_err(|_| DeliveryError::Timeout { stage })??;
            if n == 0 {
                return Err(DeliveryError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("connection closed during {stage}"),
                )));
            }
            if n as u64 >= MAX_REPLY_LINE && !raw.ends_with('\n') {
                let preview: String = raw.chars().take(32).collect();
                return Err(DeliveryError::MalformedReply(format!(
                    "reply line longer than {MAX_REPLY_LINE} bytes during {stage}: {preview}..."
                )));
            }

            let line = raw.trim_end_matches(['\r', '\n']);
            let code = line
                .get(..3)
                .and_then(|c| c.parse::<u16>().ok())
                .ok_or_else(|| DeliveryError::MalformedReply(line.to_string()))?;
            lines.push(line.get(4..).unwrap_or_default().to_string());

            match line.as_bytes().get(3) {
                Some(b'-') => continue,
                None | Some(b' ') => {
                    return Ok(Reply {
                        code,
                        text: lines.join(" "),
                    })
                }
                Some(_) => return Err(DeliveryError::MalformedReply(line.to_string())),
            }
        }
    }
}

fn expect_class(reply: &Reply, class: u16, stage: &'static str) -> Result<(), DeliveryError> {
    if reply.class() == class {
        Ok(())
    } else {
        Err(DeliveryError::Rejected {
            stage,
            code: reply.code,
            text: reply.text.clone(),
        })
    }
}

/// Encode a message for the `DATA` phase: bare LF becomes CRLF, lines
/// starting with `.` are dot-stuffed, and the terminating `.` line is
/// appended. Content is otherwise passed through byte for byte.
fn encode_data(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + body.len() / 32 + 5);
    let mut prev = None;
    let mut at_line_start = true;

    for &b in body {
        if at_line_start && b == b'.' {
            out.push(b'.');
        }
        if b == b'\n' && prev != Some(b'\r') {
            out.push(b'\r');
        }
        out.push(b);
        at_line_start = b == b'\n';
        prev = Some(b);
    }

    if !out.is_empty() && !out.ends_with(b"\r\n") {
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b".\r\n");
    out
}
