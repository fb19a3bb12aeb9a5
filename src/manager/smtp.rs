//! Mail manager: buffers recent events and sends them as one digest when a
//! triggering event arrives.

use super::{Manager, ManagerFactory, ManagerHandle, ManagerRegistry};
use crate::core::{CyclicBuffer, Layout, LogEvent, LoggerError, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BUFFER_SIZE: usize = 512;
pub const DEFAULT_SMTP_PORT: u16 = 25;
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully assembled message ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    /// Envelope recipients: To, Cc and Bcc
    pub recipients: Vec<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MailMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Hands assembled messages to a mail server.
pub trait MailTransport: Send + Sync {
    fn send(&self, message: &MailMessage) -> io::Result<()>;
}

/// Minimal SMTP client: HELO, MAIL FROM, RCPT TO, DATA, QUIT. No
/// authentication or TLS.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    host: String,
    port: u16,
    helo: String,
    timeout: Duration,
}

impl SmtpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            helo: "localhost".to_string(),
            timeout: DEFAULT_SMTP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_helo(mut self, helo: impl Into<String>) -> Self {
        self.helo = helo.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn open(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (self.host.as_str(), self.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_write_timeout(Some(self.timeout))?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "mail host did not resolve")
        }))
    }
}

fn read_reply(reader: &mut impl BufRead) -> io::Result<(u16, String)> {
    let mut text = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by mail server",
            ));
        }
        let line = line.trim_end();
        let code = line
            .get(..3)
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, format!("malformed reply: {}", line))
            })?;
        text.push_str(line.get(4..).unwrap_or(""));
        // "250-..." continues, "250 ..." ends the reply
        if line.as_bytes().get(3) != Some(&b'-') {
            return Ok((code, text));
        }
        text.push('\n');
    }
}

fn expect(reader: &mut impl BufRead, accepted: &[u16]) -> io::Result<()> {
    let (code, text) = read_reply(reader)?;
    if accepted.contains(&code) {
        Ok(())
    } else {
        Err(io::Error::other(format!("mail server replied {} {}", code, text)))
    }
}

fn command(
    writer: &mut impl Write,
    reader: &mut impl BufRead,
    line: &str,
    accepted: &[u16],
) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\r\n")?;
    writer.flush()?;
    expect(reader, accepted)
}

/// Normalizes line endings to CRLF and escapes lines starting with a dot.
fn dot_stuff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 16);
    let mut line_start = true;
    let mut iter = body.iter().peekable();
    while let Some(&b) = iter.next() {
        if line_start && b == b'.' {
            out.push(b'.');
        }
        match b {
            b'\r' if iter.peek() == Some(&&b'\n') => {}
            b'\n' => {
                out.extend_from_slice(b"\r\n");
                line_start = true;
                continue;
            }
            _ => out.push(b),
        }
        line_start = false;
    }
    if !out.ends_with(b"\r\n") {
        out.extend_from_slice(b"\r\n");
    }
    out
}

impl MailTransport for SmtpTransport {
    fn send(&self, message: &MailMessage) -> io::Result<()> {
        let stream = self.open()?;
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;

        expect(&mut reader, &[220])?;
        command(&mut writer, &mut reader, &format!("HELO {}", self.helo), &[250])?;
        command(
            &mut writer,
            &mut reader,
            &format!("MAIL FROM:<{}>", message.from),
            &[250],
        )?;
        for recipient in &message.recipients {
            command(
                &mut writer,
                &mut reader,
                &format!("RCPT TO:<{}>", recipient),
                &[250, 251],
            )?;
        }
        command(&mut writer, &mut reader, "DATA", &[354])?;

        for (name, value) in &message.headers {
            write!(writer, "{}: {}\r\n", name, value)?;
        }
        writer.write_all(b"\r\n")?;
        writer.write_all(&dot_stuff(&message.body))?;
        command(&mut writer, &mut reader, ".", &[250])?;

        // The message is accepted at this point; a failed QUIT is not an error.
        let _ = command(&mut writer, &mut reader, "QUIT", &[221]);
        Ok(())
    }
}

/// Mail parameters. Everything except the transport contributes to the
/// manager key.
#[derive(Clone, Default)]
pub struct SmtpManagerData {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub from: Option<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub host: String,
    pub port: u16,
    pub buffer_size: usize,
    /// Replaces the SMTP client, e.g. with a recording transport in tests
    pub transport: Option<Arc<dyn MailTransport>>,
}

impl SmtpManagerData {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SMTP_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            ..Self::default()
        }
    }

    /// `SMTP:` followed by the SHA-256 of every parameter, so keys stay
    /// short however many recipients there are.
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.to.join(","),
            self.cc.join(","),
            self.bcc.join(","),
            self.from.clone().unwrap_or_default(),
            self.reply_to.clone().unwrap_or_default(),
            self.subject.clone(),
            self.host.clone(),
            self.port.to_string(),
            self.buffer_size.to_string(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update(b":");
        }
        format!("SMTP:{}", hex::encode(hasher.finalize()))
    }
}

impl fmt::Debug for SmtpManagerData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpManagerData")
            .field("to", &self.to)
            .field("cc", &self.cc)
            .field("bcc", &self.bcc)
            .field("from", &self.from)
            .field("subject", &self.subject)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

pub struct SmtpManager {
    name: String,
    data: SmtpManagerData,
    buffer: CyclicBuffer<LogEvent>,
    transport: Arc<dyn MailTransport>,
    sent: AtomicU64,
}

impl SmtpManager {
    pub fn new(name: impl Into<String>, data: SmtpManagerData, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            name: name.into(),
            buffer: CyclicBuffer::new(data.buffer_size),
            data,
            transport,
            sent: AtomicU64::new(0),
        }
    }

    /// Buffers an event for the next digest, evicting the oldest if full.
    pub fn add(&self, event: LogEvent) {
        self.buffer.add(event);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Messages successfully handed to the transport
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Drains the buffer and sends one message containing every buffered
    /// event followed by `trigger`.
    pub fn send_events(&self, layout: &dyn Layout, trigger: &LogEvent) -> Result<()> {
        let prior = self.buffer.remove_all();

        let mut body = Vec::new();
        if let Some(header) = layout.header() {
            body.extend_from_slice(&header);
        }
        for event in prior.iter().chain(std::iter::once(trigger)) {
            body.extend_from_slice(&layout.encode(event)?);
        }
        if let Some(footer) = layout.footer() {
            body.extend_from_slice(&footer);
        }

        let message = self.build_message(layout.content_type(), body);
        self.transport.send(&message).map_err(|e| {
            tracing::error!(manager = %self.name, error = %e, "Error sending e-mail notification");
            LoggerError::mail(&self.name, e.to_string())
        })?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn build_message(&self, content_type: &str, body: Vec<u8>) -> MailMessage {
        let data = &self.data;
        let from = data.from.clone().unwrap_or_default();
        let mut headers = vec![
            ("From".to_string(), from.clone()),
            ("To".to_string(), data.to.join(", ")),
        ];
        if !data.cc.is_empty() {
            headers.push(("Cc".to_string(), data.cc.join(", ")));
        }
        if let Some(ref reply_to) = data.reply_to {
            headers.push(("Reply-To".to_string(), reply_to.clone()));
        }
        // Header values must stay on one line.
        let subject = data.subject.replace(['\r', '\n'], " ");
        headers.extend([
            ("Subject".to_string(), subject),
            ("Date".to_string(), chrono::Utc::now().to_rfc2822()),
            ("MIME-Version".to_string(), "1.0".to_string()),
            (
                "Content-Type".to_string(),
                format!("{}; charset=UTF-8", content_type),
            ),
        ]);

        let recipients = data
            .to
            .iter()
            .chain(&data.cc)
            .chain(&data.bcc)
            .cloned()
            .collect();

        MailMessage {
            from,
            recipients,
            headers,
            body,
        }
    }
}

impl Manager for SmtpManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&self, _timeout: Duration) -> bool {
        let pending = self.buffer.remove_all().len();
        if pending > 0 {
            tracing::debug!(manager = %self.name, pending, "Discarding buffered events");
        }
        true
    }
}

impl fmt::Debug for SmtpManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpManager")
            .field("name", &self.name)
            .field("buffered", &self.buffered())
            .field("capacity", &self.buffer.capacity())
            .finish()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SmtpManagerFactory;

impl ManagerFactory<SmtpManager, SmtpManagerData> for SmtpManagerFactory {
    fn create_manager(&self, name: &str, data: SmtpManagerData) -> Result<SmtpManager> {
        if data.to.is_empty() && data.cc.is_empty() && data.bcc.is_empty() {
            return Err(LoggerError::config("SMTP", "No recipients specified"));
        }
        let addresses = data
            .to
            .iter()
            .chain(&data.cc)
            .chain(&data.bcc)
            .chain(data.from.as_ref())
            .chain(data.reply_to.as_ref());
        for address in addresses {
            if address.contains(|c: char| c == '\r' || c == '\n') {
                return Err(LoggerError::config(
                    "SMTP",
                    format!("Line break in mail address {:?}", address),
                ));
            }
        }
        let transport = match data.transport.clone() {
            Some(transport) => transport,
            None if data.host.is_empty() => {
                return Err(LoggerError::config("SMTP", "No SMTP host specified"));
            }
            None => Arc::new(SmtpTransport::new(data.host.clone(), data.port)),
        };
        Ok(SmtpManager::new(name, data, transport))
    }
}

pub fn get_smtp_manager(
    registry: &ManagerRegistry,
    data: SmtpManagerData,
) -> Option<ManagerHandle<SmtpManager>> {
    let key = data.key();
    registry.get_manager(&key, data, &SmtpManagerFactory)
}
