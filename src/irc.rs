//! Minimal IRC client backing a chat session.
//!
//! One task per configured server owns the socket. The handle registered
//! in the destination registry only flips flags and queues outbound lines,
//! so a delivery never touches the connection directly.

use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::SplitStream;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::SendError;
use crate::session::{ChatSession, DestinationRegistry, SessionHandle};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(15);
/// Leaves room for the command, channel and the prefix the server adds.
const MAX_TEXT_BYTES: usize = 400;

/// A parsed protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        if let Some(tagged) = rest.strip_prefix('@') {
            rest = tagged.split_once(' ')?.1;
        }

        let mut prefix = None;
        if let Some(prefixed) = rest.strip_prefix(':') {
            let (p, r) = prefixed.split_once(' ')?;
            prefix = Some(p.to_string());
            rest = r;
        }

        let rest = rest.trim_start_matches(' ');
        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, r)) => {
                    params.push(param.to_string());
                    rest = r;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nick part of a `nick!user@host` prefix.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_deref().and_then(|p| p.split('!').next())
    }

    fn param(&self, idx: usize) -> &str {
        self.params.get(idx).map(String::as_str).unwrap_or_default()
    }
}

/// Keeps one chat line on one protocol line and under the length limit.
pub fn sanitize_text(text: &str) -> String {
    let mut clean: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    if clean.len() > MAX_TEXT_BYTES {
        debug!(len = clean.len(), max = MAX_TEXT_BYTES, "Truncating chat line");
        let mut end = MAX_TEXT_BYTES;
        while !clean.is_char_boundary(end) {
            end -= 1;
        }
        clean.truncate(end);
    }
    clean
}

/// Handle for one IRC server connection
pub struct IrcSession {
    connected: AtomicBool,
    quit: AtomicBool,
    shutdown: Notify,
    channels: RwLock<HashSet<String>>,
    outbound: mpsc::UnboundedSender<String>,
}

impl IrcSession {
    fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            connected: AtomicBool::new(false),
            quit: AtomicBool::new(false),
            shutdown: Notify::new(),
            channels: RwLock::new(HashSet::new()),
            outbound,
        }
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
        if !connected {
            if let Ok(mut channels) = self.channels.write() {
                channels.clear();
            }
        }
    }

    fn joined(&self, channel: &str) {
        if let Ok(mut channels) = self.channels.write() {
            channels.insert(channel.to_string());
        }
    }

    fn left(&self, channel: &str) {
        if let Ok(mut channels) = self.channels.write() {
            channels.retain(|c| !c.eq_ignore_ascii_case(channel));
        }
    }

    fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ChatSession for IrcSession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn member_channels(&self) -> HashSet<String> {
        self.channels
            .read()
            .map(|channels| channels.clone())
            .unwrap_or_default()
    }

    async fn send_message(&self, channel: &str, text: &str) -> Result<(), SendError> {
        if !self.is_connected() {
            return Err(SendError::NotConnected);
        }
        self.outbound
            .send(format!("PRIVMSG {} :{}", channel, sanitize_text(text)))
            .map_err(|_| SendError::Closed)
    }

    async fn disconnect(&self, reason: &str) {
        self.quit.store(true, Ordering::Release);
        self.shutdown.notify_one();
        let _ = self.outbound.send(format!("QUIT :{}", sanitize_text(reason)));
    }
}

/// Start the connection task for `config`. The session registers itself
/// in `registry` the first time the server welcomes it.
pub fn spawn(config: SessionConfig, registry: Arc<DestinationRegistry>) -> JoinHandle<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Arc::new(IrcSession::new(tx));
    tokio::spawn(run(config, session, rx, registry))
}

async fn run(
    config: SessionConfig,
    session: Arc<IrcSession>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    registry: Arc<DestinationRegistry>,
) {
    let mut registered = false;
    loop {
        info!(session = %config.id, server = %config.server, "Connecting");
        let mut conn = Connection {
            config: &config,
            session: &session,
            registry: &registry,
            registered: &mut registered,
        };
        match conn.run(&mut outbound).await {
            Ok(()) => info!(session = %config.id, "Connection closed"),
            Err(e) => warn!(session = %config.id, "Connection failed: {}", e),
        }
        session.set_connected(false);

        if session.quit_requested() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            _ = session.shutdown.notified() => break,
        }
    }
    info!(session = %config.id, "Session stopped");
}

struct Connection<'a> {
    config: &'a SessionConfig,
    session: &'a Arc<IrcSession>,
    registry: &'a DestinationRegistry,
    registered: &'a mut bool,
}

impl Connection<'_> {
    async fn run(&mut self, outbound: &mut mpsc::UnboundedReceiver<String>) -> io::Result<()> {
        // Lines queued for a previous connection are stale.
        while let Ok(line) = outbound.try_recv() {
            if line.starts_with("QUIT") {
                return Ok(());
            }
        }

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.config.server))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

        if self.config.tls {
            let connector = tls_connector()?;
            let domain = server_name(&self.config.server)?;
            let stream = tokio::time::timeout(CONNECT_TIMEOUT, connector.connect(domain, stream))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))??;
            self.drive(stream, outbound).await
        } else {
            self.drive(stream, outbound).await
        }
    }

    async fn drive<S>(
        &mut self,
        stream: S,
        outbound: &mut mpsc::UnboundedReceiver<String>,
    ) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (read_half, mut writer) = tokio::io::split(stream);
        // Raw lines: other users may send bytes that are not UTF-8.
        let mut lines = SplitStream::new(BufReader::new(read_half).split(b'\n'));

        let mut nick = self.config.nick.clone();
        if let Some(password) = self.config.password.as_deref().filter(|p| !p.is_empty()) {
            write_line(&mut writer, &format!("PASS {}", password)).await?;
        }
        write_line(&mut writer, &format!("NICK {}", nick)).await?;
        write_line(
            &mut writer,
            &format!("USER {} 0 * :{}", self.config.ident(), self.config.real_name()),
        )
        .await?;

        loop {
            tokio::select! {
                line = lines.next() => {
                    let Some(line) = line else { return Ok(()) };
                    let line = line?;
                    if let Some(msg) = Message::parse(&String::from_utf8_lossy(&line)) {
                        self.handle(&msg, &mut nick, &mut writer).await?;
                    }
                }
                out = outbound.recv() => {
                    let Some(out) = out else { return Ok(()) };
                    write_line(&mut writer, &out).await?;
                    if out.starts_with("QUIT") {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle<W>(&mut self, msg: &Message, nick: &mut String, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let from_self = msg
            .source_nick()
            .is_some_and(|n| n.eq_ignore_ascii_case(nick.as_str()));
        let id = &self.config.id;

        match msg.command.as_str() {
            "PING" => write_line(writer, &format!("PONG :{}", msg.param(0))).await?,
            "001" => {
                if !msg.param(0).is_empty() {
                    *nick = msg.param(0).to_string();
                }
                info!(session = %id, nick = %nick, "Registered with server");
                self.session.set_connected(true);
                for channel in &self.config.channels {
                    write_line(writer, &format!("JOIN {}", channel)).await?;
                }
                if !*self.registered {
                    let handle: SessionHandle = self.session.clone();
                    self.registry.register(id, handle);
                    *self.registered = true;
                }
            }
            "433" if !self.session.is_connected() => {
                nick.push('_');
                debug!(session = %id, "Nick in use, trying {}", nick);
                write_line(writer, &format!("NICK {}", nick)).await?;
            }
            "NICK" if from_self => *nick = msg.param(0).to_string(),
            "JOIN" if from_self => {
                let channel = self.canonical_channel(msg.param(0));
                info!(session = %id, channel = %channel, "Joined");
                self.session.joined(&channel);
            }
            "PART" if from_self => {
                info!(session = %id, channel = %msg.param(0), "Left");
                self.session.left(msg.param(0));
            }
            "KICK" if msg.param(1).eq_ignore_ascii_case(nick.as_str()) => {
                warn!(session = %id, channel = %msg.param(0), "Kicked: {}", msg.param(2));
                self.session.left(msg.param(0));
            }
            "ERROR" => warn!(session = %id, "Server error: {}", msg.param(0)),
            _ => {}
        }
        Ok(())
    }

    /// Channel names are case-insensitive; prefer the configured spelling.
    fn canonical_channel(&self, name: &str) -> String {
        self.config
            .channels
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

/// Client config trusting the bundled web PKI roots.
fn tls_connector() -> io::Result<TlsConnector> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(io::Error::other)?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Host part of a `host:port` server address, for certificate checks.
fn server_name(server: &str) -> io::Result<ServerName<'static>> {
    let host = match server.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => host,
        _ => server,
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    ServerName::try_from(host.to_string())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn parses_prefixed_message_with_trailing() {
        let msg = Message::parse(":alice!a@host PRIVMSG #dev :hello there\r\n").unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("alice!a@host"));
        assert_eq!(msg.source_nick(), Some("alice"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#dev", "hello there"]);
    }

    #[test]
    fn parses_bare_and_tagged_messages() {
        let ping = Message::parse("PING :irc.example.net").unwrap();
        assert_eq!(ping.prefix, None);
        assert_eq!(ping.params, vec!["irc.example.net"]);

        let tagged = Message::parse("@time=2024-01-01T00:00:00Z :srv 001 pjodd :Welcome").unwrap();
        assert_eq!(tagged.command, "001");
        assert_eq!(tagged.params, vec!["pjodd", "Welcome"]);

        let kick = Message::parse(":op KICK #dev pjodd").unwrap();
        assert_eq!(kick.params, vec!["#dev", "pjodd"]);

        assert!(Message::parse("").is_none());
        assert!(Message::parse(":only-prefix").is_none());
    }

    #[test]
    fn sanitizes_line_breaks_and_length() {
        assert_eq!(sanitize_text("a\r\nb"), "a  b");
        let long = "é".repeat(300);
        let clean = sanitize_text(&long);
        assert!(clean.len() <= MAX_TEXT_BYTES);
        assert!(clean.chars().all(|c| c == 'é'));
    }

    #[test]
    fn server_name_strips_port() {
        assert_eq!(
            server_name("irc.libera.chat:6697").unwrap(),
            ServerName::try_from("irc.libera.chat").unwrap()
        );
        assert_eq!(
            server_name("irc.libera.chat").unwrap(),
            ServerName::try_from("irc.libera.chat").unwrap()
        );
        assert!(server_name("bad host:6697").is_err());
    }

    #[test]
    fn builds_tls_connector() {
        assert!(tls_connector().is_ok());
    }

    #[tokio::test]
    async fn send_fails_before_welcome() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = IrcSession::new(tx);
        assert_eq!(
            session.send_message("#dev", "hi").await,
            Err(SendError::NotConnected)
        );
    }

    #[tokio::test]
    async fn registers_joins_sends_and_quits() {
        let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();

        let config = SessionConfig {
            id: "net1".into(),
            server: addr,
            nick: "pjodd".into(),
            ident: None,
            real_name: None,
            password: None,
            tls: false,
            channels: vec!["#dev".into()],
        };
        let registry = Arc::new(DestinationRegistry::new());
        let task = spawn(config, Arc::clone(&registry));

        let (socket, _) = server.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut from_client = BufReader::new(read_half).lines();

        assert_eq!(from_client.next_line().await.unwrap().unwrap(), "NICK pjodd");
        assert_eq!(
            from_client.next_line().await.unwrap().unwrap(),
            "USER pjodd 0 * :pjodd"
        );

        write_half
            .write_all(b":srv 001 pjodd :Welcome\r\nPING :srv\r\n")
            .await
            .unwrap();
        assert_eq!(from_client.next_line().await.unwrap().unwrap(), "JOIN #dev");
        assert_eq!(from_client.next_line().await.unwrap().unwrap(), "PONG :srv");

        write_half
            .write_all(b":pjodd!pjodd@host JOIN :#DEV\r\n")
            .await
            .unwrap();

        let handle = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(h) = registry.get("net1") {
                    if h.member_channels().contains("#dev") {
                        return h;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(handle.is_connected());

        handle.send_message("#dev", "hello\nworld").await.unwrap();
        assert_eq!(
            from_client.next_line().await.unwrap().unwrap(),
            "PRIVMSG #dev :hello world"
        );

        handle.disconnect("bye").await;
        assert_eq!(from_client.next_line().await.unwrap().unwrap(), "QUIT :bye");

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!handle.is_connected());
        assert!(handle.member_channels().is_empty());
    }

    #[tokio::test]
    async fn survives_lines_that_are_not_utf8() {
        let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();

        let config = SessionConfig {
            id: "net1".into(),
            server: addr,
            nick: "pjodd".into(),
            ident: None,
            real_name: None,
            password: None,
            tls: false,
            channels: vec!["#dev".into()],
        };
        let registry = Arc::new(DestinationRegistry::new());
        let task = spawn(config, Arc::clone(&registry));

        let (socket, _) = server.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut from_client = BufReader::new(read_half).lines();
        from_client.next_line().await.unwrap().unwrap();
        from_client.next_line().await.unwrap().unwrap();

        write_half
            .write_all(b":srv 001 pjodd :Welcome\r\n:pjodd!p@h JOIN #dev\r\n")
            .await
            .unwrap();
        assert_eq!(from_client.next_line().await.unwrap().unwrap(), "JOIN #dev");

        // Latin-1 e-acute, then a PING that must still be answered.
        write_half
            .write_all(b":bob!b@h PRIVMSG #dev :caf\xe9\r\nPING :after\r\n")
            .await
            .unwrap();
        assert_eq!(
            from_client.next_line().await.unwrap().unwrap(),
            "PONG :after"
        );

        let handle = registry.get("net1").unwrap();
        assert!(handle.is_connected());
        assert!(handle.member_channels().contains("#dev"));

        handle.send_message("#dev", "still here").await.unwrap();
        assert_eq!(
            from_client.next_line().await.unwrap().unwrap(),
            "PRIVMSG #dev :still here"
        );

        handle.disconnect("bye").await;
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
