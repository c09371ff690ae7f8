use anyhow::{Result, anyhow, bail};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::command::{contains_flush, parse_command};
use crate::config::{Config, RedisEndpoint};
use crate::filter::filter_scan_reply;
use crate::resp::{RespReader, Value, encode_command_str, encode_value};
use crate::rewrite::rewrite_command;
use crate::stats::{Action, Stats};
use crate::table::{Class, classify};

const BLOCKED_REPLY: &[u8] = b"-ERR Command not allowed\r\n";

/// The one datum the two forwarding directions share: the namespace prefix
/// and the most recent client command, read at reply-dispatch time to decide
/// whether a SCAN filter applies. The lock is held only for the instant of
/// access, never across an await.
#[derive(Debug)]
struct Shared {
    prefix: String,
    last_command: Option<String>,
}

type SharedState = Arc<Mutex<Shared>>;
type ClientWriter = Arc<tokio::sync::Mutex<OwnedWriteHalf>>;

pub async fn handle_client(socket: TcpStream, peer: SocketAddr, cfg: Arc<Config>, stats: Arc<Stats>) {
    if let Err(e) = handle_client_inner(socket, peer, cfg, stats).await {
        tracing::debug!(client = %peer, error = ?e, "session terminated");
    }
}

async fn handle_client_inner(
    client_sock: TcpStream,
    peer: SocketAddr,
    cfg: Arc<Config>,
    stats: Arc<Stats>,
) -> Result<()> {
    client_sock.set_nodelay(true)?;

    // Backend dial or handshake failure closes the client with no reply: the
    // client observes a dropped connection.
    let backend = connect_and_handshake(&cfg.backend).await?;

    let shared: SharedState = Arc::new(Mutex::new(Shared {
        prefix: cfg.prefix_for(peer),
        last_command: None,
    }));

    let (client_rd, client_wr) = client_sock.into_split();
    let (backend_sock, backend_buf) = backend.into_parts();
    let (backend_rd, backend_wr) = backend_sock.into_split();

    // Both directions write to the client: B→C for replies, C→B for
    // synthesized blocked-command errors.
    let client_wr: ClientWriter = Arc::new(tokio::sync::Mutex::new(client_wr));

    let mut c2b = tokio::spawn(client_to_backend(
        RespReader::new(client_rd),
        backend_wr,
        client_wr.clone(),
        shared.clone(),
        stats.clone(),
    ));
    let mut b2c = tokio::spawn(backend_to_client(
        RespReader::from_parts(backend_rd, backend_buf),
        client_wr,
        shared,
        stats,
    ));

    // Either direction ending tears the session down; aborting the other
    // drops its socket halves and unblocks any pending read.
    let res = tokio::select! {
        r = &mut c2b => {
            b2c.abort();
            r
        }
        r = &mut b2c => {
            c2b.abort();
            r
        }
    };

    res.map_err(|e| anyhow!(e))?
}

async fn client_to_backend(
    mut client: RespReader<OwnedReadHalf>,
    mut backend_wr: OwnedWriteHalf,
    client_wr: ClientWriter,
    shared: SharedState,
    stats: Arc<Stats>,
) -> Result<()> {
    loop {
        let Some((value, raw)) = client.read_value().await? else {
            break;
        };

        // Blocklist check runs on the raw framed bytes, before any parsing.
        if contains_flush(&raw) {
            let name = parse_command(&value)
                .map(|c| c.name_upper)
                .unwrap_or_else(|| "INLINE".to_string());
            stats.record(Action::Blocked, &name);
            let mut w = client_wr.lock().await;
            w.write_all(BLOCKED_REPLY).await?;
            continue;
        }

        let Some(cmd) = parse_command(&value) else {
            // Inline negotiation bytes and stray non-command values pass
            // through untouched and never update last_command.
            backend_wr.write_all(&encode_value(&value)).await?;
            continue;
        };

        let name = cmd.name_upper.clone();
        shared.lock().unwrap().last_command = Some(name.clone());

        if name == "AUTH" {
            // AUTH user pass takes the username as the tenant; a bare
            // AUTH pass takes the password. Either way it is argument 1,
            // and the backend's verdict on it is the client's concern.
            if let Some(tenant) = cmd.arg(1) {
                shared.lock().unwrap().prefix = format!("{}:", String::from_utf8_lossy(tenant));
            }
            stats.record(Action::Forwarded, &name);
            backend_wr.write_all(&encode_value(&value)).await?;
            continue;
        }

        let out = match classify(&name) {
            Class::Keys(pattern) => {
                let prefix = shared.lock().unwrap().prefix.clone();
                match rewrite_command(cmd.items, pattern, prefix.as_bytes()) {
                    Some(rewritten) => {
                        stats.record(Action::Rewritten, &name);
                        encode_value(&rewritten)
                    }
                    None => {
                        stats.record(Action::Forwarded, &name);
                        encode_value(&value)
                    }
                }
            }
            Class::Unprefixed | Class::Unknown => {
                stats.record(Action::Forwarded, &name);
                encode_value(&value)
            }
        };

        backend_wr.write_all(&out).await?;
    }
    Ok(())
}

async fn backend_to_client(
    mut backend: RespReader<OwnedReadHalf>,
    client_wr: ClientWriter,
    shared: SharedState,
    stats: Arc<Stats>,
) -> Result<()> {
    loop {
        let Some((value, raw)) = backend.read_value().await? else {
            break;
        };

        let (last, prefix) = {
            let s = shared.lock().unwrap();
            (s.last_command.clone(), s.prefix.clone())
        };

        let out: Bytes = if last.as_deref() == Some("SCAN") {
            match filter_scan_reply(&value, prefix.as_bytes()) {
                Some(filtered) => {
                    stats.record(Action::Filtered, "SCAN");
                    encode_value(&filtered).freeze()
                }
                None => raw,
            }
        } else {
            raw
        };

        let mut w = client_wr.lock().await;
        w.write_all(&out).await?;
    }
    Ok(())
}

/// Dial the backend and run the configured AUTH/SELECT handshake before any
/// client traffic flows.
async fn connect_and_handshake(endpoint: &RedisEndpoint) -> Result<RespReader<TcpStream>> {
    let sock = TcpStream::connect((&endpoint.host[..], endpoint.port)).await?;
    sock.set_nodelay(true)?;

    let mut stream = RespReader::new(sock);

    if let Some(pass) = &endpoint.password {
        let cmd = match &endpoint.username {
            Some(user) => encode_command_str(&["AUTH", user, pass]),
            // Password-only AUTH is valid and implies the default user.
            None => encode_command_str(&["AUTH", pass]),
        };
        stream.get_mut().write_all(&cmd).await?;
        let Some((reply, raw)) = stream.read_value().await? else {
            bail!("backend closed during AUTH");
        };
        if matches!(reply, Value::Error(_)) {
            bail!("backend AUTH failed: {}", String::from_utf8_lossy(&raw));
        }
    }

    if let Some(db) = endpoint.db {
        let cmd = encode_command_str(&["SELECT", &db.to_string()]);
        stream.get_mut().write_all(&cmd).await?;
        let Some((reply, raw)) = stream.read_value().await? else {
            bail!("backend closed during SELECT");
        };
        if matches!(reply, Value::Error(_)) {
            bail!("backend SELECT failed: {}", String::from_utf8_lossy(&raw));
        }
    }

    Ok(stream)
}
