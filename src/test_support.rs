#![cfg(test)]
//! In-process stand-in for the cache store, bound on a Unix socket.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Default)]
struct Database {
    hashes: HashMap<String, HashMap<String, String>>,
    keys: HashMap<String, String>,
}

type Databases = Arc<Mutex<HashMap<i64, Database>>>;

/// Raw bytes sent back to one command instead of the normal reply,
/// optionally hanging up right after them.
#[derive(Clone, Copy)]
pub struct RawReply {
    pub command: &'static str,
    pub bytes: &'static [u8],
    pub hang_up: bool,
}

pub struct FakeStore {
    path: PathBuf,
    databases: Databases,
    task: tokio::task::JoinHandle<()>,
}

impl FakeStore {
    /// Binds the listener and serves connections until dropped.
    pub fn bind(path: impl Into<PathBuf>) -> Self {
        Self::serve_with(path.into(), None)
    }

    pub fn bind_with_raw_reply(path: impl Into<PathBuf>, raw: RawReply) -> Self {
        Self::serve_with(path.into(), Some(raw))
    }

    fn serve_with(path: PathBuf, raw: Option<RawReply>) -> Self {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create socket dir");
        }
        let listener = UnixListener::bind(&path).expect("bind fake store");
        let databases: Databases = Arc::default();

        let shared = databases.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, shared.clone(), raw));
            }
        });

        Self {
            path,
            databases,
            task,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_key(&self, db: i64, key: &str, value: &str) {
        let mut dbs = self.databases.lock().unwrap();
        dbs.entry(db)
            .or_default()
            .keys
            .insert(key.to_string(), value.to_string());
    }

    pub fn hash(&self, db: i64, key: &str) -> HashMap<String, String> {
        let dbs = self.databases.lock().unwrap();
        dbs.get(&db)
            .and_then(|d| d.hashes.get(key).cloned())
            .unwrap_or_default()
    }
}

impl Drop for FakeStore {
    fn drop(&mut self) {
        self.task.abort();
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Binds a listener that accepts connections and drops them unanswered.
pub fn bind_hang_up(path: &Path) -> tokio::task::JoinHandle<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create socket dir");
    }
    let listener = UnixListener::bind(path).expect("bind hang-up listener");
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    })
}

enum Reply {
    Simple(&'static str),
    Error(String),
    Integer(i64),
    Bulk(String),
    Array(Vec<String>),
}

impl Reply {
    fn encode(&self) -> Vec<u8> {
        match self {
            Reply::Simple(s) => format!("+{}\r\n", s).into_bytes(),
            Reply::Error(s) => format!("-{}\r\n", s).into_bytes(),
            Reply::Integer(n) => format!(":{}\r\n", n).into_bytes(),
            Reply::Bulk(s) => format!("${}\r\n{}\r\n", s.len(), s).into_bytes(),
            Reply::Array(items) => {
                let mut out = format!("*{}\r\n", items.len()).into_bytes();
                for item in items {
                    out.extend(Reply::Bulk(item.clone()).encode());
                }
                out
            }
        }
    }
}

async fn read_header(stream: &mut BufReader<UnixStream>, kind: char) -> Option<usize> {
    let mut line = String::new();
    if stream.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    line.trim_end().strip_prefix(kind)?.parse().ok()
}

/// Reads one command sent as an array of bulk strings.
async fn read_request(stream: &mut BufReader<UnixStream>) -> Option<Vec<String>> {
    let count = read_header(stream, '*').await?;
    let mut args = Vec::new();
    for _ in 0..count {
        let len = read_header(stream, '$').await?;
        let mut data = vec![0u8; len + 2];
        stream.read_exact(&mut data).await.ok()?;
        data.truncate(len);
        args.push(String::from_utf8(data).ok()?);
    }
    Some(args)
}

async fn serve(stream: UnixStream, databases: Databases, raw: Option<RawReply>) {
    let mut stream = BufReader::new(stream);
    let mut selected = 0i64;

    while let Some(args) = read_request(&mut stream).await {
        let (out, hang_up) = match raw {
            Some(raw) if args.first().map(String::as_str) == Some(raw.command) => {
                (raw.bytes.to_vec(), raw.hang_up)
            }
            _ => (execute(&args, &mut selected, &databases).encode(), false),
        };
        if stream.get_mut().write_all(&out).await.is_err() || hang_up {
            break;
        }
    }
}

fn execute(args: &[String], selected: &mut i64, databases: &Databases) -> Reply {
    let mut dbs = databases.lock().unwrap();
    let db = dbs.entry(*selected).or_default();
    let argv: Vec<&str> = args.iter().map(String::as_str).collect();

    match argv.as_slice() {
        ["PING"] => Reply::Simple("PONG"),
        // Client library handshake (CLIENT SETINFO ...).
        ["CLIENT", ..] => Reply::Simple("OK"),
        ["SELECT", index] => match index.parse() {
            Ok(index) => {
                *selected = index;
                Reply::Simple("OK")
            }
            Err(_) => Reply::Error("ERR invalid DB index".to_string()),
        },
        ["HSET", key, field, value] => {
            let previous = db
                .hashes
                .entry(key.to_string())
                .or_default()
                .insert(field.to_string(), value.to_string());
            Reply::Integer(if previous.is_some() { 0 } else { 1 })
        }
        ["HDEL", key, field] => {
            let removed = db
                .hashes
                .get_mut(*key)
                .and_then(|h| h.remove(*field))
                .is_some();
            Reply::Integer(removed as i64)
        }
        ["HGETALL", key] => {
            let items = db
                .hashes
                .get(*key)
                .map(|h| h.iter().flat_map(|(f, v)| [f.clone(), v.clone()]).collect())
                .unwrap_or_default();
            Reply::Array(items)
        }
        ["EXISTS", key] => {
            let found = db.keys.contains_key(*key) || db.hashes.contains_key(*key);
            Reply::Integer(found as i64)
        }
        ["SET", key, value] => {
            db.keys.insert(key.to_string(), value.to_string());
            Reply::Simple("OK")
        }
        ["DEL", key] => {
            let removed = db.keys.remove(*key).is_some() || db.hashes.remove(*key).is_some();
            Reply::Integer(removed as i64)
        }
        _ => Reply::Error(format!("ERR unknown command {:?}", args.first())),
    }
}
