//! Loopback HTTP server with canned responses for the retry tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpListener;

pub struct TestServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
    request_lines: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    /// Serves one canned `status|body` response per connection, repeating
    /// the last one once the list runs out. Every response closes the
    /// connection, so connections and requests line up.
    pub async fn start(responses: &[&'static str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let request_lines = Arc::new(Mutex::new(Vec::new()));
        let responses = responses.to_vec();

        let counter = Arc::clone(&hits);
        let lines = Arc::clone(&request_lines);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let canned = responses[n.min(responses.len() - 1)];
                let (status, body) = canned.split_once('|').unwrap_or((canned, ""));

                let mut request = vec![0u8; 8192];
                let read = socket.read(&mut request).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&request[..read]);
                if let Some(line) = head.lines().next() {
                    lines.lock().unwrap().push(line.to_string());
                }

                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            url,
            hits,
            request_lines,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Number of requests seen with the given method.
    pub fn count(&self, method: &str) -> usize {
        self.request_lines
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.split(' ').next() == Some(method))
            .count()
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
