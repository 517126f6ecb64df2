//! Canned HTTP server standing in for Ollama in tests.

use std::io::Read;
use std::thread::JoinHandle;

pub struct CannedServer {
    pub base: String,
    handle: JoinHandle<Vec<String>>,
}

impl CannedServer {
    /// Serve `responses` in order, one per incoming request, then stop.
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let handle = std::thread::spawn(move || {
            let mut bodies = Vec::new();
            for (status, body) in responses {
                let mut request = match server.recv() {
                    Ok(r) => r,
                    Err(_) => break,
                };
                let mut received = String::new();
                let _ = request.as_reader().read_to_string(&mut received);
                bodies.push(received);
                let response =
                    tiny_http::Response::from_string(body).with_status_code(tiny_http::StatusCode(status));
                let _ = request.respond(response);
            }
            bodies
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            handle,
        }
    }

    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base)
    }

    /// Request bodies received, in order. Blocks until all canned responses were served.
    pub fn received(self) -> Vec<String> {
        self.handle.join().unwrap_or_default()
    }
}
