use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use uuid::Uuid;

static SERVER: OnceLock<TestServer> = OnceLock::new();

// Shared by the spawned server and the token helper below
const TEST_JWT_SECRET: &str = "integration-test-secret";

pub struct TestServer {
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary to keep start fast during tests
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_todo-api-rust"));
        cmd.env("PORT", port.to_string())
            .env("JWT_SECRET", TEST_JWT_SECRET)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // Inherit the environment so the server sees DATABASE_URL when set
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                // Ready even when degraded; individual tests decide whether
                // they need a live database
                if resp.status() == StatusCode::OK
                    || resp.status() == StatusCode::SERVICE_UNAVAILABLE
                {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!(
            "server did not become ready on {} within {:?}",
            self.base_url,
            timeout
        )
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| {
        // The token helper below signs with the same secret the server
        // validates against; config is initialized lazily, so this must
        // run before the first token is minted
        std::env::set_var("JWT_SECRET", TEST_JWT_SECRET);
        let _ = dotenvy::dotenv();
        TestServer::spawn().expect("failed to spawn server binary")
    });
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// True when the suite can reach a database through the server.
#[allow(dead_code)]
pub fn database_configured() -> bool {
    let _ = dotenvy::dotenv();
    std::env::var("DATABASE_URL").is_ok()
}

/// Mint a bearer token the spawned server will accept.
#[allow(dead_code)]
pub fn token_for(user_id: Uuid, email: &str) -> String {
    let claims = todo_api_rust::auth::Claims::new(user_id, email.to_string());
    todo_api_rust::auth::generate_jwt(claims).expect("test secret is configured")
}
