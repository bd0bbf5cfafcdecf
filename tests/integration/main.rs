//! Integration tests for shellcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use shellcache::config::Config;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn shellcache() -> Command {
        cargo_bin_cmd!("shellcache")
    }

    /// Write a config whose store lives in `dir` and whose scope is `scope`
    fn write_config(dir: &Path, scope: &str, version: &str) -> PathBuf {
        let mut config = Config::default();
        config.agent.namespace = "itest".to_string();
        config.agent.version = version.to_string();
        config.agent.scope = scope.to_string();
        config.agent.manifest = vec![
            "/".to_string(),
            "/index.html".to_string(),
            "/style.css".to_string(),
        ];
        config.agent.offline_fallback = "/index.html".to_string();
        config.network.timeout_secs = 5;
        config.store.dir = Some(dir.join("store"));

        let path = dir.join("config.toml");
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        shellcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("offline app-shell cache"));
    }

    #[test]
    fn version_displays() {
        shellcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shellcache"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        shellcache()
            .arg("-c")
            .arg(&path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        shellcache()
            .arg("-c")
            .arg(temp.path().join("missing.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[agent]"));
    }

    #[test]
    fn config_set_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        shellcache()
            .arg("-c")
            .arg(&path)
            .args(["config", "set", "agent.version", "v42"])
            .assert()
            .success();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("v42"));
    }

    #[test]
    fn status_not_installed() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "http://127.0.0.1:9/", "v1");
        shellcache()
            .arg("-c")
            .arg(&config)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("not installed"));
    }

    #[test]
    fn activate_without_install_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "http://127.0.0.1:9/", "v1");
        shellcache()
            .arg("-c")
            .arg(&config)
            .arg("activate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Generation not found"));
    }

    #[test]
    fn generations_empty_json() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "http://127.0.0.1:9/", "v1");
        shellcache()
            .arg("-c")
            .arg(&config)
            .args(["generations", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn install_unreachable_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "http://127.0.0.1:9/", "v1");
        shellcache()
            .arg("-c")
            .arg(&config)
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Precache failed"));

        // Nothing half-populated is left behind
        shellcache()
            .arg("-c")
            .arg(&config)
            .args(["generations", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }
}

mod server_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use shellcache::config::Config;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn shellcache() -> Command {
        cargo_bin_cmd!("shellcache")
    }

    /// Minimal HTTP/1.1 server; drops connections while `offline` is set
    struct TestServer {
        base: String,
        offline: Arc<AtomicBool>,
    }

    impl TestServer {
        fn start(routes: &[(&str, &str)]) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let base = format!("http://{}/", listener.local_addr().unwrap());
            let offline = Arc::new(AtomicBool::new(false));
            let routes: HashMap<String, String> = routes
                .iter()
                .map(|(p, b)| (p.to_string(), b.to_string()))
                .collect();

            let flag = offline.clone();
            thread::spawn(move || {
                for stream in listener.incoming().flatten() {
                    handle(stream, &routes, &flag);
                }
            });

            Self { base, offline }
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }
    }

    fn handle(mut stream: TcpStream, routes: &HashMap<String, String>, offline: &AtomicBool) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
            if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }

        if offline.load(Ordering::SeqCst) {
            return;
        }

        let head = String::from_utf8_lossy(&buf);
        let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
        let (status, body) = match routes.get(&path) {
            Some(body) => ("200 OK", body.as_str()),
            None => ("404 Not Found", "not found"),
        };

        let _ = write!(
            stream,
            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let _ = stream.flush();
    }

    fn write_config(dir: &Path, scope: &str, version: &str) -> PathBuf {
        let mut config = Config::default();
        config.agent.namespace = "itest".to_string();
        config.agent.version = version.to_string();
        config.agent.scope = scope.to_string();
        config.agent.manifest = vec![
            "/".to_string(),
            "/index.html".to_string(),
            "/style.css".to_string(),
        ];
        config.agent.offline_fallback = "/index.html".to_string();
        config.network.timeout_secs = 5;
        config.store.dir = Some(dir.join("store"));

        let path = dir.join("config.toml");
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        path
    }

    fn site() -> TestServer {
        TestServer::start(&[
            ("/", "<html>root</html>"),
            ("/index.html", "<html>shell</html>"),
            ("/style.css", "body { color: red }"),
            ("/fresh.txt", "fresh"),
        ])
    }

    #[test]
    fn install_then_serve_from_cache() {
        let server = site();
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), &server.base, "v1");

        shellcache()
            .arg("-c")
            .arg(&config)
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("Active itest-v1"));

        shellcache()
            .arg("-c")
            .arg(&config)
            .args(["fetch", "/style.css"])
            .assert()
            .success()
            .stdout(predicate::str::contains("body { color: red }"))
            .stderr(predicate::str::contains("[cache]"));
    }

    #[test]
    fn miss_is_refilled() {
        let server = site();
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), &server.base, "v1");
        shellcache().arg("-c").arg(&config).arg("install").assert().success();

        shellcache()
            .arg("-c")
            .arg(&config)
            .args(["fetch", "/fresh.txt"])
            .assert()
            .success()
            .stderr(predicate::str::contains("[network]"));

        shellcache()
            .arg("-c")
            .arg(&config)
            .args(["fetch", "/fresh.txt"])
            .assert()
            .success()
            .stdout(predicate::str::contains("fresh"))
            .stderr(predicate::str::contains("[cache]"));
    }

    #[test]
    fn not_found_is_not_cached() {
        let server = site();
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), &server.base, "v1");
        shellcache().arg("-c").arg(&config).arg("install").assert().success();

        for _ in 0..2 {
            shellcache()
                .arg("-c")
                .arg(&config)
                .args(["fetch", "/nope"])
                .assert()
                .success()
                .stderr(predicate::str::contains("404").and(predicate::str::contains("[network]")));
        }
    }

    #[test]
    fn post_passes_through() {
        let server = site();
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), &server.base, "v1");
        shellcache().arg("-c").arg(&config).arg("install").assert().success();

        shellcache()
            .arg("-c")
            .arg(&config)
            .args(["fetch", "-X", "POST", "/style.css"])
            .assert()
            .success()
            .stderr(predicate::str::contains("[passthrough]"));
    }

    #[test]
    fn offline_navigation_falls_back() {
        let server = site();
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), &server.base, "v1");
        shellcache().arg("-c").arg(&config).arg("install").assert().success();

        server.set_offline(true);

        shellcache()
            .arg("-c")
            .arg(&config)
            .args(["fetch", "--navigate", "/projects/42"])
            .assert()
            .success()
            .stdout(predicate::str::contains("<html>shell</html>"))
            .stderr(predicate::str::contains("[offline-fallback]"));

        shellcache()
            .arg("-c")
            .arg(&config)
            .args(["fetch", "/app.js"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Network request failed"));
    }

    #[test]
    fn upgrade_removes_previous_generation() {
        let server = site();
        let temp = TempDir::new().unwrap();

        let v1 = write_config(temp.path(), &server.base, "v1");
        shellcache().arg("-c").arg(&v1).arg("install").assert().success();

        let v2 = write_config(temp.path(), &server.base, "v2");
        shellcache()
            .arg("-c")
            .arg(&v2)
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("deleted itest-v1"));

        shellcache()
            .arg("-c")
            .arg(&v2)
            .args(["generations", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::diff("itest-v2\n"));
    }
}

mod agent_tests {
    use shellcache::config::schema::AgentConfig;
    use shellcache::host::RecordingHost;
    use shellcache::http::{Request, Response};
    use shellcache::network::ScriptedNetwork;
    use shellcache::store::{DiskStore, GenerationName, ResponseStore};
    use shellcache::{Agent, AgentState, ResponseSource};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn config(version: &str) -> AgentConfig {
        AgentConfig {
            namespace: "prefix".to_string(),
            version: version.to_string(),
            scope: "https://app.example/".to_string(),
            manifest: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/style.css".to_string(),
            ],
            offline_fallback: "/index.html".to_string(),
        }
    }

    fn site() -> Arc<ScriptedNetwork> {
        let network = Arc::new(ScriptedNetwork::new());
        network
            .respond("https://app.example/", Response::new(200, "root"))
            .respond("https://app.example/index.html", Response::new(200, "shell"))
            .respond("https://app.example/style.css", Response::new(200, "css"))
            .respond("https://app.example/data.json", Response::new(200, "{}"));
        network
    }

    #[tokio::test]
    async fn disk_store_survives_restart() {
        let temp = TempDir::new().unwrap();
        let network = site();

        {
            let store = Arc::new(DiskStore::new(temp.path()));
            let agent = Agent::from_config(
                &config("v1"),
                store,
                network.clone(),
                Arc::new(RecordingHost::new()),
            )
            .unwrap();
            agent.install().await.unwrap();
            agent.activate().await.unwrap();

            let request = Request::get(agent.resolve("/data.json").unwrap());
            agent.fetch(&request).await.unwrap();
            agent.settle().await;
        }

        let calls_before = network.call_count();
        network.set_offline(true);

        let store = Arc::new(DiskStore::new(temp.path()));
        let agent = Agent::from_config(
            &config("v1"),
            store.clone(),
            network.clone(),
            Arc::new(RecordingHost::new()),
        )
        .unwrap();
        assert_eq!(agent.start().await.unwrap(), AgentState::Active);

        let data = agent
            .fetch(&Request::get(agent.resolve("/data.json").unwrap()))
            .await
            .unwrap();
        assert_eq!(data.source(), Some(ResponseSource::Cache));
        assert_eq!(data.response().unwrap().body, b"{}");

        let page = agent
            .fetch(&Request::navigate(agent.resolve("/settings").unwrap()))
            .await
            .unwrap();
        assert_eq!(page.source(), Some(ResponseSource::OfflineFallback));
        assert_eq!(page.response().unwrap().body, b"shell");

        // Only the offline navigation attempt reached the network
        assert_eq!(network.call_count(), calls_before + 1);
        assert_eq!(
            store.generations().await.unwrap(),
            vec![GenerationName::new("prefix", "v1")]
        );
    }
}
