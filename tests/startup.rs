//! Startup validation, bind failures, and shutdown.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use devhost::{Server, Shutdown, StartError};

mod common;

#[tokio::test]
async fn out_of_range_ports_are_rejected() {
    let dir = common::site(&[]);
    for port in [-100i64, 0, 65536] {
        let mut config = common::config(28420, dir.path());
        config.server.port = port;
        let err = Server::new(config).start().await.unwrap_err();
        assert_eq!(err.code(), "ERR_OUT_OF_RANGE");
        assert_eq!(
            err.to_string(),
            format!("Port number {port} is invalid. Try a number between 1 and 65535.")
        );
    }
}

#[tokio::test]
async fn port_in_use_is_reported() {
    let _taken = std::net::TcpListener::bind("127.0.0.1:28421").unwrap();
    let dir = common::site(&[("index.html", b"home")]);

    let err = Server::new(common::config(28421, dir.path()))
        .start()
        .await
        .unwrap_err();
    assert!(matches!(err, StartError::Bind(_)));
    assert_eq!(err.code(), "EADDRINUSE");
    assert_eq!(
        err.to_string(),
        "Port 28421 has been used. Try another port instead."
    );
}

#[tokio::test]
async fn invalid_root_fails_validation() {
    let dir = common::site(&[]);
    let mut config = common::config(28422, dir.path());
    config.server.root = "blog".to_string();

    let err = Server::new(config).start().await.unwrap_err();
    assert!(matches!(err, StartError::Config(_)));
}

#[tokio::test]
async fn wildcard_address_is_shown_as_localhost() {
    let dir = common::site(&[("index.html", b"home")]);
    let mut config = common::config(28423, dir.path());
    config.server.ip = Some("0.0.0.0".parse().unwrap());
    let server = common::start(config).await;

    assert_eq!(server.url(), "http://localhost:28423/");
    assert!(!server.is_https());
}

#[tokio::test]
async fn started_hooks_receive_the_url() {
    let dir = common::site(&[("index.html", b"home")]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let server = Server::new(common::config(28424, dir.path()))
        .on_started(move |url| sink.lock().unwrap().push(url.to_string()))
        .start()
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![server.url().to_string()]);
    assert_eq!(server.url(), "http://127.0.0.1:28424/");
}

#[tokio::test]
async fn close_is_idempotent_and_frees_the_port() {
    let dir = common::site(&[("index.html", b"home")]);
    let mut server = common::start(common::config(28425, dir.path())).await;

    server.close();
    server.close();
    assert!(server.is_closed());
    drop(server);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let again = common::start(common::config(28425, dir.path())).await;
    assert!(!again.is_closed());
}

#[tokio::test]
async fn run_until_returns_on_shutdown() {
    let dir = common::site(&[("index.html", b"home")]);
    let server = common::start(common::config(28426, dir.path())).await;
    let addr = server.local_addr();

    let shutdown = Shutdown::new();
    let running = tokio::spawn(server.run_until(shutdown.subscribe()));

    let res = common::client()
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "home");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn watch_mode_picks_up_changes() {
    let dir = common::site(&[("index.html", b"v1")]);
    let mut config = common::config(28427, dir.path());
    config.server.static_mode = false;
    config.server.watch_debounce_ms = 50;
    let server = common::start(config).await;
    let client = common::client();
    let url = format!("http://{}/", server.local_addr());

    assert_eq!(client.get(&url).send().await.unwrap().text().await.unwrap(), "v1");

    common::write_file(dir.path(), "new.html", b"fresh");
    let mut found = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let res = client.get(format!("{url}new")).send().await.unwrap();
        if res.status() == reqwest::StatusCode::OK {
            assert_eq!(res.text().await.unwrap(), "fresh");
            found = true;
            break;
        }
    }
    assert!(found, "watcher should rebuild after a new file appears");
}

#[tokio::test]
async fn explicit_certificate_serves_https() {
    let dir = common::site(&[("index.html", b"home")]);
    let certs = tempfile::tempdir().unwrap();
    let (cert, key) = common::self_signed_pair(certs.path(), &["localhost", "127.0.0.1"]);

    let mut config = common::config(28428, dir.path());
    config.tls.cert = Some(cert);
    config.tls.key = Some(key);
    let server = common::start(config).await;

    assert!(server.is_https());
    assert_eq!(server.url(), "https://127.0.0.1:28428/");

    let res = common::insecure_client().get(server.url()).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "home");
}

#[tokio::test]
async fn failed_provisioning_falls_back_to_http() {
    let dir = common::site(&[("index.html", b"home")]);
    let cache = tempfile::tempdir().unwrap();

    let mut config = common::config(28429, dir.path());
    config.tls.ssl = true;
    config.tls.cache_dir = cache.path().to_path_buf();
    // Nothing listens here, so the generator download fails.
    config.tls.download_base = "http://127.0.0.1:28430/releases".to_string();
    let server = common::start(config).await;

    assert!(!server.is_https());
    assert_eq!(server.url(), "http://127.0.0.1:28429/");

    let res = common::client().get(server.url()).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "home");
}
