//! Opening the served URL in the user's browser.

use std::io;

use tokio::process::Command;

/// Platform opener command for `url`.
pub fn opener(os: &str, url: &str) -> (String, Vec<String>) {
    match os {
        "macos" => ("open".to_string(), vec![url.to_string()]),
        "windows" => (
            "cmd".to_string(),
            vec!["/C".to_string(), "start".to_string(), String::new(), url.to_string()],
        ),
        _ => ("xdg-open".to_string(), vec![url.to_string()]),
    }
}

/// Launch the platform opener without waiting for the browser to exit.
pub async fn open(url: &str) -> io::Result<()> {
    let (program, args) = opener(std::env::consts::OS, url);
    let status = Command::new(&program)
        .args(&args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("{program} exited with {status}")))
    }
}
