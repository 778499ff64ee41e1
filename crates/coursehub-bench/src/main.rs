//! WebSocket load generator.
//!
//! Opens many concurrent sessions against a running server, then fires
//! a synchronized burst of `Y <courseid>` requests to exercise the
//! admission path under contention. Traffic is logged per client.

use std::time::Duration;

use clap::Parser;
use futures::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line options.
#[derive(Debug, Parser)]
#[command(name = "coursehub-bench", about = "Coursehub WebSocket load generator")]
struct Args {
    /// WebSocket endpoint.
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,
    /// Session cookie value to authenticate with.
    #[arg(long)]
    cookie: String,
    /// Number of concurrent connections.
    #[arg(short = 'n', long, default_value_t = 1000)]
    connections: usize,
    /// Course id to choose; omit to spread clients across `--courses`.
    #[arg(short = 'c', long)]
    course: Option<i32>,
    /// Number of catalogue courses to spread over when no fixed course
    /// is given.
    #[arg(long, default_value_t = 13)]
    courses: i32,
    /// Seconds to wait after ramp-up before the burst.
    #[arg(long, default_value_t = 5)]
    countdown: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let (trigger_tx, trigger_rx) = watch::channel(false);

    let mut clients = Vec::with_capacity(args.connections);
    for cid in 0..args.connections {
        let course = args
            .course
            .unwrap_or_else(|| (cid as i32 % args.courses.max(1)) + 1);
        clients.push(tokio::spawn(run_client(
            cid,
            args.url.clone(),
            args.cookie.clone(),
            course,
            trigger_rx.clone(),
        )));
        // Pace the ramp so the server's accept queue is not the thing
        // being measured.
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    for remaining in (1..=args.countdown).rev() {
        info!(remaining, "waiting before trigger");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    let _ = trigger_tx.send(true);
    info!("burst triggered");

    for client in clients {
        let _ = client.await;
    }
}

/// One client: connect, greet, await the trigger, choose, keep reading.
async fn run_client(
    cid: usize,
    url: String,
    cookie: String,
    course: i32,
    mut trigger: watch::Receiver<bool>,
) {
    let mut request = match url.as_str().into_client_request() {
        Ok(r) => r,
        Err(e) => {
            error!(cid, error = %e, "bad endpoint URL");
            return;
        }
    };
    let headers = request.headers_mut();
    headers.insert("Sec-WebSocket-Protocol", "cca1".parse().expect("protocol"));
    headers.insert(
        "Cookie",
        format!("session={cookie}").parse().expect("cookie header"),
    );

    let (ws, _response) = match connect_async(request).await {
        Ok(pair) => pair,
        Err(e) => {
            error!(cid, error = %e, "connect failed");
            return;
        }
    };
    let (mut tx, mut rx) = ws.split();

    if write(cid, &mut tx, "HELLO".to_string()).await.is_err() {
        return;
    }

    let reader = tokio::spawn(async move {
        while let Some(message) = rx.next().await {
            match message {
                Ok(Message::Text(text)) => info!(cid, "-> {text}"),
                Ok(Message::Close(_)) | Err(_) => return,
                Ok(_) => {}
            }
        }
    });

    if trigger.wait_for(|fired| *fired).await.is_err() {
        return;
    }
    let started = std::time::Instant::now();
    if write(cid, &mut tx, format!("Y {course}")).await.is_err() {
        return;
    }
    info!(cid, elapsed_us = started.elapsed().as_micros() as u64, "choose sent");

    let _ = reader.await;
}

/// Send one frame, logging it the way the reader logs replies.
async fn write<S>(cid: usize, tx: &mut S, frame: String) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    info!(cid, "<- {frame}");
    tx.send(Message::Text(frame)).await.map_err(|_| {
        error!(cid, "write failed");
    })
}
