//! End-to-end relay tests against a loopback capture process

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use mjpg_relay::capture::{CameraConfig, CaptureControl, StaticCameras};
use mjpg_relay::protocol::{digest_header, DigestChallenge};
use mjpg_relay::{CameraId, ConnectionPhase, RelaySupervisor, SupervisorConfig};

#[derive(Default)]
struct RecordingCapture {
    calls: Mutex<Vec<String>>,
}

impl RecordingCapture {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CaptureControl for RecordingCapture {
    fn stop(&self, invalidate: bool) {
        self.calls.lock().unwrap().push(format!("stop({})", invalidate));
    }

    fn start(&self, deferred: bool) {
        self.calls.lock().unwrap().push(format!("start({})", deferred));
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn supervisor(
    config: SupervisorConfig,
    cameras: StaticCameras,
) -> (Arc<RelaySupervisor>, Arc<RecordingCapture>) {
    init_tracing();
    let capture = Arc::new(RecordingCapture::default());
    let supervisor = Arc::new(RelaySupervisor::new(
        config,
        Arc::new(cameras),
        Arc::clone(&capture) as Arc<dyn CaptureControl>,
    ));
    (supervisor, capture)
}

async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Read one request, up to and including its final blank line
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before finishing its request");
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8(buf).unwrap()
}

/// Write a frame every `period` until the peer goes away
async fn stream_frames(stream: &mut TcpStream, period: Duration) {
    let mut seq = 0u32;
    loop {
        let payload = format!("JPEG{:04}", seq);
        let frame = format!("Content-Length: {}\r\n\r\n{}", payload.len(), payload);
        if stream.write_all(frame.as_bytes()).await.is_err() {
            return;
        }
        seq += 1;
        tokio::time::sleep(period).await;
    }
}

/// Poll `check` every 10ms for up to two seconds
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_frames_relayed() {
    let (listener, port) = listener().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        assert_eq!(request, "GET / HTTP/1.0\r\n\r\n");

        stream
            .write_all(b"HTTP/1.0 200 OK\r\nServer: Motion\r\nContent-Type: multipart/x-mixed-replace; boundary=BoundaryString\r\n\r\n")
            .await
            .unwrap();
        stream_frames(&mut stream, Duration::from_millis(20)).await;
    });

    let cameras = StaticCameras::new().with_camera(1, CameraConfig::local(port));
    let (supervisor, capture) = supervisor(SupervisorConfig::default(), cameras);

    assert!(supervisor.get_frame(CameraId(1)).is_none());
    assert!(eventually(|| supervisor.get_fps(CameraId(1)) > 0.0).await);

    let frame = supervisor.get_frame(CameraId(1)).unwrap();
    assert!(frame.starts_with(b"JPEG"));
    assert_eq!(frame.len(), 8);

    let stats = supervisor.stats(CameraId(1)).unwrap();
    assert!(stats.phase.is_streaming());
    assert!(stats.frames_received >= 4);
    assert_eq!(supervisor.connection_count(), 1);
    assert!(capture.calls().is_empty());

    supervisor.close_all(true);
}

#[tokio::test]
async fn test_basic_challenge_answered_once() {
    let (listener, port) = listener().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let first = read_request(&mut stream).await;
        assert!(!first.contains("Authorization"));
        stream
            .write_all(b"HTTP/1.0 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"Motion\"\r\n\r\n")
            .await
            .unwrap();

        let second = read_request(&mut stream).await;
        assert_eq!(
            second,
            "GET / HTTP/1.0\r\n\r\nAuthorization: Basic dXNlcjpwYXNz\r\n\r\n"
        );
        stream.write_all(b"HTTP/1.0 200 OK\r\n\r\n").await.unwrap();
        stream_frames(&mut stream, Duration::from_millis(20)).await;
    });

    let cameras = StaticCameras::new()
        .with_camera(1, CameraConfig::local(port).with_auth(2, "user:pass"));
    let (supervisor, _capture) = supervisor(SupervisorConfig::default(), cameras);

    supervisor.get_frame(CameraId(1));
    assert!(eventually(|| supervisor.get_frame(CameraId(1)).is_some()).await);

    supervisor.close_all(true);
}

#[tokio::test]
async fn test_digest_challenge_answered() {
    let (listener, port) = listener().await;
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        read_request(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Digest realm=\"Motion Camera\", nonce=\"9f8e7d\"\r\n\r\n")
            .await
            .unwrap();

        let _ = tx.send(read_request(&mut stream).await);
        stream.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
        stream_frames(&mut stream, Duration::from_millis(20)).await;
    });

    let cameras = StaticCameras::new()
        .with_camera(1, CameraConfig::local(port).with_auth(2, "admin:secret"));
    let (supervisor, _capture) = supervisor(SupervisorConfig::default(), cameras);
    supervisor.get_frame(CameraId(1));

    let request = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .unwrap()
        .unwrap();
    let expected = digest_header(
        "GET",
        "/",
        "admin",
        "secret",
        &DigestChallenge::new("Motion Camera", "9f8e7d"),
    );
    assert_eq!(
        request,
        format!("GET / HTTP/1.0\r\n\r\nAuthorization: {}\r\n\r\n", expected)
    );
    assert!(eventually(|| supervisor.get_frame(CameraId(1)).is_some()).await);

    supervisor.close_all(true);
}

#[tokio::test]
async fn test_refused_connection_is_benign() {
    // Grab a free port, then stop listening on it
    let (listener, port) = listener().await;
    drop(listener);

    let cameras = StaticCameras::new().with_camera(1, CameraConfig::local(port));
    let (supervisor, capture) = supervisor(SupervisorConfig::default(), cameras);

    for _ in 0..3 {
        assert!(supervisor.get_frame(CameraId(1)).is_none());
        assert!(eventually(|| supervisor.connection_count() == 0).await);
    }

    let stats = supervisor.supervisor_stats();
    assert_eq!(stats.total_connections, 3);
    assert_eq!(stats.erroneous_closes, 0);
    assert!(capture.calls().is_empty());
}

#[tokio::test]
async fn test_protocol_error_burst_restarts_capture() {
    let (listener, port) = listener().await;
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                read_request(&mut stream).await;
                let _ = stream
                    .write_all(b"HTTP/1.0 200 OK\r\nContent-Length: unknown\r\n\r\n")
                    .await;
                tokio::time::sleep(Duration::from_secs(5)).await;
            });
        }
    });

    let cameras = StaticCameras::new()
        .with_camera(1, CameraConfig::local(port))
        .with_camera(2, CameraConfig::local(port));
    let (supervisor, capture) = supervisor(SupervisorConfig::default(), cameras);

    supervisor.get_frame(CameraId(1));
    supervisor.get_frame(CameraId(2));

    assert!(eventually(|| capture.calls().len() == 2).await);
    assert_eq!(capture.calls(), vec!["stop(true)", "start(true)"]);
    assert_eq!(supervisor.connection_count(), 0);

    let stats = supervisor.supervisor_stats();
    assert_eq!(stats.erroneous_closes, 2);
    assert_eq!(stats.restarts, 1);
}

#[tokio::test]
async fn test_stalled_stream_restarts_capture() {
    let (listener, port) = listener().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream.write_all(b"HTTP/1.0 200 OK\r\n\r\n").await.unwrap();
        // No frames ever follow
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let config = SupervisorConfig::default().frame_timeout(Duration::from_millis(200));
    let cameras = StaticCameras::new().with_camera(1, CameraConfig::local(port));
    let (supervisor, capture) = supervisor(config, cameras);
    let sweep = supervisor.start();

    supervisor.get_frame(CameraId(1));
    assert!(eventually(|| !capture.calls().is_empty()).await);
    assert_eq!(capture.calls(), vec!["stop(true)", "start(true)"]);
    assert_eq!(supervisor.connection_count(), 0);

    sweep.abort();
}

#[tokio::test]
async fn test_close_releases_socket() {
    let (listener, port) = listener().await;
    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream
            .write_all(b"HTTP/1.0 200 OK\r\nContent-Length: 4\r\n\r\nJPEG")
            .await
            .unwrap();

        // The client never writes again; EOF means it let go
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.unwrap_or(0);
        let _ = closed_tx.send(n);
    });

    let cameras = StaticCameras::new().with_camera(1, CameraConfig::local(port));
    let (supervisor, _capture) = supervisor(SupervisorConfig::default(), cameras);

    supervisor.get_frame(CameraId(1));
    assert!(eventually(|| supervisor.get_frame(CameraId(1)).is_some()).await);
    assert_eq!(
        supervisor.get_frame(CameraId(1)),
        Some(Bytes::from_static(b"JPEG"))
    );
    assert_eq!(
        supervisor.stats(CameraId(1)).unwrap().phase,
        ConnectionPhase::AwaitingContentLength
    );

    assert!(supervisor.close(CameraId(1)));
    let read = tokio::time::timeout(Duration::from_secs(2), closed_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read, 0);
    assert_eq!(supervisor.connection_count(), 0);
}
