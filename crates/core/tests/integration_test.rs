//! Integration tests for the full requester/service round trip.
//!
//! Every test runs a real coding service on an ephemeral localhost port and
//! drives it with the real dispatcher: text -> ranking -> one connection per
//! symbol -> codes -> report.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sfe_core::{
    coding::{decode_fraction, encode, is_prefix_free},
    cumulative::cumulative_midpoints,
    error::{Error, ProtocolError},
    metrics::ServiceMetrics,
    service::serve_connection,
    wire,
    CodingService, DispatchConfig, Dispatcher, Ranking, ServiceConfig,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A coding service running in the background until stopped.
struct TestService {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<sfe_core::Result<ServiceMetrics>>,
}

impl TestService {
    async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    async fn start_with(tweak: impl FnOnce(&mut ServiceConfig)) -> Self {
        let mut config = ServiceConfig::new("127.0.0.1:0".parse().unwrap());
        config.io_timeout = Duration::from_secs(2);
        tweak(&mut config);

        let service = CodingService::bind(config).await.expect("bind failed");
        let addr = service.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel();
        let handle = tokio::spawn(service.run_until(async {
            let _ = stopped.await;
        }));

        Self { addr, stop, handle }
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(DispatchConfig::new(self.addr.to_string()))
    }

    async fn stop(self) -> ServiceMetrics {
        self.stop.send(()).unwrap();
        self.handle.await.unwrap().unwrap()
    }
}

async fn encode_text(dispatcher: &Dispatcher, text: &str) -> String {
    let ranking = Ranking::from_text(text);
    let (report, _) = dispatcher.run(&ranking).await.expect("dispatch failed");
    report.to_string()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scenario_two_symbols() {
    let service = TestService::start().await;

    let report = encode_text(&service.dispatcher(), "aaab").await;
    assert_eq!(
        report,
        "SHANNON-FANO-ELIAS Codes:\n\nSymbol a, Code: 01\nSymbol b, Code: 111\n"
    );

    let metrics = service.stop().await;
    assert_eq!(metrics.accepted, 2);
    assert_eq!(metrics.served, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scenario_single_symbol() {
    let service = TestService::start().await;

    let report = encode_text(&service.dispatcher(), "zzzz").await;
    assert_eq!(report, "SHANNON-FANO-ELIAS Codes:\n\nSymbol z, Code: 1\n");

    service.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scenario_empty_line() {
    let service = TestService::start().await;

    let ranking = Ranking::from_text("");
    let (report, metrics) = service.dispatcher().run(&ranking).await.unwrap();
    assert_eq!(report.to_string(), "SHANNON-FANO-ELIAS Codes:\n\n");
    assert_eq!(metrics.symbols_dispatched, 0);

    let service_metrics = service.stop().await;
    assert_eq!(service_metrics.accepted, 0);
}

/// N symbols means N completed round trips before the report exists.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_symbol_gets_one_round_trip() {
    let service = TestService::start().await;

    let text = "the quick brown fox jumps over the lazy dog 0123456789 THE END";
    let ranking = Ranking::from_text(text);
    let (report, metrics) = service.dispatcher().run(&ranking).await.unwrap();

    assert_eq!(metrics.symbols_dispatched, ranking.len() as u64);
    assert_eq!(metrics.round_trips, ranking.len() as u64);
    assert_eq!(metrics.bytes_sent, 16 * ranking.len() as u64);
    assert_eq!(report.lines().len(), ranking.len());

    // Report order is rank order
    let report_symbols: Vec<char> = report.lines().iter().map(|(s, _)| *s).collect();
    let ranked_symbols: Vec<char> = ranking.iter().map(|e| e.symbol).collect();
    assert_eq!(report_symbols, ranked_symbols);

    let service_metrics = service.stop().await;
    assert_eq!(service_metrics.accepted, ranking.len() as u64);
    assert_eq!(service_metrics.served, ranking.len() as u64);
    assert_eq!(service_metrics.reaped, ranking.len() as u64);
    assert_eq!(service_metrics.failed, 0);
}

/// Codes decode back into [F - 2^-L, F] and never prefix one another.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_codes_bracket_midpoints_and_are_prefix_free() {
    let service = TestService::start().await;
    let dispatcher = service.dispatcher();
    let mut rng = ChaCha8Rng::seed_from_u64(3360);

    for _ in 0..10 {
        let alphabet_size = rng.gen_range(1..=26u8);
        let len = rng.gen_range(1..=200);
        let text: String = (0..len)
            .map(|_| {
                // Square the draw so low letters dominate
                let r: f64 = rng.gen();
                (b'a' + (r * r * alphabet_size as f64) as u8) as char
            })
            .collect();

        let ranking = Ranking::from_text(&text);
        let midpoints = cumulative_midpoints(&ranking.probabilities());
        let (report, _) = dispatcher.run(&ranking).await.unwrap();

        let codes: Vec<&str> = report.lines().iter().map(|(_, c)| c.as_str()).collect();
        assert!(is_prefix_free(&codes), "{text:?} -> {codes:?}");

        for (code, &f) in codes.iter().zip(&midpoints) {
            let decoded = decode_fraction(code);
            let ulp = 2f64.powi(-(code.len() as i32));
            assert!(decoded <= f && f < decoded + ulp, "{code} vs {f}");
        }
    }

    service.stop().await;
}

/// The service holds no per-client state, so requesters can overlap freely.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requesters() {
    let service = TestService::start().await;

    let texts = ["aaab", "zzzz", "mississippi", "abracadabra", "hello world"];
    let mut runs = Vec::new();
    for round in 0..4 {
        for text in texts {
            let dispatcher = service.dispatcher();
            runs.push(tokio::spawn(async move {
                (round, text, encode_text(&dispatcher, text).await)
            }));
        }
    }

    let sequential = service.dispatcher();
    for run in runs {
        let (_, text, report) = run.await.unwrap();
        assert_eq!(report, encode_text(&sequential, text).await);
    }

    service.stop().await;
}

/// With room for one live connection the service still serves everyone.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_connection_cap_queues_instead_of_failing() {
    let service = TestService::start_with(|config| config.max_connections = 1).await;

    let ranking = Ranking::from_text("abcdefghijklmnopqrst");
    let (report, _) = service.dispatcher().run(&ranking).await.unwrap();
    assert_eq!(report.lines().len(), 20);

    let metrics = service.stop().await;
    assert_eq!(metrics.served, 20);
}

/// A broken client costs one connection, never the service.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bad_client_does_not_stop_service() {
    let service = TestService::start().await;

    // Short frame, then hang up
    let mut stream = TcpStream::connect(service.addr).await.unwrap();
    stream.write_all(&[1, 2, 3, 4, 5]).await.unwrap();
    drop(stream);

    // Complete frame with an impossible probability
    let mut stream = TcpStream::connect(service.addr).await.unwrap();
    stream.write_all(&[0u8; 16]).await.unwrap();
    drop(stream);

    let report = encode_text(&service.dispatcher(), "aaab").await;
    assert!(report.contains("Symbol b, Code: 111"));

    let metrics = service.stop().await;
    assert_eq!(metrics.accepted, 4);
    assert_eq!(metrics.served, 2);
    assert_eq!(metrics.failed, 2);
}

/// A silent client is dropped after the service's timeout.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_silent_client_is_timed_out() {
    let service = TestService::start_with(|config| {
        config.io_timeout = Duration::from_millis(50);
    })
    .await;

    let _idle = TcpStream::connect(service.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let metrics = service.stop().await;
    assert_eq!(metrics.accepted, 1);
    assert_eq!(metrics.failed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refused_connection_is_fatal_setup_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dispatcher = Dispatcher::new(DispatchConfig::new(addr.to_string()));
    let err = dispatcher
        .run(&Ranking::from_text("aaab"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Dispatch { .. }));
    assert!(err.is_setup());
}

/// A peer that accepts but never answers trips the requester's timeout.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unresponsive_service_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let mut config = DispatchConfig::new(addr.to_string());
    config.io_timeout = Duration::from_millis(100);
    config.retries = 1;

    let err = Dispatcher::new(config)
        .run(&Ranking::from_text("zzzz"))
        .await
        .unwrap_err();

    match err {
        Error::Dispatch { rank, symbol, source } => {
            assert_eq!(rank, 0);
            assert_eq!(symbol, 'z');
            assert!(matches!(*source, Error::Timeout { .. }));
        }
        other => panic!("expected dispatch timeout, got {other:?}"),
    }
}

/// A response claiming a zero-length code is rejected, not reported.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_malformed_response_is_protocol_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            // Drain the request first so closing sends FIN rather than RST
            let mut request = [0u8; 16];
            if stream.read_exact(&mut request).await.is_ok() {
                let _ = stream.write_all(&[0, 0, 0, 0]).await;
            }
        }
    });

    let err = Dispatcher::new(DispatchConfig::new(addr.to_string()))
        .run(&Ranking::from_text("aaab"))
        .await
        .unwrap_err();

    match err {
        Error::Dispatch { source, .. } => assert!(matches!(
            *source,
            Error::Protocol(ProtocolError::CodeLengthOutOfRange { length: 0, .. })
        )),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

/// A dropped first connection is recovered by one retry.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_retry_recovers_dropped_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_connection(stream, Duration::from_secs(1)));
        }
    });

    let mut config = DispatchConfig::new(addr.to_string());
    config.retries = 2;

    let (report, metrics) = Dispatcher::new(config)
        .run(&Ranking::from_text("zzzz"))
        .await
        .unwrap();

    assert_eq!(report.code(0), Some("1"));
    assert_eq!(metrics.retries, 1);
    assert_eq!(metrics.round_trips, 1);
}

/// Answers arriving in reverse rank order still fill the report by rank.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_report_independent_of_completion_order() {
    let text = "aaaaabbbbcccdde";

    let service = TestService::start().await;
    let in_order = encode_text(&service.dispatcher(), text).await;
    service.stop().await;

    // Hold each answer longer the lower its midpoint, so rank 0 finishes last
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let answered = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&answered);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let limit = Duration::from_secs(2);
                let request = wire::read_request(&mut stream, limit).await.unwrap();
                let hold = Duration::from_millis(((1.0 - request.cumulative) * 300.0) as u64);
                tokio::time::sleep(hold).await;

                let code = encode(&request).unwrap();
                log.lock().unwrap().push(request.cumulative);
                wire::write_response(&mut stream, &code, limit).await.unwrap();
            });
        }
    });

    let reordered = encode_text(&Dispatcher::new(DispatchConfig::new(addr.to_string())), text).await;
    assert_eq!(reordered, in_order);

    let answered = answered.lock().unwrap().clone();
    assert_eq!(answered.len(), 5);
    assert!(answered.windows(2).all(|w| w[0] > w[1]));
}
