//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Configuration flowing into each stage's settings
//! - Mock e2e: detection -> framing -> dispatch (no serial hardware)
//! - Failure delivery across the whole pipeline

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use detector::AutoDetectConfig;
    use dispatcher::DispatcherConfig;
    use std::time::Duration;

    /// The dispatcher routes on exactly the bytes `Frame::prefix` reports
    #[test]
    fn test_frame_prefix_matches_registry_routing() {
        use contracts::Frame;
        use dispatcher::{handler_fn, HandlerRegistry};
        use std::sync::Arc;

        let ping = handler_fn(|_| async { Ok(()) });
        let fallback = handler_fn(|_| async { Ok(()) });
        let keyed = HandlerRegistry::builder()
            .register("PING", ping.clone())
            .build();
        let with_default = HandlerRegistry::builder()
            .register("PING", ping.clone())
            .set_default(fallback.clone())
            .build();

        let payloads: [&[u8]; 8] = [
            b"PING 1",
            b"PING\t2",
            b"PING\r",
            b"PING",
            b"PINGX 1",
            b" PING",
            b"ping 1",
            b"",
        ];
        for (seq, payload) in payloads.into_iter().enumerate() {
            let frame = Frame::new(seq as u64, payload.to_vec());
            let routed_to_ping = frame.prefix() == b"PING";

            let resolved = keyed.resolve(&frame.payload);
            assert_eq!(resolved.is_some(), routed_to_ping, "{payload:?}");

            let resolved = with_default.resolve(&frame.payload).unwrap();
            let expected = if routed_to_ping { &ping } else { &fallback };
            assert!(Arc::ptr_eq(resolved, expected), "{payload:?}");
        }
    }

    #[test]
    fn test_blueprint_drives_stage_settings() {
        let toml = r#"
            [framing]
            delimiter = 59
            read_buffer_size = 256

            [dispatch]
            parallelism = 2
            failure_mode = "forward"

            [detection]
            pattern = "^DEV-"
            probe_timeout_ms = 750
            probe_backoff_ms = 250
            max_rounds = 3
        "#;
        let blueprint = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();

        let detect = AutoDetectConfig::from_blueprint(&blueprint);
        assert_eq!(detect.probe_timeout, Duration::from_millis(750));
        assert_eq!(detect.backoff, Duration::from_millis(250));
        assert_eq!(detect.max_rounds, Some(3));
        assert_eq!(detect.read_buffer_size, 256);

        let dispatch = DispatcherConfig::from(&blueprint.dispatch);
        assert_eq!(dispatch.parallelism, 2);
        assert_eq!(dispatch.failure_mode, contracts::FailureMode::Forward);

        let reader = framing::FrameReader::from_config(&blueprint.framing);
        assert_eq!(reader.delimiter(), b';');
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{CancellationToken, FailureMode, Transport, Verifier};
    use detector::{
        AutoDetectConfig, AutoDetector, DetectorError, MaskVerifier, MockCatalog, MockFactory,
    };
    use dispatcher::{
        handler_fn, DispatchFailureKind, Dispatcher, DispatcherConfig, HandlerError,
        HandlerRegistry,
    };
    use framing::{FrameReader, MockTransport, StopReason};
    use tokio::sync::mpsc;

    fn detect_config(max_rounds: Option<u64>) -> AutoDetectConfig {
        AutoDetectConfig {
            probe_timeout: Duration::from_millis(200),
            backoff: Duration::from_millis(50),
            max_rounds,
            candidates: Vec::new(),
            read_buffer_size: 64,
        }
    }

    fn verifier() -> Arc<dyn Verifier> {
        Arc::new(MaskVerifier::new("board-7", "^DEV-").unwrap())
    }

    /// End-to-end test: AutoDetector -> FrameReader -> Dispatcher
    ///
    /// 1. Two candidate ports, only one announces itself as the device
    /// 2. The winner's stream is framed on '\n'
    /// 3. `PING` frames are answered over the same transport, the rest counted
    #[tokio::test]
    async fn test_e2e_detect_frame_dispatch() {
        let catalog = MockCatalog::fixed(["/dev/ttyUSB0", "/dev/ttyUSB1"]);
        let factory = MockFactory::new();

        let (noise, noise_handle) = MockTransport::new("/dev/ttyUSB0");
        noise_handle.push("bootloader v2\n");
        factory.insert("/dev/ttyUSB0", noise);

        let (device, device_handle) = MockTransport::new("/dev/ttyUSB1");
        device_handle.push("DEV-7 ready\n");
        factory.insert("/dev/ttyUSB1", device);

        // Detection
        let detector = AutoDetector::new(catalog, factory, verifier(), detect_config(Some(3)));
        let detected = detector.detect(&CancellationToken::new()).await.unwrap();
        assert_eq!(detected.port, "/dev/ttyUSB1");
        assert_eq!(detected.key, b"board-7");
        assert_eq!(noise_handle.stats().closes(), 1);

        // Handlers
        let transport = Arc::new(detected.transport);
        let other = Arc::new(AtomicU64::new(0));
        let writer = transport.clone();
        let counter = other.clone();
        let registry = HandlerRegistry::builder()
            .register(
                "PING",
                handler_fn(move |message: String| {
                    let writer = writer.clone();
                    async move {
                        let rest = message.strip_prefix("PING").unwrap_or_default().trim_start();
                        writer.write(format!("PONG {rest}\n").as_bytes()).await?;
                        Ok::<(), HandlerError>(())
                    }
                }),
            )
            .set_default(handler_fn(move |_message: String| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), HandlerError>(())
                }
            }))
            .build();

        let dispatcher = Dispatcher::builder(DispatcherConfig {
            parallelism: 1,
            failure_mode: FailureMode::Log,
        })
        .registry(registry)
        .build()
        .unwrap();

        // Session
        device_handle.push("PING 1\nSTAT");
        device_handle.push("US ok\nPING 2\n");
        device_handle.push("TEMP 21.5\nPART");
        device_handle.end();

        let (tx, rx) = mpsc::channel(8);
        let dispatch_handle = dispatcher.spawn(rx);
        let mut reader = FrameReader::new(b'\n');
        let summary = reader
            .read_from(&*transport, &tx, &CancellationToken::new())
            .await
            .unwrap();
        drop(tx);
        let snapshot = dispatch_handle.await.unwrap();

        assert_eq!(summary.reason, StopReason::EndOfStream);
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.retained, 4);
        assert_eq!(reader.buffered(), b"PART");

        assert_eq!(snapshot.dispatched, 4);
        assert_eq!(snapshot.succeeded, 4);
        assert_eq!(snapshot.peak_in_flight, 1);
        assert_eq!(other.load(Ordering::SeqCst), 2);
        assert_eq!(device_handle.stats().written(), b"PONG 1\nPONG 2\n");
    }

    #[tokio::test]
    async fn test_e2e_failures_forwarded_in_order() {
        let (transport, handle) =
            MockTransport::scripted("mock0", ["FAIL first\nNOPE\n", "OK\nFAIL again\n"]);

        let registry = HandlerRegistry::builder()
            .register(
                "FAIL",
                handler_fn(|message: String| async move {
                    Err::<(), HandlerError>(HandlerError::failed(format!("rejected: {message}")))
                }),
            )
            .register(
                "OK",
                handler_fn(|_message: String| async { Ok::<(), HandlerError>(()) }),
            )
            .build();

        let (failure_tx, mut failure_rx) = mpsc::channel(16);
        let dispatcher = Dispatcher::builder(DispatcherConfig {
            parallelism: 1,
            failure_mode: FailureMode::Forward,
        })
        .registry(registry)
        .failure_sink(failure_tx)
        .build()
        .unwrap();

        let (tx, rx) = mpsc::channel(4);
        let dispatch_handle = dispatcher.spawn(rx);
        let mut reader = FrameReader::new(b'\n');
        reader
            .read_from(&transport, &tx, &CancellationToken::new())
            .await
            .unwrap();
        drop(tx);
        let snapshot = dispatch_handle.await.unwrap();

        assert_eq!(snapshot.dispatched, 4);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.unroutable, 1);

        let mut failures = Vec::new();
        while let Ok(failure) = failure_rx.try_recv() {
            failures.push(failure);
        }
        let seqs: Vec<u64> = failures.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![0, 1, 3]);
        assert!(matches!(
            failures[1].kind,
            DispatchFailureKind::Unroutable { ref prefix } if prefix == "NOPE"
        ));
        assert!(matches!(
            failures[2].kind,
            DispatchFailureKind::HandlerFailed { ref prefix, .. } if prefix == "FAIL"
        ));
        assert!(handle.stats().written().is_empty());
    }

    #[tokio::test]
    async fn test_e2e_no_device_exhausts_rounds() {
        let catalog = MockCatalog::fixed(["/dev/ttyS0"]);
        let factory = MockFactory::new();
        for _ in 0..2 {
            let (port, handle) = MockTransport::new("/dev/ttyS0");
            handle.push("console login:\n");
            factory.insert("/dev/ttyS0", port);
        }

        let detector = AutoDetector::new(catalog, factory, verifier(), detect_config(Some(2)));
        let err = detector
            .detect(&CancellationToken::new())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, DetectorError::Exhausted { rounds: 2 }));
        assert_eq!(detector.factory().opens(), 2);
    }

    #[tokio::test]
    async fn test_e2e_shutdown_during_detection_closes_candidates() {
        let catalog = MockCatalog::fixed(["a", "b"]);
        let factory = MockFactory::new();
        let (a, a_handle) = MockTransport::new("a");
        let (b, b_handle) = MockTransport::new("b");
        factory.insert("a", a);
        factory.insert("b", b);

        let mut config = detect_config(None);
        config.probe_timeout = Duration::from_secs(30);
        let detector = AutoDetector::new(catalog, factory, verifier(), config);

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(Duration::from_secs(5), detector.detect(&shutdown))
            .await
            .unwrap()
            .err()
            .unwrap();

        assert!(matches!(err, DetectorError::Cancelled));
        assert_eq!(a_handle.stats().closes(), 1);
        assert_eq!(b_handle.stats().closes(), 1);
    }
}
