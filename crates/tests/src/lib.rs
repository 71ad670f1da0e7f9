//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置加载到会话的贯通测试
//! - 端到端测试（本地文件 + 网络镜像 + 合并日志）
//! - 并发注册竞争、关闭幂等、连接失败重试

#[cfg(test)]
mod support {
    use std::collections::HashMap;
    use std::time::Duration;

    use contracts::{RecorderConfig, TimeZoneMode};
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    /// Local-only configuration rooted in `dir`, UTC timestamps
    pub fn local_config(dir: &TempDir, prefix: &str) -> RecorderConfig {
        let mut config = RecorderConfig::with_prefix(prefix);
        config.storage.root = dir.path().to_path_buf();
        config.network.enabled = false;
        config.format.timezone = TimeZoneMode::Utc;
        config
    }

    /// Same as [`local_config`] with the mirror pointed at `listener`
    pub fn mirrored_config(dir: &TempDir, prefix: &str, listener: &TcpListener) -> RecorderConfig {
        let mut config = local_config(dir, prefix);
        config.network.enabled = true;
        config.network.host = "127.0.0.1".to_string();
        config.network.port = listener.local_addr().unwrap().port();
        config
    }

    /// Drain every pending connection on `listener`, keyed by header line
    ///
    /// Call after the session is shut down: the mirror sockets are closed by
    /// then, so each stream reads to EOF.
    pub async fn collect_streams(listener: &TcpListener) -> HashMap<String, Vec<String>> {
        let mut streams = HashMap::new();
        while let Ok(Ok((socket, _))) =
            tokio::time::timeout(Duration::from_millis(200), listener.accept()).await
        {
            let mut lines = BufReader::new(socket).lines();
            let header = lines.next_line().await.unwrap().unwrap_or_default();
            let mut body = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                body.push(line);
            }
            assert!(
                streams.insert(header.clone(), body).is_none(),
                "two mirror connections for {header}"
            );
        }
        streams
    }
}

#[cfg(test)]
mod contract_tests {
    use super::support::local_config;
    use config_loader::ConfigLoader;
    use contracts::{ChannelId, RecorderConfig, SensorRecord};
    use ingestion::Session;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_channel_suffix_names_files_and_header() {
        let mut config = RecorderConfig::with_prefix("walk");
        config.session.sequence = 2;
        let channel = ChannelId::from("android.sensor.light");

        assert_eq!(config.version, contracts::ConfigVersion::V1);
        assert!(config
            .channel_log_path(channel.suffix())
            .ends_with("walk_SensorData/light.txt"));
        assert_eq!(config.network_header(channel.suffix()), "walk_light2");
    }

    #[tokio::test]
    async fn test_config_file_drives_session_layout() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("recordings");
        let path = dir.path().join("recorder.toml");
        fs::write(
            &path,
            format!(
                "[storage]\nroot = {:?}\n\n[session]\nprefix = \"run\"\nsequence = 4\n\n\
                 [window]\nthreshold_ms = 25\n\n[network]\nenabled = false\n\n\
                 [format]\ntimezone = \"utc\"\n",
                root.display().to_string()
            ),
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.session_dir(), root.join("run_SensorData"));
        assert_eq!(config.network_header("light"), "run_light4");

        let session = Session::start(config.clone()).unwrap();
        for (ts, v) in [(1000, 1.0), (1020, 2.0), (1100, 3.0)] {
            session
                .ingest(SensorRecord::new("android.sensor.light", ts, vec![v]))
                .await
                .unwrap();
        }
        let summary = session.shutdown().await.unwrap();

        // 25ms threshold: 1000 and 1020 share a window, 1100 opens another
        assert_eq!(summary.windows_opened, 2);
        assert!(config.merged_log_path().ends_with("run_SensorData/SameTime.txt"));
        assert_eq!(
            fs::read_to_string(config.channel_log_path("light"))
                .unwrap()
                .lines()
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn test_shutdown_without_ingest_leaves_empty_merged_log() {
        let dir = tempdir().unwrap();
        let config = local_config(&dir, "idle");
        let session = Session::start(config.clone()).unwrap();

        assert!(session.shutdown().await.is_some());
        assert!(session.shutdown().await.is_none());

        assert_eq!(fs::read_to_string(config.merged_log_path()).unwrap(), "");
        assert_eq!(session.channel_count(), 0);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{SensorRecord, SessionClock};
    use dispatcher::ParsedLocalLine;
    use ingestion::{IngestionError, Session};
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    use super::support::{collect_streams, local_config, mirrored_config};

    /// End-to-end: three records, two channels, W=10
    ///
    /// 验证：
    /// 1. 每个通道的本地文件只包含自己的记录
    /// 2. 网络镜像先收到 header，再收到记录
    /// 3. 合并日志分成两个窗口，首个窗口包含 A@1000 与 B@1003
    #[tokio::test]
    async fn test_e2e_two_channels_two_windows() {
        let dir = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = mirrored_config(&dir, "e2e", &listener);

        let clock = SessionClock::starting_at(1000);
        let session = Session::start(config.clone()).unwrap().with_clock(clock);

        let records = [
            ("A", 1000, vec![1.0, 2.0]),
            ("B", 1003, vec![3.0]),
            ("A", 1050, vec![1.1, 2.1]),
        ];
        for (channel, ts, values) in records {
            let record = SensorRecord::new(channel, ts, values)
                .with_relative_time(session.clock().relative_seconds(ts));
            session.ingest(record).await.unwrap();
        }

        let summary = session.shutdown().await.unwrap();
        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.windows_opened, 2);
        assert_eq!(summary.write_failures, 0);

        let local_a = fs::read_to_string(config.channel_log_path("A")).unwrap();
        let local_b = fs::read_to_string(config.channel_log_path("B")).unwrap();
        assert_eq!(local_a.lines().count(), 2);
        assert_eq!(
            local_b,
            "1003.000 1970-01-01 12:00:01:003 3.000\n"
        );

        let merged = fs::read_to_string(config.merged_log_path()).unwrap();
        assert_eq!(
            merged,
            "START\n\
             1970-01-01 12:00:01:000\n\
             1970-01-01 12:00:01:000 A : 1.000 2.000\n\
             1970-01-01 12:00:01:003 B : 3.000\n\
             END\n\
             START\n\
             1970-01-01 12:00:01:050\n\
             1970-01-01 12:00:01:050 A : 1.100 2.100\n\
             END\n"
        );
        assert_eq!(merged.matches("START").count(), 2);
        assert_eq!(merged.matches("END").count(), 2);

        let streams = collect_streams(&listener).await;
        assert_eq!(streams.len(), 2);
        assert_eq!(
            streams["e2e_A1"],
            vec![
                "0.000 1970-01-01 12:00:01:000 1.000 2.000",
                "0.050 1970-01-01 12:00:01:050 1.100 2.100",
            ]
        );
        assert_eq!(streams["e2e_B1"], vec!["0.003 1970-01-01 12:00:01:003 3.000"]);

        for (_, snapshot) in session.metrics() {
            assert_eq!(snapshot.total_failures(), 0);
        }
    }

    /// 并发生产者注册同一批通道：每个通道只建立一次 sink
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_register_once() {
        let dir = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = mirrored_config(&dir, "race", &listener);
        let session = Arc::new(Session::start(config.clone()).unwrap());

        const PRODUCERS: i64 = 8;
        const PER_PRODUCER: i64 = 25;
        let channels = ["sensor.accel", "sensor.gyro", "sensor.light"];

        let mut tasks = Vec::new();
        for producer in 0..PRODUCERS {
            let session = Arc::clone(&session);
            tasks.push(tokio::spawn(async move {
                for i in 0..PER_PRODUCER {
                    for (c, channel) in channels.iter().enumerate() {
                        let ts = 10_000 + i * 100 + producer;
                        let values = vec![producer as f64; c + 1];
                        session
                            .ingest(SensorRecord::new(*channel, ts, values))
                            .await
                            .unwrap();
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let summary = session.shutdown().await.unwrap();
        let expected = (PRODUCERS * PER_PRODUCER) as u64;
        assert_eq!(summary.total_records, expected * channels.len() as u64);
        assert_eq!(session.channel_count(), channels.len());

        for suffix in ["accel", "gyro", "light"] {
            let local = fs::read_to_string(config.channel_log_path(suffix)).unwrap();
            assert_eq!(local.lines().count() as u64, expected, "{suffix}");
        }

        // One mirror connection per channel, each with every record
        let streams = collect_streams(&listener).await;
        assert_eq!(streams.len(), channels.len());
        for suffix in ["accel", "gyro", "light"] {
            assert_eq!(streams[&format!("race_{suffix}1")].len() as u64, expected);
        }
    }

    /// 同后缀的两个通道：后来者被拒绝，先注册者的文件和镜像流不受影响
    #[tokio::test]
    async fn test_shared_suffix_rejected_without_touching_owner() {
        let dir = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = mirrored_config(&dir, "dup", &listener);
        let session = Session::start(config.clone()).unwrap();

        session
            .ingest(SensorRecord::new("android.sensor.light", 1000, vec![5.0]))
            .await
            .unwrap();
        let err = session
            .ingest(SensorRecord::new("vendor.light", 1001, vec![9.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::SuffixConflict { .. }), "got {err}");
        session
            .ingest(SensorRecord::new("android.sensor.light", 1002, vec![6.0]))
            .await
            .unwrap();

        let summary = session.shutdown().await.unwrap();
        assert_eq!(summary.total_records, 2);

        let local = fs::read_to_string(config.channel_log_path("light")).unwrap();
        let values: Vec<_> = local
            .lines()
            .map(|line| ParsedLocalLine::parse(line).unwrap().values)
            .collect();
        assert_eq!(values, vec![vec![5.0], vec![6.0]]);

        // A single mirror connection carried the owner's header
        let streams = collect_streams(&listener).await;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams["dup_light1"].len(), 2);
    }

    /// 通道后缀不能作为文件名时拒绝，不在会话目录外创建任何文件
    #[tokio::test]
    async fn test_unsafe_channel_name_stays_inside_session_dir() {
        let dir = tempdir().unwrap();
        let escape_dir = dir.path().join("escape");
        let config = local_config(&dir, "safe");
        let session = Session::start(config.clone()).unwrap();

        let channel = format!("a.{}", escape_dir.join("outside").display());
        let err = session
            .ingest(SensorRecord::new(channel.as_str(), 1000, vec![1.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::InvalidRecord(_)), "got {err}");
        assert!(!err.is_retryable());

        session.shutdown().await;
        assert!(!escape_dir.exists());
        assert_eq!(fs::read_dir(config.session_dir()).unwrap().count(), 1);
    }

    /// 本地日志行解析回原始记录，精度 3 位小数
    #[tokio::test]
    async fn test_local_lines_round_trip() {
        let dir = tempdir().unwrap();
        let config = local_config(&dir, "trip");
        let session = Session::start(config.clone()).unwrap();

        let originals = vec![
            SensorRecord::new("sensor.magnet", 1_617_000_000_001, vec![12.3456, -0.0004, 7.0]),
            SensorRecord::new("sensor.magnet", 1_617_000_000_021, vec![-98.7654, 0.5, 1e3]),
        ];
        for record in &originals {
            session.ingest(record.clone()).await.unwrap();
        }
        session.shutdown().await;

        let local = fs::read_to_string(config.channel_log_path("magnet")).unwrap();
        let parsed: Vec<_> = local
            .lines()
            .map(|line| ParsedLocalLine::parse(line).unwrap())
            .collect();
        assert_eq!(parsed.len(), originals.len());

        for (parsed, original) in parsed.iter().zip(&originals) {
            assert!((parsed.timestamp_ms - original.timestamp_ms as f64).abs() < 1e-3);
            assert_eq!(parsed.values.len(), original.values.len());
            for (p, o) in parsed.values.iter().zip(&original.values) {
                assert!((p - o).abs() <= 5e-4, "{p} vs {o}");
            }
        }
    }

    /// 采集端不可达时注册失败，通道保持未注册，下一次 ingest 重试
    #[tokio::test]
    async fn test_connection_failure_retried_on_next_ingest() {
        let dir = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = mirrored_config(&dir, "retry", &listener);
        let port = config.network.port;
        drop(listener);

        let session = Session::start(config.clone()).unwrap();
        let err = session
            .ingest(SensorRecord::new("sensor.baro", 1000, vec![1013.25]))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::Connection { .. }), "got {err}");
        assert!(err.is_retryable());
        assert_eq!(session.channel_count(), 0);

        // Collector comes up on the same port
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        session
            .ingest(SensorRecord::new("sensor.baro", 1010, vec![1013.5]))
            .await
            .unwrap();
        assert_eq!(session.channel_count(), 1);
        session.shutdown().await;

        let local = fs::read_to_string(config.channel_log_path("baro")).unwrap();
        assert_eq!(local.lines().count(), 1);

        let streams = collect_streams(&listener).await;
        assert_eq!(streams["retry_baro1"].len(), 1);
    }

    /// 采集端中途断开：网络写入失败被计数，本地文件不受影响
    #[tokio::test]
    async fn test_broken_mirror_does_not_stop_local_writes() {
        let dir = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = mirrored_config(&dir, "broken", &listener);
        let session = Session::start(config.clone()).unwrap();

        session
            .ingest(SensorRecord::new("sensor.step", 1000, vec![1.0]))
            .await
            .unwrap();

        // Collector hangs up right after accepting
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
        tokio::time::sleep(Duration::from_millis(50)).await;

        for i in 1..20 {
            session
                .ingest(SensorRecord::new("sensor.step", 1000 + i * 100, vec![i as f64]))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let summary = session.shutdown().await.unwrap();
        assert_eq!(summary.total_records, 20);

        let local = fs::read_to_string(config.channel_log_path("step")).unwrap();
        assert_eq!(local.lines().count(), 20);

        let (_, snapshot) = &session.metrics()[0];
        assert_eq!(snapshot.local.write_count, 20);
        assert!(snapshot.network.failure_count > 0);
        assert_eq!(
            snapshot.network.write_count + snapshot.network.failure_count,
            20
        );
    }

    /// 关闭后 ingest 返回 SessionClosed，已接收的记录全部落盘
    #[tokio::test]
    async fn test_shutdown_drains_then_rejects() {
        let dir = tempdir().unwrap();
        let config = local_config(&dir, "drain");
        let session = Session::start(config.clone()).unwrap();

        for i in 0..500 {
            session
                .ingest(SensorRecord::new("sensor.accel", 1000 + i, vec![0.0, 0.0, 9.81]))
                .await
                .unwrap();
        }
        let summary = session.shutdown().await.unwrap();
        assert_eq!(summary.total_records, 500);

        let err = session
            .ingest(SensorRecord::new("sensor.accel", 9999, vec![0.0, 0.0, 9.81]))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::SessionClosed));

        let local = fs::read_to_string(config.channel_log_path("accel")).unwrap();
        assert_eq!(local.lines().count(), 500);

        let merged = fs::read_to_string(config.merged_log_path()).unwrap();
        assert!(merged.ends_with("END\n"));
        assert_eq!(merged.matches("START").count(), merged.matches("END").count());
    }
}
