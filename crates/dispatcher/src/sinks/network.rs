//! NetworkSink - persistent TCP mirror to the remote collector

use contracts::{ContractError, LineSink, NetworkConfig};
use std::net::SocketAddr;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

/// Sink that streams lines over a dedicated TCP connection
///
/// One connection per channel, opened once and kept for the whole session.
/// Delivery is best effort: there is no acknowledgement or reconnect once the
/// connection breaks.
pub struct NetworkSink {
    name: String,
    peer: Option<SocketAddr>,
    stream: Option<BufWriter<TcpStream>>,
}

impl NetworkSink {
    /// Connect to the configured endpoint, honoring its retry policy
    ///
    /// # Errors
    /// `SinkConnection` once every allowed attempt has failed or timed out.
    #[instrument(
        name = "network_sink_connect",
        skip(name, config),
        fields(endpoint = %config.endpoint())
    )]
    pub async fn connect(
        name: impl Into<String>,
        config: &NetworkConfig,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let endpoint = config.endpoint();
        let attempts = config.attempts();
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = config.backoff_delay(attempt - 1);
                debug!(sink = %name, attempt, delay_ms = delay.as_millis() as u64, "Retrying connection");
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(config.connect_timeout(), TcpStream::connect(endpoint.as_str()))
                .await
            {
                Ok(Ok(stream)) => {
                    // Lines are small and flushed one by one
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(sink = %name, error = %e, "Failed to set TCP_NODELAY");
                    }
                    let peer = stream.peer_addr().ok();
                    debug!(sink = %name, endpoint = %endpoint, attempt, "NetworkSink connected");
                    return Ok(Self {
                        name,
                        peer,
                        stream: Some(BufWriter::new(stream)),
                    });
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!("timed out after {}ms", config.connect_timeout_ms)
                }
            }

            warn!(sink = %name, endpoint = %endpoint, attempt, error = %last_error, "Connection attempt failed");
        }

        Err(ContractError::sink_connection(
            name,
            format!("{endpoint} unreachable after {attempts} attempt(s): {last_error}"),
        ))
    }

    /// Send the one-time session header line
    pub async fn send_header(&mut self, header: &str) -> Result<(), ContractError> {
        self.write_line(&format!("{header}\n")).await
    }

    /// Remote address, if the connection reported one
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl LineSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write_line(&mut self, line: &str) -> Result<(), ContractError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ContractError::sink_closed(&self.name))?;

        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "network_sink_flush", skip(self), fields(sink = %self.name))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        match self.stream.as_mut() {
            Some(stream) => stream
                .flush()
                .await
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string())),
            None => Ok(()),
        }
    }

    #[instrument(name = "network_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        // shutdown() flushes the buffer before closing the write half
        stream
            .shutdown()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::RetryPolicy;
    use std::time::{Duration, Instant};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, NetworkConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = NetworkConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        };
        (listener, config)
    }

    #[tokio::test]
    async fn test_network_sink_header_then_lines() {
        let (listener, config) = listener().await;

        let collector = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(line);
            }
            received
        });

        let mut sink = NetworkSink::connect("accel", &config).await.unwrap();
        assert!(sink.peer().is_some());
        sink.send_header("walk_accel1").await.unwrap();
        sink.write_line("0.000 a 1.000\n").await.unwrap();
        sink.write_line("0.010 b 2.000\n").await.unwrap();
        sink.close().await.unwrap();

        let received = collector.await.unwrap();
        assert_eq!(received, vec!["walk_accel1", "0.000 a 1.000", "0.010 b 2.000"]);
    }

    #[tokio::test]
    async fn test_network_sink_connection_refused() {
        // Bind then drop to get a port with nothing listening
        let (listener, config) = listener().await;
        drop(listener);

        let err = NetworkSink::connect("gyro", &config).await.err().unwrap();
        assert!(matches!(err, ContractError::SinkConnection { .. }));
        assert!(err.to_string().contains("1 attempt(s)"), "got: {err}");
    }

    #[tokio::test]
    async fn test_network_sink_backoff_retries() {
        let (listener, mut config) = listener().await;
        drop(listener);
        config.retry_policy = RetryPolicy::Backoff;
        config.max_attempts = 3;
        config.initial_backoff_ms = 20;

        let started = Instant::now();
        let err = NetworkSink::connect("gyro", &config).await.err().unwrap();
        assert!(err.to_string().contains("3 attempt(s)"), "got: {err}");
        // 20ms + 40ms of backoff between the three attempts
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_network_sink_close_is_idempotent() {
        let (listener, config) = listener().await;
        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });

        let mut sink = NetworkSink::connect("light", &config).await.unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();
        assert!(sink.is_closed());

        let err = sink.write_line("late\n").await.unwrap_err();
        assert!(matches!(err, ContractError::SinkClosed { .. }));
        accept.await.unwrap().unwrap();
    }
}
