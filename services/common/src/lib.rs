use std::{env, io, net::SocketAddr, path::PathBuf, str::FromStr};
use tokio::net::TcpListener;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt, layer::Layered, layer::SubscriberExt, EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

pub struct TracingGuards {
    _file_guard: Option<WorkerGuard>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "pretty" | "plain" => Ok(LogFormat::Text),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Installs the global subscriber: stdout always, plus a daily rolling file
/// under `$LOG_DIR/<service_name>` when `LOG_DIR` is set.
///
/// Keep the returned guard alive for the whole process, dropping it stops the
/// background file writer.
pub fn init_tracing(service_name: &str) -> TracingGuards {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let format = env_or("LOG_FORMAT", LogFormat::Json);

    let mut layers: Vec<BoxedLayer> = vec![stdout_layer(format)];
    let mut file_guard: Option<WorkerGuard> = None;
    let mut file_error: Option<String> = None;

    if let Ok(log_dir) = env::var("LOG_DIR") {
        let log_root = PathBuf::from(log_dir).join(service_name);
        let max_files = env_or("LOG_MAX_FILES", 14usize);
        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(service_name)
            .filename_suffix("log")
            .max_log_files(max_files)
            .build(&log_root)
        {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                layers.push(
                    fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_writer(writer)
                        .boxed(),
                );
                file_guard = Some(guard);
            }
            Err(err) => file_error = Some(format!("{}: {err}", log_root.display())),
        }
    }

    let subscriber = Registry::default().with(filter).with(layers);
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Reported only once the subscriber exists.
    if let Some(err) = file_error {
        tracing::warn!(error = %err, "file logging disabled");
    }

    TracingGuards {
        _file_guard: file_guard,
    }
}

fn stdout_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(io::stdout)
            .boxed(),
        LogFormat::Text => fmt::layer().with_writer(io::stdout).boxed(),
    }
}

pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    // Unset or unparsable values fall back silently.
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

pub async fn bind_listener(port: u16) -> io::Result<TcpListener> {
    // All interfaces, the service runs in containers.
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr).await
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "sigterm handler unavailable");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }

    tracing::info!("shutdown signal received");
}
