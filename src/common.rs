use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use aurora_config::AppConfig;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::{AppMode, Application};
use crate::shutdown::ShutdownManager;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// 通用的应用启动配置
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// 未指定时按默认路径搜索配置文件
    pub config_path: Option<String>,
    pub log_level: String,
    pub log_format: String,
}

/// 初始化日志系统，`RUST_LOG` 优先于命令行日志级别
pub fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 加载应用配置
pub fn load_config(startup_config: &StartupConfig) -> Result<AppConfig> {
    let path = startup_config.config_path.as_deref();
    AppConfig::load(path).with_context(|| match path {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载默认配置失败".to_string(),
    })
}

/// 启动应用程序的通用函数
pub async fn start_application(
    startup_config: StartupConfig,
    app_mode: AppMode,
    service_name: &str,
) -> Result<()> {
    init_logging(&startup_config.log_level, &startup_config.log_format)?;

    info!("启动 {} 服务", service_name);
    match startup_config.config_path {
        Some(ref path) => info!("配置文件: {}", path),
        None => info!("未指定配置文件，使用默认搜索路径"),
    }

    let config = load_config(&startup_config)?;
    info!(
        "已知接入点 {} 个，请求超时 {} 秒",
        config.directory.known_destinations.len(),
        config.dispatcher.request_timeout_seconds
    );

    let app = Arc::new(Application::new(config)?);
    let shutdown_manager = ShutdownManager::new();

    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe();
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.run(app_mode, shutdown_rx).await })
    };

    // 单次发送模式下应用会自行结束
    let finished = tokio::select! {
        result = &mut app_handle => Some(result),
        _ = wait_for_shutdown_signal() => None,
    };

    let result = match finished {
        Some(result) => result.context("应用任务异常退出")?,
        None => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown();

            match tokio::time::timeout(SHUTDOWN_TIMEOUT, app_handle).await {
                Ok(joined) => joined.context("应用任务异常退出")?,
                Err(_) => {
                    warn!("{} 服务关闭超时，强制退出", service_name);
                    Ok(())
                }
            }
        }
    };

    if let Err(ref e) = result {
        error!("应用运行失败: {e:#}");
    }
    info!("{} 服务已退出", service_name);
    result
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
