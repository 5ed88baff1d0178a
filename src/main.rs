use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Arg, Command};

use aurora::app::{AppMode, SendRequest};
use aurora::common::{start_application, StartupConfig};

fn parse_mode(matches: &clap::ArgMatches) -> Result<AppMode> {
    let Some(command_file) = matches.get_one::<String>("command-file") else {
        return Ok(AppMode::Serve);
    };

    let raw = std::fs::read_to_string(command_file)
        .with_context(|| format!("读取命令文件失败: {command_file}"))?;
    let command = aurora_foundation::Command::from_str(&raw)
        .with_context(|| format!("解析命令文件失败: {command_file}"))?;

    let destination = matches
        .get_one::<String>("destination")
        .cloned()
        .context("发送命令时必须指定 --destination")?;

    Ok(AppMode::Send(SendRequest {
        command,
        destination,
        request_id: matches.get_one::<String>("request-id").cloned(),
    }))
}

fn arg_or(matches: &clap::ArgMatches, id: &str, fallback: &str) -> String {
    matches
        .get_one::<String>(id)
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("aurora-dispatcher")
        .version("1.0.0")
        .about("Aurora 接入点控制平面 - 命令分发服务")
        .long_about("连接消息代理，向接入点分发配置命令并跟踪确认")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径（默认搜索 config/aurora.toml、aurora.toml、/etc/aurora/config.toml）"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .arg(
            Arg::new("command-file")
                .long("command-file")
                .value_name("FILE")
                .help("发送该JSON文件中的命令后退出")
                .requires("destination"),
        )
        .arg(
            Arg::new("destination")
                .short('d')
                .long("destination")
                .value_name("AP")
                .help("目标接入点ID")
                .requires("command-file"),
        )
        .arg(
            Arg::new("request-id")
                .long("request-id")
                .value_name("ID")
                .help("关联ID后缀，未指定时随机生成")
                .requires("command-file"),
        )
        .get_matches();

    let app_mode = parse_mode(&matches)?;

    let startup_config = StartupConfig {
        config_path: matches.get_one::<String>("config").cloned(),
        log_level: arg_or(&matches, "log-level", "info"),
        log_format: arg_or(&matches, "log-format", "pretty"),
    };

    start_application(startup_config, app_mode, "Dispatcher").await
}
