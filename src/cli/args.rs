use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "throttle-proxy")]
#[command(author, version, about = "TCP relay that caps the throughput of every connection", long_about = None)]
#[command(after_help = "\
Arguments may also be supplied through a TOML file given with --config;
positional arguments and flags override values from the file.

Example:
  throttle-proxy localhost:8080 localhost:80 1024")]
pub struct Cli {
    /// 监听地址，例如 localhost:8080
    #[arg(value_name = "LISTEN")]
    pub listen: Option<String>,

    /// 转发地址，例如 localhost:80
    #[arg(value_name = "FORWARD")]
    pub forward: Option<String>,

    /// 每秒最大吞吐量（字节）
    #[arg(value_name = "THROUGHPUT", value_parser = clap::value_parser!(u32).range(1..))]
    pub throughput: Option<u32>,

    /// 配置文件路径（TOML）
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<String>,

    /// 读写空闲超时（秒），默认不超时
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub idle_timeout: Option<u64>,

    /// 关闭后等待已有连接结束的最长时间（秒）
    #[arg(long, value_name = "SECS")]
    pub drain_timeout: Option<u64>,

    /// 无法调整套接字缓冲区时拒绝连接
    #[arg(long)]
    pub strict_buffers: bool,

    /// 允许的连续 accept 失败次数
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_accept_errors: Option<u32>,

    /// 只检查配置并退出
    #[arg(long)]
    pub check: bool,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// 是否给出了全部三个位置参数
    pub fn has_positionals(&self) -> bool {
        self.listen.is_some() && self.forward.is_some() && self.throughput.is_some()
    }
}
