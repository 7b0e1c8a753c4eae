use clap::Parser;

#[derive(Parser)]
#[command(name = "stomp")]
#[command(version)]
#[command(about = "Interactive STOMP client CLI")]
pub struct Cli {
    /// Broker locator: tcp://[login:passcode@]host[:port] or tcps://...
    #[arg(short, long, default_value = "tcp://127.0.0.1:61613")]
    pub locator: String,

    /// Login username (overrides credentials in the locator)
    #[arg(short = 'u', long, requires = "passcode")]
    pub login: Option<String>,

    /// Passcode
    #[arg(short, long, requires = "login")]
    pub passcode: Option<String>,

    /// Virtual host sent in the CONNECT `host` header
    #[arg(long)]
    pub vhost: Option<String>,

    /// Milliseconds to wait for CONNECTED
    #[arg(short, long, default_value_t = 5000)]
    pub timeout: u64,

    /// Destinations to subscribe to (can be specified multiple times)
    #[arg(short, long)]
    pub subscribe: Vec<String>,

    /// Subscribe with client acknowledgement instead of auto
    #[arg(long)]
    pub client_ack: bool,

    /// Log filter when RUST_LOG is unset (e.g. "stompline=debug")
    #[arg(long, default_value = "warn")]
    pub log: String,
}
