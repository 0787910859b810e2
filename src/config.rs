use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration, from flags or the matching environment variables.
#[derive(Debug, Clone, Parser)]
#[command(name = "dashboard", about = "Production tracking dashboard server")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "DASHBOARD_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Directory holding the JSON report collections
    #[arg(long, env = "DASHBOARD_DATA_DIR", default_value = "database")]
    pub data_dir: PathBuf,

    /// Directory served under /static
    #[arg(long, env = "DASHBOARD_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Seconds between dashboard recomputes
    #[arg(
        long,
        env = "DASHBOARD_REFRESH_SECS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub refresh_secs: u64,

    /// `username:password` registered at startup when no users exist yet
    #[arg(long, env = "DASHBOARD_SEED_USER")]
    pub seed_user: Option<SeedUser>,
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
}

impl FromStr for SeedUser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((username, password)) if !username.is_empty() && !password.is_empty() => {
                Ok(SeedUser {
                    username: username.to_string(),
                    password: password.to_string(),
                })
            }
            _ => Err("expected username:password".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::try_parse_from(["dashboard"]).unwrap();
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.data_dir, PathBuf::from("database"));
    }

    #[test]
    fn seed_user_needs_both_halves() {
        let config =
            Config::try_parse_from(["dashboard", "--seed-user", "floor:secret:x"]).unwrap();
        let seed = config.seed_user.unwrap();
        assert_eq!(seed.username, "floor");
        assert_eq!(seed.password, "secret:x");

        assert!(Config::try_parse_from(["dashboard", "--seed-user", "floor"]).is_err());
        assert!(Config::try_parse_from(["dashboard", "--refresh-secs", "0"]).is_err());
    }
}
