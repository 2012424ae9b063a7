//! Command line configuration.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("Invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("Invalid command line flag value")]
    InvalidCommandLineFlagValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    /// Master to follow, when running as a replica.
    pub replica_of: Option<(String, u16)>,
    pub directory: String,
    pub db_filename: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 6379,
            replica_of: None,
            directory: String::from("/tmp"),
            db_filename: String::from("dump.rdb"),
        }
    }
}

impl Config {
    /// Parses `--port`, `--replicaof`, `--dir` and `--dbfilename` from the
    /// process arguments. `--replicaof` takes a single `"host port"` value.
    pub fn from_args<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter().skip(1);

        while let Some(flag) = args.next() {
            let value = args
                .next()
                .ok_or(CliError::InvalidCommandLineFlagValue)?;

            match flag.as_str() {
                "--port" => {
                    let port = value
                        .parse::<u16>()
                        .map_err(|_| CliError::InvalidCommandLineFlagValue)?;

                    if port == 0 {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    }

                    config.port = port;
                }
                "--replicaof" => {
                    let parts: Vec<&str> = value.split_whitespace().collect();

                    if parts.len() != 2 {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    }

                    let master_port = parts[1]
                        .parse::<u16>()
                        .map_err(|_| CliError::InvalidCommandLineFlagValue)?;

                    config.replica_of = Some((parts[0].to_string(), master_port));
                }
                "--dir" => config.directory = value,
                "--dbfilename" => config.db_filename = value,
                _ => return Err(CliError::InvalidCommandLineFlag),
            }
        }

        Ok(config)
    }
}
