use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the payload transmitter.
#[derive(Parser, Debug)]
#[clap(
    name = "rs-transmitter",
    about = "Ships local payload files to brokered cloud storage"
)]
pub struct Args {
    /// File to transmit
    pub source: PathBuf,

    /// Payload tag describing the kind of data (e.g. syslog, pcap)
    pub payload: String,

    /// Filename to store the payload under remotely (server picks one if omitted)
    pub destination: Option<String>,

    /// Path to the transmitter settings YAML file
    #[clap(short = 'c', long, default_value = "config.yaml")]
    pub settings: PathBuf,

    /// Path to the API credentials YAML file
    #[clap(long, default_value = "credentials.yaml")]
    pub credentials: PathBuf,

    /// Override the file suffix sent with the SAS request
    #[clap(long)]
    pub suffix: Option<String>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_arguments() {
        let args = Args::parse_from(["rs-transmitter", "capture.pcap", "pcap"]);
        assert_eq!(args.source, PathBuf::from("capture.pcap"));
        assert_eq!(args.payload, "pcap");
        assert!(args.destination.is_none());
        assert_eq!(args.settings, PathBuf::from("config.yaml"));
        assert_eq!(args.credentials, PathBuf::from("credentials.yaml"));
    }

    #[test]
    fn test_destination_argument() {
        let args = Args::parse_from(["rs-transmitter", "a.log", "syslog", "renamed.log"]);
        assert_eq!(args.destination.as_deref(), Some("renamed.log"));
    }

    #[test]
    fn test_missing_payload_is_an_error() {
        assert!(Args::try_parse_from(["rs-transmitter", "a.log"]).is_err());
    }
}
