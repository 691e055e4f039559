use argh::FromArgs;
use std::path::PathBuf;

/// Record a pulse oximeter session and export it as a tab-delimited table
#[derive(FromArgs, Debug)]
pub struct TopLevelCmd {
    /// advertised peripheral name to connect to
    #[argh(option, short = 't', default = "String::from(\"BerryMed\")")]
    pub target: String,
    /// seconds to keep scanning before giving up
    #[argh(option, default = "15")]
    pub scan_timeout: u64,
    /// seconds to record; runs until disconnect or ctrl-c when unset
    #[argh(option, short = 'd')]
    pub duration: Option<f64>,
    /// output file name (.csv or .txt); generated from the date-time when unset
    #[argh(option, short = 'o')]
    pub output: Option<PathBuf>,
    /// folder session files are written into
    #[argh(option, default = "PathBuf::from(\"Records\")")]
    pub folder: PathBuf,
    /// prefix for generated file names
    #[argh(option)]
    pub prefix: Option<String>,
    /// report every accepted sample and every newly-seen device
    #[argh(switch, short = 'v')]
    pub verbose: bool,
    #[argh(subcommand)]
    pub source: Option<SourceCmd>,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum SourceCmd {
    Ble(BleCmd),
    Dummy(DummyCmd),
}

/// connect to a BerryMed-class oximeter over BLE (the default)
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "ble")]
pub struct BleCmd {}

/// stream from a simulated oximeter instead of real hardware
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "dummy")]
pub struct DummyCmd {
    /// milliseconds between simulated frames
    #[argh(option, default = "100")]
    pub interval_ms: u64,
    /// lower bound of the simulated pulse sweep
    #[argh(option, default = "60")]
    pub low_bpm: u8,
    /// upper bound of the simulated pulse sweep
    #[argh(option, default = "90")]
    pub high_bpm: u8,
}
