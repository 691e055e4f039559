#![deny(unused_must_use)]

use std::time::Duration;

use tracing::info;

pub mod acquisition;
pub mod args;
pub mod errors;
pub mod export;
pub mod sample;
pub mod series;
pub mod session;
pub mod transport;

pub use acquisition::{AcquisitionHandle, AcquisitionRun, RawRecord, StopReason};
pub use errors::AppError;
pub use export::{export, ExportOptions};
pub use sample::{RawSample, ValidatedSample, PULSE_RATE_INVALID};
pub use series::{SeriesSet, SeriesTable};
pub use session::{Session, SessionState};
pub use transport::{BleLink, DeviceIdentity, DummyLink, DummySettings, PulseLink};

use args::{SourceCmd, TopLevelCmd};

/// Run one full recording from the command line: connect (or spin up the
/// simulated peripheral), read identity, stream in the background until
/// duration/disconnect/ctrl-c, then export and tear down.
pub async fn run(args: TopLevelCmd) -> Result<(), AppError> {
    let options = ExportOptions {
        folder: args.folder.clone(),
        prefix: args.prefix.clone(),
    };

    match &args.source {
        Some(SourceCmd::Dummy(cmd)) => {
            let settings = DummySettings {
                interval: Duration::from_millis(cmd.interval_ms),
                low_bpm: cmd.low_bpm,
                high_bpm: cmd.high_bpm,
                ..Default::default()
            };
            let session = Session::with_link(DummyLink::spawn(settings), args.verbose);
            record_and_export(session, &args, &options).await
        }
        _ => {
            let mut session = Session::new(args.verbose);
            session
                .connect(&args.target, Duration::from_secs(args.scan_timeout))
                .await?;
            record_and_export(session, &args, &options).await
        }
    }
}

async fn record_and_export<L: PulseLink>(
    mut session: Session<L>,
    args: &TopLevelCmd,
    options: &ExportOptions,
) -> Result<(), AppError> {
    session.read_identity().await?;

    let handle = session.acquire_in_background(args.duration.map(Duration::from_secs_f64))?;
    let stop = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested");
            stop.cancel();
        }
    });

    let run = handle.join().await?;
    export(&run.to_table(), args.output.as_deref(), options).await?;
    session.disconnect().await?;
    Ok(())
}
