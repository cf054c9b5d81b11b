use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};

use crate::classifier::Discovery;

/// Opens the output destination in append mode so repeated runs accumulate.
pub async fn open_append(path: &str) -> Result<File, std::io::Error> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
}

/// The single logical writer. Discoveries arrive over the channel in the
/// order they were accepted and are written one line at a time, flushed and
/// fsynced so partial progress survives interruption. A write failure is
/// fatal: the shutdown flag is raised so the scan drains, and the error is
/// returned to the orchestrator.
pub async fn run_sink(
    mut outfile: File,
    mut rx: mpsc::Receiver<Discovery>,
    shutdown_tx: Arc<watch::Sender<bool>>,
) -> Result<u64, std::io::Error> {
    let mut written = 0u64;
    while let Some(discovery) = rx.recv().await {
        let mut outbuf = discovery.url.as_bytes().to_owned();
        outbuf.extend_from_slice(b"\n");
        if let Err(e) = write_line(&mut outfile, &outbuf).await {
            let _ = shutdown_tx.send(true);
            return Err(e);
        }
        written += 1;
    }
    Ok(written)
}

async fn write_line(outfile: &mut File, outbuf: &[u8]) -> Result<(), std::io::Error> {
    outfile.write_all(outbuf).await?;
    outfile.flush().await?;
    outfile.sync_data().await?;
    Ok(())
}
