use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use anyhow::Result;
use nix::unistd::pipe;
use rs485_util::transfer::{self, ReceiveOptions, TransferError};
use tempfile::tempfile;

fn pipe_files() -> Result<(File, File)> {
    let (read_end, write_end) = pipe()?;
    Ok((File::from(read_end), File::from(write_end)))
}

#[test]
fn test_send_appends_newline() -> Result<()> {
    let mut file = tempfile()?;
    transfer::send_line(&file, b"hello")?;

    file.seek(SeekFrom::Start(0))?;
    let mut written = Vec::new();
    file.read_to_end(&mut written)?;
    assert_eq!(written, b"hello\n");

    Ok(())
}

#[test]
fn test_send_empty_payload_is_just_newline() -> Result<()> {
    let mut file = tempfile()?;
    transfer::send_line(&file, b"")?;

    file.seek(SeekFrom::Start(0))?;
    let mut written = Vec::new();
    file.read_to_end(&mut written)?;
    assert_eq!(written, b"\n");

    Ok(())
}

#[test]
fn test_receive_stops_at_requested_count() -> Result<()> {
    let (reader, mut writer) = pipe_files()?;
    writer.write_all(b"abcdefgh")?;

    let mut echoed = Vec::new();
    let received = transfer::receive(&reader, 5, &ReceiveOptions::default(), &mut echoed)?;

    assert_eq!(received, 5);
    assert_eq!(echoed, b"abcde");

    Ok(())
}

#[test]
fn test_unbounded_receive_stops_at_end_of_stream() -> Result<()> {
    let (reader, mut writer) = pipe_files()?;
    writer.write_all(b"abc")?;
    drop(writer);

    let mut echoed = Vec::new();
    let received = transfer::receive(&reader, 0, &ReceiveOptions::default(), &mut echoed)?;

    assert_eq!(received, 3);
    assert_eq!(echoed, b"abc");

    Ok(())
}

#[test]
fn test_bounded_receive_stops_early_at_end_of_stream() -> Result<()> {
    let (reader, mut writer) = pipe_files()?;
    writer.write_all(b"abc")?;
    drop(writer);

    let mut echoed = Vec::new();
    let received = transfer::receive(&reader, 10, &ReceiveOptions::default(), &mut echoed)?;

    assert_eq!(received, 3);
    assert_eq!(echoed, b"abc");

    Ok(())
}

#[test]
fn test_cancelled_receive_stops_cleanly() -> Result<()> {
    // Writer stays open and silent; only the flag can end the loop.
    let (reader, _writer) = pipe_files()?;
    let cancel = AtomicBool::new(true);
    let options = ReceiveOptions {
        cancel: Some(&cancel),
        ..ReceiveOptions::default()
    };

    let mut echoed = Vec::new();
    let received = transfer::receive(&reader, 0, &options, &mut echoed)?;

    assert_eq!(received, 0);
    assert!(echoed.is_empty());

    Ok(())
}

#[test]
fn test_short_timeout_expires_promptly() -> Result<()> {
    let (reader, _writer) = pipe_files()?;
    let options = ReceiveOptions {
        timeout: Some(Duration::from_millis(20)),
        ..ReceiveOptions::default()
    };

    let started = Instant::now();
    let err = transfer::receive(&reader, 1, &options, &mut Vec::new()).unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, TransferError::TimedOut));
    assert!(elapsed >= Duration::from_millis(20));
    // The wait is capped at the remaining deadline, not rounded up to a
    // whole poll tick.
    assert!(elapsed < Duration::from_millis(80), "took {:?}", elapsed);

    Ok(())
}

#[test]
fn test_receive_times_out_on_a_silent_line() -> Result<()> {
    let (reader, _writer) = pipe_files()?;
    let options = ReceiveOptions {
        timeout: Some(Duration::from_millis(50)),
        ..ReceiveOptions::default()
    };

    let started = Instant::now();
    let err = transfer::receive(&reader, 1, &options, &mut Vec::new()).unwrap_err();

    assert!(matches!(err, TransferError::TimedOut));
    // One or two poll ticks, not an unbounded block.
    assert!(started.elapsed() < Duration::from_secs(5));

    Ok(())
}
