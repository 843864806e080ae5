use crate::*;

use std::io;

use ipcbuf_core::WriteOutcome;

#[test]
fn test_local_stream_probe_in_process() {
    let config = temp_config("stream");
    let rv = rendezvous(&config, spec(TransportKind::Socket, "stream"))
        .expect("stream socket should bind and listen");

    let mut writer = rv.connect().expect("connect to own listener");
    let mut reader = rv.accept().expect("accept pending connection");

    let result = ipcbuf_core::run(&mut writer, &ProbeConfig::growth_loop(1, None), &mut ()).unwrap();
    let last = result.attempts().last().expect("at least one attempt");
    assert!(matches!(
        last.outcome,
        WriteOutcome::Accepted(_) | WriteOutcome::Saturated { .. }
    ));
    drop(writer);

    let drained = ipcbuf_core::drain(&mut reader, 0, 8192).unwrap();
    assert_eq!(drained.bytes_read, result.total());
}

#[test]
fn test_stream_writer_reports_partial_acceptance() {
    let config = temp_config("stream-partial");
    let rv = rendezvous(&config, spec(TransportKind::Socket, "stream")).unwrap();
    let mut writer = rv.connect().unwrap();
    let _reader = rv.accept().unwrap();

    // One huge write: a stream socket takes what fits rather than refusing.
    let probe = ProbeConfig::fixed_chunk_run(64 * 1024 * 1024, None, 0);
    let result = ipcbuf_core::run(&mut writer, &probe, &mut ()).unwrap();
    let attempt = &result.attempts()[0];
    match attempt.outcome {
        WriteOutcome::Accepted(n) => assert!(n > 0 && n < attempt.requested),
        ref other => panic!("expected a partial write, got {other:?}"),
    }
}

#[test]
fn test_stream_path_removed_on_drop() {
    let config = temp_config("stream-cleanup");
    let rv = rendezvous(&config, spec(TransportKind::Socket, "stream")).unwrap();
    assert!(config.paths.socket.exists());
    drop(rv);
    assert!(matches!(
        std::fs::metadata(&config.paths.socket),
        Err(e) if e.kind() == io::ErrorKind::NotFound
    ));
}

// ── Forked connector ──────────────────────────────────────────────────────────

/// Split `rv` into two processes. The child fills the socket, then exits with
/// `exit_code` (2 if filling failed); the parent gets the acceptor's result.
fn fork_and_collect(rv: StreamRendezvous, exit_code: i32) -> Result<DrainReport> {
    match rv.split()? {
        Role::Connector(mut writer) => {
            let filled = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                ipcbuf_core::run(&mut writer, &ProbeConfig::growth_loop(1, None), &mut ()).is_ok()
            }))
            .unwrap_or(false);
            drop(writer);
            // Skip the test harness's exit path in the child.
            unsafe { libc::_exit(if filled { exit_code } else { 2 }) }
        }
        Role::Acceptor(acceptor) => {
            let mut reader = acceptor.accept_and_wait()?;
            Ok(ipcbuf_core::drain(&mut reader, 0, 8192)?)
        }
    }
}

#[test]
fn test_forked_connector_fills_and_acceptor_drains() {
    let config = temp_config("fork-ok");
    let rv = rendezvous(&config, spec(TransportKind::Socket, "stream")).unwrap();

    let drained = fork_and_collect(rv, 0).expect("acceptor should succeed");
    println!("acceptor drained {} bytes in {} reads", drained.bytes_read, drained.reads);
    assert!(drained.bytes_read > 0, "connector's bytes should still be queued after it exits");
}

#[test]
fn test_failed_connector_fails_acceptor() {
    let config = temp_config("fork-fail");
    let rv = rendezvous(&config, spec(TransportKind::Socket, "stream")).unwrap();

    let err = fork_and_collect(rv, 1).expect_err("a connector exiting 1 must fail the acceptor");
    assert!(err.to_string().contains("status 1"), "unexpected error: {err:#}");
}
