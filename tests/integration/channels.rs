use crate::*;

use ipcbuf_core::WriteOutcome;

#[test]
fn test_pipe_growth_loop_doubles_until_short_write() {
    let config = temp_config("pipe-loop");
    let mut chan = ready(&config, spec(TransportKind::Pipe, "dgram"), CapacityHints::default())
        .expect("pipe should provision");

    let (result, drained) = probe_and_drain(&mut chan, &ProbeConfig::growth_loop(1, None)).unwrap();

    let sizes = result.requested_sizes();
    for (i, size) in sizes.iter().enumerate() {
        assert_eq!(*size, 1usize << i, "attempt {i} should request 2^{i} bytes");
    }
    let last = result.attempts().last().expect("at least one attempt");
    assert!(!last.outcome.is_full_write(last.requested));
    assert_eq!(result.iterations(), sizes.len());
    assert!(result.total() > 0);

    println!("pipe buffered {} bytes in {} attempts", result.total(), result.iterations());
    assert_eq!(drained.bytes_read, result.total(), "drain should recover every byte");
}

#[test]
fn test_pipe_fixed_run_makes_every_attempt() {
    let config = temp_config("pipe-chunk");
    let mut chan = ready(&config, spec(TransportKind::Pipe, "dgram"), CapacityHints::default())
        .expect("pipe should provision");

    let probe = ProbeConfig::fixed_chunk_run(16385, None, 3);
    let (result, drained) = probe_and_drain(&mut chan, &probe).unwrap();

    assert_eq!(result.requested_sizes(), vec![16385; 4]);
    let accepted: u64 = result.attempts().iter().map(|a| a.outcome.accepted() as u64).sum();
    assert_eq!(result.total(), accepted);
    assert!(result.total() <= 4 * 16385);
    assert_eq!(drained.bytes_read, result.total());
}

#[test]
fn test_fifo_drain_matches_total() {
    let config = temp_config("fifo");
    let mut chan = ready(&config, spec(TransportKind::Fifo, "dgram"), CapacityHints::default())
        .expect("fifo should provision");
    assert!(config.paths.fifo.exists());

    let (result, drained) = probe_and_drain(&mut chan, &ProbeConfig::growth_loop(1, Some(1000))).unwrap();

    let sizes = result.requested_sizes();
    for (i, size) in sizes.iter().enumerate() {
        assert_eq!(*size, 1 + 1000 * i);
    }
    assert_eq!(drained.bytes_read, result.total());

    drop(chan);
    assert!(!config.paths.fifo.exists(), "fifo should be removed");
}

#[test]
fn test_socketpair_dgram_zero_increment_repeats() {
    let config = temp_config("socketpair");
    let mut chan = ready(&config, spec(TransportKind::SocketPair, "dgram"), CapacityHints::default())
        .expect("socketpair should provision");

    let (result, drained) = probe_and_drain(&mut chan, &ProbeConfig::growth_loop(2048, Some(0))).unwrap();

    assert!(result.requested_sizes().iter().all(|&n| n == 2048));
    let last = result.attempts().last().expect("at least one attempt");
    assert!(
        matches!(last.outcome, WriteOutcome::Saturated { .. }),
        "expected saturation, got {:?}",
        last.outcome
    );
    assert_eq!(result.total() % 2048, 0, "datagrams are accepted whole");
    assert_eq!(drained.bytes_read, result.total());
}

#[test]
fn test_local_dgram_socket_probe() {
    let config = temp_config("dgram");
    let mut chan = ready(&config, spec(TransportKind::Socket, "dgram"), CapacityHints::default())
        .expect("local dgram socket should provision");

    let (result, drained) = probe_and_drain(&mut chan, &ProbeConfig::growth_loop(512, Some(0))).unwrap();
    assert!(result.total() > 0);
    assert_eq!(drained.bytes_read, result.total());

    drop(chan);
    assert!(!config.paths.socket.exists(), "socket path should be removed");
}

#[test]
fn test_oversized_datagram_shrinks() {
    let config = temp_config("oversize");
    let mut chan = ready(&config, spec(TransportKind::SocketPair, "dgram"), CapacityHints::default())
        .expect("socketpair should provision");

    // Above the default socket send buffer, so the datagram can never fit whole.
    let probe = ProbeConfig::fixed_chunk_run(256 * 1024, None, 0);
    let result = ipcbuf_core::run(chan.writer_mut().unwrap(), &probe, &mut ()).unwrap();

    let attempt = &result.attempts()[0];
    match &attempt.outcome {
        WriteOutcome::Oversized { shrunk_to } => {
            assert!(*shrunk_to > 0 && *shrunk_to < attempt.requested);
        }
        WriteOutcome::Saturated { shrunk_to } => {
            assert!(shrunk_to.map_or(true, |n| n < attempt.requested));
        }
        other => panic!("expected a shrink, got {other:?}"),
    }
}

#[test]
fn test_probe_is_idempotent_on_fresh_channels() {
    let totals: Vec<u64> = (0..2)
        .map(|_| {
            let config = temp_config("idem");
            let mut chan = ready(&config, spec(TransportKind::SocketPair, "dgram"), CapacityHints::default())
                .expect("socketpair should provision");
            probe_and_drain(&mut chan, &ProbeConfig::growth_loop(1024, Some(0)))
                .unwrap()
                .0
                .total()
        })
        .collect();
    assert_eq!(totals[0], totals[1]);
}

#[cfg(target_os = "linux")]
#[test]
fn test_pipe_capacity_hint_limits_total() {
    let config = temp_config("pipe-hint");
    let hints = CapacityHints {
        pipe_capacity: Some(16384),
        ..CapacityHints::default()
    };
    let mut chan = ready(&config, spec(TransportKind::Pipe, "dgram"), hints)
        .expect("pipe with capacity hint should provision");

    let (result, drained) = probe_and_drain(&mut chan, &ProbeConfig::growth_loop(1, None)).unwrap();
    assert!(result.total() > 0);
    assert!(result.total() <= 16384, "total {} exceeds the pipe size", result.total());
    assert_eq!(drained.bytes_read, result.total());
}

#[test]
fn test_socket_buffer_hints_applied() {
    let config = temp_config("sockhint");
    let hints = CapacityHints {
        send_buffer: Some(8192),
        recv_buffer: Some(8192),
        ..CapacityHints::default()
    };
    let chan = ready(&config, spec(TransportKind::SocketPair, "dgram"), hints)
        .expect("socketpair with hints should provision");

    let snd = ipcbuf_channel::metrics::send_buffer(chan.writer().unwrap())
        .unwrap()
        .expect("socket has SO_SNDBUF");
    assert!(snd.value >= 8192);
}
