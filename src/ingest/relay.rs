use std::io::Write;
use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;

/// Counters reported when the relay exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub packets: u64,
    pub bytes: u64,
    pub failed: bool,
}

/// Copy video packets into the decoder's input until the queue closes.
///
/// A write failure is a link failure: it is logged and the relay stops
/// without reconnecting.
pub fn relay_packets<W: Write>(packets: Receiver<Vec<u8>>, mut sink: W) -> RelayStats {
    let mut stats = RelayStats::default();
    for packet in packets {
        if let Err(err) = sink.write_all(&packet) {
            log::error!("decoder input write failed; video relay stopped: {}", err);
            stats.failed = true;
            return stats;
        }
        stats.packets += 1;
        stats.bytes += packet.len() as u64;
    }
    if let Err(err) = sink.flush() {
        log::warn!("decoder input flush failed: {}", err);
    }
    log::debug!(
        "video relay finished after {} packets ({} bytes)",
        stats.packets,
        stats.bytes
    );
    stats
}

/// Run [`relay_packets`] on its own thread.
pub fn spawn_video_relay<W: Write + Send + 'static>(
    packets: Receiver<Vec<u8>>,
    sink: W,
) -> JoinHandle<RelayStats> {
    std::thread::spawn(move || relay_packets(packets, sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn relays_packets_in_order() {
        let (tx, rx) = mpsc::sync_channel(4);
        tx.send(vec![1, 2]).unwrap();
        tx.send(vec![3]).unwrap();
        drop(tx);
        let mut out = Vec::new();
        let stats = relay_packets(rx, &mut out);
        assert_eq!(out, vec![1, 2, 3]);
        assert_eq!(stats.packets, 2);
        assert_eq!(stats.bytes, 3);
        assert!(!stats.failed);
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "decoder gone"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stops_on_write_failure() {
        let (tx, rx) = mpsc::sync_channel(4);
        tx.send(vec![1]).unwrap();
        tx.send(vec![2]).unwrap();
        let handle = spawn_video_relay(rx, Broken);
        let stats = handle.join().unwrap();
        assert!(stats.failed);
        assert_eq!(stats.packets, 0);
        assert!(tx.send(vec![3]).is_err());
    }
}
