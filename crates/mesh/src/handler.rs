//! Inbound Message Handler
//!
//! Decodes each datagram the transport delivers and either replaces the
//! routing table or reports a keypress. Malformed frames are logged and
//! dropped; nothing is ever sent back to the originator.

use meshroute_core::{NodeAddress, ADDRESS_LEN};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::codec::{CommandCodec, Frame};
use crate::error::DecodeError;
use crate::link::Datagram;
use crate::store::RouteTableStore;

/// What happened to one inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Routing table replaced with this many entries
    TableReplaced {
        /// New table length
        entries: usize,
    },
    /// Keypress reported by a node
    Keypress {
        /// Node the keypress happened on
        node: NodeAddress,
    },
    /// Frame rejected without side effects
    Discarded(DecodeError),
}

/// Entry point for received datagrams.
#[derive(Debug, Clone)]
pub struct InboundHandler {
    codec: CommandCodec,
    store: Arc<RouteTableStore>,
}

impl InboundHandler {
    /// Create a handler writing into `store`.
    pub fn new(store: Arc<RouteTableStore>) -> Self {
        Self {
            codec: CommandCodec::new(store.capacity()),
            store,
        }
    }

    /// Process one datagram.
    pub fn handle(&self, datagram: &Datagram) -> InboundOutcome {
        let frame = match self.codec.decode(&datagram.payload) {
            Ok(frame) => frame,
            Err(err) => {
                match &err {
                    DecodeError::UnknownTag(tag) => error!(
                        from = %datagram.from,
                        tag = *tag,
                        "Error in receiving raw mesh data: Unknown command"
                    ),
                    _ => error!(
                        from = %datagram.from,
                        size = datagram.payload.len(),
                        %err,
                        "Error in receiving raw mesh data: Unexpected size"
                    ),
                }
                return InboundOutcome::Discarded(err);
            }
        };
        debug!(from = %datagram.from, command = frame.tag().name(), "frame decoded");

        match frame {
            Frame::RouteTable(table) => {
                for (i, addr) in table.iter().enumerate() {
                    info!("Received Routing table [{}] {}", i, addr);
                }
                let entries = table.len();
                match self.store.replace(table) {
                    Ok(()) => {
                        debug!(from = %datagram.from, entries, "routing table replaced");
                        InboundOutcome::TableReplaced { entries }
                    }
                    Err(err) => {
                        error!(%err, "Error in receiving raw mesh data: Unexpected size");
                        InboundOutcome::Discarded(DecodeError::InvalidSize {
                            command: "ROUTE_TABLE",
                            len: entries * ADDRESS_LEN,
                        })
                    }
                }
            }
            Frame::Keypress(node) => {
                warn!("Keypressed detected on node: {}", node);
                InboundOutcome::Keypress { node }
            }
        }
    }
}

/// Drain the transport's datagram channel until it closes or shutdown is
/// signalled. This loop is the single registered receiver, so datagrams are
/// handled one at a time.
pub async fn run_inbound_loop(
    handler: InboundHandler,
    mut datagrams: mpsc::Receiver<Datagram>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            received = datagrams.recv() => match received {
                Some(datagram) => {
                    handler.handle(&datagram);
                }
                None => {
                    debug!("datagram channel closed");
                    break;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CMD_KEYPRESS, CMD_ROUTE_TABLE};
    use proptest::prelude::*;

    fn addr(last: u8) -> NodeAddress {
        NodeAddress::new([0x24, 0x0a, 0xc4, 0x00, 0x00, last])
    }

    fn datagram(payload: Vec<u8>) -> Datagram {
        Datagram {
            from: addr(0xff),
            payload,
        }
    }

    fn handler(capacity: usize) -> (InboundHandler, Arc<RouteTableStore>) {
        let store = Arc::new(RouteTableStore::new(capacity));
        (InboundHandler::new(Arc::clone(&store)), store)
    }

    #[test]
    fn test_route_table_replaces_store() {
        let (handler, store) = handler(4);
        let codec = CommandCodec::new(4);
        let bytes = codec
            .encode(&Frame::RouteTable(vec![addr(1), addr(2), addr(3)]))
            .unwrap();

        assert_eq!(
            handler.handle(&datagram(bytes)),
            InboundOutcome::TableReplaced { entries: 3 }
        );
        assert_eq!(store.snapshot().entries(), &[addr(1), addr(2), addr(3)]);
    }

    #[test]
    fn test_malformed_route_table_leaves_store() {
        let (handler, store) = handler(4);
        store.replace(vec![addr(1)]).unwrap();

        let outcome = handler.handle(&datagram(vec![0x56, 1, 2, 3, 4, 5, 6, 7]));
        assert!(matches!(
            outcome,
            InboundOutcome::Discarded(DecodeError::InvalidSize { len: 7, .. })
        ));
        assert_eq!(store.snapshot().entries(), &[addr(1)]);
    }

    #[test]
    fn test_oversized_route_table_leaves_store() {
        let (handler, store) = handler(1);
        store.replace(vec![addr(1)]).unwrap();

        let mut bytes = vec![0x56];
        bytes.extend_from_slice(addr(2).as_bytes());
        bytes.extend_from_slice(addr(3).as_bytes());
        assert!(matches!(
            handler.handle(&datagram(bytes)),
            InboundOutcome::Discarded(DecodeError::InvalidSize { .. })
        ));
        assert_eq!(store.snapshot().entries(), &[addr(1)]);
    }

    #[test]
    fn test_empty_route_table_clears_store() {
        let (handler, store) = handler(4);
        store.replace(vec![addr(1), addr(2)]).unwrap();

        assert_eq!(
            handler.handle(&datagram(vec![0x56])),
            InboundOutcome::TableReplaced { entries: 0 }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_keypress_reports_node_without_touching_store() {
        let (handler, store) = handler(4);
        store.replace(vec![addr(1)]).unwrap();

        let mut bytes = vec![0x55];
        bytes.extend_from_slice(addr(7).as_bytes());
        assert_eq!(
            handler.handle(&datagram(bytes)),
            InboundOutcome::Keypress { node: addr(7) }
        );
        assert_eq!(store.snapshot().entries(), &[addr(1)]);
    }

    #[test]
    fn test_short_keypress_discarded() {
        let (handler, store) = handler(4);
        let outcome = handler.handle(&datagram(vec![0x55, 1, 2, 3, 4, 5]));
        assert_eq!(
            outcome,
            InboundOutcome::Discarded(DecodeError::InvalidSize {
                command: "KEYPRESS",
                len: 5
            })
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_command_discarded() {
        let (handler, store) = handler(4);
        assert_eq!(
            handler.handle(&datagram(vec![0x42, 0, 0, 0, 0, 0, 0])),
            InboundOutcome::Discarded(DecodeError::UnknownTag(0x42))
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_inbound_loop_applies_in_order_and_stops() {
        let (handler, store) = handler(4);
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_inbound_loop(handler, rx, shutdown_rx));

        let codec = CommandCodec::new(4);
        tx.send(datagram(codec.encode(&Frame::RouteTable(vec![addr(1)])).unwrap()))
            .await
            .unwrap();
        tx.send(datagram(
            codec
                .encode(&Frame::RouteTable(vec![addr(2), addr(3)]))
                .unwrap(),
        ))
        .await
        .unwrap();
        drop(tx);

        task.await.unwrap();
        assert_eq!(store.snapshot().entries(), &[addr(2), addr(3)]);
        drop(shutdown_tx);
    }

    #[tokio::test]
    async fn test_inbound_loop_honours_shutdown() {
        let (handler, _store) = handler(4);
        let (_tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_inbound_loop(handler, rx, shutdown_rx));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    fn invalid_payload(capacity: usize) -> impl Strategy<Value = Vec<u8>> {
        let bytes = || prop::collection::vec(any::<u8>(), 0..96);
        prop_oneof![
            (any::<u8>(), bytes())
                .prop_filter("unrecognized tag", |(tag, _)| {
                    *tag != CMD_KEYPRESS && *tag != CMD_ROUTE_TABLE
                })
                .prop_map(|(tag, body)| [vec![tag], body].concat()),
            bytes()
                .prop_filter("not a table that fits", move |body| {
                    body.len() % ADDRESS_LEN != 0 || body.len() / ADDRESS_LEN > capacity
                })
                .prop_map(|body| [vec![CMD_ROUTE_TABLE], body].concat()),
            bytes()
                .prop_filter("not one address", |body| body.len() != ADDRESS_LEN)
                .prop_map(|body| [vec![CMD_KEYPRESS], body].concat()),
        ]
    }

    proptest! {
        #[test]
        fn invalid_frames_never_touch_store(payload in invalid_payload(4)) {
            let (handler, store) = handler(4);
            store.replace(vec![addr(1), addr(2)]).unwrap();

            let outcome = handler.handle(&datagram(payload));
            prop_assert!(matches!(outcome, InboundOutcome::Discarded(_)));
            let snapshot = store.snapshot();
            prop_assert_eq!(snapshot.entries(), &[addr(1), addr(2)][..]);
        }
    }
}
