//! OSC control surface for lighting-desk cues.

use flockstep_core::{Cue, IntentRouter};
use rosc::{OscPacket, decoder};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Receives OSC packets until the runtime shuts down.
pub async fn listen(socket: UdpSocket, router: IntentRouter) {
    let mut buf = vec![0u8; decoder::MTU];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, peer)) => match decoder::decode_udp(&buf[..len]) {
                Ok((_, packet)) => handle_packet(&router, packet),
                Err(e) => warn!(%peer, error = ?e, "Malformed OSC packet"),
            },
            Err(e) => warn!(error = %e, "OSC receive failed"),
        }
    }
}

fn handle_packet(router: &IntentRouter, packet: OscPacket) {
    match packet {
        OscPacket::Message(message) => match Cue::parse(&message.addr) {
            Ok(cue) => {
                info!(cue = cue.number, intent = ?cue.intent, "OSC cue");
                router.dispatch(cue.intent);
            }
            Err(e) => debug!(error = %e, "OSC message ignored"),
        },
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                handle_packet(router, packet);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flockstep_core::{ModeRequest, ModeRequests};
    use rosc::{OscBundle, OscMessage, OscTime, encoder};
    use std::sync::Arc;

    fn router() -> (IntentRouter, Arc<ModeRequests>) {
        let requests = Arc::new(ModeRequests::new());
        (IntentRouter::new(Arc::clone(&requests), "data", 1.0), requests)
    }

    fn message(addr: &str) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args: Vec::new(),
        })
    }

    #[test]
    fn test_cue_load_prepares_and_start_plays() {
        let (router, requests) = router();

        handle_packet(&router, message("/cue/0101/load"));
        assert_eq!(requests.take(), Some(ModeRequest::Prepare));

        handle_packet(&router, message("/cue/0101/start"));
        assert_eq!(requests.take(), Some(ModeRequest::Play));
    }

    #[test]
    fn test_bundles_and_unrelated_addresses() {
        let (router, requests) = router();
        let bundle = OscPacket::Bundle(OscBundle {
            timetag: OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![message("/light/1/go"), message("/cue/3/load")],
        });

        handle_packet(&router, bundle);
        assert_eq!(requests.take(), Some(ModeRequest::Prepare));
        assert_eq!(requests.take(), None);
    }

    #[test]
    fn test_decodes_wire_packets() {
        let (router, requests) = router();
        let bytes = encoder::encode(&message("/cue/12/start")).unwrap();
        let (_, packet) = decoder::decode_udp(&bytes).unwrap();

        handle_packet(&router, packet);
        assert_eq!(requests.take(), Some(ModeRequest::Play));
    }
}
