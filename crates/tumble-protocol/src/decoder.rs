use serde::Deserialize;

use crate::types::{ProtocolEvent, Source, TurnMetadata, TurnUsage};

#[derive(Debug, Deserialize)]
struct DeltaPayload {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct DonePayload {
    #[serde(default)]
    usage: Option<TurnUsage>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    detail: Option<String>,
}

const FALLBACK_ERROR_DETAIL: &str = "Unknown error";

/// Incremental decoder turning raw chat-stream byte chunks into typed events.
///
/// Chunk boundaries are arbitrary: a boundary may split a line, an event, or
/// a multi-byte UTF-8 character, so the residue buffer holds raw bytes and a
/// line is only interpreted once its terminator has arrived. The decoder is
/// turn-local state with no I/O of its own; after the terminal event it
/// latches shut and ignores all further input. Bytes of a final line that is
/// never terminated are dropped with the decoder.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    residue: Vec<u8>,
    current_event: Option<String>,
    finished: bool,
    skipped_payloads: u64,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one chunk and returns every event completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ProtocolEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.residue.extend_from_slice(chunk);

        while let Some(newline) = self.residue.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.residue.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            self.accept_line(line.as_ref(), &mut events);
            if self.finished {
                break;
            }
        }

        events
    }

    /// Count of `data:` lines dropped because their payload did not parse.
    pub fn skipped_payloads(&self) -> u64 {
        self.skipped_payloads
    }

    fn accept_line(&mut self, line: &str, events: &mut Vec<ProtocolEvent>) {
        if line.is_empty() {
            return;
        }

        if let Some(name) = line.strip_prefix("event:") {
            self.current_event = Some(name.trim().to_string());
            return;
        }

        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        // A data line is only meaningful while an event name is pending; the
        // name is consumed either way, so the next data line needs a fresh
        // event line.
        let Some(name) = self.current_event.take() else {
            return;
        };

        match decode_payload(&name, data.trim()) {
            Decoded::Event(event) => {
                if event.is_terminal() {
                    self.finished = true;
                }
                events.push(event);
            }
            Decoded::Malformed => {
                self.skipped_payloads += 1;
            }
            Decoded::UnknownEvent => {}
        }
    }
}

enum Decoded {
    Event(ProtocolEvent),
    Malformed,
    UnknownEvent,
}

fn decode_payload(name: &str, data: &str) -> Decoded {
    let event = match name {
        "metadata" => serde_json::from_str::<TurnMetadata>(data)
            .ok()
            .map(ProtocolEvent::Metadata),
        "delta" => serde_json::from_str::<DeltaPayload>(data)
            .ok()
            .map(|payload| ProtocolEvent::Delta {
                content: payload.content,
            }),
        "sources" => serde_json::from_str::<Vec<Source>>(data)
            .ok()
            .map(ProtocolEvent::Sources),
        "done" => serde_json::from_str::<DonePayload>(data)
            .ok()
            .map(|payload| ProtocolEvent::Done {
                usage: payload.usage,
            }),
        "error" => serde_json::from_str::<ErrorPayload>(data)
            .ok()
            .map(|payload| ProtocolEvent::Error {
                detail: payload
                    .detail
                    .unwrap_or_else(|| FALLBACK_ERROR_DETAIL.to_string()),
            }),
        _ => return Decoded::UnknownEvent,
    };

    match event {
        Some(event) => Decoded::Event(event),
        None => Decoded::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::StreamDecoder;
    use crate::types::{ConfidenceTier, ProtocolEvent};

    const WELL_FORMED: &str = concat!(
        "event: metadata\n",
        "data: {\"session_id\":\"s-1\",\"message_id\":\"m-1\",\"confidence_tier\":\"ANSWER\"}\n",
        "\n",
        "event: delta\n",
        "data: {\"content\":\"Clean the lint trap \"}\n",
        "\n",
        "event: delta\n",
        "data: {\"content\":\"after every load.\"}\n",
        "\n",
        "event: sources\n",
        "data: [{\"title\":\"Dryer maintenance\",\"text\":\"...\",\"score\":0.9}]\n",
        "\n",
        "event: done\n",
        "data: {\"usage\":{}}\n",
        "\n",
    );

    fn decode_whole(input: &str) -> Vec<ProtocolEvent> {
        StreamDecoder::new().push(input.as_bytes())
    }

    #[test]
    fn decodes_a_full_turn_in_order() {
        let events = decode_whole(WELL_FORMED);
        assert_eq!(events.len(), 5);
        match &events[0] {
            ProtocolEvent::Metadata(metadata) => {
                assert_eq!(metadata.session_id, "s-1");
                assert_eq!(metadata.message_id, "m-1");
                assert_eq!(metadata.confidence_tier, ConfidenceTier::Answer);
            }
            other => panic!("expected metadata first, got {other:?}"),
        }
        assert_eq!(
            events[1],
            ProtocolEvent::Delta {
                content: "Clean the lint trap ".to_string()
            }
        );
        assert!(matches!(events[3], ProtocolEvent::Sources(ref s) if s.len() == 1));
        assert!(events[4].is_terminal());
    }

    #[test]
    fn chunk_boundaries_do_not_change_the_event_sequence() {
        let expected = decode_whole(WELL_FORMED);
        let bytes = WELL_FORMED.as_bytes();

        // One byte at a time.
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        for byte in bytes {
            events.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(events, expected);

        // Every split point of a two-chunk delivery.
        for split in 0..=bytes.len() {
            let mut decoder = StreamDecoder::new();
            let mut events = decoder.push(&bytes[..split]);
            events.extend(decoder.push(&bytes[split..]));
            assert_eq!(events, expected, "split at byte {split}");
        }
    }

    #[test]
    fn multi_byte_characters_survive_mid_character_splits() {
        let stream = "event: delta\ndata: {\"content\":\"60\u{2013}90\u{00b0}C\"}\n";
        let bytes = stream.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = StreamDecoder::new();
            let mut events = decoder.push(&bytes[..split]);
            events.extend(decoder.push(&bytes[split..]));
            assert_eq!(
                events,
                vec![ProtocolEvent::Delta {
                    content: "60\u{2013}90\u{00b0}C".to_string()
                }],
                "split at byte {split}"
            );
        }
    }

    #[test]
    fn crlf_terminated_lines_decode_like_lf() {
        let stream = "event: delta\r\ndata: {\"content\":\"hi\"}\r\n";
        assert_eq!(
            decode_whole(stream),
            vec![ProtocolEvent::Delta {
                content: "hi".to_string()
            }]
        );
    }

    #[test]
    fn malformed_payload_is_skipped_without_killing_the_stream() {
        let stream = concat!(
            "event: delta\n",
            "data: {\"content\": not json}\n",
            "event: delta\n",
            "data: {\"content\":\"still here\"}\n",
        );
        let mut decoder = StreamDecoder::new();
        let events = decoder.push(stream.as_bytes());
        assert_eq!(
            events,
            vec![ProtocolEvent::Delta {
                content: "still here".to_string()
            }]
        );
        assert_eq!(decoder.skipped_payloads(), 1);
    }

    #[test]
    fn data_line_without_event_name_is_ignored() {
        let stream = concat!(
            "data: {\"content\":\"orphan\"}\n",
            "event: delta\n",
            "data: {\"content\":\"kept\"}\n",
        );
        assert_eq!(
            decode_whole(stream),
            vec![ProtocolEvent::Delta {
                content: "kept".to_string()
            }]
        );
    }

    #[test]
    fn event_name_is_cleared_after_each_data_line() {
        // Second data line has no pending event name and must be dropped.
        let stream = concat!(
            "event: delta\n",
            "data: {\"content\":\"one\"}\n",
            "data: {\"content\":\"two\"}\n",
        );
        assert_eq!(
            decode_whole(stream),
            vec![ProtocolEvent::Delta {
                content: "one".to_string()
            }]
        );
    }

    #[test]
    fn unknown_event_names_consume_their_data_line() {
        let stream = concat!(
            "event: heartbeat\n",
            "data: {}\n",
            "event: delta\n",
            "data: {\"content\":\"hi\"}\n",
        );
        let mut decoder = StreamDecoder::new();
        let events = decoder.push(stream.as_bytes());
        assert_eq!(
            events,
            vec![ProtocolEvent::Delta {
                content: "hi".to_string()
            }]
        );
        assert_eq!(decoder.skipped_payloads(), 0);
    }

    #[test]
    fn decoder_latches_shut_after_the_terminal_event() {
        let stream = concat!(
            "event: done\n",
            "data: {}\n",
            "event: delta\n",
            "data: {\"content\":\"late\"}\n",
        );
        let mut decoder = StreamDecoder::new();
        let events = decoder.push(stream.as_bytes());
        assert_eq!(events, vec![ProtocolEvent::Done { usage: None }]);
        assert!(decoder.push(b"event: delta\ndata: {\"content\":\"x\"}\n").is_empty());
    }

    #[test]
    fn at_most_one_terminal_event_is_emitted() {
        let stream = concat!(
            "event: error\n",
            "data: {\"detail\":\"first\"}\n",
            "event: error\n",
            "data: {\"detail\":\"second\"}\n",
            "event: done\n",
            "data: {}\n",
        );
        let events = decode_whole(stream);
        let terminals = events.iter().filter(|event| event.is_terminal()).count();
        assert_eq!(terminals, 1);
        assert_eq!(
            events,
            vec![ProtocolEvent::Error {
                detail: "first".to_string()
            }]
        );
    }

    #[test]
    fn error_detail_falls_back_when_absent() {
        let events = decode_whole("event: error\ndata: {}\n");
        assert_eq!(
            events,
            vec![ProtocolEvent::Error {
                detail: "Unknown error".to_string()
            }]
        );
    }

    #[test]
    fn unterminated_trailing_line_is_never_interpreted() {
        let mut decoder = StreamDecoder::new();
        let mut events = decoder.push(b"event: delta\n");
        events.extend(decoder.push(b"data: {\"content\":\"partial\"}"));
        // No terminator ever arrives; the buffered bytes are dropped with the
        // decoder at end-of-stream.
        assert!(events.is_empty());
    }

    #[test]
    fn done_usage_counters_are_surfaced() {
        let events =
            decode_whole("event: done\ndata: {\"usage\":{\"prompt_tokens\":12.0}}\n");
        match &events[0] {
            ProtocolEvent::Done { usage: Some(usage) } => {
                assert_eq!(usage.get("prompt_tokens"), Some(&12.0));
            }
            other => panic!("expected done with usage, got {other:?}"),
        }
    }
}
