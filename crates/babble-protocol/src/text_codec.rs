//! Text command codec.
//!
//! Input format (one command per frame, verb is case-insensitive):
//!
//! - `LOGIN <name>`
//! - `PUBLISH <text>`      (text is the rest of the line)
//! - `FOLLOW <name>`
//! - `TIMELINE`
//! - `FOLLOW_COUNT`
//! - `RDV`
//!
//! Any command except LOGIN and RDV may be prefixed with `S ` to ask
//! the server not to answer it (streaming mode).
//!
//! Output format (`Answer` -> frame payload):
//!
//! - `OK <KIND> <detail>` or `ERR <KIND> <reason>` on the first line
//! - `ERR PARSE <reason>` when the command could not be parsed
//! - optional extra lines (TIMELINE items) after the first

use babble_core::limits::{validate_name, validate_publication};
use babble_core::{Answer, ClientKey, Command, CommandKind, Request, Status};

use crate::error::ProtocolError;

const STREAM_PREFIX: &str = "S";
const PARSE_KIND: &str = "PARSE";

/// Decode a frame payload into a [`Command`] issued by `key`.
pub fn parse_payload(payload: &[u8], key: ClientKey) -> Result<Command, ProtocolError> {
    let line = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
    parse_command(line, key)
}

/// Parse one command line issued by `key`.
///
/// Trailing NUL bytes and surrounding whitespace are ignored.
pub fn parse_command(line: &str, key: ClientKey) -> Result<Command, ProtocolError> {
    let line = line.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }

    let (verb, args) = split_verb(line);
    let (streamed, verb, args) = if verb.eq_ignore_ascii_case(STREAM_PREFIX) && !args.is_empty() {
        let (verb, args) = split_verb(args);
        (true, verb, args)
    } else {
        (false, verb, args)
    };

    let kind =
        CommandKind::from_verb(verb).ok_or_else(|| ProtocolError::UnknownVerb(verb.to_string()))?;

    let request = match kind {
        CommandKind::Login => Request::Login {
            name: parse_name(kind, args)?,
        },
        CommandKind::Follow => Request::Follow {
            name: parse_name(kind, args)?,
        },
        CommandKind::Publish => {
            validate_publication(args)
                .map_err(|source| ProtocolError::InvalidField { kind, source })?;
            Request::Publish {
                text: args.to_string(),
            }
        }
        CommandKind::Timeline => no_args(kind, args, Request::Timeline)?,
        CommandKind::FollowCount => no_args(kind, args, Request::FollowCount)?,
        CommandKind::Rdv => no_args(kind, args, Request::Rdv)?,
        CommandKind::Unregister => return Err(ProtocolError::NotClientCommand(kind)),
    };

    if streamed && matches!(kind, CommandKind::Login | CommandKind::Rdv) {
        return Err(ProtocolError::NotStreamable(kind));
    }

    Ok(Command {
        key,
        request,
        answer_expected: !streamed,
    })
}

/// Format a command as a client would send it.
pub fn format_command(cmd: &Command) -> String {
    let prefix = if cmd.answer_expected { "" } else { "S " };
    let verb = cmd.kind().verb();
    match &cmd.request {
        Request::Login { name } | Request::Follow { name } => format!("{}{} {}", prefix, verb, name),
        Request::Publish { text } => format!("{}{} {}", prefix, verb, text),
        _ => format!("{}{}", prefix, verb),
    }
}

/// Format an answer as a frame payload.
pub fn format_answer(answer: &Answer) -> String {
    let status = match answer.status {
        Status::Ok => "OK",
        Status::Error => "ERR",
    };
    let mut out = header_line(status, answer.kind.verb(), &answer.detail);
    for line in &answer.lines {
        out.push('\n');
        out.push_str(line);
    }
    out
}

/// Format the synchronous reply to a command that failed to parse.
pub fn format_parse_error(err: &ProtocolError) -> String {
    header_line("ERR", PARSE_KIND, &err.to_string())
}

/// Client-side view of an answer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireAnswer {
    pub ok: bool,
    /// Command verb, or `PARSE` for a parse failure.
    pub kind: String,
    pub detail: String,
    pub lines: Vec<String>,
}

/// Decode an answer payload (client side).
pub fn decode_answer(text: &str) -> Result<WireAnswer, ProtocolError> {
    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| ProtocolError::MalformedAnswer(text.to_string()))?;

    let mut parts = header.splitn(3, ' ');
    let ok = match parts.next() {
        Some("OK") => true,
        Some("ERR") => false,
        _ => return Err(ProtocolError::MalformedAnswer(header.to_string())),
    };
    let kind = match parts.next() {
        Some(k) if !k.is_empty() => k.to_string(),
        _ => return Err(ProtocolError::MalformedAnswer(header.to_string())),
    };
    let detail = parts.next().unwrap_or("").to_string();

    Ok(WireAnswer {
        ok,
        kind,
        detail,
        lines: lines.map(str::to_string).collect(),
    })
}

fn header_line(status: &str, kind: &str, detail: &str) -> String {
    if detail.is_empty() {
        format!("{} {}", status, kind)
    } else {
        format!("{} {} {}", status, kind, detail)
    }
}

fn split_verb(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    }
}

fn parse_name(kind: CommandKind, args: &str) -> Result<String, ProtocolError> {
    validate_name(args).map_err(|source| ProtocolError::InvalidField { kind, source })?;
    Ok(args.to_string())
}

fn no_args(kind: CommandKind, args: &str, request: Request) -> Result<Request, ProtocolError> {
    if args.is_empty() {
        Ok(request)
    } else {
        Err(ProtocolError::UnexpectedArgument(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use babble_core::CoreError;

    const KEY: ClientKey = ClientKey(42);

    #[test]
    fn parses_every_client_verb() {
        let cases = [
            ("LOGIN alice", Request::Login { name: "alice".into() }),
            ("publish hello world", Request::Publish { text: "hello world".into() }),
            ("FOLLOW bob", Request::Follow { name: "bob".into() }),
            ("TIMELINE", Request::Timeline),
            ("follow_count", Request::FollowCount),
            ("RDV", Request::Rdv),
        ];
        for (line, expected) in cases {
            let cmd = parse_command(line, KEY).unwrap();
            assert_eq!(cmd.request, expected, "line {:?}", line);
            assert_eq!(cmd.key, KEY);
            assert!(cmd.answer_expected);
        }
    }

    #[test]
    fn strips_c_style_terminators() {
        let cmd = parse_payload(b"RDV\n\0", KEY).unwrap();
        assert_eq!(cmd.request, Request::Rdv);
    }

    #[test]
    fn stream_prefix_suppresses_answer() {
        let cmd = parse_command("S PUBLISH ping_3", KEY).unwrap();
        assert!(!cmd.answer_expected);
        assert_eq!(cmd.request, Request::Publish { text: "ping_3".into() });

        assert_eq!(
            parse_command("S RDV", KEY),
            Err(ProtocolError::NotStreamable(CommandKind::Rdv))
        );
        assert_eq!(
            parse_command("S LOGIN alice", KEY),
            Err(ProtocolError::NotStreamable(CommandKind::Login))
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_command("   ", KEY), Err(ProtocolError::Empty));
        assert_eq!(
            parse_command("SHOUT hi", KEY),
            Err(ProtocolError::UnknownVerb("SHOUT".into()))
        );
        assert_eq!(
            parse_command("RDV now", KEY),
            Err(ProtocolError::UnexpectedArgument(CommandKind::Rdv))
        );
        assert_eq!(
            parse_command("UNREGISTER", KEY),
            Err(ProtocolError::NotClientCommand(CommandKind::Unregister))
        );
        assert_eq!(parse_payload(&[0xff, 0xfe], KEY), Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn rejects_oversized_fields() {
        let long_name = format!("LOGIN {}", "n".repeat(33));
        assert_eq!(
            parse_command(&long_name, KEY),
            Err(ProtocolError::InvalidField {
                kind: CommandKind::Login,
                source: CoreError::NameTooLong(33),
            })
        );

        let long_text = format!("PUBLISH {}", "t".repeat(65));
        assert!(matches!(
            parse_command(&long_text, KEY),
            Err(ProtocolError::InvalidField { kind: CommandKind::Publish, .. })
        ));

        assert!(matches!(
            parse_command("FOLLOW", KEY),
            Err(ProtocolError::InvalidField { source: CoreError::EmptyName, .. })
        ));
    }

    #[test]
    fn publication_cannot_smuggle_extra_lines() {
        assert_eq!(
            parse_payload(b"PUBLISH hi\nERR PARSE forged", KEY),
            Err(ProtocolError::InvalidField {
                kind: CommandKind::Publish,
                source: CoreError::InvalidPublication,
            })
        );
        assert!(parse_command("S PUBLISH a\r\nOK TIMELINE 9 9", KEY).is_err());

        let err = parse_command("PUBLISH hi\nforged", KEY).unwrap_err();
        let wire = decode_answer(&format_parse_error(&err)).unwrap();
        assert_eq!(wire.kind, "PARSE");
        assert!(wire.lines.is_empty());
    }

    #[test]
    fn answer_text_decodes_back() {
        let answer = Answer::ok(KEY, CommandKind::Timeline, "2 2")
            .with_lines(vec!["[10:00:00] alice: world".into(), "[10:00:00] alice: hello".into()]);
        let text = format_answer(&answer);
        assert!(text.starts_with("OK TIMELINE 2 2\n"));

        let wire = decode_answer(&text).unwrap();
        assert!(wire.ok);
        assert_eq!(wire.kind, "TIMELINE");
        assert_eq!(wire.detail, "2 2");
        assert_eq!(wire.lines.len(), 2);
    }

    #[test]
    fn parse_errors_are_reported_as_parse_kind() {
        let text = format_parse_error(&ProtocolError::UnknownVerb("SHOUT".into()));
        assert_eq!(text, "ERR PARSE unknown command 'SHOUT'");

        let wire = decode_answer(&text).unwrap();
        assert!(!wire.ok);
        assert_eq!(wire.kind, "PARSE");
    }

    #[test]
    fn format_command_matches_parser() {
        let mut cmd = Command::new(KEY, Request::Publish { text: "hi".into() });
        cmd.answer_expected = false;
        assert_eq!(format_command(&cmd), "S PUBLISH hi");
        assert_eq!(parse_command(&format_command(&cmd), KEY).unwrap(), cmd);
    }

    #[test]
    fn malformed_answers_are_rejected() {
        assert!(decode_answer("").is_err());
        assert!(decode_answer("MAYBE LOGIN").is_err());
        assert!(decode_answer("OK").is_err());
    }
}
