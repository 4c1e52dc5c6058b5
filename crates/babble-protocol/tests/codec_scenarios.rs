// crates/babble-protocol/tests/codec_scenarios.rs
use babble_core::ClientKey;
use babble_protocol::{decode_answer, format_parse_error, parse_command};

const SCENARIOS: &str = include_str!("data/commands.txt");

fn scenario_lines() -> Vec<(String, String)> {
    SCENARIOS
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| {
            let (line, expected) = l.rsplit_once("=>").expect("scenario line needs '=>'");
            (line.trim().to_string(), expected.trim().to_string())
        })
        .collect()
}

#[test]
fn scenario_file_parses_as_expected() {
    let key = ClientKey::from_name("alice");
    let lines = scenario_lines();
    assert!(!lines.is_empty(), "scenario file should not be empty");

    for (line, expected) in lines {
        let result = parse_command(&line, key);
        match expected.as_str() {
            "ERR" => assert!(result.is_err(), "{:?} should be rejected", line),
            verb => {
                let cmd = result.unwrap_or_else(|e| panic!("{:?} failed: {}", line, e));
                assert_eq!(cmd.kind().verb(), verb, "line {:?}", line);
            }
        }
    }
}

#[test]
fn every_rejection_produces_a_decodable_error_answer() {
    let key = ClientKey::from_name("alice");

    for (line, expected) in scenario_lines() {
        if expected != "ERR" {
            continue;
        }
        let err = parse_command(&line, key).unwrap_err();
        let answer = decode_answer(&format_parse_error(&err)).unwrap();
        assert!(!answer.ok);
        assert_eq!(answer.kind, "PARSE");
        assert!(!answer.detail.is_empty());
    }
}
