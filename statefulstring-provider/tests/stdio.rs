//! Drive the provider binary over its stdio channel, the way a host does.

use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

use serde_json::{json, Value};

const TYPE: &str = "statefulString:index:StatefulString";

fn run_session(requests: &[Value]) -> Vec<Value> {
    let input: String = requests.iter().map(|r| format!("{}\n", r)).collect();
    run_raw_session(input.as_bytes())
}

fn run_raw_session(input: &[u8]) -> Vec<Value> {
    let mut child = Command::new(env!("CARGO_BIN_EXE_statefulstring-provider"))
        .env("STATEFULSTRING_LOG", "debug")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("could not spawn provider");

    {
        let mut stdin = child.stdin.take().unwrap();
        stdin.write_all(input).unwrap();
        // dropping stdin ends the session
    }

    let stdout = child.stdout.take().unwrap();
    let responses = BufReader::new(stdout)
        .lines()
        .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
        .collect();

    let status = child.wait().unwrap();
    assert!(status.success(), "provider exited with {}", status);
    responses
}

fn request(id: u64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

#[test]
fn create_then_diff_then_update() {
    let created = json!({ "string": "hello, world", "triggers": { "foo": "bar" } });
    let resource = json!({
        "type": TYPE,
        "inputProperties": created,
        "outputProperties": created,
    });
    let responses = run_session(&[
        request(
            1,
            "resource_create",
            json!({ "type": TYPE, "name": "myStatefulString", "inputProperties": created }),
        ),
        request(
            2,
            "resource_diff",
            json!({
                "resource": resource,
                "inputProperties": { "string": "2", "triggers": { "foo": "bar" } }
            }),
        ),
        request(
            3,
            "resource_diff",
            json!({
                "resource": resource,
                "inputProperties": { "string": "2", "triggers": { "foo": "bar2" } }
            }),
        ),
        request(
            4,
            "resource_update",
            json!({
                "resource": resource,
                "inputProperties": { "string": "2", "triggers": { "foo": "bar2" } }
            }),
        ),
    ]);

    assert_eq!(responses.len(), 4);
    assert_eq!(
        responses[0]["result"],
        json!({ "id": "myStatefulString", "outputProperties": created })
    );
    assert_eq!(
        responses[1]["result"],
        json!({ "hasChanges": false, "detailedDiff": {} })
    );
    assert_eq!(
        responses[2]["result"],
        json!({
            "hasChanges": true,
            "detailedDiff": { "string": "update", "triggers.foo": "update" }
        })
    );
    assert_eq!(
        responses[3]["result"],
        json!({ "outputProperties": { "string": "2", "triggers": { "foo": "bar2" } } })
    );
}

#[test]
fn stray_output_does_not_reach_the_channel() {
    // Only protocol messages appear on stdout, even with logging turned up.
    let responses = run_session(&[request(1, "resource_capabilities", json!([]))]);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["result"]["name"], json!("statefulString"));
    assert_eq!(responses[0]["result"]["resourceTypes"], json!([TYPE]));
}

#[test]
fn errors_are_reported_and_the_session_continues() {
    let responses = run_session(&[
        request(
            1,
            "resource_update",
            json!({ "resource": { "type": TYPE }, "inputProperties": {} }),
        ),
        request(2, "resource_destroy", json!({ "resource": { "type": TYPE } })),
    ]);
    assert_eq!(responses[0]["error"]["code"], json!(-32603));
    assert!(responses[0]["error"]["data"]
        .as_str()
        .unwrap()
        .contains("output properties"));
    assert_eq!(responses[1]["result"], json!({}));
}

#[test]
fn empty_session_exits_cleanly() {
    assert!(run_session(&[]).is_empty());
}

#[test]
fn malformed_lines_do_not_end_the_session() {
    let mut input = b"\xff\xfe\n".to_vec();
    input.extend(b"{\"jsonrpc\": \"2.0\", \"method\": \"resource_capabilities\"}\n");
    input.extend(format!("{}\n", request(2, "resource_capabilities", json!([]))).bytes());

    let responses = run_raw_session(&input);
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["error"]["code"], json!(-32700));
    assert_eq!(responses[1]["id"], json!(2));
}
