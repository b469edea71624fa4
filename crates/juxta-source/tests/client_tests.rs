// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use juxta_app::{FieldValue, Payload, PayloadKind, SectionKind};
use juxta_source::{Client, PayloadSource};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Response, Server};

fn json_response(body: &str, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        )
}

#[test]
fn unreachable_source_suggests_demo_mode() -> Result<()> {
    let client = Client::new("http://127.0.0.1:1", Duration::from_millis(50))?;
    let error = client
        .fetch("acme", PayloadKind::Details)
        .expect_err("fetch should fail for unreachable endpoint");
    assert!(error.to_string().contains("--demo"));
    Ok(())
}

#[test]
fn details_decode_from_mock_server() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/domain/detail/?domain=acme");
        let body = r#"{
            "success": true,
            "details": {
                "domain": "acme",
                "basic_data": [["MRR(current)", "current_mrr", 7968.0], ["Plan Name", "planName", "Ultimate"]],
                "features_data": [["Is FTP Enabled", "isFtpEnabled", "TRUE"]],
                "advanced_data": [["Data Center", "dc", null]]
            }
        }"#;
        request
            .respond(json_response(body, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let details = client.fetch_details("acme")?;
    assert_eq!(details.basic_data.len(), 2);
    assert_eq!(
        details
            .find(SectionKind::Basic, "current_mrr")
            .map(|row| row.value().clone()),
        Some(FieldValue::Number(7968.0))
    );
    assert_eq!(
        details
            .find(SectionKind::Advanced, "dc")
            .map(|row| row.value().clone()),
        Some(FieldValue::Null)
    );

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn catalogs_decode_from_mock_server() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        for _ in 0..3 {
            let request = server.recv().expect("request expected");
            let body = match request.url() {
                "/domain/explore_plans/acme" => {
                    r#"{"trial_plans":[{"name":"Ultimate","pvi":1,"status":"CURRENT_PLAN","next_action":null}]}"#
                }
                "/domain/trial_items/acme" => {
                    r#"{"trial_add_ons":[{"name":"project_control_package","title":"Project Hub","status":null,"days_left":12,"next_action":"START_FREE_TRIAL"}]}"#
                }
                "/settings_dashboard/context/domain/context_value/acme/key/?domain=acme&hierarchy_type=all" => {
                    r#"{"content":[{"name":"sharing.external_links","key_level":"DOMAIN","value":true}]}"#
                }
                other => panic!("unexpected request {other}"),
            };
            request
                .respond(json_response(body, 200))
                .expect("response should succeed");
        }
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let plans = client.fetch_plans("acme")?;
    assert_eq!(plans.current().map(|plan| plan.name.as_str()), Some("Ultimate"));

    let add_ons = client.fetch_add_ons("acme")?;
    assert_eq!(add_ons.trial_add_ons[0].days_left, Some(12.0));

    match client.fetch("acme", PayloadKind::Settings)? {
        Payload::Settings(settings) => {
            let item = settings
                .find("sharing.external_links")
                .ok_or_else(|| anyhow!("setting missing"))?;
            assert_eq!(item.key_level.as_deref(), Some("DOMAIN"));
            assert_eq!(item.value, FieldValue::Bool(true));
        }
        other => panic!("unexpected payload {other:?}"),
    }

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn unauthorized_is_reported_as_not_logged_in() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        request
            .respond(json_response(r#"{"message":"login required"}"#, 401))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let error = client
        .fetch("acme", PayloadKind::Details)
        .expect_err("401 should fail");
    assert!(error.to_string().starts_with("not logged in"));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn malformed_payload_names_the_entity() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        request
            .respond(json_response(r#"{"trial_plans": "nope"}"#, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let error = client
        .fetch_plans("globex")
        .expect_err("bad shape should fail");
    assert_eq!(error.to_string(), "decode plans payload for globex");

    handle.join().expect("server thread should join");
    Ok(())
}
