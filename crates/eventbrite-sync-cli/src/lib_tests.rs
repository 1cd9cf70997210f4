//! Tests for the eventbrite-sync-cli library module.

use super::*;
use std::io::Write;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Argument parsing
// ============================================================================

#[test]
fn test_webhook_url_parsing_uses_default_path() {
    let cli = Cli::try_parse_from([
        "eventbrite-sync",
        "webhook-url",
        "--base-url",
        "https://example.org",
    ])
    .unwrap();

    match cli.command {
        Commands::WebhookUrl { base_url, path } => {
            assert_eq!(base_url, "https://example.org");
            assert_eq!(path, DEFAULT_WEBHOOK_PATH);
        }
        other => panic!("Expected WebhookUrl command, got {:?}", other),
    }
}

#[test]
fn test_sign_rejects_data_and_file_together() {
    let cli = Cli::try_parse_from([
        "eventbrite-sync",
        "sign",
        "--secret",
        "s",
        "--data",
        "{}",
        "--file",
        "payload.json",
    ]);
    assert!(cli.is_err());
}

#[test]
fn test_config_check_parsing() {
    let cli = Cli::try_parse_from(["eventbrite-sync", "config", "check", "--file", "x.yaml"]).unwrap();

    match cli.command {
        Commands::Config {
            action: ConfigCommands::Check { file },
        } => assert_eq!(file, Some(PathBuf::from("x.yaml"))),
        other => panic!("Expected Config Check command, got {:?}", other),
    }
}

#[test]
fn test_global_logging_flags() {
    let cli = Cli::try_parse_from([
        "eventbrite-sync",
        "--log-level",
        "debug",
        "--json-logs",
        "webhook-url",
        "--base-url",
        "https://example.org",
    ])
    .unwrap();

    assert_eq!(cli.log_level, "debug");
    assert!(cli.json_logs);
}

// ============================================================================
// webhook-url and sign
// ============================================================================

#[tokio::test]
async fn test_webhook_url_command_joins_base_and_path() {
    let output = execute(Commands::WebhookUrl {
        base_url: "https://example.org/".to_string(),
        path: DEFAULT_WEBHOOK_PATH.to_string(),
    })
    .await
    .unwrap();

    assert_eq!(output, "https://example.org/eventbrite-fluentcrm/v1/webhook");
}

#[tokio::test]
async fn test_webhook_url_command_rejects_relative_path() {
    let result = execute(Commands::WebhookUrl {
        base_url: "https://example.org".to_string(),
        path: "hooks".to_string(),
    })
    .await;

    assert!(matches!(result, Err(CliError::InvalidArgument { arg, .. }) if arg == "path"));
}

#[tokio::test]
async fn test_sign_command_matches_core_signature() {
    let output = execute(Commands::Sign {
        secret: "whsec".to_string(),
        data: Some(r#"{"api_url":"x"}"#.to_string()),
        file: None,
    })
    .await
    .unwrap();

    assert_eq!(output, sign_payload("whsec", br#"{"api_url":"x"}"#));
}

#[tokio::test]
async fn test_sign_command_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"payload").unwrap();

    let output = execute(Commands::Sign {
        secret: "whsec".to_string(),
        data: None,
        file: Some(file.path().to_path_buf()),
    })
    .await
    .unwrap();

    assert_eq!(output, sign_payload("whsec", b"payload"));
}

#[tokio::test]
async fn test_sign_command_requires_payload() {
    let result = execute(Commands::Sign {
        secret: "whsec".to_string(),
        data: None,
        file: None,
    })
    .await;

    assert!(matches!(result, Err(CliError::InvalidArgument { .. })));
}

// ============================================================================
// send
// ============================================================================

#[tokio::test]
async fn test_send_posts_signed_delivery() {
    let server = MockServer::start().await;
    let expected = serde_json::json!({
        "api_url": "https://www.eventbriteapi.com/v3/orders/1/",
        "config": {"action": "order.placed"},
    });
    let signature = sign_payload("whsec", &serde_json::to_vec(&expected).unwrap());

    Mock::given(method("POST"))
        .and(path("/eventbrite-fluentcrm/v1/webhook"))
        .and(header(SIGNATURE_HEADER, signature.as_str()))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success":true}"#))
        .expect(1)
        .mount(&server)
        .await;

    let output = execute(Commands::Send {
        url: format!("{}/eventbrite-fluentcrm/v1/webhook", server.uri()),
        api_url: "https://www.eventbriteapi.com/v3/orders/1/".to_string(),
        action: "order.placed".to_string(),
        secret: Some("whsec".to_string()),
        timeout: 5,
    })
    .await
    .unwrap();

    assert_eq!(output, r#"200 {"success":true}"#);
}

#[tokio::test]
async fn test_send_reports_service_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let result = execute(Commands::Send {
        url: server.uri(),
        api_url: "https://www.eventbriteapi.com/v3/orders/1/".to_string(),
        action: "order.placed".to_string(),
        secret: None,
        timeout: 5,
    })
    .await;

    match result {
        Err(CliError::CommandFailed { message }) => assert!(message.contains("403")),
        other => panic!("Expected CommandFailed, got {:?}", other),
    }

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key(SIGNATURE_HEADER));
}

#[tokio::test]
async fn test_send_requires_http_api_url() {
    let server = MockServer::start().await;
    Mock::given(header_exists(SIGNATURE_HEADER))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = execute(Commands::Send {
        url: server.uri(),
        api_url: "ftp://files.example/orders/1".to_string(),
        action: "order.placed".to_string(),
        secret: Some("whsec".to_string()),
        timeout: 5,
    })
    .await;

    assert!(matches!(result, Err(CliError::InvalidArgument { arg, .. }) if arg == "api-url"));
}

// ============================================================================
// config check
// ============================================================================

#[tokio::test]
async fn test_config_check_summarises_valid_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(
        file,
        r#"
webhook:
  public_base_url: "https://example.org"
sync:
  api_token: "eb-token"
crm:
  kind: memory
"#
    )
    .unwrap();

    let output = execute(Commands::Config {
        action: ConfigCommands::Check {
            file: Some(file.path().to_path_buf()),
        },
    })
    .await
    .unwrap();

    assert!(output.starts_with("Configuration is valid"));
    assert!(output.contains("crm:           memory"));
    assert!(output.contains("api token:     set"));
    assert!(output.contains("https://example.org/eventbrite-fluentcrm/v1/webhook"));
}

#[tokio::test]
async fn test_config_check_reports_missing_crm() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(file, "sync:\n  api_token: \"eb-token\"\n").unwrap();

    let result = execute(Commands::Config {
        action: ConfigCommands::Check {
            file: Some(file.path().to_path_buf()),
        },
    })
    .await;

    assert!(matches!(
        result,
        Err(CliError::Configuration(ConfigError::Missing { .. }))
    ));
}
