use anyhow::{anyhow, bail, Context, Result};
use bus::BusMessage;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use shared::{config::GatewayConfig, domain::PartitionId};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8470")]
    server: String,
    #[arg(long, default_value = "homeassistant")]
    discovery_topic: String,
    #[arg(long, default_value = "qolsys_panel")]
    unique_id: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print bus messages matching a topic filter.
    Watch {
        #[arg(long, default_value = "#")]
        filter: String,
    },
    Publish {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        payload: String,
        #[arg(long)]
        retain: bool,
    },
    /// Send a control request for one partition, e.g. `control ARM_AWAY --partition 0`.
    Control {
        action: String,
        #[arg(long)]
        partition: u32,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        delay: Option<u32>,
        /// Read from the partition's retained discovery config when omitted.
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();
    let client = Client::new();
    let cfg = GatewayConfig {
        discovery_topic: cli.discovery_topic,
        panel_unique_id: cli.unique_id,
        ..GatewayConfig::default()
    };

    match cli.command {
        Command::Watch { filter } => watch(&server, &filter).await?,
        Command::Publish {
            topic,
            payload,
            retain,
        } => {
            publish(&client, &server, &topic, &payload, retain).await?;
            println!("published to {topic}");
        }
        Command::Control {
            action,
            partition,
            code,
            delay,
            token,
        } => {
            let partition_id = PartitionId(partition);
            let token = match token {
                Some(token) => token,
                None => fetch_session_token(&client, &server, &cfg, partition_id)
                    .await
                    .context("pass --token to skip the lookup")?,
            };
            let code = code.as_deref();
            let payload = control_payload(&action, partition_id, code, delay, &token);
            let payload = payload.to_string();
            let topic = cfg.control_topic();
            publish(&client, &server, &topic, &payload, false).await?;
            println!("sent {action} for partition {partition_id} to {topic}");
        }
    }

    Ok(())
}

async fn watch(server: &str, filter: &str) -> Result<()> {
    let ws_url = ws_url(server, filter)?;
    let (ws_stream, _) = connect_async(ws_url.as_str())
        .await
        .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
    let (_, mut ws_reader) = ws_stream.split();

    while let Some(msg) = ws_reader.next().await {
        match msg.context("websocket read failed")? {
            Message::Text(text) => match serde_json::from_str::<BusMessage>(&text) {
                Ok(message) => println!("{} {}", message.topic, message.payload),
                Err(err) => eprintln!("unreadable bus message: {err}"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

async fn publish(
    client: &Client,
    server: &str,
    topic: &str,
    payload: &str,
    retain: bool,
) -> Result<()> {
    let response = client
        .post(format!("{server}/publish"))
        .json(&BusMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
        })
        .send()
        .await
        .context("publish request failed")?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("publish rejected with {status}: {body}");
    }
    Ok(())
}

async fn fetch_session_token(
    client: &Client,
    server: &str,
    cfg: &GatewayConfig,
    partition_id: PartitionId,
) -> Result<String> {
    let base = render::topics::partition_base(cfg, partition_id);
    let topic = format!("{base}/config");
    let response = client
        .get(format!("{server}/retained"))
        .query(&[("topic", topic.as_str())])
        .send()
        .await
        .context("retained lookup failed")?;
    if response.status() == StatusCode::NOT_FOUND {
        bail!("partition {partition_id} has no retained config on {topic}");
    }
    let message: BusMessage = response
        .error_for_status()
        .context("retained lookup rejected")?
        .json()
        .await
        .context("invalid retained message")?;
    session_token_from_config(&message.payload)
}

fn ws_url(server: &str, filter: &str) -> Result<Url> {
    let mut url = Url::parse(server)
        .with_context(|| format!("invalid server url '{server}'"))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => bail!("server url must be http:// or https://, got {other}://"),
    };
    url.set_scheme(scheme)
        .map_err(|()| anyhow!("cannot switch '{server}' to {scheme}"))?;
    url.set_path("/ws");
    url.query_pairs_mut().clear().append_pair("filter", filter);
    Ok(url)
}

fn session_token_from_config(config: &str) -> Result<String> {
    let config: Value = serde_json::from_str(config)
        .context("discovery config is not JSON")?;
    let template = config
        .get("command_template")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("discovery config has no command_template"))?;
    let template: Value = serde_json::from_str(template)
        .context("command_template is not JSON")?;
    template
        .get("session_token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("command_template carries no session_token"))
}

fn control_payload(
    action: &str,
    partition_id: PartitionId,
    code: Option<&str>,
    delay: Option<u32>,
    token: &str,
) -> Value {
    let mut payload = Map::new();
    payload.insert("action".into(), json!(action.to_ascii_uppercase()));
    payload.insert("partition_id".into(), json!(partition_id.0.to_string()));
    payload.insert("session_token".into(), json!(token));
    if let Some(code) = code {
        payload.insert("code".into(), json!(code));
    }
    if let Some(delay) = delay {
        payload.insert("delay".into(), json!(delay));
    }
    Value::Object(payload)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
