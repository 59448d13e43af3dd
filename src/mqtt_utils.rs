//! MQTT client construction and publish helper (external collaborator boundary, C9).

use paho_mqtt as mqtt;
use tracing::info;

use crate::config::BrokerConfig;

pub fn create_opts(broker: &BrokerConfig) -> mqtt::CreateOptions {
    let server_uri = broker.server_uri();
    let client_id = broker.client_id();
    info!(%server_uri, %client_id, "creating MQTT client");
    mqtt::CreateOptionsBuilder::new()
        .server_uri(&server_uri)
        .client_id(&client_id)
        .finalize()
}

pub fn connect_opts(broker: &BrokerConfig) -> mqtt::ConnectOptions {
    mqtt::ConnectOptionsBuilder::new()
        .keep_alive_interval(std::time::Duration::from_secs(broker.keepalive_secs))
        .clean_session(true)
        .finalize()
}

pub async fn publish_json(
    client: &mqtt::AsyncClient,
    topic: &str,
    body: &serde_json::Value,
) -> mqtt::Result<()> {
    let payload = serde_json::to_vec(body).expect("VDA5050 payloads always serialize");
    let msg = mqtt::Message::new(topic, payload, mqtt::QOS_0);
    client.publish(msg).await
}
